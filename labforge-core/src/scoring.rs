pub const POINTS_START: u32 = 10;
pub const POINTS_PLACE: u32 = 10;
pub const POINTS_POUR: u32 = 15;
pub const POINTS_REACTION: u32 = 20;

pub const BADGE_FIRST_REACTION: &str = "First Reaction";
pub const BADGE_FIVE_REACTIONS: &str = "Reaction Master";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    score: u32,
    badges: Vec<String>,
}

impl Scoreboard {
    pub fn restore(score: u32, badges: Vec<String>) -> Self {
        let mut board = Self {
            score,
            badges: Vec::new(),
        };
        for badge in badges {
            board.award_badge(&badge);
        }
        board
    }

    pub fn award(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    /// Returns false when the badge was already held.
    pub fn award_badge(&mut self, badge: &str) -> bool {
        if self.badges.iter().any(|b| b == badge) {
            return false;
        }
        self.badges.push(badge.to_string());
        true
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn badges(&self) -> &[String] {
        &self.badges
    }

    pub fn level(&self) -> u32 {
        self.score / 100
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.badges.clear();
    }
}
