//! Maps resolved reactions to timed cosmetic effects.
//!
//! The dispatcher holds no chemistry state. Effects expire on their own
//! deadline whether or not a newer reaction supersedes them.

use labforge_schemas::reaction::ReactionOutcome;
use serde::{Deserialize, Serialize};

const DISPLACEMENT_SECS: u64 = 30;
const COMBUSTION_SECS: u64 = 8;
const DEFAULT_SECS: u64 = 12;
const BURST_SECS: u64 = 5;

const STEAM_ENERGY: f64 = 50.0;
const HEAT_GLOW_ENERGY: f64 = 20.0;
const LIGHTNING_ENERGY: f64 = 50.0;
const FIRE_ENERGY: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    Bubbling,
    Steam,
    HeatGlow,
    Crystallization,
    ColorTransition { from: String, to: String },
    Lightning,
    Fire,
    Smoke,
    Precipitation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: u64,
    pub container_id: String,
    pub kind: EffectKind,
    pub started_at: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Default)]
pub struct EffectDispatcher {
    active: Vec<ActiveEffect>,
    next_id: u64,
}

/// How long the reaction-driven effects of `outcome` stay on.
pub fn effect_duration_secs(outcome: &ReactionOutcome) -> u64 {
    if outcome.is_displacement() {
        DISPLACEMENT_SECS
    } else if outcome.is_combustion() {
        COMBUSTION_SECS
    } else {
        DEFAULT_SECS
    }
}

impl EffectDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts every effect `outcome` calls for and returns their ids.
    pub fn dispatch(&mut self, container_id: &str, outcome: &ReactionOutcome, now: u64) -> Vec<u64> {
        let duration = effect_duration_secs(outcome);
        let mut started = Vec::new();

        let mut timed = Vec::new();
        if outcome.gas.as_deref().is_some_and(|g| !g.trim().is_empty()) {
            timed.push(EffectKind::Bubbling);
        }
        if outcome.is_combustion() || outcome.energy > STEAM_ENERGY {
            timed.push(EffectKind::Steam);
        }
        if outcome.energy > HEAT_GLOW_ENERGY {
            timed.push(EffectKind::HeatGlow);
        }
        if outcome
            .precipitate
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
        {
            timed.push(EffectKind::Crystallization);
        }
        if let Some(change) = &outcome.color_change {
            timed.push(EffectKind::ColorTransition {
                from: change.from.clone(),
                to: change.to.clone(),
            });
        }
        for kind in timed {
            started.push(self.start(container_id, kind, now, duration));
        }

        let mut bursts = Vec::new();
        if outcome.energy > LIGHTNING_ENERGY {
            bursts.push(EffectKind::Lightning);
        }
        if outcome.energy > FIRE_ENERGY {
            bursts.push(EffectKind::Fire);
        }
        if outcome.gas.as_deref().is_some_and(|g| !g.trim().is_empty()) {
            bursts.push(EffectKind::Smoke);
        }
        if outcome
            .precipitate
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
        {
            bursts.push(EffectKind::Precipitation);
        }
        for kind in bursts {
            started.push(self.start(container_id, kind, now, BURST_SECS));
        }

        started
    }

    fn start(&mut self, container_id: &str, kind: EffectKind, now: u64, duration: u64) -> u64 {
        self.next_id += 1;
        self.active.push(ActiveEffect {
            id: self.next_id,
            container_id: container_id.to_string(),
            kind,
            started_at: now,
            expires_at: now + duration,
        });
        self.next_id
    }

    /// Drops effects whose deadline is at or before `now` and returns them.
    pub fn expire(&mut self, now: u64) -> Vec<ActiveEffect> {
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| e.expires_at <= now);
        self.active = live;
        expired
    }

    pub fn active(&self) -> &[ActiveEffect] {
        &self.active
    }

    pub fn active_for<'a>(&'a self, container_id: &'a str) -> impl Iterator<Item = &'a ActiveEffect> + 'a {
        self.active.iter().filter(move |e| e.container_id == container_id)
    }

    pub fn forget_container(&mut self, container_id: &str) {
        self.active.retain(|e| e.container_id != container_id);
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
