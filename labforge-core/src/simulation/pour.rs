//! Bottle-to-container transfers.

use super::{
    engine::LabEngine,
    state::{LabEvent, VOLUME_EPSILON},
};
use crate::{error::LabError, scoring};
use labforge_schemas::{chemical::ChemicalQuantity, command::QuickAmount};

impl LabEngine {
    /// Moves `amount` mL from a bottle into a container, all or nothing.
    pub fn pour(&mut self, bottle_id: &str, target_id: &str, amount: f64) -> Result<(), LabError> {
        let result = self.try_pour(bottle_id, target_id, amount);
        self.record(result)
    }

    /// Pours a preset amount, clamped to what the bottle still holds.
    pub fn quick_pour(&mut self, bottle_id: &str, target_id: &str, preset: QuickAmount) -> Result<(), LabError> {
        let remaining = self
            .state
            .container(bottle_id)
            .and_then(|c| c.bottle.as_ref())
            .map(|b| b.volume_remaining)
            .filter(|v| *v > 0.0);
        let amount = match remaining {
            Some(remaining) => preset.millilitres().min(remaining),
            None => preset.millilitres(),
        };
        self.pour(bottle_id, target_id, amount)
    }

    /// Picks the bottle the pour controls act on.
    pub fn select_bottle(&mut self, bottle_id: &str) -> Result<(), LabError> {
        let result = self.try_select_bottle(bottle_id);
        self.record(result)
    }

    fn try_select_bottle(&mut self, bottle_id: &str) -> Result<(), LabError> {
        let index = self.index_of(bottle_id)?;
        let bottle = self.state.containers[index]
            .bottle
            .as_ref()
            .ok_or_else(|| LabError::NotABottle(bottle_id.to_string()))?;
        if bottle.is_empty() {
            return Err(LabError::BottleEmpty(bottle_id.to_string()));
        }
        self.selected_bottle = Some(bottle_id.to_string());
        Ok(())
    }

    fn try_pour(&mut self, bottle_id: &str, target_id: &str, amount: f64) -> Result<(), LabError> {
        self.require_active()?;
        let bottle_index = self.index_of(bottle_id)?;
        let chemical = match &self.state.containers[bottle_index].bottle {
            Some(bottle) => bottle.chemical.clone(),
            None => return Err(LabError::NotABottle(bottle_id.to_string())),
        };
        let target_index = self.index_of(target_id)?;
        if target_index == bottle_index || self.state.containers[target_index].is_bottle() {
            return Err(LabError::InvalidTarget(target_id.to_string()));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(LabError::InvalidAmount(amount));
        }

        let tick = self.state.tick;
        let source = &mut self.state.containers[bottle_index];
        let Some(bottle) = source.bottle.as_mut() else {
            return Err(LabError::NotABottle(bottle_id.to_string()));
        };
        if bottle.is_empty() {
            return Err(LabError::BottleEmpty(bottle_id.to_string()));
        }
        if amount > bottle.volume_remaining + VOLUME_EPSILON {
            return Err(LabError::InsufficientVolume {
                requested: amount,
                remaining: bottle.volume_remaining,
            });
        }

        let poured = amount.min(bottle.volume_remaining);
        bottle.volume_remaining -= poured;
        if bottle.volume_remaining <= VOLUME_EPSILON {
            bottle.volume_remaining = 0.0;
            bottle.emptied_at = Some(tick);
            self.state.events.push(LabEvent::BottleEmptied {
                bottle_id: bottle_id.to_string(),
            });
        }
        source.sync_bottle();
        self.refresh(bottle_index);

        self.state.events.push(LabEvent::Poured {
            bottle_id: bottle_id.to_string(),
            target_id: target_id.to_string(),
            amount: poured,
        });
        self.deliver(target_index, ChemicalQuantity::new(chemical.name, poured, chemical.color));
        self.scoreboard.award(scoring::POINTS_POUR);
        self.touch();
        Ok(())
    }
}
