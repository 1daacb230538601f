//! Signals derived from a container's contents: pH, temperature, viscosity,
//! mixture color and the reaction label shown next to the glassware.

use crate::{
    catalog::SubstanceCatalog,
    config::LabConfig,
    simulation::state::{Container, ResolutionState},
};
use labforge_schemas::chemical::{ChemicalQuantity, DEFAULT_CHEMICAL_COLOR};

pub const MIXING_LABEL: &str = "Chemical Mixing";
const MIXING_PROGRESS: f64 = 0.4;
const UNKNOWN_VISCOSITY: f64 = 0.5;

/// Recomputes every derived field of `container` in place.
pub fn derive(container: &mut Container, catalog: &SubstanceCatalog, config: &LabConfig) {
    container.ph = mixture_ph(&container.contents, catalog);
    container.viscosity = mixture_viscosity(&container.contents, catalog);
    container.temperature = temperature(container, config);

    if !matches!(container.resolution, ResolutionState::Applied { .. }) {
        if container.contents.len() >= 2 {
            container.reaction_type = Some(MIXING_LABEL.to_string());
            container.reaction_progress = MIXING_PROGRESS;
        } else {
            container.reaction_type = None;
            container.reaction_progress = 0.0;
        }
    }
}

pub fn temperature(container: &Container, config: &LabConfig) -> f64 {
    let burner = if container.is_heated { config.burner_heat } else { 0.0 };
    config.ambient_temperature + burner + container.reaction_heat.max(0.0)
}

/// Mean pH over the substances with a known pH; neutral when none are known.
pub fn mixture_ph(contents: &[ChemicalQuantity], catalog: &SubstanceCatalog) -> f64 {
    let known: Vec<f64> = contents
        .iter()
        .filter_map(|c| catalog.ph_of(&c.name))
        .collect();
    if known.is_empty() {
        7.0
    } else {
        known.iter().sum::<f64>() / known.len() as f64
    }
}

/// Volume-weighted viscosity hint in `[0, 1]`, derived from density.
pub fn mixture_viscosity(contents: &[ChemicalQuantity], catalog: &SubstanceCatalog) -> f64 {
    let total: f64 = contents.iter().map(|c| c.volume).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = contents
        .iter()
        .map(|c| {
            let hint = catalog
                .density_of(&c.name)
                .map(|rho| ((rho - 0.8) / 1.2).clamp(0.0, 1.0))
                .unwrap_or(UNKNOWN_VISCOSITY);
            hint * c.volume
        })
        .sum();
    (weighted / total).clamp(0.0, 1.0)
}

/// Volume-weighted blend of the contents' colors as `#RRGGBB`.
pub fn mixture_color(contents: &[ChemicalQuantity]) -> String {
    let mut acc = [0.0_f64; 3];
    let mut weight = 0.0;
    for quantity in contents {
        let Some(rgb) = parse_hex(&quantity.color) else {
            continue;
        };
        let w = if quantity.volume > 0.0 { quantity.volume } else { 0.0 };
        for (slot, channel) in acc.iter_mut().zip(rgb) {
            *slot += f64::from(channel) * w;
        }
        weight += w;
    }
    if weight <= 0.0 {
        return contents
            .last()
            .map(|c| c.color.clone())
            .unwrap_or_else(|| DEFAULT_CHEMICAL_COLOR.to_string());
    }
    let [r, g, b] = acc.map(|v| (v / weight).round().clamp(0.0, 255.0) as u8);
    format!("#{r:02X}{g:02X}{b:02X}")
}

/// Parses `#RGB` or `#RRGGBB`. Anything else, including non-ASCII text, is `None`.
pub fn parse_hex(color: &str) -> Option<[u8; 3]> {
    let digits = color
        .trim()
        .strip_prefix('#')?
        .chars()
        .map(|ch| ch.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()?;
    match digits.as_slice() {
        [r1, r2, g1, g2, b1, b2] => Some([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2]),
        [r, g, b] => Some([r * 17, g * 17, b * 17]),
        _ => None,
    }
}
