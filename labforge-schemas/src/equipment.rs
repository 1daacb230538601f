use serde::{Deserialize, Serialize};
use std::fmt;

/// Bench coordinates `[x, y, z]`; the bench top is the x/z plane.
pub type Position = [f64; 3];

/// The kinds of equipment that can be placed on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentKind {
    Beaker,
    ErlenmeyerFlask,
    TestTube,
    Burette,
    Burner,
    ChemicalBottle,
}

impl EquipmentKind {
    /// Parses the catalog ids used by the equipment rack ("beaker-250",
    /// "erlenmeyer-flask", "chemical-bottle", ...). Size suffixes are ignored.
    pub fn from_catalog_id(id: &str) -> Option<Self> {
        let id = id.trim().to_ascii_lowercase();
        if id.starts_with("chemical-bottle") || id == "bottle" {
            Some(Self::ChemicalBottle)
        } else if id.starts_with("beaker") {
            Some(Self::Beaker)
        } else if id.contains("flask") {
            Some(Self::ErlenmeyerFlask)
        } else if id.starts_with("test-tube") || id.starts_with("testtube") {
            Some(Self::TestTube)
        } else if id.starts_with("burette") {
            Some(Self::Burette)
        } else if id.starts_with("burner") || id.starts_with("bunsen") {
            Some(Self::Burner)
        } else {
            None
        }
    }

    pub fn is_bottle(self) -> bool {
        self == Self::ChemicalBottle
    }

    /// Burettes are clamped in a stand and never sit over a flame.
    pub fn can_be_heated(self) -> bool {
        !matches!(self, Self::Burette | Self::ChemicalBottle)
    }
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Beaker => "beaker",
            Self::ErlenmeyerFlask => "erlenmeyer-flask",
            Self::TestTube => "test-tube",
            Self::Burette => "burette",
            Self::Burner => "burner",
            Self::ChemicalBottle => "chemical-bottle",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_map_to_kinds() {
        assert_eq!(EquipmentKind::from_catalog_id("beaker-250"), Some(EquipmentKind::Beaker));
        assert_eq!(
            EquipmentKind::from_catalog_id("Erlenmeyer-Flask"),
            Some(EquipmentKind::ErlenmeyerFlask)
        );
        assert_eq!(
            EquipmentKind::from_catalog_id("chemical-bottle"),
            Some(EquipmentKind::ChemicalBottle)
        );
        assert_eq!(EquipmentKind::from_catalog_id("microscope"), None);
    }

    #[test]
    fn display_round_trips_through_catalog_ids() {
        for kind in [
            EquipmentKind::Beaker,
            EquipmentKind::ErlenmeyerFlask,
            EquipmentKind::TestTube,
            EquipmentKind::Burette,
            EquipmentKind::Burner,
            EquipmentKind::ChemicalBottle,
        ] {
            assert_eq!(EquipmentKind::from_catalog_id(&kind.to_string()), Some(kind));
        }
    }
}
