//! Camera hardware models

use std::fmt;

/// Camera model, as identified from BLE advertising data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceModel {
    OsmoAction3,
    OsmoAction4,
    OsmoPocket3,
    #[default]
    Unknown,
}

impl DeviceModel {
    /// Human-readable model name
    pub fn name(self) -> &'static str {
        match self {
            Self::OsmoAction3 => "Osmo Action 3",
            Self::OsmoAction4 => "Osmo Action 4",
            Self::OsmoPocket3 => "Osmo Pocket 3",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the model needs an explicit image stabilization
    /// configuration step before streaming can start.
    pub fn requires_configuration(self) -> bool {
        matches!(self, Self::OsmoAction4)
    }

    /// Payload encoding convention used by this model.
    ///
    /// All currently identified models use [`DeviceVariant::Standard`];
    /// newer hardware can be driven by overriding the variant explicitly.
    pub fn variant(self) -> DeviceVariant {
        match self {
            Self::OsmoAction3 | Self::OsmoAction4 | Self::OsmoPocket3 | Self::Unknown => {
                DeviceVariant::Standard
            }
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hardware encoding convention selected by the variant byte in the
/// configure and start-streaming payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceVariant {
    #[default]
    Standard,
    Extended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_action4_requires_configuration() {
        assert!(DeviceModel::OsmoAction4.requires_configuration());
        assert!(!DeviceModel::OsmoAction3.requires_configuration());
        assert!(!DeviceModel::OsmoPocket3.requires_configuration());
        assert!(!DeviceModel::Unknown.requires_configuration());
    }

    #[test]
    fn test_model_names() {
        assert_eq!(DeviceModel::OsmoPocket3.to_string(), "Osmo Pocket 3");
        assert_eq!(DeviceModel::default(), DeviceModel::Unknown);
        assert!(!DeviceModel::Unknown.is_known());
    }
}
