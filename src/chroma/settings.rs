use serde::{Deserialize, Serialize};

use crate::error::{ChromaError, Result};

/// Closed interval `[min, max]` on one 8-bit HSV channel.
///
/// Serialized as a two-element array, e.g. `[35, 85]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange(pub u8, pub u8);

impl ChannelRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self(min, max)
    }

    pub fn min(&self) -> u8 {
        self.0
    }

    pub fn max(&self) -> u8 {
        self.1
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        self.0 <= value && value <= self.1
    }

    fn validate(&self, channel: &'static str) -> Result<()> {
        if self.0 > self.1 {
            return Err(ChromaError::InvalidRange {
                channel,
                min: self.0,
                max: self.1,
            }
            .into());
        }
        Ok(())
    }
}

/// Chroma key parameters.
///
/// Hue uses the 8-bit convention (0..180, i.e. degrees halved); saturation
/// and value span 0..=255.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaSettings {
    pub hue_range: ChannelRange,
    pub sat_range: ChannelRange,
    pub val_range: ChannelRange,

    /// Gaussian feather radius in pixels; 0 disables feathering
    pub edge_feather: i32,

    /// Spill removal strength in [0, 1]; 0 disables spill removal
    pub spill_removal: f32,
}

impl Default for ChromaSettings {
    fn default() -> Self {
        Self {
            hue_range: ChannelRange(35, 85),
            sat_range: ChannelRange(40, 255),
            val_range: ChannelRange(40, 255),
            edge_feather: 5,
            spill_removal: 0.5,
        }
    }
}

impl ChromaSettings {
    pub fn validate(&self) -> Result<()> {
        self.hue_range.validate("hue")?;
        self.sat_range.validate("saturation")?;
        self.val_range.validate("value")?;

        if self.edge_feather < 0 {
            return Err(ChromaError::NegativeFeather {
                value: self.edge_feather,
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.spill_removal) {
            return Err(ChromaError::InvalidSpillStrength {
                value: self.spill_removal,
            }
            .into());
        }

        Ok(())
    }

    /// Whether an HSV triple falls inside all three ranges
    #[inline]
    pub fn matches(&self, [h, s, v]: [u8; 3]) -> bool {
        self.hue_range.contains(h) && self.sat_range.contains(s) && self.val_range.contains(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ChromaSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.hue_range, ChannelRange(35, 85));
        assert_eq!(settings.edge_feather, 5);
        assert_eq!(settings.spill_removal, 0.5);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut settings = ChromaSettings::default();
        settings.sat_range = ChannelRange(200, 100);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_negative_feather_rejected() {
        let mut settings = ChromaSettings::default();
        settings.edge_feather = -1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_spill_out_of_range_rejected() {
        let mut settings = ChromaSettings::default();
        settings.spill_removal = 1.5;
        assert!(settings.validate().is_err());
        settings.spill_removal = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"hue_range":[40,80],"sat_range":[40,255],"val_range":[40,255],"edge_feather":3,"spill_removal":0.25}"#;
        let settings: ChromaSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.hue_range, ChannelRange(40, 80));
        assert_eq!(settings.edge_feather, 3);

        // Missing fields fall back to defaults
        let partial: ChromaSettings = serde_json::from_str(r#"{"edge_feather":0}"#).unwrap();
        assert_eq!(partial.edge_feather, 0);
        assert_eq!(partial.hue_range, ChannelRange(35, 85));

        let out = serde_json::to_value(&settings).unwrap();
        assert_eq!(out["hue_range"], serde_json::json!([40, 80]));
    }

    #[test]
    fn test_matches_is_inclusive() {
        let settings = ChromaSettings::default();
        assert!(settings.matches([35, 40, 40]));
        assert!(settings.matches([85, 255, 255]));
        assert!(!settings.matches([34, 255, 255]));
        assert!(!settings.matches([60, 39, 255]));
    }
}
