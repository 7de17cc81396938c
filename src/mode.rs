/// Processing mode controller
///
/// Trades latency for precision. Every detector consults the current mode's
/// `ModeParams` to pick its sampling stride, how many strategies it fuses and
/// the minimum confidence it accepts.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Fast,
    Accurate,
    #[default]
    Balanced,
}

/// Algorithm parameters derived from a mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeParams {
    /// Sample every n-th pixel in both directions
    pub stride: u32,
    /// Upper bound on ball strategies fused per frame
    pub max_strategies: usize,
    /// Minimum fused confidence for a ball detection
    pub confidence_threshold: f32,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 3] = [
        ProcessingMode::Fast,
        ProcessingMode::Accurate,
        ProcessingMode::Balanced,
    ];

    pub fn params(&self) -> ModeParams {
        match self {
            ProcessingMode::Fast => ModeParams {
                stride: 4,
                max_strategies: 1,
                confidence_threshold: 0.5,
            },
            ProcessingMode::Balanced => ModeParams {
                stride: 2,
                max_strategies: 2,
                confidence_threshold: 0.4,
            },
            ProcessingMode::Accurate => ModeParams {
                stride: 1,
                max_strategies: 3,
                confidence_threshold: 0.35,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Fast => "fast",
            ProcessingMode::Accurate => "accurate",
            ProcessingMode::Balanced => "balanced",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(ProcessingMode::Fast),
            "accurate" => Ok(ProcessingMode::Accurate),
            "balanced" => Ok(ProcessingMode::Balanced),
            _ => Err(EngineError::InvalidMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        assert_eq!("fast".parse::<ProcessingMode>(), Ok(ProcessingMode::Fast));
        assert_eq!(" Accurate ".parse::<ProcessingMode>(), Ok(ProcessingMode::Accurate));
        assert_eq!("BALANCED".parse::<ProcessingMode>(), Ok(ProcessingMode::Balanced));
    }

    #[test]
    fn test_parse_unknown_mode() {
        assert_eq!(
            "bogus".parse::<ProcessingMode>(),
            Err(EngineError::InvalidMode("bogus".to_string()))
        );
    }

    #[test]
    fn test_display_round_trip() {
        for mode in ProcessingMode::ALL {
            assert_eq!(mode.to_string().parse::<ProcessingMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_params_trade_latency_for_precision() {
        let fast = ProcessingMode::Fast.params();
        let balanced = ProcessingMode::Balanced.params();
        let accurate = ProcessingMode::Accurate.params();

        assert!(fast.stride > balanced.stride && balanced.stride > accurate.stride);
        assert!(fast.max_strategies < balanced.max_strategies);
        assert!(balanced.max_strategies < accurate.max_strategies);
        assert!(fast.confidence_threshold > accurate.confidence_threshold);
    }
}
