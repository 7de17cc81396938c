use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::mode::ProcessingMode;

const CONFIG_ENV_VAR: &str = "BOUNCEBACK_CONFIG";

/// HSV colour window used to classify pixels
///
/// Hue is in degrees [0, 360), saturation and value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub hue_center: f32,
    pub hue_tolerance: f32,
    pub min_saturation: f32,
    pub min_value: f32,
}

impl ColorRange {
    /// Check an HSV triple against this window (circular hue distance)
    pub fn matches(&self, hue: f32, saturation: f32, value: f32) -> bool {
        if saturation < self.min_saturation || value < self.min_value {
            return false;
        }
        let diff = (hue - self.hue_center).rem_euclid(360.0);
        diff.min(360.0 - diff) <= self.hue_tolerance
    }
}

/// Impact cooldown and proximity tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Frames suppressed after an impact is registered
    pub cooldown_frames: u32,
    /// Extra slack (pixels) added to ball + target radii
    pub proximity_px: f32,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 15,
            proximity_px: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ball colour (default: orange training ball)
    pub ball_color: ColorRange,

    /// Target marker colour (default: blue pads on the rebound wall)
    pub target_color: ColorRange,

    /// Accepted ball radius range in source pixels
    pub min_ball_radius: f32,
    pub max_ball_radius: f32,

    /// Smallest target blob area in source pixels
    pub min_target_area: f32,

    /// Maximum number of targets reported per frame
    pub max_targets: usize,

    /// Luma difference that counts as motion (0-255)
    pub motion_threshold: u8,

    pub impact: ImpactConfig,

    /// Longest side of the working frame (0 = never downscale)
    pub max_frame_dimension: u32,

    /// Enable the band-pass ball strategy (only fused in accurate mode)
    pub enable_band_pass_strategy: bool,

    /// Mode an engine starts in
    pub default_mode: ProcessingMode,

    /// Number of recent call latencies kept for percentile statistics
    pub latency_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ball_color: ColorRange {
                hue_center: 28.0,
                hue_tolerance: 22.0,
                min_saturation: 0.45,
                min_value: 0.35,
            },
            target_color: ColorRange {
                hue_center: 220.0,
                hue_tolerance: 30.0,
                min_saturation: 0.4,
                min_value: 0.25,
            },
            min_ball_radius: 3.0,
            max_ball_radius: 120.0,
            min_target_area: 36.0,
            max_targets: 16,
            motion_threshold: 30,
            impact: ImpactConfig::default(),
            max_frame_dimension: 1280,
            enable_band_pass_strategy: false,
            default_mode: ProcessingMode::Balanced,
            latency_window: 240,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        tracing::info!("✓ Loaded engine config from: {}", path.display());
        Ok(config)
    }

    /// Load from `$BOUNCEBACK_CONFIG` or the platform config directory.
    /// Falls back to defaults when no file exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                tracing::info!(
                    "No config at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to disk as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |e: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| save_err(Box::new(e)))?;
            }
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| save_err(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_err(Box::new(e)))?;
        Ok(())
    }

    /// Config file location: env override, else `<config dir>/BounceBackVision/engine.json`
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("BounceBackVision").join("engine.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("ball_color", &self.ball_color),
            ("target_color", &self.target_color),
        ];
        for (name, range) in ranges {
            if !(0.0..=180.0).contains(&range.hue_tolerance) {
                return Err(ConfigError::Invalid(format!(
                    "{}.hue_tolerance must be 0-180, got {}",
                    name, range.hue_tolerance
                )));
            }
            let unit = 0.0..=1.0;
            if !unit.contains(&range.min_saturation) || !unit.contains(&range.min_value) {
                return Err(ConfigError::Invalid(format!(
                    "{} saturation/value bounds must be within 0.0-1.0",
                    name
                )));
            }
        }
        if !(self.min_ball_radius > 0.0 && self.min_ball_radius <= self.max_ball_radius) {
            return Err(ConfigError::Invalid(format!(
                "ball radius range [{}, {}] is empty",
                self.min_ball_radius, self.max_ball_radius
            )));
        }
        if self.max_targets == 0 {
            return Err(ConfigError::Invalid("max_targets must be > 0".to_string()));
        }
        if !(self.impact.proximity_px >= 0.0) {
            return Err(ConfigError::Invalid(
                "impact.proximity_px must be >= 0".to_string(),
            ));
        }
        if self.latency_window == 0 {
            return Err(ConfigError::Invalid("latency_window must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.impact.cooldown_frames, 15);
        assert_eq!(config.impact.proximity_px, 12.0);
        assert_eq!(config.default_mode, ProcessingMode::Balanced);
        assert!(!config.enable_band_pass_strategy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "default_mode": "fast", "max_targets": 4 }"#).unwrap();
        assert_eq!(config.default_mode, ProcessingMode::Fast);
        assert_eq!(config.max_targets, 4);
        assert_eq!(config.motion_threshold, 30);
    }

    #[test]
    fn test_save_and_load() {
        let path = env::temp_dir()
            .join(format!("bounceback-config-{}", std::process::id()))
            .join("engine.json");
        let mut config = EngineConfig::default();
        config.impact.cooldown_frames = 3;

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.impact.cooldown_frames, 3);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let config = EngineConfig {
            min_ball_radius: 50.0,
            max_ball_radius: 10.0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_color_range_wraps_hue() {
        let red = ColorRange {
            hue_center: 355.0,
            hue_tolerance: 15.0,
            min_saturation: 0.3,
            min_value: 0.3,
        };
        assert!(red.matches(5.0, 0.9, 0.9));
        assert!(red.matches(345.0, 0.9, 0.9));
        assert!(!red.matches(30.0, 0.9, 0.9));
        assert!(!red.matches(0.0, 0.1, 0.9));
    }
}
