//! Configuration – reads `~/.coiltrack/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use coiltrack_core::SessionConfig;
use coiltrack_runtime::LocatorConfig;
use coiltrack_types::{FrameTrigger, ToolRoles, TrackError};

/// Persisted operator configuration stored in `~/.coiltrack/config.toml`.
///
/// Every field has a default, so a missing or partial file is fine; the file
/// is only required when the tracking-server tool list differs from the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ordered tool list as configured on the tracking server. Wire tool
    /// identities are `list index + 1`.
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,

    /// Tool name of the stationary reference plate.
    #[serde(default = "default_plate_tool")]
    pub plate_tool: String,

    /// Tool name of the moving coil marker.
    #[serde(default = "default_marker_tool")]
    pub marker_tool: String,

    /// Inbound frame source to follow: `POLARIS_POSITION` (live bridge) or
    /// `SAMPLE_GENERATED` (generator/replay).
    #[serde(default = "default_trigger")]
    pub trigger: String,

    /// Seconds of samples averaged into the calibration vector.
    #[serde(default = "default_calibration_secs")]
    pub calibration_secs: f64,

    /// Settle delay between the begin command and collection, in seconds.
    #[serde(default)]
    pub start_delay_secs: f64,

    /// Per-topic event-bus channel capacity.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Identification string answered to pings.
    #[serde(default = "default_module_name")]
    pub module_name: String,
}

fn default_tools() -> Vec<String> {
    vec!["CB609".to_string(), "CT315".to_string()]
}
fn default_plate_tool() -> String {
    "CB609".to_string()
}
fn default_marker_tool() -> String {
    "CT315".to_string()
}
fn default_trigger() -> String {
    "POLARIS_POSITION".to_string()
}
fn default_calibration_secs() -> f64 {
    5.0
}
fn default_bus_capacity() -> usize {
    256
}
fn default_module_name() -> String {
    "coiltrack".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            plate_tool: default_plate_tool(),
            marker_tool: default_marker_tool(),
            trigger: default_trigger(),
            calibration_secs: default_calibration_secs(),
            start_delay_secs: 0.0,
            bus_capacity: default_bus_capacity(),
            module_name: default_module_name(),
        }
    }
}

impl Config {
    /// Check the numeric fields. Name lookups (tools, trigger) are checked by
    /// [`Config::resolve`], which owns the mapping.
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.tools.is_empty() {
            return Err(TrackError::Configuration(
                "tool list must not be empty".to_string(),
            ));
        }
        if !self.calibration_secs.is_finite() || self.calibration_secs <= 0.0 {
            return Err(TrackError::Configuration(format!(
                "calibration_secs must be a positive number, got {}",
                self.calibration_secs
            )));
        }
        if !self.start_delay_secs.is_finite() || self.start_delay_secs < 0.0 {
            return Err(TrackError::Configuration(format!(
                "start_delay_secs must be zero or positive, got {}",
                self.start_delay_secs
            )));
        }
        if self.bus_capacity == 0 {
            return Err(TrackError::Configuration(
                "bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the raw strings into the typed locator configuration. All
    /// lookups happen here, once, at startup; any unknown name is fatal.
    pub fn resolve(&self) -> Result<LocatorConfig, TrackError> {
        self.validate()?;
        let roles = ToolRoles::resolve(&self.tools, &self.plate_tool, &self.marker_tool)?;
        let trigger = FrameTrigger::from_name(&self.trigger)?;
        Ok(LocatorConfig {
            module_name: self.module_name.clone(),
            roles,
            trigger,
            session: SessionConfig {
                duration_secs: self.calibration_secs,
                start_delay_secs: self.start_delay_secs,
            },
        })
    }
}

/// Return the path to `~/.coiltrack/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".coiltrack").join("config.toml")
}

/// Load the config from a specific path. Returns `None` if the file does not
/// exist; a file that exists but does not parse is a hard failure.
pub fn load_from(path: &PathBuf) -> Result<Option<Config>, TrackError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TrackError::Configuration(format!("failed to read config at {}: {}", path.display(), e))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| TrackError::Configuration(format!("failed to parse config: {}", e)))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `COILTRACK_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `COILTRACK_TRIGGER` | `trigger` |
/// | `COILTRACK_PLATE_TOOL` | `plate_tool` |
/// | `COILTRACK_MARKER_TOOL` | `marker_tool` |
/// | `COILTRACK_CALIBRATION_SECS` | `calibration_secs` |
/// | `COILTRACK_START_DELAY_SECS` | `start_delay_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("COILTRACK_TRIGGER") {
        cfg.trigger = v;
    }
    if let Ok(v) = std::env::var("COILTRACK_PLATE_TOOL") {
        cfg.plate_tool = v;
    }
    if let Ok(v) = std::env::var("COILTRACK_MARKER_TOOL") {
        cfg.marker_tool = v;
    }
    if let Ok(v) = std::env::var("COILTRACK_CALIBRATION_SECS")
        && let Ok(secs) = v.parse::<f64>() {
            cfg.calibration_secs = secs;
        }
    if let Ok(v) = std::env::var("COILTRACK_START_DELAY_SECS")
        && let Ok(secs) = v.parse::<f64>() {
            cfg.start_delay_secs = secs;
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_plate_one_marker_two() {
        let cfg = Config::default();
        let locator = cfg.resolve().expect("defaults must resolve");
        assert_eq!(locator.roles.plate_id(), 1);
        assert_eq!(locator.roles.marker_id(), 2);
        assert_eq!(locator.trigger, FrameTrigger::PolarisPose);
        assert!((locator.session.duration_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(locator.module_name, "coiltrack");
    }

    #[test]
    fn config_path_points_to_coiltrack_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".coiltrack"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "tools = [\"PLATE01\", \"COIL01\", \"SPARE\"]\nplate_tool = \"PLATE01\"\nmarker_tool = \"COIL01\"\n")
            .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.tools.len(), 3);
        assert_eq!(cfg.plate_tool, "PLATE01");
        // Untouched fields fall back to defaults.
        assert_eq!(cfg.module_name, "coiltrack");
        assert_eq!(cfg.bus_capacity, 256);
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "tools = not-a-list").expect("write");

        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
    }

    #[test]
    fn resolve_rejects_unknown_marker_tool() {
        let cfg = Config {
            marker_tool: "CT999".to_string(),
            ..Config::default()
        };
        let err = cfg.resolve().unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
        assert!(err.to_string().contains("CT999"));
    }

    #[test]
    fn resolve_rejects_unknown_trigger() {
        let cfg = Config {
            trigger: "MT_RAW_SPIKECOUNT".to_string(),
            ..Config::default()
        };
        let err = cfg.resolve().unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
    }

    #[test]
    fn validate_rejects_nonpositive_duration() {
        let cfg = Config {
            calibration_secs: 0.0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(TrackError::Configuration(_))));

        let cfg = Config {
            calibration_secs: f64::NAN,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(TrackError::Configuration(_))));
    }

    #[test]
    fn validate_rejects_negative_start_delay() {
        let cfg = Config {
            start_delay_secs: -1.0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(TrackError::Configuration(_))));
    }

    #[test]
    fn apply_env_overrides_changes_trigger() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("COILTRACK_TRIGGER", "SAMPLE_GENERATED") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.trigger, "SAMPLE_GENERATED");
        unsafe { std::env::remove_var("COILTRACK_TRIGGER") };
    }

    #[test]
    fn apply_env_overrides_changes_marker_tool() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("COILTRACK_MARKER_TOOL", "CT412") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.marker_tool, "CT412");
        unsafe { std::env::remove_var("COILTRACK_MARKER_TOOL") };
    }

    #[test]
    fn apply_env_overrides_parses_start_delay() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("COILTRACK_START_DELAY_SECS", "2.5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!((cfg.start_delay_secs - 2.5).abs() < f64::EPSILON);
        unsafe { std::env::remove_var("COILTRACK_START_DELAY_SECS") };
    }

    #[test]
    fn apply_env_overrides_ignores_unparseable_duration() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("COILTRACK_CALIBRATION_SECS", "not-a-number") };
        let mut cfg = Config::default();
        let original = cfg.calibration_secs;
        apply_env_overrides(&mut cfg);
        assert!((cfg.calibration_secs - original).abs() < f64::EPSILON);
        unsafe { std::env::remove_var("COILTRACK_CALIBRATION_SECS") };
    }
}
