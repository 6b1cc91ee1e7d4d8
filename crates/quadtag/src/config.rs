//! Detector configuration and config-time errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::family::TagFamily;

/// Errors raised while building or reconfiguring a detector.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested backend name is not recognized.
    #[error("unknown detector backend '{0}', expected 'region' or 'boundary'")]
    UnknownBackend(String),
    /// The requested tag family name is not recognized.
    #[error("unknown tag family '{0}', expected '36h11', '25h9' or '16h5'")]
    UnknownFamily(String),
}

/// Selects which detection engine runs under the shared [`crate::Detector`]
/// interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Global-threshold connected-component engine.
    #[default]
    Region,
    /// Adaptive-threshold contour-tracing engine.
    Boundary,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Region => "region",
            Backend::Boundary => "boundary",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "region" => Ok(Backend::Region),
            "boundary" => Ok(Backend::Boundary),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Runtime-tunable detector settings.
///
/// `decimate` and `black_border` are clamped to at least 1 on every write,
/// so a detector never sees a degenerate value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub backend: Backend,
    pub family: TagFamily,
    decimate: u32,
    pub refine_corners: bool,
    black_border: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Region,
            family: TagFamily::Tag36h11,
            decimate: 1,
            refine_corners: false,
            black_border: 1,
        }
    }
}

impl DetectorConfig {
    pub fn new(backend: Backend, family: TagFamily) -> Self {
        Self {
            backend,
            family,
            ..Self::default()
        }
    }

    /// Input downsampling factor before quad search. Clamped to `>= 1`.
    pub fn set_decimate(&mut self, decimate: u32) {
        self.decimate = decimate.max(1);
    }

    pub fn decimate(&self) -> u32 {
        self.decimate
    }

    /// Width of the black border ring in payload cells. Clamped to `>= 1`.
    pub fn set_black_border(&mut self, cells: u32) {
        self.black_border = cells.max(1);
    }

    pub fn black_border(&self) -> u32 {
        self.black_border
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("region".parse::<Backend>().unwrap(), Backend::Region);
        assert_eq!(" Boundary ".parse::<Backend>().unwrap(), Backend::Boundary);
        assert!(matches!(
            "umich".parse::<Backend>(),
            Err(ConfigError::UnknownBackend(_))
        ));
    }

    #[test]
    fn decimate_clamps_to_one() {
        let mut cfg = DetectorConfig::default();
        cfg.set_decimate(0);
        assert_eq!(cfg.decimate(), 1);
        cfg.set_decimate(4);
        assert_eq!(cfg.decimate(), 4);
    }

    #[test]
    fn black_border_clamps_to_one() {
        let mut cfg = DetectorConfig::default();
        cfg.set_black_border(0);
        assert_eq!(cfg.black_border(), 1);
        cfg.set_black_border(2);
        assert_eq!(cfg.black_border(), 2);
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut cfg = DetectorConfig::new(Backend::Boundary, TagFamily::Tag16h5);
        cfg.set_decimate(2);
        cfg.refine_corners = true;

        let json = serde_json::to_string(&cfg).unwrap();
        let back: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
