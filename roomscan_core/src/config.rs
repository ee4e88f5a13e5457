//! Session configuration.

use std::time::Duration;

use roomscan_env::{EnvironmentTexturing, PlaneDetection, SourceConfig, SpatialMap};

/// How often the session refreshes its cached world-map capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Request a capture after every applied add/update event.
    EveryEvent,

    /// Request a capture after an applied add/update event, but at
    /// most once per interval.
    Throttled(Duration),

    /// Only capture on an explicit request.
    Manual,
}

/// Configuration for a tracking session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Enable sensor autofocus.
    pub auto_focus: bool,

    /// Plane orientations reported as anchors.
    pub plane_detection: PlaneDetection,

    /// Environment texture estimation mode.
    pub environment_texturing: EnvironmentTexturing,

    /// Seed map for re-localizing against a prior session.
    pub resume_from: Option<SpatialMap>,

    /// Cached-capture refresh cadence.
    pub capture_policy: CapturePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_focus: true,
            plane_detection: PlaneDetection::Horizontal,
            environment_texturing: EnvironmentTexturing::Automatic,
            resume_from: None,
            capture_policy: CapturePolicy::EveryEvent,
        }
    }
}

impl SessionConfig {
    /// Builds the configuration handed to the tracking source.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            auto_focus: self.auto_focus,
            plane_detection: self.plane_detection,
            environment_texturing: self.environment_texturing,
            initial_map: self.resume_from.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_scan_profile() {
        let config = SessionConfig::default();
        assert!(config.auto_focus);
        assert_eq!(config.plane_detection, PlaneDetection::Horizontal);
        assert_eq!(config.environment_texturing, EnvironmentTexturing::Automatic);
        assert!(config.resume_from.is_none());
        assert_eq!(config.capture_policy, CapturePolicy::EveryEvent);
    }

    #[test]
    fn test_source_config_carries_seed() {
        let seed = SpatialMap::new(vec![1, 2, 3], 42, 2);
        let config = SessionConfig {
            resume_from: Some(seed.clone()),
            ..SessionConfig::default()
        };

        let source_config = config.source_config();
        assert_eq!(source_config.initial_map, Some(seed));
        assert_eq!(source_config.plane_detection, config.plane_detection);
    }
}
