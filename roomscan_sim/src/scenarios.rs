//! Scenario catalog for the RoomScan harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Scan a room, persist the map, verify the round trip
    ScanAndPersist,

    /// Save, tear down, and re-localize a fresh session from disk
    ReloadResume,

    /// Overlapping captures completing out of issue order
    CaptureRace,

    /// Unrecoverable tracking loss and recovery via restart
    SourceFailure,

    /// Pause gating, resume, and interruption notifications
    PauseResume,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::ScanAndPersist,
            ScenarioId::ReloadResume,
            ScenarioId::CaptureRace,
            ScenarioId::SourceFailure,
            ScenarioId::PauseResume,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::ScanAndPersist => "scan_and_persist",
            ScenarioId::ReloadResume => "reload_resume",
            ScenarioId::CaptureRace => "capture_race",
            ScenarioId::SourceFailure => "source_failure",
            ScenarioId::PauseResume => "pause_resume",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::ScanAndPersist => {
                "Scan planes, verify registry/renderer, save and reload the map"
            }
            ScenarioId::ReloadResume => {
                "Persist a scan, stop, re-localize a new session from the file"
            }
            ScenarioId::CaptureRace => {
                "Out-of-order capture completions; last completion must win"
            }
            ScenarioId::SourceFailure => {
                "Tracking loss drives Failed; stop and restart recover"
            }
            ScenarioId::PauseResume => {
                "Paused sessions drop events; resume picks the stream back up"
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scan_and_persist" | "scanandpersist" => Ok(ScenarioId::ScanAndPersist),
            "reload_resume" | "reloadresume" => Ok(ScenarioId::ReloadResume),
            "capture_race" | "capturerace" => Ok(ScenarioId::CaptureRace),
            "source_failure" | "sourcefailure" => Ok(ScenarioId::SourceFailure),
            "pause_resume" | "pauseresume" => Ok(ScenarioId::PauseResume),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().expect("parseable name");
            assert_eq!(parsed, scenario);
        }
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }
}
