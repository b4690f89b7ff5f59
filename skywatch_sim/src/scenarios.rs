//! Overlay scenarios for deterministic simulation.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: fast air patrols orbit a CAP station
    CapStation,

    /// SIM-002: parked aircraft and slow ships around an airfield
    ParkedRamp,

    /// SIM-003: contacts crossing the antimeridian
    Dateline,

    /// SIM-004: noisy, reordered feed delivery
    Jitter,

    /// SIM-005: opposing contacts with callsigns and known airframes
    FogOfWar,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CapStation,
            ScenarioId::ParkedRamp,
            ScenarioId::Dateline,
            ScenarioId::Jitter,
            ScenarioId::FogOfWar,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CapStation => "cap_station",
            ScenarioId::ParkedRamp => "parked_ramp",
            ScenarioId::Dateline => "dateline",
            ScenarioId::Jitter => "jitter",
            ScenarioId::FogOfWar => "fog_of_war",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CapStation => "Fast air contacts in orbit; search, watch list and speed estimates",
            ScenarioId::ParkedRamp => "Stationary aircraft filtered out, ships always retained",
            ScenarioId::Dateline => "Contacts crossing 180°; bearings and speeds stay in range",
            ScenarioId::Jitter => "Position noise plus late delivery; stale pings rejected",
            ScenarioId::FogOfWar => "Opposing contacts never disclose callsign or airframe",
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
            "cap_station" | "capstation" | "sim-001" => Ok(ScenarioId::CapStation),
            "parked_ramp" | "parkedramp" | "sim-002" => Ok(ScenarioId::ParkedRamp),
            "dateline" | "sim-003" => Ok(ScenarioId::Dateline),
            "jitter" | "sim-004" => Ok(ScenarioId::Jitter),
            "fog_of_war" | "fogofwar" | "sim-005" => Ok(ScenarioId::FogOfWar),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("SIM-004".parse::<ScenarioId>(), Ok(ScenarioId::Jitter));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
