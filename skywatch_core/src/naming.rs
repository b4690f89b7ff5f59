//! Track naming and coalition-aware disclosure.
//!
//! Every contact is labelled with a short numeric track id. Friendly
//! contacts may additionally show the pilot callsign, the NATO reporting
//! name and the airframe type. Opposing contacts only ever show the track
//! id: `display_track_name` is the single path the UI uses, and it never
//! leaks identity across coalitions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::entity::{Entity, EntityId};

// ============================================================================
// TRACK IDS
// ============================================================================

const TRACK_ID_MIN: u32 = 10_000;
const TRACK_ID_MAX: u32 = 99_999;

#[derive(Debug)]
struct TrackIdState {
    rng: ChaCha8Rng,
    assigned: HashMap<EntityId, u32>,
    in_use: HashSet<u32>,
    overflow: u32,
}

/// Assigns each entity a stable 5-digit track id on first reference.
///
/// Ids are drawn from a seeded ChaCha stream, so the same seed and the same
/// reference order always produce the same labels. Two live entities never
/// share an id.
#[derive(Debug)]
pub struct TrackIdRegistry {
    state: Mutex<TrackIdState>,
}

impl TrackIdRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(TrackIdState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                assigned: HashMap::new(),
                in_use: HashSet::new(),
                overflow: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackIdState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The entity's track id, assigning one if this is the first reference.
    pub fn track_id(&self, entity_id: EntityId) -> String {
        let mut state = self.lock();
        if let Some(id) = state.assigned.get(&entity_id) {
            return id.to_string();
        }

        let capacity = (TRACK_ID_MAX - TRACK_ID_MIN + 1) as usize;
        let id = if state.in_use.len() >= capacity {
            // 5-digit space exhausted: continue with 6-digit ids
            state.overflow += 1;
            TRACK_ID_MAX + state.overflow
        } else {
            loop {
                let candidate = state.rng.gen_range(TRACK_ID_MIN..=TRACK_ID_MAX);
                if !state.in_use.contains(&candidate) {
                    break candidate;
                }
            }
        };

        state.in_use.insert(id);
        state.assigned.insert(entity_id, id);
        id.to_string()
    }

    /// Releases the id of an entity confirmed gone.
    pub fn forget(&self, entity_id: EntityId) {
        let mut state = self.lock();
        if let Some(id) = state.assigned.remove(&entity_id) {
            state.in_use.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TrackIdRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}

// ============================================================================
// AIRCRAFT REGISTRY
// ============================================================================

/// Static facts about a known airframe type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftInfo {
    #[serde(default, rename = "natoName", skip_serializing_if = "Option::is_none")]
    pub nato_name: Option<String>,
}

/// Lookup table of known airframe type codes.
#[derive(Debug, Clone, Default)]
pub struct AircraftRegistry {
    planes: HashMap<String, AircraftInfo>,
}

const BUILTIN_AIRCRAFT: &[(&str, Option<&str>)] = &[
    ("F/A-18C", None),
    ("FA-18C_hornet", None),
    ("F-16C_50", None),
    ("F-15C", None),
    ("F-15ESE", None),
    ("F-14B", None),
    ("A-10C_2", None),
    ("AV8BNA", None),
    ("M-2000C", None),
    ("E-3A", None),
    ("KC-135", None),
    ("JF-17", None),
    ("Su-27", Some("Flanker")),
    ("Su-33", Some("Flanker-D")),
    ("J-11A", Some("Flanker-L")),
    ("Su-30", Some("Flanker-C")),
    ("Su-24M", Some("Fencer")),
    ("Su-25T", Some("Frogfoot")),
    ("Su-34", Some("Fullback")),
    ("MiG-21Bis", Some("Fishbed")),
    ("MiG-23MLD", Some("Flogger")),
    ("MiG-25PD", Some("Foxbat")),
    ("MiG-29A", Some("Fulcrum")),
    ("MiG-29S", Some("Fulcrum-C")),
    ("MiG-31", Some("Foxhound")),
    ("Tu-22M3", Some("Backfire")),
    ("Tu-95MS", Some("Bear")),
    ("Tu-160", Some("Blackjack")),
    ("A-50", Some("Mainstay")),
    ("IL-76MD", Some("Candid")),
    ("IL-78M", Some("Midas")),
    ("Mi-24V", Some("Hind")),
    ("Mi-8MT", Some("Hip")),
    ("Ka-50", Some("Hokum")),
];

impl AircraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the common airframes.
    pub fn with_defaults() -> Self {
        let planes = BUILTIN_AIRCRAFT
            .iter()
            .map(|(code, nato)| {
                (
                    code.to_string(),
                    AircraftInfo {
                        nato_name: nato.map(str::to_string),
                    },
                )
            })
            .collect();
        Self { planes }
    }

    /// Loads a `{ "<type>": { "natoName": "..." } }` JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            planes: serde_json::from_str(json)?,
        })
    }

    pub fn insert(&mut self, type_code: impl Into<String>, info: AircraftInfo) {
        self.planes.insert(type_code.into(), info);
    }

    pub fn get(&self, type_code: &str) -> Option<&AircraftInfo> {
        self.planes.get(type_code)
    }

    pub fn contains(&self, type_code: &str) -> bool {
        self.planes.contains_key(type_code)
    }

    pub fn nato_name(&self, type_code: &str) -> Option<&str> {
        self.get(type_code)?.nato_name.as_deref()
    }
}

// ============================================================================
// NAME FORMATTER
// ============================================================================

/// Resolves the label shown for a contact.
pub struct NameFormatter<'a> {
    aircraft: &'a AircraftRegistry,
    track_ids: &'a TrackIdRegistry,
}

impl<'a> NameFormatter<'a> {
    pub fn new(aircraft: &'a AircraftRegistry, track_ids: &'a TrackIdRegistry) -> Self {
        Self { aircraft, track_ids }
    }

    pub fn track_id(&self, entity_id: EntityId) -> String {
        self.track_ids.track_id(entity_id)
    }

    /// `12345`, or `12345 (F-16C_50)` for a known airframe when types are shown.
    pub fn track_name(&self, entity: &Entity, show_aircraft_type: bool) -> String {
        let track_id = self.track_id(entity.id);
        if show_aircraft_type && !entity.name.is_empty() && self.aircraft.contains(&entity.name) {
            format!("{} ({})", track_id, entity.name)
        } else {
            track_id
        }
    }

    /// Callsign, then NATO name, then the plain track name.
    ///
    /// AI pilots are named after their group ("Enfield-1-1" in group
    /// "Enfield-1"), so a pilot starting with the group name is not
    /// treated as a callsign.
    pub fn detailed_track_name(&self, entity: &Entity, show_aircraft_type: bool) -> String {
        let type_suffix = || {
            if show_aircraft_type {
                format!(" ({})", entity.name)
            } else {
                String::new()
            }
        };

        if let Some(pilot) = entity.pilot.as_deref().filter(|p| !p.is_empty()) {
            if !pilot.starts_with(entity.group.as_str()) {
                return format!("{} {}{}", pilot, self.track_id(entity.id), type_suffix());
            }
        }

        if let Some(nato_name) = self.aircraft.nato_name(&entity.name) {
            return format!("{} {}{}", nato_name, self.track_id(entity.id), type_suffix());
        }

        self.track_name(entity, show_aircraft_type)
    }

    /// The label the operator sees: full detail for our side, the bare
    /// track id for anyone else.
    pub fn display_track_name(
        &self,
        entity: &Entity,
        user_coalition: &str,
        show_aircraft_type: bool,
    ) -> String {
        if entity.coalition == user_coalition {
            self.detailed_track_name(entity, show_aircraft_type)
        } else {
            self.track_id(entity.id)
        }
    }
}
