//! Ground truth oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of the simulated airspace:
//! - True positions, headings and speeds of all contacts
//! - Kinematics (positions advanced along the ellipsoid by `project_point`)
//! - Feed generation (snapshots with optional Gaussian position noise)

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};
use skywatch_core::geodesy::{project_point, GeodesyError, LatLon};
use skywatch_env::{EntitySnapshot, FeedEvent};
use std::collections::BTreeMap;

const METERS_PER_NM: f64 = 1852.0;
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Description of a contact to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub coalition: String,
    pub types: Vec<String>,
    pub name: String,
    pub pilot: Option<String>,
    pub group: String,
    pub position: LatLon,
    pub heading_deg: f64,
    pub speed_knots: f64,
    /// Heading change in degrees per second (positive turns right)
    pub turn_rate_deg_s: f64,
}

impl ContactProfile {
    fn new(category: &str, coalition: &str, name: &str, position: LatLon) -> Self {
        Self {
            coalition: coalition.to_string(),
            types: vec![category.to_string()],
            name: name.to_string(),
            pilot: None,
            group: String::new(),
            position,
            heading_deg: 0.0,
            speed_knots: 0.0,
            turn_rate_deg_s: 0.0,
        }
    }

    pub fn air(coalition: &str, name: &str, position: LatLon) -> Self {
        Self::new("Air", coalition, name, position)
    }

    pub fn sea(coalition: &str, name: &str, position: LatLon) -> Self {
        Self::new("Sea", coalition, name, position)
    }

    pub fn ground(coalition: &str, name: &str, position: LatLon) -> Self {
        Self::new("Ground", coalition, name, position)
    }

    pub fn with_pilot(mut self, pilot: &str) -> Self {
        self.pilot = Some(pilot.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn moving(mut self, heading_deg: f64, speed_knots: f64) -> Self {
        self.heading_deg = heading_deg;
        self.speed_knots = speed_knots;
        self
    }

    pub fn turning(mut self, turn_rate_deg_s: f64) -> Self {
        self.turn_rate_deg_s = turn_rate_deg_s;
        self
    }
}

/// A ground truth contact in the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthContact {
    /// Unique entity ID
    pub id: u32,

    pub profile: ContactProfile,

    /// Contact is active (not destroyed/removed)
    pub active: bool,
}

impl GroundTruthContact {
    pub fn position(&self) -> LatLon {
        self.profile.position
    }

    pub fn speed_knots(&self) -> f64 {
        self.profile.speed_knots
    }
}

/// The Oracle - maintains ground truth and generates feed events.
pub struct Oracle {
    /// RNG for physics (noise, random events)
    physics_rng: ChaCha8Rng,

    /// All ground truth contacts, by id
    contacts: BTreeMap<u32, GroundTruthContact>,

    /// Next entity ID
    next_id: u32,

    /// Current simulation time (seconds)
    current_time: f64,

    /// Position noise in meters (none by default)
    position_noise: Option<Normal<f64>>,

    /// Removals not yet reported on the feed
    pending_removals: Vec<u32>,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    pub fn new(physics_seed: u64) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            contacts: BTreeMap::new(),
            next_id: 16_777_217,
            current_time: 0.0,
            position_noise: None,
            pending_removals: Vec::new(),
        }
    }

    /// Sets the position noise standard deviation in meters (0 disables).
    pub fn set_position_noise(&mut self, std_dev_m: f64) -> Result<(), NormalError> {
        self.position_noise = if std_dev_m == 0.0 {
            None
        } else {
            Some(Normal::new(0.0, std_dev_m)?)
        };
        Ok(())
    }

    /// Spawns a new contact and returns its ID.
    pub fn spawn_contact(&mut self, profile: ContactProfile) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.contacts.insert(
            id,
            GroundTruthContact {
                id,
                profile,
                active: true,
            },
        );
        id
    }

    /// Removes a contact; the next `feed_events` reports it gone.
    pub fn remove_contact(&mut self, id: u32) -> bool {
        match self.contacts.get_mut(&id) {
            Some(contact) if contact.active => {
                contact.active = false;
                self.pending_removals.push(id);
                true
            }
            _ => false,
        }
    }

    /// Advances kinematics by dt seconds.
    pub fn step(&mut self, dt: f64) -> Result<(), GeodesyError> {
        self.current_time += dt;

        for contact in self.contacts.values_mut().filter(|c| c.active) {
            let profile = &mut contact.profile;
            if profile.speed_knots > 0.0 {
                let distance_m = profile.speed_knots * METERS_PER_NM / 3600.0 * dt;
                profile.position = project_point(profile.position, profile.heading_deg, distance_m)?;
            }
            profile.heading_deg = (profile.heading_deg + profile.turn_rate_deg_s * dt).rem_euclid(360.0);
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.current_time
    }

    /// Returns all active contacts, in id order.
    pub fn active_contacts(&self) -> Vec<&GroundTruthContact> {
        self.contacts.values().filter(|c| c.active).collect()
    }

    pub fn contact(&self, id: u32) -> Option<&GroundTruthContact> {
        self.contacts.get(&id)
    }

    /// Generates a (possibly noisy) snapshot of one contact.
    pub fn snapshot(&mut self, id: u32) -> Option<EntitySnapshot> {
        let contact = self.contacts.get(&id).filter(|c| c.active)?;
        let profile = &contact.profile;

        let mut position = profile.position;
        if let Some(noise) = &self.position_noise {
            let north_m = noise.sample(&mut self.physics_rng);
            let east_m = noise.sample(&mut self.physics_rng);
            position = offset_meters(position, north_m, east_m);
        }

        Some(EntitySnapshot {
            id,
            coalition: profile.coalition.clone(),
            types: profile.types.clone(),
            name: profile.name.clone(),
            pilot: profile.pilot.clone(),
            group: profile.group.clone(),
            latitude: position.lat,
            longitude: position.lon,
            timestamp: self.current_time,
        })
    }

    /// Pending removals, then one snapshot per active contact.
    pub fn feed_events(&mut self) -> Vec<FeedEvent> {
        let mut events: Vec<FeedEvent> = self
            .pending_removals
            .drain(..)
            .map(FeedEvent::Removed)
            .collect();

        let ids: Vec<u32> = self
            .contacts
            .values()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();
        events.extend(
            ids.into_iter()
                .filter_map(|id| self.snapshot(id))
                .map(FeedEvent::Snapshot),
        );
        events
    }
}

/// Small flat-earth offset, enough for sensor noise of a few meters.
fn offset_meters(position: LatLon, north_m: f64, east_m: f64) -> LatLon {
    let lat = (position.lat + north_m / METERS_PER_DEGREE).clamp(-90.0, 90.0);
    let cos_lat = position.lat.to_radians().cos().max(1e-6);
    let mut lon = position.lon + east_m / (METERS_PER_DEGREE * cos_lat);
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    LatLon::new(lat, lon)
}
