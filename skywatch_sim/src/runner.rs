//! Scenario runner - executes overlay scenarios against the oracle.
//!
//! Every scenario drives the same pipeline as production:
//!
//! ```text
//!   Oracle ──► FeedSender ──► ChannelFeed ──► OverlayRuntime ──► TacticalPicture
//! ```
//!
//! and then checks the picture against ground truth.

use crate::context::SimContext;
use crate::exporter::{capture_frame, SimEvent, SimExport};
use crate::oracle::{ContactProfile, Oracle};
use crate::scenarios::ScenarioId;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skywatch_core::geodesy::LatLon;
use skywatch_core::{
    AircraftRegistry, EntityId, EntityMetadata, OverlayRuntime, PictureConfig, Settings,
    SettingsPatch, Store, TacticalPicture, Theater,
};
use skywatch_env::{ChannelFeed, FeedEvent, FeedSender, SkywatchContext};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of entities in the picture at end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Snapshots applied with their ping
    pub applied: u64,

    /// Snapshots whose ping was rejected as stale
    pub rejected: u64,

    /// Removals processed
    pub purged: u64,

    /// Snapshots held back and delivered late
    pub late_deliveries: u64,

    /// Worst speed estimate error against ground truth (percent)
    pub max_speed_error_pct: f64,
}

/// Runs overlay scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Feed rate in Hz
    tick_rate_hz: f64,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    /// Operator settings the picture starts from
    settings: Settings,

    /// Known airframes; the built-in table when unset
    aircraft: Option<AircraftRegistry>,

    /// Ticks between exported frames
    export_interval: u64,
}

type Check = Result<(), String>;

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 1.0,
            max_duration_secs: 60.0,
            settings: Settings::default(),
            aircraft: None,
            export_interval: 5,
        }
    }

    pub fn with_tick_rate(mut self, hz: f64) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_aircraft(mut self, aircraft: AircraftRegistry) -> Self {
        self.aircraft = Some(aircraft);
        self
    }

    pub fn with_export_interval(mut self, ticks: u64) -> Self {
        self.export_interval = ticks.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).await.0
    }

    /// Runs a scenario, also recording frames for replay.
    pub async fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true).await;
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    async fn execute(&self, scenario: ScenarioId, export: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("{}", scenario.description());

        let mut harness = Harness::new(self, scenario, export);
        let outcome = match scenario {
            ScenarioId::CapStation => run_cap_station(&mut harness).await,
            ScenarioId::ParkedRamp => run_parked_ramp(&mut harness).await,
            ScenarioId::Dateline => run_dateline(&mut harness).await,
            ScenarioId::Jitter => run_jitter(&mut harness, self.seed).await,
            ScenarioId::FogOfWar => run_fog_of_war(&mut harness).await,
        };

        let stats = harness.runtime.stats();
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            total_ticks: harness.tick,
            final_time_secs: harness.oracle.time(),
            final_entity_count: harness.picture().entities().len(),
            failure_reason: outcome.err(),
            metrics: ScenarioMetrics {
                applied: stats.applied,
                rejected: stats.rejected,
                purged: stats.purged,
                late_deliveries: harness.late_deliveries,
                max_speed_error_pct: harness.max_speed_error_pct,
            },
        };
        (result, harness.export)
    }
}

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    context: Arc<SimContext>,
    oracle: Oracle,
    sender: FeedSender,
    runtime: OverlayRuntime<SimContext, ChannelFeed>,
    dt: f64,
    ticks: u64,
    tick: u64,
    export: Option<SimExport>,
    export_interval: u64,
    pending_events: Vec<SimEvent>,
    /// Newest timestamp delivered per entity, to predict stale rejections
    newest_delivered: HashMap<u32, f64>,
    expected_rejections: u64,
    late_deliveries: u64,
    max_speed_error_pct: f64,
}

impl Harness {
    fn new(runner: &ScenarioRunner, scenario: ScenarioId, export: bool) -> Self {
        let context_seed = runner.seed;
        let physics_seed = runner.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let context = SimContext::shared(context_seed);
        let (sender, feed) = ChannelFeed::new(64);
        let mut picture = TacticalPicture::new(
            PictureConfig {
                track_id_seed: runner.seed,
                ..PictureConfig::default()
            },
            Store::new(runner.settings.clone()),
        );
        if let Some(aircraft) = &runner.aircraft {
            picture = picture.with_aircraft(aircraft.clone());
        }
        let runtime = OverlayRuntime::new(Arc::clone(&context), Arc::new(feed), picture);

        let tick_rate_hz = if runner.tick_rate_hz > 0.0 { runner.tick_rate_hz } else { 1.0 };
        let ticks = ((runner.max_duration_secs * tick_rate_hz).round() as u64).max(2);

        Self {
            context,
            oracle: Oracle::new(physics_seed),
            sender,
            runtime,
            dt: 1.0 / tick_rate_hz,
            ticks,
            tick: 0,
            export: export.then(|| SimExport::new(scenario.name(), runner.seed)),
            export_interval: runner.export_interval,
            pending_events: Vec::new(),
            newest_delivered: HashMap::new(),
            expected_rejections: 0,
            late_deliveries: 0,
            max_speed_error_pct: 0.0,
        }
    }

    fn picture(&self) -> &TacticalPicture {
        self.runtime.picture()
    }

    fn picture_mut(&mut self) -> &mut TacticalPicture {
        self.runtime.picture_mut()
    }

    /// Picks the map from the server reference point, as the overlay does
    /// on connect.
    fn detect_theater(&mut self, reference: LatLon) {
        match Theater::detect(reference.lat, reference.lon) {
            Ok(theater) => {
                info!("Map detected: {}", theater);
                if let Some(export) = self.export.as_mut() {
                    export.theater = Some(theater.to_string());
                }
                self.picture_mut().set_theater(theater);
            }
            Err(e) => debug!("{}", e),
        }
    }

    fn note(&mut self, message: String) {
        info!("  t={:.1}s | {}", self.oracle.time(), message);
        self.pending_events.push(SimEvent::info(message));
    }

    /// Sends one event through the feed and lets the runtime apply it.
    async fn deliver(&mut self, event: FeedEvent) -> Check {
        match &event {
            FeedEvent::Snapshot(snapshot) => {
                let newest = self
                    .newest_delivered
                    .entry(snapshot.id)
                    .or_insert(f64::NEG_INFINITY);
                if snapshot.timestamp < *newest {
                    self.expected_rejections += 1;
                } else {
                    *newest = snapshot.timestamp;
                }
            }
            FeedEvent::Removed(id) => {
                self.newest_delivered.remove(id);
            }
        }

        self.sender.send(event).await.map_err(|e| e.to_string())?;
        ensure(self.runtime.step().await, || "feed closed unexpectedly".to_string())
    }

    async fn publish(&mut self) -> Check {
        for event in self.oracle.feed_events() {
            self.deliver(event).await?;
        }
        Ok(())
    }

    async fn advance(&mut self) -> Check {
        self.oracle.step(self.dt).map_err(|e| e.to_string())?;
        self.context.sleep(Duration::from_secs_f64(self.dt)).await;
        self.tick += 1;
        Ok(())
    }

    fn capture(&mut self) {
        if self.tick % self.export_interval != 0 {
            return;
        }
        if let Some(export) = self.export.as_mut() {
            let truth = self.oracle.active_contacts();
            let frame = capture_frame(
                self.oracle.time(),
                &truth,
                self.runtime.picture(),
                std::mem::take(&mut self.pending_events),
            );
            export.add_frame(frame);
        }
        debug!(
            "  t={:.1}s | contacts={} | tracks={}",
            self.oracle.time(),
            self.oracle.active_contacts().len(),
            self.picture().tracks().track_count()
        );
    }

    fn elapsed_secs(&self) -> f64 {
        self.oracle.time()
    }

    /// Compares estimated speeds against ground truth for contacts moving
    /// at least `min_truth_knots`.
    fn check_speeds(&mut self, min_truth_knots: f64, tolerance_pct: f64) -> Check {
        let mut worst: f64 = 0.0;
        for contact in self.oracle.active_contacts() {
            let truth = contact.speed_knots();
            if truth < min_truth_knots {
                continue;
            }
            let estimate = self.runtime.picture().tracks().speed_of(EntityId(contact.id));
            ensure(estimate.is_finite(), || format!("non-finite speed for {}", contact.id))?;
            let error_pct = (estimate - truth).abs() / truth * 100.0;
            ensure(error_pct <= tolerance_pct, || {
                format!(
                    "speed of {} off by {:.2}% ({:.1} vs {:.1} kts)",
                    contact.id, error_pct, estimate, truth
                )
            })?;
            worst = worst.max(error_pct);
        }
        self.max_speed_error_pct = self.max_speed_error_pct.max(worst);
        Ok(())
    }

    fn check_trails(&self) -> Check {
        let picture = self.picture();
        let limit = picture.tracks().trail_length();
        for entity in picture.entities().iter() {
            let Some(track) = picture.tracks().tracks_of(entity.id) else {
                continue;
            };
            ensure(track.len() <= limit, || {
                format!("trail of {} has {} pings (limit {})", entity.id, track.len(), limit)
            })?;
            let timestamps: Vec<f64> = track.pings().map(|p| p.timestamp).collect();
            ensure(timestamps.windows(2).all(|w| w[0] <= w[1]), || {
                format!("trail of {} is out of order", entity.id)
            })?;
        }
        Ok(())
    }

    /// Each entity sits at its newest accepted ping, so late deliveries
    /// never move a contact backwards.
    fn check_positions(&self) -> Check {
        let picture = self.picture();
        for entity in picture.entities().iter() {
            let Some(newest) = picture.tracks().tracks_of(entity.id).and_then(|t| t.newest()) else {
                continue;
            };
            ensure(
                entity.latitude == newest.latitude && entity.longitude == newest.longitude,
                || format!("{} drawn away from its newest ping", entity.id),
            )?;
        }
        Ok(())
    }

    /// Opposing contacts show only their track number; our own show it
    /// alongside callsign or type.
    fn check_disclosure(&self) -> Check {
        let picture = self.picture();
        let coalition = picture.settings().with(|s| s.coalition.clone());
        let names = picture.names();
        let mut seen = HashSet::new();

        for entity in picture.entities().iter() {
            let label = picture.display_name(entity);
            let track_id = names.track_id(entity.id);
            ensure(track_id.len() == 5 && track_id.chars().all(|c| c.is_ascii_digit()), || {
                format!("malformed track id {:?}", track_id)
            })?;
            ensure(seen.insert(track_id.clone()), || format!("duplicate track id {}", track_id))?;

            if entity.coalition != coalition {
                ensure(label == track_id, || {
                    format!("{} contact {} disclosed as {:?}", entity.coalition, entity.id, label)
                })?;
            } else {
                ensure(label.contains(&track_id), || format!("{:?} lacks track id", label))?;
                let callsign = entity
                    .pilot
                    .as_deref()
                    .filter(|p| !p.is_empty() && !p.starts_with(entity.group.as_str()));
                if let Some(pilot) = callsign {
                    ensure(label.starts_with(pilot), || format!("{:?} lacks callsign {}", label, pilot))?;
                }
            }
        }
        Ok(())
    }

    fn check_rejections(&self) -> Check {
        let rejected = self.runtime.stats().rejected;
        ensure(rejected == self.expected_rejections, || {
            format!(
                "{} pings rejected, {} were stale",
                rejected, self.expected_rejections
            )
        })
    }
}

fn search_ids(harness: &Harness, query: &str) -> Vec<u32> {
    harness.picture().search(query).iter().map(|e| e.id.0).collect()
}

fn other_side(coalition: &str) -> &'static str {
    if coalition == "Allies" {
        "Enemies"
    } else {
        "Allies"
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// SIM-001: fighters and support aircraft orbit a CAP station.
///
/// **Assertion**: text, tag and watch queries return exactly the expected
/// contacts; speed estimates are within 2% of truth.
async fn run_cap_station(h: &mut Harness) -> Check {
    h.detect_theater(LatLon::new(39.0, 35.0));

    let station = LatLon::new(42.5, 41.5);
    let mut fighters = Vec::new();
    for (i, (name, pilot, group)) in [
        ("F-16C_50", "Colt 1-1", "Colt-1"),
        ("F-16C_50", "Colt 1-2", "Colt-1"),
        ("F/A-18C", "Jester", "Enfield-1"),
        ("F/A-18C", "Maverick", "Enfield-1"),
    ]
    .into_iter()
    .enumerate()
    {
        let start = LatLon::new(station.lat + 0.05 * i as f64, station.lon);
        fighters.push(h.oracle.spawn_contact(
            ContactProfile::air("Allies", name, start)
                .with_pilot(pilot)
                .with_group(group)
                .moving(90.0 * i as f64, 420.0)
                .turning(1.5),
        ));
    }
    h.oracle.spawn_contact(
        ContactProfile::air("Allies", "E-3A", LatLon::new(42.0, 40.5))
            .with_group("Overlord")
            .moving(0.0, 300.0)
            .turning(0.5),
    );
    let tanker = h.oracle.spawn_contact(
        ContactProfile::air("Allies", "KC-135", LatLon::new(42.2, 40.8))
            .with_pilot("Texaco 1-1")
            .with_group("Texaco")
            .moving(120.0, 280.0),
    );
    for i in 0..2 {
        h.oracle.spawn_contact(
            ContactProfile::air("Enemies", "Su-27", LatLon::new(43.2, 42.5 + 0.1 * i as f64))
                .with_group("Flanker-1")
                .with_pilot(&format!("Flanker-1-{}", i + 1))
                .moving(270.0, 400.0),
        );
    }

    h.publish().await?;
    for &id in &fighters {
        h.picture_mut().set_metadata(EntityId(id), EntityMetadata::new(["CAP"]));
    }
    h.picture_mut().set_watching(EntityId(fighters[0]), true);
    h.picture_mut().set_watching(EntityId(tanker), true);

    let midway = (h.ticks / 2).max(1);
    for tick in 1..=h.ticks {
        h.advance().await?;
        if tick == midway {
            h.oracle.remove_contact(tanker);
            h.note(format!("Tanker {} left the server", tanker));
        }
        h.publish().await?;
        h.capture();
    }

    ensure(search_ids(h, "colt").len() == 2, || "callsign search missed the Colt flight".to_string())?;
    ensure(search_ids(h, "f-16") == fighters[..2].to_vec(), || "type search missed the Vipers".to_string())?;
    ensure(search_ids(h, "@cap") == fighters, || "tag search did not return the CAP flight".to_string())?;
    ensure(search_ids(h, "@").is_empty(), || "bare tag query returned contacts".to_string())?;

    let watched: Vec<u32> = h.picture().watch_list().iter().map(|e| e.id.0).collect();
    ensure(watched == vec![fighters[0]], || format!("watch list is {:?}", watched))?;
    ensure(!h.picture().entities().contains(EntityId(tanker)), || "tanker not purged".to_string())?;
    ensure(h.runtime.stats().purged == 1, || "expected exactly one purge".to_string())?;

    h.check_speeds(50.0, 2.0)?;
    h.check_trails()?;
    h.check_rejections()
}

/// SIM-002: parked and taxiing aircraft, ships and SAM sites at a base.
///
/// **Assertion**: only aircraft above the relevance threshold are found;
/// ships are found at any speed; ground units follow the ground mode.
async fn run_parked_ramp(h: &mut Harness) -> Check {
    h.detect_theater(LatLon::new(30.0, 32.0));

    let ramp = LatLon::new(37.0, 35.42);
    for i in 0..3 {
        h.oracle.spawn_contact(
            ContactProfile::air("Allies", "F-15C", LatLon::new(ramp.lat, ramp.lon + 0.001 * i as f64))
                .with_pilot(&format!("Eagle 1-{}", i + 1))
                .with_group("Eagle-1"),
        );
    }
    for i in 0..2 {
        h.oracle.spawn_contact(
            ContactProfile::air("Enemies", "MiG-29S", LatLon::new(36.0, 37.0 + 0.001 * i as f64))
                .with_group("Fulcrum-1"),
        );
    }
    h.oracle.spawn_contact(
        ContactProfile::air("Allies", "A-10C_2", LatLon::new(ramp.lat + 0.01, ramp.lon))
            .with_pilot("Hawg 1-1")
            .with_group("Hawg-1")
            .moving(180.0, 15.0),
    );
    let departing = h.oracle.spawn_contact(
        ContactProfile::air("Allies", "F-15C", LatLon::new(ramp.lat - 0.01, ramp.lon))
            .with_pilot("Eagle 2-1")
            .with_group("Eagle-2")
            .moving(225.0, 160.0),
    );
    let carrier = h.oracle.spawn_contact(ContactProfile::sea("Allies", "CVN_71", LatLon::new(35.5, 34.0)));
    let amphib = h.oracle.spawn_contact(
        ContactProfile::sea("Allies", "LHA_Tarawa", LatLon::new(35.4, 34.2)).moving(90.0, 12.0),
    );
    h.oracle.spawn_contact(ContactProfile::ground("Allies", "Hawk ln", LatLon::new(37.01, 35.40)));
    h.oracle.spawn_contact(ContactProfile::ground("Enemies", "SA-11 Buk LN 9A310M1", LatLon::new(36.1, 37.1)));
    h.oracle.spawn_contact(ContactProfile::ground("Enemies", "SA-11 Buk SR 9S18M1", LatLon::new(36.1, 37.11)));

    h.publish().await?;
    for _ in 1..=h.ticks {
        h.advance().await?;
        h.publish().await?;
        h.capture();
    }

    ensure(search_ids(h, "f-15") == vec![departing], || "parked Eagles were not filtered".to_string())?;
    ensure(search_ids(h, "eagle") == vec![departing], || "callsign search kept parked Eagles".to_string())?;
    ensure(search_ids(h, "a-10").is_empty(), || "taxiing Hog passed the relevance filter".to_string())?;
    ensure(search_ids(h, "mig").is_empty(), || "parked Fulcrums passed the relevance filter".to_string())?;
    ensure(search_ids(h, "cvn") == vec![carrier], || "stationary carrier was filtered".to_string())?;
    ensure(search_ids(h, "tarawa") == vec![amphib], || "slow ship was filtered".to_string())?;
    ensure(search_ids(h, "hawk").is_empty(), || "ground unit matched a name search".to_string())?;

    let coalition = h.picture().settings().with(|s| s.coalition.clone());
    let count_visible_ground = |h: &Harness| {
        h.picture()
            .visible_entities()
            .iter()
            .filter(|e| e.has_category(&skywatch_core::Category::Ground))
            .map(|e| e.coalition.clone())
            .collect::<Vec<_>>()
    };

    let friendly_view = count_visible_ground(h);
    ensure(friendly_view.iter().all(|c| *c == coalition), || {
        format!("friendly mode shows {:?}", friendly_view)
    })?;

    h.picture().settings().update(SettingsPatch {
        ground_unit_mode: Some(skywatch_core::GroundUnitMode::Enemy),
        ..Default::default()
    });
    h.note("Ground unit mode switched to enemy".to_string());
    let enemy_view = count_visible_ground(h);
    ensure(enemy_view.iter().all(|c| *c != coalition), || format!("enemy mode shows {:?}", enemy_view))?;
    ensure(friendly_view.len() + enemy_view.len() == 3, || "ground units went missing".to_string())?;

    ensure(h.picture().visible_entities().len() == h.picture().entities().len() - friendly_view.len(), || {
        "air and sea contacts must always be visible".to_string()
    })?;

    h.check_speeds(100.0, 2.0)?;
    h.check_rejections()
}

/// SIM-003: contacts flying across the antimeridian.
///
/// **Assertion**: positions stay within [-180, 180], speeds stay accurate
/// across the wrap and rhumb bearings from the start point follow the
/// heading.
async fn run_dateline(h: &mut Harness) -> Check {
    // Reference point of no known map
    h.detect_theater(LatLon::new(10.0, 180.0));

    let starts = [
        (LatLon::new(10.0, 179.99), 90.0, 450.0),
        (LatLon::new(10.2, -179.99), 270.0, 480.0),
        (LatLon::new(60.0, 179.995), 45.0, 500.0),
    ];
    let mut ids = Vec::new();
    for (i, (start, heading, speed)) in starts.iter().enumerate() {
        ids.push(h.oracle.spawn_contact(
            ContactProfile::air("Allies", "F-16C_50", *start)
                .with_pilot(&format!("Dateline 1-{}", i + 1))
                .with_group("Dateline-1")
                .moving(*heading, *speed),
        ));
    }
    h.oracle.spawn_contact(ContactProfile::sea("Allies", "CVN_73", LatLon::new(10.1, 179.999)).moving(90.0, 20.0));

    h.publish().await?;
    for _ in 1..=h.ticks {
        h.advance().await?;
        h.publish().await?;
        h.capture();
        h.check_speeds(100.0, 2.0)?;
    }

    for entity in h.picture().entities().iter() {
        ensure((-180.0..=180.0).contains(&entity.longitude), || {
            format!("{} at longitude {}", entity.id, entity.longitude)
        })?;
    }

    if h.elapsed_secs() >= 10.0 {
        let crossed = |id: u32, east: bool| {
            h.picture()
                .entities()
                .get(EntityId(id))
                .map(|e| if east { e.longitude < 0.0 } else { e.longitude > 0.0 })
                .unwrap_or(false)
        };
        ensure(crossed(ids[0], true), || "eastbound contact never crossed 180°".to_string())?;
        ensure(crossed(ids[1], false), || "westbound contact never crossed 180°".to_string())?;
    }

    for (id, (start, heading, speed)) in ids.iter().zip(starts.iter()) {
        let braa = h
            .picture()
            .braa_to(*start, EntityId(*id))
            .ok_or_else(|| format!("{} missing from picture", id))?;
        ensure((0.0..360.0).contains(&braa.bearing_mag), || {
            format!("bearing {} out of range", braa.bearing_mag)
        })?;
        let off = ((braa.bearing_mag - heading + 540.0) % 360.0 - 180.0).abs();
        ensure(off < 1.0, || format!("bearing {:.2} vs heading {:.0}", braa.bearing_mag, heading))?;
        let flown_nm = speed * h.elapsed_secs() / 3600.0;
        ensure(braa.range_nm.is_finite() && braa.range_nm <= flown_nm * 1.02 + 0.01, || {
            format!("range {:.3} nm from start after flying {:.3} nm", braa.range_nm, flown_nm)
        })?;
    }

    h.check_trails()?;
    h.check_rejections()
}

/// SIM-004: noisy positions with a fifth of the feed delivered late.
///
/// **Assertion**: every stale ping is rejected (and only those); trails
/// stay ordered and bounded; speeds stay finite.
async fn run_jitter(h: &mut Harness, seed: u64) -> Check {
    h.detect_theater(LatLon::new(21.0, 50.0));
    h.oracle.set_position_noise(15.0).map_err(|e| e.to_string())?;

    let mut delivery_rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed_1a7e);
    for i in 0..6 {
        h.oracle.spawn_contact(
            ContactProfile::air("Allies", "F/A-18C", LatLon::new(25.0 + 0.1 * i as f64, 55.0))
                .with_pilot(&format!("Sting 1-{}", i + 1))
                .with_group("Sting-1")
                .moving(60.0 * i as f64, 350.0 + 30.0 * i as f64),
        );
    }
    for i in 0..2 {
        h.oracle.spawn_contact(
            ContactProfile::sea("Enemies", "MOLNIYA", LatLon::new(26.0, 56.0 + 0.1 * i as f64)).moving(300.0, 18.0),
        );
    }

    // (due tick, event)
    let mut held: Vec<(u64, FeedEvent)> = Vec::new();

    h.publish().await?;
    for tick in 1..=h.ticks {
        h.advance().await?;

        for event in h.oracle.feed_events() {
            if matches!(event, FeedEvent::Snapshot(_)) && delivery_rng.gen_bool(0.2) {
                let delay = delivery_rng.gen_range(1..=3);
                held.push((tick + delay, event));
            } else {
                h.deliver(event).await?;
            }
        }

        let (due, later): (Vec<_>, Vec<_>) = held.into_iter().partition(|(t, _)| *t <= tick);
        held = later;
        for (_, event) in due {
            h.late_deliveries += 1;
            h.deliver(event).await?;
        }

        h.capture();
        h.check_trails()?;
        h.check_positions()?;
    }
    if !held.is_empty() {
        debug!("{} delayed pings still in flight at end", held.len());
    }

    let top_speed = h
        .oracle
        .active_contacts()
        .iter()
        .map(|c| c.speed_knots())
        .fold(0.0, f64::max);
    for entity in h.picture().entities().iter() {
        let speed = h.picture().tracks().speed_of(entity.id);
        ensure(speed.is_finite() && speed < 2.0 * top_speed + 200.0, || {
            format!("implausible speed {:.1} kts for {}", speed, entity.id)
        })?;
    }

    if h.late_deliveries > 0 && h.runtime.stats().rejected == 0 {
        warn!("Late pings were delivered but none were stale");
    }
    h.check_rejections()
}

/// SIM-005: mixed coalitions with callsigns, AI-named pilots and known
/// airframes; the operator switches sides halfway through.
///
/// **Assertion**: an opposing contact is only ever labelled with its bare
/// track number, before and after the switch.
async fn run_fog_of_war(h: &mut Harness) -> Check {
    h.detect_theater(LatLon::new(39.0, 35.0));

    h.oracle.spawn_contact(
        ContactProfile::air("Allies", "F/A-18C", LatLon::new(42.0, 41.0))
            .with_pilot("Jester")
            .with_group("Enemies-1")
            .moving(45.0, 400.0),
    );
    h.oracle.spawn_contact(
        ContactProfile::air("Allies", "F-14B", LatLon::new(42.1, 41.0))
            .with_pilot("Enfield-1-1")
            .with_group("Enfield-1")
            .moving(45.0, 400.0),
    );
    h.oracle.spawn_contact(
        ContactProfile::air("Enemies", "Su-27", LatLon::new(43.0, 42.0))
            .with_pilot("Ivan")
            .with_group("Flanker-1")
            .moving(225.0, 420.0),
    );
    h.oracle.spawn_contact(
        ContactProfile::air("Enemies", "Su-27", LatLon::new(43.05, 42.0))
            .with_pilot("Flanker-1-2")
            .with_group("Flanker-1")
            .moving(225.0, 420.0),
    );
    h.oracle.spawn_contact(
        ContactProfile::air("Enemies", "MiG-29S", LatLon::new(43.1, 42.2)).with_group("Fulcrum-1").moving(200.0, 380.0),
    );
    h.oracle.spawn_contact(ContactProfile::sea("Enemies", "MOSCOW", LatLon::new(43.5, 39.0)).moving(90.0, 15.0));

    h.publish().await?;
    h.check_disclosure()?;

    let midway = (h.ticks / 2).max(1);
    for tick in 1..=h.ticks {
        h.advance().await?;
        if tick == midway {
            let coalition = h.picture().settings().with(|s| s.coalition.clone());
            let switched = other_side(&coalition);
            h.picture().settings().update(SettingsPatch {
                coalition: Some(switched.to_string()),
                ..Default::default()
            });
            h.note(format!("Operator switched to {}", switched));
        }
        h.publish().await?;
        h.capture();
        h.check_disclosure()?;
    }

    // Enemy callsigns stay searchable even though labels hide them
    ensure(search_ids(h, "ivan").len() == 1, || "callsign search must ignore disclosure".to_string())?;
    let rows = h.picture().search_rows("ivan");
    let coalition = h.picture().settings().with(|s| s.coalition.clone());
    if coalition == "Allies" {
        ensure(rows.iter().all(|r| !r.label.contains("Ivan")), || "search row leaked a callsign".to_string())?;
    }

    h.check_speeds(100.0, 2.0)?;
    h.check_rejections()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(seed: u64) -> ScenarioRunner {
        ScenarioRunner::new(seed).with_duration(30.0)
    }

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        for scenario in ScenarioId::all() {
            let result = runner(42).run(scenario).await;
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
            assert_eq!(result.total_ticks, 30);
        }
    }

    #[tokio::test]
    async fn test_scenarios_pass_for_enemy_operator() {
        let settings = Settings {
            coalition: "Enemies".to_string(),
            ..Settings::default()
        };
        for scenario in [ScenarioId::FogOfWar, ScenarioId::ParkedRamp] {
            let result = runner(7).with_settings(settings.clone()).run(scenario).await;
            assert!(result.passed, "{} failed: {:?}", scenario, result.failure_reason);
        }
    }

    #[tokio::test]
    async fn test_jitter_rejects_late_pings() {
        let result = runner(1).with_duration(60.0).run(ScenarioId::Jitter).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.late_deliveries > 0);
        assert!(result.metrics.rejected > 0);
        assert!(result.metrics.rejected <= result.metrics.late_deliveries);
    }

    #[tokio::test]
    async fn test_custom_aircraft_registry() {
        let aircraft = AircraftRegistry::from_json(r#"{ "Su-27": { "natoName": "Flanker" } }"#).unwrap();
        let settings = Settings {
            coalition: "Enemies".to_string(),
            ..Settings::default()
        };
        let result = runner(13)
            .with_aircraft(aircraft)
            .with_settings(settings)
            .run(ScenarioId::FogOfWar)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);

        let result = runner(13).with_aircraft(AircraftRegistry::new()).run(ScenarioId::FogOfWar).await;
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[tokio::test]
    async fn test_cap_station_metrics() {
        let result = runner(3).run(ScenarioId::CapStation).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.purged, 1);
        assert_eq!(result.metrics.rejected, 0);
        assert!(result.metrics.max_speed_error_pct < 2.0);
        // Eight contacts spawned, the tanker purged
        assert_eq!(result.final_entity_count, 7);
    }

    #[tokio::test]
    async fn test_faster_feed_keeps_estimates() {
        let result = runner(11).with_tick_rate(4.0).with_duration(10.0).run(ScenarioId::CapStation).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 40);
        assert!((result.final_time_secs - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_same_seed_same_result() {
        let a = runner(99).run(ScenarioId::Jitter).await;
        let b = runner(99).run(ScenarioId::Jitter).await;
        assert_eq!(a.metrics.rejected, b.metrics.rejected);
        assert_eq!(a.metrics.late_deliveries, b.metrics.late_deliveries);
        assert_eq!(a.metrics.max_speed_error_pct, b.metrics.max_speed_error_pct);
    }

    #[tokio::test]
    async fn test_export_records_frames() {
        let (result, export) = runner(5)
            .with_export_interval(10)
            .run_with_export(ScenarioId::FogOfWar)
            .await;
        assert!(result.passed);
        assert_eq!(export.frames.len(), 3);
        assert_eq!(export.theater.as_deref(), Some("Caucasus"));
        assert!(export.passed);
        assert!(export.frames.iter().any(|f| !f.events.is_empty()));
    }
}
