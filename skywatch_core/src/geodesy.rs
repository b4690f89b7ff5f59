//! The "GEODESY" Library - Navigation math for the tactical picture
//!
//! Pure, reentrant functions used by every other engine:
//! - Ellipsoidal direct projection (Vincenty, WGS-84) for range/bearing lines
//! - Rhumb-line bearings (Mercator log-tangent) and magnetic adjustment
//! - Spherical great-circle distance (haversine, 6371 km) in nautical miles
//! - Compass points and coordinate strings for callouts
//!
//! The distance and projection functions deliberately use different earth
//! models (sphere vs ellipsoid). Existing callers depend on both, so they
//! agree only to within a fraction of a percent.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ============================================================================
// CONSTANTS
// ============================================================================

/// WGS-84 semi-major axis (meters)
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS-84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS-84 semi-minor axis (meters)
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

/// Mean earth radius used by the haversine distance (kilometers)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers to nautical miles
pub const KM_TO_NM: f64 = 0.539957;

/// Vincenty convergence threshold on successive sigma estimates (radians)
pub const VINCENTY_EPSILON: f64 = 1e-12;

/// Hard cap on Vincenty iterations before reporting non-convergence
pub const MAX_VINCENTY_ITERATIONS: usize = 1000;

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

// ============================================================================
// TYPES
// ============================================================================

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Bearing/range part of a BRAA callout.
///
/// Altitude and aspect come from the entity feed, not from this library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Braa {
    /// Magnetic bearing in degrees [0, 360)
    pub bearing_mag: f64,

    /// Great-circle range in nautical miles
    pub range_nm: f64,

    /// 16-point compass label of the magnetic bearing
    pub cardinal: &'static str,
}

// ============================================================================
// DIRECT PROJECTION (Vincenty)
// ============================================================================

/// Projects a point `distance_m` meters along `bearing_deg` from `start`.
///
/// Solves the direct geodesic problem on the WGS-84 ellipsoid with
/// Vincenty's iterative formula. The returned longitude is wrapped to
/// [-180, 180].
///
/// # Errors
/// * `GeodesyError::InvalidInput` - any argument is NaN or infinite
/// * `GeodesyError::NonConvergence` - sigma did not settle within
///   `MAX_VINCENTY_ITERATIONS`
pub fn project_point(
    start: LatLon,
    bearing_deg: f64,
    distance_m: f64,
) -> Result<LatLon, GeodesyError> {
    project_point_bounded(start, bearing_deg, distance_m, MAX_VINCENTY_ITERATIONS)
}

/// `project_point` with an explicit iteration cap.
pub fn project_point_bounded(
    start: LatLon,
    bearing_deg: f64,
    distance_m: f64,
    max_iterations: usize,
) -> Result<LatLon, GeodesyError> {
    if !start.is_finite() || !bearing_deg.is_finite() || !distance_m.is_finite() {
        return Err(GeodesyError::InvalidInput(format!(
            "start={start}, bearing={bearing_deg}, distance={distance_m}"
        )));
    }

    let (a, b, f) = (WGS84_A, WGS84_B, WGS84_F);
    let s = distance_m;

    let alpha1 = bearing_deg.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - f) * start.lat.to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);

    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let mut sigma = s / (b * big_a);
    let mut sigma_p = 2.0 * PI;
    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut cos_2sigma_m = 0.0;
    let mut iterations = 0;

    while (sigma - sigma_p).abs() > VINCENTY_EPSILON {
        if iterations >= max_iterations {
            return Err(GeodesyError::NonConvergence { iterations });
        }
        iterations += 1;

        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();

        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        sigma_p = sigma;
        sigma = s / (b * big_a) + delta_sigma;
    }

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    let big_l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    Ok(LatLon::new(
        lat2.to_degrees(),
        wrap_longitude(start.lon + big_l.to_degrees()),
    ))
}

fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

// ============================================================================
// BEARINGS
// ============================================================================

/// Rhumb-line (constant heading) bearing from `start` to `end`, in [0, 360).
///
/// The longitude delta is re-wrapped to the short way round, so a contact
/// just across the antimeridian reads as a small easterly/westerly step.
pub fn initial_bearing(start: LatLon, end: LatLon) -> f64 {
    let lat1 = start.lat.to_radians();
    let lat2 = end.lat.to_radians();
    let mut d_lon = (end.lon - start.lon).to_radians();

    let d_phi = ((lat2 / 2.0 + PI / 4.0).tan() / (lat1 / 2.0 + PI / 4.0).tan()).ln();

    if d_lon.abs() > PI {
        if d_lon > 0.0 {
            d_lon = -(2.0 * PI - d_lon);
        } else {
            d_lon += 2.0 * PI;
        }
    }

    normalize_bearing(d_lon.atan2(d_phi).to_degrees())
}

/// True bearing adjusted by a magnetic declination, in [0, 360).
///
/// Inputs are assumed to be within one revolution of range, so the result
/// is wrapped by a single add/subtract of 360.
pub fn magnetic_bearing(start: LatLon, end: LatLon, declination_deg: f64) -> f64 {
    wrap_once(initial_bearing(start, end) + declination_deg)
}

pub(crate) fn wrap_once(bearing: f64) -> f64 {
    if bearing >= 360.0 {
        bearing - 360.0
    } else if bearing < 0.0 {
        bearing + 360.0
    } else {
        bearing
    }
}

fn normalize_bearing(deg: f64) -> f64 {
    let b = (deg + 360.0) % 360.0;
    if b >= 360.0 {
        0.0
    } else {
        b
    }
}

/// Nearest of the 16 compass points for a bearing in degrees.
///
/// Halfway cases round up (348.75 reads as "N", 11.25 as "NNE"). Negative
/// bearings are normalised into [0, 360) first.
pub fn cardinal(bearing_deg: f64) -> &'static str {
    let index = (bearing_deg.rem_euclid(360.0) / 22.5).round() as i64;
    CARDINALS[index.rem_euclid(16) as usize]
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Great-circle distance in nautical miles (haversine on a 6371 km sphere).
pub fn great_circle_distance_nm(start: LatLon, end: LatLon) -> f64 {
    let d_lat = (end.lat - start.lat).to_radians();
    let d_lon = (end.lon - start.lon).to_radians();
    let lat1 = start.lat.to_radians();
    let lat2 = end.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * KM_TO_NM
}

/// Bearing and range from `from` to `to` for a BRAA callout.
pub fn braa(from: LatLon, to: LatLon, declination_deg: f64) -> Braa {
    let bearing_mag = magnetic_bearing(from, to, declination_deg);
    Braa {
        bearing_mag,
        range_nm: great_circle_distance_nm(from, to),
        cardinal: cardinal(bearing_mag),
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

fn degrees_minutes_seconds(coordinate: f64, width: usize) -> String {
    let absolute = coordinate.abs();
    let degrees = absolute.floor();
    let minutes_untruncated = (absolute - degrees) * 60.0;
    let minutes = minutes_untruncated.floor();
    let seconds = ((minutes_untruncated - minutes) * 60.0).floor();

    format!(
        "{:0width$}°{:02}'{:02}\"",
        degrees as u32,
        minutes as u32,
        seconds as u32,
        width = width
    )
}

fn degrees_decimal_minutes(coordinate: f64, width: usize) -> String {
    let absolute = coordinate.abs();
    let degrees = absolute.floor();
    let minutes = (absolute - degrees) * 60.0;

    format!("{:0width$}°{:.5}", degrees as u32, minutes, width = width)
}

fn hemispheres(position: LatLon) -> (char, char) {
    (
        if position.lat >= 0.0 { 'N' } else { 'S' },
        if position.lon >= 0.0 { 'E' } else { 'W' },
    )
}

/// Degrees-minutes-seconds, e.g. `N36°30'00" W115°15'00"`.
pub fn format_dms(position: LatLon) -> String {
    let (ns, ew) = hemispheres(position);
    format!(
        "{}{} {}{}",
        ns,
        degrees_minutes_seconds(position.lat, 2),
        ew,
        degrees_minutes_seconds(position.lon, 3)
    )
}

/// Degrees-decimal-minutes, e.g. `N36°30.00000 W115°15.00000`.
pub fn format_ddm(position: LatLon) -> String {
    let (ns, ew) = hemispheres(position);
    format!(
        "{}{} {}{}",
        ns,
        degrees_decimal_minutes(position.lat, 2),
        ew,
        degrees_decimal_minutes(position.lon, 3)
    )
}

/// Elapsed-time counter as `HH:MM:SS`.
pub fn format_counter(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds - hours * 3600) / 60;
    let out_seconds = seconds - hours * 3600 - minutes * 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, out_seconds)
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised by the geodesy library.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeodesyError {
    #[error("Vincenty projection did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("Invalid geodesic input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn meters_to_nm(m: f64) -> f64 {
        m / 1000.0 * KM_TO_NM
    }

    #[test]
    fn test_cardinal_boundaries() {
        assert_eq!(cardinal(0.0), "N");
        assert_eq!(cardinal(360.0), "N");
        assert_eq!(cardinal(22.5), "NNE");
        assert_eq!(cardinal(348.75), "N");
        assert_eq!(cardinal(11.25), "NNE");
        assert_eq!(cardinal(90.0), "E");
        assert_eq!(cardinal(200.0), "SSW");
    }

    #[test]
    fn test_cardinal_negative_bearings_round_up() {
        assert_eq!(cardinal(-11.25), "N");
        assert_eq!(cardinal(-22.5), "NNW");
        assert_eq!(cardinal(-90.0), "W");
        assert_eq!(cardinal(-360.0), "N");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = LatLon::new(0.0, 0.0);
        assert_relative_eq!(initial_bearing(origin, LatLon::new(1.0, 0.0)), 0.0, epsilon = 1e-9);
        assert_relative_eq!(initial_bearing(origin, LatLon::new(0.0, 1.0)), 90.0, epsilon = 1e-9);
        assert_relative_eq!(initial_bearing(origin, LatLon::new(-1.0, 0.0)), 180.0, epsilon = 1e-9);
        assert_relative_eq!(initial_bearing(origin, LatLon::new(0.0, -1.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bearing_wraps_across_antimeridian() {
        // 2° of longitude east across the dateline, not 358° west
        let east = initial_bearing(LatLon::new(0.0, 179.0), LatLon::new(0.0, -179.0));
        assert_relative_eq!(east, 90.0, epsilon = 1e-9);

        let west = initial_bearing(LatLon::new(10.0, -179.5), LatLon::new(10.0, 179.5));
        assert_relative_eq!(west, 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bearing_stays_in_range() {
        let b = initial_bearing(LatLon::new(42.0, 41.0), LatLon::new(42.0, 41.0));
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn test_magnetic_bearing_wraps_once() {
        let origin = LatLon::new(0.0, 0.0);
        let north = LatLon::new(1.0, 0.0);
        let west = LatLon::new(0.0, -1.0);

        assert_relative_eq!(magnetic_bearing(origin, north, -6.0), 354.0, epsilon = 1e-9);
        assert_relative_eq!(magnetic_bearing(origin, west, 95.0), 5.0, epsilon = 1e-9);
        assert_relative_eq!(magnetic_bearing(origin, west, 90.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_great_circle_distance_one_degree_of_latitude() {
        let d = great_circle_distance_nm(LatLon::new(0.0, 0.0), LatLon::new(1.0, 0.0));
        let expected = EARTH_RADIUS_KM * 1f64.to_radians() * KM_TO_NM;
        assert_relative_eq!(d, expected, epsilon = 1e-9);
        assert_relative_eq!(d, 60.04, epsilon = 0.01);
    }

    #[test]
    fn test_great_circle_distance_symmetric_and_zero() {
        let a = LatLon::new(41.6, 41.6);
        let b = LatLon::new(43.2, 44.9);
        assert_relative_eq!(great_circle_distance_nm(a, b), great_circle_distance_nm(b, a), epsilon = 1e-9);
        assert_eq!(great_circle_distance_nm(a, a), 0.0);
    }

    #[test]
    fn test_project_point_zero_distance_is_identity() {
        let start = LatLon::new(36.2, -115.0);
        let p = project_point(start, 45.0, 0.0).unwrap();
        assert_relative_eq!(p.lat, start.lat, epsilon = 1e-9);
        assert_relative_eq!(p.lon, start.lon, epsilon = 1e-9);
    }

    #[test]
    fn test_project_point_due_north_along_meridian() {
        // One degree of latitude at the equator is ~110.574 km on WGS-84
        let p = project_point(LatLon::new(0.0, 0.0), 0.0, 110_574.0).unwrap();
        assert_relative_eq!(p.lat, 1.0, epsilon = 1e-3);
        assert_relative_eq!(p.lon, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_point_wraps_longitude() {
        let p = project_point(LatLon::new(0.0, 179.9), 90.0, 50_000.0).unwrap();
        assert!(p.lon < -179.0 && p.lon >= -180.0, "lon = {}", p.lon);
    }

    #[test]
    fn test_project_point_mid_latitude_within_tight_band() {
        let start = LatLon::new(45.0, 7.0);
        let p = project_point(start, 0.0, 100_000.0).unwrap();
        let d = great_circle_distance_nm(start, p);
        let expected = meters_to_nm(100_000.0);
        assert!((d - expected).abs() / expected < 0.001, "d={d} expected={expected}");
    }

    #[test]
    fn test_project_point_rejects_non_finite() {
        let result = project_point(LatLon::new(f64::NAN, 0.0), 0.0, 1000.0);
        assert!(matches!(result, Err(GeodesyError::InvalidInput(_))));

        let result = project_point(LatLon::new(0.0, 0.0), 0.0, f64::INFINITY);
        assert!(matches!(result, Err(GeodesyError::InvalidInput(_))));
    }

    #[test]
    fn test_project_point_reports_non_convergence() {
        let result = project_point_bounded(LatLon::new(10.0, 20.0), 30.0, 500_000.0, 1);
        assert_eq!(result, Err(GeodesyError::NonConvergence { iterations: 1 }));

        // The same leg converges well inside the default cap
        assert!(project_point(LatLon::new(10.0, 20.0), 30.0, 500_000.0).is_ok());
    }

    #[test]
    fn test_braa_combines_bearing_and_range() {
        let call = braa(LatLon::new(0.0, 0.0), LatLon::new(1.0, 0.0), 6.0);
        assert_relative_eq!(call.bearing_mag, 6.0, epsilon = 1e-9);
        assert_relative_eq!(call.range_nm, 60.04, epsilon = 0.01);
        assert_eq!(call.cardinal, "N");
    }

    #[test]
    fn test_format_dms() {
        assert_eq!(format_dms(LatLon::new(36.5, -115.25)), "N36°30'00\" W115°15'00\"");
        assert_eq!(format_dms(LatLon::new(-5.0, 7.0)), "S05°00'00\" E007°00'00\"");
    }

    #[test]
    fn test_format_ddm() {
        assert_eq!(format_ddm(LatLon::new(36.5, -115.25)), "N36°30.00000 W115°15.00000");
        assert_eq!(format_ddm(LatLon::new(-5.0, 7.0)), "S05°0.00000 E007°0.00000");
    }

    #[test]
    fn test_format_counter() {
        assert_eq!(format_counter(0), "00:00:00");
        assert_eq!(format_counter(59), "00:00:59");
        assert_eq!(format_counter(3661), "01:01:01");
        assert_eq!(format_counter(36_000), "10:00:00");
    }

    proptest! {
        // Northbound legs at mid latitudes, where the sphere and the
        // ellipsoid agree to better than 0.1%.
        #[test]
        fn prop_round_trip_mid_latitude_meridional(
            lat in 43.0f64..48.0,
            lon in -180.0f64..180.0,
            bearing in -15.0f64..15.0,
            distance in 1_000.0f64..300_000.0,
        ) {
            let start = LatLon::new(lat, lon);
            let end = project_point(start, bearing, distance).unwrap();
            let expected = meters_to_nm(distance);
            let actual = great_circle_distance_nm(start, end);
            prop_assert!((actual - expected).abs() / expected < 0.001,
                "actual={} expected={}", actual, expected);
        }

        // Anywhere on the globe the two models stay within the sphere's
        // flattening error (< 0.7%).
        #[test]
        fn prop_round_trip_any_heading(
            lat in -80.0f64..80.0,
            lon in -180.0f64..180.0,
            bearing in 0.0f64..360.0,
            distance in 1_000.0f64..1_000_000.0,
        ) {
            let start = LatLon::new(lat, lon);
            let end = project_point(start, bearing, distance).unwrap();
            let expected = meters_to_nm(distance);
            let actual = great_circle_distance_nm(start, end);
            prop_assert!((actual - expected).abs() / expected < 0.007,
                "actual={} expected={}", actual, expected);
        }

        #[test]
        fn prop_bearing_in_range(
            lat1 in -85.0f64..85.0, lon1 in -180.0f64..180.0,
            lat2 in -85.0f64..85.0, lon2 in -180.0f64..180.0,
        ) {
            let b = initial_bearing(LatLon::new(lat1, lon1), LatLon::new(lat2, lon2));
            prop_assert!((0.0..360.0).contains(&b), "bearing={}", b);
        }
    }
}
