//! Theater (map) detection and per-map magnetic declination.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geodesy::{initial_bearing, wrap_once, LatLon};

/// The maps the overlay knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theater {
    Caucasus,
    Syria,
    PersianGulf,
    Marianas,
}

impl Theater {
    pub fn all() -> [Theater; 4] {
        [
            Theater::Syria,
            Theater::Caucasus,
            Theater::PersianGulf,
            Theater::Marianas,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theater::Caucasus => "Caucasus",
            Theater::Syria => "Syria",
            Theater::PersianGulf => "PersianGulf",
            Theater::Marianas => "Marianas",
        }
    }

    /// Magnetic declination in degrees (east positive).
    pub fn magnetic_declination(&self) -> f64 {
        match self {
            Theater::Caucasus => 6.0,
            Theater::Syria => 5.0,
            Theater::PersianGulf => 2.0,
            Theater::Marianas => -2.0,
        }
    }

    /// Inclusive (lat, lon) box the server's reference point falls in.
    fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        match self {
            Theater::Syria => ((28.0, 32.0), (29.0, 35.0)),
            Theater::Caucasus => ((37.0, 41.0), (31.0, 39.0)),
            Theater::PersianGulf => ((18.0, 24.0), (48.0, 54.0)),
            Theater::Marianas => ((5.0, 14.0), (136.0, 144.0)),
        }
    }

    /// Identifies the map from the server's reference latitude/longitude.
    pub fn detect(ref_lat: f64, ref_lon: f64) -> Result<Theater, TheaterError> {
        let found = Theater::all().into_iter().find(|theater| {
            let ((lat_min, lat_max), (lon_min, lon_max)) = theater.bounds();
            (lat_min..=lat_max).contains(&ref_lat) && (lon_min..=lon_max).contains(&ref_lon)
        });

        found.ok_or_else(|| {
            warn!("Failed to detect map from reference point ({}, {})", ref_lat, ref_lon);
            TheaterError::Undetected {
                lat: ref_lat,
                lon: ref_lon,
            }
        })
    }

    /// Magnetic bearing as read on this map's kneeboard: the true bearing
    /// rounded to a whole degree, then corrected for declination.
    pub fn magnetic_bearing(&self, start: LatLon, end: LatLon) -> f64 {
        wrap_once(initial_bearing(start, end).round() + self.magnetic_declination())
    }
}

impl std::fmt::Display for Theater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Theater {
    type Err = TheaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "caucasus" => Ok(Theater::Caucasus),
            "syria" => Ok(Theater::Syria),
            "persiangulf" | "persian_gulf" => Ok(Theater::PersianGulf),
            "marianas" => Ok(Theater::Marianas),
            _ => Err(TheaterError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TheaterError {
    #[error("Failed to detect map from reference point ({lat}, {lon})")]
    Undetected { lat: f64, lon: f64 },

    #[error("Unknown theater: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_detect_known_maps() {
        assert_eq!(Theater::detect(40.0, 35.0), Ok(Theater::Caucasus));
        assert_eq!(Theater::detect(30.0, 32.0), Ok(Theater::Syria));
        assert_eq!(Theater::detect(21.0, 50.0), Ok(Theater::PersianGulf));
        assert_eq!(Theater::detect(13.0, 144.0), Ok(Theater::Marianas));
    }

    #[test]
    fn test_detect_bounds_are_inclusive() {
        assert_eq!(Theater::detect(28.0, 29.0), Ok(Theater::Syria));
        assert_eq!(Theater::detect(41.0, 39.0), Ok(Theater::Caucasus));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(
            Theater::detect(36.2, -115.0),
            Err(TheaterError::Undetected {
                lat: 36.2,
                lon: -115.0
            })
        );
    }

    #[test]
    fn test_parse_theater() {
        assert_eq!("Caucasus".parse::<Theater>(), Ok(Theater::Caucasus));
        assert_eq!("persian_gulf".parse::<Theater>(), Ok(Theater::PersianGulf));
        assert!("Nevada".parse::<Theater>().is_err());
    }

    #[test]
    fn test_map_magnetic_bearing() {
        let origin = LatLon::new(42.0, 42.0);
        let north = LatLon::new(43.0, 42.0);
        assert_relative_eq!(Theater::Caucasus.magnetic_bearing(origin, north), 6.0, epsilon = 1e-9);
        assert_relative_eq!(Theater::Marianas.magnetic_bearing(origin, north), 358.0, epsilon = 1e-9);
    }
}
