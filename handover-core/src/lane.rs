//! Resolve demand lanes to stable map coordinates.
//!
//! Lanes such as `store:PUNE:WAKAD` carry no coordinates of their own. The
//! resolver pins each lane near its city centroid using a hash-derived offset,
//! so a given lane lands on the same point in every process without any
//! stored geometry.

use std::f64::consts::PI;

use geo::Coord;
use sha2::{Digest, Sha256};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude used for the offset approximation.
const KM_PER_DEGREE: f64 = 111.0;

/// Requesters further than this from their lane's city anchor on themselves.
const CITY_MISMATCH_KM: f64 = 200.0;

/// Smallest and largest offset radius applied to city-based anchors.
const MIN_OFFSET_KM: f64 = 1.0;
const MAX_OFFSET_KM: f64 = 8.0;

/// Cities with a known centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum City {
    /// Pune, the default city.
    Pune,
    /// Bengaluru (also spelled Bangalore).
    #[cfg_attr(feature = "serde", serde(alias = "BANGALORE"))]
    Bengaluru,
    /// Delhi.
    Delhi,
    /// Hyderabad.
    Hyderabad,
}

impl City {
    /// Match a case-insensitive city token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "PUNE" => Some(Self::Pune),
            "BENGALURU" | "BANGALORE" => Some(Self::Bengaluru),
            "DELHI" => Some(Self::Delhi),
            "HYDERABAD" => Some(Self::Hyderabad),
            _ => None,
        }
    }

    /// Upper-case name used in lane identifiers and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pune => "PUNE",
            Self::Bengaluru => "BENGALURU",
            Self::Delhi => "DELHI",
            Self::Hyderabad => "HYDERABAD",
        }
    }

    /// Centroid as a coordinate with `x = longitude`, `y = latitude`.
    #[must_use]
    pub const fn centroid(self) -> Coord<f64> {
        match self {
            Self::Pune => Coord {
                x: 73.8567,
                y: 18.5204,
            },
            Self::Bengaluru => Coord {
                x: 77.5946,
                y: 12.9716,
            },
            Self::Delhi => Coord {
                x: 77.2090,
                y: 28.6139,
            },
            Self::Hyderabad => Coord {
                x: 78.4867,
                y: 17.3850,
            },
        }
    }

    /// City named by a `<kind>:<city>[:<name>]` lane identifier.
    #[must_use]
    pub fn of_lane(lane_id: &str) -> Option<Self> {
        lane_city_token(lane_id).and_then(Self::from_token)
    }
}

/// City token of a structured lane; `None` for free-text lanes.
fn lane_city_token(lane_id: &str) -> Option<&str> {
    let mut parts = lane_id.split(':');
    let (Some(kind), Some(city)) = (parts.next(), parts.next()) else {
        return None;
    };
    if kind.trim().is_empty() {
        return None;
    }
    Some(city)
}

/// How a [`LaneAnchor`] was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSource {
    /// Structured lane: city, requester or default base with a
    /// deterministic per-lane offset.
    StableOffset,
    /// Free-text lane: requester position or the default city centre,
    /// without offset.
    Fallback,
}

impl AnchorSource {
    /// Stable tag recorded alongside the anchor.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::StableOffset => "store:stable_offset",
            Self::Fallback => "fallback:rider_or_city",
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AnchorSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// A lane resolved to a point on the map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LaneAnchor {
    /// Lane identifier that was resolved.
    pub lane_id: String,
    /// Anchor point (`x = longitude`, `y = latitude`).
    pub position: Coord<f64>,
    /// Derivation of the anchor.
    pub source: AnchorSource,
}

/// Resolves lane identifiers to [`LaneAnchor`]s.
///
/// # Examples
///
/// ```
/// use handover_core::{AnchorSource, City, LaneAnchorResolver, haversine_km};
///
/// let resolver = LaneAnchorResolver::default();
/// let anchor = resolver.resolve("store:PUNE:WAKAD", None);
/// assert_eq!(anchor.source, AnchorSource::StableOffset);
/// let offset = haversine_km(anchor.position, City::Pune.centroid());
/// assert!((0.9..=8.1).contains(&offset));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LaneAnchorResolver {
    default_city: City,
}

impl Default for LaneAnchorResolver {
    fn default() -> Self {
        Self::new(City::Pune)
    }
}

impl LaneAnchorResolver {
    /// Create a resolver that falls back to `default_city`.
    #[must_use]
    pub const fn new(default_city: City) -> Self {
        Self { default_city }
    }

    /// Resolve `lane_id`, optionally biased by the requester's position.
    ///
    /// Structured lanes (`<kind>:<city>[:<name>]`) are offset from the city
    /// centroid, or from the requester position (else the default city
    /// centre) when the city is unknown. Never fails: free-text lanes fall
    /// back to the requester position or the default city centre.
    #[must_use]
    pub fn resolve(&self, lane_id: &str, requester: Option<Coord<f64>>) -> LaneAnchor {
        let Some(token) = lane_city_token(lane_id) else {
            return LaneAnchor {
                lane_id: lane_id.to_owned(),
                position: requester.unwrap_or_else(|| self.default_city.centroid()),
                source: AnchorSource::Fallback,
            };
        };

        let base = match (City::from_token(token).map(City::centroid), requester) {
            (Some(centroid), Some(position))
                if haversine_km(position, centroid) > CITY_MISMATCH_KM =>
            {
                position
            }
            (Some(centroid), _) => centroid,
            (None, Some(position)) => position,
            (None, None) => self.default_city.centroid(),
        };

        let radius_unit = stable_unit_interval(&format!("{lane_id}:r"));
        let radius_km = MIN_OFFSET_KM + (MAX_OFFSET_KM - MIN_OFFSET_KM) * radius_unit;
        let turns = stable_unit_interval(&format!("{lane_id}:a"));
        LaneAnchor {
            lane_id: lane_id.to_owned(),
            position: offset_km(base, radius_km, turns),
            source: AnchorSource::StableOffset,
        }
    }
}

/// Map `seed` deterministically into `[0, 1)`.
///
/// Uses the first 32 bits of the SHA-256 digest, reduced modulo 10⁷.
#[must_use]
pub fn stable_unit_interval(seed: &str) -> f64 {
    const BUCKETS: u32 = 10_000_000;
    let digest = Sha256::digest(seed.as_bytes());
    let prefix = digest
        .as_slice()
        .first_chunk::<4>()
        .map_or(0, |bytes| u32::from_be_bytes(*bytes));
    f64::from(prefix % BUCKETS) / f64::from(BUCKETS)
}

/// Move `base` by `radius_km` along the bearing `turns` (fraction of a circle).
fn offset_km(base: Coord<f64>, radius_km: f64, turns: f64) -> Coord<f64> {
    let angle = 2.0 * PI * turns;
    let dlat = radius_km * angle.cos() / KM_PER_DEGREE;
    let dlon = radius_km * angle.sin() / (KM_PER_DEGREE * base.y.to_radians().cos().max(0.2));
    Coord {
        x: base.x + dlon,
        y: base.y + dlat,
    }
}

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dlat = (b.y - a.y).to_radians();
    let dlon = (b.x - a.x).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.y.to_radians().cos() * b.y.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}
