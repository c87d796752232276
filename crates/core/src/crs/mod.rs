//! Coordinate Reference System handling
//!
//! Grids and boundary data in this toolkit live in projected metric systems.
//! Only the reprojections that are closed-form are supported: the Swiss
//! LV03/LV95 false-origin shift and WGS84 / Web Mercator. Anything else is a
//! [`Error::CrsMismatch`] that the caller must resolve upstream.

use geo::{Coord, Geometry, MapCoords};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::error::{Error, Result};

/// Semi-major axis of the WGS84 ellipsoid, as used by Web Mercator
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// LV95 false easting/northing minus LV03 false easting/northing
const LV95_SHIFT: (f64, f64) = (2_000_000.0, 1_000_000.0);

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse an identifier such as `"EPSG:2056"` or `"epsg:4326"`.
    ///
    /// Strings starting with `+proj` are kept as PROJ strings, anything else
    /// is treated as WKT.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if let Some(code) = trimmed
            .split_once(':')
            .filter(|(auth, _)| auth.eq_ignore_ascii_case("epsg"))
            .and_then(|(_, code)| code.trim().parse::<u32>().ok())
        {
            return Self::from_epsg(code);
        }
        if trimmed.starts_with("+proj") {
            return Self::from_proj(trimmed);
        }
        Self::from_wkt(trimmed)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Swiss CH1903 / LV03 (EPSG:21781)
    pub fn lv03() -> Self {
        Self::from_epsg(21781)
    }

    /// Swiss CH1903+ / LV95 (EPSG:2056)
    pub fn lv95() -> Self {
        Self::from_epsg(2056)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison is imperfect but the best available without PROJ
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }

    /// Build the transformation from `self` into `target`.
    pub fn reprojection_to(&self, target: &CRS) -> Result<Reprojection> {
        if self.is_equivalent(target) {
            return Ok(Reprojection::Identity);
        }
        match (self.epsg, target.epsg) {
            (Some(21781), Some(2056)) => Ok(Reprojection::Shift {
                dx: LV95_SHIFT.0,
                dy: LV95_SHIFT.1,
            }),
            (Some(2056), Some(21781)) => Ok(Reprojection::Shift {
                dx: -LV95_SHIFT.0,
                dy: -LV95_SHIFT.1,
            }),
            (Some(4326), Some(3857)) => Ok(Reprojection::GeographicToMercator),
            (Some(3857), Some(4326)) => Ok(Reprojection::MercatorToGeographic),
            _ => Err(Error::CrsMismatch(self.identifier(), target.identifier())),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// A closed-form coordinate transformation between two supported CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reprojection {
    Identity,
    /// Pure translation (LV03 <-> LV95)
    Shift { dx: f64, dy: f64 },
    /// EPSG:4326 (lon, lat degrees) to EPSG:3857 metres
    GeographicToMercator,
    /// EPSG:3857 metres to EPSG:4326 (lon, lat degrees)
    MercatorToGeographic,
}

impl Reprojection {
    /// Transform a single coordinate
    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        match *self {
            Reprojection::Identity => c,
            Reprojection::Shift { dx, dy } => Coord {
                x: c.x + dx,
                y: c.y + dy,
            },
            Reprojection::GeographicToMercator => {
                let lat = c.y.clamp(-85.051_128_78, 85.051_128_78).to_radians();
                Coord {
                    x: WEB_MERCATOR_RADIUS * c.x.to_radians(),
                    y: WEB_MERCATOR_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
                }
            }
            Reprojection::MercatorToGeographic => Coord {
                x: (c.x / WEB_MERCATOR_RADIUS).to_degrees(),
                y: (2.0 * (c.y / WEB_MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
            },
        }
    }

    /// Transform every coordinate of a geometry
    pub fn apply_geometry(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        if *self == Reprojection::Identity {
            return geom.clone();
        }
        let this = *self;
        geom.map_coords(move |c| this.apply(c))
    }

    pub fn is_identity(&self) -> bool {
        *self == Reprojection::Identity
    }
}
