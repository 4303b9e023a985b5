//! Coordinate Reference Systems
//! Detection of the CRS declared by a GeoJSON file and reprojection to WGS84.

use geo::{Coord, Geometry, MapCoordsInPlace};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// WGS84 semi-major axis used by spherical Web Mercator (meters)
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

#[derive(Error, Debug)]
pub enum CrsError {
    #[error("Reprojection from {0} is not supported without the proj-transforms feature")]
    Unsupported(String),
    #[error("PROJ error: {0}")]
    Proj(String),
}

/// Source coordinate reference system of a boundary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// Geographic lon/lat degrees (EPSG:4326, OGC CRS84)
    Wgs84,
    /// Spherical Web Mercator meters (EPSG:3857)
    WebMercator,
    /// Any other EPSG code
    Epsg(u32),
    /// A name that is not an EPSG or OGC identifier
    Unknown(String),
}

impl Default for Crs {
    fn default() -> Self {
        // RFC 7946 coordinates are always WGS84
        Crs::Wgs84
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Unknown(name) => write!(f, "{}", name),
        }
    }
}

impl Crs {
    /// Parse a CRS name such as `urn:ogc:def:crs:EPSG::3857` or `EPSG:4326`.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
            return Crs::Wgs84;
        }

        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG"))
            .and_then(|tail| tail.parse::<u32>().ok());

        match code {
            Some(4326) => Crs::Wgs84,
            Some(3857) | Some(900913) | Some(3785) => Crs::WebMercator,
            Some(code) => Crs::Epsg(code),
            None => Crs::Unknown(trimmed.to_string()),
        }
    }

    /// Read the legacy `crs` member of a GeoJSON object.
    ///
    /// Returns the WGS84 default when the member is absent or malformed.
    pub fn from_geojson_member(member: Option<&JsonValue>) -> Self {
        member
            .and_then(|crs| crs.get("properties"))
            .and_then(|props| props.get("name"))
            .and_then(JsonValue::as_str)
            .map(Self::from_name)
            .unwrap_or_default()
    }

    pub fn is_wgs84(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    /// Reproject a geometry in place from this CRS to WGS84 lon/lat.
    pub fn reproject_to_wgs84(&self, geometry: &mut Geometry<f64>) -> Result<(), CrsError> {
        match self {
            Crs::Wgs84 => Ok(()),
            Crs::WebMercator => {
                geometry.map_coords_in_place(web_mercator_to_wgs84);
                Ok(())
            }
            Crs::Epsg(code) => reproject_epsg(*code, geometry),
            Crs::Unknown(name) => Err(CrsError::Unsupported(name.clone())),
        }
    }
}

/// Inverse spherical Mercator: meters to lon/lat degrees.
pub fn web_mercator_to_wgs84(coord: Coord<f64>) -> Coord<f64> {
    let lon = (coord.x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (coord.y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    Coord { x: lon, y: lat }
}

#[cfg(feature = "proj-transforms")]
fn reproject_epsg(code: u32, geometry: &mut Geometry<f64>) -> Result<(), CrsError> {
    use proj::Proj;

    let source = format!("EPSG:{}", code);
    let transformer = Proj::new_known_crs(&source, "EPSG:4326", None)
        .map_err(|e| CrsError::Proj(e.to_string()))?;

    geometry.try_map_coords_in_place(|coord| {
        transformer
            .convert((coord.x, coord.y))
            .map(|(x, y)| Coord { x, y })
            .map_err(|e| CrsError::Proj(e.to_string()))
    })
}

#[cfg(not(feature = "proj-transforms"))]
fn reproject_epsg(code: u32, _geometry: &mut Geometry<f64>) -> Result<(), CrsError> {
    Err(CrsError::Unsupported(format!("EPSG:{}", code)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, Point};
    use serde_json::json;

    #[test]
    fn parses_common_crs_names() {
        assert_eq!(Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84"), Crs::Wgs84);
        assert_eq!(Crs::from_name("EPSG:4326"), Crs::Wgs84);
        assert_eq!(Crs::from_name("urn:ogc:def:crs:EPSG::3857"), Crs::WebMercator);
        assert_eq!(Crs::from_name("urn:ogc:def:crs:EPSG::22185"), Crs::Epsg(22185));
        assert_eq!(
            Crs::from_name("my-local-grid"),
            Crs::Unknown("my-local-grid".to_string())
        );
    }

    #[test]
    fn missing_member_defaults_to_wgs84() {
        assert_eq!(Crs::from_geojson_member(None), Crs::Wgs84);
        let member = json!({"type": "name", "properties": {"name": "EPSG:3857"}});
        assert_eq!(Crs::from_geojson_member(Some(&member)), Crs::WebMercator);
    }

    #[test]
    fn inverse_web_mercator_recovers_degrees() {
        // Buenos Aires, roughly
        let mut geometry = Geometry::Point(point!(x: -6_484_000.0, y: -4_110_000.0));
        Crs::WebMercator.reproject_to_wgs84(&mut geometry).unwrap();

        let Geometry::Point(Point(coord)) = geometry else {
            panic!("geometry kind changed");
        };
        assert!((coord.x - -58.247).abs() < 0.001, "lon was {}", coord.x);
        assert!((coord.y - -34.603).abs() < 0.001, "lat was {}", coord.y);
    }

    #[test]
    fn wgs84_is_left_untouched() {
        let mut geometry = Geometry::Point(point!(x: -63.6, y: -40.4));
        Crs::Wgs84.reproject_to_wgs84(&mut geometry).unwrap();
        assert_eq!(geometry, Geometry::Point(point!(x: -63.6, y: -40.4)));
    }

    #[cfg(not(feature = "proj-transforms"))]
    #[test]
    fn other_epsg_codes_need_proj() {
        let mut geometry = Geometry::Point(point!(x: 5_500_000.0, y: 6_000_000.0));
        let err = Crs::Epsg(22185).reproject_to_wgs84(&mut geometry).unwrap_err();
        assert!(matches!(err, CrsError::Unsupported(_)));
    }
}
