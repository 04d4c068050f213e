//! Geometry helpers shared by the GitLab adapters and the STAC layer.
//!
//! Projects declare their spatial extent either as a `[minx, miny, maxx, maxy]`
//! bounding box or as a WKT string; STAC search requests carry a bbox or a
//! GeoJSON geometry. Everything is normalized to [`geo::Geometry`].

use geo::{BoundingRect, Geometry, Intersects, Rect, coord};
use serde_json::Value;
use thiserror::Error;
use wkt::TryFromWkt;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("bbox must have 4 numbers, got {0}")]
    BboxLength(usize),

    #[error("bbox values must be numbers")]
    BboxValue,

    #[error("invalid WKT: {0}")]
    Wkt(String),

    #[error("invalid GeoJSON geometry: {0}")]
    GeoJson(String),
}

/// Polygon covering a `[minx, miny, maxx, maxy]` bounding box.
pub fn bbox2geom(bbox: &[f64]) -> Result<Geometry<f64>, GeometryError> {
    let [minx, miny, maxx, maxy] = bbox else {
        return Err(GeometryError::BboxLength(bbox.len()));
    };
    let rect = Rect::new(coord! { x: *minx, y: *miny }, coord! { x: *maxx, y: *maxy });
    Ok(Geometry::Polygon(rect.to_polygon()))
}

/// Bounding box polygon from a JSON array of numbers.
pub fn json_bbox2geom(value: &[Value]) -> Result<Geometry<f64>, GeometryError> {
    let numbers = value
        .iter()
        .map(|v| v.as_f64().ok_or(GeometryError::BboxValue))
        .collect::<Result<Vec<_>, _>>()?;
    bbox2geom(&numbers)
}

pub fn wkt2geom(wkt: &str) -> Result<Geometry<f64>, GeometryError> {
    Geometry::<f64>::try_from_wkt_str(wkt).map_err(|e| GeometryError::Wkt(e.to_string()))
}

pub fn geojson2geom(value: &Value) -> Result<Geometry<f64>, GeometryError> {
    let geometry = geojson::Geometry::from_json_value(value.clone())
        .map_err(|e| GeometryError::GeoJson(e.to_string()))?;
    Geometry::<f64>::try_from(geometry).map_err(|e| GeometryError::GeoJson(e.to_string()))
}

/// GeoJSON object of a geometry.
#[must_use]
pub fn to_geojson(geometry: &Geometry<f64>) -> Value {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    serde_json::to_value(geometry).unwrap_or(Value::Null)
}

/// `[minx, miny, maxx, maxy]` of a geometry, if it is not empty.
#[must_use]
pub fn bounds(geometry: &Geometry<f64>) -> Option<[f64; 4]> {
    let rect = geometry.bounding_rect()?;
    Some([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

#[must_use]
pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}
