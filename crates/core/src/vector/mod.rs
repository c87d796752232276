//! Vector features: geometry plus attributes
//!
//! Observation sources (contours, isohypses) and boundary geometry are both
//! handed over as a [`FeatureCollection`]. Algorithms only read features;
//! reprojection produces a new collection.

use geo_types::{Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crs::CRS;
use crate::error::Result;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value. Strings are parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Null | AttributeValue::Bool(_) => None,
        }
    }

    /// Whether the value is stored as a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeValue::Int(_) | AttributeValue::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.set_property(key, value.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Line parts of the geometry. Polygons contribute their rings.
    pub fn lines(&self) -> Vec<LineString<f64>> {
        self.geometry.as_ref().map(flatten_lines).unwrap_or_default()
    }

    /// Polygon parts of the geometry
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        self.geometry.as_ref().map(flatten_polygons).unwrap_or_default()
    }
}

/// Collection of features sharing one CRS
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Features matching `filter` (all features when `filter` is `None`)
    pub fn filtered(&self, filter: Option<&FeatureFilter>) -> FeatureCollection {
        FeatureCollection {
            features: self
                .features
                .iter()
                .filter(|f| filter.map_or(true, |flt| flt.matches(f)))
                .cloned()
                .collect(),
            crs: self.crs.clone(),
        }
    }

    /// Reproject into `target`.
    ///
    /// A collection without CRS is assumed to already be in `target`.
    pub fn to_crs(&self, target: &CRS) -> Result<FeatureCollection> {
        let reprojection = match &self.crs {
            Some(crs) => crs.reprojection_to(target)?,
            None => return Ok(FeatureCollection {
                features: self.features.clone(),
                crs: Some(target.clone()),
            }),
        };
        let features = self
            .features
            .iter()
            .map(|f| Feature {
                geometry: f.geometry.as_ref().map(|g| reprojection.apply_geometry(g)),
                properties: f.properties.clone(),
                id: f.id.clone(),
            })
            .collect();
        Ok(FeatureCollection {
            features,
            crs: Some(target.clone()),
        })
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
            crs: None,
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Selects features whose attribute equals a value (case-insensitive for
/// strings), e.g. `FeatureFilter::new("side", "west")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFilter {
    pub attribute: String,
    pub value: String,
}

impl FeatureFilter {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        match feature.get_property(&self.attribute) {
            Some(AttributeValue::String(s)) => s.trim().eq_ignore_ascii_case(self.value.trim()),
            Some(AttributeValue::Int(v)) => {
                self.value.trim().parse::<i64>().map_or(false, |x| x == *v)
            }
            Some(AttributeValue::Float(v)) => {
                self.value.trim().parse::<f64>().map_or(false, |x| x == *v)
            }
            Some(AttributeValue::Bool(b)) => {
                self.value.trim().parse::<bool>().map_or(false, |x| x == *b)
            }
            Some(AttributeValue::Null) | None => false,
        }
    }
}

/// Line parts of a geometry, descending into collections
pub fn flatten_lines(geom: &Geometry<f64>) -> Vec<LineString<f64>> {
    match geom {
        Geometry::LineString(ls) => vec![ls.clone()],
        Geometry::Line(l) => vec![LineString::from(vec![l.start, l.end])],
        Geometry::MultiLineString(mls) => mls.0.clone(),
        Geometry::Polygon(p) => polygon_rings(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().flat_map(polygon_rings).collect(),
        Geometry::Rect(r) => polygon_rings(&r.to_polygon()),
        Geometry::Triangle(t) => polygon_rings(&t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(flatten_lines).collect(),
        Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
    }
}

/// Polygon parts of a geometry, descending into collections
pub fn flatten_polygons(geom: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geom {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(flatten_polygons).collect(),
        _ => Vec::new(),
    }
}

fn polygon_rings(p: &Polygon<f64>) -> Vec<LineString<f64>> {
    std::iter::once(p.exterior().clone())
        .chain(p.interiors().iter().cloned())
        .collect()
}
