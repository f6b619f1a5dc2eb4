use std::collections::HashMap;

use serde_json::{json, Value};

use crate::geo::coordinate::Coordinate;

use super::classifier::{CategoryId, Rgb};

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    MultiLineString(Vec<Vec<Coordinate>>),
}

impl Geometry {
    /// Every drawable line of the geometry; points yield nothing.
    pub fn lines(&self) -> Vec<&[Coordinate]> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::LineString(line) => vec![line.as_slice()],
            Geometry::MultiLineString(lines) => lines.iter().map(Vec::as_slice).collect(),
        }
    }

    pub fn to_geojson(&self) -> Value {
        match self {
            Geometry::Point(point) => json!({ "type": "Point", "coordinates": point.lon_lat() }),
            Geometry::LineString(points) => json!({ "type": "LineString", "coordinates": line_coordinates(points) }),
            Geometry::MultiLineString(lines) => json!({
                "type": "MultiLineString",
                "coordinates": lines.iter().map(|l| line_coordinates(l)).collect::<Vec<_>>(),
            }),
        }
    }
}

fn line_coordinates(points: &[Coordinate]) -> Vec<[f64; 2]> {
    points.iter().map(Coordinate::lon_lat).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    String(String),
    Double(f64),
    Bool(bool),
}

impl FeatureValue {
    pub fn as_string(&self) -> Option<&String> {
        match self {
            FeatureValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<&f64> {
        match self {
            FeatureValue::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&bool> {
        match self {
            FeatureValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FeatureValue::String(v) => json!(v),
            FeatureValue::Double(v) => json!(v),
            FeatureValue::Bool(v) => json!(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: HashMap<String, FeatureValue>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: FeatureValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(FeatureValue::as_string).map(String::as_str)
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(FeatureValue::as_double).copied()
    }

    pub fn get_name(&self) -> &str {
        self.get_string("name").unwrap_or("")
    }
}

/// Renderer-agnostic set of features, the unit a map source is replaced with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|feature| {
                let properties: serde_json::Map<String, Value> = feature
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!({
                    "type": "Feature",
                    "geometry": feature.geometry.to_geojson(),
                    "properties": properties,
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintValue {
    Number(f64),
    Color(Rgb),
}

impl PaintValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PaintValue::Number(n) => Some(*n),
            PaintValue::Color(_) => None,
        }
    }
}

/// A data-driven paint value, evaluated per feature.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintExpression {
    Literal(PaintValue),
    /// Reads a feature property (numbers, or `#rrggbb` strings as colors).
    Get(String),
    Match {
        property: String,
        cases: Vec<(String, PaintExpression)>,
        fallback: Box<PaintExpression>,
    },
}

impl PaintExpression {
    pub fn get(property: &str) -> Self {
        PaintExpression::Get(property.to_string())
    }

    pub fn match_category(id: &CategoryId, matched: PaintExpression, fallback: PaintExpression) -> Self {
        PaintExpression::Match {
            property: "category".to_string(),
            cases: vec![(id.as_str().to_string(), matched)],
            fallback: Box::new(fallback),
        }
    }

    pub fn evaluate(&self, properties: &HashMap<String, FeatureValue>) -> Option<PaintValue> {
        match self {
            PaintExpression::Literal(value) => Some(*value),
            PaintExpression::Get(key) => match properties.get(key)? {
                FeatureValue::Double(v) => Some(PaintValue::Number(*v)),
                FeatureValue::String(v) => parse_hex(v).map(PaintValue::Color),
                FeatureValue::Bool(_) => None,
            },
            PaintExpression::Match {
                property,
                cases,
                fallback,
            } => {
                let value = properties.get(property).and_then(FeatureValue::as_string);
                cases
                    .iter()
                    .find(|(case, _)| Some(case) == value)
                    .map_or(fallback.as_ref(), |(_, expression)| expression)
                    .evaluate(properties)
            }
        }
    }

    /// MapLibre style-spec form of the expression.
    pub fn to_json(&self) -> Value {
        match self {
            PaintExpression::Literal(PaintValue::Number(n)) => json!(n),
            PaintExpression::Literal(PaintValue::Color(c)) => json!(c.to_hex()),
            PaintExpression::Get(key) => json!(["get", key]),
            PaintExpression::Match {
                property,
                cases,
                fallback,
            } => {
                let mut expression = vec![json!("match"), json!(["get", property])];
                for (case, value) in cases {
                    expression.push(json!(case));
                    expression.push(value.to_json());
                }
                expression.push(fallback.to_json());
                Value::Array(expression)
            }
        }
    }
}

fn parse_hex(value: &str) -> Option<Rgb> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(category: &str) -> Feature {
        Feature::new(Geometry::MultiLineString(vec![vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)]]))
            .with("category", FeatureValue::String(category.into()))
            .with("color", FeatureValue::String("#f4a261".into()))
            .with("width", FeatureValue::Double(2.5))
    }

    #[test]
    fn get_reads_numbers_and_colors() {
        let feature = route("long");
        assert_eq!(
            PaintExpression::get("width").evaluate(&feature.properties),
            Some(PaintValue::Number(2.5))
        );
        assert_eq!(
            PaintExpression::get("color").evaluate(&feature.properties),
            Some(PaintValue::Color(Rgb::new(0xf4, 0xa2, 0x61)))
        );
        assert_eq!(PaintExpression::get("missing").evaluate(&feature.properties), None);
    }

    #[test]
    fn match_falls_back_for_other_categories() {
        let expression = PaintExpression::match_category(
            &CategoryId::new("long"),
            PaintExpression::Literal(PaintValue::Number(1.0)),
            PaintExpression::Literal(PaintValue::Number(0.1)),
        );
        assert_eq!(expression.evaluate(&route("long").properties), Some(PaintValue::Number(1.0)));
        assert_eq!(expression.evaluate(&route("short").properties), Some(PaintValue::Number(0.1)));
    }

    #[test]
    fn match_serialises_like_maplibre() {
        let expression = PaintExpression::match_category(
            &CategoryId::new("long"),
            PaintExpression::Literal(PaintValue::Number(1.0)),
            PaintExpression::get("opacity"),
        );
        assert_eq!(
            expression.to_json(),
            json!(["match", ["get", "category"], "long", 1.0, ["get", "opacity"]])
        );
    }

    #[test]
    fn geojson_uses_lon_lat_order() {
        let collection = FeatureCollection::new(vec![
            Feature::new(Geometry::Point(Coordinate::new(48.85, 2.35))).with("name", FeatureValue::String("Paris".into())),
        ]);
        let geojson = collection.to_geojson();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"][0]["geometry"]["coordinates"], json!([2.35, 48.85]));
        assert_eq!(geojson["features"][0]["properties"]["name"], "Paris");
    }

    #[test]
    fn multi_line_geometry_exposes_every_line() {
        let geometry = Geometry::MultiLineString(vec![
            vec![Coordinate::new(0.0, 179.0)],
            vec![Coordinate::new(0.0, -179.0), Coordinate::new(0.0, -178.0)],
        ]);
        assert_eq!(geometry.lines().len(), 2);
        assert!(Geometry::Point(Coordinate::default()).lines().is_empty());
    }
}
