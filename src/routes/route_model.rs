use std::sync::Arc;

use log::{debug, info};

use crate::error::RouteError;
use crate::geo::coordinate::Coordinate;
use crate::geo::great_circle::{distance_km, interpolate_great_circle, split_at_antimeridian};

use super::catalog::{Capital, CapitalCatalog};
use super::classifier::{CategoryId, DistanceCategory, DistanceClassifier, LineStyle};
use super::features::{Feature, FeatureCollection, FeatureValue, Geometry};

/// Great-circle route from the origin to one other capital.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcFeature {
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub category: CategoryId,
    /// The sampled great circle, split wherever it crosses the antimeridian.
    pub segments: Vec<Vec<Coordinate>>,
}

impl ArcFeature {
    pub fn polyline(&self) -> impl Iterator<Item = &Coordinate> {
        self.segments.iter().flatten()
    }
}

/// Writes the route properties a renderer needs, style included.
pub fn route_feature(geometry: Geometry, origin: &str, destination: &str, distance_km: f64, category: &DistanceCategory, style: LineStyle) -> Feature {
    Feature::new(geometry)
        .with("origin", FeatureValue::String(origin.to_string()))
        .with("destination", FeatureValue::String(destination.to_string()))
        .with("distance_km", FeatureValue::Double(distance_km))
        .with("category", FeatureValue::String(category.id.as_str().to_string()))
        .with("label", FeatureValue::String(category.label.clone()))
        .with("color", FeatureValue::String(style.color.to_hex()))
        .with("width", FeatureValue::Double(style.width as f64))
        .with("opacity", FeatureValue::Double(style.opacity as f64))
}

/// The selected origin and the routes radiating from it.
#[derive(Debug, Clone)]
pub struct RouteModel {
    catalog: Arc<CapitalCatalog>,
    classifier: Arc<DistanceClassifier>,
    steps: usize,
    origin: Capital,
    arcs: Arc<[ArcFeature]>,
}

impl RouteModel {
    pub fn new(catalog: Arc<CapitalCatalog>, classifier: Arc<DistanceClassifier>, origin: &str, steps: usize) -> Result<Self, RouteError> {
        if steps == 0 {
            return Err(RouteError::InvalidArgument("arc steps must be at least 1".into()));
        }
        let origin = catalog.find(origin)?.clone();
        let arcs = build_arcs(&catalog, &classifier, &origin, steps)?;
        info!("Routes initialised from {} ({} arcs)", origin.name, arcs.len());
        Ok(Self {
            catalog,
            classifier,
            steps,
            origin,
            arcs,
        })
    }

    pub fn catalog(&self) -> &Arc<CapitalCatalog> {
        &self.catalog
    }

    pub fn classifier(&self) -> &Arc<DistanceClassifier> {
        &self.classifier
    }

    pub fn origin(&self) -> &Capital {
        &self.origin
    }

    pub fn arcs(&self) -> &Arc<[ArcFeature]> {
        &self.arcs
    }

    /// Moves the origin to `name` and rebuilds every arc.
    ///
    /// Returns `Ok(false)` without touching the arcs when `name` is already the
    /// origin. Unknown names are `NotFound`.
    pub fn set_origin(&mut self, name: &str) -> Result<bool, RouteError> {
        let capital = self.catalog.find(name)?;
        if capital.name == self.origin.name {
            debug!("{} is already the origin", name);
            return Ok(false);
        }

        let capital = capital.clone();
        let arcs = build_arcs(&self.catalog, &self.classifier, &capital, self.steps)?;
        info!("Origin changed from {} to {}", self.origin.name, capital.name);
        self.origin = capital;
        self.arcs = arcs;
        Ok(true)
    }

    pub fn arc_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::new(
            self.arcs
                .iter()
                .map(|arc| {
                    // Arcs are built from this classifier, so the category always resolves
                    let category = self
                        .classifier
                        .category(&arc.category)
                        .unwrap_or_else(|_| &self.classifier.categories()[0]);
                    route_feature(
                        Geometry::MultiLineString(arc.segments.clone()),
                        &arc.origin,
                        &arc.destination,
                        arc.distance_km,
                        category,
                        self.classifier.style_for(category),
                    )
                })
                .collect(),
        )
    }

    pub fn capital_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::new(
            self.catalog
                .iter()
                .map(|capital| capital_feature(capital, capital.name == self.origin.name))
                .collect(),
        )
    }

    pub fn origin_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::new(vec![capital_feature(&self.origin, true)])
    }
}

fn capital_feature(capital: &Capital, is_origin: bool) -> Feature {
    Feature::new(Geometry::Point(capital.coordinate))
        .with("name", FeatureValue::String(capital.name.clone()))
        .with("description", FeatureValue::String(capital.description.clone()))
        .with("is_origin", FeatureValue::Bool(is_origin))
}

fn build_arcs(catalog: &CapitalCatalog, classifier: &DistanceClassifier, origin: &Capital, steps: usize) -> Result<Arc<[ArcFeature]>, RouteError> {
    catalog
        .iter()
        .filter(|destination| destination.name != origin.name)
        .map(|destination| {
            let distance = distance_km(&origin.coordinate, &destination.coordinate);
            let category = classifier.classify(distance)?;
            let polyline = interpolate_great_circle(&origin.coordinate, &destination.coordinate, steps)?;
            Ok(ArcFeature {
                origin: origin.name.clone(),
                destination: destination.name.clone(),
                distance_km: distance,
                category: category.id.clone(),
                segments: split_at_antimeridian(&polyline),
            })
        })
        .collect()
}
