use std::collections::HashSet;

use log::info;

use crate::error::RouteError;
use crate::geo::coordinate::Coordinate;
use crate::maps_api::capital_source::{CapitalRecord, CapitalSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Capital {
    pub name: String,
    pub coordinate: Coordinate,
    pub description: String,
}

impl TryFrom<CapitalRecord> for Capital {
    type Error = RouteError;

    fn try_from(record: CapitalRecord) -> Result<Self, Self::Error> {
        let coordinate = Coordinate::from_lon_lat(record.coordinates);
        coordinate
            .validate()
            .map_err(|e| RouteError::Validation(format!("capital '{}': {}", record.name, e)))?;
        Ok(Self {
            name: record.name,
            coordinate,
            description: record.description,
        })
    }
}

/// The capitals of one data load. Never changes after construction.
#[derive(Debug, Clone)]
pub struct CapitalCatalog {
    capitals: Vec<Capital>,
}

impl CapitalCatalog {
    pub async fn load<S: CapitalSource>(source: &S) -> Result<Self, RouteError> {
        let records = source.fetch().await?;
        let capitals = records.into_iter().map(Capital::try_from).collect::<Result<Vec<_>, _>>()?;
        let catalog = Self::new(capitals)?;
        info!("Loaded {} capitals", catalog.len());
        Ok(catalog)
    }

    pub fn new(capitals: Vec<Capital>) -> Result<Self, RouteError> {
        if capitals.is_empty() {
            return Err(RouteError::Validation("capital list is empty".into()));
        }
        let mut seen = HashSet::with_capacity(capitals.len());
        for capital in &capitals {
            if !seen.insert(capital.name.as_str()) {
                return Err(RouteError::Validation(format!("duplicate capital '{}'", capital.name)));
            }
        }
        Ok(Self { capitals })
    }

    pub fn find(&self, name: &str) -> Result<&Capital, RouteError> {
        self.capitals
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| RouteError::NotFound(format!("capital '{}'", name)))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Capital> {
        self.capitals.iter()
    }

    /// First capital in load order; a catalog is never empty.
    pub fn first(&self) -> &Capital {
        &self.capitals[0]
    }

    pub fn len(&self) -> usize {
        self.capitals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capitals.is_empty()
    }
}
