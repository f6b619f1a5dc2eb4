use std::future::Future;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::DataSourceError;

/// One capital as it appears in the data file: `coordinates` is `[lon, lat]`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CapitalRecord {
    pub name: String,
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
struct GeoJsonCapital {
    geometry: GeoJsonPoint,
    properties: GeoJsonProperties,
}

#[derive(Deserialize)]
struct GeoJsonPoint {
    coordinates: [f64; 2],
}

#[derive(Deserialize)]
struct GeoJsonProperties {
    name: String,
    #[serde(default)]
    description: String,
}

// Capitals are shipped either as a plain record list or as GeoJSON points
#[derive(Deserialize)]
#[serde(untagged)]
enum CapitalsDocument {
    Records(Vec<CapitalRecord>),
    FeatureCollection { features: Vec<GeoJsonCapital> },
}

pub fn parse_capitals(bytes: &[u8]) -> Result<Vec<CapitalRecord>, DataSourceError> {
    let records = match serde_json::from_slice(bytes)? {
        CapitalsDocument::Records(records) => records,
        CapitalsDocument::FeatureCollection { features } => features
            .into_iter()
            .map(|f| CapitalRecord {
                name: f.properties.name,
                coordinates: f.geometry.coordinates,
                description: f.properties.description,
            })
            .collect(),
    };
    Ok(records)
}

/// Where the capital records come from. Failures are returned as is; retrying is up to the caller.
pub trait CapitalSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<CapitalRecord>, DataSourceError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpCapitalSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCapitalSource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl CapitalSource for HttpCapitalSource {
    async fn fetch(&self) -> Result<Vec<CapitalRecord>, DataSourceError> {
        info!("Fetching capitals from {}", self.url);

        let response = self.client.get(&self.url).send().await?;

        // If the response is not successful, return an error
        if !response.status().is_success() {
            return Err(DataSourceError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        parse_capitals(&bytes)
    }
}

#[derive(Debug, Clone)]
pub struct FileCapitalSource {
    path: PathBuf,
}

impl FileCapitalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CapitalSource for FileCapitalSource {
    async fn fetch(&self) -> Result<Vec<CapitalRecord>, DataSourceError> {
        info!("Reading capitals from {}", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;
        parse_capitals(&bytes)
    }
}

/// Records held in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCapitalSource {
    records: Vec<CapitalRecord>,
}

impl StaticCapitalSource {
    pub fn new(records: Vec<CapitalRecord>) -> Self {
        Self { records }
    }
}

impl CapitalSource for StaticCapitalSource {
    async fn fetch(&self) -> Result<Vec<CapitalRecord>, DataSourceError> {
        debug!("Serving {} in-memory capitals", self.records.len());
        Ok(self.records.clone())
    }
}

// Shipped with the binary so it starts from any working directory
const BUNDLED_CAPITALS: &[u8] = include_bytes!("../../assets/capitals.json");

/// Source picked from a configured location: URLs go over HTTP, anything else
/// is a file path, and no location at all means the bundled capitals.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Http(HttpCapitalSource),
    File(FileCapitalSource),
    Bundled,
}

impl ConfiguredSource {
    pub fn from_config(location: Option<&str>) -> Self {
        location.map_or(ConfiguredSource::Bundled, Self::from_location)
    }

    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            ConfiguredSource::Http(HttpCapitalSource::new(location.to_string()))
        } else {
            ConfiguredSource::File(FileCapitalSource::new(location))
        }
    }
}

impl CapitalSource for ConfiguredSource {
    async fn fetch(&self) -> Result<Vec<CapitalRecord>, DataSourceError> {
        match self {
            ConfiguredSource::Http(source) => source.fetch().await,
            ConfiguredSource::File(source) => source.fetch().await,
            ConfiguredSource::Bundled => {
                debug!("Using bundled capitals");
                parse_capitals(BUNDLED_CAPITALS)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_lists() {
        let json = br#"[
            { "name": "Paris", "coordinates": [2.35, 48.85], "description": "Capital of France" },
            { "name": "Lima", "coordinates": [-77.04, -12.05] }
        ]"#;
        let records = parse_capitals(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coordinates, [2.35, 48.85]);
        assert_eq!(records[1].description, "");
    }

    #[test]
    fn parses_geojson_points() {
        let json = br#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [139.69, 35.68] },
                "properties": { "name": "Tokyo", "description": "Capital of Japan" }
            }]
        }"#;
        let records = parse_capitals(json).unwrap();
        assert_eq!(records[0].name, "Tokyo");
        assert_eq!(records[0].coordinates, [139.69, 35.68]);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_capitals(b"{ not json"), Err(DataSourceError::Parse(_))));
        assert!(matches!(parse_capitals(br#"[{ "name": 3 }]"#), Err(DataSourceError::Parse(_))));
    }

    #[test]
    fn location_picks_transport() {
        assert!(matches!(ConfiguredSource::from_location("https://example.org/capitals.json"), ConfiguredSource::Http(_)));
        assert!(matches!(ConfiguredSource::from_location("assets/capitals.json"), ConfiguredSource::File(_)));
        assert!(matches!(ConfiguredSource::from_config(None), ConfiguredSource::Bundled));
        assert!(matches!(ConfiguredSource::from_config(Some("capitals.json")), ConfiguredSource::File(_)));
    }

    #[tokio::test]
    async fn bundled_source_needs_no_working_directory() {
        let records = ConfiguredSource::Bundled.fetch().await.unwrap();
        assert_eq!(records.len(), 43);
        assert!(records.iter().any(|r| r.name == "Wellington"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = FileCapitalSource::new("does/not/exist.json");
        assert!(matches!(source.fetch().await, Err(DataSourceError::Io(_))));
    }

    #[tokio::test]
    async fn bundled_capitals_parse() {
        let source = FileCapitalSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/capitals.json"));
        let records = source.fetch().await.unwrap();
        assert!(records.len() > 20);
    }
}
