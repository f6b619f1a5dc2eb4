use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// A point on the globe in degrees.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl Add<Coordinate> for Coordinate {
    type Output = Coordinate;

    fn add(self, other: Coordinate) -> Coordinate {
        Coordinate {
            latitude: self.latitude + other.latitude,
            longitude: self.longitude + other.longitude,
        }
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a coordinate from a GeoJSON-ordered `[longitude, latitude]` pair.
    pub fn from_lon_lat([longitude, latitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Checks the coordinate is finite and inside the usual degree ranges.
    pub fn validate(&self) -> Result<(), RouteError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(RouteError::Validation(format!("non-finite coordinate {:?}", self)));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RouteError::Validation(format!("latitude {} out of range", self.latitude)));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RouteError::Validation(format!("longitude {} out of range", self.longitude)));
        }
        Ok(())
    }

    /// Position on the unit sphere (x towards 0°E, z towards the north pole).
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }

    pub fn from_unit_vector([x, y, z]: [f64; 3]) -> Self {
        let latitude = z.atan2((x * x + y * y).sqrt()).to_degrees();
        let longitude = y.atan2(x).to_degrees();
        Self::new(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn unit_vector_recovers_degrees() {
        let paris = Coordinate::new(48.85, 2.35);
        let back = Coordinate::from_unit_vector(paris.to_unit_vector());
        assert_abs_diff_eq!(back.latitude(), 48.85, epsilon = 1e-9);
        assert_abs_diff_eq!(back.longitude(), 2.35, epsilon = 1e-9);
    }

    #[test]
    fn lon_lat_order() {
        let lima = Coordinate::from_lon_lat([-77.04, -12.05]);
        assert_eq!(lima.latitude(), -12.05);
        assert_eq!(lima.longitude(), -77.04);
        assert_eq!(lima.lon_lat(), [-77.04, -12.05]);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -180.5).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
        assert!(Coordinate::new(-90.0, 180.0).validate().is_ok());
    }
}
