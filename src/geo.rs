//! Area-of-interest handling for catalog searches.
use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// Axis-aligned lon/lat box. A point is stored as a box with zero area.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self {
            lon_min: lon,
            lat_min: lat,
            lon_max: lon,
            lat_max: lat,
        }
    }

    /// Accepts either `[lon, lat]` or `[lon_min, lat_min, lon_max, lat_max]`.
    pub fn from_coordinates(coordinates: &[f64]) -> Result<Self, FetchError> {
        match *coordinates {
            [lon, lat] => Ok(Self::point(lon, lat)),
            [lon_min, lat_min, lon_max, lat_max] => Ok(Self {
                lon_min,
                lat_min,
                lon_max,
                lat_max,
            }),
            _ => Err(FetchError::Validation(format!(
                "Expected 2 (point) or 4 (box) coordinates, got {}",
                coordinates.len()
            ))),
        }
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn is_point(&self) -> bool {
        self.width() == 0.0 && self.height() == 0.0
    }

    /// WKT geometry with the ring closed, as expected by OData `Intersects`.
    pub fn to_wkt(&self) -> String {
        if self.is_point() {
            return format!("POINT({} {})", self.lon_min, self.lat_min);
        }
        let Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        } = *self;
        format!(
            "POLYGON(({lon_min} {lat_min},{lon_max} {lat_min},{lon_max} {lat_max},{lon_min} {lat_max},{lon_min} {lat_min}))"
        )
    }
}
