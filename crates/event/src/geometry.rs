//! Search-volume geometry: points and axis-aligned regions.
//!
//! Coordinates are Cartesian kilometres with z positive down (depth).

use serde::Serialize;

use crate::error::EventError;

/// A point in the 3D search volume (km, z positive down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point3 {
    /// East coordinate (km).
    pub x: f64,
    /// North coordinate (km).
    pub y: f64,
    /// Depth (km, positive down).
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal (epicentral) distance to another point, ignoring depth.
    pub fn epicentral_distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Azimuth from this point to another, degrees clockwise from north
    /// in [0, 360).
    pub fn azimuth_to(&self, other: &Point3) -> f64 {
        let az = (other.x - self.x).atan2(other.y - self.y).to_degrees();
        if az < 0.0 { az + 360.0 } else { az }
    }

    /// True if all components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Axis-aligned box bounding the hypocenter search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRegion {
    origin: Point3,
    extent: [f64; 3],
}

impl SearchRegion {
    /// Creates a region from its minimum corner and per-axis extent (km).
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidExtent`] if any extent is non-positive
    /// or non-finite.
    pub fn new(origin: Point3, extent: [f64; 3]) -> Result<Self, EventError> {
        for (axis, &e) in extent.iter().enumerate() {
            if !e.is_finite() || e <= 0.0 {
                return Err(EventError::InvalidExtent { axis, extent: e });
            }
        }
        Ok(Self { origin, extent })
    }

    /// Returns the minimum corner.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Returns the per-axis extent (km).
    pub fn extent(&self) -> [f64; 3] {
        self.extent
    }

    /// Returns the geometric center of the region.
    pub fn center(&self) -> Point3 {
        Point3::new(
            self.origin.x + self.extent[0] / 2.0,
            self.origin.y + self.extent[1] / 2.0,
            self.origin.z + self.extent[2] / 2.0,
        )
    }

    /// Returns the region volume (km³).
    pub fn volume(&self) -> f64 {
        self.extent[0] * self.extent[1] * self.extent[2]
    }

    /// Returns the length of the region diagonal (km).
    pub fn diagonal(&self) -> f64 {
        (self.extent[0] * self.extent[0]
            + self.extent[1] * self.extent[1]
            + self.extent[2] * self.extent[2])
            .sqrt()
    }

    /// True if the point lies inside the region (inclusive bounds).
    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.origin.x
            && p.x <= self.origin.x + self.extent[0]
            && p.y >= self.origin.y
            && p.y <= self.origin.y + self.extent[1]
            && p.z >= self.origin.z
            && p.z <= self.origin.z + self.extent[2]
    }
}
