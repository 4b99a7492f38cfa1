use std::collections::BTreeSet;

use shared_models::geo::{GeoPoint, EARTH_RADIUS_KM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

/// Uniform lat/long grid over the whole globe.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    cell_degrees: f64,
    rows: i32,
    cols: i32,
}

impl Grid {
    pub fn new(cell_degrees: f64) -> Self {
        let cell_degrees = if cell_degrees.is_finite() && cell_degrees > 0.0 {
            cell_degrees.min(10.0)
        } else {
            0.1
        };

        Self {
            cell_degrees,
            rows: (180.0 / cell_degrees).ceil() as i32,
            cols: (360.0 / cell_degrees).ceil() as i32,
        }
    }

    pub fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    pub fn cell_of(&self, point: &GeoPoint) -> GridCell {
        GridCell {
            row: self.row_of(point.lat),
            col: self.col_of(point.lng),
        }
    }

    /// Every cell that may hold a point within `radius_km` of `center`.
    /// A superset: callers still filter on exact distance.
    pub fn cells_within(&self, center: &GeoPoint, radius_km: f64) -> BTreeSet<GridCell> {
        let mut cells = BTreeSet::new();
        let angular = (radius_km / EARTH_RADIUS_KM).min(std::f64::consts::PI);
        let angular_deg = angular.to_degrees();

        let lat_min = center.lat - angular_deg;
        let lat_max = center.lat + angular_deg;
        let touches_pole = lat_min <= -90.0 || lat_max >= 90.0;

        let row_min = (self.row_of(lat_min.max(-90.0)) - 1).max(0);
        let row_max = (self.row_of(lat_max.min(90.0)) + 1).min(self.rows - 1);

        let cos_lat = center.lat.to_radians().cos();
        let full_width = touches_pole || angular.sin() >= cos_lat;

        let col_range: Vec<i32> = if full_width {
            (0..self.cols).collect()
        } else {
            let lng_span = (angular.sin() / cos_lat).asin().to_degrees();
            let first = self.raw_col(center.lng - lng_span) - 1;
            let last = self.raw_col(center.lng + lng_span) + 1;
            if last - first + 1 >= self.cols {
                (0..self.cols).collect()
            } else {
                (first..=last).map(|c| c.rem_euclid(self.cols)).collect()
            }
        };

        for row in row_min..=row_max {
            for &col in &col_range {
                cells.insert(GridCell { row, col });
            }
        }

        cells
    }

    fn row_of(&self, lat: f64) -> i32 {
        (((lat + 90.0) / self.cell_degrees).floor() as i32).clamp(0, self.rows - 1)
    }

    fn col_of(&self, lng: f64) -> i32 {
        self.raw_col(lng).rem_euclid(self.cols)
    }

    fn raw_col(&self, lng: f64) -> i32 {
        ((lng + 180.0) / self.cell_degrees).floor() as i32
    }
}
