//! Gaze Coordinates and Grid Enumeration
//!
//! A grid is the Cartesian product of one axis of values
//! `min, min + step, ..., <= max` with itself. Coordinates are identified by
//! their [`GridCell`] (column/row indices) so that lookups never depend on
//! how a floating point value happens to be formatted.

use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether the last step still lands on `max`
const SPAN_EPSILON: f64 = 1e-9;

/// Tolerance used to detect an exact midpoint between two grid values
const MIDPOINT_EPSILON: f64 = 1e-9;

/// Largest number of values per axis; a grid holds at most the square
pub const MAX_AXIS_VALUES: usize = 100;

/// Decimal places kept for generated values (avoids `0.30000000000000004`)
const VALUE_DECIMALS: i32 = 6;

/// Round a value to [`VALUE_DECIMALS`] places and normalize `-0.0` to `0.0`
pub fn round_value(v: f64) -> f64 {
    let scale = 10f64.powi(VALUE_DECIMALS);
    let rounded = (v * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Horizontal/vertical pupil offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeCoordinate {
    /// Horizontal offset (negative = looking left)
    pub px: f64,
    /// Vertical offset (negative = looking up)
    pub py: f64,
}

impl GazeCoordinate {
    pub fn new(px: f64, py: f64) -> Self {
        Self {
            px: round_value(px),
            py: round_value(py),
        }
    }

    pub fn origin() -> Self {
        Self { px: 0.0, py: 0.0 }
    }
}

impl std::fmt::Display for GazeCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {})",
            super::naming::format_value(self.px),
            super::naming::format_value(self.py)
        )
    }
}

/// Structured key of a coordinate: indices into the axis values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub col: usize,
    pub row: usize,
}

impl GridCell {
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// One axis of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    values: Vec<f64>,
}

impl GridAxis {
    /// Enumerate `min..=max` at `step`, truncating rather than overshooting
    pub fn new(min: f64, max: f64, step: f64) -> crate::Result<Self> {
        if !min.is_finite() || !max.is_finite() || !step.is_finite() {
            return Err(crate::Error::Grid(format!(
                "grid bounds must be finite, got min={} max={} step={}",
                min, max, step
            )));
        }
        if step <= 0.0 {
            return Err(crate::Error::Grid(format!("step must be > 0, got {}", step)));
        }
        if min > max {
            return Err(crate::Error::Grid(format!(
                "min must not exceed max, got min={} max={}",
                min, max
            )));
        }

        let steps = ((max - min) / step + SPAN_EPSILON).floor();
        if steps + 1.0 > MAX_AXIS_VALUES as f64 {
            return Err(crate::Error::Grid(format!(
                "step {} yields more than {} values per axis over [{}, {}]",
                step, MAX_AXIS_VALUES, min, max
            )));
        }
        let steps = steps as usize;
        let values = (0..=steps)
            .map(|k| round_value(min + k as f64 * step))
            .collect();

        Ok(Self {
            min,
            max,
            step,
            values,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Index of the value equal to `v` (within rounding), if any
    pub fn index_of(&self, v: f64) -> Option<usize> {
        let v = round_value(v);
        self.values
            .iter()
            .position(|&candidate| (candidate - v).abs() < 1e-6)
    }

    /// Index of the nearest axis value.
    ///
    /// Out-of-range input clamps to the first/last value. At an exact midpoint
    /// the value with the larger magnitude wins, so the rule is mirror
    /// symmetric about zero.
    pub fn snap_index(&self, v: f64) -> usize {
        let last = self.values.len().saturating_sub(1);
        if v.is_nan() {
            return self.snap_index(0.0);
        }

        let t = (v - self.min) / self.step;
        if t <= 0.0 {
            return 0;
        }

        let lower = t.floor();
        let frac = t - lower;
        let lower = (lower as usize).min(last);
        let upper = (lower + 1).min(last);

        let index = if (frac - 0.5).abs() < MIDPOINT_EPSILON {
            if self.values[upper].abs() >= self.values[lower].abs() {
                upper
            } else {
                lower
            }
        } else if frac > 0.5 {
            upper
        } else {
            lower
        };

        index.min(last)
    }

    /// Nearest axis value to `v`
    pub fn snap(&self, v: f64) -> f64 {
        self.values[self.snap_index(v)]
    }
}

/// Square grid of gaze coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeGrid {
    axis: GridAxis,
}

impl GazeGrid {
    pub fn new(min: f64, max: f64, step: f64) -> crate::Result<Self> {
        Ok(Self {
            axis: GridAxis::new(min, max, step)?,
        })
    }

    pub fn axis(&self) -> &GridAxis {
        &self.axis
    }

    pub fn min(&self) -> f64 {
        self.axis.min
    }

    pub fn max(&self) -> f64 {
        self.axis.max
    }

    pub fn step(&self) -> f64 {
        self.axis.step
    }

    /// Number of values per axis
    pub fn side(&self) -> usize {
        self.axis.len()
    }

    /// Total number of coordinates
    pub fn len(&self) -> usize {
        self.side() * self.side()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    /// Coordinate of a cell, if the cell is inside the grid
    pub fn coordinate(&self, cell: GridCell) -> Option<GazeCoordinate> {
        Some(GazeCoordinate {
            px: self.axis.value(cell.col)?,
            py: self.axis.value(cell.row)?,
        })
    }

    /// Cell of a coordinate that lies exactly on the grid
    pub fn cell_of(&self, coord: GazeCoordinate) -> Option<GridCell> {
        Some(GridCell {
            col: self.axis.index_of(coord.px)?,
            row: self.axis.index_of(coord.py)?,
        })
    }

    /// Nearest cell to an arbitrary (possibly out-of-range) coordinate
    pub fn snap(&self, px: f64, py: f64) -> GridCell {
        GridCell {
            col: self.axis.snap_index(px),
            row: self.axis.snap_index(py),
        }
    }

    /// Cell nearest to `(0, 0)`, the resting gaze
    pub fn center(&self) -> GridCell {
        self.snap(0.0, 0.0)
    }

    /// Iterate cells row-major: `py` outer, `px` inner
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        let side = self.side();
        (0..side).flat_map(move |row| (0..side).map(move |col| GridCell { col, row }))
    }

    /// Iterate `(cell, coordinate)` pairs in grid order
    pub fn iter(&self) -> impl Iterator<Item = (GridCell, GazeCoordinate)> + '_ {
        self.cells().map(move |cell| {
            let coord = GazeCoordinate {
                px: self.axis.values[cell.col],
                py: self.axis.values[cell.row],
            };
            (cell, coord)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_count_matches_floor_formula() {
        let cases = [
            (-15.0, 15.0, 3.0),
            (-15.0, 15.0, 5.0),
            (-15.0, 15.0, 2.5),
            (-15.0, 15.0, 4.0),
            (-10.0, 7.0, 3.0),
            (0.0, 0.0, 1.0),
            (-1.0, 1.0, 0.1),
        ];
        for (min, max, step) in cases {
            let axis = GridAxis::new(min, max, step).unwrap();
            let expected = ((max - min) / step + 1e-9).floor() as usize + 1;
            assert_eq!(axis.len(), expected, "min={} max={} step={}", min, max, step);
            for &v in axis.values() {
                assert!(v >= min - 1e-9 && v <= max + 1e-9, "{} outside [{}, {}]", v, min, max);
            }
        }
    }

    #[test]
    fn test_axis_is_symmetric_for_symmetric_range() {
        for step in [1.0, 2.5, 3.0, 5.0, 7.5] {
            let axis = GridAxis::new(-15.0, 15.0, step).unwrap();
            let values = axis.values();
            for (a, b) in values.iter().zip(values.iter().rev()) {
                assert_eq!(*a, -*b, "step {}", step);
            }
        }
    }

    #[test]
    fn test_axis_truncates_instead_of_overshooting() {
        let axis = GridAxis::new(-15.0, 15.0, 4.0).unwrap();
        assert_eq!(axis.len(), 8);
        assert_eq!(axis.values().last().copied(), Some(13.0));
    }

    #[test]
    fn test_axis_fractional_step_has_no_float_noise() {
        let axis = GridAxis::new(-1.0, 1.0, 0.1).unwrap();
        assert_eq!(axis.len(), 21);
        assert!(axis.values().contains(&0.3));
        assert!(axis.values().contains(&0.0));
    }

    #[test]
    fn test_axis_rejects_invalid_bounds() {
        assert!(GridAxis::new(-15.0, 15.0, 0.0).is_err());
        assert!(GridAxis::new(-15.0, 15.0, -3.0).is_err());
        assert!(GridAxis::new(15.0, -15.0, 3.0).is_err());
        assert!(GridAxis::new(f64::NAN, 15.0, 3.0).is_err());
        assert!(GridAxis::new(-15.0, f64::INFINITY, 3.0).is_err());
    }

    #[test]
    fn test_axis_rejects_oversized_grid() {
        let err = GridAxis::new(-15.0, 15.0, 1e-12).unwrap_err();
        assert!(matches!(err, crate::Error::Grid(_)));
        assert!(GazeGrid::new(-15.0, 15.0, 0.2).is_err());

        let widest = GridAxis::new(0.0, 99.0, 1.0).unwrap();
        assert_eq!(widest.len(), MAX_AXIS_VALUES);
        assert!(GridAxis::new(0.0, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_grid_with_step_five_has_49_coordinates() {
        let grid = GazeGrid::new(-15.0, 15.0, 5.0).unwrap();
        assert_eq!(grid.side(), 7);
        assert_eq!(grid.len(), 49);
        assert_eq!(grid.iter().count(), 49);
    }

    #[test]
    fn test_grid_iterates_row_major() {
        let grid = GazeGrid::new(-1.0, 1.0, 1.0).unwrap();
        let coords: Vec<(f64, f64)> = grid.iter().map(|(_, c)| (c.px, c.py)).collect();
        assert_eq!(coords[0], (-1.0, -1.0));
        assert_eq!(coords[1], (0.0, -1.0));
        assert_eq!(coords[3], (-1.0, 0.0));
        assert_eq!(coords[8], (1.0, 1.0));
    }

    #[test]
    fn test_snap_is_idempotent() {
        for step in [1.0, 2.5, 3.0, 4.0, 5.0] {
            let axis = GridAxis::new(-15.0, 15.0, step).unwrap();
            for &v in axis.values() {
                assert_eq!(axis.snap(v), v);
                assert_eq!(axis.snap(axis.snap(v + step * 0.3)), axis.snap(v + step * 0.3));
            }
        }
    }

    #[test]
    fn test_snap_clamps_out_of_range() {
        let axis = GridAxis::new(-15.0, 15.0, 3.0).unwrap();
        assert_eq!(axis.snap(-100.0), -15.0);
        assert_eq!(axis.snap(100.0), 15.0);
        assert_eq!(axis.snap(15.0001), 15.0);
    }

    #[test]
    fn test_snap_clamps_to_truncated_last_value() {
        let axis = GridAxis::new(-15.0, 15.0, 4.0).unwrap();
        assert_eq!(axis.snap(15.0), 13.0);
        assert_eq!(axis.snap(14.9), 13.0);
    }

    #[test]
    fn test_snap_midpoint_breaks_away_from_zero() {
        let axis = GridAxis::new(-15.0, 15.0, 3.0).unwrap();
        assert_eq!(axis.snap(1.5), 3.0);
        assert_eq!(axis.snap(-1.5), -3.0);
        assert_eq!(axis.snap(7.5), 9.0);
        assert_eq!(axis.snap(-7.5), -9.0);
        assert_eq!(axis.snap(1.49), 0.0);
        assert_eq!(axis.snap(-1.49), 0.0);
    }

    #[test]
    fn test_snap_nan_falls_back_to_center() {
        let axis = GridAxis::new(-15.0, 15.0, 3.0).unwrap();
        assert_eq!(axis.snap(f64::NAN), 0.0);
    }

    #[test]
    fn test_center_of_grid_without_zero() {
        let grid = GazeGrid::new(-15.0, 15.0, 4.0).unwrap();
        let center = grid.coordinate(grid.center()).unwrap();
        assert_eq!(center.px, 1.0);
        assert_eq!(center.py, 1.0);
    }

    #[test]
    fn test_cell_of_roundtrips_with_coordinate() {
        let grid = GazeGrid::new(-15.0, 15.0, 2.5).unwrap();
        for (cell, coord) in grid.iter() {
            assert_eq!(grid.cell_of(coord), Some(cell));
        }
        assert_eq!(grid.cell_of(GazeCoordinate::new(1.0, 0.0)), None);
    }

    #[test]
    fn test_round_value_normalizes_negative_zero() {
        assert_eq!(round_value(-0.0).to_string(), "0");
        assert_eq!(round_value(-3.0 + 3.0), 0.0);
        assert_eq!(round_value(0.1 + 0.2), 0.3);
    }
}
