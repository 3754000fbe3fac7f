//! Pointer samples and container bounds
//!
//! Samples arrive in client pixels. The container's bounding box turns them
//! into a fraction of its width/height, which maps linearly onto the grid's
//! `[min, max]` range: left/top edge → `min`, center → midpoint,
//! right/bottom edge → `max`. Positions outside the box clamp to its edges.

use crate::grid::GazeGrid;
use serde::{Deserialize, Serialize};

/// Pointer or touch position in client pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
}

impl PointerSample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the tracked container, in client pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Container at the client origin
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_origin(0.0, 0.0, width, height)
    }

    pub fn with_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center(&self) -> PointerSample {
        PointerSample::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn contains(&self, sample: PointerSample) -> bool {
        sample.x >= self.left
            && sample.x <= self.left + self.width
            && sample.y >= self.top
            && sample.y <= self.top + self.height
    }

    /// Position as a fraction of the box, each axis clamped to `[0, 1]`.
    ///
    /// A zero-sized axis (or a non-finite sample) maps to the middle.
    pub fn fraction(&self, sample: PointerSample) -> (f64, f64) {
        (
            axis_fraction(sample.x, self.left, self.width),
            axis_fraction(sample.y, self.top, self.height),
        )
    }
}

fn axis_fraction(pos: f64, start: f64, extent: f64) -> f64 {
    if extent <= 0.0 || !pos.is_finite() {
        return 0.5;
    }
    ((pos - start) / extent).clamp(0.0, 1.0)
}

/// Map a sample into the grid's coordinate range (unsnapped)
pub fn normalize(sample: PointerSample, viewport: &Viewport, grid: &GazeGrid) -> (f64, f64) {
    let (fx, fy) = viewport.fraction(sample);
    let span = grid.max() - grid.min();
    (grid.min() + fx * span, grid.min() + fy * span)
}
