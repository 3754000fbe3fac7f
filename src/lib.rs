//! # Gaze Grid
//!
//! Generates a grid of portrait images whose eyes look in different
//! directions, and resolves a live pointer position to the nearest image so
//! a face can "follow" the cursor.
//!
//! ## Overview
//!
//! The generator walks every `(pupil_x, pupil_y)` pair of a square grid,
//! asks a hosted image model (Replicate `fofr/expression-editor`) to re-render
//! a source face with that gaze, resizes the result and writes it under a
//! filename derived from the coordinate, recording each file in `index.csv`.
//!
//! The resolver consumes that index: it maps container-local pointer samples
//! onto the same coordinate range, snaps them to the nearest grid cell and
//! swaps the displayed asset only when the cell changes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gaze_grid::grid::{GazeGrid, GazeIndex};
//! use gaze_grid::resolver::{GazeTracker, PointerSample, Viewport};
//!
//! let grid = GazeGrid::new(-15.0, 15.0, 3.0).expect("valid grid");
//! let index = GazeIndex::load(std::path::Path::new("out/index.csv")).expect("index");
//!
//! let mut tracker = GazeTracker::new(grid, &index, Viewport::new(400.0, 400.0));
//! if let Some(ticket) = tracker.on_pointer(PointerSample::new(390.0, 200.0)) {
//!     println!("show {}", ticket.filename);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`grid`]: coordinates, filenames and the CSV index
//! - [`generator`]: model client, image encoding and the resumable batch run
//! - [`resolver`]: pointer normalization, snapping, and asset selection
//! - [`app`]: CLI and configuration management
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐
//! │ GazeGrid   │───▶│ Replicate  │───▶│  Resize &  │───▶│ index.csv  │
//! │ (cells)    │    │ prediction │    │  encode    │    │ + images   │
//! └────────────┘    └────────────┘    └────────────┘    └────────────┘
//!                                                              │
//!                                                              ▼
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐
//! │ AssetState │◀───│ Asset load │◀───│ Snap to    │◀───│ Pointer    │
//! │ (watch)    │    │ (latest)   │    │ grid cell  │    │ samples    │
//! └────────────┘    └────────────┘    └────────────┘    └────────────┘
//! ```

pub mod grid;
pub mod generator;
pub mod resolver;
pub mod app;

// Re-export commonly used types
pub use grid::{GazeCoordinate, GazeGrid, GazeIndex, GridCell};
pub use generator::{GenerationReport, GridGenerator};
pub use resolver::{AssetState, GazeTracker, PointerSample, Viewport};

/// Result type alias for the gaze grid
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gaze grid
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Grid error: {0}")]
    Grid(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Model service error: {0}")]
    Service(String),

    #[error("Invalid source image: {0}")]
    InvalidSource(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Missing asset for {0}")]
    MissingAsset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Errors that must stop a generation run instead of skipping one coordinate
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Grid(_)
                | Error::MissingCredentials(_)
                | Error::Unauthorized(_)
                | Error::InvalidSource(_)
        )
    }
}
