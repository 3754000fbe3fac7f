//! Gaze grid model
//!
//! Coordinates, deterministic asset filenames, and the CSV index shared by
//! the generator (writer) and the resolver (reader).

pub mod coordinate;
pub mod naming;
pub mod index;

pub use coordinate::{GazeCoordinate, GazeGrid, GridAxis, GridCell, MAX_AXIS_VALUES};
pub use naming::{filename_for, parse_filename, ParsedFilename};
pub use index::{GazeIndex, IndexRow, DEFAULT_INDEX_FILE, INDEX_HEADER};
