//! Pointer → grid cell → asset selection
//!
//! [`reduce`] is the pure step: given the previously selected cell and a new
//! sample it decides whether the selection changes. [`GazeTracker`] wraps it
//! with the index lookup and the load bookkeeping. Every selection change
//! bumps a generation counter; a load result carrying an older generation is
//! discarded so only the latest selection is ever shown.

use super::asset::{AssetState, LoadedAsset};
use super::pointer::{normalize, PointerSample, Viewport};
use crate::grid::{GazeCoordinate, GazeGrid, GazeIndex, GridCell, IndexRow};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of one pointer sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Sample snapped to the cell already selected
    Stay(GridCell),
    Move { from: GridCell, to: GridCell },
}

impl Transition {
    /// Cell selected after the sample
    pub fn cell(&self) -> GridCell {
        match self {
            Transition::Stay(cell) => *cell,
            Transition::Move { to, .. } => *to,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Transition::Move { .. })
    }
}

/// Snap `sample` to the grid and compare with `previous`
pub fn reduce(grid: &GazeGrid, viewport: &Viewport, previous: GridCell, sample: PointerSample) -> Transition {
    let (px, py) = normalize(sample, viewport, grid);
    let to = grid.snap(px, py);
    if to == previous {
        Transition::Stay(previous)
    } else {
        Transition::Move { from: previous, to }
    }
}

/// Request to load the asset for a selection
#[derive(Debug, Clone, PartialEq)]
pub struct AssetTicket {
    pub cell: GridCell,
    pub coordinate: GazeCoordinate,
    pub filename: String,
    /// Selection generation the load belongs to
    pub generation: u64,
}

/// Selection state for one tracked container
#[derive(Debug, Clone)]
pub struct GazeTracker {
    grid: GazeGrid,
    viewport: Viewport,
    entries: HashMap<GridCell, IndexRow>,
    current: GridCell,
    generation: u64,
    state: AssetState,
    swaps: u64,
    discarded: u64,
}

impl GazeTracker {
    /// Tracker resting on the center cell. Nothing is loaded until
    /// [`start`](Self::start) or the first sample that changes cell.
    pub fn new(grid: GazeGrid, index: &GazeIndex, viewport: Viewport) -> Self {
        let entries = index.lookup(&grid);
        if entries.len() < grid.len() {
            warn!(
                available = entries.len(),
                expected = grid.len(),
                "Index does not cover every grid cell"
            );
        }
        let current = grid.center();
        Self {
            grid,
            viewport,
            entries,
            current,
            generation: 0,
            state: AssetState::Idle,
            swaps: 0,
            discarded: 0,
        }
    }

    pub fn grid(&self) -> &GazeGrid {
        &self.grid
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn current_cell(&self) -> GridCell {
        self.current
    }

    pub fn current_coordinate(&self) -> Option<GazeCoordinate> {
        self.grid.coordinate(self.current)
    }

    /// Filename indexed for the current cell
    pub fn current_filename(&self) -> Option<&str> {
        self.entries.get(&self.current).map(|row| row.filename.as_str())
    }

    pub fn state(&self) -> &AssetState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of selection changes caused by pointer samples
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Load results dropped because a newer selection superseded them
    pub fn discarded_loads(&self) -> u64 {
        self.discarded
    }

    /// Request the resting (center) asset
    pub fn start(&mut self) -> Option<AssetTicket> {
        self.select(self.current)
    }

    /// Container moved or resized. The selection is re-evaluated on the
    /// next sample.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        debug!(?viewport, "Viewport updated");
        self.viewport = viewport;
    }

    /// Feed one pointer sample. Returns a load ticket only when the
    /// sample selects a different cell that has an indexed asset.
    pub fn on_pointer(&mut self, sample: PointerSample) -> Option<AssetTicket> {
        match reduce(&self.grid, &self.viewport, self.current, sample) {
            Transition::Stay(_) => None,
            Transition::Move { from, to } => {
                debug!(?from, ?to, "Gaze cell changed");
                self.swaps += 1;
                self.select(to)
            }
        }
    }

    /// Apply a load result. Returns `false` if the ticket is stale.
    pub fn on_loaded(&mut self, ticket: &AssetTicket, result: crate::Result<LoadedAsset>) -> bool {
        if ticket.generation != self.generation {
            self.discarded += 1;
            debug!(
                filename = %ticket.filename,
                generation = ticket.generation,
                latest = self.generation,
                "Discarding stale asset load"
            );
            return false;
        }
        self.state = match result {
            Ok(asset) => AssetState::Ready {
                cell: ticket.cell,
                asset,
            },
            Err(e) => {
                warn!(filename = %ticket.filename, error = %e, "Asset failed to load");
                AssetState::Failed {
                    cell: ticket.cell,
                    error: e.to_string(),
                }
            }
        };
        true
    }

    fn select(&mut self, cell: GridCell) -> Option<AssetTicket> {
        self.generation += 1;
        self.current = cell;

        let Some(row) = self.entries.get(&cell) else {
            let error = match self.grid.coordinate(cell) {
                Some(coord) => crate::Error::MissingAsset(coord.to_string()),
                None => crate::Error::MissingAsset(format!("{:?}", cell)),
            };
            warn!(?cell, "No asset indexed for cell");
            self.state = AssetState::Failed {
                cell,
                error: error.to_string(),
            };
            return None;
        };

        self.state = AssetState::Loading {
            cell,
            filename: row.filename.clone(),
        };
        Some(AssetTicket {
            cell,
            coordinate: row.coordinate,
            filename: row.filename.clone(),
            generation: self.generation,
        })
    }
}
