//! Resumable grid generation run
//!
//! Walks the grid, renders each missing coordinate, and keeps `index.csv`
//! in sync after every success. Per-coordinate failures are recorded and
//! skipped; credential and configuration failures abort the run.

use super::encode::{save_resized, OutputFormat};
use super::replicate::GazeRenderer;
use super::source::SourceImage;
use crate::grid::{filename_for, GazeCoordinate, GazeGrid, GazeIndex, GridCell, IndexRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{error, info, warn};

/// Report filename written next to the index
pub const REPORT_FILE: &str = "generation_report.json";

/// Output settings for a run
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub out_dir: PathBuf,
    /// Square output size in pixels
    pub size: u32,
    pub format: OutputFormat,
    pub index_file: String,
    /// Do not re-request coordinates whose output file already exists
    pub skip_existing: bool,
    /// Maximum requests in flight
    pub concurrency: usize,
}

impl GenerationOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            size: 256,
            format: OutputFormat::Webp,
            index_file: crate::grid::DEFAULT_INDEX_FILE.to_string(),
            skip_existing: false,
            concurrency: 1,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.out_dir.join(&self.index_file)
    }
}

/// One grid coordinate and where its asset lives
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAsset {
    pub cell: GridCell,
    pub coordinate: GazeCoordinate,
    pub filename: String,
    pub path: PathBuf,
}

impl PlannedAsset {
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Coordinate that could not be produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCoordinate {
    pub px: f64,
    pub py: f64,
    pub filename: String,
    pub reason: String,
}

/// Summary of a generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub total: usize,
    pub generated: usize,
    pub skipped_existing: usize,
    pub failed: Vec<FailedCoordinate>,
    /// Stopped early by the stop flag
    pub interrupted: bool,
    pub index_rows: usize,
    pub out_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationReport {
    fn new(total: usize, out_dir: &Path) -> Self {
        let now = Utc::now();
        Self {
            total,
            generated: 0,
            skipped_existing: 0,
            failed: Vec::new(),
            interrupted: false,
            index_rows: 0,
            out_dir: out_dir.to_path_buf(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Every coordinate has an asset
    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.failed.is_empty() && self.generated + self.skipped_existing == self.total
    }

    pub fn save(&self, dir: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(REPORT_FILE), json)?;
        Ok(())
    }
}

/// Render one coordinate and write the resized file
async fn render_one<R>(
    renderer: Arc<R>,
    source: Arc<SourceImage>,
    asset: PlannedAsset,
    size: u32,
    format: OutputFormat,
) -> crate::Result<()>
where
    R: GazeRenderer + 'static,
{
    let bytes = renderer.render(&source, asset.coordinate).await?;
    tokio::task::spawn_blocking(move || save_resized(&bytes, &asset.path, size, format))
        .await
        .map_err(|e| crate::Error::Service(format!("encode task failed: {}", e)))?
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Grid generation driver
pub struct GridGenerator {
    grid: GazeGrid,
    options: GenerationOptions,
    stop: Arc<AtomicBool>,
}

impl GridGenerator {
    pub fn new(grid: GazeGrid, options: GenerationOptions) -> Self {
        Self {
            grid,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn grid(&self) -> &GazeGrid {
        &self.grid
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Flag that stops scheduling new coordinates once set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Every asset the grid calls for, in grid order
    pub fn planned(&self) -> Vec<PlannedAsset> {
        let ext = self.options.format.extension();
        self.grid
            .iter()
            .map(|(cell, coordinate)| {
                let filename = filename_for(coordinate, self.options.size, ext);
                PlannedAsset {
                    cell,
                    coordinate,
                    path: self.options.out_dir.join(&filename),
                    filename,
                }
            })
            .collect()
    }

    /// Planned assets whose file is not on disk
    pub fn missing(&self) -> Vec<PlannedAsset> {
        self.planned().into_iter().filter(|a| !a.exists()).collect()
    }

    /// Run the grid.
    ///
    /// The index is loaded from the output directory (if present) so rows
    /// from earlier runs are kept, and rewritten after every success.
    pub async fn run<R>(&self, renderer: Arc<R>, source: Arc<SourceImage>) -> crate::Result<GenerationReport>
    where
        R: GazeRenderer + 'static,
    {
        let out_dir = &self.options.out_dir;
        std::fs::create_dir_all(out_dir)?;

        let index_path = self.options.index_path();
        let mut index = GazeIndex::load_or_default(&index_path)?;
        let planned = self.planned();
        let mut report = GenerationReport::new(planned.len(), out_dir);

        let mut queue = VecDeque::with_capacity(planned.len());
        for asset in planned {
            if self.options.skip_existing && asset.exists() {
                index.upsert(IndexRow::new(asset.filename.clone(), asset.coordinate));
                report.skipped_existing += 1;
            } else {
                queue.push_back(asset);
            }
        }
        if report.skipped_existing > 0 {
            info!(count = report.skipped_existing, "Skipping existing outputs");
            index.save(&index_path)?;
        }

        let pending = queue.len();
        info!(
            pending,
            source = %source.describe(),
            out_dir = %out_dir.display(),
            "Generating gaze grid"
        );

        let concurrency = self.options.concurrency.max(1);
        let size = self.options.size;
        let format = self.options.format;
        let mut tasks: JoinSet<(PlannedAsset, crate::Result<()>)> = JoinSet::new();
        let mut done = 0usize;

        loop {
            while tasks.len() < concurrency {
                if self.stop.load(Ordering::SeqCst) {
                    if !queue.is_empty() && !report.interrupted {
                        warn!(remaining = queue.len(), "Stop requested, not scheduling remaining coordinates");
                        report.interrupted = true;
                    }
                    break;
                }
                let Some(asset) = queue.pop_front() else {
                    break;
                };
                let work = render_one(renderer.clone(), source.clone(), asset.clone(), size, format);
                tasks.spawn(async move {
                    // A panic inside the inner task surfaces here with its asset
                    let inner = tokio::spawn(work);
                    let _guard = AbortOnDrop(inner.abort_handle());
                    let result = match inner.await {
                        Ok(result) => result,
                        Err(e) => Err(crate::Error::Service(format!("generation task failed: {}", e))),
                    };
                    (asset, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            done += 1;

            let (asset, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Generation task did not complete");
                    continue;
                }
            };

            match result {
                Ok(()) => {
                    index.upsert(IndexRow::new(asset.filename.clone(), asset.coordinate));
                    index.save(&index_path)?;
                    report.generated += 1;
                    info!(
                        "[{}/{}] Saved {} (px={}, py={})",
                        done, pending, asset.filename, asset.coordinate.px, asset.coordinate.py
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, px = asset.coordinate.px, py = asset.coordinate.py, "Aborting generation");
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "[{}/{}] Failed ({}, {}): {}",
                        done, pending, asset.coordinate.px, asset.coordinate.py, e
                    );
                    report.failed.push(FailedCoordinate {
                        px: asset.coordinate.px,
                        py: asset.coordinate.py,
                        filename: asset.filename,
                        reason: e.to_string(),
                    });
                }
            }
        }

        index.sort();
        index.save(&index_path)?;
        report.index_rows = index.len();
        report.finished_at = Utc::now();

        if let Err(e) = report.save(out_dir) {
            warn!(error = %e, "Failed to write generation report");
        }

        info!(
            generated = report.generated,
            skipped = report.skipped_existing,
            failed = report.failed.len(),
            index_rows = report.index_rows,
            "Generation finished"
        );
        Ok(report)
    }
}
