//! CSV Index of Generated Assets
//!
//! `index.csv` maps every produced filename to its `(pupil_x, pupil_y)`
//! coordinate. The index is rewritten through a temporary file and renamed
//! into place, so a crash mid-run leaves the previous version intact.

use super::coordinate::{GazeCoordinate, GazeGrid, GridCell};
use super::naming::{format_value, parse_filename};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default index filename inside an output directory
pub const DEFAULT_INDEX_FILE: &str = "index.csv";

/// CSV header line
pub const INDEX_HEADER: &str = "filename,pupil_x,pupil_y";

/// One index row
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub filename: String,
    pub coordinate: GazeCoordinate,
}

impl IndexRow {
    pub fn new(filename: impl Into<String>, coordinate: GazeCoordinate) -> Self {
        Self {
            filename: filename.into(),
            coordinate,
        }
    }

    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{}",
            self.filename,
            format_value(self.coordinate.px),
            format_value(self.coordinate.py)
        )
    }
}

/// Ordered set of index rows, unique by filename
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GazeIndex {
    rows: Vec<IndexRow>,
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("csv.tmp")
}

impl GazeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.rows.iter().any(|r| r.filename == filename)
    }

    /// Insert a row, replacing any row with the same filename.
    ///
    /// Returns `true` if the row was new.
    pub fn upsert(&mut self, row: IndexRow) -> bool {
        match self.rows.iter_mut().find(|r| r.filename == row.filename) {
            Some(existing) => {
                *existing = row;
                false
            }
            None => {
                self.rows.push(row);
                true
            }
        }
    }

    /// Sort rows into grid order (`py` then `px`)
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            a.coordinate
                .py
                .total_cmp(&b.coordinate.py)
                .then(a.coordinate.px.total_cmp(&b.coordinate.px))
                .then_with(|| a.filename.cmp(&b.filename))
        });
    }

    /// Parse CSV text
    pub fn parse(content: &str) -> crate::Result<Self> {
        let mut index = Self::new();
        let mut lines = content.lines().enumerate();

        match lines.next() {
            Some((_, header)) if header.trim() == INDEX_HEADER => {}
            Some((_, header)) => {
                return Err(crate::Error::Index(format!(
                    "unexpected header '{}', expected '{}'",
                    header.trim(),
                    INDEX_HEADER
                )))
            }
            None => return Ok(index),
        }

        for (line_no, line) in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 3 {
                return Err(crate::Error::Index(format!(
                    "line {}: expected 3 fields, got {}",
                    line_no + 1,
                    fields.len()
                )));
            }
            let px: f64 = fields[1].parse().map_err(|_| {
                crate::Error::Index(format!("line {}: invalid pupil_x '{}'", line_no + 1, fields[1]))
            })?;
            let py: f64 = fields[2].parse().map_err(|_| {
                crate::Error::Index(format!("line {}: invalid pupil_y '{}'", line_no + 1, fields[2]))
            })?;
            index.upsert(IndexRow::new(fields[0], GazeCoordinate::new(px, py)));
        }

        Ok(index)
    }

    /// Render as CSV text
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(32 * (self.rows.len() + 1));
        out.push_str(INDEX_HEADER);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.to_csv_line());
            out.push('\n');
        }
        out
    }

    /// Load an index file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load an index file, or an empty index if the file does not exist
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Atomically replace the index file (write `.tmp`, then rename)
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(path);
        std::fs::write(&tmp, self.to_csv())?;
        std::fs::rename(&tmp, path)?;
        debug!(rows = self.rows.len(), path = %path.display(), "Index saved");
        Ok(())
    }

    /// Build an index from the generated files present in `dir`.
    ///
    /// Only names that parse as asset filenames are included. `size` and
    /// `extension` filter when set.
    pub fn scan_dir(dir: &Path, size: Option<u32>, extension: Option<&str>) -> crate::Result<Self> {
        let mut index = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(parsed) = parse_filename(&name) else {
                continue;
            };
            if size.is_some_and(|s| s != parsed.size) {
                continue;
            }
            if let Some(ext) = extension {
                if !parsed.extension.eq_ignore_ascii_case(ext) {
                    continue;
                }
            }
            index.upsert(IndexRow::new(name, parsed.coordinate));
        }
        index.sort();
        Ok(index)
    }

    /// Key rows by grid cell.
    ///
    /// Rows whose coordinate does not lie on `grid` are skipped with a
    /// warning; if two rows land on the same cell the later one wins.
    pub fn lookup(&self, grid: &GazeGrid) -> HashMap<GridCell, IndexRow> {
        let mut map = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            match grid.cell_of(row.coordinate) {
                Some(cell) => {
                    map.insert(cell, row.clone());
                }
                None => {
                    warn!(
                        filename = %row.filename,
                        px = row.coordinate.px,
                        py = row.coordinate.py,
                        "Index row is not on the grid, ignoring"
                    );
                }
            }
        }
        map
    }
}
