//! Displayed asset state and loading

use crate::grid::GridCell;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Decoded gaze image
#[derive(Clone, PartialEq)]
pub struct LoadedAsset {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<RgbaImage>,
}

impl LoadedAsset {
    pub fn new(filename: impl Into<String>, pixels: RgbaImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            filename: filename.into(),
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }
}

impl std::fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("filename", &self.filename)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// What the tracker is currently showing
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AssetState {
    /// Nothing selected yet
    #[default]
    Idle,
    /// Load requested for the selected cell
    Loading { cell: GridCell, filename: String },
    Ready { cell: GridCell, asset: LoadedAsset },
    /// The selected cell has no asset, or loading it failed
    Failed { cell: GridCell, error: String },
}

impl AssetState {
    pub fn cell(&self) -> Option<GridCell> {
        match self {
            AssetState::Idle => None,
            AssetState::Loading { cell, .. }
            | AssetState::Ready { cell, .. }
            | AssetState::Failed { cell, .. } => Some(*cell),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AssetState::Loading { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AssetState::Ready { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AssetState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Filename being loaded or shown
    pub fn filename(&self) -> Option<&str> {
        match self {
            AssetState::Loading { filename, .. } => Some(filename),
            AssetState::Ready { asset, .. } => Some(&asset.filename),
            _ => None,
        }
    }
}

/// Blocking asset source; called off the event loop
pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, filename: &str) -> crate::Result<LoadedAsset>;
}

/// Loads assets from the generator's output directory
#[derive(Debug, Clone)]
pub struct DirAssetLoader {
    dir: PathBuf,
}

impl DirAssetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AssetLoader for DirAssetLoader {
    fn load(&self, filename: &str) -> crate::Result<LoadedAsset> {
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(crate::Error::MissingAsset(path.display().to_string()));
        }
        let pixels = image::open(&path)?.to_rgba8();
        debug!(path = %path.display(), "Loaded gaze asset");
        Ok(LoadedAsset::new(filename, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_loader_reads_image() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let img = RgbaImage::from_pixel(8, 6, image::Rgba([1, 2, 3, 255]));
        img.save(temp_dir.path().join("gaze_px0p0_py0p0_8.png")).unwrap();

        let loader = DirAssetLoader::new(temp_dir.path());
        let asset = loader.load("gaze_px0p0_py0p0_8.png").unwrap();
        assert_eq!((asset.width, asset.height), (8, 6));
        assert_eq!(asset.filename, "gaze_px0p0_py0p0_8.png");
    }

    #[test]
    fn test_dir_loader_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let loader = DirAssetLoader::new(temp_dir.path());
        assert!(matches!(
            loader.load("gaze_px3p0_py0p0_256.webp"),
            Err(crate::Error::MissingAsset(_))
        ));
    }

    #[test]
    fn test_dir_loader_corrupt_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("broken.png"), b"not a png").unwrap();
        let loader = DirAssetLoader::new(temp_dir.path());
        assert!(matches!(loader.load("broken.png"), Err(crate::Error::Image(_))));
    }

    #[test]
    fn test_asset_state_accessors() {
        let cell = GridCell::new(1, 2);
        let loading = AssetState::Loading {
            cell,
            filename: "a.webp".to_string(),
        };
        assert!(loading.is_loading());
        assert_eq!(loading.cell(), Some(cell));
        assert_eq!(loading.filename(), Some("a.webp"));

        let failed = AssetState::Failed {
            cell,
            error: "gone".to_string(),
        };
        assert_eq!(failed.error(), Some("gone"));
        assert_eq!(AssetState::Idle.cell(), None);
    }
}
