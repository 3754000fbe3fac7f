//! Resize and encode model output

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Encoding for generated assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless WebP
    #[default]
    Webp,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Webp => ImageFormat::WebP,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

/// Decode `bytes` and resize to an exact `size x size` square (Lanczos3)
pub fn resize_square(bytes: &[u8], size: u32) -> crate::Result<RgbaImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.resize_exact(size, size, FilterType::Lanczos3).to_rgba8())
}

/// Encode an RGBA image
pub fn encode(img: &RgbaImage, format: OutputFormat) -> crate::Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format.image_format())?;
    Ok(buf)
}

/// Write `bytes` to `path` via a sibling `.part` file and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = std::path::PathBuf::from(part);

    if let Err(e) = std::fs::write(&part, bytes) {
        let _ = std::fs::remove_file(&part);
        return Err(e.into());
    }
    std::fs::rename(&part, path)?;
    Ok(())
}

/// Decode, resize, encode and write one model output
pub fn save_resized(bytes: &[u8], path: &Path, size: u32, format: OutputFormat) -> crate::Result<()> {
    let resized = resize_square(bytes, size)?;
    let encoded = encode(&resized, format)?;
    write_atomic(path, &encoded)
}
