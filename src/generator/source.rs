//! Source face image
//!
//! The model accepts either a URL or inline image data. Local files are
//! validated up front (they must exist and decode as an image) and sent as a
//! base64 data URI.

use base64::Engine;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Source image passed to every generation request
#[derive(Debug, Clone)]
pub enum SourceImage {
    /// Remote image (http/https) or an existing data URI
    Url(String),
    /// Local file, pre-encoded as a data URI
    File {
        path: PathBuf,
        data_uri: String,
        width: u32,
        height: u32,
    },
}

/// Whether an argument should be passed through as a URL
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("data:")
}

impl SourceImage {
    /// Interpret a CLI argument as a URL or a local path
    pub fn from_arg(arg: &str) -> crate::Result<Self> {
        if is_url(arg) {
            Ok(Self::Url(arg.to_string()))
        } else {
            Self::from_path(Path::new(arg))
        }
    }

    /// Load and validate a local image file
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::InvalidSource(format!(
                "image path not found: {}",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)?;
        Self::from_bytes(path, &bytes)
    }

    fn from_bytes(path: &Path, bytes: &[u8]) -> crate::Result<Self> {
        let invalid = |reason: String| {
            crate::Error::InvalidSource(format!("{}: {}", path.display(), reason))
        };

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| invalid(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| invalid("unrecognized image format".to_string()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| invalid(e.to_string()))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data_uri = format!("data:{};base64,{}", format.to_mime_type(), encoded);

        Ok(Self::File {
            path: path.to_path_buf(),
            data_uri,
            width,
            height,
        })
    }

    /// Value for the model's `image` input
    pub fn input_value(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::File { data_uri, .. } => data_uri,
        }
    }

    /// Short human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) if url.starts_with("data:") => "inline data URI".to_string(),
            Self::Url(url) => url.clone(),
            Self::File {
                path,
                width,
                height,
                ..
            } => format!("{} ({}x{})", path.display(), width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba([200, 150, 100, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/me.jpg"));
        assert!(is_url("http://example.com/me.jpg"));
        assert!(is_url("data:image/png;base64,AAAA"));
        assert!(!is_url("./me_512.jpg"));
        assert!(!is_url("/tmp/https.jpg"));
    }

    #[test]
    fn test_from_arg_passes_urls_through() {
        let source = SourceImage::from_arg("https://example.com/me.jpg").unwrap();
        assert_eq!(source.input_value(), "https://example.com/me.jpg");
    }

    #[test]
    fn test_from_path_missing_file_is_invalid_source() {
        let err = SourceImage::from_path(Path::new("/tmp/definitely_missing_face_12345.png"))
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidSource(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_path_rejects_non_image() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("face.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = SourceImage::from_path(&path).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidSource(_)));
    }

    #[test]
    fn test_from_path_builds_data_uri() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = write_png(temp_dir.path(), "face.png", 8, 6);

        let source = SourceImage::from_path(&path).unwrap();
        assert!(source.input_value().starts_with("data:image/png;base64,"));
        match &source {
            SourceImage::File { width, height, .. } => {
                assert_eq!((*width, *height), (8, 6));
            }
            _ => panic!("Expected File source"),
        }
        assert!(source.describe().contains("8x6"));
    }
}
