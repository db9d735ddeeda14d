use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, RgbaImage};

/// Download name offered for every export.
pub const EXPORT_FILE_NAME: &str = "chewy-pfp.png";

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Error type for export operations
#[derive(Debug)]
pub enum ExportError {
    Image(ImageError),
    Io(std::io::Error),
    EmptySurface,
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Image(e) => write!(f, "PNG encode error: {}", e),
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::EmptySurface => write!(f, "nothing to export (empty surface)"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        ExportError::Image(e)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Encode `image` as an RGBA PNG into `writer`.
pub fn write_png_to<W: Write>(image: &RgbaImage, writer: W) -> Result<(), ExportError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExportError::EmptySurface);
    }
    PngEncoder::new(writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    write_png_to(image, &mut bytes)?;
    Ok(bytes)
}

/// `data:image/png;base64,...`
pub fn to_data_uri(image: &RgbaImage) -> Result<String, ExportError> {
    let bytes = encode_png(image)?;
    let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    uri.push_str(DATA_URI_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(&bytes, &mut uri);
    Ok(uri)
}

/// Write `image` as PNG to `path`, replacing any existing file.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png_to(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// [`EXPORT_FILE_NAME`] inside `dir`, or in the working directory.
pub fn default_export_path(dir: Option<&Path>) -> PathBuf {
    dir.unwrap_or(Path::new(".")).join(EXPORT_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_bytes_decode_back() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 200]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let back = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(back, img);
    }

    #[test]
    fn data_uri_has_png_prefix() {
        let uri = to_data_uri(&RgbaImage::new(1, 1)).unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn empty_surface_is_rejected() {
        assert!(matches!(encode_png(&RgbaImage::new(0, 0)), Err(ExportError::EmptySurface)));
    }

    #[test]
    fn writes_file_with_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = default_export_path(Some(dir.path()));
        assert_eq!(path.file_name().unwrap(), "chewy-pfp.png");
        write_png(&RgbaImage::new(4, 4), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        assert!(matches!(write_png(&RgbaImage::new(1, 1), &path), Err(ExportError::Io(_))));
    }
}
