use image::codecs::bmp::BmpEncoder;
use image::codecs::tga::TgaEncoder;
use image::{ImageError, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

// ============================================================================
// ERRORS
// ============================================================================

/// Why an uploaded source did not become an image slot.
#[derive(Debug)]
pub enum LoadError {
    Io { path: PathBuf, source: std::io::Error },
    Decode { name: String, reason: String },
    EmptyImage { name: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, source } => write!(f, "could not read '{}': {}", path.display(), source),
            LoadError::Decode { name, reason } => write!(f, "'{}' is not a readable image: {}", name, reason),
            LoadError::EmptyImage { name } => write!(f, "'{}' has no pixels", name),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Export failures.
#[derive(Debug)]
pub enum ExportError {
    NothingProcessed,
    FontUnavailable(String),
    Encode(String),
    Io(std::io::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::NothingProcessed => write!(f, "nothing has been processed yet"),
            ExportError::FontUnavailable(family) => write!(f, "no usable font for family '{}'", family),
            ExportError::Encode(e) => write!(f, "encode error: {}", e),
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        ExportError::Encode(e.to_string())
    }
}

impl From<png::EncodingError> for ExportError {
    fn from(e: png::EncodingError) -> Self {
        ExportError::Encode(format!("PNG: {}", e))
    }
}

impl From<tiff::TiffError> for ExportError {
    fn from(e: tiff::TiffError) -> Self {
        ExportError::Encode(format!("TIFF: {}", e))
    }
}

// ============================================================================
// UPLOAD DECODING
// ============================================================================

/// Decode an uploaded source into RGBA. The format is sniffed from the bytes,
/// so a mislabelled or non-image file fails here rather than later.
pub fn decode_upload(name: &str, bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| LoadError::Decode { name: name.to_string(), reason: e.to_string() })?
        .to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(LoadError::EmptyImage { name: name.to_string() });
    }
    Ok(img)
}

/// Read a file as an upload source: `(file name, bytes)`.
pub fn read_upload(path: &Path) -> Result<(String, Vec<u8>), LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok((name, bytes))
}

// ============================================================================
// LOSSLESS EXPORT ENCODING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Tiff,
    Bmp,
    Tga,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Tiff => "tiff",
            ExportFormat::Bmp => "bmp",
            ExportFormat::Tga => "tga",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "tiff" | "tif" => Some(ExportFormat::Tiff),
            "bmp" => Some(ExportFormat::Bmp),
            "tga" => Some(ExportFormat::Tga),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Lzw,
    Deflate,
}

impl TiffCompression {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "lzw" => TiffCompression::Lzw,
            "deflate" => TiffCompression::Deflate,
            _ => TiffCompression::None,
        }
    }
}

/// Suggested download name: `prefix` + source stem + the format's extension.
pub fn export_filename(prefix: &str, source_name: &str, format: ExportFormat) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}{}.{}", prefix, stem, format.extension())
}

/// Encode into an in-memory buffer.
pub fn encode(image: &RgbaImage, format: ExportFormat, tiff_compression: TiffCompression) -> Result<Vec<u8>, ExportError> {
    let mut cursor = Cursor::new(Vec::new());
    write_encoded(image, &mut cursor, format, tiff_compression)?;
    Ok(cursor.into_inner())
}

/// Encode and write an image to a file.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: ExportFormat,
    tiff_compression: TiffCompression,
) -> Result<(), ExportError> {
    let bytes = encode(image, format, tiff_compression)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn write_encoded(
    image: &RgbaImage,
    writer: &mut Cursor<Vec<u8>>,
    format: ExportFormat,
    tiff_compression: TiffCompression,
) -> Result<(), ExportError> {
    let (w, h) = image.dimensions();
    match format {
        ExportFormat::Png => {
            let mut encoder = png::Encoder::new(writer, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Best);
            let mut png_writer = encoder.write_header()?;
            png_writer.write_image_data(image.as_raw())?;
            png_writer.finish()?;
        }
        ExportFormat::Bmp => {
            let mut encoder = BmpEncoder::new(writer);
            encoder.encode(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        ExportFormat::Tga => {
            let encoder = TgaEncoder::new(writer);
            encoder.encode(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        ExportFormat::Tiff => {
            let mut tiff_enc = tiff::encoder::TiffEncoder::new(writer)?;
            match tiff_compression {
                TiffCompression::None => {
                    tiff_enc.write_image::<tiff::encoder::colortype::RGBA8>(w, h, image.as_raw())?;
                }
                TiffCompression::Lzw => {
                    tiff_enc.write_image_with_compression::<tiff::encoder::colortype::RGBA8, _>(
                        w,
                        h,
                        tiff::encoder::compression::Lzw,
                        image.as_raw(),
                    )?;
                }
                TiffCompression::Deflate => {
                    tiff_enc.write_image_with_compression::<tiff::encoder::colortype::RGBA8, _>(
                        w,
                        h,
                        tiff::encoder::compression::Deflate::default(),
                        image.as_raw(),
                    )?;
                }
            }
        }
    }
    Ok(())
}
