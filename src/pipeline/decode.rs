//! Image decoding and re-encoding for the OCR engine.
//!
//! Page files are named `.webp` but hosts do not always honour that, and a
//! reused cache may hold PNG or JPEG. Decoding therefore sniffs the content
//! instead of trusting the extension. Before OCR the decoded image is
//! re-encoded as PNG: lossless, and readable by every Tesseract build
//! (WebP support depends on how its Leptonica was compiled).

use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// A decoded page plus the container format it was stored in.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
}

/// Open and decode an image file, detecting its format from the content.
///
/// Blocking: call from `spawn_blocking` inside async code.
pub fn decode_file(path: &Path) -> Result<DecodedImage, image::ImageError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let image = reader.decode()?;
    debug!(
        "Decoded {} → format {:?}, {}x{} px, {:?}",
        path.display(),
        format,
        image.width(),
        image.height(),
        image.color()
    );
    Ok(DecodedImage { image, format })
}

/// Encode a decoded page as PNG bytes for the OCR engine.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded page → {} bytes PNG", buf.len());
    Ok(buf)
}
