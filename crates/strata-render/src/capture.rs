//! Frame capture to images.

use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::error::{RenderError, RenderResult};
use crate::frame::Frame;

/// Reads a frame back into an image with a top-left origin. Blocks.
pub fn frame_to_image(frame: &Frame<'_>) -> RenderResult<RgbaImage> {
    let (width, height) = frame.size();
    let pixels = frame.read_pixels(0, 0, width, height);
    // Backend rows run bottom-up.
    let row = width as usize * 4;
    let mut flipped = Vec::with_capacity(pixels.len());
    for chunk in pixels.chunks_exact(row).rev() {
        flipped.extend_from_slice(chunk);
    }
    let image: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, flipped)
        .ok_or_else(|| RenderError::Capture(format!("{width}x{height} readback was short")))?;
    Ok(image)
}

/// Writes a frame to `path`. PNG keeps alpha, JPEG drops it.
///
/// # Errors
/// Returns [`RenderError::Capture`] for any other extension.
pub fn save_frame(frame: &Frame<'_>, path: impl AsRef<Path>) -> RenderResult<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let image = frame_to_image(frame)?;
    match extension.as_str() {
        "png" => image.save_with_format(path, ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            let rgb = image::DynamicImage::ImageRgba8(image).to_rgb8();
            rgb.save_with_format(path, ImageFormat::Jpeg)?;
        }
        _ => return Err(RenderError::Capture(format!("unsupported format '{extension}'"))),
    }
    log::info!("saved {} frame to {}", extension, path.display());
    Ok(())
}

/// Encodes a frame as PNG in memory.
pub fn frame_to_png(frame: &Frame<'_>) -> RenderResult<Vec<u8>> {
    let image = frame_to_image(frame)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
