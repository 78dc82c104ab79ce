use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::config::TextureFormat;
use crate::error::Result;
use crate::types::TextureData;

/// Encode an atlas image (already in top-down row order) as `format`.
pub fn encode_texture(image: &RgbaImage, format: TextureFormat) -> Result<TextureData> {
    let (image_format, mime_type) = match format {
        TextureFormat::Png => (ImageFormat::Png, "image/png"),
        TextureFormat::WebP => (ImageFormat::WebP, "image/webp"),
    };

    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, image_format)?;

    let (width, height) = image.dimensions();
    Ok(TextureData {
        data: buf.into_inner(),
        mime_type: mime_type.into(),
        width,
        height,
    })
}
