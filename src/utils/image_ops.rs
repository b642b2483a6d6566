use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::core::config::ImageConfig;
use crate::core::errors::ImageProcessingError;
use crate::core::types::{NormalizedImage, RawImage};

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Shrink `img` to fit inside a `max_dimension` square, keeping aspect ratio.
///
/// Images already inside the box are returned untouched (no upscaling).
pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Encode to baseline JPEG. Alpha is dropped since JPEG has no alpha channel.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, quality)
        .encode_image(&rgb)
        .context("Failed to encode image as JPEG")?;
    Ok(jpeg_bytes)
}

pub fn to_data_uri(jpeg_bytes: &[u8]) -> String {
    let encoded = general_purpose::STANDARD.encode(jpeg_bytes);
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + encoded.len());
    uri.push_str(JPEG_DATA_URI_PREFIX);
    uri.push_str(&encoded);
    uri
}

/// Decode, resize and re-encode one upload into a JPEG data URI.
///
/// Checks run in a fixed order: decode/encode, then the size guard, then the
/// declared media type. A file that decodes fine but was uploaded with a
/// non-image type is therefore reported as `UnsupportedType`, not
/// `ProcessingFailed`.
pub fn normalize_image_sync(
    raw: &RawImage,
    config: &ImageConfig,
) -> Result<NormalizedImage, ImageProcessingError> {
    let decoded =
        image::load_from_memory(&raw.bytes).map_err(|_| ImageProcessingError::ProcessingFailed)?;
    let resized = fit_within(decoded, config.max_dimension);
    let jpeg_bytes = encode_jpeg(&resized, config.jpeg_quality)
        .map_err(|_| ImageProcessingError::ProcessingFailed)?;
    let data_uri = to_data_uri(&jpeg_bytes);

    if data_uri.len() > config.max_data_uri_chars {
        return Err(ImageProcessingError::TooLarge);
    }

    // Media types are case-insensitive
    if !raw.mime_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ImageProcessingError::UnsupportedType);
    }

    Ok(NormalizedImage {
        source_name: raw.name.clone(),
        data_uri,
    })
}

/// Run [`normalize_image_sync`] on the blocking pool.
///
/// Decoding and resizing a phone photo takes tens of milliseconds of CPU and
/// would otherwise stall the async runtime.
pub async fn normalize_image_async(
    raw: RawImage,
    config: ImageConfig,
) -> Result<NormalizedImage, ImageProcessingError> {
    tokio::task::spawn_blocking(move || normalize_image_sync(&raw, &config))
        .await
        .map_err(|_| ImageProcessingError::ProcessingFailed)?
}
