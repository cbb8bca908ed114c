//! Chart image handling for Academic Task 1: magic-byte format sniffing
//! and base64 data-URI encoding.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use bandgrade_core::traits::ImageAttachment;

/// Image formats accepted for chart attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Detect the image format from magic bytes, falling back to the filename
/// extension when the signature is unrecognized.
pub fn sniff_format(bytes: &[u8], file_name: Option<&str>) -> Option<ImageFormat> {
    if bytes.starts_with(b"\xff\xd8\xff") {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }

    let ext = file_name?.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "gif" => Some(ImageFormat::Gif),
        "webp" => Some(ImageFormat::Webp),
        _ => None,
    }
}

/// Encode image bytes as a `data:` URI for the vision API.
pub fn to_data_uri(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime(), BASE64.encode(bytes))
}

/// Build a chart attachment, rejecting unsupported formats.
pub fn attachment_from_bytes(bytes: &[u8], file_name: Option<&str>) -> Result<ImageAttachment> {
    let format = sniff_format(bytes, file_name)
        .ok_or_else(|| anyhow::anyhow!("unsupported image format (expected JPEG, PNG, GIF, or WEBP)"))?;
    Ok(ImageAttachment {
        data_uri: to_data_uri(bytes, format),
    })
}
