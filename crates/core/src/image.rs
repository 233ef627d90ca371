//! Image parts for multimodal user messages.
//!
//! An image is always sent to the model as a URL: either one the model can
//! fetch, or the bytes inlined as a base64 `data:` URL. Every part carries a
//! MIME type.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

/// MIME type used when nothing better can be determined.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// An image attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    /// `http(s)://…` or `data:<mime>;base64,…`
    pub url: String,

    /// e.g. `image/png`
    pub mime_type: String,
}

impl ImagePart {
    /// An image the model fetches itself.
    pub fn url(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Inline the bytes as a base64 data URL.
    pub fn inline(bytes: &[u8], mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .filter(|m| is_image_mime(m))
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string();
        let url = format!("data:{};base64,{}", mime_type, BASE64.encode(bytes));
        Self { url, mime_type }
    }
}

/// Resolve the MIME type of an uploaded image.
///
/// Order: the declared content type (if it is an `image/*` type), then the
/// file extension, then [`DEFAULT_IMAGE_MIME`].
pub fn resolve_mime_type(declared: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(mime) = declared.map(str::trim).filter(|m| is_image_mime(m)) {
        return mime.to_ascii_lowercase();
    }

    file_name
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| mime_for_extension(ext))
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string()
}

fn is_image_mime(mime: &str) -> bool {
    mime.to_ascii_lowercase().starts_with("image/") && mime.len() > "image/".len()
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}
