//! Image payloads
//! アップロード画像 / data URL <-> base64 + MIME

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid base64")]
    InvalidBase64,
    #[error("malformed data URL")]
    MalformedDataUrl,
}

/// Gemini の inlineData にそのまま渡せる画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    /// アップロードされたバイト列から生成
    pub fn from_bytes(bytes: &[u8], declared_mime: Option<&str>) -> Result<Self, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        Ok(Self {
            mime_type: sniff_mime(bytes, declared_mime),
            data: STANDARD.encode(bytes),
        })
    }

    /// `data:image/png;base64,...` もしくは素の base64 文字列を受け付ける
    pub fn parse(input: &str, declared_mime: Option<&str>) -> Result<Self, MediaError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MediaError::Empty);
        }

        let (header_mime, encoded) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, encoded) = rest.split_once(',').ok_or(MediaError::MalformedDataUrl)?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(MediaError::MalformedDataUrl)?;
                (Some(mime.to_string()).filter(|m| !m.is_empty()), encoded)
            }
            None => (None, input),
        };

        if encoded.is_empty() {
            return Err(MediaError::Empty);
        }

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| MediaError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        let mime_type = match header_mime.as_deref().or(declared_mime) {
            Some(mime) => mime.to_string(),
            None => sniff_mime(&bytes, None),
        };

        Ok(Self {
            mime_type,
            data: encoded.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        data_url(&self.mime_type, &self.data)
    }
}

pub fn data_url(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Content-Type を推定（不明なら申告値 → JPEG）
fn sniff_mime(bytes: &[u8], declared: Option<&str>) -> String {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png".to_string(),
        Ok(ImageFormat::Jpeg) => "image/jpeg".to_string(),
        Ok(ImageFormat::WebP) => "image/webp".to_string(),
        Ok(ImageFormat::Gif) => "image/gif".to_string(),
        _ => declared
            .filter(|m| m.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn sniffs_png_uploads() {
        let payload =
            ImagePayload::from_bytes(&PNG_MAGIC, Some("application/octet-stream")).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&payload.data).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn unknown_bytes_default_to_jpeg() {
        let payload = ImagePayload::from_bytes(b"not really an image", None).unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
    }

    #[test]
    fn parses_data_urls() {
        let encoded = STANDARD.encode(b"pixels");
        let url = format!("data:image/webp;base64,{}", encoded);
        let payload = ImagePayload::parse(&url, None).unwrap();
        assert_eq!(payload.mime_type, "image/webp");
        assert_eq!(payload.data, encoded);
        assert_eq!(payload.to_data_url(), format!("data:image/webp;base64,{}", encoded));
    }

    #[test]
    fn bare_base64_uses_declared_mime() {
        let encoded = STANDARD.encode(b"pixels");
        let payload = ImagePayload::parse(&encoded, Some("image/png")).unwrap();
        assert_eq!(payload.mime_type, "image/png");
    }

    #[test]
    fn rejects_empty_and_undecodable_input() {
        assert_eq!(ImagePayload::parse("   ", None), Err(MediaError::Empty));
        assert_eq!(ImagePayload::parse("data:image/png;base64,", None), Err(MediaError::Empty));
        assert_eq!(ImagePayload::parse("%%%not-base64%%%", None), Err(MediaError::InvalidBase64));
        assert_eq!(
            ImagePayload::parse("data:image/png,abc", None),
            Err(MediaError::MalformedDataUrl)
        );
        assert_eq!(ImagePayload::from_bytes(&[], None), Err(MediaError::Empty));
    }
}
