//! Content locators for track payloads
//!
//! Uploaded tracks arrive as `data:` URIs; the CLI passes file paths.

use base64::{engine::general_purpose, Engine as _};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

use crate::error::DecodeError;

/// Where a track's encoded bytes live
#[derive(Debug, Clone, PartialEq)]
pub enum ContentLocator {
    /// Inline `data:[<mime>][;base64],<payload>` URI
    DataUri {
        mime: Option<String>,
        base64: bool,
        payload: String,
    },
    /// Local file, from a `file://` URL or a bare path
    File(PathBuf),
}

impl ContentLocator {
    pub fn parse(locator: &str) -> Result<Self, DecodeError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(DecodeError::UnsupportedLocator("empty locator".to_string()));
        }

        if let Some(rest) = locator.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                DecodeError::Malformed("data URI has no ',' separator".to_string())
            })?;

            let mut params = header.split(';');
            let mime = params
                .next()
                .filter(|m| m.contains('/'))
                .map(|m| m.to_ascii_lowercase());
            let base64 = header.split(';').any(|p| p.eq_ignore_ascii_case("base64"));

            return Ok(ContentLocator::DataUri {
                mime,
                base64,
                payload: payload.to_string(),
            });
        }

        if let Some(path) = locator.strip_prefix("file://") {
            return Ok(ContentLocator::File(PathBuf::from(path)));
        }

        if locator.contains("://") {
            return Err(DecodeError::UnsupportedLocator(
                locator.split("://").next().unwrap_or_default().to_string(),
            ));
        }

        Ok(ContentLocator::File(PathBuf::from(locator)))
    }

    /// File extension to hint the format prober with
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            ContentLocator::DataUri { mime, .. } => {
                mime.as_deref().and_then(mime_extension).map(str::to_string)
            }
            ContentLocator::File(path) => path_extension(path),
        }
    }

    /// Size of the payload in bytes, if knowable without reading it
    pub fn estimated_len(&self) -> Option<usize> {
        match self {
            ContentLocator::DataUri { base64: true, payload, .. } => Some(payload.len() / 4 * 3),
            ContentLocator::DataUri { payload, .. } => Some(payload.len()),
            ContentLocator::File(_) => None,
        }
    }

    /// Raw bytes of an inline payload
    pub fn inline_bytes(&self) -> Option<Result<Vec<u8>, DecodeError>> {
        match self {
            ContentLocator::DataUri { base64: true, payload, .. } => {
                let cleaned: String = payload
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                Some(
                    general_purpose::STANDARD
                        .decode(cleaned.as_bytes())
                        .map_err(|e| {
                            DecodeError::Malformed(format!("invalid base64 payload: {}", e))
                        }),
                )
            }
            ContentLocator::DataUri { payload, .. } => {
                Some(Ok(percent_decode_str(payload).collect()))
            }
            ContentLocator::File(_) => None,
        }
    }
}

/// Extension of a file name, lower-cased
pub fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn mime_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/ogg" | "application/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}
