//! Track payload decoder
//!
//! Fetches the encoded bytes behind a content locator, decodes them to
//! planar f32 with Symphonia and resamples to the processing context's rate.
//! Decoding runs on the blocking pool so the async caller only suspends.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::buffer::DecodedBuffer;
use crate::codec::locator::{path_extension, ContentLocator};
use crate::constants::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::error::DecodeError;

/// Fallback when the container does not state a sample rate
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Decoder for track payloads
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    max_payload_bytes: usize,
    /// Whether `file://` URLs and bare paths may be read
    file_locators: bool,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl AudioDecoder {
    /// Decoder accepting inline `data:` payloads only
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            max_payload_bytes,
            file_locators: false,
        }
    }

    /// Also accept local file locators. Only for trusted callers such as the CLI.
    pub fn with_file_locators(mut self, allow: bool) -> Self {
        self.file_locators = allow;
        self
    }

    pub fn allows_file_locators(&self) -> bool {
        self.file_locators
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Fetch, decode and resample one payload for a context running at `target_rate`
    pub async fn decode(
        &self,
        locator: &str,
        filename: Option<&str>,
        target_rate: u32,
    ) -> Result<Arc<DecodedBuffer>, DecodeError> {
        let locator = ContentLocator::parse(locator)?;
        let hint = locator
            .extension_hint()
            .or_else(|| filename.and_then(|f| path_extension(Path::new(f))));

        let bytes = self.fetch(&locator).await?;
        tracing::debug!("Fetched {} bytes (format hint: {:?})", bytes.len(), hint);

        let buffer = tokio::task::spawn_blocking(move || {
            let decoded = decode_bytes(bytes, hint.as_deref())?;
            resample(decoded, target_rate)
        })
        .await
        .map_err(|e| DecodeError::TaskFailed(e.to_string()))??;

        tracing::debug!(
            "Decoded {} frames x {} channels at {}Hz ({:.2}s)",
            buffer.frames(),
            buffer.channel_count(),
            buffer.sample_rate(),
            buffer.duration_secs()
        );

        Ok(buffer.into_shared())
    }

    /// Retrieve the raw encoded bytes
    pub async fn fetch(&self, locator: &ContentLocator) -> Result<Vec<u8>, DecodeError> {
        if matches!(locator, ContentLocator::File(_)) && !self.file_locators {
            return Err(DecodeError::UnsupportedLocator(
                "local file paths are not accepted".to_string(),
            ));
        }
        if let Some(len) = locator.estimated_len() {
            self.check_size(len)?;
        }

        let bytes = match locator.inline_bytes() {
            Some(bytes) => bytes?,
            None => {
                let ContentLocator::File(path) = locator else {
                    return Err(DecodeError::UnsupportedLocator(format!("{:?}", locator)));
                };
                let metadata = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| DecodeError::Unreachable(format!("{}: {}", path.display(), e)))?;
                self.check_size(metadata.len() as usize)?;
                tokio::fs::read(path)
                    .await
                    .map_err(|e| DecodeError::Unreachable(format!("{}: {}", path.display(), e)))?
            }
        };

        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn check_size(&self, size: usize) -> Result<(), DecodeError> {
        if size > self.max_payload_bytes {
            return Err(DecodeError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }
}

fn map_symphonia(err: SymphoniaError) -> DecodeError {
    match err {
        SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat(what.to_string()),
        other => DecodeError::Malformed(other.to_string()),
    }
}

/// Decode an encoded payload to planar f32 at its native rate
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(map_symphonia)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(map_symphonia)?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channel_count = 0;
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(map_symphonia(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let count = spec.channels.count();
                if count == 0 {
                    continue;
                }
                sample_rate.get_or_insert(spec.rate);
                if channel_count == 0 {
                    channel_count = count;
                } else if count != channel_count {
                    tracing::warn!(
                        "Channel count changed from {} to {}, skipping packet",
                        channel_count,
                        count
                    );
                    continue;
                }

                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(samples.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => return Err(map_symphonia(e)),
        }
    }

    let rate = sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE);
    let buffer = DecodedBuffer::from_interleaved(&interleaved, channel_count, rate);
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(buffer)
}

/// Convert a buffer to `target_rate`, returning it untouched when rates match
pub fn resample(buffer: DecodedBuffer, target_rate: u32) -> Result<DecodedBuffer, DecodeError> {
    let source_rate = buffer.sample_rate();
    if source_rate == target_rate || buffer.is_empty() || target_rate == 0 {
        return Ok(buffer);
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let frames = buffer.frames();
    let channel_count = buffer.channel_count();

    tracing::debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        frames,
        source_rate,
        target_rate,
        channel_count
    );

    let mut resampler =
        FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, frames, channel_count)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let mut planes = resampler
        .process(buffer.planes(), None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    let tail = resampler
        .process_partial::<Vec<f32>>(None, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let expected = (frames as f64 * ratio).round() as usize;
    for (plane, rest) in planes.iter_mut().zip(tail) {
        plane.extend(rest);
        plane.drain(..delay.min(plane.len()));
        plane.truncate(expected);
    }

    Ok(DecodedBuffer::new(planes, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wav_bytes, wav_data_uri};

    #[tokio::test]
    async fn test_decode_wav_data_uri() {
        let uri = wav_data_uri(4_410, 44_100, 2);
        let buffer = AudioDecoder::default().decode(&uri, None, 44_100).await.unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 4_410);
        assert_eq!(buffer.sample_rate(), 44_100);
        assert!((buffer.duration_secs() - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_decode_resamples_to_context_rate() {
        let uri = wav_data_uri(8_000, 8_000, 1);
        let buffer = AudioDecoder::default().decode(&uri, None, 16_000).await.unwrap();

        assert_eq!(buffer.sample_rate(), 16_000);
        assert_eq!(buffer.frames(), 16_000);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_decode_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(800, 8_000, 1)).unwrap();

        let buffer = AudioDecoder::default()
            .with_file_locators(true)
            .decode(path.to_str().unwrap(), None, 8_000)
            .await
            .unwrap();
        assert_eq!(buffer.frames(), 800);
    }

    #[tokio::test]
    async fn test_file_locators_rejected_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(800, 8_000, 1)).unwrap();

        let decoder = AudioDecoder::default();
        assert!(!decoder.allows_file_locators());
        for locator in [path.to_str().unwrap().to_string(), format!("file://{}", path.display())] {
            let result = decoder.decode(&locator, None, 8_000).await;
            assert!(matches!(result, Err(DecodeError::UnsupportedLocator(_))));
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_unreachable() {
        let result = AudioDecoder::default()
            .with_file_locators(true)
            .decode("/nonexistent/phantom/track.wav", None, 48_000)
            .await;
        assert!(matches!(result, Err(DecodeError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_garbage_payload_fails() {
        // "not audio" in base64
        let result = AudioDecoder::default()
            .decode("data:audio/wav;base64,bm90IGF1ZGlv", None, 48_000)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_payload_size_limit() {
        let uri = wav_data_uri(4_000, 8_000, 1);
        let result = AudioDecoder::new(1_024).decode(&uri, None, 8_000).await;
        assert!(matches!(result, Err(DecodeError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let buffer = DecodedBuffer::mono(vec![0.1, 0.2, 0.3], 48_000);
        assert_eq!(resample(buffer.clone(), 48_000).unwrap(), buffer);
    }
}
