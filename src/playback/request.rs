//! Playback requests
//!
//! The host UI submits every field as text (slider values, stored upload
//! JSON). [`PlaybackForm`] carries that raw form; [`PlaybackForm::validate`]
//! turns it into a typed [`PlaybackRequest`] or a [`ValidationError`] before
//! anything else happens.

use serde::{Deserialize, Deserializer, Serialize};

use crate::audio::graph::{TrackMode, TrackRole};
use crate::error::ValidationError;

/// Raw playback form as submitted by the host UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackForm {
    /// Play-button click counter; absent or zero means "not clicked"
    #[serde(default)]
    pub click: Option<u64>,
    #[serde(default, deserialize_with = "text_field")]
    pub delay: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub loops: Option<String>,
    /// Track 1 payload JSON: `{"content": "<locator>", "filename": ...}`
    #[serde(default, deserialize_with = "text_field")]
    pub track1: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub track2: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub speed1: Option<String>,
    #[serde(default, deserialize_with = "text_field")]
    pub speed2: Option<String>,
}

/// Accept strings, numbers and null for a text form field
fn text_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Stored upload as the dashboard serializes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    /// Fetchable locator for the encoded audio, usually a data URI
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// One validated input track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub locator: String,
    pub filename: Option<String>,
    pub speed: f64,
    pub role: TrackRole,
}

/// Validated playback request
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub delay_ms: u32,
    /// Number of passes; 1 plays once
    pub loop_count: u32,
    pub mode: TrackMode,
    pub track1: TrackSpec,
    /// Present iff `mode` is dual
    pub track2: Option<TrackSpec>,
}

impl PlaybackRequest {
    /// Tracks in role order
    pub fn tracks(&self) -> Vec<&TrackSpec> {
        std::iter::once(&self.track1).chain(self.track2.as_ref()).collect()
    }
}

/// `None` for absent or blank fields
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_whole(field: &'static str, value: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    if let Ok(n) = value.parse::<u32>() {
        return Ok(n);
    }
    // Sliders may serialize whole numbers as "200.0"
    let n = value.parse::<f64>().map_err(|_| invalid())?;
    if !n.is_finite() || n < 0.0 || n > u32::MAX as f64 {
        return Err(invalid());
    }
    Ok(n.trunc() as u32)
}

fn parse_speed(field: &'static str, value: &str) -> Result<f64, ValidationError> {
    match value.parse::<f64>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => Ok(speed),
        _ => Err(ValidationError::InvalidSpeed {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_payload(field: &'static str, value: &str) -> Result<TrackPayload, ValidationError> {
    let payload: TrackPayload =
        serde_json::from_str(value).map_err(|e| ValidationError::InvalidPayload {
            field,
            reason: e.to_string(),
        })?;
    if payload.content.trim().is_empty() {
        return Err(ValidationError::InvalidPayload {
            field,
            reason: "empty content".to_string(),
        });
    }
    Ok(payload)
}

pub fn parse_mode(value: &str) -> Result<TrackMode, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "single" => Ok(TrackMode::Single),
        "dual" => Ok(TrackMode::Dual),
        _ => Err(ValidationError::InvalidMode(value.to_string())),
    }
}

impl PlaybackForm {
    /// Whether the play button has actually been pressed
    pub fn is_click(&self) -> bool {
        self.click.unwrap_or(0) > 0
    }

    /// Validate the form without side effects
    pub fn validate(&self) -> Result<PlaybackRequest, ValidationError> {
        let (Some(delay), Some(loops), Some(track1), Some(mode), Some(speed1)) = (
            present(&self.delay),
            present(&self.loops),
            present(&self.track1),
            present(&self.mode),
            present(&self.speed1),
        ) else {
            return Err(ValidationError::MissingParameters);
        };

        let mode = parse_mode(mode)?;
        let second = match mode {
            TrackMode::Single => None,
            TrackMode::Dual => match (present(&self.track2), present(&self.speed2)) {
                (Some(track2), Some(speed2)) => Some((track2, speed2)),
                _ => return Err(ValidationError::MissingSecondTrack),
            },
        };

        let delay_ms = parse_whole("delay", delay)?;
        let loop_count = parse_whole("loops", loops)?.max(1);

        let payload1 = parse_payload("track1", track1)?;
        let track1 = TrackSpec {
            locator: payload1.content,
            filename: payload1.filename,
            speed: parse_speed("speed1", speed1)?,
            role: TrackRole::Track1,
        };

        let track2 = match second {
            Some((track2, speed2)) => {
                let payload2 = parse_payload("track2", track2)?;
                Some(TrackSpec {
                    locator: payload2.content,
                    filename: payload2.filename,
                    speed: parse_speed("speed2", speed2)?,
                    role: TrackRole::Track2,
                })
            }
            None => None,
        };

        Ok(PlaybackRequest {
            delay_ms,
            loop_count,
            mode,
            track1,
            track2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload(content: &str) -> String {
        serde_json::json!({ "content": content, "filename": "a.wav" }).to_string()
    }

    fn single_form() -> PlaybackForm {
        PlaybackForm {
            click: Some(1),
            delay: Some("200".into()),
            loops: Some("10".into()),
            track1: Some(payload("data:audio/wav;base64,AAAA")),
            track2: None,
            mode: Some("single".into()),
            speed1: Some("1.0".into()),
            speed2: None,
        }
    }

    fn dual_form() -> PlaybackForm {
        PlaybackForm {
            mode: Some("dual".into()),
            track2: Some(payload("data:audio/wav;base64,BBBB")),
            speed2: Some("1.5".into()),
            ..single_form()
        }
    }

    #[test]
    fn test_valid_single_request() {
        let request = single_form().validate().unwrap();
        assert_eq!(request.mode, TrackMode::Single);
        assert_eq!(request.delay_ms, 200);
        assert_eq!(request.loop_count, 10);
        assert_eq!(request.track1.speed, 1.0);
        assert_eq!(request.track1.filename.as_deref(), Some("a.wav"));
        assert!(request.track2.is_none());
        assert_eq!(request.tracks().len(), 1);
    }

    #[test]
    fn test_single_mode_ignores_second_track() {
        let form = PlaybackForm {
            track2: Some(payload("data:,x")),
            speed2: Some("2".into()),
            ..single_form()
        };
        assert!(form.validate().unwrap().track2.is_none());
    }

    #[test]
    fn test_valid_dual_request() {
        let request = dual_form().validate().unwrap();
        let track2 = request.track2.as_ref().unwrap();
        assert_eq!(track2.role, TrackRole::Track2);
        assert_eq!(track2.speed, 1.5);
        assert_eq!(request.tracks().len(), 2);
    }

    #[test]
    fn test_missing_required_fields() {
        for strip in 0..5 {
            let mut form = single_form();
            match strip {
                0 => form.delay = None,
                1 => form.loops = Some("".into()),
                2 => form.track1 = None,
                3 => form.mode = Some("  ".into()),
                _ => form.speed1 = None,
            }
            assert_eq!(form.validate(), Err(ValidationError::MissingParameters));
        }
    }

    #[test]
    fn test_dual_without_second_speed() {
        let form = PlaybackForm {
            speed2: None,
            ..dual_form()
        };
        assert_eq!(form.validate(), Err(ValidationError::MissingSecondTrack));
    }

    #[test]
    fn test_invalid_values() {
        let form = PlaybackForm {
            mode: Some("triple".into()),
            ..single_form()
        };
        assert!(matches!(form.validate(), Err(ValidationError::InvalidMode(_))));

        let form = PlaybackForm {
            delay: Some("-5".into()),
            ..single_form()
        };
        assert!(matches!(
            form.validate(),
            Err(ValidationError::InvalidNumber { field: "delay", .. })
        ));

        let form = PlaybackForm {
            speed1: Some("0".into()),
            ..single_form()
        };
        assert!(matches!(
            form.validate(),
            Err(ValidationError::InvalidSpeed { field: "speed1", .. })
        ));

        let form = PlaybackForm {
            track1: Some("not json".into()),
            ..single_form()
        };
        assert!(matches!(
            form.validate(),
            Err(ValidationError::InvalidPayload { field: "track1", .. })
        ));
    }

    #[test]
    fn test_fractional_and_zero_counts() {
        let form = PlaybackForm {
            delay: Some("150.0".into()),
            loops: Some("0".into()),
            ..single_form()
        };
        let request = form.validate().unwrap();
        assert_eq!(request.delay_ms, 150);
        assert_eq!(request.loop_count, 1);
    }

    #[test]
    fn test_form_accepts_numbers_in_json() {
        let form: PlaybackForm = serde_json::from_str(
            r#"{"click": 3, "delay": 200, "loops": 2, "mode": "dual",
                "speed1": 1.5, "speed2": null}"#,
        )
        .unwrap();
        assert!(form.is_click());
        assert_eq!(form.delay.as_deref(), Some("200"));
        assert_eq!(form.speed1.as_deref(), Some("1.5"));
        assert_eq!(form.speed2, None);
        assert_eq!(form.track1, None);
    }

    #[test]
    fn test_zero_click_is_not_a_click() {
        let form = PlaybackForm {
            click: Some(0),
            ..single_form()
        };
        assert!(!form.is_click());
    }

    proptest! {
        #[test]
        fn prop_dual_without_speed2_always_rejected(
            delay in 0u32..500,
            loops in 1u32..100,
            speed1 in 0.5f64..2.0,
        ) {
            let form = PlaybackForm {
                delay: Some(delay.to_string()),
                loops: Some(loops.to_string()),
                speed1: Some(speed1.to_string()),
                speed2: None,
                ..dual_form()
            };
            prop_assert_eq!(form.validate(), Err(ValidationError::MissingSecondTrack));
        }

        #[test]
        fn prop_valid_single_roundtrips_numbers(delay in 0u32..5_000, loops in 1u32..1_000) {
            let form = PlaybackForm {
                delay: Some(delay.to_string()),
                loops: Some(loops.to_string()),
                ..single_form()
            };
            let request = form.validate().unwrap();
            prop_assert_eq!(request.delay_ms, delay);
            prop_assert_eq!(request.loop_count, loops);
        }
    }
}
