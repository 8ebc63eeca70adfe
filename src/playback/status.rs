//! Human-readable status messages
//!
//! Wording is a presentation concern; the categories are what callers rely
//! on, so each message carries a [`StatusKind`] next to its text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::graph::TrackMode;
use crate::error::ValidationError;

/// Language for status text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

/// Category of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Ready,
    Playing,
    Stopped,
    ValidationError,
    OutputError,
}

/// Outcome of an entry-point call
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// Nothing requested yet
    Ready,
    /// Playback started in the given mode; decoding continues in the background
    Playing(TrackMode),
    /// Playback stopped on request
    Stopped,
    /// The request was rejected before any side effect
    Invalid(ValidationError),
    /// No processing context could be created
    OutputUnavailable(String),
}

impl StatusMessage {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusMessage::Ready => StatusKind::Ready,
            StatusMessage::Playing(_) => StatusKind::Playing,
            StatusMessage::Stopped => StatusKind::Stopped,
            StatusMessage::Invalid(_) => StatusKind::ValidationError,
            StatusMessage::OutputUnavailable(_) => StatusKind::OutputError,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusMessage::Invalid(_) | StatusMessage::OutputUnavailable(_))
    }

    /// Message text in the given language
    pub fn render(&self, locale: Locale) -> String {
        match locale {
            Locale::Es => self.render_es(),
            Locale::En => self.render_en(),
        }
    }

    fn render_es(&self) -> String {
        match self {
            StatusMessage::Ready => "Listo para reproducir audio.".to_string(),
            StatusMessage::Playing(TrackMode::Single) => {
                "Reproduciendo pista única con efecto de palabras fantasma...".to_string()
            }
            StatusMessage::Playing(TrackMode::Dual) => {
                "Reproduciendo pistas duales con efecto de palabras fantasma...".to_string()
            }
            StatusMessage::Stopped => "Reproducción de audio detenida.".to_string(),
            StatusMessage::Invalid(ValidationError::MissingSecondTrack) => {
                "Error: Modo de pistas duales seleccionado pero falta la Pista 2. \
                 Por favor suba un segundo archivo de audio."
                    .to_string()
            }
            StatusMessage::Invalid(ValidationError::MissingParameters) => {
                "Error: Faltan parámetros requeridos. Por favor asegúrese de que todas \
                 las configuraciones estén completas."
                    .to_string()
            }
            StatusMessage::Invalid(ValidationError::InvalidMode(mode)) => {
                format!("Error: Modo de pista no válido: {}.", mode)
            }
            StatusMessage::Invalid(ValidationError::InvalidNumber { field, value }) => {
                format!("Error: Valor numérico no válido para {}: {}.", field, value)
            }
            StatusMessage::Invalid(ValidationError::InvalidSpeed { field, value }) => {
                format!("Error: Velocidad de reproducción no válida para {}: {}.", field, value)
            }
            StatusMessage::Invalid(ValidationError::InvalidPayload { field, .. }) => {
                format!("Error: Los datos de audio de {} no son válidos.", field)
            }
            StatusMessage::OutputUnavailable(reason) => {
                format!("Error: No se pudo abrir la salida de audio ({}).", reason)
            }
        }
    }

    fn render_en(&self) -> String {
        match self {
            StatusMessage::Ready => "Ready to play audio.".to_string(),
            StatusMessage::Playing(TrackMode::Single) => {
                "Playing single track with phantom words effect...".to_string()
            }
            StatusMessage::Playing(TrackMode::Dual) => {
                "Playing dual tracks with phantom words effect...".to_string()
            }
            StatusMessage::Stopped => "Audio playback stopped.".to_string(),
            StatusMessage::Invalid(ValidationError::MissingSecondTrack) => {
                "Error: Dual track mode selected but Track 2 is missing. \
                 Please upload a second audio file."
                    .to_string()
            }
            StatusMessage::Invalid(ValidationError::MissingParameters) => {
                "Error: Missing required parameters. Please make sure all settings are complete."
                    .to_string()
            }
            StatusMessage::Invalid(err) => format!("Error: {}.", err),
            StatusMessage::OutputUnavailable(reason) => {
                format!("Error: Could not open audio output ({}).", reason)
            }
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Locale::default()))
    }
}
