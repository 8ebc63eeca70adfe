//! Track payload decoding
//!
//! Resolves content locators to encoded bytes and decodes them into
//! [`DecodedBuffer`](crate::audio::DecodedBuffer)s at the output rate.

pub mod decoder;
pub mod locator;

pub use decoder::AudioDecoder;
pub use locator::ContentLocator;
