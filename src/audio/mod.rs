//! Audio decode, validation, and serialization

pub mod buffer;
pub mod decode;
pub mod wav;

pub use buffer::DecodedAudio;
pub use decode::{validate, AudioAsset, Validation};
