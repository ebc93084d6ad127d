//! Frame and icon codecs
//!
//! Converts between typed [`Message`](crate::protocol::Message)s and wire
//! frames, and compresses icon bitmaps for bulk transfer.

pub mod decoder;
pub mod encoder;
pub mod icon;

pub use decoder::{decode, Decoded};
pub use encoder::FrameEncoder;
pub use icon::IconBitmap;
