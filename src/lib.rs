//! # Fader Link
//!
//! Host/device synchronization for a motorized eight-fader volume controller.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                               HOST AGENT                                  │
//! │   Audio sessions (pid, name, volume, mute, icon)      (host::HostPeer)    │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     │ 64-byte frames
//!                                     │ [version|seq|type|payload]
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                              CONTROLLER                                   │
//! │  ┌────────────────────────────────────────────────────────────────────┐  │
//! │  │            Transport (transport::{channel, stream})                 │  │
//! │  └───────────────┬───────────────────────────────────▲────────────────┘  │
//! │                  ▼                                   │                   │
//! │  ┌─────────────────────────┐             ┌───────────┴───────────┐       │
//! │  │  codec::decode          │             │  codec::FrameEncoder  │       │
//! │  └───────────┬─────────────┘             └───────────▲───────────┘       │
//! │              ▼                                       │                   │
//! │  ┌────────────────────────────────────────────────────────────────────┐  │
//! │  │                   Dispatch Loop (device)                            │  │
//! │  │   PendingFrameQueue        Outbox        InputSampler               │  │
//! │  └──────┬────────────────────────────┬────────────────────────────────┘  │
//! │         ▼                            ▼                                   │
//! │  ┌──────────────────┐    ┌────────────────────────────────────────┐     │
//! │  │ Bulk transfers   │    │  Channel reconciliation (channels)     │     │
//! │  │ (transfer)       │───▶│  Slot 0    Slot 1   ...   Slot 7       │     │
//! │  │ enumeration/icon │    │  master    session        session      │     │
//! │  └──────────────────┘    └───────────────────┬────────────────────┘     │
//! │                                              ▼                           │
//! │  ┌────────────────────────────────────────────────────────────────────┐  │
//! │  │        Channel actuator (motor, LEDs, display, touch sensor)        │  │
//! │  └────────────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod actuator;
pub mod channels;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
#[cfg(feature = "host")]
pub mod host;
pub mod protocol;
pub mod transfer;
pub mod transport;

pub use error::{Error, Result};

/// Protocol and hardware constants
pub mod constants {
    /// Protocol version stamped on every frame
    pub const API_VERSION: u8 = 1;

    /// Size of every frame on the wire
    pub const FRAME_SIZE: usize = 64;

    /// Bytes available after the 4-byte header
    pub const PAYLOAD_SIZE: usize = FRAME_SIZE - 4;

    /// Longest session name carried on the wire, in bytes
    pub const NAME_LENGTH_MAX: usize = 20;

    /// Capacity of the session directory
    pub const MAX_SESSIONS: usize = 50;

    /// Physical channels, master included
    pub const CHANNEL_COUNT: usize = 8;

    /// Index of the master channel
    pub const MASTER_SLOT: usize = 0;

    /// Icon edge length in pixels
    pub const ICON_SIZE: usize = 128;

    /// Decompressed icon size (RGB565)
    pub const ICON_BYTES: usize = ICON_SIZE * ICON_SIZE * 2;

    /// Largest compressed icon the controller accepts
    pub const COMPRESSION_BUFFER_SIZE: usize = ICON_BYTES * 21 / 20 + 66;

    /// Raw icon bytes per chunk
    pub const ICON_CHUNK_SIZE: usize = PAYLOAD_SIZE;

    /// Frames deferred while a bulk transfer is active
    pub const PENDING_QUEUE_CAPACITY: usize = 10;

    /// Maximum volume value
    pub const VOLUME_MAX: u8 = 100;

    /// Sessions shown per menu page
    pub const ITEMS_PER_PAGE: usize = 8;

    /// Minimum time between fader reports for one channel
    pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

    /// Resend interval for an unanswered enumeration request
    pub const DEFAULT_ENUMERATION_RETRY_MS: u64 = 100;

    /// Resend interval for an unanswered icon request
    pub const DEFAULT_ICON_RETRY_MS: u64 = 1000;

    /// Icon requests sent before falling back to the placeholder
    pub const DEFAULT_ICON_ATTEMPTS: u32 = 3;

    /// Dispatch loop period
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5;

    /// Touch reading over baseline required to count as touched
    pub const DEFAULT_TOUCH_SENSITIVITY: f32 = 1.5;

    /// Fader positions at or below this are ignored while touched
    pub const DEFAULT_POSITION_DEADBAND: u8 = 5;

    /// Outbound frames flushed per tick
    pub const DEFAULT_FRAMES_OUT_PER_TICK: usize = 8;

    /// Default TCP address for the bring-up binaries
    pub const DEFAULT_ADDRESS: &str = "127.0.0.1:7878";
}
