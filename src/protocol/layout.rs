//! Byte offsets of every field, measured from the start of the frame

use crate::constants::{FRAME_SIZE, NAME_LENGTH_MAX};

const U8: usize = 1;
const U16: usize = 2;
const U32: usize = 4;

/// Fields shared by every frame
pub mod header {
    use super::*;

    pub const VERSION: usize = 0;
    pub const SEQUENCE: usize = VERSION + U8;
    pub const MESSAGE_TYPE: usize = SEQUENCE + U16;
    /// First byte of the type-specific payload
    pub const PAYLOAD: usize = MESSAGE_TYPE + U8;
}

pub mod acknowledge {
    use super::*;

    pub const COUNT: usize = header::PAYLOAD;
    pub const KIND: usize = COUNT + U8;
}

pub mod enumeration_init {
    use super::*;

    pub const COUNT: usize = header::PAYLOAD;
}

pub mod session_data_chunk {
    use super::*;

    pub const PID: usize = header::PAYLOAD;
    pub const NAME: usize = PID + U32;
    pub const PID_2: usize = NAME + NAME_LENGTH_MAX;
    pub const NAME_2: usize = PID_2 + U32;
}

pub mod request_channel_data {
    use super::*;

    pub const PID: usize = header::PAYLOAD;
    pub const IS_MASTER: usize = PID + U32;
}

pub mod channel_data {
    use super::*;

    pub const IS_MASTER: usize = header::PAYLOAD;
    pub const VOLUME: usize = IS_MASTER + U8;
    pub const IS_MUTED: usize = VOLUME + U8;
    pub const PID: usize = IS_MUTED + U8;
    pub const NAME: usize = PID + U32;
}

pub mod session_id {
    use super::*;

    /// Shared by SessionClosed, RequestIcon and IconIsDefault
    pub const PID: usize = header::PAYLOAD;
}

pub mod volume_levels {
    use super::*;

    pub const COUNT: usize = header::PAYLOAD;
    pub const ENTRIES: usize = COUNT + U8;
    pub const ENTRY_SIZE: usize = U32 + U8;
    pub const MAX_ENTRIES: usize = (FRAME_SIZE - ENTRIES) / ENTRY_SIZE;
}

pub mod selected_sessions {
    use super::*;

    pub const COUNT: usize = header::PAYLOAD;
    pub const PIDS: usize = COUNT + U8;
    /// One per dynamic channel
    pub const MAX_ENTRIES: usize = 7;
}

pub mod new_session {
    use super::*;

    pub const PID: usize = header::PAYLOAD;
    pub const NAME: usize = PID + U32;
    pub const VOLUME: usize = NAME + NAME_LENGTH_MAX;
    pub const IS_MUTED: usize = VOLUME + U8;
}

pub mod icon_init {
    use super::*;

    pub const PID: usize = header::PAYLOAD;
    pub const PACKET_COUNT: usize = PID + U32;
    pub const BYTE_COUNT: usize = PACKET_COUNT + U32;
}

pub mod icon_chunk {
    use super::*;

    pub const DATA: usize = header::PAYLOAD;
    pub const LEN: usize = FRAME_SIZE - DATA;
}

pub mod button {
    use super::*;

    pub const ID: usize = header::PAYLOAD;
}

pub mod volume_changed {
    use super::*;

    pub const PID: usize = header::PAYLOAD;
    pub const VOLUME: usize = PID + U32;
    pub const IS_MUTED: usize = VOLUME + U8;
    pub const IS_MASTER: usize = IS_MUTED + U8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_fit_in_frame() {
        assert_eq!(header::PAYLOAD, 4);
        assert!(session_data_chunk::NAME_2 + NAME_LENGTH_MAX <= FRAME_SIZE);
        assert!(channel_data::NAME + NAME_LENGTH_MAX <= FRAME_SIZE);
        assert!(new_session::IS_MUTED < FRAME_SIZE);
        assert!(selected_sessions::PIDS + selected_sessions::MAX_ENTRIES * U32 <= FRAME_SIZE);
        assert_eq!(volume_levels::MAX_ENTRIES, 11);
        assert_eq!(icon_chunk::LEN, 60);
    }
}
