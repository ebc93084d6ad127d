//! Channel actuator interface
//!
//! Everything physical (motor, LEDs, display, touch sensor) sits behind
//! [`ChannelActuator`]. Calls are infallible: hardware faults are the
//! implementation's concern.

pub mod sim;

use crate::channels::{MenuPage, SlotIcon};
use crate::protocol::SessionName;

pub use sim::SimulatedActuator;

/// One reading of a fader's position and its touch sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaderSample {
    /// Position, 0..=100
    pub position: u8,
    /// Raw capacitive reading
    pub touch: u16,
}

/// Hardware operations for the eight channels, addressed by slot index
pub trait ChannelActuator {
    /// Drive the motor toward a volume
    fn set_target_volume(&mut self, slot: usize, volume: u8);

    fn set_mute_indicator(&mut self, slot: usize, muted: bool);

    fn set_touched(&mut self, slot: usize, touched: bool);

    /// Live audio level of the channel's session
    fn set_level_meter(&mut self, slot: usize, level: u8);

    fn set_name(&mut self, slot: usize, name: &SessionName);

    fn set_icon(&mut self, slot: usize, icon: &SlotIcon);

    /// Draw a page of the session menu, or close it with `None`
    fn show_menu(&mut self, slot: usize, page: Option<&MenuPage>);

    fn sample(&mut self, slot: usize) -> FaderSample;

    /// Terminal diagnostic; nothing else is drawn afterwards
    fn show_fatal(&mut self, message: &str);
}
