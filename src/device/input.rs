//! User input
//!
//! Faders are polled through the actuator every tick. Buttons and rotary
//! encoders arrive as [`InputEvent`]s over a channel.

use crate::actuator::ChannelActuator;
use crate::channels::Button;
use crate::config::TouchConfig;
use crate::constants::CHANNEL_COUNT;

/// Discrete input from a channel strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Button { slot: usize, button: Button },
    RotaryTurn { slot: usize, delta: i32 },
    RotaryPress { slot: usize },
}

/// Interpreted fader reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaderReading {
    pub slot: usize,
    pub position: u8,
    pub touched: bool,
    /// Touch state differs from the previous tick
    pub touch_changed: bool,
    /// Touched and outside the deadband: the user is moving it
    pub moving: bool,
}

/// Touch detection against per-channel baselines
#[derive(Debug, Clone)]
pub struct InputSampler {
    baselines: [u16; CHANNEL_COUNT],
    touched: [bool; CHANNEL_COUNT],
    sensitivity: f32,
    deadband: u8,
}

impl InputSampler {
    pub fn new(config: &TouchConfig) -> Self {
        Self {
            baselines: [0; CHANNEL_COUNT],
            touched: [false; CHANNEL_COUNT],
            sensitivity: config.sensitivity,
            deadband: config.position_deadband,
        }
    }

    /// Record untouched readings; call with hands off the faders
    pub fn calibrate<A: ChannelActuator>(&mut self, actuator: &mut A) {
        for (slot, baseline) in self.baselines.iter_mut().enumerate() {
            *baseline = actuator.sample(slot).touch;
        }
        tracing::debug!("Touch baselines: {:?}", self.baselines);
    }

    pub fn baselines(&self) -> &[u16; CHANNEL_COUNT] {
        &self.baselines
    }

    fn is_touch(&self, slot: usize, reading: u16) -> bool {
        reading as f32 > self.baselines[slot] as f32 * self.sensitivity
    }

    /// Sample every fader once
    pub fn sample<A: ChannelActuator>(&mut self, actuator: &mut A) -> [FaderReading; CHANNEL_COUNT] {
        std::array::from_fn(|slot| {
            let sample = actuator.sample(slot);
            let touched = self.is_touch(slot, sample.touch);
            let touch_changed = touched != self.touched[slot];
            self.touched[slot] = touched;
            FaderReading {
                slot,
                position: sample.position,
                touched,
                touch_changed,
                moving: touched && sample.position > self.deadband,
            }
        })
    }
}
