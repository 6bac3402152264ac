//! Gamepad input through gilrs, folded into the same held-intent snapshot
//! the keyboard produces.

use gilrs::{Axis, Button, Gilrs};
use glam::Vec2;

use super::player::ActionState;

pub const DEFAULT_DEADZONE: f32 = 0.15;

/// Button and stick state of one pad, sampled once per frame.
/// Stick y is positive when pushed up.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PadSnapshot {
    pub dpad_up: bool,
    pub dpad_down: bool,
    pub dpad_left: bool,
    pub dpad_right: bool,
    pub north: bool,
    pub south: bool,
    pub west: bool,
    pub east: bool,
    pub left_stick: Vec2,
}

/// D-pad moves and strafes, face buttons look and fly, the left stick
/// turns (x) and walks (y). Stick axes act as digital inputs past the
/// dead zone.
pub fn map_pad(pad: &PadSnapshot, deadzone: f32) -> ActionState {
    let stick = pad.left_stick;
    ActionState {
        up: pad.dpad_up || stick.y > deadzone,
        down: pad.dpad_down || stick.y < -deadzone,
        left: pad.dpad_left,
        right: pad.dpad_right,
        turn_left: stick.x < -deadzone,
        turn_right: stick.x > deadzone,
        fly_up: pad.west,
        fly_down: pad.east,
        look_up: pad.north,
        look_down: pad.south,
    }
}

pub struct Gamepad {
    gilrs: Option<Gilrs>,
    deadzone: f32,
}

impl Gamepad {
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                for (_, pad) in g.gamepads() {
                    log::info!("gamepad connected: {}", pad.name());
                }
                Some(g)
            }
            Err(e) => {
                log::warn!("gamepad support unavailable: {e}");
                None
            }
        };
        Self {
            gilrs,
            deadzone: DEFAULT_DEADZONE,
        }
    }

    /// Drain pending events and sample the first connected pad.
    pub fn poll(&mut self) -> ActionState {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return ActionState::default();
        };
        while let Some(event) = gilrs.next_event() {
            match event.event {
                gilrs::EventType::Connected => log::info!("gamepad {:?} connected", event.id),
                gilrs::EventType::Disconnected => log::info!("gamepad {:?} disconnected", event.id),
                _ => {}
            }
        }
        let Some((_, gp)) = gilrs.gamepads().next() else {
            return ActionState::default();
        };
        let pad = PadSnapshot {
            dpad_up: gp.is_pressed(Button::DPadUp),
            dpad_down: gp.is_pressed(Button::DPadDown),
            dpad_left: gp.is_pressed(Button::DPadLeft),
            dpad_right: gp.is_pressed(Button::DPadRight),
            north: gp.is_pressed(Button::North),
            south: gp.is_pressed(Button::South),
            west: gp.is_pressed(Button::West),
            east: gp.is_pressed(Button::East),
            left_stick: Vec2::new(gp.value(Axis::LeftStickX), gp.value(Axis::LeftStickY)),
        };
        map_pad(&pad, self.deadzone)
    }
}

impl Default for Gamepad {
    fn default() -> Self {
        Self::new()
    }
}
