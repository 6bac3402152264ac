pub mod config;
pub mod gamepad;
pub mod input;
pub mod player;
