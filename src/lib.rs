//! Hearthcraft library crate: the crafting engine and its Bevy plugins.
//!
//! The binary crate (`main.rs`) is a headless demo. This library crate
//! exposes the modules so that `tests/` integration tests can drive the
//! plugins without a window or GPU.

pub mod shared;
pub mod crafting;
pub mod data;
