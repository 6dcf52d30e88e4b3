//! blur-core — shared types, wire format, and image codec.
//! All other blurd crates depend on this one.

pub mod config;
pub mod image;
pub mod radius;
pub mod wire;

pub use image::{ImageError, RgbaImage};
pub use radius::{Radius, RadiusCell};
pub use wire::{FrameError, FrameLimits};
