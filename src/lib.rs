//! Tile Traffic Library
//!
//! A tile-based traffic simulation engine with a fixed-rate clock, ratio-driven
//! population control and emergency-vehicle right-of-way.

pub mod simulation;
