//! Traffic Microsimulation Library
//!
//! A discrete-tick road traffic simulation core that runs headless, tick by
//! tick, as fast as the host drives it.

pub mod simulation;
