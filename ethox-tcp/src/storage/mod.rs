//! Specialized containers.
//!
//! The receive side of a connection owns a fixed-capacity byte ring whose free space is exactly
//! the advertised receive window.
mod ring;

pub use self::ring::RingBuffer;
