//! Ports (trait boundaries) of the correlation engine.

pub mod transport;

pub use transport::{FrameStream, Transport};
