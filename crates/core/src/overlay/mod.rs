//! Seams for the external onion-routing overlay and its optional framed
//! sub-protocol.
//!
//! The overlay client itself (circuit building, directory lookup, stream
//! multiplexing) lives outside this crate; these traits are what the
//! transport consumes from it: open a session, dial by name and port,
//! publish a hidden service.

mod client;
mod framing;

pub use client::{HiddenService, OverlayClient, OverlaySession, OverlayStream, RawStream};
pub use framing::{FramedDialer, FramedLayer, RawAcceptor};
