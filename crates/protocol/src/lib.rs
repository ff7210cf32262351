//! Embedded Sass wire protocol
//!
//! The Dart Sass compiler, launched in embedded mode, speaks a
//! bidirectional protobuf RPC over its stdin/stdout. This crate owns the
//! two halves of that wire format:
//!
//! - [`messages`]: the protobuf message set, hand-maintained prost structs
//!   pinned to one protocol version
//! - [`frame`]: the `varint(id) || varint(len) || body` framing that
//!   multiplexes concurrent compilations over the single byte stream
//!
//! It deliberately knows nothing about processes, importers, or values;
//! the host crate layers those on top.

pub mod frame;
pub mod messages;

pub use frame::{FrameError, MAX_FRAME_LENGTH, encode_frame, frame_to_bytes, read_frame};
pub use messages::PROTOCOL_VERSION;
