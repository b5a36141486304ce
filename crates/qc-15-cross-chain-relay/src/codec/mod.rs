//! # Codec Module
//!
//! Envelope encoding and the length-prefixed frame layer beneath it.

pub mod envelope;
pub mod frame;

pub use envelope::{decode_envelope, encode_envelope, Envelope};
pub use frame::{read_frame, write_frame, FRAME_HEADER_LEN};
