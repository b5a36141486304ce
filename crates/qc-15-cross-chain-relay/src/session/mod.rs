//! # Session Module
//!
//! Connection-level roles over the framed envelope protocol.
//!
//! - [`ResponderSession`]: per accepted connection loop
//! - [`Initiator`]: outbound request driver
//! - [`RelayServer`]: listener with bounded admission

pub mod initiator;
pub mod responder;
pub mod server;

pub use initiator::Initiator;
pub use responder::{ResponderSession, SessionStats};
pub use server::RelayServer;
