//! # Application Module
//!
//! Protocol handlers, the settlement coordinator and the shared context they
//! run against.

pub mod context;
pub mod coordinator;
pub mod handlers;

pub use context::RelayContext;
pub use coordinator::{Settlement, SettlementCoordinator};
pub use handlers::ProtocolHandlers;
