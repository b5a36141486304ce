//! # Algorithms Module
//!
//! Merkle path construction and verification.

pub mod merkle;

pub use merkle::{build_merkle_path, compute_merkle_root, verify_merkle_path};
