//! Attestation layer for the privacy-preserving data marketplace.
//!
//! This crate contains:
//! - Hash commitments over private measurements.
//! - Range and equality proof generation against researcher-facing criteria.
//! - Structural verification and exact-string criteria matching.
//! - Serialization helpers for anchoring proof sets to the ledger.

pub mod commitment;
pub mod constants;
pub mod proof;
pub mod serialize;
pub mod types;
pub mod verify;
