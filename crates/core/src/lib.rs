//! Domain types shared across the livetext workspace.
//!
//! This crate has no internal dependencies so the hub, the database layer,
//! and the embedded client can all reference the same ids, role names,
//! wire protocol, and session rules.

pub mod error;
pub mod presence;
pub mod protocol;
pub mod roles;
pub mod session;
pub mod types;
