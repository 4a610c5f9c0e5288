//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the market reference data and the subscription
//! model with no I/O. All types here are pure Rust with serialization
//! support.

/// Exchanges and market descriptors.
pub mod market;

/// Subscription identity, merge rules and the session registry.
pub mod subscription;
