//! Application Layer - Port definitions.
//!
//! This layer contains the interfaces that define how the session
//! interacts with external systems.

/// Port interfaces for external systems (socket transport).
pub mod ports;
