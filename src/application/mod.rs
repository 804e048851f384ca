//! Application layer orchestrating hosted channel openings.
//!
//! This module defines the `HandshakeCoordinator`, which drives a single
//! opening attempt against one remote peer through the domain ports, and the
//! observer interface it reports the outcome to.

pub mod coordinator;
pub mod observer;
