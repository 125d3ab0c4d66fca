//! longbook: long-only, multi-currency portfolio rebalancer.
//!
//! Hexagonal architecture: the pure rebalancing engine in [`domain`], port
//! traits in [`ports`], file-backed implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
