//! J1939-84 test sequencer library.
//!
//! Re-exports every module so the binary and `j84-e2e-tests` can build
//! and drive a [`sequencer::Sequencer`] directly.

pub mod config;
pub mod data_repository;
pub mod listener;
pub mod registry;
pub mod sequencer;
pub mod step;
pub mod steps;
