//! Shared foundational types for the StateS finite-state-machine toolkit.
//!
//! This crate provides the value domain of every signal: the fixed-width
//! [`BitValue`] and its [`BitRange`] addressing helper.

#![warn(missing_docs)]

pub mod bit_value;

pub use bit_value::{BitRange, BitValue};
