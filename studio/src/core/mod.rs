//! Deterministic, pure logic shared by the studio.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod conversation;
pub mod export;
pub mod language;
pub mod merge;
pub mod normalize;
pub mod paths;
pub mod seed;
pub mod types;
