//! Testing utilities and helpers
//!
//! - **[`mocks`]**: credential store doubles (`FailingStore`,
//!   `RecordingStore`)
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates' tests.

pub mod mocks;

pub use mocks::{FailingStore, RecordingStore, StoreOp};
