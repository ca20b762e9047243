//! camsim-core: shared errors, configuration, and the encoder capability.
//!
//! This crate is the foundational dependency for the other camsim crates,
//! providing a unified error type, the serde configuration model for the
//! simulator and its cameras, and the narrow [`encode::Encoder`] interface
//! behind which the external media tooling lives.

pub mod config;
pub mod encode;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use encode::{EncodeFailure, EncodeRequest, Encoder, FailureKind, SourceRange};
pub use error::{Error, Result};
