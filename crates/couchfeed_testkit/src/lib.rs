//! # couchfeed testkit
//!
//! Test utilities for couchfeed.
//!
//! This crate provides:
//! - Change record fixtures
//! - Wire encoders producing each feed framing
//! - Chunk splitters for exercising arbitrary network boundaries
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use couchfeed_testkit::prelude::*;
//!
//! let records = sample_records(3);
//! let body = encode_continuous(&records);
//! for chunks in [split_at(&body, 7), split_every(&body, 1)] {
//!     // ... feed the chunks to a decoder or a mock transport
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chunking;
pub mod fixtures;
pub mod generators;
pub mod wire;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::chunking::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::wire::*;
}

pub use chunking::*;
pub use fixtures::*;
pub use generators::*;
pub use wire::*;
