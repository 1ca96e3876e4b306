//! An abstraction layer for the generation capabilities research relies on.
//!
//! This crate establishes an unified protocol for the research core to
//! talk to text-generation and search-grounded generation services, so
//! that the core can switch between vendors (or a scripted fake in tests)
//! without modifying its control flow.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod grounding;
mod provider;
mod request;
mod response;

pub use error::*;
pub use grounding::*;
pub use provider::*;
pub use request::*;
pub use response::*;
