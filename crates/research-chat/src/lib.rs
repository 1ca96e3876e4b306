//! A chat front end for the research agent.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring cited web research into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod activity;
mod session;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`research_chat_core`] crate.
pub mod core {
    pub use research_chat_core::*;
}
