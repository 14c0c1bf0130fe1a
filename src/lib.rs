//! A buffer-backed property testing engine: random buffers drive a user's
//! test routine through a small set of draw primitives, each attempt runs
//! isolated in a forked child so a crash can't take the driver down with it,
//! and any failing buffer found is shrunk towards the smallest one (by
//! length, then lexicographically) that still fails.

#![allow(clippy::many_single_char_names)]
#![warn(clippy::cargo)]

pub mod buffer;
pub mod comms;
pub mod context;
pub mod error;
pub mod executor;
pub mod runner;
pub mod shrink;
pub mod variable_draw;

pub use buffer::Buffer;
pub use context::{Context, Status};
pub use error::RunError;
pub use executor::{default_forker, FailureKind, Forker};
pub use runner::{run_test, run_test_for_buffer, RunConfig, RunOutcome, Runner};
pub use variable_draw::VariableDraw;
