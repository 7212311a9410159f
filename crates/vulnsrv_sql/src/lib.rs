//! # vulnsrv sql
//!
//! A thread-confined in-memory SQL engine for the vulnsrv core.
//!
//! This crate provides:
//! - [`SqlExecutor`]: a thread-safe `submit(statement) -> rows` handle
//!   backed by a single engine-owning worker thread
//! - [`RESET_SENTINEL`]: the reserved statement that discards and
//!   recreates the engine
//! - [`Value`]/[`Row`]: dynamically typed result cells
//!
//! Results are delivered strictly in submission order and each caller
//! blocks only for its own result. Engine failures are captured and
//! returned as data; only the reset sentinel tears down state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod executor;
mod value;

pub use error::{SqlError, SqlResult};
pub use executor::{SqlExecutor, RESET_SENTINEL};
pub use value::{Row, Value};
