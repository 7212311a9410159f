//! # vulnsrv core
//!
//! The concurrency-safe shared-state core of the vulnsrv security
//! training service.
//!
//! This crate provides:
//! - [`VulnState`]: the mutually exclusive aggregate of message logs,
//!   the per-run secret and the SQL executor handle, with atomic
//!   [`reset`](VulnState::reset)
//! - [`auth`]: the session MAC (deliberately length-extendable — see
//!   the module docs) and session/CSRF identifiers
//! - re-exports of the query [`Value`]/[`Row`] types and the
//!   [`Dataset`] description
//!
//! HTTP dispatch, routing and templating are external collaborators
//! that consume this crate's operations; they live elsewhere.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
mod config;
mod error;
mod state;

pub use auth::{Secret, Session, SECRET_LEN};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use state::{MessageLog, VulnState};

pub use vulnsrv_dataset::Dataset;
pub use vulnsrv_sql::{Row, SqlError, Value, RESET_SENTINEL};
