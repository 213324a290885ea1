//! Client for a CSV upload-and-enrichment service.
//!
//! A file is uploaded over HTTP, a processing request is submitted over a
//! Socket.IO channel (or `POST /process`), progress is streamed back and the
//! finished CSV is saved locally.
//!
//! - [`controller`]: pure state machine for connection, session and view
//! - [`runtime`]: async driver that runs the controller's effects
//! - [`api`]: HTTP upload, process and quota calls
//! - [`socketio`]: Engine.IO v4 / Socket.IO v5 text framing
//! - [`notify`], [`validate`], [`progress`], [`watchdog`], [`download`]: the
//!   smaller pieces the controller and runtime are built from

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod logging;
pub mod notify;
pub mod progress;
pub mod protocol;
pub mod runtime;
pub mod socketio;
pub mod validate;
pub mod watchdog;

pub use config::ClientConfig;
pub use controller::{Controller, Effect, Msg, SessionOutcome};
pub use error::{EnrichError, UploadError};
pub use runtime::Runtime;
