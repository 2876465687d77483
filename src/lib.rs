//! otelblast - synthetic OTLP load at collector-melting rates.
//!
//! Two cooperating tools in one binary:
//!
//! - **Generator**: materializes timestamp-free OTLP payloads (traces,
//!   metrics, logs) to disk as raw protobuf template files.
//! - **Sender**: replays those templates against an OTLP/gRPC collector,
//!   refreshing per-replay identity (trace/span ids, timestamps) so every
//!   replay looks like fresh telemetry.
//!
//! # Architecture
//!
//! The sender's replay engine is the hot core:
//! - `sender::loader`: decodes templates once at startup
//! - `sender::batch`: sizes outbound trace requests, splitting oversized traces
//! - `sender::clone`: per-iteration copies the pipeline may mutate
//! - `sender::ids` / `sender::timestamps`: per-replay identity rewriting
//! - `sender::ratelimit`: shared token bucket over the event budget
//! - `sender::export`: one tonic client per signal
//! - `sender::workers`: volume-proportional worker pool
//! - `sender::stats`: lock-free counters, periodic summaries
//!
//! # Example
//!
//! ```no_run
//! use otelblast_lib::core::{Result, SenderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SenderConfig::load(std::path::Path::new("sender.yaml"))?;
//!     otelblast_lib::sender::run(config).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod generator;
pub mod sender;
