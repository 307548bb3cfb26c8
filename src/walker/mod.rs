//! Source tree ingestion
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │        Ingestor         │
//!                     │  - validates roots      │
//!                     │  - one walker per root  │
//!                     └───────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │ walker-0  │             │ walker-1  │             │ walker-N  │
//! │ walkdir   │             │ walkdir   │             │ walkdir   │
//! │ add_file  │             │ add_file  │             │ add_file  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └─────────────────────────┼─────────────────────────┘
//!                                 │ IngestEvent
//!                         ┌───────▼───────┐
//!                         │ log-consumer  │
//!                         └───────────────┘
//! ```

pub mod ingest;
pub mod sink;

pub use ingest::{IngestStats, Ingestor, WorkerStats};
pub use sink::{EventSink, IngestEvent, LogConsumer, LogHandle, LogOptions, LogStats};
