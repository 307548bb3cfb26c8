//! SQLite persistence for the repository
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Walker Threads (one per root)              │
//! │  - add() per regular file                               │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ ContentObject
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              SqliteRepository                           │
//! │  - One connection behind a mutex                        │
//! │  - One transaction per add                              │
//! │  - Lazy, sticky initialization                          │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQLite File (objects / names / tags)             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod repository;
pub mod schema;

pub use repository::SqliteRepository;
pub use schema::{create_database, create_indexes};
