//! scanx core - bounded data exchange between index scans and query operators
//!
//! An index scan produces [`IndexEntry`] values on one thread while a query
//! operator consumes them on another. This library provides the channel
//! between them with:
//!
//! - A fixed-capacity FIFO exchange with blocking backpressure
//! - Stop and timeout cancellation of either end
//! - Two-phase close so producer and consumer can shut down in any order
//! - Pooled backing buffers for standard-capacity exchanges

pub mod config;
pub mod connection;
pub mod entry;
pub mod error;
pub mod exchange;
pub mod index;
pub mod settings;

// Re-export commonly used types
pub use config::Config;
pub use connection::{Context, IndexConnection};
pub use entry::IndexEntry;
pub use error::{Error, Result, ScanError};
pub use exchange::{EntryExchange, PoolStats, Received, Sender};
pub use settings::ScanSettings;
