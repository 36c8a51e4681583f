//! Client-side data-availability layer of a rollup node.
//!
//! This crate provides:
//! - [`Aggregator`]: stores a blob with every committee member and assembles a
//!   certificate once a quorum of BLS signatures is collected
//! - [`ReaderAggregator`]: retrieves a blob by hash using explore/exploit
//!   reader selection and hedged concurrent requests
//! - Decorators over the capability traits: request signing, read-through
//!   fallback with backfill, read-only restriction and redundant reads
//! - Local storage services (memory and sled) used as fallback primaries
//! - Configuration and a factory wiring everything together

pub mod aggregator;
pub mod config;
pub mod factory;
pub mod fallback;
pub mod local_db_storage;
pub mod memory_storage;
pub mod read_limited;
pub mod reader_aggregator;
pub mod reader_stats;
pub mod redundant;
pub mod service_details;
pub mod store_signing;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_util;

pub use aggregator::Aggregator;
pub use config::DataAvailabilityConfig;
pub use factory::{setup_data_availability, DataAvailabilityComponents};
pub use fallback::FallbackStorageService;
pub use local_db_storage::LocalDbStorageService;
pub use memory_storage::MemoryStorageService;
pub use read_limited::{ReadLimitedDataAvailabilityService, ReadLimitedStorageService};
pub use reader_aggregator::ReaderAggregator;
pub use redundant::RedundantSimpleDasReader;
pub use service_details::ServiceDetails;
pub use store_signing::StoreSigningDas;
