// Library interface for newsradar modules
// This allows tests and other binaries to import modules

pub mod aggregator;
pub mod clock;
pub mod ingestion;
pub mod parser;
pub mod resilience;
pub mod sanitize;
pub mod server;
pub mod sources;
pub mod tickers;
pub mod trends;
pub mod watchdog;
pub mod worker;
