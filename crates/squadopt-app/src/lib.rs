// Library root for the squad optimizer application: configuration, the
// player-pool data source, run modes, and reporting.

pub mod config;
pub mod pool;
pub mod report;
pub mod runner;
