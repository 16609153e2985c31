//! Benchmark orchestration: server process lifecycle, client drivers, the
//! trial runner state machine and the result table handed to exporters.

pub mod config;
pub mod driver;
pub mod runner;
pub mod server;
pub mod table;
