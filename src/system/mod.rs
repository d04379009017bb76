//! Live process, thread and CPU model rebuilt from trace events.

pub mod cpu;
pub mod files;
pub mod filter;
pub mod perf_counter;
pub mod process;
pub mod snapshot;
