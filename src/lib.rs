//! Replay a kernel trace as a live, top-like view of processes and CPUs.
//!
//! Events are dispatched into a process/CPU model on the producer thread.
//! At every refresh boundary in trace time the model is frozen into a
//! [`Snapshot`](system::snapshot::Snapshot) and handed through a depth-one
//! [`Pipeline`](pipeline::Pipeline) to whatever display is attached.

pub mod action;
pub mod aggregator;
pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod logging;
pub mod pipeline;
pub mod probe;
pub mod router;
pub mod system;
pub mod trace;
pub mod ui;
