//! Process utilities

pub mod signals;

pub use signals::{forward_signals, shutdown_channel, shutdown_requested};

// vim: ts=4
