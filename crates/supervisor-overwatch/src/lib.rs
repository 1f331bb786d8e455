//! Overwatch: the silence/heartbeat monitor over a provider process's
//! output streams.
//!
//! Each request owns one [`context::OverwatchContext`], tracked by one
//! [`monitor::Overwatch`] registry. A background heartbeat ticker fires
//! per context at `heartbeat_interval_ms`; the first tick to observe
//! `!check_heartbeat()` while not already silent captures a
//! `DiagnosticSnapshot` and hands it to the registered `SilenceObserver`.

pub mod context;
pub mod monitor;

pub use context::{MonitoredLines, MonitoredWriter, OverwatchContext};
pub use monitor::{stream_monitor, wrap_reader, wrap_writer, NullObserver, Overwatch, SilenceObserver, StreamSource};
