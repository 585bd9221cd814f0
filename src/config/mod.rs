//! Configuration management for netsweep.
//!
//! Settings are stored as JSON in the XDG config directory and projected
//! into an engine configuration at scan time.

mod settings;

pub use settings::{AppSettings, Paths};
