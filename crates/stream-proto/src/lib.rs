//! Shared data model, configuration and wire protocol for the stream player.
pub mod config;
pub mod platform;
pub mod prefs;
pub mod protocol;
pub mod stations;
