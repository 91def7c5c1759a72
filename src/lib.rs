//! Cargo fitting: places axis-aligned boxes into a rectangular cargo space.
//!
//! The [`engine`] finds the first free position for a single item; the
//! [`planner`] orders the items, drives the engine and reports what fitted.
//! [`api`] exposes both over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod manifest;
pub mod model;
pub mod planner;
pub mod presets;
pub mod types;
pub mod units;
