//! Core types and storage for generated project roadmaps.
//!
//! Provides the item tree ([`item::Roadmap`], [`item::Item`]), hierarchical
//! id rules, JSON persistence, and the `.roadmap/config.toml` configuration.

pub mod config;
pub mod item;
pub mod schema;
pub mod storage;
