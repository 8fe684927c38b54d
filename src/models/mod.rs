//! Defines the data structures shared across the application.
//!
//! Keys, entities and the reserved column names of the tabular file format
//! live here so the store backends, the pipeline and the CLI agree on them.

mod entity;

pub use entity::*;
