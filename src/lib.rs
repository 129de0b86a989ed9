// src/lib.rs

//! wpmirror Library
//!
//! Mirrors WordPress plugins and themes into one git repository per package,
//! re-publishing only what changed since the last run.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
