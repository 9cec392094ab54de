// src/lib.rs

pub mod activity;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod eventbus;
pub mod registry;
pub mod snapshot;
pub mod tasks;
pub mod test_utils;

pub use context::{Collaborators, LifecycleContext, LifecycleOptions};
pub use roomkeep_common::error::Error;
