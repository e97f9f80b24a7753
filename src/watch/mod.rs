// src/watch/mod.rs

//! Watch mode: re-run tasks when files change.
//!
//! This module is responsible for:
//! - Compiling per-binding `patterns` / `exclude` globs (`patterns.rs`).
//! - The debounce / coalescing state machine of one binding (`binding.rs`).
//! - Running that state machine against real timers and tasks (`trigger.rs`).
//! - Feeding filesystem events from `notify` into the trigger (`watcher.rs`).
//!
//! It knows task names only; resolution and execution go through the
//! registry and executor at run time.

pub mod binding;
pub mod patterns;
pub mod trigger;
pub mod watcher;

pub use binding::{BindingAction, BindingCore, BindingInput, BindingState};
pub use patterns::{watches_from_config, WatchProfile, WatchSpec};
pub use trigger::{ChangeEvent, WatchOptions, WatchTrigger, DEFAULT_DEBOUNCE};
pub use watcher::{spawn_watcher, WatcherHandle};
