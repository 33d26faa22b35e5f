//! Command-line interface for Bundle Fetcher
//!
//! Argument definitions live in [`args`], the handlers that wire parsed
//! arguments to the scheduler live in [`commands`].

pub mod args;
pub mod commands;

pub use args::{CacheAction, CapAction, Cli, Commands, EnqueueArgs, GlobalArgs};
pub use commands::{
    handle_cache, handle_cancel, handle_cap, handle_enqueue, handle_pause, handle_queue,
    handle_remove, handle_resume, handle_run,
};
