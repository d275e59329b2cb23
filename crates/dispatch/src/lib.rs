//! Queue plumbing shared by the SeqStack analysis plugins.
//!
//! A plugin binary builds a [`Settings`] from the environment, opens a
//! database pool, implements [`JobHandler`] for its tool, and hands both
//! to [`listener::run`], which consumes `dispatcher_<plugin>` until the
//! process is stopped.

pub mod handler;
pub mod listener;
pub mod message;
pub mod settings;

pub use handler::{sample_directory, HandlerOutcome, JobError, JobHandler};
pub use message::{DispatcherMessage, PluginCompletion};
pub use settings::{Settings, SettingsError};
