//! Git access for installing apps from the app store.

pub mod command_builder;

pub use command_builder::{GitCommand, git_command};
