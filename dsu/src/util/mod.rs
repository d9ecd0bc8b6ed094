//! Process helpers.

mod process;

pub use process::run_shell;
