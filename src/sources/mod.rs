//! Frame source implementations

pub mod command;
pub mod file;
pub mod synthetic;

pub use command::{CommandOutput, CommandSource};
pub use file::FileSource;
pub use synthetic::SyntheticSource;
