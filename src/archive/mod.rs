//! External archive tooling.
//!
//! unpkg never decodes xar, cpio, pax or gzip itself. It drives the system
//! tools at fixed locations through a [`CommandRunner`], which keeps the
//! engine testable with an in-process fake.

pub mod command;
pub mod tools;

#[cfg(test)]
pub(crate) mod fake;

pub use command::{CommandRunner, CommandSpec, SystemRunner};
pub use tools::ToolPaths;
