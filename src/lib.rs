//! unpkg - macOS installer package extractor
//!
//! Unpacks `.pkg` and `.mpkg` files into plain folders, for both flat
//! (xar) packages and old bundle-style ones, by driving the system's
//! xar, cpio, pax and gzcat tools.

pub mod archive;
pub mod config;
pub mod destination;
pub mod error;
pub mod extractor;
pub mod package;
pub mod queue;

pub use error::{ErrorKind, ExtractionError, Result};
pub use extractor::{ExtractEvent, ExtractionResult, Extractor};
pub use queue::{QueueCoordinator, QueueStatus};
