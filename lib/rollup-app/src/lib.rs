//! Process bootstrap helpers.
//!
//! Everything a binary needs to do before it starts ingesting samples: currently, bringing up logging.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod logging;

/// Common imports.
pub mod prelude {
    pub use super::logging::{fatal_and_exit, initialize_logging, LoggingConfiguration};
}
