//! Command trait definition for CLI commands.
//!
//! The trait uses `enum_dispatch` for efficient dispatch across command
//! variants.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all spritefridge CLI commands.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self) -> Result<()>;
}
