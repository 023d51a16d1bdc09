//! Setup-phase errors.
//!
//! Anything here aborts the run before checks start and maps to exit
//! status 3. Failures inside checks never become a `HarnessError`; the
//! sequencer turns them into failing outcomes instead.

use thiserror::Error;
use webbuddy_browser::BrowserError;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration layers could not be merged or extracted.
    #[error("configuration error: {0}")]
    Config(String),

    /// The extension root is unusable or the browser did not start.
    #[error("session setup failed: {0}")]
    Setup(#[from] BrowserError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
