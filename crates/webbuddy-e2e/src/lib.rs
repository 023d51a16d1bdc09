//! # webbuddy-e2e
//!
//! End-to-end harness for the Web Buddy browser extension.
//!
//! The harness loads the unpacked extension into Chromium and checks it from
//! the outside: background context presence, content script injection on a
//! real HTTP origin, runtime message round trips from the page, and the
//! popup's main control. Each check yields an outcome; the run maps them to
//! an exit status (0 all passed or skipped, 2 a check failed, 3 the harness
//! itself failed).
//!
//! ```ignore
//! let config = HarnessConfig::load(&ConfigOverrides::default(), EnvSignals::from_env())?;
//! let result = webbuddy_e2e::run::run(config).await;
//! webbuddy_e2e::report::print_report(&result);
//! std::process::exit(i32::from(result.status.code()));
//! ```

pub mod artifacts;
pub mod checks;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logger;
pub mod outcome;
pub mod report;
pub mod run;
pub mod session;

pub use artifacts::ArtifactStore;
pub use checks::{Check, Sequencer, extension_checks};
pub use config::{ConfigOverrides, EnvSignals, HarnessConfig};
pub use error::{HarnessError, Result};
pub use outcome::{CheckOutcome, ExitStatus, RunResult};
pub use session::{ExtensionSession, Session};
