//! The restore core: chain resolution, reconstruction, ordering and
//! transmission, driven by [`RestoreSession`].

pub mod chain;
pub mod counters;
pub mod dirbuf;
pub mod filter;
pub mod reconstruct;
pub mod session;
pub mod transmit;

use serde::Serialize;

pub use counters::{Counters, SessionReport, SessionStatus};
pub use filter::RestoreFilter;
pub use session::{RestoreSession, SessionParams};
pub use transmit::WireOptions;

/// Stream content to the peer, or only check it against the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Restore,
    Verify,
}
