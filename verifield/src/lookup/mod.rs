//! Remote lookup composition.
//!
//! A [`LookupCoordinator`] turns edits of a field into debounced verification
//! calls and writes the classified outcome back into the field store:
//!
//! ```text
//! edit ──► Armed ──(quiescence window)──► InFlight ──(response)──► Settled
//!   ▲        │                               │                        │
//!   └────────┴──────── further edit ─────────┴────────────────────────┘
//! ```
//!
//! An edit abandons any in-flight request: its generation stops being the
//! live one and its response is discarded on arrival.

mod config;
mod coordinator;
mod request;
mod transport;

pub use config::LookupConfig;
pub use coordinator::{LookupCoordinator, LookupPhase};
pub use request::{LookupRequest, LookupSource, LookupValues};
pub use transport::Transport;
