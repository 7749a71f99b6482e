//! Data Relay Module
//! 
//! Origin dialing, the per-direction pump and the session coordinator that
//! ties them together.

pub mod coordinator;
pub mod dial;
pub mod pump;
pub mod session;

pub use coordinator::{relay, RelayStats, SessionCoordinator};
pub use dial::Dialer;
pub use pump::{pump, PumpEnd, PumpReport};
pub use session::{Session, SessionState};
