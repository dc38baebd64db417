//! Capability traits implemented by transports and session stores.

mod refresher;
mod session_store;
mod transport;

pub use refresher::Refresher;
pub use session_store::SessionStore;
pub use transport::{FragmentStream, Transport};
