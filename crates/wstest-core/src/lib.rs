//! # wstest-core
//!
//! Session bootstrapping for the wstest client.
//!
//! - **Bootstrapper** - configure, handshake once, subscribe one channel
//! - **SubscriptionHandle** - disposable subscription with `remove()`
//! - **SessionConfig** - immutable endpoint and verbosity settings
//! - **PageConfig** / **BuildProfile** - the declarative records the page
//!   and the release build are driven by
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ SessionConfig │────▶│ Bootstrapper │────▶│  Transport  │
//! └───────────────┘     └──────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                     ┌────────────────────┐
//!                     │ SubscriptionHandle │
//!                     └────────────────────┘
//! ```

pub mod config;
pub mod handle;
pub mod page;
pub mod profile;
pub mod session;

#[cfg(test)]
mod mock;

pub use config::{ConfigError, Location, SessionConfig};
pub use handle::SubscriptionHandle;
pub use page::PageConfig;
pub use profile::BuildProfile;
pub use session::{logging_listener, Bootstrapper, SessionError, SessionState};
