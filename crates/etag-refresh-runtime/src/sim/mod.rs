//! Simulated page host
//!
//! Drives a [`PageContext`](crate::PageContext) against a virtual clock and
//! a scripted server so runtime behavior can be checked deterministically.
//!
//! # Usage
//!
//! ```
//! use etag_refresh_runtime::sim::SimulatedPage;
//! use etag_refresh_runtime::FetchOutcome;
//!
//! let mut page = SimulatedPage::new("/", 1000, false)
//!     .with_responses([FetchOutcome::Etag("v1".into()), FetchOutcome::Etag("v2".into())]);
//! page.load();
//! page.advance_to(1000);
//! assert_eq!(page.notifications(), &[1000]);
//! ```

mod failure;
mod page;
mod server;

pub use failure::{FailureConfig, FailureInjector};
pub use page::SimulatedPage;
pub use server::ScriptedServer;
