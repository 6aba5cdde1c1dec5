//! Report polling
//!
//! The service accepts work immediately and publishes reports later. A poll
//! fetches the report of one handle at a fixed step until the handle reaches
//! the wanted state or the attempt budget runs out.

mod engine;
mod observer;
mod options;
mod state;

pub(crate) use engine::{poll, Pollable};
pub use observer::{FnObserver, ObserverError, PollObserver, PollTarget};
pub use options::{PollDefaults, PollOptions};
pub use state::PollState;
