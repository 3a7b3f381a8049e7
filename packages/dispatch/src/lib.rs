#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Patrol dispatch coordination.
//!
//! [`DispatchCoordinator`] drives a dispatch through its lifecycle:
//!
//! ```text
//! pending ─┐
//!          ├─ accept ─> accepted ─> en_route ─> arrived ─> completed
//! assigned ┘
//!
//! any non-terminal ─> declined | cancelled
//! ```
//!
//! Storage, the officer roster, change notification and time are injected
//! as `Send + Sync` trait objects. Every state change is one
//! compare-and-swap on the [`DispatchStore`], so under concurrent
//! acceptance exactly one officer wins.

pub mod analytics;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod roster;
pub mod store;
pub mod transition;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CreateDetails, DispatchCoordinator, DispatchSettings};
pub use error::{DispatchError, ErrorKind, NotifyError, StoreError};
pub use notify::{ChangeNotifier, ChannelNotifier, LogNotifier, NullNotifier};
pub use roster::{OfficerRoster, StaticRoster, nearest_officer};
pub use store::{DispatchStore, InMemoryDispatchStore, TransitionGuard};
pub use transition::{ReportEffect, Transition};
