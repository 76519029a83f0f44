//! Convergence waiter for eventually-consistent remote resources.
//!
//! After an asynchronous operation (deploy, terminate, image import) the
//! remote entity moves through intermediate states. [`await_state`] polls a
//! [`StateSource`] under a [`RetryBudget`] until the fetched
//! [`StateSnapshot`] matches a [`WaitTarget`], an abort pattern fires, or the
//! budget runs out.

pub mod assertion;
pub mod budget;
pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod resource;
pub mod rpc;
pub mod scope;
pub mod snapshot;
pub mod target;
pub mod testing;
pub mod waiter;

pub use assertion::{assert_converged, expect_state};
pub use budget::{RetryBudget, TransportPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigSource, Sourced, WaitConfig};
pub use document::{EntityDocument, StateMapping};
pub use error::{AssertionFailure, BudgetError, FetchError, TargetError, WaitError};
pub use logging::{LogConfig, init_logging};
pub use resource::{
    EntityClient, EntityRef, EntityState, FnSource, RemoteResource, ResourceKind, StateSource,
};
pub use rpc::RpcResponse;
pub use scope::Scoped;
pub use snapshot::{ACTIVE_STATE, NO_SUB_STATE, StateSnapshot};
pub use target::{DEFAULT_ABORT_PATTERN, WaitTarget};
pub use waiter::{
    ConvergenceTracker, Converged, Step, Waiter, await_state, await_state_async, await_state_with,
};
