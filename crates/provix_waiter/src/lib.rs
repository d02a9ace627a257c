//! # provix_waiter
//!
//! State convergence for eventually-consistent remote objects.
//!
//! - **Waiter**: polls a refresh closure until a target state is observed
//!   often enough in a row, honoring the operation deadline and cancellation
//! - **Classifiers**: turn the settled state of a VPC, peering connection,
//!   service or privatelink into diagnostics
//!
//! # Example
//!
//! ```rust,ignore
//! use provix_waiter::{StateChangeConf, DEFAULT_STATE_CHANGE_DELAY};
//!
//! let converged = StateChangeConf::new(timeout)
//!     .pending(["APPROVED"])
//!     .target(["ACTIVE"])
//!     .delay(DEFAULT_STATE_CHANGE_DELAY)
//!     .min_timeout(Duration::from_secs(2))
//!     .wait(&ctx, move || async move { client.get_vpc(&project, &vpc_id).await.map(|v| (Some(v.clone()), v.state)) })
//!     .await?;
//! ```

pub mod classify;
pub mod error;
pub mod waiter;

pub use classify::{
    classify_peering, classify_privatelink, classify_service, classify_vpc, state_info_to_string, PeeringState,
    PrivatelinkState, ServiceState, UnknownState, VpcState,
};
pub use error::{WaitError, WaitResult};
pub use waiter::{
    Converged, RefreshResult, StateChangeConf, UnexpectedStatePolicy, WaitReport, DEFAULT_NOT_FOUND_CHECKS,
    DEFAULT_STATE_CHANGE_DELAY, DEFAULT_STATE_CHANGE_MIN_TIMEOUT,
};
