//! # provix_services
//!
//! Resources built on the provix lifecycle adapter.
//!
//! # Resources
//!
//! - **Project VPC**: waits for `ACTIVE` after create and `DELETED` after delete
//! - **VPC peering**: classifies the settled state and rolls back terminal
//!   creates; identifiers have an optional region segment
//! - **Service**: asymmetric readiness waits for create and update
//! - **AWS privatelink**: waits for `active`
//! - **Organization permission**: conflict-checked upsert under a
//!   process-wide lock
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use provix_core::ProviderConfig;
//! use provix_services::Provider;
//!
//! let provider = Provider::new(ProviderConfig::from_env()?);
//! provider.configure(Arc::new(HttpClient::new(token)));
//!
//! let vpc = provider.resources.get_required("provix_project_vpc")?;
//! let rsp = vpc.create(&ctx, CreateRequest { plan }).await;
//! ```

use std::time::Duration;

use provix_core::{OperationContext, DEFAULT_TIMEOUT};

pub mod client;
pub mod error;
pub mod peering;
pub mod permission;
pub mod privatelink;
pub mod provider;
pub mod service;
pub mod vpc;

pub use client::{
    ApiResult, PeeringApi, PeeringKey, PermissionApi, PermissionGrant, PrivatelinkApi, ProvisioningApi, ServiceApi,
    VpcApi,
};
pub use error::{ServiceError, ServiceResult};
pub use provider::{data_sources, resources, Provider};

/// Waiter budget: whatever is left of the operation's deadline.
pub(crate) fn wait_timeout(ctx: &OperationContext) -> Duration {
    ctx.remaining().unwrap_or(DEFAULT_TIMEOUT)
}
