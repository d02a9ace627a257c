//! Organization permissions.
//!
//! The API has no create call: a permission resource replaces the whole
//! grant set of its target. Two resources pointing at the same target would
//! silently overwrite each other, so creation first checks that nobody has
//! configured the target yet. The check and the write run under one
//! process-wide lock so concurrent applies cannot both see it empty.

use std::marker::PhantomData;

use async_trait::async_trait;
use provix_adapter::{Model, ResourceHooks, ResourceOptions};
use provix_core::{errmsg, identifier, Diagnostics, OperationContext, ProviderConfig, Timeouts};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{PermissionApi, PermissionGrant};
use crate::error::{ServiceError, ServiceResult};

pub const TYPE_NAME: &str = "provix_organization_permission";

/// Serializes conflict validation and the first write across every
/// permission resource in the process.
static PERMISSION_LOCK: Mutex<()> = Mutex::const_new(());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPermission {
    pub organization_id: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl OrganizationPermission {
    fn target(&self) -> String {
        identifier::build(&[&self.organization_id, &self.resource_type, &self.resource_id])
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OrganizationPermissionModel {
    #[serde(flatten)]
    pub permission: OrganizationPermission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
}

impl Model for OrganizationPermissionModel {
    type Shared = OrganizationPermission;

    fn shared(&mut self) -> &mut OrganizationPermission {
        &mut self.permission
    }

    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_ref()
    }
}

pub fn options() -> ResourceOptions {
    ResourceOptions::new(TYPE_NAME)
        .id_fields(["organization_id", "resource_type", "resource_id"])
        .refresh_state()
}

pub struct PermissionHooks<C> {
    validate_conflict: bool,
    _client: PhantomData<fn() -> C>,
}

impl<C> PermissionHooks<C> {
    pub fn new(validate_conflict: bool) -> Self {
        Self {
            validate_conflict,
            _client: PhantomData,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.permission_validate_conflict)
    }
}

impl<C> Default for PermissionHooks<C> {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

impl<C: PermissionApi + 'static> PermissionHooks<C> {
    /// Fail unless the target has no grants yet, or let it through with a
    /// warning when validation is off.
    async fn validate_conflict(&self, client: &C, plan: &OrganizationPermission) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let existing = match client
            .get_permissions(&plan.organization_id, &plan.resource_type, &plan.resource_id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                diags.add_error(
                    errmsg::SUMMARY_ERROR_CREATING_RESOURCE,
                    format!("failed to read remote state: {e}"),
                );
                return diags;
            }
        };

        if existing.is_empty() {
            return diags;
        }

        let target = plan.target();
        if self.validate_conflict {
            diags.add_error(
                errmsg::SUMMARY_ERROR_CREATING_RESOURCE,
                format!(
                    "resource conflict: The target {target:?} already has permissions configured. \
                     This likely indicates another `{TYPE_NAME}` resource is managing these permissions. \
                     Import it instead, or remove the other resource first"
                ),
            );
        } else {
            warn!(
                "Conflict validation is disabled. The remote state is not empty and will be overridden. \
                 This will cause issues if {:?} is managed by another resource.",
                target
            );
        }
        diags
    }

    async fn write(&self, client: &C, plan: &mut OrganizationPermission) -> ServiceResult<()> {
        client
            .set_permissions(
                &plan.organization_id,
                &plan.resource_type,
                &plan.resource_id,
                &plan.permissions,
            )
            .await?;
        plan.id = Some(plan.target());
        Ok(())
    }
}

#[async_trait]
impl<C: PermissionApi + 'static> ResourceHooks<OrganizationPermission> for PermissionHooks<C> {
    type Client = C;

    async fn create(&self, ctx: &OperationContext, client: &C, plan: &mut OrganizationPermission) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_CREATING_RESOURCE;

        debug!("Acquiring permission lock for {}", plan.target());
        let _guard = match ctx.run(PERMISSION_LOCK.lock()).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Gave up waiting for the permission lock on {}: {}", plan.target(), e);
                let mut diags = Diagnostics::new();
                diags.add_error(
                    errmsg::SUMMARY_CONTEXT_DONE,
                    errmsg::detail_context_done("create", TYPE_NAME, &plan.target(), e),
                );
                return diags;
            }
        };

        let diags = self.validate_conflict(client, plan).await;
        if diags.has_error() {
            return diags;
        }
        match self.write(client, plan).await {
            Ok(()) => diags,
            Err(e) => e.into_diagnostics(summary),
        }
    }

    async fn read(&self, _ctx: &OperationContext, client: &C, state: &mut OrganizationPermission) -> Diagnostics {
        match client
            .get_permissions(&state.organization_id, &state.resource_type, &state.resource_id)
            .await
        {
            Ok(grants) => {
                state.permissions = grants;
                state.id = Some(state.target());
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_READING_RESOURCE),
        }
    }

    async fn update(
        &self,
        _ctx: &OperationContext,
        client: &C,
        plan: &mut OrganizationPermission,
        _state: &OrganizationPermission,
        _config: &OrganizationPermission,
    ) -> Option<Diagnostics> {
        let summary = errmsg::SUMMARY_ERROR_UPDATING_RESOURCE;
        Some(match self.write(client, plan).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => e.into_diagnostics(summary),
        })
    }

    async fn delete(&self, _ctx: &OperationContext, client: &C, state: &mut OrganizationPermission) -> Diagnostics {
        match client
            .set_permissions(&state.organization_id, &state.resource_type, &state.resource_id, &[])
            .await
        {
            Ok(()) => Diagnostics::new(),
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_DELETING_RESOURCE),
        }
    }
}
