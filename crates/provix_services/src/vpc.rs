//! Project VPCs and their data source.

use std::marker::PhantomData;

use async_trait::async_trait;
use provix_adapter::{DataSourceHooks, DataSourceOptions, Model, ResourceHooks, ResourceOptions};
use provix_core::{errmsg, identifier, ApiError, Diagnostics, OperationContext, Timeouts};
use provix_waiter::{
    classify_vpc, StateChangeConf, VpcState, DEFAULT_STATE_CHANGE_DELAY, DEFAULT_STATE_CHANGE_MIN_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{Vpc, VpcApi};
use crate::error::{ServiceError, ServiceResult};
use crate::wait_timeout;

pub const TYPE_NAME: &str = "provix_project_vpc";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectVpc {
    pub project: String,
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub network_cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ProjectVpc {
    fn vpc_id(&self) -> ServiceResult<String> {
        if let Some(id) = self.vpc_id.as_deref().filter(|v| !v.is_empty()) {
            return Ok(id.to_string());
        }
        let (_, vpc_id) = identifier::split2(self.id.as_deref().unwrap_or_default())?;
        Ok(vpc_id)
    }

    fn apply(&mut self, vpc: &Vpc) {
        self.cloud_name = vpc.cloud_name.clone();
        self.network_cidr = vpc.network_cidr.clone();
        self.vpc_id = Some(vpc.project_vpc_id.clone());
        self.id = Some(identifier::build(&[&self.project, &vpc.project_vpc_id]));
        self.state = Some(vpc.state.clone());
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProjectVpcModel {
    #[serde(flatten)]
    pub vpc: ProjectVpc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
}

impl Model for ProjectVpcModel {
    type Shared = ProjectVpc;

    fn shared(&mut self) -> &mut ProjectVpc {
        &mut self.vpc
    }

    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_ref()
    }
}

pub fn options() -> ResourceOptions {
    ResourceOptions::new(TYPE_NAME)
        .id_fields(["project", "vpc_id"])
        .refresh_state()
        .remove_missing()
}

pub fn data_source_options() -> DataSourceOptions {
    DataSourceOptions::new(TYPE_NAME)
}

/// Poll until the VPC is `ACTIVE`.
pub async fn wait_for_active<C: VpcApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    project: &str,
    vpc_id: &str,
) -> ServiceResult<Vpc> {
    let timeout = wait_timeout(ctx);
    debug!("Active waiter timeout {:?}", timeout);
    let converged = StateChangeConf::new(timeout)
        .pending([VpcState::Approved, VpcState::Deleting, VpcState::Deleted].map(|s| s.as_str()))
        .target([VpcState::Active.as_str()])
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .min_timeout(DEFAULT_STATE_CHANGE_MIN_TIMEOUT)
        .wait(ctx, move || async move {
            client.get_vpc(project, vpc_id).await.map(|vpc| {
                let state = vpc.state.clone();
                (Some(vpc), state)
            })
        })
        .await?;
    converged
        .into_object()
        .ok_or_else(|| ServiceError::from(ApiError::not_found(format!("VPC {vpc_id} not found"))))
}

/// Poll until the VPC is `DELETED`, which a 404 also means.
pub async fn wait_for_deletion<C: VpcApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    project: &str,
    vpc_id: &str,
) -> ServiceResult<()> {
    let waited = StateChangeConf::new(wait_timeout(ctx))
        .pending([VpcState::Approved, VpcState::Deleting, VpcState::Active].map(|s| s.as_str()))
        .target([VpcState::Deleted.as_str()])
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .min_timeout(DEFAULT_STATE_CHANGE_MIN_TIMEOUT)
        .wait(ctx, move || async move {
            client.get_vpc(project, vpc_id).await.map(|vpc| {
                let state = vpc.state.clone();
                (Some(vpc), state)
            })
        })
        .await;
    match waited {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub struct ProjectVpcHooks<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> ProjectVpcHooks<C> {
    pub fn new() -> Self {
        Self { _client: PhantomData }
    }
}

impl<C> Default for ProjectVpcHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: VpcApi + 'static> ResourceHooks<ProjectVpc> for ProjectVpcHooks<C> {
    type Client = C;

    async fn create(&self, ctx: &OperationContext, client: &C, plan: &mut ProjectVpc) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_CREATING_RESOURCE;
        info!("Creating VPC in {} ({})", plan.cloud_name, plan.network_cidr);
        let vpc = match client.create_vpc(&plan.project, &plan.cloud_name, &plan.network_cidr).await {
            Ok(vpc) => vpc,
            Err(e) => return ServiceError::from(e).into_diagnostics(summary),
        };
        // Identity first, so a failed wait still leaves something to delete.
        plan.apply(&vpc);

        match wait_for_active(ctx, client, &plan.project, &vpc.project_vpc_id).await {
            Ok(vpc) => {
                plan.apply(&vpc);
                classify_vpc(&vpc.state)
            }
            Err(e) => e.into_diagnostics(summary),
        }
    }

    async fn read(&self, _ctx: &OperationContext, client: &C, state: &mut ProjectVpc) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_READING_RESOURCE;
        let vpc_id = match state.vpc_id() {
            Ok(id) => id,
            Err(e) => return e.into_diagnostics(summary),
        };
        match client.get_vpc(&state.project, &vpc_id).await {
            Ok(vpc) => {
                state.apply(&vpc);
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(summary),
        }
    }

    async fn delete(&self, ctx: &OperationContext, client: &C, state: &mut ProjectVpc) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_DELETING_RESOURCE;
        let vpc_id = match state.vpc_id() {
            Ok(id) => id,
            Err(e) => return e.into_diagnostics(summary),
        };
        match client.delete_vpc(&state.project, &vpc_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Diagnostics::new(),
            Err(e) => return ServiceError::from(e).into_diagnostics(summary),
        }
        match wait_for_deletion(ctx, client, &state.project, &vpc_id).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => e.into_diagnostics(summary),
        }
    }
}

/// Looks a VPC up by project and id.
pub struct ProjectVpcLookup<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> ProjectVpcLookup<C> {
    pub fn new() -> Self {
        Self { _client: PhantomData }
    }
}

impl<C> Default for ProjectVpcLookup<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: VpcApi + 'static> DataSourceHooks<ProjectVpc> for ProjectVpcLookup<C> {
    type Client = C;

    async fn read(&self, _ctx: &OperationContext, client: &C, config: &mut ProjectVpc) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_READING_DATA_SOURCE;
        let vpc_id = match config.vpc_id() {
            Ok(id) => id,
            Err(e) => return e.into_diagnostics(summary),
        };
        match client.get_vpc(&config.project, &vpc_id).await {
            Ok(vpc) => {
                config.apply(&vpc);
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(summary),
        }
    }
}
