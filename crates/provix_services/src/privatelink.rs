//! AWS privatelinks on a service.

use std::marker::PhantomData;

use async_trait::async_trait;
use provix_adapter::{Model, ResourceHooks, ResourceOptions};
use provix_core::{errmsg, identifier, ApiError, Diagnostics, OperationContext, Timeouts};
use provix_waiter::{classify_privatelink, PrivatelinkState, StateChangeConf, DEFAULT_STATE_CHANGE_DELAY};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{Privatelink, PrivatelinkApi};
use crate::error::{ServiceError, ServiceResult};
use crate::wait_timeout;

pub const TYPE_NAME: &str = "provix_aws_privatelink";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsPrivatelink {
    pub project: String,
    pub service_name: String,
    pub principals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl AwsPrivatelink {
    fn apply(&mut self, link: &Privatelink) {
        self.principals = link.principals.clone();
        self.aws_service_id = link.aws_service_id.clone();
        self.aws_service_name = link.aws_service_name.clone();
        self.id = Some(identifier::build(&[&self.project, &self.service_name]));
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AwsPrivatelinkModel {
    #[serde(flatten)]
    pub privatelink: AwsPrivatelink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
}

impl Model for AwsPrivatelinkModel {
    type Shared = AwsPrivatelink;

    fn shared(&mut self) -> &mut AwsPrivatelink {
        &mut self.privatelink
    }

    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_ref()
    }
}

pub fn options() -> ResourceOptions {
    ResourceOptions::new(TYPE_NAME)
        .id_fields(["project", "service_name"])
        .refresh_state()
        .remove_missing()
}

/// Poll until the privatelink is `active`.
pub async fn wait_for_active<C: PrivatelinkApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    project: &str,
    service_name: &str,
) -> ServiceResult<Privatelink> {
    let timeout = wait_timeout(ctx);
    debug!("Privatelink waiter timeout {:?}", timeout);
    let converged = StateChangeConf::new(timeout)
        .pending([PrivatelinkState::Creating.as_str()])
        .target([PrivatelinkState::Active.as_str()])
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .wait(ctx, move || async move {
            client.get_privatelink(project, service_name).await.map(|link| {
                let state = link.state.clone();
                (Some(link), state)
            })
        })
        .await?;
    converged
        .into_object()
        .ok_or_else(|| ServiceError::from(ApiError::not_found(format!("privatelink of {service_name} not found"))))
}

pub struct PrivatelinkHooks<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> PrivatelinkHooks<C> {
    pub fn new() -> Self {
        Self { _client: PhantomData }
    }
}

impl<C> Default for PrivatelinkHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PrivatelinkApi + 'static> PrivatelinkHooks<C> {
    async fn settle(
        &self,
        ctx: &OperationContext,
        client: &C,
        link: &mut AwsPrivatelink,
        summary: &str,
    ) -> Diagnostics {
        match wait_for_active(ctx, client, &link.project, &link.service_name).await {
            Ok(settled) => {
                link.apply(&settled);
                classify_privatelink(&settled.state)
            }
            Err(e) => e.into_diagnostics(summary),
        }
    }
}

#[async_trait]
impl<C: PrivatelinkApi + 'static> ResourceHooks<AwsPrivatelink> for PrivatelinkHooks<C> {
    type Client = C;

    async fn create(&self, ctx: &OperationContext, client: &C, plan: &mut AwsPrivatelink) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_CREATING_RESOURCE;
        match client
            .create_privatelink(&plan.project, &plan.service_name, &plan.principals)
            .await
        {
            Ok(link) => plan.apply(&link),
            Err(e) => return ServiceError::from(e).into_diagnostics(summary),
        }
        self.settle(ctx, client, plan, summary).await
    }

    async fn read(&self, _ctx: &OperationContext, client: &C, state: &mut AwsPrivatelink) -> Diagnostics {
        match client.get_privatelink(&state.project, &state.service_name).await {
            Ok(link) => {
                state.apply(&link);
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_READING_RESOURCE),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &C,
        plan: &mut AwsPrivatelink,
        state: &AwsPrivatelink,
        _config: &AwsPrivatelink,
    ) -> Option<Diagnostics> {
        let summary = errmsg::SUMMARY_ERROR_UPDATING_RESOURCE;
        if plan.principals == state.principals {
            return None;
        }
        if let Err(e) = client
            .update_privatelink(&plan.project, &plan.service_name, &plan.principals)
            .await
        {
            return Some(ServiceError::from(e).into_diagnostics(summary));
        }
        Some(self.settle(ctx, client, plan, summary).await)
    }

    async fn delete(&self, _ctx: &OperationContext, client: &C, state: &mut AwsPrivatelink) -> Diagnostics {
        match client.delete_privatelink(&state.project, &state.service_name).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_DELETING_RESOURCE),
        }
    }
}
