//! VPC peering connections.
//!
//! A peering is created on our side and then waits on the peer. Creation
//! returns once the connection leaves `APPROVED`; the state it settles in is
//! classified, and a terminal one makes the adapter roll the create back.
//!
//! Identifiers come in two shapes, `project/vpc_id/peer_account/peer_vpc`
//! and the same with a trailing `/peer_region`.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use provix_adapter::{Model, ResourceHooks, ResourceOptions};
use provix_core::{errmsg, identifier, CoreResult, Diagnostics, OperationContext, Timeouts};
use provix_waiter::{classify_peering, PeeringState, StateChangeConf, WaitError, DEFAULT_STATE_CHANGE_DELAY};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{CreatePeeringRequest, PeeringApi, PeeringConnection, PeeringKey};
use crate::error::{ServiceError, ServiceResult};
use crate::wait_timeout;

pub const TYPE_NAME: &str = "provix_vpc_peering_connection";

const MIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Reported by the API while the peer request is being forwarded.
const APPROVED_PEER_REQUESTED: &str = "APPROVED_PEER_REQUESTED";

impl PeeringKey {
    /// Decode a 4 or 5 segment peering identifier.
    pub fn parse(id: &str) -> CoreResult<Self> {
        let mut parts = identifier::split_between(id, 4, 5)?.into_iter();
        let mut next = || parts.next().unwrap_or_default();
        Ok(Self {
            project: next(),
            vpc_id: next(),
            peer_cloud_account: next(),
            peer_vpc: next(),
            peer_region: Some(next()).filter(|r| !r.is_empty()),
        })
    }

    pub fn to_id(&self) -> String {
        let mut parts = vec![
            self.project.as_str(),
            self.vpc_id.as_str(),
            self.peer_cloud_account.as_str(),
            self.peer_vpc.as_str(),
        ];
        if let Some(region) = self.peer_region.as_deref() {
            parts.push(region);
        }
        identifier::build(&parts)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peering {
    pub project: String,
    pub vpc_id: String,
    pub peer_cloud_account: String,
    pub peer_vpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_peer_network_cidrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_info: BTreeMap<String, String>,
    /// AWS side id, once the peer accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering_connection_id: Option<String>,
}

impl Peering {
    /// The stored identifier wins over the individual fields.
    pub fn key(&self) -> ServiceResult<PeeringKey> {
        if let Some(id) = self.id.as_deref() {
            return Ok(PeeringKey::parse(id)?);
        }
        Ok(PeeringKey {
            project: self.project.clone(),
            vpc_id: self.vpc_id.clone(),
            peer_cloud_account: self.peer_cloud_account.clone(),
            peer_vpc: self.peer_vpc.clone(),
            peer_region: self.peer_region.clone().filter(|r| !r.is_empty()),
        })
    }

    fn apply(&mut self, key: &PeeringKey, pc: &PeeringConnection) {
        self.project = key.project.clone();
        self.vpc_id = key.vpc_id.clone();
        self.peer_cloud_account = pc.peer_cloud_account.clone();
        self.peer_vpc = pc.peer_vpc.clone();
        if pc.peer_region.is_some() {
            self.peer_region = pc.peer_region.clone();
        }
        self.user_peer_network_cidrs = pc.user_peer_network_cidrs.clone();
        self.state = Some(pc.state.clone());
        self.state_info = pc.state_info.clone();
        self.peering_connection_id = pc.state_info.get("aws_vpc_peering_connection_id").cloned();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PeeringModel {
    #[serde(flatten)]
    pub peering: Peering,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
}

impl Model for PeeringModel {
    type Shared = Peering;

    fn shared(&mut self) -> &mut Peering {
        &mut self.peering
    }

    fn timeouts(&self) -> Option<&Timeouts> {
        self.timeouts.as_ref()
    }
}

pub fn options() -> ResourceOptions {
    ResourceOptions::new(TYPE_NAME)
        .id_fields(["project", "vpc_id", "peer_cloud_account", "peer_vpc"])
        .refresh_state()
        .remove_missing()
}

/// Poll until the connection leaves `APPROVED`.
pub async fn wait_for_settled<C: PeeringApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    key: &PeeringKey,
) -> ServiceResult<PeeringConnection> {
    let converged = StateChangeConf::new(wait_timeout(ctx))
        .pending([PeeringState::Approved.as_str()])
        .target(PeeringState::build_targets())
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .min_timeout(MIN_TIMEOUT)
        .wait(ctx, move || async move {
            client.get_peering(key).await.map(|pc| {
                let state = pc.state.clone();
                (Some(pc), state)
            })
        })
        .await?;

    debug!(
        "Peering {} settled in {} after {} polls",
        key.to_id(),
        converged.report.state,
        converged.report.polls
    );
    converged
        .into_object()
        .ok_or(ServiceError::Wait(WaitError::NotFound { checks: 0 }))
}

/// Poll until the connection is `DELETED`. A connection that is already gone
/// counts as deleted.
pub async fn wait_for_deletion<C: PeeringApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    key: &PeeringKey,
) -> ServiceResult<()> {
    let mut pending = PeeringState::delete_pending();
    pending.push(APPROVED_PEER_REQUESTED);

    let waited = StateChangeConf::new(wait_timeout(ctx))
        .pending(pending)
        .target([PeeringState::Deleted.as_str()])
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .min_timeout(MIN_TIMEOUT)
        .wait(ctx, move || async move {
            client.get_peering(key).await.map(|pc| {
                let state = pc.state.clone();
                (Some(pc), state)
            })
        })
        .await;

    match waited {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub struct PeeringHooks<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> PeeringHooks<C> {
    pub fn new() -> Self {
        Self { _client: PhantomData }
    }
}

impl<C> Default for PeeringHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: PeeringApi + 'static> ResourceHooks<Peering> for PeeringHooks<C> {
    type Client = C;

    async fn create(&self, ctx: &OperationContext, client: &C, plan: &mut Peering) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_CREATING_RESOURCE;
        plan.id = None;
        let key = match plan.key() {
            Ok(key) => key,
            Err(e) => return e.into_diagnostics(summary),
        };

        match client.get_peering(&key).await {
            Ok(_) => {
                return ServiceError::Conflict(format!("VPC peering connection {:?} already exists", key.to_id()))
                    .into_diagnostics(summary)
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return ServiceError::from(e).into_diagnostics(summary),
        }

        let req = CreatePeeringRequest {
            peer_cloud_account: key.peer_cloud_account.clone(),
            peer_vpc: key.peer_vpc.clone(),
            peer_region: key.peer_region.clone(),
            user_peer_network_cidrs: plan.user_peer_network_cidrs.clone(),
        };
        info!("Requesting VPC peering {}", key.to_id());
        if let Err(e) = client.create_peering(&key.project, &key.vpc_id, &req).await {
            return ServiceError::from(e).into_diagnostics(summary);
        }

        let pc = match wait_for_settled(ctx, client, &key).await {
            Ok(pc) => pc,
            Err(e) => return e.into_diagnostics(summary),
        };

        // The id is needed by a rollback as much as by a later read.
        plan.apply(&key, &pc);
        plan.id = Some(key.to_id());
        classify_peering(&pc.state, &pc.state_info)
    }

    async fn read(&self, _ctx: &OperationContext, client: &C, state: &mut Peering) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_READING_RESOURCE;
        let key = match state.key() {
            Ok(key) => key,
            Err(e) => return e.into_diagnostics(summary),
        };
        match client.get_peering(&key).await {
            Ok(pc) => {
                state.apply(&key, &pc);
                state.id = Some(key.to_id());
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(summary),
        }
    }

    async fn delete(&self, ctx: &OperationContext, client: &C, state: &mut Peering) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_DELETING_RESOURCE;
        let key = match state.key() {
            Ok(key) => key,
            Err(e) => return e.into_diagnostics(summary),
        };

        match client.delete_peering(&key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Peering {} already gone", key.to_id()),
            Err(e) => return ServiceError::from(e).into_diagnostics(summary),
        }

        match wait_for_deletion(ctx, client, &key).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => e.into_diagnostics(summary),
        }
    }
}
