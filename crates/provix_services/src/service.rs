//! Managed services.
//!
//! Creation waits for `RUNNING` observed five times in a row plus secondary
//! readiness: backups for the service types that take them, a reachable
//! public Grafana endpoint, and the requested static IPs. Updates only wait
//! for secondary readiness: a plan or cloud migration can rebuild a large
//! service for hours, and a service that was running before can keep being
//! managed meanwhile.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use provix_adapter::{Model, ResourceHooks, ResourceOptions};
use provix_core::{errmsg, identifier, ApiError, Diagnostics, OperationContext, Timeouts};
use provix_waiter::{
    classify_service, ServiceState, StateChangeConf, UnexpectedStatePolicy, WaitError, DEFAULT_STATE_CHANGE_DELAY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::client::{ApiResult, CreateServiceRequest, Service, ServiceApi, UpdateServiceRequest};
use crate::error::{ServiceError, ServiceResult};
use crate::wait_timeout;

pub const TYPE_NAME: &str = "provix_service";

const MIN_TIMEOUT: Duration = Duration::from_secs(2);

const CONTINUOUS_RUNNING: u32 = 5;

/// Service types that keep backups.
const BACKUP_SERVICE_TYPES: [&str; 4] = ["pg", "elasticsearch", "redis", "influxdb"];

const READ_REPLICA: &str = "read_replica";

const GRAFANA_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

const OPEN_IP_FILTER: &str = "0.0.0.0/0";

const STATIC_IP_ASSIGNED: &str = "assigned";
const STATIC_IP_AVAILABLE: &str = "available";

/// True once a service that keeps backups has its first one.
pub fn backups_ready(service: &Service) -> bool {
    if !BACKUP_SERVICE_TYPES.contains(&service.service_type.as_str()) {
        return true;
    }

    if service.service_type == "redis"
        && service.user_config.get("redis_persistence").and_then(Value::as_str) == Some("off")
    {
        return true;
    }

    // Read replicas never back up.
    let is_replica = service.integrations.iter().any(|i| {
        i.integration_type == READ_REPLICA && i.destination_service.as_deref() == Some(service.service_name.as_str())
    });
    if is_replica {
        return true;
    }

    !service.backups.is_empty()
}

fn ip_filter_network(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(network) => Some(network.as_str()),
        Value::Object(m) => m.get("network").and_then(Value::as_str),
        _ => None,
    }
}

/// True once a Grafana service open to everyone accepts connections on its
/// public primary endpoint. Any other ip filter skips the check.
pub async fn grafana_ready(service: &Service) -> bool {
    if service.service_type != "grafana" {
        return true;
    }

    if let Some(Value::Array(filters)) = service.user_config.get("ip_filter") {
        let restricted = match filters.as_slice() {
            [] => false,
            [only] => ip_filter_network(only) != Some(OPEN_IP_FILTER),
            _ => true,
        };
        if restricted {
            debug!("Grafana service has ip filters {:?}, skipping availability check", filters);
            return true;
        }
    }

    let Some(public) = service
        .components
        .iter()
        .rev()
        .find(|c| c.route == "public" && c.usage == "primary")
    else {
        return true;
    };

    let addr = format!("{}:{}", public.host, public.port);
    match tokio::time::timeout(GRAFANA_DIAL_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => {
            debug!("Public grafana {} is reachable", addr);
            true
        }
        _ => {
            debug!("Public grafana {} is not yet reachable", addr);
            false
        }
    }
}

/// True once every expected static IP is associated with the service and
/// either assigned or available.
pub async fn static_ips_ready<C: ServiceApi + ?Sized>(
    client: &C,
    project: &str,
    service_name: &str,
    expected: &[String],
) -> ApiResult<bool> {
    if expected.is_empty() {
        return Ok(true);
    }
    let ips = client.list_static_ips(project).await?;
    Ok(expected.iter().all(|id| {
        ips.iter().any(|ip| {
            ip.static_ip_address_id == *id
                && ip.service_name == service_name
                && matches!(ip.state.as_str(), STATIC_IP_ASSIGNED | STATIC_IP_AVAILABLE)
        })
    }))
}

/// Which wait to run after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceWait {
    Create,
    Update,
}

/// State the waiter sees for `service`. An update treats the service as
/// running and only holds on secondary readiness.
async fn observed_state<C: ServiceApi + ?Sized>(
    client: &C,
    project: &str,
    service: &Service,
    wait: ServiceWait,
    static_ips: &[String],
) -> ApiResult<String> {
    let running = ServiceState::Running.as_str();
    let waiting = ServiceState::WaitingForServices.as_str();
    let state = match wait {
        ServiceWait::Create => service.state.as_str(),
        ServiceWait::Update => running,
    };

    if state != running {
        debug!("Service reports as {}, still waiting for {}", state, running);
        return Ok(state.to_string());
    }
    if !backups_ready(service) {
        debug!("Service reports as {}, still waiting for backups", state);
        return Ok(waiting.to_string());
    }
    if !grafana_ready(service).await {
        debug!("Service reports as {}, still waiting for grafana", state);
        return Ok(waiting.to_string());
    }
    if !static_ips_ready(client, project, &service.service_name, static_ips).await? {
        debug!("Service reports as {}, still waiting for static ips", state);
        return Ok(waiting.to_string());
    }
    Ok(state.to_string())
}

pub async fn wait_for<C: ServiceApi + ?Sized>(
    ctx: &OperationContext,
    client: &C,
    project: &str,
    service_name: &str,
    static_ips: &[String],
    wait: ServiceWait,
) -> ServiceResult<Service> {
    let timeout = wait_timeout(ctx);
    debug!("Service {:?} waiter timeout {:?}", wait, timeout);

    let converged = StateChangeConf::new(timeout)
        .pending(ServiceState::PENDING.map(|s| s.as_str()))
        .target([ServiceState::Running.as_str()])
        .delay(DEFAULT_STATE_CHANGE_DELAY)
        .min_timeout(MIN_TIMEOUT)
        .continuous_target_occurence(CONTINUOUS_RUNNING)
        .unexpected_state(UnexpectedStatePolicy::Fail)
        .wait(ctx, move || async move {
            let service = client.get_service(project, service_name).await?;
            let state = observed_state(client, project, &service, wait, static_ips).await?;
            Ok::<_, ApiError>((Some(service), state))
        })
        .await?;

    converged
        .into_object()
        .ok_or_else(|| ServiceError::from(ApiError::not_found(format!("service {service_name} not found"))))
}

/// Turn a failed wait into diagnostics, naming the state the service is
/// stuck in when there is one.
fn wait_failed(service_name: &str, err: ServiceError, summary: &str) -> Diagnostics {
    let stuck = match &err {
        ServiceError::Wait(WaitError::UnexpectedState { state, .. }) => Some(state.as_str()),
        ServiceError::Wait(WaitError::Timeout { last_state, .. }) if !last_state.is_empty() => {
            Some(last_state.as_str())
        }
        _ => None,
    };
    let Some(state) = stuck else {
        return err.into_diagnostics(summary);
    };

    let mut diags = classify_service(service_name, state);
    if let ServiceError::Wait(e @ WaitError::Timeout { .. }) = &err {
        diags.push(e.to_diagnostic(summary));
    }
    diags
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedService {
    pub project: String,
    pub service_name: String,
    pub service_type: String,
    pub plan: String,
    pub cloud_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_config: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ManagedService {
    fn apply(&mut self, service: &Service) {
        self.service_name = service.service_name.clone();
        self.service_type = service.service_type.clone();
        self.plan = service.plan.clone();
        self.cloud_name = service.cloud_name.clone();
        self.user_config = service.user_config.clone();
        self.state = Some(service.state.clone());
        self.id = Some(identifier::build(&[&self.project, &self.service_name]));
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ManagedServiceModel {
    #[serde(flatten)]
    pub service: ManagedService,
    #[serde(default)]
    pub termination_protection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
}

impl Model for ManagedServiceModel {
    type Shared = ManagedService;

    fn shared(&mut self) -> &mut ManagedService {
        &mut self.service
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
        .termination_protection()
}

pub struct ServiceHooks<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> ServiceHooks<C> {
    pub fn new() -> Self {
        Self { _client: PhantomData }
    }
}

impl<C> Default for ServiceHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: ServiceApi + 'static> ResourceHooks<ManagedService> for ServiceHooks<C> {
    type Client = C;

    async fn create(&self, ctx: &OperationContext, client: &C, plan: &mut ManagedService) -> Diagnostics {
        let summary = errmsg::SUMMARY_ERROR_CREATING_RESOURCE;
        let req = CreateServiceRequest {
            service_name: plan.service_name.clone(),
            service_type: plan.service_type.clone(),
            plan: plan.plan.clone(),
            cloud_name: plan.cloud_name.clone(),
            project_vpc_id: plan.project_vpc_id.clone(),
            user_config: plan.user_config.clone(),
            static_ips: plan.static_ips.clone(),
        };
        info!("Creating {} service {}", plan.service_type, plan.service_name);
        if let Err(e) = client.create_service(&plan.project, &req).await {
            return ServiceError::from(e).into_diagnostics(summary);
        }
        plan.id = Some(identifier::build(&[&plan.project, &plan.service_name]));

        match wait_for(ctx, client, &plan.project, &plan.service_name, &plan.static_ips, ServiceWait::Create).await {
            Ok(service) => {
                plan.apply(&service);
                Diagnostics::new()
            }
            Err(e) => wait_failed(&plan.service_name, e, summary),
        }
    }

    async fn read(&self, _ctx: &OperationContext, client: &C, state: &mut ManagedService) -> Diagnostics {
        match client.get_service(&state.project, &state.service_name).await {
            Ok(service) => {
                state.apply(&service);
                Diagnostics::new()
            }
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_READING_RESOURCE),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &C,
        plan: &mut ManagedService,
        _state: &ManagedService,
        _config: &ManagedService,
    ) -> Option<Diagnostics> {
        let summary = errmsg::SUMMARY_ERROR_UPDATING_RESOURCE;
        let req = UpdateServiceRequest {
            plan: plan.plan.clone(),
            cloud_name: plan.cloud_name.clone(),
            user_config: plan.user_config.clone(),
        };
        info!("Updating service {}", plan.service_name);
        if let Err(e) = client.update_service(&plan.project, &plan.service_name, &req).await {
            return Some(ServiceError::from(e).into_diagnostics(summary));
        }

        Some(
            match wait_for(ctx, client, &plan.project, &plan.service_name, &plan.static_ips, ServiceWait::Update)
                .await
            {
                Ok(service) => {
                    plan.apply(&service);
                    Diagnostics::new()
                }
                Err(e) => wait_failed(&plan.service_name, e, summary),
            },
        )
    }

    async fn delete(&self, _ctx: &OperationContext, client: &C, state: &mut ManagedService) -> Diagnostics {
        info!("Deleting service {}", state.service_name);
        match client.delete_service(&state.project, &state.service_name).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => ServiceError::from(e).into_diagnostics(errmsg::SUMMARY_ERROR_DELETING_RESOURCE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Backup, MockServiceApi, ServiceComponent, ServiceIntegration, StaticIp};
    use provix_adapter::{CreateRequest, ModifyPlanRequest, ProviderData, ResourceAdapter, UpdateRequest};
    use provix_core::ProviderConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn service(service_type: &str, state: &str) -> Service {
        Service {
            service_name: "db1".to_string(),
            service_type: service_type.to_string(),
            plan: "startup-4".to_string(),
            cloud_name: "google-europe-west1".to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    fn backed_up(mut s: Service) -> Service {
        s.backups.push(Backup {
            backup_name: "first".to_string(),
            data_size: 1,
        });
        s
    }

    fn plan() -> serde_json::Value {
        json!({
            "project": "p",
            "service_name": "db1",
            "service_type": "pg",
            "plan": "startup-4",
            "cloud_name": "google-europe-west1",
        })
    }

    fn adapter(client: MockServiceApi) -> ResourceAdapter<ManagedServiceModel, ServiceHooks<MockServiceApi>> {
        let adapter = ResourceAdapter::new(options(), ServiceHooks::new());
        adapter.configure(Some(ProviderData::new(Arc::new(client), ProviderConfig::default())));
        adapter
    }

    #[test]
    fn test_backups_ready() {
        assert!(backups_ready(&service("kafka", "RUNNING")));
        assert!(!backups_ready(&service("pg", "RUNNING")));
        assert!(backups_ready(&backed_up(service("pg", "RUNNING"))));

        let mut redis = service("redis", "RUNNING");
        assert!(!backups_ready(&redis));
        redis.user_config.insert("redis_persistence".to_string(), json!("off"));
        assert!(backups_ready(&redis));

        let mut replica = service("pg", "RUNNING");
        replica.integrations.push(ServiceIntegration {
            integration_type: "read_replica".to_string(),
            source_service: "db0".to_string(),
            destination_service: Some("db1".to_string()),
        });
        assert!(backups_ready(&replica));
    }

    #[tokio::test]
    async fn test_update_ignores_rebuilding() {
        let client = MockServiceApi::new();
        let s = backed_up(service("pg", "REBUILDING"));
        let state = observed_state(&client, "p", &s, ServiceWait::Create, &[]).await.unwrap();
        assert_eq!(state, "REBUILDING");
        let state = observed_state(&client, "p", &s, ServiceWait::Update, &[]).await.unwrap();
        assert_eq!(state, "RUNNING");

        let no_backups = service("pg", "REBUILDING");
        let state = observed_state(&client, "p", &no_backups, ServiceWait::Update, &[]).await.unwrap();
        assert_eq!(state, "WAITING_FOR_SERVICES");
    }

    fn grafana(port: u16) -> Service {
        let mut s = service("grafana", "RUNNING");
        s.components = vec![
            ServiceComponent {
                component: "grafana".to_string(),
                host: "127.0.0.1".to_string(),
                port,
                route: "public".to_string(),
                usage: "primary".to_string(),
            },
            ServiceComponent {
                component: "grafana".to_string(),
                host: "10.0.0.1".to_string(),
                port: 443,
                route: "dynamic".to_string(),
                usage: "primary".to_string(),
            },
        ];
        s
    }

    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_grafana_ready_dials_public_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        assert!(grafana_ready(&grafana(open)).await);

        let closed = closed_port().await;
        assert!(!grafana_ready(&grafana(closed)).await);

        // Only services open to everyone are checked.
        let mut filtered = grafana(closed);
        filtered.user_config.insert("ip_filter".to_string(), json!(["10.0.0.0/8"]));
        assert!(grafana_ready(&filtered).await);
        filtered.user_config.insert("ip_filter".to_string(), json!([{"network": "0.0.0.0/0"}]));
        assert!(!grafana_ready(&filtered).await);

        let mut private = grafana(closed);
        private.components.retain(|c| c.route != "public");
        assert!(grafana_ready(&private).await);

        assert!(grafana_ready(&service("pg", "RUNNING")).await);
    }

    fn static_ip(id: &str, service_name: &str, state: &str) -> StaticIp {
        StaticIp {
            static_ip_address_id: id.to_string(),
            service_name: service_name.to_string(),
            state: state.to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_ips_hold_secondary_readiness() {
        let expected = vec!["ip1".to_string(), "ip2".to_string()];
        let running = backed_up(service("pg", "RUNNING"));

        let mut client = MockServiceApi::new();
        client.expect_list_static_ips().returning(|_| {
            Ok(vec![
                static_ip("ip1", "db1", "assigned"),
                static_ip("ip2", "db1", "creating"),
                static_ip("ip3", "db2", "assigned"),
            ])
        });
        assert!(!static_ips_ready(&client, "p", "db1", &expected).await.unwrap());
        for wait in [ServiceWait::Create, ServiceWait::Update] {
            let state = observed_state(&client, "p", &running, wait, &expected).await.unwrap();
            assert_eq!(state, "WAITING_FOR_SERVICES");
        }

        let mut client = MockServiceApi::new();
        client
            .expect_list_static_ips()
            .returning(|_| Ok(vec![static_ip("ip1", "db1", "assigned"), static_ip("ip2", "db1", "available")]));
        assert!(static_ips_ready(&client, "p", "db1", &expected).await.unwrap());
        let state = observed_state(&client, "p", &running, ServiceWait::Create, &expected).await.unwrap();
        assert_eq!(state, "RUNNING");

        let mut client = MockServiceApi::new();
        client.expect_list_static_ips().never();
        assert!(static_ips_ready(&client, "p", "db1", &[]).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_static_ips() {
        let mut client = MockServiceApi::new();
        client
            .expect_create_service()
            .withf(|_, req| req.static_ips == vec!["ip1".to_string()])
            .times(1)
            .returning(|_, _| Ok(service("pg", "REBUILDING")));
        client
            .expect_get_service()
            .returning(|_, _| Ok(backed_up(service("pg", "RUNNING"))));
        let listed = Arc::new(AtomicU32::new(0));
        let seen = listed.clone();
        client.expect_list_static_ips().returning(move |_| {
            let state = if seen.fetch_add(1, Ordering::SeqCst) < 2 { "creating" } else { "assigned" };
            Ok(vec![static_ip("ip1", "db1", state)])
        });

        let mut plan = plan();
        plan["static_ips"] = json!(["ip1"]);
        let rsp = adapter(client)
            .create(&OperationContext::background(), CreateRequest { plan })
            .await;

        assert!(!rsp.diagnostics.has_error(), "{}", rsp.diagnostics);
        assert_eq!(rsp.state.unwrap()["static_ips"], json!(["ip1"]));
        // 2 not ready + 5 consecutive RUNNING.
        assert_eq!(listed.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_needs_continuous_running_with_backups() {
        let mut client = MockServiceApi::new();
        client.expect_create_service().times(1).returning(|_, _| Ok(service("pg", "REBUILDING")));
        let polls = Arc::new(AtomicU32::new(0));
        let seen = polls.clone();
        client.expect_get_service().returning(move |_, _| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            Ok(match n {
                0 => service("pg", "REBUILDING"),
                // Running but no backup yet.
                1 | 2 => service("pg", "RUNNING"),
                _ => backed_up(service("pg", "RUNNING")),
            })
        });

        let rsp = adapter(client)
            .create(&OperationContext::background(), CreateRequest { plan: plan() })
            .await;

        assert!(!rsp.diagnostics.has_error(), "{}", rsp.diagnostics);
        assert_eq!(rsp.state.unwrap()["state"], "RUNNING");
        // 3 not ready + 5 consecutive RUNNING + the refresh read.
        assert_eq!(polls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poweroff_is_fatal() {
        let mut client = MockServiceApi::new();
        client.expect_create_service().returning(|_, _| Ok(service("pg", "REBUILDING")));
        client.expect_get_service().returning(|_, _| Ok(service("pg", "POWEROFF")));
        // Terminal, so the create is rolled back.
        client.expect_delete_service().times(1).returning(|_, _| Ok(()));

        let rsp = adapter(client)
            .create(&OperationContext::background(), CreateRequest { plan: plan() })
            .await;

        assert!(rsp.state.is_none());
        let err = rsp.diagnostics.first_error().unwrap();
        assert_eq!(err.summary, errmsg::SUMMARY_TERMINAL_STATE);
        assert!(err.detail.contains("powered off"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_does_not_wait_for_running() {
        let mut client = MockServiceApi::new();
        client
            .expect_update_service()
            .withf(|_, name, req| name == "db1" && req.plan == "business-8")
            .times(1)
            .returning(|_, _, _| Ok(service("pg", "REBUILDING")));
        client
            .expect_get_service()
            .returning(|_, _| Ok(backed_up(service("pg", "REBUILDING"))));

        let mut new_plan = plan();
        new_plan["plan"] = json!("business-8");
        let rsp = adapter(client)
            .update(
                &OperationContext::background(),
                UpdateRequest {
                    plan: new_plan.clone(),
                    state: plan(),
                    config: new_plan,
                },
            )
            .await;

        assert!(!rsp.diagnostics.has_error(), "{}", rsp.diagnostics);
        assert_eq!(rsp.state.unwrap()["state"], "REBUILDING");
    }

    #[tokio::test]
    async fn test_termination_protection_blocks_destroy() {
        let client = MockServiceApi::new();
        let mut state = plan();
        state["termination_protection"] = json!(true);

        let rsp = adapter(client)
            .modify_plan(
                &OperationContext::background(),
                ModifyPlanRequest {
                    plan: serde_json::Value::Null,
                    state,
                    config: serde_json::Value::Null,
                },
            )
            .await;

        assert!(rsp.diagnostics.has_error_summary(errmsg::SUMMARY_ERROR_DELETING_RESOURCE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_service_reports_state() {
        let mut client = MockServiceApi::new();
        client.expect_create_service().returning(|_, _| Ok(service("pg", "REBUILDING")));
        client.expect_get_service().returning(|_, _| Ok(service("pg", "REBALANCING")));

        let mut plan = plan();
        plan["timeouts"] = json!({"create": "2m"});
        let rsp = adapter(client)
            .create(&OperationContext::background(), CreateRequest { plan })
            .await;

        let summaries: Vec<_> = rsp.diagnostics.errors().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![errmsg::SUMMARY_CONVERGENCE_TIMEOUT, errmsg::SUMMARY_CONVERGENCE_TIMEOUT]
        );
        assert!(rsp.diagnostics.first_error().unwrap().detail.contains("REBALANCING"));
    }
}
