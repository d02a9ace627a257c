//! End-to-end tests of the provider registries against an in-memory API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use provix_adapter::{CreateRequest, DataSourceReadRequest, DeleteRequest, ReadRequest};
use provix_core::{errmsg, ApiError, OperationContext, ProviderConfig};
use provix_services::client::{
    CreatePeeringRequest, CreateServiceRequest, PeeringConnection, Privatelink, Service, StaticIp, UpdateServiceRequest,
    Vpc,
};
use provix_services::{
    ApiResult, PeeringApi, PeeringKey, PermissionApi, PermissionGrant, PrivatelinkApi, Provider, ServiceApi, VpcApi,
};
use serde_json::json;

/// VPCs turn `ACTIVE` on the first poll after creation and vanish on
/// delete. Only VPCs and permissions are backed by state.
#[derive(Default)]
struct InMemoryApi {
    vpcs: Mutex<HashMap<String, Vpc>>,
    grants: Mutex<HashMap<String, Vec<PermissionGrant>>>,
    next_id: Mutex<u32>,
}

fn unsupported<T>() -> ApiResult<T> {
    Err(ApiError::new(501, "not supported by the in-memory API"))
}

#[async_trait]
impl VpcApi for InMemoryApi {
    async fn create_vpc(&self, _project: &str, cloud_name: &str, network_cidr: &str) -> ApiResult<Vpc> {
        let mut next = self.next_id.lock();
        *next += 1;
        let vpc = Vpc {
            project_vpc_id: format!("vpc-{}", *next),
            cloud_name: cloud_name.to_string(),
            network_cidr: network_cidr.to_string(),
            state: "APPROVED".to_string(),
        };
        self.vpcs.lock().insert(vpc.project_vpc_id.clone(), vpc.clone());
        Ok(vpc)
    }

    async fn get_vpc(&self, _project: &str, vpc_id: &str) -> ApiResult<Vpc> {
        let mut vpcs = self.vpcs.lock();
        let vpc = vpcs
            .get_mut(vpc_id)
            .ok_or_else(|| ApiError::not_found(format!("VPC {vpc_id} not found")))?;
        vpc.state = "ACTIVE".to_string();
        Ok(vpc.clone())
    }

    async fn delete_vpc(&self, _project: &str, vpc_id: &str) -> ApiResult<()> {
        self.vpcs
            .lock()
            .remove(vpc_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("VPC {vpc_id} not found")))
    }
}

#[async_trait]
impl PeeringApi for InMemoryApi {
    async fn create_peering(&self, _: &str, _: &str, _: &CreatePeeringRequest) -> ApiResult<PeeringConnection> {
        unsupported()
    }

    async fn get_peering(&self, _: &PeeringKey) -> ApiResult<PeeringConnection> {
        unsupported()
    }

    async fn delete_peering(&self, _: &PeeringKey) -> ApiResult<()> {
        unsupported()
    }
}

#[async_trait]
impl ServiceApi for InMemoryApi {
    async fn create_service(&self, _: &str, _: &CreateServiceRequest) -> ApiResult<Service> {
        unsupported()
    }

    async fn get_service(&self, _: &str, _: &str) -> ApiResult<Service> {
        unsupported()
    }

    async fn update_service(&self, _: &str, _: &str, _: &UpdateServiceRequest) -> ApiResult<Service> {
        unsupported()
    }

    async fn delete_service(&self, _: &str, _: &str) -> ApiResult<()> {
        unsupported()
    }

    async fn list_static_ips(&self, _: &str) -> ApiResult<Vec<StaticIp>> {
        unsupported()
    }
}

#[async_trait]
impl PrivatelinkApi for InMemoryApi {
    async fn create_privatelink(&self, _: &str, _: &str, _: &[String]) -> ApiResult<Privatelink> {
        unsupported()
    }

    async fn get_privatelink(&self, _: &str, _: &str) -> ApiResult<Privatelink> {
        unsupported()
    }

    async fn update_privatelink(&self, _: &str, _: &str, _: &[String]) -> ApiResult<Privatelink> {
        unsupported()
    }

    async fn delete_privatelink(&self, _: &str, _: &str) -> ApiResult<()> {
        unsupported()
    }
}

#[async_trait]
impl PermissionApi for InMemoryApi {
    async fn get_permissions(&self, org: &str, kind: &str, id: &str) -> ApiResult<Vec<PermissionGrant>> {
        Ok(self.grants.lock().get(&format!("{org}/{kind}/{id}")).cloned().unwrap_or_default())
    }

    async fn set_permissions(&self, org: &str, kind: &str, id: &str, grants: &[PermissionGrant]) -> ApiResult<()> {
        self.grants.lock().insert(format!("{org}/{kind}/{id}"), grants.to_vec());
        Ok(())
    }
}

fn provider(config: ProviderConfig) -> (Provider<InMemoryApi>, Arc<InMemoryApi>) {
    let api = Arc::new(InMemoryApi::default());
    let provider = Provider::new(config);
    provider.configure(api.clone());
    (provider, api)
}

fn permission_plan() -> serde_json::Value {
    json!({
        "organization_id": "org1",
        "resource_type": "project",
        "resource_id": "p",
        "permissions": [{
            "principal_type": "user",
            "principal_id": "u1",
            "permissions": ["admin"],
        }],
    })
}

#[test]
fn test_registries_list_every_type() {
    let provider = Provider::<InMemoryApi>::new(ProviderConfig::default());

    let mut names = provider.resources.names();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "provix_aws_privatelink",
            "provix_organization_permission",
            "provix_project_vpc",
            "provix_service",
            "provix_vpc_peering_connection",
        ]
    );
    assert_eq!(provider.data_sources.names(), vec!["provix_project_vpc"]);
    assert!(provider.resources.get_required("provix_kafka_topic").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_vpc_lifecycle_through_registry() {
    let (provider, api) = provider(ProviderConfig::default());
    let ctx = OperationContext::background();
    let vpcs = provider.resources.get_required("provix_project_vpc").unwrap();

    let created = vpcs
        .create(
            &ctx,
            CreateRequest {
                plan: json!({"project": "p", "cloud_name": "aws-eu-west-1", "network_cidr": "10.0.0.0/24"}),
            },
        )
        .await;
    assert!(created.diagnostics.is_empty(), "{}", created.diagnostics);
    let state = created.state.unwrap();
    assert_eq!(state["id"], "p/vpc-1");
    assert_eq!(state["state"], "ACTIVE");

    let read = vpcs.read(&ctx, ReadRequest { state: state.clone() }).await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(read.state.unwrap()["network_cidr"], "10.0.0.0/24");

    let lookup = provider.data_sources.get_required("provix_project_vpc").unwrap();
    let found = lookup
        .read(&ctx, DataSourceReadRequest { config: json!({"project": "p", "vpc_id": "vpc-1"}) })
        .await;
    assert!(found.diagnostics.is_empty(), "{}", found.diagnostics);

    let deleted = vpcs.delete(&ctx, DeleteRequest { state: state.clone() }).await;
    assert!(deleted.diagnostics.is_empty(), "{}", deleted.diagnostics);
    assert!(api.vpcs.lock().is_empty());

    let gone = vpcs.read(&ctx, ReadRequest { state }).await;
    assert!(gone.state.is_none());
}

#[tokio::test]
async fn test_permission_conflict_follows_config() {
    let (strict, _) = provider(ProviderConfig::default());
    let ctx = OperationContext::background();
    let permissions = strict.resources.get_required("provix_organization_permission").unwrap();

    let first = permissions.create(&ctx, CreateRequest { plan: permission_plan() }).await;
    assert!(first.diagnostics.is_empty(), "{}", first.diagnostics);
    let second = permissions.create(&ctx, CreateRequest { plan: permission_plan() }).await;
    assert_eq!(
        second.diagnostics.first_error().unwrap().summary,
        errmsg::SUMMARY_ERROR_CREATING_RESOURCE
    );

    let (lenient, api) = provider(ProviderConfig::default().with_permission_validate_conflict(false));
    api.grants.lock().insert(
        "org1/project/p".to_string(),
        vec![PermissionGrant {
            principal_type: "user".to_string(),
            principal_id: "someone-else".to_string(),
            permissions: vec!["read_only".to_string()],
        }],
    );
    let permissions = lenient.resources.get_required("provix_organization_permission").unwrap();
    let overwritten = permissions.create(&ctx, CreateRequest { plan: permission_plan() }).await;
    assert!(!overwritten.diagnostics.has_error(), "{}", overwritten.diagnostics);
    assert_eq!(api.grants.lock()["org1/project/p"][0].principal_id, "u1");
}
