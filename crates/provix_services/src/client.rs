//! Remote provisioning API surface used by the resources in this crate.
//!
//! The HTTP client itself lives with the provider binary; resources only see
//! these traits. Every call fails with an [`ApiError`] carrying the HTTP
//! status.

use std::collections::BTreeMap;

use async_trait::async_trait;
use provix_core::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a remote call.
pub type ApiResult<T> = Result<T, ApiError>;

/// A project VPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub project_vpc_id: String,
    pub cloud_name: String,
    pub network_cidr: String,
    pub state: String,
}

/// Addresses one peering connection. `peer_region` is absent for clouds
/// without regional peering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeeringKey {
    pub project: String,
    pub vpc_id: String,
    pub peer_cloud_account: String,
    pub peer_vpc: String,
    pub peer_region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatePeeringRequest {
    pub peer_cloud_account: String,
    pub peer_vpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_peer_network_cidrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeeringConnection {
    pub peer_cloud_account: String,
    pub peer_vpc: String,
    pub peer_region: Option<String>,
    pub state: String,
    #[serde(default)]
    pub state_info: BTreeMap<String, String>,
    #[serde(default)]
    pub user_peer_network_cidrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub backup_name: String,
    pub data_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceIntegration {
    pub integration_type: String,
    pub source_service: String,
    pub destination_service: Option<String>,
}

/// One endpoint of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceComponent {
    pub component: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub usage: String,
}

/// A project static IP and the service it is associated with, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticIp {
    pub static_ip_address_id: String,
    #[serde(default)]
    pub service_name: String,
    pub state: String,
}

/// A managed service as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_name: String,
    pub service_type: String,
    pub plan: String,
    pub cloud_name: String,
    pub state: String,
    #[serde(default)]
    pub backups: Vec<Backup>,
    #[serde(default)]
    pub integrations: Vec<ServiceIntegration>,
    #[serde(default)]
    pub user_config: BTreeMap<String, Value>,
    #[serde(default)]
    pub components: Vec<ServiceComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
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
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub plan: String,
    pub cloud_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_config: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Privatelink {
    pub principals: Vec<String>,
    pub aws_service_id: Option<String>,
    pub aws_service_name: Option<String>,
    pub state: String,
}

/// One principal's grant on an organization resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub principal_type: String,
    pub principal_id: String,
    pub permissions: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VpcApi: Send + Sync {
    async fn create_vpc(&self, project: &str, cloud_name: &str, network_cidr: &str) -> ApiResult<Vpc>;

    async fn get_vpc(&self, project: &str, vpc_id: &str) -> ApiResult<Vpc>;

    async fn delete_vpc(&self, project: &str, vpc_id: &str) -> ApiResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeeringApi: Send + Sync {
    async fn create_peering(
        &self,
        project: &str,
        vpc_id: &str,
        req: &CreatePeeringRequest,
    ) -> ApiResult<PeeringConnection>;

    async fn get_peering(&self, key: &PeeringKey) -> ApiResult<PeeringConnection>;

    async fn delete_peering(&self, key: &PeeringKey) -> ApiResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceApi: Send + Sync {
    async fn create_service(&self, project: &str, req: &CreateServiceRequest) -> ApiResult<Service>;

    async fn get_service(&self, project: &str, service_name: &str) -> ApiResult<Service>;

    async fn update_service(&self, project: &str, service_name: &str, req: &UpdateServiceRequest)
        -> ApiResult<Service>;

    async fn delete_service(&self, project: &str, service_name: &str) -> ApiResult<()>;

    async fn list_static_ips(&self, project: &str) -> ApiResult<Vec<StaticIp>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrivatelinkApi: Send + Sync {
    async fn create_privatelink(&self, project: &str, service_name: &str, principals: &[String])
        -> ApiResult<Privatelink>;

    async fn get_privatelink(&self, project: &str, service_name: &str) -> ApiResult<Privatelink>;

    async fn update_privatelink(&self, project: &str, service_name: &str, principals: &[String])
        -> ApiResult<Privatelink>;

    async fn delete_privatelink(&self, project: &str, service_name: &str) -> ApiResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionApi: Send + Sync {
    async fn get_permissions(
        &self,
        organization_id: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> ApiResult<Vec<PermissionGrant>>;

    /// Replace the full grant set of a resource. An empty set clears it.
    async fn set_permissions(
        &self,
        organization_id: &str,
        resource_type: &str,
        resource_id: &str,
        grants: &[PermissionGrant],
    ) -> ApiResult<()>;
}

/// Everything the provider's client offers.
pub trait ProvisioningApi: VpcApi + PeeringApi + ServiceApi + PrivatelinkApi + PermissionApi + 'static {}

impl<T> ProvisioningApi for T where T: VpcApi + PeeringApi + ServiceApi + PrivatelinkApi + PermissionApi + 'static {}
