//! Wires every resource and data source of this crate into registries.

use std::sync::Arc;

use provix_adapter::{
    DataSourceAdapter, DataSourceHandler, DataSourceRegistry, ProviderData, ResourceAdapter, ResourceHandler,
    ResourceRegistry,
};
use provix_core::ProviderConfig;
use tracing::info;

use crate::client::ProvisioningApi;
use crate::peering::{self, PeeringHooks, PeeringModel};
use crate::permission::{self, OrganizationPermissionModel, PermissionHooks};
use crate::privatelink::{self, AwsPrivatelinkModel, PrivatelinkHooks};
use crate::service::{self, ManagedServiceModel, ServiceHooks};
use crate::vpc::{self, ProjectVpcHooks, ProjectVpcLookup, ProjectVpcModel};

/// All resources, built lazily on first lookup.
pub fn resources<C: ProvisioningApi>(config: &ProviderConfig) -> ResourceRegistry<C> {
    let mut registry = ResourceRegistry::new();

    registry.register_lazy(vpc::TYPE_NAME, || {
        Arc::new(ResourceAdapter::<ProjectVpcModel, _>::new(vpc::options(), ProjectVpcHooks::<C>::new()))
            as Arc<dyn ResourceHandler<C>>
    });
    registry.register_lazy(peering::TYPE_NAME, || {
        Arc::new(ResourceAdapter::<PeeringModel, _>::new(peering::options(), PeeringHooks::<C>::new()))
            as Arc<dyn ResourceHandler<C>>
    });
    registry.register_lazy(service::TYPE_NAME, || {
        Arc::new(ResourceAdapter::<ManagedServiceModel, _>::new(service::options(), ServiceHooks::<C>::new()))
            as Arc<dyn ResourceHandler<C>>
    });
    registry.register_lazy(privatelink::TYPE_NAME, || {
        Arc::new(ResourceAdapter::<AwsPrivatelinkModel, _>::new(
            privatelink::options(),
            PrivatelinkHooks::<C>::new(),
        )) as Arc<dyn ResourceHandler<C>>
    });

    let validate_conflict = config.permission_validate_conflict;
    registry.register_lazy(permission::TYPE_NAME, move || {
        Arc::new(ResourceAdapter::<OrganizationPermissionModel, _>::new(
            permission::options(),
            PermissionHooks::<C>::new(validate_conflict),
        )) as Arc<dyn ResourceHandler<C>>
    });

    registry
}

pub fn data_sources<C: ProvisioningApi>() -> DataSourceRegistry<C> {
    let mut registry = DataSourceRegistry::new();
    registry.register(Arc::new(DataSourceAdapter::<ProjectVpcModel, _>::new(
        vpc::data_source_options(),
        ProjectVpcLookup::<C>::new(),
    )) as Arc<dyn DataSourceHandler<C>>);
    registry
}

/// Registries plus the configuration they were built with.
pub struct Provider<C: ProvisioningApi> {
    config: ProviderConfig,
    pub resources: ResourceRegistry<C>,
    pub data_sources: DataSourceRegistry<C>,
}

impl<C: ProvisioningApi> Provider<C> {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            resources: resources(&config),
            data_sources: data_sources(),
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Hand the client to every registered handler.
    pub fn configure(&self, client: Arc<C>) {
        info!(
            "Configuring {} resources and {} data sources",
            self.resources.len(),
            self.data_sources.len()
        );
        let data = ProviderData::new(client, self.config.clone());
        self.resources.configure_all(&data);
        self.data_sources.configure_all(&data);
    }
}
