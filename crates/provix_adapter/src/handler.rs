//! Type-erased handlers the host runtime dispatches to by type name.
//!
//! Adapters are generic over their record and hook types. The handler traits
//! hide those behind raw JSON records so a provider can keep every resource
//! of a given client type in one registry.

use std::sync::Arc;

use async_trait::async_trait;
use provix_core::OperationContext;
use serde_json::Value;

use crate::datasource::{DataSourceAdapter, DataSourceReadRequest, DataSourceReadResponse};
use crate::hooks::{ConfigValidator, DataSourceHooks, ResourceHooks};
use crate::model::Model;
use crate::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ImportStateRequest, ImportStateResponse,
    ModifyPlanRequest, ModifyPlanResponse, ProviderData, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
    ValidateConfigRequest, ValidateConfigResponse,
};
use crate::resource::ResourceAdapter;

/// Anything registered under a type name.
pub trait Named: Send + Sync {
    fn type_name(&self) -> &str;
}

/// The resource protocol over raw records.
#[async_trait]
pub trait ResourceHandler<C>: Named {
    fn configure(&self, data: Option<ProviderData<C>>);

    fn schema(&self) -> Value;

    async fn create(&self, ctx: &OperationContext, req: CreateRequest) -> CreateResponse;

    async fn read(&self, ctx: &OperationContext, req: ReadRequest) -> ReadResponse;

    async fn update(&self, ctx: &OperationContext, req: UpdateRequest) -> UpdateResponse;

    async fn delete(&self, ctx: &OperationContext, req: DeleteRequest) -> DeleteResponse;

    async fn modify_plan(&self, ctx: &OperationContext, req: ModifyPlanRequest) -> ModifyPlanResponse;

    async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse;

    fn import_state(&self, req: ImportStateRequest) -> ImportStateResponse;

    fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>>;
}

/// The data-source protocol over raw records.
#[async_trait]
pub trait DataSourceHandler<C>: Named {
    fn configure(&self, data: Option<ProviderData<C>>);

    fn schema(&self) -> Value;

    async fn read(&self, ctx: &OperationContext, req: DataSourceReadRequest) -> DataSourceReadResponse;

    async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse;

    fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>>;
}

impl<M, H> Named for ResourceAdapter<M, H>
where
    M: Model,
    H: ResourceHooks<M::Shared>,
{
    fn type_name(&self) -> &str {
        ResourceAdapter::type_name(self)
    }
}

#[async_trait]
impl<M, H> ResourceHandler<H::Client> for ResourceAdapter<M, H>
where
    M: Model,
    H: ResourceHooks<M::Shared>,
{
    fn configure(&self, data: Option<ProviderData<H::Client>>) {
        ResourceAdapter::configure(self, data)
    }

    fn schema(&self) -> Value {
        ResourceAdapter::schema(self)
    }

    async fn create(&self, ctx: &OperationContext, req: CreateRequest) -> CreateResponse {
        ResourceAdapter::create(self, ctx, req).await
    }

    async fn read(&self, ctx: &OperationContext, req: ReadRequest) -> ReadResponse {
        ResourceAdapter::read(self, ctx, req).await
    }

    async fn update(&self, ctx: &OperationContext, req: UpdateRequest) -> UpdateResponse {
        ResourceAdapter::update(self, ctx, req).await
    }

    async fn delete(&self, ctx: &OperationContext, req: DeleteRequest) -> DeleteResponse {
        ResourceAdapter::delete(self, ctx, req).await
    }

    async fn modify_plan(&self, ctx: &OperationContext, req: ModifyPlanRequest) -> ModifyPlanResponse {
        ResourceAdapter::modify_plan(self, ctx, req).await
    }

    async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse {
        ResourceAdapter::validate_config(self, ctx, req).await
    }

    fn import_state(&self, req: ImportStateRequest) -> ImportStateResponse {
        ResourceAdapter::import_state(self, req)
    }

    fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>> {
        ResourceAdapter::config_validators(self)
    }
}

impl<M, H> Named for DataSourceAdapter<M, H>
where
    M: Model,
    H: DataSourceHooks<M::Shared>,
{
    fn type_name(&self) -> &str {
        DataSourceAdapter::type_name(self)
    }
}

#[async_trait]
impl<M, H> DataSourceHandler<H::Client> for DataSourceAdapter<M, H>
where
    M: Model,
    H: DataSourceHooks<M::Shared>,
{
    fn configure(&self, data: Option<ProviderData<H::Client>>) {
        DataSourceAdapter::configure(self, data)
    }

    fn schema(&self) -> Value {
        DataSourceAdapter::schema(self)
    }

    async fn read(&self, ctx: &OperationContext, req: DataSourceReadRequest) -> DataSourceReadResponse {
        DataSourceAdapter::read(self, ctx, req).await
    }

    async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse {
        DataSourceAdapter::validate_config(self, ctx, req).await
    }

    fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>> {
        DataSourceAdapter::config_validators(self)
    }
}
