//! Read-only sibling of the lifecycle adapter.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use provix_core::config::ENV_ENABLE_BETA;
use provix_core::{errmsg, Diagnostics, OperationContext, ProviderConfig, TimeoutKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::hooks::{ConfigValidator, DataSourceHooks};
use crate::model::{decode_into, encode_into, Model};
use crate::request::{ProviderData, ValidateConfigRequest, ValidateConfigResponse};
use crate::resource::{describe_errors, identity, interrupted, phase_context};

#[derive(Debug, Clone)]
pub struct DataSourceOptions {
    pub type_name: String,
    pub schema: fn() -> Value,
    pub beta: bool,
}

fn empty_schema() -> Value {
    Value::Object(serde_json::Map::new())
}

impl DataSourceOptions {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            schema: empty_schema,
            beta: false,
        }
    }

    pub fn schema(mut self, schema: fn() -> Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn beta(mut self) -> Self {
        self.beta = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceReadRequest {
    pub config: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceReadResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

pub struct DataSourceAdapter<M, H>
where
    M: Model,
    H: DataSourceHooks<M::Shared>,
{
    options: DataSourceOptions,
    hooks: H,
    client: RwLock<Option<Arc<H::Client>>>,
    config: RwLock<ProviderConfig>,
    _model: PhantomData<fn() -> M>,
}

impl<M, H> DataSourceAdapter<M, H>
where
    M: Model,
    H: DataSourceHooks<M::Shared>,
{
    pub fn new(options: DataSourceOptions, hooks: H) -> Self {
        Self {
            options,
            hooks,
            client: RwLock::new(None),
            config: RwLock::new(ProviderConfig::default()),
            _model: PhantomData,
        }
    }

    pub fn with_config(self, config: ProviderConfig) -> Self {
        *self.config.write() = config;
        self
    }

    pub fn configure(&self, data: Option<ProviderData<H::Client>>) {
        let Some(data) = data else {
            return;
        };
        debug!("Configuring data source {}", self.options.type_name);
        *self.client.write() = Some(data.client);
        *self.config.write() = data.config;
    }

    pub fn type_name(&self) -> &str {
        &self.options.type_name
    }

    pub fn schema(&self) -> Value {
        (self.options.schema)()
    }

    pub async fn read(&self, ctx: &OperationContext, req: DataSourceReadRequest) -> DataSourceReadResponse {
        let mut rsp = DataSourceReadResponse::default();
        let diags = &mut rsp.diagnostics;

        let client = self.client.read().clone();
        let Some(client) = client else {
            diags.add_error(
                errmsg::SUMMARY_UNCONFIGURED_CLIENT,
                errmsg::detail_unconfigured_client(&self.options.type_name),
            );
            return rsp;
        };
        let config = self.config.read().clone();

        let Some(mut model) = decode_into::<M>(&req.config, "config", diags) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, model.timeouts(), TimeoutKey::Read, &config, diags) else {
            return rsp;
        };

        info!("Reading data source {}", self.options.type_name);
        let ran = op_ctx.bound(self.hooks.read(&op_ctx, &client, model.shared())).await;
        let id = identity(&model, &[]);
        diags.append(match ran {
            Ok(read) => describe_errors(read, TimeoutKey::Read, &self.options.type_name, &id),
            Err(e) => interrupted(TimeoutKey::Read, &self.options.type_name, &id, e),
        });
        if diags.has_error() {
            return rsp;
        }

        rsp.state = encode_into(&model, "state", diags);
        rsp
    }

    pub async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse {
        let mut rsp = ValidateConfigResponse::default();
        let diags = &mut rsp.diagnostics;
        let config = self.config.read().clone();

        if self.options.beta && !config.enable_beta {
            diags.add_error(
                errmsg::SUMMARY_BETA_DATA_SOURCE,
                errmsg::detail_beta_data_source(&self.options.type_name, ENV_ENABLE_BETA),
            );
            return rsp;
        }

        let Some(mut model) = decode_into::<M>(&req.config, "config", diags) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, model.timeouts(), TimeoutKey::Read, &config, diags) else {
            return rsp;
        };

        let client = self.client.read().clone();
        let ran = op_ctx
            .bound(self.hooks.validate_config(&op_ctx, client.as_deref(), model.shared()))
            .await;
        match ran {
            Ok(d) => diags.append(d),
            Err(e) => diags.append(interrupted(TimeoutKey::Read, &self.options.type_name, "", e)),
        }
        rsp
    }

    pub fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>> {
        let client = self.client.read().clone();
        self.hooks.config_validators(client.as_deref())
    }
}
