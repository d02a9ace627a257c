//! The lifecycle adapter.
//!
//! A [`ResourceAdapter`] binds one [`ResourceOptions`] definition and its
//! [`ResourceHooks`] to the protocol the host runtime speaks: create, read,
//! update, delete, import, plan modification and config validation. Every
//! operation runs its phases in order (decode, resolve timeout, hook,
//! optional refresh, persist) and stops at the first fatal diagnostic
//! without persisting anything.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use provix_core::config::ENV_ENABLE_BETA;
use provix_core::{
    errmsg, identifier, resolve_timeout, retry_if_status, ApiError, ContextError, Diagnostic, Diagnostics,
    OperationContext, ProviderConfig, Retry, RetryOptions, TimeoutKey, Timeouts,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::hooks::{ConfigValidator, ResourceHooks};
use crate::model::{bool_attribute, decode_into, encode_into, Model};
use crate::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ImportStateRequest, ImportStateResponse,
    ModifyPlanRequest, ModifyPlanResponse, ProviderData, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
    ValidateConfigRequest, ValidateConfigResponse,
};

/// Attribute checked on destroy plans when termination protection is on.
pub const TERMINATION_PROTECTION_ATTRIBUTE: &str = "termination_protection";

/// Statuses retried by the post-write refresh: the API may briefly answer
/// 404 after a create and 403 while permissions propagate.
const REFRESH_RETRY_STATUSES: &[u16] = &[404, 403];

fn empty_schema() -> Value {
    Value::Object(Map::new())
}

/// Static definition of a resource type.
#[derive(Debug, Clone)]
pub struct ResourceOptions {
    /// e.g. `provix_vpc_peering_connection`
    pub type_name: String,
    /// Ordered fields of the composite identifier.
    pub id_fields: Vec<String>,
    pub schema: fn() -> Value,
    /// Requires `enable_beta` in the provider config.
    pub beta: bool,
    /// Read after Create and Update, retrying transient 404/403.
    pub refresh_state: bool,
    /// Drop the object from state when Read reports it missing.
    pub remove_missing: bool,
    /// Refuse destroy plans while `termination_protection` is true.
    pub termination_protection: bool,
}

impl ResourceOptions {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id_fields: Vec::new(),
            schema: empty_schema,
            beta: false,
            refresh_state: false,
            remove_missing: false,
            termination_protection: false,
        }
    }

    pub fn id_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn schema(mut self, schema: fn() -> Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn beta(mut self) -> Self {
        self.beta = true;
        self
    }

    pub fn refresh_state(mut self) -> Self {
        self.refresh_state = true;
        self
    }

    pub fn remove_missing(mut self) -> Self {
        self.remove_missing = true;
        self
    }

    pub fn termination_protection(mut self) -> Self {
        self.termination_protection = true;
        self
    }

    /// The `a/b/c` import template.
    pub fn id_template(&self) -> String {
        identifier::template(&self.id_fields)
    }
}

/// Resolve the timeout for `key` and derive the phase context, or record
/// why that is impossible.
pub(crate) fn phase_context(
    parent: &OperationContext,
    timeouts: Option<&Timeouts>,
    key: TimeoutKey,
    config: &ProviderConfig,
    diags: &mut Diagnostics,
) -> Option<OperationContext> {
    let (timeout, d) = resolve_timeout(timeouts, key, config.default_timeout);
    let failed = d.has_error();
    diags.append(d);
    if failed {
        return None;
    }
    Some(parent.with_timeout(timeout))
}

/// Identifier of `record` for error details: its `id` attribute when set,
/// otherwise the identifier fields joined.
pub(crate) fn identity<M: Serialize>(record: &M, id_fields: &[String]) -> String {
    let Ok(Value::Object(record)) = serde_json::to_value(record) else {
        return String::new();
    };
    if let Some(Value::String(id)) = record.get("id") {
        if !id.is_empty() {
            return id.clone();
        }
    }
    if id_fields.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = id_fields
        .iter()
        .map(|f| match record.get(f) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(v)) => v.clone(),
            Some(other) => other.to_string(),
        })
        .collect();
    identifier::build(&parts)
}

/// Prefix hook errors with what was being done to which object. Details that
/// already name the type are left alone.
pub(crate) fn describe_errors(diags: Diagnostics, key: TimeoutKey, type_name: &str, id: &str) -> Diagnostics {
    diags.map_error_details(|d| {
        if d.detail.contains(type_name) {
            return d.detail.clone();
        }
        match key {
            TimeoutKey::Create => errmsg::detail_error_creating(type_name, id, &d.detail),
            TimeoutKey::Update => errmsg::detail_error_updating(type_name, id, &d.detail),
            TimeoutKey::Delete => errmsg::detail_error_deleting(type_name, id, &d.detail),
            TimeoutKey::Read | TimeoutKey::Default => errmsg::detail_error_reading(type_name, id, &d.detail),
        }
    })
}

/// The fatal diagnostic for a hook cut off by its context.
pub(crate) fn interrupted(key: TimeoutKey, type_name: &str, id: &str, err: ContextError) -> Diagnostics {
    warn!("{} of {} {:?} interrupted: {}", key.as_str(), type_name, id, err);
    Diagnostic::error(
        errmsg::SUMMARY_CONTEXT_DONE,
        errmsg::detail_context_done(key.as_str(), type_name, id, err),
    )
    .into()
}

/// Binds one resource definition to its hooks.
pub struct ResourceAdapter<M, H>
where
    M: Model,
    H: ResourceHooks<M::Shared>,
{
    options: ResourceOptions,
    hooks: H,
    client: RwLock<Option<Arc<H::Client>>>,
    config: RwLock<ProviderConfig>,
    _model: PhantomData<fn() -> M>,
}

impl<M, H> ResourceAdapter<M, H>
where
    M: Model,
    H: ResourceHooks<M::Shared>,
{
    pub fn new(options: ResourceOptions, hooks: H) -> Self {
        Self {
            options,
            hooks,
            client: RwLock::new(None),
            config: RwLock::new(ProviderConfig::default()),
            _model: PhantomData,
        }
    }

    /// Seed the provider configuration before `configure` runs, so gates
    /// evaluated during early validation see it.
    pub fn with_config(self, config: ProviderConfig) -> Self {
        *self.config.write() = config;
        self
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The host may call this several times, before provider data exists.
    pub fn configure(&self, data: Option<ProviderData<H::Client>>) {
        let Some(data) = data else {
            return;
        };
        debug!("Configuring resource {}", self.options.type_name);
        *self.client.write() = Some(data.client);
        *self.config.write() = data.config;
    }

    pub fn type_name(&self) -> &str {
        &self.options.type_name
    }

    pub fn schema(&self) -> Value {
        (self.options.schema)()
    }

    fn current_client(&self) -> Option<Arc<H::Client>> {
        self.client.read().clone()
    }

    fn current_config(&self) -> ProviderConfig {
        self.config.read().clone()
    }

    fn identity(&self, model: &M) -> String {
        identity(model, &self.options.id_fields)
    }

    /// Outcome of a hook run under `op_ctx`, with its errors described.
    fn outcome(&self, ran: Result<Diagnostics, ContextError>, key: TimeoutKey, model: &M) -> Diagnostics {
        let id = self.identity(model);
        match ran {
            Ok(diags) => describe_errors(diags, key, &self.options.type_name, &id),
            Err(e) => interrupted(key, &self.options.type_name, &id, e),
        }
    }

    fn configured(&self, diags: &mut Diagnostics) -> Option<(Arc<H::Client>, ProviderConfig)> {
        match self.current_client() {
            Some(client) => Some((client, self.current_config())),
            None => {
                diags.add_error(
                    errmsg::SUMMARY_UNCONFIGURED_CLIENT,
                    errmsg::detail_unconfigured_client(&self.options.type_name),
                );
                None
            }
        }
    }

    pub async fn create(&self, ctx: &OperationContext, req: CreateRequest) -> CreateResponse {
        let mut rsp = CreateResponse::default();
        let diags = &mut rsp.diagnostics;

        let Some((client, config)) = self.configured(diags) else {
            return rsp;
        };
        let Some(mut plan) = decode_into::<M>(&req.plan, "plan", diags) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, plan.timeouts(), TimeoutKey::Create, &config, diags) else {
            return rsp;
        };

        info!("Creating {}", self.options.type_name);
        let ran = op_ctx.bound(self.hooks.create(&op_ctx, &client, plan.shared())).await;
        let created = self.outcome(ran, TimeoutKey::Create, &plan);
        let failed = created.has_error();
        let terminal = created.has_error_summary(errmsg::SUMMARY_TERMINAL_STATE);
        diags.append(created);

        if failed {
            if terminal {
                diags.append(self.rollback(ctx, &client, &config, &mut plan).await);
            }
            warn!("Creating {} failed", self.options.type_name);
            return rsp;
        }

        if self.options.refresh_state {
            let refreshed = self.refresh_state(&op_ctx, &client, &mut plan).await;
            diags.append(describe_errors(
                refreshed,
                TimeoutKey::Create,
                &self.options.type_name,
                &self.identity(&plan),
            ));
            if diags.has_error() {
                return rsp;
            }
        }

        rsp.state = encode_into(&plan, "state", diags);
        rsp
    }

    /// Delete an object that reached a terminal state during create. The
    /// original error stays first; a failed rollback is reported after it.
    async fn rollback(
        &self,
        ctx: &OperationContext,
        client: &H::Client,
        config: &ProviderConfig,
        plan: &mut M,
    ) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(op_ctx) = phase_context(ctx, plan.timeouts(), TimeoutKey::Delete, config, &mut diags) else {
            return diags;
        };

        warn!("Rolling back {} after a terminal create state", self.options.type_name);
        let ran = op_ctx.bound(self.hooks.delete(&op_ctx, client, plan.shared())).await;
        let deleted = self
            .outcome(ran, TimeoutKey::Delete, plan)
            .drop_api_error(ApiError::is_not_found);

        if deleted.has_error() {
            diags.add_error(
                errmsg::SUMMARY_ROLLBACK_FAILED,
                format!(
                    "The `{}` resource reached a terminal state and could not be deleted. \
                     It may have to be removed manually.",
                    self.options.type_name
                ),
            );
        }
        diags.append(deleted);
        diags
    }

    /// Read after a write, retrying while the API is still catching up.
    async fn refresh_state(&self, ctx: &OperationContext, client: &H::Client, model: &mut M) -> Diagnostics {
        let mut retry = Retry::new(ctx, RetryOptions::default(), retry_if_status(REFRESH_RETRY_STATUSES));
        loop {
            let ran = ctx.bound(self.hooks.read(ctx, client, model.shared())).await;
            let diags = match ran {
                Ok(diags) => diags,
                Err(e) => return interrupted(TimeoutKey::Read, &self.options.type_name, &self.identity(model), e),
            };
            if !retry.again(&diags).await {
                if retry.attempts() > 1 {
                    debug!("Refreshed {} after {} attempts", self.options.type_name, retry.attempts());
                }
                return retry.finish(diags);
            }
        }
    }

    pub async fn read(&self, ctx: &OperationContext, req: ReadRequest) -> ReadResponse {
        let mut rsp = ReadResponse {
            state: Some(req.state.clone()),
            diagnostics: Diagnostics::new(),
        };
        let diags = &mut rsp.diagnostics;

        let Some((client, config)) = self.configured(diags) else {
            return rsp;
        };
        let Some(mut state) = decode_into::<M>(&req.state, "state", diags) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, state.timeouts(), TimeoutKey::Read, &config, diags) else {
            return rsp;
        };

        let ran = op_ctx.bound(self.hooks.read(&op_ctx, &client, state.shared())).await;
        let read = self.outcome(ran, TimeoutKey::Read, &state);
        if self.options.remove_missing && read.has_api_error(ApiError::is_not_found) {
            // Everything else the hook said is moot once the object is gone.
            info!("{} no longer exists, removing it from state", self.options.type_name);
            rsp.state = None;
            return rsp;
        }

        diags.append(read);
        if diags.has_error() {
            return rsp;
        }

        if let Some(value) = encode_into(&state, "state", diags) {
            rsp.state = Some(value);
        }
        rsp
    }

    pub async fn update(&self, ctx: &OperationContext, req: UpdateRequest) -> UpdateResponse {
        let mut rsp = UpdateResponse {
            state: Some(req.state.clone()),
            diagnostics: Diagnostics::new(),
        };
        let diags = &mut rsp.diagnostics;

        let Some((client, config)) = self.configured(diags) else {
            return rsp;
        };
        let plan = decode_into::<M>(&req.plan, "plan", diags);
        let state = decode_into::<M>(&req.state, "state", diags);
        let cfg = decode_into::<M>(&req.config, "config", diags);
        let (Some(mut plan), Some(mut state), Some(mut cfg)) = (plan, state, cfg) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, plan.timeouts(), TimeoutKey::Update, &config, diags) else {
            return rsp;
        };

        info!("Updating {}", self.options.type_name);
        let ran = op_ctx
            .bound(self.hooks.update(&op_ctx, &client, plan.shared(), state.shared(), cfg.shared()))
            .await;
        match ran.transpose() {
            Some(ran) => {
                diags.append(self.outcome(ran, TimeoutKey::Update, &plan));
                if diags.has_error() {
                    return rsp;
                }
            }
            None => debug!("{} has no remote update, persisting the plan", self.options.type_name),
        }

        if self.options.refresh_state {
            let refreshed = self.refresh_state(&op_ctx, &client, &mut plan).await;
            diags.append(describe_errors(
                refreshed,
                TimeoutKey::Update,
                &self.options.type_name,
                &self.identity(&plan),
            ));
            if diags.has_error() {
                return rsp;
            }
        }

        if let Some(value) = encode_into(&plan, "state", diags) {
            rsp.state = Some(value);
        }
        rsp
    }

    pub async fn delete(&self, ctx: &OperationContext, req: DeleteRequest) -> DeleteResponse {
        let mut rsp = DeleteResponse::default();
        let diags = &mut rsp.diagnostics;

        let Some((client, config)) = self.configured(diags) else {
            return rsp;
        };
        let Some(mut state) = decode_into::<M>(&req.state, "state", diags) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, state.timeouts(), TimeoutKey::Delete, &config, diags) else {
            return rsp;
        };

        info!("Deleting {}", self.options.type_name);
        // A retried delete may find the object already gone.
        let ran = op_ctx.bound(self.hooks.delete(&op_ctx, &client, state.shared())).await;
        let deleted = self.outcome(ran, TimeoutKey::Delete, &state);
        diags.append(deleted.drop_api_error(ApiError::is_not_found));
        rsp
    }

    pub async fn modify_plan(&self, ctx: &OperationContext, req: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut rsp = ModifyPlanResponse {
            plan: req.plan.clone(),
            diagnostics: Diagnostics::new(),
        };
        let diags = &mut rsp.diagnostics;

        if req.is_destroy() {
            if self.options.termination_protection {
                match bool_attribute(&req.state, TERMINATION_PROTECTION_ATTRIBUTE) {
                    Ok(false) => {}
                    Ok(true) => diags.add_error(
                        errmsg::SUMMARY_ERROR_DELETING_RESOURCE,
                        errmsg::detail_termination_protected(&self.options.type_name),
                    ),
                    Err(e) => diags.add_error(errmsg::SUMMARY_VALUE_CONVERSION, e.to_string()),
                }
            }
            // Nothing to modify in a destroy plan.
            return rsp;
        }

        let Some((client, config)) = self.configured(diags) else {
            return rsp;
        };
        let plan = decode_into::<M>(&req.plan, "plan", diags);
        let cfg = decode_into::<M>(&req.config, "config", diags);
        let state = if req.is_create() {
            Some(None)
        } else {
            decode_into::<M>(&req.state, "state", diags).map(Some)
        };
        let (Some(mut plan), Some(mut state), Some(mut cfg)) = (plan, state, cfg) else {
            return rsp;
        };
        let Some(op_ctx) = phase_context(ctx, plan.timeouts(), TimeoutKey::Read, &config, diags) else {
            return rsp;
        };

        let shared_state = state.as_mut().map(|s| &*s.shared());
        let ran = op_ctx
            .bound(self.hooks.modify_plan(&op_ctx, &client, plan.shared(), shared_state, cfg.shared()))
            .await;
        match ran {
            Ok(d) => diags.append(d),
            Err(e) => diags.append(interrupted(TimeoutKey::Read, &self.options.type_name, &self.identity(&plan), e)),
        }
        if diags.has_error() {
            return rsp;
        }

        if let Some(value) = encode_into(&plan, "plan", diags) {
            rsp.plan = value;
        }
        rsp
    }

    pub async fn validate_config(&self, ctx: &OperationContext, req: ValidateConfigRequest) -> ValidateConfigResponse {
        let mut rsp = ValidateConfigResponse::default();
        let diags = &mut rsp.diagnostics;
        let config = self.current_config();

        if self.options.beta && !config.enable_beta {
            diags.add_error(
                errmsg::SUMMARY_BETA_RESOURCE,
                errmsg::detail_beta_resource(&self.options.type_name, ENV_ENABLE_BETA),
            );
            return rsp;
        }

        let Some(mut cfg) = decode_into::<M>(&req.config, "config", diags) else {
            return rsp;
        };
        // Some hooks call the API to validate.
        let Some(op_ctx) = phase_context(ctx, cfg.timeouts(), TimeoutKey::Read, &config, diags) else {
            return rsp;
        };

        let client = self.current_client();
        let ran = op_ctx
            .bound(self.hooks.validate_config(&op_ctx, client.as_deref(), cfg.shared()))
            .await;
        match ran {
            Ok(d) => diags.append(d),
            Err(e) => diags.append(interrupted(TimeoutKey::Read, &self.options.type_name, "", e)),
        }
        rsp
    }

    pub fn import_state(&self, req: ImportStateRequest) -> ImportStateResponse {
        let mut rsp = ImportStateResponse::default();

        let values = match identifier::split(&req.id, self.options.id_fields.len()) {
            Ok(values) => values,
            Err(e) => {
                debug!("Rejecting import id for {}: {}", self.options.type_name, e);
                rsp.diagnostics.add_error(
                    errmsg::SUMMARY_UNEXPECTED_IDENTIFIER,
                    errmsg::detail_unexpected_identifier(&self.options.id_template(), &req.id),
                );
                return rsp;
            }
        };

        let state: Map<String, Value> = self
            .options
            .id_fields
            .iter()
            .cloned()
            .zip(values.into_iter().map(Value::String))
            .collect();
        rsp.state = Some(Value::Object(state));
        rsp
    }

    pub fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>> {
        let client = self.current_client();
        self.hooks.config_validators(client.as_deref())
    }
}
