//! Operation hooks supplied per resource type.
//!
//! Hooks talk to the remote API and report through [`Diagnostics`]. They
//! never persist anything themselves: the adapter decides what becomes
//! state. Create and Update must not call Read on their own; set
//! `refresh_state` on the resource options instead.

use std::sync::Arc;

use async_trait::async_trait;
use provix_core::{Diagnostics, OperationContext};
use serde_json::Value;

/// Cross-attribute check run by the host runtime against raw config.
pub trait ConfigValidator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, config: &Value) -> Diagnostics;
}

/// Lifecycle hooks of one resource type over its shared view `T`.
#[async_trait]
pub trait ResourceHooks<T: Send + Sync>: Send + Sync + 'static {
    /// Remote API client handed to every hook.
    type Client: Send + Sync + 'static;

    /// Create the remote object and fill in the identity fields of `plan`.
    async fn create(&self, ctx: &OperationContext, client: &Self::Client, plan: &mut T) -> Diagnostics;

    /// Refresh `state` from the remote object.
    async fn read(&self, ctx: &OperationContext, client: &Self::Client, state: &mut T) -> Diagnostics;

    /// Apply `plan` to the remote object. `None` means the resource has
    /// nothing to update remotely and the call is skipped.
    async fn update(
        &self,
        _ctx: &OperationContext,
        _client: &Self::Client,
        _plan: &mut T,
        _state: &T,
        _config: &T,
    ) -> Option<Diagnostics> {
        None
    }

    /// Delete the remote object. A not-found error is fine.
    async fn delete(&self, ctx: &OperationContext, client: &Self::Client, state: &mut T) -> Diagnostics;

    /// Adjust a non-destroy plan. `state` is `None` while planning a create.
    async fn modify_plan(
        &self,
        _ctx: &OperationContext,
        _client: &Self::Client,
        _plan: &mut T,
        _state: Option<&T>,
        _config: &T,
    ) -> Diagnostics {
        Diagnostics::new()
    }

    /// Validate user config. The client is `None` until the provider is
    /// configured.
    async fn validate_config(
        &self,
        _ctx: &OperationContext,
        _client: Option<&Self::Client>,
        _config: &T,
    ) -> Diagnostics {
        Diagnostics::new()
    }

    fn config_validators(&self, _client: Option<&Self::Client>) -> Vec<Arc<dyn ConfigValidator>> {
        Vec::new()
    }
}

/// Hooks of a read-only data source.
#[async_trait]
pub trait DataSourceHooks<T: Send + Sync>: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    async fn read(&self, ctx: &OperationContext, client: &Self::Client, config: &mut T) -> Diagnostics;

    async fn validate_config(
        &self,
        _ctx: &OperationContext,
        _client: Option<&Self::Client>,
        _config: &T,
    ) -> Diagnostics {
        Diagnostics::new()
    }

    fn config_validators(&self, _client: Option<&Self::Client>) -> Vec<Arc<dyn ConfigValidator>> {
        Vec::new()
    }
}

/// Rejects configs that set more than one of the given attributes.
#[derive(Debug, Clone)]
pub struct ConflictingAttributes {
    attributes: Vec<String>,
}

impl ConflictingAttributes {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl ConfigValidator for ConflictingAttributes {
    fn description(&self) -> String {
        format!("At most one of {:?} may be set", self.attributes)
    }

    fn validate(&self, config: &Value) -> Diagnostics {
        let set: Vec<&str> = self
            .attributes
            .iter()
            .filter(|a| config.get(a.as_str()).is_some_and(|v| !v.is_null()))
            .map(String::as_str)
            .collect();

        let mut diags = Diagnostics::new();
        if set.len() > 1 {
            diags.add_error(
                "Invalid Attribute Combination",
                format!("These attributes cannot be configured together: {set:?}"),
            );
        }
        diags
    }
}
