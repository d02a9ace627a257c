//! Request and response records of the host runtime protocol.
//!
//! Records travel as raw JSON. A `null` plan stands for "destroy" and a
//! `null` prior state for "nothing exists yet".

use provix_core::{Diagnostics, ProviderConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What the provider hands every adapter at configure time.
#[derive(Debug)]
pub struct ProviderData<C> {
    pub client: Arc<C>,
    pub config: ProviderConfig,
}

impl<C> ProviderData<C> {
    pub fn new(client: Arc<C>, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

impl<C> Clone for ProviderData<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub plan: Value,
}

/// `state` stays unset unless every phase succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub state: Value,
}

/// `state` starts as the prior state. `None` means the object is gone and
/// should be dropped from persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl ReadResponse {
    pub fn is_removed(&self) -> bool {
        self.state.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub plan: Value,
    pub state: Value,
    pub config: Value,
}

/// `state` starts as the prior state and is replaced by the plan on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub state: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyPlanRequest {
    pub plan: Value,
    pub state: Value,
    pub config: Value,
}

impl ModifyPlanRequest {
    /// A null or empty plan destroys the object.
    pub fn is_destroy(&self) -> bool {
        self.plan.is_null() || self.plan.as_object().is_some_and(|m| m.is_empty())
    }

    pub fn is_create(&self) -> bool {
        self.state.is_null()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyPlanResponse {
    pub plan: Value,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateConfigRequest {
    pub config: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateConfigResponse {
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStateRequest {
    pub id: String,
}

/// `state` holds the identifier fields only; the host runtime follows up
/// with a Read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStateResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}
