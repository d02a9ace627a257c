//! # provix_adapter
//!
//! Generic resource lifecycle adapter for provix.
//!
//! A resource type supplies a record type implementing [`Model`] and a set
//! of [`ResourceHooks`]. The adapter turns them into the full protocol the
//! host runtime expects.
//!
//! # Architecture
//!
//! - **Resource adapter**: create, read, update, delete, import, plan
//!   modification and config validation with timeouts, refresh retry,
//!   rollback and the beta and termination-protection gates
//! - **Data-source adapter**: the read-only counterpart
//! - **Handlers**: object-safe views of both adapters over raw JSON
//! - **Registry**: maps type names to handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use provix_adapter::{ResourceAdapter, ResourceOptions, ResourceRegistry};
//!
//! let options = ResourceOptions::new("provix_project_vpc")
//!     .id_fields(["project", "vpc_id"])
//!     .refresh_state()
//!     .remove_missing();
//!
//! let mut registry = ResourceRegistry::new();
//! registry.register(Arc::new(ResourceAdapter::<VpcModel, _>::new(options, VpcHooks)));
//! registry.configure_all(&ProviderData::new(client, config));
//!
//! let handler = registry.get_required("provix_project_vpc")?;
//! let rsp = handler.create(&ctx, CreateRequest { plan }).await;
//! ```

pub mod datasource;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod model;
pub mod registry;
pub mod request;
pub mod resource;

// Re-export main types for convenience
pub use datasource::{DataSourceAdapter, DataSourceOptions, DataSourceReadRequest, DataSourceReadResponse};
pub use error::{AdapterError, AdapterResult};
pub use handler::{DataSourceHandler, Named, ResourceHandler};
pub use hooks::{ConfigValidator, ConflictingAttributes, DataSourceHooks, ResourceHooks};
pub use model::{bool_attribute, Model};
pub use registry::{DataSourceRegistry, Registry, ResourceRegistry};
pub use request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ImportStateRequest, ImportStateResponse,
    ModifyPlanRequest, ModifyPlanResponse, ProviderData, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
    ValidateConfigRequest, ValidateConfigResponse,
};
pub use resource::{ResourceAdapter, ResourceOptions, TERMINATION_PROTECTION_ATTRIBUTE};
