//! Registry of resource and data-source handlers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{AdapterError, AdapterResult};
use crate::handler::{DataSourceHandler, Named, ResourceHandler};
use crate::request::ProviderData;

type Factory<H> = Box<dyn Fn() -> Arc<H> + Send + Sync>;

struct Entry<H: ?Sized> {
    handler: OnceLock<Arc<H>>,
    factory: Option<Factory<H>>,
}

impl<H: ?Sized> Entry<H> {
    fn ready(handler: Arc<H>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(handler);
        Self {
            handler: cell,
            factory: None,
        }
    }

    fn lazy(factory: Factory<H>) -> Self {
        Self {
            handler: OnceLock::new(),
            factory: Some(factory),
        }
    }

    fn get(&self) -> Option<Arc<H>> {
        if let Some(h) = self.handler.get() {
            return Some(h.clone());
        }
        let factory = self.factory.as_ref()?;
        Some(self.handler.get_or_init(|| factory()).clone())
    }
}

/// Maps type names to handlers.
///
/// Handlers registered with [`Registry::register_lazy`] are built on first
/// lookup and reused afterwards.
pub struct Registry<H: ?Sized + Named> {
    entries: HashMap<String, Entry<H>>,
    kind: &'static str,
}

/// Resources sharing one client type.
pub type ResourceRegistry<C> = Registry<dyn ResourceHandler<C>>;

/// Data sources sharing one client type.
pub type DataSourceRegistry<C> = Registry<dyn DataSourceHandler<C>>;

impl<H: ?Sized + Named> Registry<H> {
    fn with_kind(kind: &'static str) -> Self {
        Self {
            entries: HashMap::new(),
            kind,
        }
    }

    /// Register a handler under its `type_name()`, replacing any previous
    /// one.
    pub fn register(&mut self, handler: Arc<H>) {
        let name = handler.type_name().to_string();
        debug!("Registering {}: {}", self.kind, name);
        self.entries.insert(name, Entry::ready(handler));
    }

    /// Register a constructor that runs on first lookup.
    pub fn register_lazy<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<H> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering lazy {}: {}", self.kind, name);
        self.entries.insert(name, Entry::lazy(Box::new(factory)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.entries.get(name).and_then(Entry::get)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get all registered type names.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<H>> {
        debug!("Unregistering {}: {}", self.kind, name);
        self.entries.remove(name).and_then(|e| e.get())
    }
}

impl<C> Registry<dyn ResourceHandler<C>> {
    pub fn new() -> Self {
        Self::with_kind("resource")
    }

    pub fn get_required(&self, name: &str) -> AdapterResult<Arc<dyn ResourceHandler<C>>> {
        self.get(name)
            .ok_or_else(|| AdapterError::ResourceNotFound(name.to_string()))
    }

    /// Hand provider data to every handler, building lazy ones.
    pub fn configure_all(&self, data: &ProviderData<C>) {
        for name in self.names() {
            if let Some(handler) = self.get(name) {
                handler.configure(Some(data.clone()));
            }
        }
    }
}

impl<C> Default for Registry<dyn ResourceHandler<C>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Registry<dyn DataSourceHandler<C>> {
    pub fn new() -> Self {
        Self::with_kind("data source")
    }

    pub fn get_required(&self, name: &str) -> AdapterResult<Arc<dyn DataSourceHandler<C>>> {
        self.get(name)
            .ok_or_else(|| AdapterError::DataSourceNotFound(name.to_string()))
    }

    pub fn configure_all(&self, data: &ProviderData<C>) {
        for name in self.names() {
            if let Some(handler) = self.get(name) {
                handler.configure(Some(data.clone()));
            }
        }
    }
}

impl<C> Default for Registry<dyn DataSourceHandler<C>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized + Named> std::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ConfigValidator;
    use crate::request::*;
    use async_trait::async_trait;
    use provix_core::{OperationContext, ProviderConfig};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestHandler {
        name: String,
        configured: AtomicUsize,
    }

    impl TestHandler {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: AtomicUsize::new(0),
            })
        }
    }

    impl Named for TestHandler {
        fn type_name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait]
    impl ResourceHandler<()> for TestHandler {
        fn configure(&self, data: Option<ProviderData<()>>) {
            if data.is_some() {
                self.configured.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn schema(&self) -> Value {
            Value::Null
        }

        async fn create(&self, _ctx: &OperationContext, _req: CreateRequest) -> CreateResponse {
            CreateResponse::default()
        }

        async fn read(&self, _ctx: &OperationContext, req: ReadRequest) -> ReadResponse {
            ReadResponse {
                state: Some(req.state),
                ..Default::default()
            }
        }

        async fn update(&self, _ctx: &OperationContext, _req: UpdateRequest) -> UpdateResponse {
            UpdateResponse::default()
        }

        async fn delete(&self, _ctx: &OperationContext, _req: DeleteRequest) -> DeleteResponse {
            DeleteResponse::default()
        }

        async fn modify_plan(&self, _ctx: &OperationContext, req: ModifyPlanRequest) -> ModifyPlanResponse {
            ModifyPlanResponse {
                plan: req.plan,
                ..Default::default()
            }
        }

        async fn validate_config(&self, _ctx: &OperationContext, _req: ValidateConfigRequest) -> ValidateConfigResponse {
            ValidateConfigResponse::default()
        }

        fn import_state(&self, _req: ImportStateRequest) -> ImportStateResponse {
            ImportStateResponse::default()
        }

        fn config_validators(&self) -> Vec<Arc<dyn ConfigValidator>> {
            Vec::new()
        }
    }

    #[test]
    fn test_registry_register() {
        let mut registry = ResourceRegistry::<()>::new();
        assert!(registry.is_empty());

        registry.register(TestHandler::new("provix_project_vpc"));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("provix_project_vpc"));
        assert_eq!(registry.get("provix_project_vpc").unwrap().type_name(), "provix_project_vpc");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_registry_get_required() {
        let registry = ResourceRegistry::<()>::new();
        let err = registry.get_required("provix_missing").err().unwrap();
        assert!(matches!(err, AdapterError::ResourceNotFound(ref n) if n == "provix_missing"));
    }

    #[test]
    fn test_lazy_handler_is_built_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = ResourceRegistry::<()>::new();

        let counter = built.clone();
        registry.register_lazy("provix_service", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            TestHandler::new("provix_service") as Arc<dyn ResourceHandler<()>>
        });
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let first = registry.get("provix_service").unwrap();
        let second = registry.get("provix_service").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_names_and_unregister() {
        let mut registry = ResourceRegistry::<()>::new();
        registry.register(TestHandler::new("provix_a"));
        registry.register(TestHandler::new("provix_b"));

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["provix_a", "provix_b"]);

        assert!(registry.unregister("provix_a").is_some());
        assert!(!registry.contains("provix_a"));
    }

    #[test]
    fn test_configure_all() {
        let handler = TestHandler::new("provix_a");
        let mut registry = ResourceRegistry::<()>::new();
        registry.register(handler.clone());

        registry.configure_all(&ProviderData::new(Arc::new(()), ProviderConfig::default()));
        assert_eq!(handler.configured.load(Ordering::SeqCst), 1);
    }
}
