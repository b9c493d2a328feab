//! Argument providers
//!
//! An argument provider is a context-aware handler that rewrites the call's
//! arguments during setup. For every position it asks the provider whether
//! a different value is needed (by default: only when the value is absent)
//! and, if so, stores whatever the provider resolves.
//!
//! [`MappedArgumentProvider`] resolves from resource mappings in the
//! metadata registry, most specific scope first: the parameter, the method,
//! the instance type and its ancestors, then their modules. The first
//! mapping whose argument type equals the parameter type wins.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vigil_core::{
    ContextAware, Handler, HandlerError, HandlerType, Metadata, ParameterInfo, ResourceMapping,
    Scope, SharedContext, TestCall, Value, VigilError,
};

/// Policy of an argument-rewriting handler
pub trait ArgumentProvider: Send + 'static {
    /// Whether the value at `parameter` should be replaced
    fn needs_value(&self, value: Option<&Value>, _parameter: &ParameterInfo) -> bool {
        value.is_none()
    }

    /// Replacement for the value at `parameter`
    fn resolve_value(
        &self,
        value: Option<Value>,
        parameter: &ParameterInfo,
        call: &TestCall,
    ) -> Result<Option<Value>, HandlerError>;
}

/// Handler that applies an [`ArgumentProvider`] to a test call
pub struct ArgumentProviderHandler<P> {
    provider: P,
}

impl<P: ArgumentProvider> ArgumentProviderHandler<P> {
    /// Wrap a provider
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: ArgumentProvider> ContextAware for ArgumentProviderHandler<P> {
    fn set_context(&mut self, context: &SharedContext) -> Result<(), HandlerError> {
        let call = context.downcast_ref::<TestCall>().ok_or_else(|| {
            VigilError::unsupported_context("argument-provider", context.kind())
        })?;

        for parameter in &call.method().parameters {
            if parameter.position >= call.argument_count() {
                break;
            }
            let current = call.argument(parameter.position)?;
            if !self.provider.needs_value(current.as_ref(), parameter) {
                continue;
            }
            let resolved = self.provider.resolve_value(current, parameter, call)?;
            debug!(
                parameter = %parameter.name,
                position = parameter.position,
                resolved = resolved.is_some(),
                "provided argument"
            );
            call.replace_argument(parameter.position, resolved)?;
        }
        Ok(())
    }
}

impl<P: ArgumentProvider> Handler for ArgumentProviderHandler<P> {
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

/// Handler type named `name` whose parameterless constructor wraps `make()`
pub fn provider_handler_type<P, F>(name: &str, make: F) -> Arc<HandlerType>
where
    P: ArgumentProvider,
    F: Fn() -> P + Send + Sync + 'static,
{
    HandlerType::builder(name)
        .constructor(move |(): ()| Ok(ArgumentProviderHandler::new(make())))
        .build()
}

/// Turns a resource key into a value
pub trait ResourceResolver: Send + Sync + 'static {
    /// Value for `resource`, requested for `parameter`
    fn resolve(&self, resource: &str, parameter: &ParameterInfo) -> Result<Option<Value>, HandlerError>;
}

type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Named resources held in memory
#[derive(Default, Clone)]
pub struct ResourceCatalog {
    producers: Arc<RwLock<HashMap<String, Producer>>>,
}

impl ResourceCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` (shared, not copied) for `name`
    pub fn insert(&self, name: impl Into<String>, value: Value) {
        self.insert_with(name, move || value.clone());
    }

    /// Serve a fresh `produce()` for `name` on every request
    pub fn insert_with<F>(&self, name: impl Into<String>, produce: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.producers.write().insert(name.into(), Arc::new(produce));
    }

    /// Whether `name` is known
    pub fn contains(&self, name: &str) -> bool {
        self.producers.read().contains_key(name)
    }
}

impl ResourceResolver for ResourceCatalog {
    fn resolve(&self, resource: &str, parameter: &ParameterInfo) -> Result<Option<Value>, HandlerError> {
        let producer = self.producers.read().get(resource).cloned().ok_or_else(|| {
            HandlerError::msg(format!(
                "no resource '{resource}' for parameter '{}'",
                parameter.name
            ))
        })?;
        Ok(Some(producer()))
    }
}

impl fmt::Debug for ResourceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.producers.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("ResourceCatalog").field("resources", &names).finish()
    }
}

/// Resolves absent arguments through declared resource mappings
pub struct MappedArgumentProvider {
    resolver: Arc<dyn ResourceResolver>,
}

impl MappedArgumentProvider {
    /// Provider resolving through `resolver`
    pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
        Self { resolver }
    }

    /// Scopes searched for `parameter`, most specific first
    ///
    /// Parameter, method, the instance type and its ancestors, then the
    /// module the instance type belongs to.
    pub fn search_scopes(call: &TestCall, parameter: &ParameterInfo) -> Vec<Scope> {
        let metadata: &Metadata = call.metadata();
        let method = call.method();
        let mut scopes = vec![
            Scope::parameter(
                method.declaring_type.clone(),
                method.name.clone(),
                parameter.position,
            ),
            Scope::method(method.declaring_type.clone(), method.name.clone()),
        ];

        let instance_type = call.instance().type_name();
        let ancestry = metadata.ancestry(instance_type);
        if ancestry.is_empty() {
            scopes.push(Scope::of_type(instance_type));
        }
        scopes.extend(ancestry.iter().map(|info| Scope::of_type(info.name.clone())));

        // Only the instance type's own module; ancestors' modules are not searched.
        if let Some(module) = metadata.type_info(instance_type).and_then(|info| info.module.clone()) {
            scopes.push(Scope::module(module));
        }
        scopes
    }

    /// First mapping applicable to `parameter`
    pub fn find_mapping<'a>(
        metadata: &'a Metadata,
        scopes: &[Scope],
        parameter: &ParameterInfo,
    ) -> Option<&'a ResourceMapping> {
        scopes.iter().find_map(|scope| {
            metadata
                .resources(scope)
                .into_iter()
                .find(|mapping| mapping.argument_type == parameter.type_tag)
        })
    }
}

impl ArgumentProvider for MappedArgumentProvider {
    fn resolve_value(
        &self,
        value: Option<Value>,
        parameter: &ParameterInfo,
        call: &TestCall,
    ) -> Result<Option<Value>, HandlerError> {
        let scopes = Self::search_scopes(call, parameter);
        match Self::find_mapping(call.metadata(), &scopes, parameter) {
            Some(mapping) => self.resolver.resolve(&mapping.resource, parameter),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for MappedArgumentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedArgumentProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vigil_core::{MethodInfo, Request, RequestCall, TypeInfo};
    use vigil_testkit::{EventLog, RecordingTarget};

    #[allow(dead_code)]
    struct Comparable;
    #[allow(dead_code)]
    struct Iterable;
    #[allow(dead_code)]
    struct Disposable;

    /// Records which positions it was asked to fill
    struct Probe {
        log: EventLog,
    }

    impl ArgumentProvider for Probe {
        fn resolve_value(
            &self,
            _value: Option<Value>,
            parameter: &ParameterInfo,
            _call: &TestCall,
        ) -> Result<Option<Value>, HandlerError> {
            self.log.record(format!("resolve:{}", parameter.position));
            Ok(Some(Value::new(parameter.position)))
        }
    }

    fn probe_metadata() -> Arc<Metadata> {
        let mut metadata = Metadata::new();
        metadata.register_type(
            TypeInfo::new("ProbeTest").in_module("probes").with_method(
                MethodInfo::new("f")
                    .with_parameter::<Comparable>("comparable")
                    .with_parameter::<Iterable>("iterable")
                    .with_parameter::<Disposable>("disposable"),
            ),
        );
        Arc::new(metadata)
    }

    fn probe_call(metadata: Arc<Metadata>, arguments: Vec<Option<Value>>) -> (Arc<TestCall>, SharedContext) {
        let method = metadata.find_method("ProbeTest", "f").unwrap().clone();
        let target = Arc::new(RecordingTarget::new("ProbeTest", EventLog::new()));
        let call = Arc::new(TestCall::new(metadata, target, method, arguments));
        let context: SharedContext = call.clone();
        (call, context)
    }

    #[test]
    fn test_only_absent_positions_are_offered() {
        let log = EventLog::new();
        let array = Value::new(vec![1u8, 2, 3]);
        let (call, context) = probe_call(probe_metadata(), vec![None, Some(array.clone()), None]);

        let mut handler = ArgumentProviderHandler::new(Probe { log: log.clone() });
        handler.set_context(&context).unwrap();

        assert_eq!(log.events(), ["resolve:0", "resolve:2"]);
        let arguments = call.arguments();
        assert_eq!(arguments[0].as_ref().unwrap().downcast_ref::<usize>(), Some(&0));
        assert!(arguments[1].as_ref().unwrap().ptr_eq(&array));
        assert_eq!(arguments[2].as_ref().unwrap().downcast_ref::<usize>(), Some(&2));
    }

    #[test]
    fn test_non_test_call_context_is_rejected() {
        let context: SharedContext = Arc::new(RequestCall::new(Request::new("/")));
        let mut handler = ArgumentProviderHandler::new(Probe { log: EventLog::new() });
        let err = handler.set_context(&context).unwrap_err();
        assert_matches!(
            err.downcast_ref::<VigilError>(),
            Some(VigilError::UnsupportedContext { discoverer: "argument-provider", .. })
        );
    }

    fn mapped_call(configure: impl FnOnce(&mut Metadata)) -> (Arc<TestCall>, SharedContext) {
        let mut metadata = Metadata::new();
        metadata.register_type(TypeInfo::new("Base").in_module("core"));
        metadata.register_type(
            TypeInfo::new("CartTest")
                .extends("Base")
                .in_module("shop")
                .with_method(MethodInfo::new("adds_item").with_parameter::<String>("sku")),
        );
        configure(&mut metadata);
        let metadata = Arc::new(metadata);
        let method = metadata.find_method("CartTest", "adds_item").unwrap().clone();
        let target = Arc::new(RecordingTarget::new("CartTest", EventLog::new()));
        let call = Arc::new(TestCall::new(metadata, target, method, vec![None]));
        let context: SharedContext = call.clone();
        (call, context)
    }

    fn resources() -> Arc<ResourceCatalog> {
        let catalog = ResourceCatalog::new();
        for name in ["parameter", "method", "type", "base", "module"] {
            catalog.insert(name, Value::new(name.to_string()));
        }
        Arc::new(catalog)
    }

    fn resolved_sku(call: &TestCall) -> Option<String> {
        call.argument(0)
            .unwrap()
            .and_then(|value| value.downcast_ref::<String>().cloned())
    }

    fn apply(context: &SharedContext) {
        let mut handler = ArgumentProviderHandler::new(MappedArgumentProvider::new(resources()));
        handler.set_context(context).unwrap();
    }

    #[test]
    fn test_parameter_mapping_beats_everything() {
        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::module("shop"), ResourceMapping::of::<String>("module"));
            metadata.attach_resource(Scope::of_type("CartTest"), ResourceMapping::of::<String>("type"));
            metadata.attach_resource(
                Scope::method("CartTest", "adds_item"),
                ResourceMapping::of::<String>("method"),
            );
            metadata.attach_resource(
                Scope::parameter("CartTest", "adds_item", 0),
                ResourceMapping::of::<String>("parameter"),
            );
        });
        apply(&context);
        assert_eq!(resolved_sku(&call).as_deref(), Some("parameter"));
    }

    #[test]
    fn test_specificity_order_method_type_ancestor_module() {
        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::module("shop"), ResourceMapping::of::<String>("module"));
            metadata.attach_resource(Scope::of_type("Base"), ResourceMapping::of::<String>("base"));
            metadata.attach_resource(Scope::of_type("CartTest"), ResourceMapping::of::<String>("type"));
        });
        apply(&context);
        assert_eq!(resolved_sku(&call).as_deref(), Some("type"));

        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::module("shop"), ResourceMapping::of::<String>("module"));
            metadata.attach_resource(Scope::of_type("Base"), ResourceMapping::of::<String>("base"));
        });
        apply(&context);
        assert_eq!(resolved_sku(&call).as_deref(), Some("base"));

        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::module("shop"), ResourceMapping::of::<String>("module"));
        });
        apply(&context);
        assert_eq!(resolved_sku(&call).as_deref(), Some("module"));
    }

    #[test]
    fn test_ancestor_modules_are_not_searched() {
        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::module("core"), ResourceMapping::of::<String>("module"));
        });
        apply(&context);
        assert_eq!(resolved_sku(&call), None);
    }

    #[test]
    fn test_mapping_for_other_type_is_skipped() {
        let (call, context) = mapped_call(|metadata| {
            metadata.attach_resource(
                Scope::method("CartTest", "adds_item"),
                ResourceMapping::of::<u32>("method"),
            );
            metadata.attach_resource(Scope::of_type("CartTest"), ResourceMapping::of::<String>("type"));
        });
        apply(&context);
        assert_eq!(resolved_sku(&call).as_deref(), Some("type"));
    }

    #[test]
    fn test_no_mapping_leaves_value_unresolved() {
        let (call, context) = mapped_call(|_| {});
        apply(&context);
        assert!(call.argument(0).unwrap().is_none());
    }

    #[test]
    fn test_unknown_resource_fails_setup() {
        let (_call, context) = mapped_call(|metadata| {
            metadata.attach_resource(Scope::of_type("CartTest"), ResourceMapping::of::<String>("missing"));
        });
        let mut handler = ArgumentProviderHandler::new(MappedArgumentProvider::new(resources()));
        let err = handler.set_context(&context).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_insert_with_produces_fresh_values() {
        let catalog = ResourceCatalog::new();
        catalog.insert_with("fresh", || Value::new(String::from("x")));
        let parameter = ParameterInfo {
            name: "p".into(),
            position: 0,
            type_tag: vigil_core::TypeTag::of::<String>(),
        };
        let a = catalog.resolve("fresh", &parameter).unwrap().unwrap();
        let b = catalog.resolve("fresh", &parameter).unwrap().unwrap();
        assert!(!a.ptr_eq(&b));
        assert!(catalog.contains("fresh"));
    }
}
