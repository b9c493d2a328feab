//! Action discovery
//!
//! A discoverer turns a call context into the ordered list of actions to
//! run around it. Declarative discoverers read the metadata registry and
//! stable-sort by priority; the request discoverer returns the request's own
//! list untouched. Every discoverer rejects context shapes it does not know.

use crate::action::Action;
use std::sync::Arc;
use tracing::debug;
use vigil_core::{
    ApplicationCall, CallContext, HandlerDescriptor, Metadata, RequestCall, Scope, SharedContext,
    TestCall, VigilError,
};

/// Source of the actions to run around a call
pub trait ActionDiscoverer: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &'static str;

    /// Ordered actions for `context`
    fn discover(&self, context: &SharedContext) -> Result<Vec<Action>, VigilError>;
}

/// Stable ascending sort by priority; ties keep their input order
pub fn sort_by_priority(descriptors: &mut [HandlerDescriptor]) {
    descriptors.sort_by_key(|descriptor| descriptor.priority);
}

fn into_actions(descriptors: Vec<HandlerDescriptor>, context: &SharedContext) -> Vec<Action> {
    descriptors
        .into_iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let id = format!("{}[{index}]", descriptor.handler_type.name());
            Action::new(id, descriptor, Arc::clone(context))
        })
        .collect()
}

fn unsupported(discoverer: &'static str, context: &dyn CallContext) -> VigilError {
    VigilError::unsupported_context(discoverer, context.kind())
}

/// Declarative discovery for test method calls
///
/// Merges the descriptors on the instance's type and its ancestors (most
/// derived first) with those on the called method, then sorts by priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestCallDiscoverer;

impl TestCallDiscoverer {
    /// Descriptors for a test call, before sorting
    pub fn declared_descriptors(call: &TestCall) -> Vec<HandlerDescriptor> {
        let metadata: &Metadata = call.metadata();
        let type_name = call.instance().type_name();

        let mut type_names: Vec<&str> = metadata
            .ancestry(type_name)
            .iter()
            .map(|info| info.name.as_str())
            .collect();
        if type_names.is_empty() {
            type_names.push(type_name);
        }

        let method = call.method();
        let mut descriptors: Vec<HandlerDescriptor> = type_names
            .into_iter()
            .flat_map(|name| metadata.handlers(&Scope::of_type(name)))
            .collect();
        descriptors.extend(metadata.handlers(&Scope::method(
            method.declaring_type.clone(),
            method.name.clone(),
        )));
        descriptors
    }
}

impl ActionDiscoverer for TestCallDiscoverer {
    fn name(&self) -> &'static str {
        "test-call"
    }

    fn discover(&self, context: &SharedContext) -> Result<Vec<Action>, VigilError> {
        let call = context
            .downcast_ref::<TestCall>()
            .ok_or_else(|| unsupported(self.name(), context.as_ref()))?;

        let mut descriptors = Self::declared_descriptors(call);
        sort_by_priority(&mut descriptors);
        debug!(
            instance = call.instance().type_name(),
            method = %call.method().name,
            count = descriptors.len(),
            "discovered test call actions"
        );
        Ok(into_actions(descriptors, context))
    }
}

/// Discovery for requests: the request's own handler list, unmodified
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestDiscoverer;

impl ActionDiscoverer for RequestDiscoverer {
    fn name(&self) -> &'static str {
        "request"
    }

    fn discover(&self, context: &SharedContext) -> Result<Vec<Action>, VigilError> {
        let call = context
            .downcast_ref::<RequestCall>()
            .ok_or_else(|| unsupported(self.name(), context.as_ref()))?;

        let descriptors = call.request().initialization_handlers.clone();
        debug!(path = %call.request().path, count = descriptors.len(), "discovered request actions");
        Ok(into_actions(descriptors, context))
    }
}

/// Module-scoped discovery for application start and stop
///
/// Merges the descriptors of every registered module, in module
/// registration order, then sorts by priority.
#[derive(Debug, Clone)]
pub struct ApplicationDiscoverer {
    metadata: Arc<Metadata>,
}

impl ApplicationDiscoverer {
    /// Discover from `metadata`
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self { metadata }
    }
}

impl ActionDiscoverer for ApplicationDiscoverer {
    fn name(&self) -> &'static str {
        "application"
    }

    fn discover(&self, context: &SharedContext) -> Result<Vec<Action>, VigilError> {
        let call = context
            .downcast_ref::<ApplicationCall>()
            .ok_or_else(|| unsupported(self.name(), context.as_ref()))?;

        let mut descriptors: Vec<HandlerDescriptor> = self
            .metadata
            .modules()
            .iter()
            .flat_map(|module| self.metadata.handlers(&Scope::module(module.clone())))
            .collect();
        sort_by_priority(&mut descriptors);
        debug!(
            application = %call.application().id,
            count = descriptors.len(),
            "discovered application actions"
        );
        Ok(into_actions(descriptors, context))
    }
}

/// Dispatches to a discoverer by context kind
#[derive(Clone, Default)]
pub struct CompositeDiscoverer {
    routes: Vec<(&'static str, Arc<dyn ActionDiscoverer>)>,
}

impl CompositeDiscoverer {
    /// No routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the three built-in context kinds
    pub fn standard(metadata: Arc<Metadata>) -> Self {
        Self::new()
            .route(TestCall::KIND, Arc::new(TestCallDiscoverer))
            .route(RequestCall::KIND, Arc::new(RequestDiscoverer))
            .route(ApplicationCall::KIND, Arc::new(ApplicationDiscoverer::new(metadata)))
    }

    /// Route `kind` to `discoverer`, replacing an existing route
    pub fn route(mut self, kind: &'static str, discoverer: Arc<dyn ActionDiscoverer>) -> Self {
        self.routes.retain(|(existing, _)| *existing != kind);
        self.routes.push((kind, discoverer));
        self
    }
}

impl std::fmt::Debug for CompositeDiscoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(kind, discoverer)| (kind, discoverer.name())))
            .finish()
    }
}

impl ActionDiscoverer for CompositeDiscoverer {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn discover(&self, context: &SharedContext) -> Result<Vec<Action>, VigilError> {
        let kind = context.kind();
        let (_, discoverer) = self
            .routes
            .iter()
            .find(|(route, _)| *route == kind)
            .ok_or_else(|| unsupported(self.name(), context.as_ref()))?;
        discoverer.discover(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionState;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use std::any::Any;
    use vigil_core::{ApplicationHost, HandlerType, Request, TypeInfo, Value};
    use vigil_testkit::{fixtures, EventLog, RecordingTarget};

    #[derive(Debug)]
    struct Foreign;

    impl CallContext for Foreign {
        fn kind(&self) -> &'static str {
            "foreign"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn tagged(label: &str) -> HandlerDescriptor {
        HandlerDescriptor::new(fixtures::noop_handler_type(label))
    }

    fn labels(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .map(|action| match action.state() {
                ActionState::Pending(descriptor) => descriptor.handler_type.name().to_string(),
                other => other.label().to_string(),
            })
            .collect()
    }

    fn cart_call(metadata: Metadata, method: &str) -> SharedContext {
        let metadata = Arc::new(metadata);
        let method = metadata.find_method("CartTest", method).unwrap().clone();
        let target = Arc::new(RecordingTarget::new("CartTest", EventLog::new()));
        Arc::new(TestCall::new(metadata, target, method, vec![None]))
    }

    #[test]
    fn test_priorities_sort_ascending() {
        let mut metadata = fixtures::cart_hierarchy();
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("high").with_priority(100));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("low").with_priority(-100));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("zero"));

        let actions = TestCallDiscoverer.discover(&cart_call(metadata, "adds_item")).unwrap();
        assert_eq!(labels(&actions), ["low", "zero", "high"]);
    }

    #[test]
    fn test_ties_put_type_level_before_method_level() {
        let mut metadata = fixtures::cart_hierarchy();
        metadata.attach_handler(Scope::method("CartTest", "adds_item"), tagged("method"));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("type-a"));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("type-b"));

        let actions = TestCallDiscoverer.discover(&cart_call(metadata, "adds_item")).unwrap();
        assert_eq!(labels(&actions), ["type-a", "type-b", "method"]);
    }

    #[test]
    fn test_ancestor_descriptors_follow_derived_ones() {
        let mut metadata = fixtures::cart_hierarchy();
        metadata.attach_handler(Scope::of_type("LiveTest"), tagged("base"));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("derived"));
        metadata.attach_handler(Scope::method("CartTest", "removes_item"), tagged("other-method"));

        let actions = TestCallDiscoverer.discover(&cart_call(metadata, "adds_item")).unwrap();
        assert_eq!(labels(&actions), ["derived", "base"]);
    }

    #[test]
    fn test_module_handlers_are_not_part_of_a_test_call() {
        let mut metadata = fixtures::cart_hierarchy();
        metadata.attach_handler(Scope::module("checkout"), tagged("module"));
        metadata.attach_handler(Scope::of_type("CartTest"), tagged("type"));

        let actions = TestCallDiscoverer.discover(&cart_call(metadata, "adds_item")).unwrap();
        assert_eq!(labels(&actions), ["type"]);
    }

    #[test]
    fn test_inherited_method_uses_declaring_type_scope() {
        let mut metadata = fixtures::cart_hierarchy();
        metadata.attach_handler(Scope::method("LiveTest", "warm_up"), tagged("warm"));

        let actions = TestCallDiscoverer.discover(&cart_call(metadata, "warm_up")).unwrap();
        assert_eq!(labels(&actions), ["warm"]);
    }

    #[test]
    fn test_request_list_is_returned_unmodified() {
        let request = Request::new("/cart")
            .with_handler(tagged("second").with_priority(10))
            .with_handler(tagged("first").with_priority(-10));
        let context: SharedContext = Arc::new(RequestCall::new(request));

        let actions = RequestDiscoverer.discover(&context).unwrap();
        assert_eq!(labels(&actions), ["second", "first"]);
    }

    #[test]
    fn test_application_merges_modules_in_registration_order() {
        let mut metadata = Metadata::new();
        metadata.register_module("storage");
        metadata.register_type(TypeInfo::new("CartTest").in_module("checkout"));
        metadata.attach_handler(Scope::module("checkout"), tagged("checkout"));
        metadata.attach_handler(Scope::module("storage"), tagged("storage"));
        metadata.attach_handler(Scope::module("checkout"), tagged("early").with_priority(-1));

        let discoverer = ApplicationDiscoverer::new(Arc::new(metadata));
        let context: SharedContext =
            Arc::new(ApplicationCall::new(ApplicationHost::new("app", "/", "/srv/app")));
        let actions = discoverer.discover(&context).unwrap();
        assert_eq!(labels(&actions), ["early", "storage", "checkout"]);
    }

    #[test]
    fn test_unknown_context_is_rejected() {
        let context: SharedContext = Arc::new(Foreign);
        assert_matches!(
            TestCallDiscoverer.discover(&context),
            Err(VigilError::UnsupportedContext { discoverer: "test-call", context_kind })
                if context_kind == "foreign"
        );

        let composite = CompositeDiscoverer::standard(Arc::new(Metadata::new()));
        assert_matches!(
            composite.discover(&context),
            Err(VigilError::UnsupportedContext { discoverer: "composite", .. })
        );
    }

    #[test]
    fn test_composite_dispatches_by_kind() {
        let composite = CompositeDiscoverer::standard(Arc::new(Metadata::new()));
        let request: SharedContext =
            Arc::new(RequestCall::new(Request::new("/").with_handler(tagged("only"))));
        assert_eq!(labels(&composite.discover(&request).unwrap()), ["only"]);
    }

    #[test]
    fn test_actions_share_the_call_context() {
        let request: SharedContext = Arc::new(RequestCall::new(
            Request::new("/").with_handler(tagged("a")).with_handler(tagged("b")),
        ));
        let actions = RequestDiscoverer.discover(&request).unwrap();
        assert!(actions.iter().all(|action| Arc::ptr_eq(action.context(), &request)));
        assert_eq!(actions[1].id(), "b[1]");
    }

    fn numbered(priorities: &[i32]) -> Vec<HandlerDescriptor> {
        let handler_type = HandlerType::builder("n").variadic(|_| Ok(fixtures::Noop)).build();
        priorities
            .iter()
            .enumerate()
            .map(|(index, priority)| {
                HandlerDescriptor::new(Arc::clone(&handler_type))
                    .with_arguments(vec![Value::new(index)])
                    .with_priority(*priority)
            })
            .collect()
    }

    fn index_of(descriptor: &HandlerDescriptor) -> usize {
        *descriptor.arguments[0].downcast_ref::<usize>().unwrap()
    }

    proptest! {
        #[test]
        fn prop_priority_sort_is_stable(priorities in proptest::collection::vec(-5i32..5, 0..40)) {
            let mut descriptors = numbered(&priorities);
            sort_by_priority(&mut descriptors);

            for pair in descriptors.windows(2) {
                prop_assert!(pair[0].priority <= pair[1].priority);
                if pair[0].priority == pair[1].priority {
                    prop_assert!(index_of(&pair[0]) < index_of(&pair[1]));
                }
            }
            prop_assert_eq!(descriptors.len(), priorities.len());
        }
    }
}
