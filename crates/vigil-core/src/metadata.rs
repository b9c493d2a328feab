//! Declarative metadata registry
//!
//! The registry records the tracked type hierarchy (types, their parents,
//! modules and declared methods) and the annotations attached to scopes.
//! Discoverers read handler annotations from it; argument providers read
//! resource mappings. Registration happens up front, before any call is
//! intercepted, and the registry is shared read-only afterwards.

use crate::context::MethodInfo;
use crate::descriptor::HandlerDescriptor;
use crate::errors::{Result, VigilError};
use crate::value::TypeTag;
use std::any::Any;
use std::collections::{HashMap, HashSet};

/// Where an annotation is attached
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A module; applies to application-scoped lifecycles and to every type in it
    Module(String),
    /// A type; applies to every method of the type and its subtypes
    Type(String),
    /// One method of a type
    Method {
        /// Declaring type
        type_name: String,
        /// Method name
        method: String,
    },
    /// One parameter of a method
    Parameter {
        /// Declaring type
        type_name: String,
        /// Method name
        method: String,
        /// Zero-based parameter position
        position: usize,
    },
}

impl Scope {
    /// Module scope
    pub fn module(name: impl Into<String>) -> Self {
        Scope::Module(name.into())
    }

    /// Type scope
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Scope::Type(type_name.into())
    }

    /// Method scope
    pub fn method(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Scope::Method {
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// Parameter scope
    pub fn parameter(type_name: impl Into<String>, method: impl Into<String>, position: usize) -> Self {
        Scope::Parameter {
            type_name: type_name.into(),
            method: method.into(),
            position,
        }
    }
}

/// Maps an argument type to a named resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMapping {
    /// Parameter type this mapping supplies
    pub argument_type: TypeTag,
    /// Resource key handed to the resolver
    pub resource: String,
}

impl ResourceMapping {
    /// Map parameters of type `T` to `resource`
    pub fn of<T: Any>(resource: impl Into<String>) -> Self {
        Self {
            argument_type: TypeTag::of::<T>(),
            resource: resource.into(),
        }
    }
}

/// Something attached to a scope
#[derive(Debug, Clone)]
pub enum Annotation {
    /// A handler to run around calls in the scope
    Handler(HandlerDescriptor),
    /// A source for absent arguments in the scope
    Resource(ResourceMapping),
}

/// A tracked type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Type name
    pub name: String,
    /// Direct parent, if any
    pub parent: Option<String>,
    /// Enclosing module, if any
    pub module: Option<String>,
    /// Methods the type itself declares
    pub methods: Vec<MethodInfo>,
}

impl TypeInfo {
    /// A root type with no module and no methods
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            module: None,
            methods: Vec::new(),
        }
    }

    /// Set the parent type
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the enclosing module
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Declare a method; its declaring type becomes this type
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method.declared_by(self.name.clone()));
        self
    }

    /// Method declared directly on this type
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// Registry of tracked types and scoped annotations
#[derive(Debug, Default)]
pub struct Metadata {
    modules: Vec<String>,
    types: HashMap<String, TypeInfo>,
    annotations: HashMap<Scope, Vec<Annotation>>,
}

impl Metadata {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; registration order is kept, repeats are ignored
    pub fn register_module(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.modules.contains(&name) {
            self.modules.push(name);
        }
    }

    /// Register a type, replacing any earlier registration of the same name
    pub fn register_type(&mut self, info: TypeInfo) {
        if let Some(module) = &info.module {
            self.register_module(module.clone());
        }
        self.types.insert(info.name.clone(), info);
    }

    /// Registered modules in registration order
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Look up a type
    pub fn type_info(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// The type followed by its registered ancestors, most-derived first
    ///
    /// The walk stops at the first parent that is not registered, or at a
    /// type already visited.
    pub fn ancestry(&self, name: &str) -> Vec<&TypeInfo> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = self.types.get(name);
        while let Some(info) = current {
            if !visited.insert(info.name.as_str()) {
                break;
            }
            chain.push(info);
            current = info.parent.as_deref().and_then(|parent| self.types.get(parent));
        }
        chain
    }

    /// Whether `name` is `ancestor` or derives from it
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        self.ancestry(name).iter().any(|info| info.name == ancestor)
    }

    /// Resolve a method against the type, then its ancestors
    pub fn find_method(&self, type_name: &str, method: &str) -> Result<&MethodInfo> {
        if !self.types.contains_key(type_name) {
            return Err(VigilError::unknown_type(type_name));
        }
        self.ancestry(type_name)
            .into_iter()
            .find_map(|info| info.method(method))
            .ok_or_else(|| VigilError::unknown_method(type_name, method))
    }

    /// Attach an annotation to a scope
    pub fn attach(&mut self, scope: Scope, annotation: Annotation) {
        self.annotations.entry(scope).or_default().push(annotation);
    }

    /// Attach a handler descriptor to a scope
    pub fn attach_handler(&mut self, scope: Scope, descriptor: HandlerDescriptor) {
        self.attach(scope, Annotation::Handler(descriptor));
    }

    /// Attach a resource mapping to a scope
    pub fn attach_resource(&mut self, scope: Scope, mapping: ResourceMapping) {
        self.attach(scope, Annotation::Resource(mapping));
    }

    /// Every annotation on a scope, in declaration order
    pub fn annotations(&self, scope: &Scope) -> &[Annotation] {
        self.annotations.get(scope).map(Vec::as_slice).unwrap_or_default()
    }

    /// Handler descriptors on a scope, in declaration order
    pub fn handlers(&self, scope: &Scope) -> Vec<HandlerDescriptor> {
        self.annotations(scope)
            .iter()
            .filter_map(|annotation| match annotation {
                Annotation::Handler(descriptor) => Some(descriptor.clone()),
                Annotation::Resource(_) => None,
            })
            .collect()
    }

    /// Resource mappings on a scope, in declaration order
    pub fn resources(&self, scope: &Scope) -> Vec<&ResourceMapping> {
        self.annotations(scope)
            .iter()
            .filter_map(|annotation| match annotation {
                Annotation::Resource(mapping) => Some(mapping),
                Annotation::Handler(_) => None,
            })
            .collect()
    }
}
