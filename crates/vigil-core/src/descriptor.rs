//! Handler types and handler descriptors
//!
//! A [`HandlerType`] is a named set of constructors. Each constructor is
//! either exact (an ordered list of parameter types) or variadic (absorbs the
//! whole argument list). A [`HandlerDescriptor`] pairs a handler type with
//! constructor arguments and a priority; the lifecycle executor turns it
//! into a live [`Handler`] by picking the constructor that fits the runtime
//! types of the arguments.

use crate::errors::{HandlerError, VigilError};
use crate::handler::Handler;
use crate::value::{TypeTag, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type BuildFn = dyn Fn(Vec<Value>) -> Result<Box<dyn Handler>, HandlerError> + Send + Sync;

/// Parameter shape of a constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorShape {
    /// Formal parameters, matched exactly and in order
    Exact(Vec<TypeTag>),
    /// A single parameter that absorbs every argument
    Variadic,
}

impl ConstructorShape {
    /// Whether this shape accepts arguments of the given runtime types
    pub fn accepts(&self, argument_types: &[TypeTag]) -> bool {
        match self {
            ConstructorShape::Exact(parameters) => parameters.as_slice() == argument_types,
            ConstructorShape::Variadic => true,
        }
    }
}

/// One way of building a handler
#[derive(Clone)]
pub struct Constructor {
    shape: ConstructorShape,
    build: Arc<BuildFn>,
}

impl Constructor {
    /// Parameter shape
    pub fn shape(&self) -> &ConstructorShape {
        &self.shape
    }

    /// Run the constructor
    pub fn build(&self, arguments: Vec<Value>) -> Result<Box<dyn Handler>, HandlerError> {
        (self.build)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").field("shape", &self.shape).finish()
    }
}

/// Typed view of an exact constructor's argument list
pub trait FromArgs: Sized {
    /// Formal parameter types, in order
    fn parameter_types() -> Vec<TypeTag>;

    /// Extract the typed arguments; `None` when the list does not fit
    fn from_args(arguments: &[Value]) -> Option<Self>;
}

impl FromArgs for () {
    fn parameter_types() -> Vec<TypeTag> {
        Vec::new()
    }

    fn from_args(arguments: &[Value]) -> Option<Self> {
        arguments.is_empty().then_some(())
    }
}

macro_rules! impl_from_args {
    ($($name:ident => $idx:tt),+) => {
        impl<$($name: Any + Send + Sync + Clone),+> FromArgs for ($($name,)+) {
            fn parameter_types() -> Vec<TypeTag> {
                vec![$(TypeTag::of::<$name>()),+]
            }

            fn from_args(arguments: &[Value]) -> Option<Self> {
                if arguments.len() != Self::parameter_types().len() {
                    return None;
                }
                Some(($(arguments.get($idx)?.downcast_ref::<$name>()?.clone(),)+))
            }
        }
    };
}

impl_from_args!(A => 0);
impl_from_args!(A => 0, B => 1);
impl_from_args!(A => 0, B => 1, C => 2);
impl_from_args!(A => 0, B => 1, C => 2, D => 3);

/// A named handler type and its constructors
#[derive(Debug)]
pub struct HandlerType {
    name: String,
    constructors: Vec<Constructor>,
}

impl HandlerType {
    /// Start declaring a handler type
    pub fn builder(name: impl Into<String>) -> HandlerTypeBuilder {
        HandlerTypeBuilder {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared constructors, in declaration order
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Pick the constructor for `arguments`
    ///
    /// An exact constructor whose parameter types equal the argument types
    /// wins; otherwise the variadic constructor, if any.
    pub fn resolve_constructor(&self, arguments: &[Value]) -> Result<&Constructor, VigilError> {
        let argument_types: Vec<TypeTag> = arguments.iter().map(Value::type_tag).collect();

        let exact = self.constructors.iter().find(|ctor| {
            matches!(&ctor.shape, ConstructorShape::Exact(_)) && ctor.shape.accepts(&argument_types)
        });
        let variadic = || {
            self.constructors
                .iter()
                .find(|ctor| ctor.shape == ConstructorShape::Variadic)
        };

        exact
            .or_else(variadic)
            .ok_or_else(|| VigilError::NoCompatibleConstructor {
                handler_type: self.name.clone(),
                argument_types: argument_types
                    .iter()
                    .map(|tag| tag.name().to_string())
                    .collect(),
            })
    }
}

/// Builder for [`HandlerType`]
pub struct HandlerTypeBuilder {
    name: String,
    constructors: Vec<Constructor>,
}

impl HandlerTypeBuilder {
    /// Add an exact constructor taking the tuple `A`
    pub fn constructor<A, H, F>(mut self, build: F) -> Self
    where
        A: FromArgs + 'static,
        H: Handler,
        F: Fn(A) -> Result<H, HandlerError> + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        self.constructors.push(Constructor {
            shape: ConstructorShape::Exact(A::parameter_types()),
            build: Arc::new(move |arguments: Vec<Value>| {
                let typed = A::from_args(&arguments).ok_or_else(|| {
                    HandlerError::msg(format!(
                        "arguments for '{type_name}' do not match the constructor's parameters"
                    ))
                })?;
                Ok(Box::new(build(typed)?) as Box<dyn Handler>)
            }),
        });
        self
    }

    /// Add a variadic constructor
    pub fn variadic<H, F>(mut self, build: F) -> Self
    where
        H: Handler,
        F: Fn(Vec<Value>) -> Result<H, HandlerError> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            shape: ConstructorShape::Variadic,
            build: Arc::new(move |arguments: Vec<Value>| {
                Ok(Box::new(build(arguments)?) as Box<dyn Handler>)
            }),
        });
        self
    }

    /// Finish the type
    pub fn build(self) -> Arc<HandlerType> {
        Arc::new(HandlerType {
            name: self.name,
            constructors: self.constructors,
        })
    }
}

/// Declaration that a handler runs around a call
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// Handler type to instantiate
    pub handler_type: Arc<HandlerType>,
    /// Constructor arguments, in order
    pub arguments: Vec<Value>,
    /// Ascending sort key; lower runs earlier
    pub priority: i32,
}

impl HandlerDescriptor {
    /// Descriptor with no arguments and priority 0
    pub fn new(handler_type: Arc<HandlerType>) -> Self {
        Self {
            handler_type,
            arguments: Vec::new(),
            priority: 0,
        }
    }

    /// Append a constructor argument
    pub fn with_argument<T: Any + Send + Sync>(mut self, argument: T) -> Self {
        self.arguments.push(Value::new(argument));
        self
    }

    /// Replace the constructor arguments
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("handler_type", &self.handler_type.name())
            .field("arguments", &self.arguments)
            .field("priority", &self.priority)
            .finish()
    }
}
