//! Call contexts
//!
//! A context describes the call a lifecycle is running for. The set of
//! context shapes is open: the three built-in variants below cover test
//! method calls, hosted requests and application start/stop, and any
//! collaborator may add its own by implementing [`CallContext`].
//! Discoverers downcast to the shapes they understand and reject the rest.

use crate::descriptor::HandlerDescriptor;
use crate::errors::{Result, VigilError};
use crate::metadata::Metadata;
use crate::target::Target;
use crate::value::{Arguments, TypeTag, Value};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A call context variant
pub trait CallContext: Any + Send + Sync + fmt::Debug {
    /// Short name of the variant, used in diagnostics and dispatch
    fn kind(&self) -> &'static str;

    /// Upcast for downcasting to the concrete variant
    fn as_any(&self) -> &dyn Any;
}

impl dyn CallContext {
    /// Borrow the context as a concrete variant
    pub fn downcast_ref<T: CallContext>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the context is the variant `T`
    pub fn is<T: CallContext>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Context shared between the lifecycle manager, handlers and the proxy
pub type SharedContext = Arc<dyn CallContext>;

/// One formal parameter of a tracked method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Zero-based position
    pub position: usize,
    /// Declared type
    pub type_tag: TypeTag,
}

/// Signature of a tracked method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Name of the type that declares the method
    pub declaring_type: String,
    /// Formal parameters in order
    pub parameters: Vec<ParameterInfo>,
}

impl MethodInfo {
    /// A parameterless method with no declaring type yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter of type `T`
    pub fn with_parameter<T: Any>(mut self, name: impl Into<String>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterInfo {
            name: name.into(),
            position,
            type_tag: TypeTag::of::<T>(),
        });
        self
    }

    /// Set the declaring type
    pub fn declared_by(mut self, type_name: impl Into<String>) -> Self {
        self.declaring_type = type_name.into();
        self
    }

    /// Parameter at `position`
    pub fn parameter(&self, position: usize) -> Option<&ParameterInfo> {
        self.parameters.get(position)
    }
}

/// A call into a tracked test object
pub struct TestCall {
    metadata: Arc<Metadata>,
    instance: Arc<dyn Target>,
    method: MethodInfo,
    arguments: RwLock<Arguments>,
}

impl TestCall {
    /// Variant name
    pub const KIND: &'static str = "test-call";

    /// Describe a call of `method` on `instance`
    pub fn new(
        metadata: Arc<Metadata>,
        instance: Arc<dyn Target>,
        method: MethodInfo,
        arguments: Arguments,
    ) -> Self {
        Self {
            metadata,
            instance,
            method,
            arguments: RwLock::new(arguments),
        }
    }

    /// Registry the call's annotations come from
    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    /// The object being called
    pub fn instance(&self) -> &Arc<dyn Target> {
        &self.instance
    }

    /// The method being called
    pub fn method(&self) -> &MethodInfo {
        &self.method
    }

    /// Snapshot of the current arguments
    pub fn arguments(&self) -> Arguments {
        self.arguments.read().clone()
    }

    /// Number of positional arguments
    pub fn argument_count(&self) -> usize {
        self.arguments.read().len()
    }

    /// Current value at `index`
    pub fn argument(&self, index: usize) -> Result<Option<Value>> {
        let arguments = self.arguments.read();
        arguments
            .get(index)
            .cloned()
            .ok_or(VigilError::ArgumentOutOfRange {
                index,
                len: arguments.len(),
            })
    }

    /// Overwrite the value at `index`, returning the previous one
    pub fn replace_argument(&self, index: usize, value: Option<Value>) -> Result<Option<Value>> {
        let mut arguments = self.arguments.write();
        let len = arguments.len();
        let slot = arguments
            .get_mut(index)
            .ok_or(VigilError::ArgumentOutOfRange { index, len })?;
        Ok(std::mem::replace(slot, value))
    }
}

impl fmt::Debug for TestCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCall")
            .field("instance", &self.instance.type_name())
            .field("method", &self.method.name)
            .field("arguments", &*self.arguments.read())
            .finish()
    }
}

impl CallContext for TestCall {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A request sent to a hosted application
#[derive(Debug, Clone)]
pub struct Request {
    /// Request path
    pub path: String,
    /// Raw query string
    pub query_string: String,
    /// Request body
    pub data: String,
    /// HTTP verb
    pub verb: String,
    /// Port the request targets
    pub port: u16,
    /// Handlers to run around this request, in the order given
    pub initialization_handlers: Vec<HandlerDescriptor>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            path: String::new(),
            query_string: String::new(),
            data: String::new(),
            verb: "GET".to_string(),
            port: 80,
            initialization_handlers: Vec::new(),
        }
    }
}

impl Request {
    /// A GET request for `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Append a handler to run around the request
    pub fn with_handler(mut self, descriptor: HandlerDescriptor) -> Self {
        self.initialization_handlers.push(descriptor);
        self
    }
}

/// Response produced for a [`Request`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Response body
    pub content: String,
    /// HTTP status code
    pub status_code: u16,
}

/// A request/response exchange with a hosted application
#[derive(Debug)]
pub struct RequestCall {
    request: Request,
    response: Mutex<Response>,
}

impl RequestCall {
    /// Variant name
    pub const KIND: &'static str = "request-call";

    /// Wrap a request with an empty response
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Mutex::new(Response::default()),
        }
    }

    /// The request
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Snapshot of the response
    pub fn response(&self) -> Response {
        self.response.lock().clone()
    }

    /// Mutate the response in place
    pub fn update_response(&self, update: impl FnOnce(&mut Response)) {
        update(&mut self.response.lock());
    }
}

impl CallContext for RequestCall {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Parameters of a hosted application
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationHost {
    /// Unique application id
    pub id: String,
    /// Virtual path the application is mounted at
    pub virtual_path: String,
    /// Physical root directory
    pub physical_path: PathBuf,
}

impl ApplicationHost {
    /// Describe an application
    pub fn new(
        id: impl Into<String>,
        virtual_path: impl Into<String>,
        physical_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            virtual_path: virtual_path.into(),
            physical_path: physical_path.into(),
        }
    }
}

/// Application start or stop
#[derive(Debug, Clone)]
pub struct ApplicationCall {
    application: ApplicationHost,
}

impl ApplicationCall {
    /// Variant name
    pub const KIND: &'static str = "application-call";

    /// Context for `application`
    pub fn new(application: ApplicationHost) -> Self {
        Self { application }
    }

    /// The application being started or stopped
    pub fn application(&self) -> &ApplicationHost {
        &self.application
    }
}

impl CallContext for ApplicationCall {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
