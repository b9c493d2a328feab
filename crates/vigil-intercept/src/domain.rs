//! Isolated execution domains
//!
//! An [`IsolatedDomain`] is a dedicated thread that owns every object created
//! in it. Callers never touch those objects; they send jobs over a channel
//! and block on a one-shot reply. A [`RemoteTarget`] is the caller-side
//! handle to one such object and implements the same [`Target`] contract as
//! a local object.
//!
//! A job that panics is caught on the domain thread; the caller sees a
//! `Domain` error and the domain keeps serving.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_core::{Arguments, BodyError, MethodInfo, Target, Value, VigilError};

/// Identifier of an object owned by a domain
pub type ObjectId = Uuid;

type Job = Box<dyn FnOnce(&mut DomainObjects) + Send>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Objects owned by a domain thread
#[derive(Default)]
pub struct DomainObjects {
    objects: HashMap<ObjectId, Arc<dyn Target>>,
}

impl DomainObjects {
    /// Take ownership of `target`
    pub fn insert(&mut self, target: Arc<dyn Target>) -> ObjectId {
        let id = Uuid::new_v4();
        self.objects.insert(id, target);
        id
    }

    /// Look up an object
    pub fn get(&self, id: &ObjectId) -> Option<Arc<dyn Target>> {
        self.objects.get(id).cloned()
    }

    /// Drop an object
    pub fn remove(&mut self, id: &ObjectId) -> Option<Arc<dyn Target>> {
        self.objects.remove(id)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the domain owns no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// A worker thread that owns objects and runs jobs against them
pub struct IsolatedDomain {
    name: String,
    sender: mpsc::UnboundedSender<Message>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IsolatedDomain {
    /// Spawn a domain thread
    pub fn spawn(name: impl Into<String>) -> Result<Arc<Self>, VigilError> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
        let thread_name = format!("vigil-domain-{name}");
        let domain_name = name.clone();

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut objects = DomainObjects::default();
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        Message::Run(job) => {
                            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut objects)));
                            if outcome.is_err() {
                                warn!(domain = %domain_name, "job panicked");
                            }
                        }
                        Message::Shutdown => break,
                    }
                }
                debug!(domain = %domain_name, objects = objects.len(), "domain stopped");
            })
            .map_err(|e| VigilError::domain(format!("failed to spawn domain '{name}': {e}")))?;

        debug!(domain = %name, "domain started");
        Ok(Arc::new(Self {
            name,
            sender,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        }))
    }

    /// Domain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the current thread is this domain's thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Run `job` on the domain thread and wait for its result
    pub fn execute<R, F>(&self, job: F) -> Result<R, VigilError>
    where
        R: Send + 'static,
        F: FnOnce(&mut DomainObjects) -> R + Send + 'static,
    {
        if self.is_current() {
            return Err(VigilError::domain(format!(
                "domain '{}' cannot wait on itself",
                self.name
            )));
        }
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Run(Box::new(move |objects| {
                let _ = reply.send(job(objects));
            })))
            .map_err(|_| self.stopped())?;
        response.blocking_recv().map_err(|_| {
            VigilError::domain(format!("domain '{}' dropped the request", self.name))
        })
    }

    /// Queue `job` without waiting for it
    pub fn post<F>(&self, job: F) -> Result<(), VigilError>
    where
        F: FnOnce(&mut DomainObjects) + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| self.stopped())
    }

    /// Stop the domain after the jobs already queued, dropping its objects
    pub fn shutdown(&self) -> Result<(), VigilError> {
        let _ = self.sender.send(Message::Shutdown);
        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        if self.is_current() {
            return Ok(());
        }
        handle
            .join()
            .map_err(|_| VigilError::domain(format!("domain '{}' thread panicked", self.name)))
    }

    fn stopped(&self) -> VigilError {
        VigilError::domain(format!("domain '{}' is stopped", self.name))
    }
}

impl Drop for IsolatedDomain {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(domain = %self.name, error = %err, "domain did not stop cleanly");
        }
    }
}

impl fmt::Debug for IsolatedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedDomain")
            .field("name", &self.name)
            .field("running", &self.handle.lock().is_some())
            .finish()
    }
}

/// Caller-side handle to an object living in a domain
pub struct RemoteTarget {
    domain: Arc<IsolatedDomain>,
    object_id: ObjectId,
    type_name: String,
}

impl RemoteTarget {
    /// Handle for `object_id` in `domain`
    pub fn new(domain: Arc<IsolatedDomain>, object_id: ObjectId, type_name: impl Into<String>) -> Self {
        Self {
            domain,
            object_id,
            type_name: type_name.into(),
        }
    }

    /// Id of the remote object
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Domain the object lives in
    pub fn domain(&self) -> &Arc<IsolatedDomain> {
        &self.domain
    }
}

impl Target for RemoteTarget {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn invoke(&self, method: &MethodInfo, arguments: Arguments) -> Result<Option<Value>, BodyError> {
        let object_id = self.object_id;
        let method = method.clone();
        self.domain
            .execute(move |objects| -> Result<Option<Value>, BodyError> {
                let target = objects
                    .get(&object_id)
                    .ok_or_else(|| VigilError::domain(format!("object {object_id} no longer exists")))?;
                target.invoke(&method, arguments)
            })
            .map_err(BodyError::from)?
    }
}

impl Drop for RemoteTarget {
    fn drop(&mut self) {
        let object_id = self.object_id;
        // The domain may already be stopped, in which case the object is gone anyway.
        let _ = self.domain.post(move |objects| {
            objects.remove(&object_id);
        });
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("domain", &self.domain.name())
            .field("object_id", &self.object_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}
