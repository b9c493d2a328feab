//! Hosted test applications
//!
//! A [`TestApplication`] is an isolated domain plus an application-scoped
//! lifecycle. Starting it runs the handlers registered on modules (call id
//! [`CallId::APPLICATION`] in the application's own manager) inside the
//! domain; a graceful stop tears them down again, an immediate stop skips
//! straight to shutting the domain down.

use crate::domain::{IsolatedDomain, RemoteTarget};
use crate::errors::ActivationError;
use crate::factory::{Factory, FactoryRegistry, FactoryRequest};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use vigil_core::{
    ApplicationCall, ApplicationHost, Arguments, CallId, LifecycleConfig, Metadata, SharedContext,
    Target, VigilError,
};
use vigil_lifecycle::{Lifecycle, LifecycleError, LifecycleManager};

/// A running application: a domain with an application-scoped lifecycle
pub struct TestApplication {
    host: ApplicationHost,
    domain: Arc<IsolatedDomain>,
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<FactoryRegistry>,
    context: SharedContext,
    stopped: AtomicBool,
}

impl TestApplication {
    /// Spawn the domain and run application-scoped setup inside it
    pub fn start(
        host: ApplicationHost,
        metadata: Arc<Metadata>,
        registry: Arc<FactoryRegistry>,
        config: LifecycleConfig,
    ) -> Result<Arc<Self>, LifecycleError> {
        let domain = IsolatedDomain::spawn(host.id.clone())?;
        let lifecycle = Arc::new(LifecycleManager::standard(metadata).with_config(config));
        let context: SharedContext = Arc::new(ApplicationCall::new(host.clone()));

        let setup_lifecycle = Arc::clone(&lifecycle);
        let setup_context = Arc::clone(&context);
        domain.execute(move |_| setup_lifecycle.initialize(CallId::APPLICATION, &setup_context))??;
        info!(application = %host.id, path = %host.virtual_path, "application started");

        Ok(Arc::new(Self {
            host,
            domain,
            lifecycle,
            registry,
            context,
            stopped: AtomicBool::new(false),
        }))
    }

    /// Application parameters
    pub fn host(&self) -> &ApplicationHost {
        &self.host
    }

    /// Application id
    pub fn id(&self) -> &str {
        &self.host.id
    }

    /// The domain the application runs in
    pub fn domain(&self) -> &Arc<IsolatedDomain> {
        &self.domain
    }

    /// Whether the application has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Whether application-scoped handlers are currently set up
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_active(CallId::APPLICATION)
    }

    /// Build `type_name` inside the domain with its direct constructor
    pub fn create_object(
        &self,
        type_name: &str,
        arguments: Arguments,
    ) -> Result<RemoteTarget, ActivationError> {
        let constructor = self
            .registry
            .constructor(type_name)
            .ok_or_else(|| VigilError::unknown_type(type_name))?;
        let object_id = self
            .domain
            .execute(move |objects| constructor(arguments).map(|target| objects.insert(target)))?
            .map_err(|source| ActivationError::construction(type_name, source))?;
        debug!(application = %self.host.id, type_name, %object_id, "created remote object");
        Ok(RemoteTarget::new(Arc::clone(&self.domain), object_id, type_name))
    }

    /// Run `action` inside the domain and return its result
    pub fn execute_action<R, F>(&self, action: F) -> Result<R, VigilError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.domain.execute(move |_| action())
    }

    /// Stop the application
    ///
    /// Unless `immediate`, application-scoped handlers are torn down first.
    /// Stopping twice is a no-op.
    pub fn stop(&self, immediate: bool) -> Result<(), LifecycleError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let cleanup = if immediate {
            Ok(())
        } else {
            let lifecycle = Arc::clone(&self.lifecycle);
            let context = Arc::clone(&self.context);
            self.domain
                .execute(move |_| lifecycle.cleanup(CallId::APPLICATION, &context))
                .map_err(LifecycleError::from)
                .and_then(|result| result)
        };

        let shutdown = self.domain.shutdown();
        info!(application = %self.host.id, immediate, "application stopped");
        cleanup?;
        shutdown.map_err(LifecycleError::from)
    }
}

impl fmt::Debug for TestApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestApplication")
            .field("host", &self.host)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Starts, finds and stops test applications by id
pub struct TestApplicationManager {
    metadata: Arc<Metadata>,
    registry: Arc<FactoryRegistry>,
    config: LifecycleConfig,
    running: Mutex<BTreeMap<String, Arc<TestApplication>>>,
}

impl TestApplicationManager {
    /// Manager whose applications discover handlers in `metadata` and build objects through `registry`
    pub fn new(metadata: Arc<Metadata>, registry: Arc<FactoryRegistry>) -> Self {
        Self {
            metadata,
            registry,
            config: LifecycleConfig::default(),
            running: Mutex::new(BTreeMap::new()),
        }
    }

    /// Lifecycle configuration for applications started from now on
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the application described by `host`, or return it if it is already running
    pub fn start_application(
        &self,
        host: ApplicationHost,
    ) -> Result<Arc<TestApplication>, LifecycleError> {
        if let Some(existing) = self.get_running_application(&host) {
            return Ok(existing);
        }

        let host = ApplicationHost {
            physical_path: absolute(host.physical_path.clone())?,
            ..host
        };
        // Setup can block on handlers held by other applications; `running` must not be held here.
        let application = TestApplication::start(
            host,
            Arc::clone(&self.metadata),
            Arc::clone(&self.registry),
            self.config.clone(),
        )?;

        let winner = Arc::clone(
            self.running
                .lock()
                .entry(application.id().to_string())
                .or_insert_with(|| Arc::clone(&application)),
        );
        if !Arc::ptr_eq(&winner, &application) {
            debug!(application = %application.id(), "discarding concurrently started duplicate");
            application.stop(false)?;
        }
        Ok(winner)
    }

    /// The running application for `host`
    pub fn get_running_application(&self, host: &ApplicationHost) -> Option<Arc<TestApplication>> {
        self.running.lock().get(&host.id).cloned()
    }

    /// Every running application, ordered by id
    pub fn running_applications(&self) -> Vec<Arc<TestApplication>> {
        self.running.lock().values().cloned().collect()
    }

    /// Stop `application` and forget it
    pub fn stop_application(
        &self,
        application: &TestApplication,
        immediate: bool,
    ) -> Result<(), LifecycleError> {
        self.running.lock().remove(application.id());
        application.stop(immediate)
    }

    /// Stop every running application; the first failure is returned after all have stopped
    pub fn stop_all(&self, immediate: bool) -> Result<(), LifecycleError> {
        let applications: Vec<_> = std::mem::take(&mut *self.running.lock()).into_values().collect();
        let mut first_error = None;
        for application in applications {
            if let Err(err) = application.stop(immediate) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for TestApplicationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestApplicationManager")
            .field("running", &self.running.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf, VigilError> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| VigilError::config(format!("cannot resolve {}: {e}", path.display())))?;
    Ok(cwd.join(path))
}

/// Factory that builds requested objects inside `application`
pub fn application_factory(application: Arc<TestApplication>) -> Factory {
    Arc::new(move |request: FactoryRequest<'_>| {
        let remote = application.create_object(request.requested_type, request.arguments)?;
        Ok(Arc::new(remote) as Arc<dyn Target>)
    })
}
