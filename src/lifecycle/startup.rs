//! Startup orchestration and the run loop.
//!
//! # Responsibilities
//! - Build every backend from configuration (sessions, permissions,
//!   repository, discovery) and the shared outbound client
//! - Bind both listeners before anything else runs
//! - Run the aggregator and both servers under one shutdown signal
//! - Register with discovery in the background once serving has started
//! - Drain within the grace period, then deregister
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A listener that dies takes the whole gateway down with it
//! - Deregistration is always the last step, even after a forced abort

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use crate::auth::{
    AuthGate, InMemorySessions, PermissionError, PermissionEvaluator, RemotePermissions, RemoteSessions,
    SessionError, SessionValidator, StaticPermissions,
};
use crate::config::{GatewayConfig, PermissionSource, RepositoryKind, SessionSource};
use crate::discovery::{ConsulRegistry, DisabledRegistry, DiscoveryError, ServiceDescriptor, ServiceRegistry};
use crate::health::{HealthAggregator, HealthBoard, HealthSnapshot, HttpProbe, RepositoryProbe};
use crate::http::{build_client, ops_router, traffic_router, AppState, LayoutSettings};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::{target::TargetError, TargetPool};
use crate::observability::{metrics, BuildInfo};
use crate::repository::{tcp::DsnError, InMemoryRepository, TcpRepository, UserRepository};
use crate::security::TokenExtractor;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot bind {listener} listener on {address}: {source}")]
    Bind {
        listener: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build outbound client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("session backend: {0}")]
    Session(#[from] SessionError),

    #[error("permission backend: {0}")]
    Permission(#[from] PermissionError),

    #[error("repository: {0}")]
    Repository(#[from] DsnError),

    #[error("discovery: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("metrics recorder: {0}")]
    Metrics(#[from] BuildError),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} task panicked")]
    Panicked(&'static str),
}

/// A fully wired gateway with both listeners bound.
pub struct Gateway {
    state: AppState,
    traffic: TcpListener,
    ops: TcpListener,
    aggregator: HealthAggregator,
    registry: Arc<dyn ServiceRegistry>,
    descriptor: ServiceDescriptor,
    grace: Duration,
}

impl Gateway {
    pub async fn bind(config: GatewayConfig, build: BuildInfo) -> Result<Self, StartupError> {
        let traffic = bind_listener("traffic", config.httpd.traffic_address()).await?;
        let ops = bind_listener("ops", config.httpd.service_address()).await?;

        let handle = metrics::install()?;
        let client = build_client(&config.proxy)?;
        let targets = Arc::new(TargetPool::from_config(&config.proxy.targets)?);
        let auth = Arc::new(build_auth_gate(&config, &client)?);
        let repository = build_repository(&config)?;
        let registry = build_registry(&config, &client)?;

        let board = Arc::new(HealthBoard::new(HealthSnapshot::new(Vec::new())));
        let aggregator = HealthAggregator::new(
            board.clone(),
            config.health.interval(),
            config.health.timeout(),
            build.clone(),
        )
        .with_dependency(
            config.health.persistence_scope.clone(),
            Arc::new(RepositoryProbe::new(repository)),
        )
        .with_dependency(
            config.health.upstream_scope.clone(),
            Arc::new(HttpProbe::new(client.clone(), &config.proxy.health_url, &config.proxy.health_path)),
        );
        aggregator.publish_initial();

        let descriptor = ServiceDescriptor::from_config(&config, &build.version);
        let grace = config.shutdown.grace();
        let state = AppState {
            settings: Arc::new(LayoutSettings::from(&config.layout)),
            body_limit: config.security.max_body_size,
            config: Arc::new(config),
            build,
            client,
            auth,
            targets,
            health: board,
            metrics: handle,
        };

        tracing::info!(
            traffic = %local_addr(&traffic),
            ops = %local_addr(&ops),
            targets = state.targets.targets().len(),
            "Gateway bound"
        );

        Ok(Self {
            state,
            traffic,
            ops,
            aggregator,
            registry,
            descriptor,
            grace,
        })
    }

    pub fn traffic_addr(&self) -> Option<SocketAddr> {
        self.traffic.local_addr().ok()
    }

    pub fn ops_addr(&self) -> Option<SocketAddr> {
        self.ops.local_addr().ok()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` fires, then drain and deregister.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), LifecycleError> {
        let Gateway {
            state,
            traffic,
            ops,
            aggregator,
            registry,
            descriptor,
            grace,
        } = self;

        let mut aggregator_task = tokio::spawn(aggregator.run(shutdown.subscribe()));
        let mut traffic_task = spawn_server("traffic", traffic, traffic_router(state.clone()), shutdown.clone());
        let mut ops_task = spawn_server("ops", ops, ops_router(state), shutdown.clone());
        let registration = spawn_registration(registry.clone(), descriptor.clone());

        shutdown.subscribe().recv().await;
        tracing::info!(grace = ?grace, "Draining listeners");

        let drained = time::timeout(grace, async {
            tokio::join!(&mut traffic_task, &mut ops_task, &mut aggregator_task)
        })
        .await;

        let result = match drained {
            Ok((traffic, ops, aggregator)) => {
                let aggregator = aggregator.map_err(|_| LifecycleError::Panicked("health aggregator"));
                flatten("traffic", traffic)
                    .and(flatten("ops", ops))
                    .and(aggregator)
            }
            Err(_) => {
                tracing::warn!(grace = ?grace, "Grace period elapsed, aborting remaining tasks");
                traffic_task.abort();
                ops_task.abort();
                aggregator_task.abort();
                Ok(())
            }
        };

        // A registration still in flight must not land after the deregistration.
        registration.abort();
        let _ = registration.await;

        if let Err(e) = registry.deregister(&descriptor.id).await {
            tracing::error!(service_id = %descriptor.id, error = %e, "Service deregistration failed");
        }

        tracing::info!("Shutdown complete");
        result
    }
}

async fn bind_listener(listener: &'static str, address: String) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            listener,
            address,
            source,
        })
}

fn local_addr(listener: &TcpListener) -> String {
    listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn build_auth_gate(config: &GatewayConfig, client: &reqwest::Client) -> Result<AuthGate, StartupError> {
    let sessions: Arc<dyn SessionValidator> = match config.session.source {
        SessionSource::Memory => Arc::new(InMemorySessions::from_config(&config.session.tokens)),
        SessionSource::Kratos => Arc::new(RemoteSessions::new(
            client.clone(),
            &config.session.url,
            config.session.cookie_name.clone(),
            config.session.timeout(),
        )?),
    };
    let permissions: Arc<dyn PermissionEvaluator> = match config.permissions.source {
        PermissionSource::Memory => Arc::new(StaticPermissions::new(config.permissions.rules.clone())),
        PermissionSource::Keto => Arc::new(RemotePermissions::new(client.clone(), &config.permissions)?),
    };
    tracing::info!(
        sessions = ?config.session.source,
        permissions = ?config.permissions.source,
        "Auth backends selected"
    );

    Ok(AuthGate::new(
        TokenExtractor::new(config.session.cookie_name.clone()),
        sessions,
        permissions,
        config.session.timeout(),
        config.permissions.timeout(),
    ))
}

fn build_repository(config: &GatewayConfig) -> Result<Arc<dyn UserRepository>, StartupError> {
    let repository: Arc<dyn UserRepository> = match config.repository.kind {
        RepositoryKind::Memory => Arc::new(InMemoryRepository::new()),
        RepositoryKind::Tcp => Arc::new(TcpRepository::from_dsn(&config.repository.dsn, config.repository.timeout())?),
    };
    tracing::info!(destination = %repository.destination(), "Repository selected");
    Ok(repository)
}

fn build_registry(config: &GatewayConfig, client: &reqwest::Client) -> Result<Arc<dyn ServiceRegistry>, StartupError> {
    if !config.consul.enabled {
        return Ok(Arc::new(DisabledRegistry));
    }
    Ok(Arc::new(ConsulRegistry::new(client.clone(), &config.consul.url)?))
}

/// Registration runs beside the servers; a slow agent never delays serving.
fn spawn_registration(registry: Arc<dyn ServiceRegistry>, descriptor: ServiceDescriptor) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = registry.register(&descriptor).await {
            tracing::error!(service_id = %descriptor.id, error = %e, "Service registration failed");
        }
    })
}

fn spawn_server(
    listener: &'static str,
    tcp: TcpListener,
    router: Router,
    shutdown: Shutdown,
) -> JoinHandle<Result<(), LifecycleError>> {
    tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(tcp, app)
            .with_graceful_shutdown(shutdown.subscribe().wait())
            .await;

        match result {
            Ok(()) => {
                tracing::info!(listener, "HTTP server stopped");
                Ok(())
            }
            Err(source) => {
                tracing::error!(listener, error = %source, "HTTP server failed");
                shutdown.trigger();
                Err(LifecycleError::Serve { listener, source })
            }
        }
    })
}

fn flatten(
    listener: &'static str,
    joined: Result<Result<(), LifecycleError>, tokio::task::JoinError>,
) -> Result<(), LifecycleError> {
    joined.map_err(|_| LifecycleError::Panicked(listener))?
}
