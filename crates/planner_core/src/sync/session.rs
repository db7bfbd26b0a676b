//! Binding between authentication events and planner sessions.
//!
//! # Responsibility
//! - Start one `SyncOrchestrator` per signed-in identity.
//! - Tear the current orchestrator down on sign-out or identity change.
//!
//! # Invariants
//! - At most one orchestrator is active at a time.
//! - The cache store outlives sessions, so a returning user warm-starts.

use super::gateway::RemoteGateway;
use super::orchestrator::{SyncOrchestrator, DEFAULT_MAX_IN_FLIGHT};
use super::rest_gateway::RestGateway;
use crate::cache::{CacheError, LocalCacheStore, SqliteCacheMedium};
use crate::config::{ConfigError, PlannerConfig, RemoteConfig};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Identity change reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn {
        user_id: String,
        /// Session token used to authorize remote calls, when available.
        access_token: Option<String>,
    },
    SignedOut,
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    Started { user_id: String },
    Unchanged,
    Ended { user_id: String },
    Ignored,
}

#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Cache(CacheError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Cache(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<CacheError> for SessionError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

/// Builds the remote gateway for a newly signed-in user.
pub trait RemoteConnector: Send {
    fn connect(&self, access_token: Option<&str>) -> Arc<dyn RemoteGateway>;
}

impl RemoteConnector for RemoteConfig {
    fn connect(&self, access_token: Option<&str>) -> Arc<dyn RemoteGateway> {
        let gateway = RestGateway::new(self);
        match access_token {
            Some(token) => Arc::new(gateway.with_access_token(token)),
            None => Arc::new(gateway),
        }
    }
}

impl<F> RemoteConnector for F
where
    F: Fn(Option<&str>) -> Arc<dyn RemoteGateway> + Send,
{
    fn connect(&self, access_token: Option<&str>) -> Arc<dyn RemoteGateway> {
        self(access_token)
    }
}

/// Session holder driven by authentication events.
pub struct PlannerSession {
    connector: Box<dyn RemoteConnector>,
    max_in_flight: usize,
    parked_cache: Option<LocalCacheStore>,
    active: Option<SyncOrchestrator>,
}

impl PlannerSession {
    pub fn new(
        cache: LocalCacheStore,
        connector: Box<dyn RemoteConnector>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            connector,
            max_in_flight,
            parked_cache: Some(cache),
            active: None,
        }
    }

    /// Builds a session from validated configuration.
    ///
    /// Requires `remote.base_url`; the cache lives in `cache.path` or in memory.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, SessionError> {
        config.validate()?;
        if !config.remote.is_configured() {
            return Err(ConfigError::Invalid("remote.base_url is required".to_string()).into());
        }
        let cache = match &config.cache.path {
            Some(path) => LocalCacheStore::new(Box::new(SqliteCacheMedium::open(path)?)),
            None => LocalCacheStore::in_memory(),
        };
        Ok(Self::new(
            cache,
            Box::new(config.remote.clone()),
            config.sync.max_in_flight_pushes,
        ))
    }

    /// Session with the default background task bound.
    pub fn with_defaults(cache: LocalCacheStore, connector: Box<dyn RemoteConnector>) -> Self {
        Self::new(cache, connector, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn orchestrator(&self) -> Option<&SyncOrchestrator> {
        self.active.as_ref()
    }

    pub fn orchestrator_mut(&mut self) -> Option<&mut SyncOrchestrator> {
        self.active.as_mut()
    }

    pub fn active_user_id(&self) -> Option<&str> {
        self.active.as_ref().map(SyncOrchestrator::user_id)
    }

    /// Applies one authentication event.
    pub fn handle(&mut self, event: SessionEvent) -> SessionChange {
        match event {
            SessionEvent::SignedIn {
                user_id,
                access_token,
            } => {
                let user_id = user_id.trim().to_string();
                if user_id.is_empty() {
                    return SessionChange::Ignored;
                }
                if self.active_user_id() == Some(user_id.as_str()) {
                    return SessionChange::Unchanged;
                }
                self.end_active();

                let cache = self
                    .parked_cache
                    .take()
                    .unwrap_or_else(LocalCacheStore::in_memory);
                let gateway = self.connector.connect(access_token.as_deref());
                info!("event=session_start module=session status=start");
                self.active = Some(SyncOrchestrator::bootstrap(
                    user_id.clone(),
                    cache,
                    gateway,
                    self.max_in_flight,
                ));
                SessionChange::Started { user_id }
            }
            SessionEvent::SignedOut => match self.end_active() {
                Some(user_id) => SessionChange::Ended { user_id },
                None => SessionChange::Ignored,
            },
        }
    }

    /// Applies every event currently queued on `events`. Returns how many
    /// were handled.
    pub fn pump(&mut self, events: &Receiver<SessionEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn end_active(&mut self) -> Option<String> {
        let orchestrator = self.active.take()?;
        let user_id = orchestrator.user_id().to_string();
        self.parked_cache = Some(orchestrator.shutdown());
        info!("event=session_end module=session status=ok");
        Some(user_id)
    }
}
