//! Login state and transparent session recovery.
//!
//! Gatekeeper tokens expire without notice, so any remote failure may just
//! mean the session is stale. [`SessionManager::run`] drives every remote
//! operation through a small state machine:
//!
//! ```text
//!   Attempting ──ok──────────────────────────────▶ done (retry count reset)
//!       │ remote failure
//!       ▼
//!   Recovering ──cap reached──▶ Terminal (step's code, session torn down)
//!       │    ──no credentials─▶ Terminal (ABORT, session torn down)
//!       │    ──relogin failed─▶ Recovering
//!       │ relogin ok
//!       ▼
//!   Replaying ──ok──▶ done
//!       │ remote failure
//!       └───────────▶ Recovering
//! ```
//!
//! The retry count is shared by the whole session and capped by
//! [`ProviderConfig::max_retries`]. A 403 or any local failure skips recovery.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::cache::PathCache;
use crate::config::ProviderConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ProviderError, ProviderResult};
use crate::gateway::{GatewayConnector, GatewayResult, LoginInfo, RemoteGateway};
use crate::host::{HostMount, MountOptions};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub gatekeeper_url: Option<String>,
    pub user: Option<String>,
    pub principal: Option<String>,
    pub display_name: Option<String>,
    pub retry_count: u8,
}

struct SessionState {
    phase: SessionPhase,
    gateway: Option<Arc<dyn RemoteGateway>>,
    /// Bumped whenever `gateway` is replaced.
    generation: u64,
    gatekeeper_url: Option<String>,
    user: Option<String>,
    principal: Option<String>,
    display_name: Option<String>,
    retry_count: u8,
}

impl SessionState {
    fn logged_out() -> Self {
        Self {
            phase: SessionPhase::LoggedOut,
            gateway: None,
            generation: 0,
            gatekeeper_url: None,
            user: None,
            principal: None,
            display_name: None,
            retry_count: 0,
        }
    }

    fn sign_in(&mut self, gateway: Arc<dyn RemoteGateway>, url: &str, user: &str, info: &LoginInfo) {
        self.phase = SessionPhase::LoggedIn;
        self.gateway = Some(gateway);
        self.generation += 1;
        self.gatekeeper_url = Some(url.to_string());
        self.user = Some(user.to_string());
        self.principal = Some(info.user_id.clone());
        self.display_name = Some(info.display_name.clone());
    }

    fn sign_out(&mut self) {
        let generation = self.generation + 1;
        *self = Self::logged_out();
        self.generation = generation;
    }
}

/// Explicit states of [`SessionManager::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryState {
    Attempting,
    Recovering,
    Replaying,
}

/// Result of one recovery step.
enum Recovery {
    /// A fresh session is in place; replay the operation.
    Restored,
    /// Relogin failed; try recovering again.
    Failed,
    /// The retry cap is reached.
    Exhausted,
    /// Nothing stored to log in with.
    NoCredentials,
    /// The session was torn down while this operation was in flight.
    LoggedOut,
}

/// Owns authentication state and the recovery policy.
pub struct SessionManager {
    config: ProviderConfig,
    connector: Arc<dyn GatewayConnector>,
    credentials: Arc<dyn CredentialStore>,
    host: Arc<dyn HostMount>,
    cache: Arc<PathCache>,
    state: RwLock<SessionState>,
    relogin: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        config: ProviderConfig,
        connector: Arc<dyn GatewayConnector>,
        credentials: Arc<dyn CredentialStore>,
        host: Arc<dyn HostMount>,
        cache: Arc<PathCache>,
    ) -> Self {
        Self {
            config,
            connector,
            credentials,
            host,
            cache,
            state: RwLock::new(SessionState::logged_out()),
            relogin: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.read();
        SessionStatus {
            phase: state.phase,
            gatekeeper_url: state.gatekeeper_url.clone(),
            user: state.user.clone(),
            principal: state.principal.clone(),
            display_name: state.display_name.clone(),
            retry_count: state.retry_count,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().phase == SessionPhase::LoggedIn
    }

    /// Current gateway, only while logged in.
    pub fn gateway(&self) -> Option<Arc<dyn RemoteGateway>> {
        self.current().map(|(gateway, _)| gateway)
    }

    fn current(&self) -> Option<(Arc<dyn RemoteGateway>, u64)> {
        let state = self.state.read();
        match (state.phase, &state.gateway) {
            (SessionPhase::LoggedIn, Some(gateway)) => Some((Arc::clone(gateway), state.generation)),
            _ => None,
        }
    }

    pub fn reset_retries(&self) {
        self.state.write().retry_count = 0;
    }

    /// Log in explicitly.
    ///
    /// On success the credentials are stored and the provider is mounted if
    /// it is not already. On failure the session ends logged out and the
    /// provider is unmounted.
    pub async fn login(
        &self,
        gatekeeper_url: &str,
        user: &str,
        secret: SecretString,
    ) -> ProviderResult<()> {
        self.state.write().phase = SessionPhase::LoggingIn;
        info!(gatekeeper = gatekeeper_url, user, "logging in");

        match self.authenticate(gatekeeper_url, user, &secret).await {
            Ok((gateway, login)) => {
                {
                    let mut state = self.state.write();
                    state.sign_in(gateway, gatekeeper_url, user, &login);
                    state.retry_count = 0;
                }
                let credentials = Credentials::new(gatekeeper_url, user, secret);
                if let Err(e) = self.credentials.save(&credentials) {
                    warn!(error = %e, "failed to store credentials");
                }
                info!(user, display_name = %login.display_name, "logged in");
                self.mount_if_needed();
                Ok(())
            }
            Err(e) => {
                warn!(gatekeeper = gatekeeper_url, user, error = %e, "login failed");
                self.state.write().sign_out();
                self.unmount_if_mounted();
                Err(ProviderError::Login(e))
            }
        }
    }

    /// Silent login from stored credentials. Returns whether any were stored.
    pub async fn resume(&self) -> ProviderResult<bool> {
        let Some(credentials) = self.credentials.load()? else {
            debug!("no stored credentials, staying logged out");
            return Ok(false);
        };
        let Credentials {
            gatekeeper_url,
            user,
            secret,
        } = credentials;
        self.login(&gatekeeper_url, &user, secret).await?;
        Ok(true)
    }

    /// Log out and forget the stored credentials.
    pub fn logout(&self) {
        self.teardown();
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear stored credentials");
        }
        info!("logged out");
    }

    /// Force the session back to logged out, drop the cache and unmount.
    pub fn teardown(&self) {
        self.state.write().sign_out();
        self.cache.clear();
        self.unmount_if_mounted();
    }

    /// Run a remote operation under the recovery policy.
    ///
    /// `attempt` is called with the current gateway and may be called again
    /// after a successful relogin.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> ProviderResult<T>
    where
        F: FnMut(Arc<dyn RemoteGateway>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut state = RecoveryState::Attempting;
        let mut failed_generation = 0;
        let mut last_error = None;

        loop {
            match state {
                RecoveryState::Attempting | RecoveryState::Replaying => {
                    let Some((gateway, generation)) = self.current() else {
                        return Err(ProviderError::NotAuthenticated);
                    };
                    match attempt(gateway).await {
                        Ok(value) => {
                            self.reset_retries();
                            return Ok(value);
                        }
                        Err(e) if e.is_recoverable() => {
                            warn!(operation, error = %e, ?state, "remote call failed, recovering session");
                            failed_generation = generation;
                            last_error = Some(e);
                            state = RecoveryState::Recovering;
                        }
                        Err(e) => {
                            self.reset_retries();
                            return Err(e);
                        }
                    }
                }
                RecoveryState::Recovering => match self.recover(failed_generation).await {
                    Recovery::Restored => state = RecoveryState::Replaying,
                    Recovery::Failed => {}
                    Recovery::Exhausted => {
                        error!(operation, "session recovery exhausted, logging out");
                        self.teardown();
                        return Err(last_error.unwrap_or(ProviderError::NotAuthenticated));
                    }
                    Recovery::NoCredentials => {
                        error!(operation, "no stored credentials for recovery, logging out");
                        self.teardown();
                        return Err(ProviderError::RecoveryAborted);
                    }
                    Recovery::LoggedOut => return Err(ProviderError::NotAuthenticated),
                },
            }
        }
    }

    async fn recover(&self, failed_generation: u64) -> Recovery {
        let _guard = self.relogin.lock().await;

        let attempt = {
            let mut state = self.state.write();
            if state.phase != SessionPhase::LoggedIn {
                return Recovery::LoggedOut;
            }
            if state.generation != failed_generation {
                // Another operation already replaced the session.
                return Recovery::Restored;
            }
            if state.retry_count >= self.config.max_retries {
                return Recovery::Exhausted;
            }
            state.retry_count += 1;
            state.retry_count
        };

        let credentials = match self.credentials.load() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Recovery::NoCredentials,
            Err(e) => {
                warn!(error = %e, "could not read stored credentials");
                return Recovery::NoCredentials;
            }
        };

        debug!(attempt, user = %credentials.user, "attempting silent relogin");
        match self
            .authenticate(&credentials.gatekeeper_url, &credentials.user, &credentials.secret)
            .await
        {
            Ok((gateway, login)) => {
                self.state.write().sign_in(
                    gateway,
                    &credentials.gatekeeper_url,
                    &credentials.user,
                    &login,
                );
                info!(attempt, "session restored");
                self.mount_if_needed();
                Recovery::Restored
            }
            Err(e) => {
                warn!(attempt, error = %e, "silent relogin failed");
                Recovery::Failed
            }
        }
    }

    async fn authenticate(
        &self,
        gatekeeper_url: &str,
        user: &str,
        secret: &SecretString,
    ) -> GatewayResult<(Arc<dyn RemoteGateway>, LoginInfo)> {
        let gateway = self.connector.connect(gatekeeper_url)?;
        let login = gateway.login(user, secret).await?;
        Ok((gateway, login))
    }

    fn mount_options(&self) -> MountOptions {
        MountOptions {
            file_system_id: self.config.file_system_id.clone(),
            display_name: self.config.display_name.clone(),
            writable: self.config.writable,
        }
    }

    fn mount_if_needed(&self) {
        if self.host.is_mounted(&self.config.file_system_id) {
            return;
        }
        if let Err(e) = self.host.mount(&self.mount_options()) {
            warn!(error = %e, "host mount failed");
        }
    }

    fn unmount_if_mounted(&self) {
        if !self.host.is_mounted(&self.config.file_system_id) {
            return;
        }
        if let Err(e) = self.host.unmount(&self.config.file_system_id) {
            warn!(error = %e, "host unmount failed");
        }
    }
}
