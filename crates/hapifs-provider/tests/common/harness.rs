//! Test harness for provider integration tests.
//!
//! [`MockGateway`] is an in-memory gatekeeper: a tree of remote nodes keyed by
//! scope and remote path, a call log, and switches for injecting failures.
//! [`TestProvider`] wires it into a [`ProviderAdapter`] together with a
//! [`LocalHost`] and an in-memory credential store.
//!
//! The seeded remote tree:
//!
//! ```text
//! shares
//! ├── Finance            \\srv\Finance
//! │   ├── budget.txt     "hello world"
//! │   └── Reports
//! │       └── q1.xlsx    "quarter one"
//! └── Public             \\srv\Public
//! computers
//! ├── LAPTOP             agent 7, tree rooted at "/"
//! │   └── home
//! │       └── notes.txt  "remember"
//! └── PC1                directory service, \\PC1
//!     └── C$
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use hapifs_provider::{
    AgentInfo, CredentialStore, Credentials, EntryMetadata, ErrorCode, GatewayConnector,
    GatewayError, GatewayResult, HostMount, ListFilter, LocalHost, LoginInfo,
    MemoryCredentialStore, OpenMode, Operation, PathCache, ProviderAdapter, ProviderConfig,
    RemoteGateway, RemoteItem, Reply, Request, RequestId, Response, Scope, join_remote,
};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

/// Gatekeeper URL used by every test session.
pub const GATEKEEPER: &str = "https://gk.example.test";
pub const TEST_USER: &str = "alice";
pub const TEST_PASSWORD: &str = "correct-horse";

const SHARE_FINANCE: &str = "\\\\srv\\Finance";
const SHARE_PUBLIC: &str = "\\\\srv\\Public";

#[derive(Debug, Clone)]
struct Node {
    parent: String,
    name: String,
    is_directory: bool,
    content: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    /// Keyed by `(scope, remote path)`.
    nodes: BTreeMap<(String, String), Node>,
    shares: Vec<RemoteItem>,
    agents: Vec<AgentInfo>,
    calls: Vec<String>,
    /// Calls fail with 401 until the next login.
    expired: bool,
    fail_next: usize,
    fail_with: Option<GatewayError>,
    fail_always: Option<GatewayError>,
    reject_logins: bool,
    logins: usize,
    duplicate_listings: bool,
}

/// In-memory gatekeeper.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

fn timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
}

fn split_remote(path: &str) -> (String, String) {
    match path.rfind(['\\', '/']) {
        Some(0) => ("/".to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}

impl MockGateway {
    /// Gateway holding the seeded tree.
    pub fn seeded() -> Arc<Self> {
        let gateway = Arc::new(Self::default());
        {
            let mut state = gateway.state.lock();
            state.shares = vec![
                share_item("Finance", SHARE_FINANCE),
                share_item("Public", SHARE_PUBLIC),
            ];
            state.agents = vec![
                AgentInfo {
                    name: "LAPTOP".into(),
                    agent_id: 7,
                },
                AgentInfo {
                    name: "PC1".into(),
                    agent_id: -1,
                },
            ];
        }
        gateway.add_dir("share", SHARE_FINANCE, "Reports");
        gateway.add_file("share", SHARE_FINANCE, "budget.txt", b"hello world");
        gateway.add_file("share", "\\\\srv\\Finance\\Reports", "q1.xlsx", b"quarter one");
        gateway.add_dir("agent/7/share", "/", "home");
        gateway.add_file("agent/7/share", "/home", "notes.txt", b"remember");
        gateway.add_dir("directory", "\\\\PC1", "C$");
        gateway
    }

    pub fn add_dir(&self, scope: &str, parent: &str, name: &str) {
        self.insert(scope, parent, name, true, Vec::new());
    }

    pub fn add_file(&self, scope: &str, parent: &str, name: &str, content: &[u8]) {
        self.insert(scope, parent, name, false, content.to_vec());
    }

    fn insert(&self, scope: &str, parent: &str, name: &str, is_directory: bool, content: Vec<u8>) {
        let path = join_remote(parent, name);
        self.state.lock().nodes.insert(
            (scope.to_string(), path),
            Node {
                parent: parent.to_string(),
                name: name.to_string(),
                is_directory,
                content,
            },
        );
    }

    /// Content of a remote file, if it exists.
    pub fn content(&self, scope: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .nodes
            .get(&(scope.to_string(), path.to_string()))
            .map(|node| node.content.clone())
    }

    pub fn exists(&self, scope: &str, path: &str) -> bool {
        self.state
            .lock()
            .nodes
            .contains_key(&(scope.to_string(), path.to_string()))
    }

    /// Every remote call so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls whose log line starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn logins(&self) -> usize {
        self.state.lock().logins
    }

    /// Make every call fail with 401 until the next successful login.
    pub fn expire_session(&self) {
        self.state.lock().expired = true;
    }

    /// Fail the next `count` non-login calls with `error`.
    pub fn fail_next(&self, count: usize, error: GatewayError) {
        let mut state = self.state.lock();
        state.fail_next = count;
        state.fail_with = Some(error);
    }

    /// Fail every non-login call with `error`.
    pub fn fail_always(&self, error: GatewayError) {
        self.state.lock().fail_always = Some(error);
    }

    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.fail_always = None;
        state.fail_next = 0;
        state.expired = false;
    }

    pub fn reject_logins(&self, reject: bool) {
        self.state.lock().reject_logins = reject;
    }

    /// Return every listing item twice, the copy with a different remote id.
    pub fn duplicate_listings(&self, enabled: bool) {
        self.state.lock().duplicate_listings = enabled;
    }

    fn check(&self, call: String) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.expired {
            return Err(GatewayError::Status(401));
        }
        if let Some(error) = &state.fail_always {
            return Err(error.clone());
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(state
                .fail_with
                .clone()
                .unwrap_or(GatewayError::Status(500)));
        }
        Ok(())
    }

    fn ensure_dir(state: &mut MockState, scope: &str, path: &str) {
        if state.nodes.contains_key(&(scope.to_string(), path.to_string())) {
            return;
        }
        let (parent, name) = split_remote(path);
        state.nodes.insert(
            (scope.to_string(), path.to_string()),
            Node {
                parent,
                name,
                is_directory: true,
                content: Vec::new(),
            },
        );
    }
}

fn share_item(name: &str, path: &str) -> RemoteItem {
    RemoteItem {
        name: name.into(),
        size: 0,
        last_modified: timestamp(),
        remote_id: path.into(),
        is_directory: true,
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn login(&self, user: &str, secret: &SecretString) -> GatewayResult<LoginInfo> {
        let mut state = self.state.lock();
        state.calls.push(format!("login {user}"));
        if state.reject_logins || secret.expose_secret() != TEST_PASSWORD {
            return Err(GatewayError::Authentication("invalid user or password".into()));
        }
        state.expired = false;
        state.logins += 1;
        Ok(LoginInfo {
            token: SecretString::from(format!("token-{}", state.logins)),
            user_id: format!("{user}-id"),
            display_name: "Alice Example".into(),
        })
    }

    async fn list(
        &self,
        scope: &Scope,
        identifier: &str,
        _filters: &[ListFilter],
        _max_depth: u32,
    ) -> GatewayResult<Vec<RemoteItem>> {
        self.check(format!("list {scope} {identifier}"))?;
        let state = self.state.lock();
        let mut items = if *scope == Scope::Shares {
            state.shares.clone()
        } else {
            let scope = scope.to_string();
            state
                .nodes
                .iter()
                .filter(|((s, _), node)| *s == scope && node.parent == identifier)
                .map(|((_, path), node)| RemoteItem {
                    name: node.name.clone(),
                    size: node.content.len() as u64,
                    last_modified: timestamp(),
                    remote_id: path.clone(),
                    is_directory: node.is_directory,
                })
                .collect()
        };
        if state.duplicate_listings {
            let copies: Vec<RemoteItem> = items
                .iter()
                .map(|item| RemoteItem {
                    remote_id: format!("{}-copy", item.remote_id),
                    ..item.clone()
                })
                .collect();
            items.extend(copies);
        }
        Ok(items)
    }

    async fn list_agents(&self) -> GatewayResult<Vec<AgentInfo>> {
        self.check("agents".to_string())?;
        Ok(self.state.lock().agents.clone())
    }

    async fn read_range(
        &self,
        scope: &Scope,
        identifier: &str,
        start: u64,
        end: u64,
    ) -> GatewayResult<Bytes> {
        self.check(format!("read {scope} {identifier} {start}..{end}"))?;
        let state = self.state.lock();
        let node = state
            .nodes
            .get(&(scope.to_string(), identifier.to_string()))
            .ok_or(GatewayError::Status(404))?;
        let len = node.content.len();
        let start = usize::try_from(start).unwrap().min(len);
        let end = usize::try_from(end).unwrap().min(len);
        Ok(Bytes::copy_from_slice(&node.content[start..end]))
    }

    async fn write_range(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> GatewayResult<()> {
        self.check(format!(
            "write {scope} {identifier} {name} @{offset} +{}",
            data.len()
        ))?;
        let mut state = self.state.lock();
        let scope = scope.to_string();
        Self::ensure_dir(&mut state, &scope, identifier);
        let path = join_remote(identifier, name);
        let node = state
            .nodes
            .entry((scope, path))
            .or_insert_with(|| Node {
                parent: identifier.to_string(),
                name: name.to_string(),
                is_directory: false,
                content: Vec::new(),
            });
        let offset = usize::try_from(offset).unwrap();
        if node.content.len() < offset + data.len() {
            node.content.resize(offset + data.len(), 0);
        }
        node.content[offset..offset + data.len()].copy_from_slice(&data);
        Ok(())
    }

    async fn truncate(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        length: u64,
    ) -> GatewayResult<()> {
        self.check(format!("truncate {scope} {identifier} {name} {length}"))?;
        let mut state = self.state.lock();
        let path = join_remote(identifier, name);
        let node = state
            .nodes
            .entry((scope.to_string(), path))
            .or_insert_with(|| Node {
                parent: identifier.to_string(),
                name: name.to_string(),
                is_directory: false,
                content: Vec::new(),
            });
        node.content.resize(usize::try_from(length).unwrap(), 0);
        Ok(())
    }

    async fn delete(&self, scope: &Scope, identifier: &str) -> GatewayResult<()> {
        self.check(format!("delete {scope} {identifier}"))?;
        let mut state = self.state.lock();
        let scope = scope.to_string();
        let before = state.nodes.len();
        state.nodes.retain(|(s, path), _| {
            !(*s == scope
                && (path == identifier
                    || path.starts_with(&format!("{identifier}\\"))
                    || path.starts_with(&format!("{identifier}/"))))
        });
        if state.nodes.len() == before {
            return Err(GatewayError::Status(404));
        }
        Ok(())
    }

    async fn rename(&self, scope: &Scope, source: &str, target: &str) -> GatewayResult<()> {
        self.check(format!("rename {scope} {source} -> {target}"))?;
        let mut state = self.state.lock();
        let key = (scope.to_string(), source.to_string());
        let mut node = state.nodes.remove(&key).ok_or(GatewayError::Status(404))?;
        let (parent, name) = split_remote(target);
        node.parent = parent;
        node.name = name;
        state.nodes.insert((scope.to_string(), target.to_string()), node);
        Ok(())
    }

    async fn copy(
        &self,
        scope: &Scope,
        source: &str,
        target: &str,
        is_directory: bool,
    ) -> GatewayResult<()> {
        self.check(format!("copy {scope} {source} -> {target} dir={is_directory}"))?;
        let mut state = self.state.lock();
        let mut node = state
            .nodes
            .get(&(scope.to_string(), source.to_string()))
            .cloned()
            .ok_or(GatewayError::Status(404))?;
        let (parent, name) = split_remote(target);
        node.parent = parent;
        node.name = name;
        state.nodes.insert((scope.to_string(), target.to_string()), node);
        Ok(())
    }
}

/// Connector that always hands out the same [`MockGateway`].
pub struct MockConnector {
    gateway: Arc<MockGateway>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(gateway: Arc<MockGateway>) -> Self {
        Self {
            gateway,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl GatewayConnector for MockConnector {
    fn connect(&self, gatekeeper_url: &str) -> GatewayResult<Arc<dyn RemoteGateway>> {
        if !gatekeeper_url.starts_with("https://") {
            return Err(GatewayError::InvalidGatekeeper(gatekeeper_url.to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.gateway) as Arc<dyn RemoteGateway>)
    }
}

/// Provider wired to a seeded [`MockGateway`].
pub struct TestProvider {
    pub adapter: Arc<ProviderAdapter>,
    pub gateway: Arc<MockGateway>,
    pub connector: Arc<MockConnector>,
    pub host: Arc<LocalHost>,
    pub credentials: Arc<MemoryCredentialStore>,
    next_request: AtomicUsize,
}

impl TestProvider {
    /// Logged-out provider with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self::build(config, PathCache::in_memory(), MemoryCredentialStore::new())
    }

    /// Logged-out provider whose credential store already holds a login.
    pub fn with_stored_credentials() -> Self {
        let credentials = Credentials::new(
            GATEKEEPER,
            TEST_USER,
            SecretString::from(TEST_PASSWORD.to_string()),
        );
        Self::build(
            ProviderConfig::default(),
            PathCache::in_memory(),
            MemoryCredentialStore::with_credentials(credentials),
        )
    }

    pub fn with_cache(cache: PathCache) -> Self {
        Self::build(ProviderConfig::default(), cache, MemoryCredentialStore::new())
    }

    fn build(config: ProviderConfig, cache: PathCache, credentials: MemoryCredentialStore) -> Self {
        let gateway = MockGateway::seeded();
        let connector = Arc::new(MockConnector::new(Arc::clone(&gateway)));
        let host = Arc::new(LocalHost::new());
        let credentials = Arc::new(credentials);
        let adapter = Arc::new(ProviderAdapter::new(
            config,
            Arc::clone(&connector) as Arc<dyn GatewayConnector>,
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Arc::clone(&host) as Arc<dyn HostMount>,
            cache,
        ));
        Self {
            adapter,
            gateway,
            connector,
            host,
            credentials,
            next_request: AtomicUsize::new(1),
        }
    }

    /// Logged-in provider with the default configuration.
    pub async fn logged_in() -> Self {
        let provider = Self::new();
        provider.login().await;
        provider
    }

    pub async fn login(&self) {
        self.adapter
            .login(
                GATEKEEPER,
                TEST_USER,
                SecretString::from(TEST_PASSWORD.to_string()),
            )
            .await
            .expect("login failed");
    }

    pub fn next_request_id(&self) -> RequestId {
        self.next_request.fetch_add(1, Ordering::SeqCst) as RequestId
    }

    /// Dispatch an operation through the host surface and wait for its outcome.
    pub async fn dispatch(&self, operation: Operation) -> Result<Response, ErrorCode> {
        self.dispatch_as(self.next_request_id(), operation).await
    }

    pub async fn dispatch_as(
        &self,
        request_id: RequestId,
        operation: Operation,
    ) -> Result<Response, ErrorCode> {
        let (reply, rx) = Reply::channel();
        self.adapter
            .dispatch(Request::new(request_id, operation), reply)
            .await
            .expect("request task panicked");
        rx.await.expect("request completed without a reply")
    }

    /// List `path` and return the entry names, failing the test on error.
    pub async fn list(&self, path: &str) -> Vec<String> {
        let entries = self
            .adapter
            .read_directory(path)
            .await
            .unwrap_or_else(|e| panic!("listing {path} failed: {e}"));
        names(&entries)
    }

    /// Open `path` and return the open request id.
    pub fn open(&self, path: &str, mode: OpenMode) -> RequestId {
        let id = self.next_request_id();
        self.adapter
            .open_file(id, path, mode)
            .unwrap_or_else(|e| panic!("opening {path} failed: {e}"));
        id
    }
}

/// Sorted entry names.
pub fn names(entries: &[EntryMetadata]) -> Vec<String> {
    let mut names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    names.sort();
    names
}
