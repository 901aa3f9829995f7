//! HTTP client for a HAPI gatekeeper.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hapifs_provider::{
    AgentInfo, GatewayConnector, GatewayError, GatewayResult, ListFilter, LoginInfo,
    RemoteGateway, RemoteItem, Scope,
};
use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace, warn};
use url::Url;

use crate::config::GatewayConfig;
use crate::types::{
    CopyRequest, DeleteRequest, FolderEnumRequest, FolderEnumResponse, LoginRequest,
    LoginResponse, RenameRequest, WireComputer, WireFilter,
};

/// Header carrying the session token on every request.
pub const TOKEN_HEADER: &str = "HAPIToken";

/// Filter the agent roster call sends: every computer, any value.
const ROSTER_FILTER: ListFilter = ListFilter {
    filter_type: 12,
    operation: 3,
    value_type: 2,
    value: String::new(),
};

/// [`RemoteGateway`] over the gatekeeper's HTTP API.
///
/// The session token from the last successful [`login`](RemoteGateway::login)
/// is kept inside the client and attached to every later request.
#[derive(Debug)]
pub struct HapiClient {
    base: String,
    http: Client,
    token: RwLock<Option<SecretString>>,
}

impl HapiClient {
    /// Build a client for `gatekeeper`, an `http` or `https` base URL.
    pub fn new(gatekeeper: &str, config: &GatewayConfig) -> GatewayResult<Self> {
        let url = Url::parse(gatekeeper)
            .map_err(|e| GatewayError::InvalidGatekeeper(format!("{gatekeeper}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidGatekeeper(format!(
                "{gatekeeper}: unsupported scheme {}",
                url.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
            http,
            token: RwLock::new(None),
        })
    }

    /// Base URL without a trailing slash.
    pub fn gatekeeper(&self) -> &str {
        &self.base
    }

    /// Whether a session token is held.
    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    fn route(&self, scope: &Scope, action: &str) -> String {
        match scope {
            Scope::Agent(_) => format!("{}/route/{scope}/{action}", self.base),
            _ => format!("{}/route/hapi/{scope}/{action}", self.base),
        }
    }

    fn token(&self) -> String {
        self.token
            .read()
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .unwrap_or_default()
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request
            .header(TOKEN_HEADER, self.token())
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        trace!(url = %response.url(), status = status.as_u16(), "gatekeeper response");
        if status.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::Status(status.as_u16()))
        }
    }

    /// Upload requests carry the same headers as the browser form post.
    fn upload(&self, scope: &Scope, form: Form) -> RequestBuilder {
        self.http
            .post(self.route(scope, "UploadFile"))
            .header(header::ACCEPT, "application/json")
            .header(header::CACHE_CONTROL, "no-cache")
            .header("X-Requested-With", "XMLHttpRequest")
            .multipart(form)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteGateway for HapiClient {
    #[instrument(level = "debug", skip_all, fields(user = %user))]
    async fn login(&self, user: &str, secret: &SecretString) -> GatewayResult<LoginInfo> {
        let body = LoginRequest {
            user_name: user,
            password: secret.expose_secret(),
        };
        let request = self.http.post(format!("{}/route/hapi/login", self.base)).json(&body);
        let reply: LoginResponse = decode(self.send(request).await?).await?;

        match reply {
            LoginResponse {
                success: true,
                token: Some(token),
                user_sid,
                user_display_name,
                ..
            } => {
                *self.token.write() = Some(SecretString::from(token.clone()));
                debug!("gatekeeper login accepted");
                Ok(LoginInfo {
                    token: SecretString::from(token),
                    user_id: user_sid.unwrap_or_default(),
                    display_name: user_display_name.unwrap_or_else(|| user.to_string()),
                })
            }
            LoginResponse { error, .. } => {
                *self.token.write() = None;
                Err(GatewayError::Authentication(
                    error.unwrap_or_else(|| "login rejected".to_string()),
                ))
            }
        }
    }

    async fn list(
        &self,
        scope: &Scope,
        identifier: &str,
        filters: &[ListFilter],
        max_depth: u32,
    ) -> GatewayResult<Vec<RemoteItem>> {
        let body = FolderEnumRequest {
            file_identifier: identifier,
            filters: filters.iter().map(WireFilter::from).collect(),
            max_levels: Some(max_depth.to_string()),
        };
        let request = self
            .http
            .post(self.route(scope, "GetFilesAndFolders"))
            .json(&body);

        match self.send(request).await {
            Ok(response) => {
                let listing: FolderEnumResponse = decode(response).await?;
                Ok(listing.items.into_iter().map(RemoteItem::from).collect())
            }
            // An offline agent answers with an error status; show it as empty.
            Err(GatewayError::Status(status)) if matches!(scope, Scope::Agent(_)) => {
                warn!(%scope, status, "agent listing failed, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn list_agents(&self) -> GatewayResult<Vec<AgentInfo>> {
        let body = FolderEnumRequest {
            file_identifier: "",
            filters: vec![WireFilter::from(&ROSTER_FILTER)],
            max_levels: None,
        };
        let request = self
            .http
            .post(format!("{}/api/Configuration/GetAllComputers", self.base))
            .json(&body);
        let computers: Vec<WireComputer> = decode(self.send(request).await?).await?;
        Ok(computers.into_iter().map(AgentInfo::from).collect())
    }

    async fn read_range(
        &self,
        scope: &Scope,
        identifier: &str,
        start: u64,
        end: u64,
    ) -> GatewayResult<Bytes> {
        if end <= start {
            return Ok(Bytes::new());
        }
        let request = self
            .http
            .get(self.route(scope, "Download"))
            .query(&[("fileIdentifier", identifier)])
            .header(header::RANGE, format!("bytes={start}-{}", end - 1));

        self.send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn write_range(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> GatewayResult<()> {
        trace!(%scope, identifier, name, offset, len = data.len(), "upload");
        let form = Form::new()
            .text("fileidentifier", identifier.to_string())
            .text("chunk", "-1")
            .text("chunkStart", offset.to_string())
            .part("file", Part::bytes(data.to_vec()).file_name(name.to_string()));
        self.send(self.upload(scope, form)).await.map(drop)
    }

    async fn truncate(
        &self,
        scope: &Scope,
        identifier: &str,
        name: &str,
        length: u64,
    ) -> GatewayResult<()> {
        let form = Form::new()
            .text("fileidentifier", identifier.to_string())
            .text("chunk", "-1")
            .text("totalLength", length.to_string())
            .text("truncate", "true")
            .part("file", Part::bytes(Vec::new()).file_name(name.to_string()));
        self.send(self.upload(scope, form)).await.map(drop)
    }

    async fn delete(&self, scope: &Scope, identifier: &str) -> GatewayResult<()> {
        let body = DeleteRequest {
            file_identifiers: [identifier],
        };
        let request = self.http.post(self.route(scope, "DeleteFiles")).json(&body);
        self.send(request).await.map(drop)
    }

    async fn rename(&self, scope: &Scope, source: &str, target: &str) -> GatewayResult<()> {
        let body = RenameRequest {
            file_identifier: source,
            new_name: target,
        };
        let request = self.http.post(self.route(scope, "RenameFile")).json(&body);
        self.send(request).await.map(drop)
    }

    async fn copy(
        &self,
        scope: &Scope,
        source: &str,
        target: &str,
        is_directory: bool,
    ) -> GatewayResult<()> {
        let body = CopyRequest::overwrite(scope.to_string(), source, target, is_directory);
        let request = self.http.post(self.route(scope, "CopyFiles")).json(&body);
        self.send(request).await.map(drop)
    }
}

/// Builds a [`HapiClient`] per gatekeeper URL.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: GatewayConfig,
}

impl HttpConnector {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }
}

impl GatewayConnector for HttpConnector {
    fn connect(&self, gatekeeper_url: &str) -> GatewayResult<Arc<dyn RemoteGateway>> {
        let client = HapiClient::new(gatekeeper_url, &self.config)?;
        debug!(gatekeeper = client.gatekeeper(), "gateway client created");
        Ok(Arc::new(client))
    }
}
