//! OAuth credentials for the Drive API.
//!
//! Three pieces cooperate:
//! - [`CredentialStore`] persists the authorized-user credential (token file)
//! - [`Authorizer`] refreshes a credential or runs the interactive flow
//! - [`ensure_valid_credential`] decides which of the two is needed
//!
//! [`TokenSource`] caches the current credential and runs the same routine
//! whenever the cached access token has expired, so long transfers survive
//! token expiry without a second copy of the re-authorization logic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Default Google OAuth authorization endpoint.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Default Google OAuth token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Full Drive access, needed to trash files the app did not create.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// How long a loopback connection may sit idle before it is dropped.
const REDIRECT_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

/// An authorized-user credential, stored as JSON in the token file.
///
/// Field names match the token files written by Google's own client
/// libraries, so an existing `token.json` can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Current access token.
    #[serde(default)]
    pub token: Option<String>,
    /// Long-lived refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token endpoint used for refreshes.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Access token expiry (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Returns true if the access token is present and not about to expire.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some()
            && self
                .expiry
                .is_none_or(|expiry| now + Duration::seconds(EXPIRY_SKEW_SECS) < expiry)
    }

    /// Returns true if the credential carries a refresh token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

// =============================================================================
// Client secrets
// =============================================================================

/// OAuth client registration, loaded from the client secrets file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client secrets document (`{"installed": {...}}` or `{"web": {...}}`).
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let file: SecretsFile =
            serde_json::from_str(content).map_err(|e| Error::ClientSecrets {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        file.installed.or(file.web).ok_or_else(|| Error::ClientSecrets {
            path: path.to_path_buf(),
            message: "expected an \"installed\" or \"web\" section".to_string(),
        })
    }

    /// Load a client secrets file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::ClientSecrets {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content, path)
    }
}

// =============================================================================
// Credential store
// =============================================================================

/// Persistence for the authorized-user credential.
pub trait CredentialStore: Send + Sync {
    /// Load the stored credential, `None` if nothing is stored.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persist a credential, replacing any previous one.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the stored credential. Returns true if something was removed.
    fn clear(&self) -> Result<bool>;
}

/// Credential store backed by a JSON token file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store for the given token file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let credential = serde_json::from_str(&content)?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(credential)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;

        // An existing file keeps its mode on open; tighten it before writing.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::io(&self.path, e))?;
        }

        file.write_all(content.as_bytes())
            .map_err(|e| Error::io(&self.path, e))?;

        log::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(true)
    }
}

// =============================================================================
// Authorizer
// =============================================================================

/// Produces fresh credentials.
pub trait Authorizer: Send + Sync {
    /// Exchange the refresh token for a new access token.
    fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Run the interactive authorization flow from scratch.
    fn authorize(&self) -> Result<Credential>;
}

/// Callback that shows the authorization URL to the user.
pub type PromptFn = Box<dyn Fn(&str) + Send + Sync>;

/// Where the OAuth client registration comes from.
enum SecretsSource {
    Loaded(ClientSecrets),
    /// Read on first use, so a valid token works without the secrets file.
    File(PathBuf),
}

/// Installed-app OAuth flow with a loopback redirect.
pub struct OAuthAuthorizer {
    agent: ureq::Agent,
    secrets: SecretsSource,
    scopes: Vec<String>,
    prompt: PromptFn,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl OAuthAuthorizer {
    /// Create an authorizer for the given client and scopes.
    pub fn new(secrets: ClientSecrets, scopes: Vec<String>) -> Self {
        Self::with_source(SecretsSource::Loaded(secrets), scopes)
    }

    /// Create an authorizer that reads the client secrets file when needed.
    pub fn from_file(path: impl Into<PathBuf>, scopes: Vec<String>) -> Self {
        Self::with_source(SecretsSource::File(path.into()), scopes)
    }

    fn with_source(secrets: SecretsSource, scopes: Vec<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            secrets,
            scopes,
            prompt: Box::new(|url| {
                eprintln!("Open this URL in your browser to authorize access:\n\n  {url}\n");
            }),
        }
    }

    /// Replace the callback that presents the authorization URL.
    pub fn with_prompt(mut self, prompt: PromptFn) -> Self {
        self.prompt = prompt;
        self
    }

    fn secrets(&self) -> Result<ClientSecrets> {
        match &self.secrets {
            SecretsSource::Loaded(secrets) => Ok(secrets.clone()),
            SecretsSource::File(path) => ClientSecrets::load(path),
        }
    }

    /// Build the consent URL for a given redirect URI.
    fn authorization_url(&self, secrets: &ClientSecrets, redirect_uri: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&access_type=offline&prompt=consent",
            secrets.auth_uri,
            urlencoding::encode(&secrets.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
        )
    }

    /// Serve the loopback listener until a request carries `code` or `error`.
    ///
    /// Idle connections (browser preconnects) time out after `read_timeout`
    /// and unrelated paths such as `/favicon.ico` get a 404.
    fn receive_code(listener: &TcpListener, read_timeout: std::time::Duration) -> Result<String> {
        loop {
            let (stream, peer) = listener.accept()?;
            match Self::answer_redirect(stream, read_timeout) {
                Ok(Some(result)) => return result,
                Ok(None) => log::debug!("Ignored loopback request from {}", peer),
                Err(e) => log::debug!("Dropped loopback connection from {}: {}", peer, e),
            }
        }
    }

    fn answer_redirect(
        mut stream: TcpStream,
        read_timeout: std::time::Duration,
    ) -> io::Result<Option<Result<String>>> {
        stream.set_read_timeout(Some(read_timeout))?;

        let mut request_line = String::new();
        BufReader::new(&stream).read_line(&mut request_line)?;

        let (status, body, result) = match parse_redirect(&request_line) {
            Redirect::Code(code) => (
                "200 OK",
                "Authorization complete. You may close this window.",
                Some(Ok(code)),
            ),
            Redirect::Denied(reason) => (
                "200 OK",
                "Authorization failed. Return to the terminal for details.",
                Some(Err(Error::Auth(format!("authorization denied: {reason}")))),
            ),
            Redirect::Other => ("404 Not Found", "Not found", None),
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if let Err(e) = stream.write_all(response.as_bytes()) {
            log::debug!("Could not answer the OAuth redirect: {}", e);
        }

        Ok(result)
    }
}

/// Fold a token endpoint response into a credential.
fn apply_token_response(mut credential: Credential, response: TokenResponse) -> Credential {
    credential.token = Some(response.access_token);
    if let Some(refresh_token) = response.refresh_token {
        credential.refresh_token = Some(refresh_token);
    }
    if let Some(scope) = response.scope {
        credential.scopes = scope.split_whitespace().map(str::to_string).collect();
    }
    credential.expiry = response
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs));
    credential
}

impl Authorizer for OAuthAuthorizer {
    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("credential has no refresh token".to_string()))?;

        log::info!("Refreshing access token");
        let response: TokenResponse = self
            .agent
            .post(&credential.token_uri)
            .send_form([
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
            ])
            .map_err(|e| Error::Auth(format!("token refresh failed: {e}")))?
            .body_mut()
            .read_json()?;

        Ok(apply_token_response(credential.clone(), response))
    }

    fn authorize(&self) -> Result<Credential> {
        let secrets = self.secrets()?;
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}/");

        (self.prompt)(&self.authorization_url(&secrets, &redirect_uri));
        let code = Self::receive_code(&listener, REDIRECT_READ_TIMEOUT)?;

        let response: TokenResponse = self
            .agent
            .post(&secrets.token_uri)
            .send_form([
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
            ])
            .map_err(|e| Error::Auth(format!("code exchange failed: {e}")))?
            .body_mut()
            .read_json()?;

        let template = Credential {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri,
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            scopes: self.scopes.clone(),
            expiry: None,
        };
        Ok(apply_token_response(template, response))
    }
}

/// What a request to the loopback listener carried.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    Denied(String),
    /// Anything else: favicon, malformed or empty request.
    Other,
}

/// Classify an HTTP request line received on the loopback listener.
fn parse_redirect(request_line: &str) -> Redirect {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Redirect::Other;
    };
    let Ok(url) = url::Url::parse("http://localhost/").and_then(|base| base.join(target)) else {
        return Redirect::Other;
    };

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => return Redirect::Denied(value.into_owned()),
            _ => {}
        }
    }

    code.map_or(Redirect::Other, Redirect::Code)
}

// =============================================================================
// Credential validation
// =============================================================================

/// Return a valid credential, refreshing or re-authorizing as needed.
///
/// Order: stored and valid → refresh (if a refresh token exists) →
/// interactive flow. Any new credential is saved before returning. A
/// failed refresh falls through to the interactive flow; a failed
/// interactive flow is returned as an error.
pub fn ensure_valid_credential(
    store: &dyn CredentialStore,
    authorizer: &dyn Authorizer,
    now: DateTime<Utc>,
) -> Result<Credential> {
    let existing = match store.load() {
        Ok(credential) => credential,
        Err(e) => {
            log::warn!("Ignoring unreadable token file: {}", e);
            None
        }
    };

    if let Some(credential) = &existing {
        if credential.is_valid(now) {
            return Ok(credential.clone());
        }
    }

    let fresh = match existing {
        Some(credential) if credential.can_refresh() => match authorizer.refresh(&credential) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                log::warn!("Token refresh failed ({}); re-authorization required", e);
                authorizer.authorize()?
            }
        },
        _ => {
            log::warn!("Credentials are missing or expired; re-authorization required");
            authorizer.authorize()?
        }
    };

    store.save(&fresh)?;
    Ok(fresh)
}

/// Run the interactive flow unconditionally and persist the result.
pub fn reauthorize(store: &dyn CredentialStore, authorizer: &dyn Authorizer) -> Result<Credential> {
    let credential = authorizer.authorize()?;
    store.save(&credential)?;
    Ok(credential)
}

/// Hands out access tokens, re-validating the credential when it expires.
pub struct TokenSource {
    store: Box<dyn CredentialStore>,
    authorizer: Box<dyn Authorizer>,
    current: Mutex<Option<Credential>>,
}

impl TokenSource {
    /// Create a token source over a store and an authorizer.
    pub fn new(store: Box<dyn CredentialStore>, authorizer: Box<dyn Authorizer>) -> Self {
        Self {
            store,
            authorizer,
            current: Mutex::new(None),
        }
    }

    /// Current valid credential.
    pub fn credential(&self) -> Result<Credential> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| Error::Other("credential cache lock poisoned".to_string()))?;

        let now = Utc::now();
        if let Some(credential) = current.as_ref().filter(|c| c.is_valid(now)) {
            return Ok(credential.clone());
        }

        let credential =
            ensure_valid_credential(self.store.as_ref(), self.authorizer.as_ref(), now)?;
        *current = Some(credential.clone());
        Ok(credential)
    }

    /// Current access token.
    pub fn access_token(&self) -> Result<String> {
        self.credential()?
            .token
            .ok_or_else(|| Error::Auth("credential has no access token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn credential(token: Option<&str>, refresh: Option<&str>, expiry: Option<DateTime<Utc>>) -> Credential {
        Credential {
            token: token.map(str::to_string),
            refresh_token: refresh.map(str::to_string),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![DRIVE_SCOPE.to_string()],
            expiry,
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        stored: Mutex<Option<Credential>>,
        saves: AtomicUsize,
    }

    impl CredentialStore for MemoryStore {
        fn load(&self) -> Result<Option<Credential>> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn save(&self, credential: &Credential) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.stored.lock().unwrap() = Some(credential.clone());
            Ok(())
        }

        fn clear(&self) -> Result<bool> {
            Ok(self.stored.lock().unwrap().take().is_some())
        }
    }

    #[derive(Default)]
    struct FakeAuthorizer {
        refreshes: AtomicUsize,
        authorizations: AtomicUsize,
        fail_refresh: bool,
    }

    impl Authorizer for FakeAuthorizer {
        fn refresh(&self, credential: &Credential) -> Result<Credential> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(Error::Auth("invalid_grant".to_string()));
            }
            let mut refreshed = credential.clone();
            refreshed.token = Some("refreshed".to_string());
            refreshed.expiry = Some(Utc::now() + Duration::hours(1));
            Ok(refreshed)
        }

        fn authorize(&self) -> Result<Credential> {
            self.authorizations.fetch_add(1, Ordering::SeqCst);
            Ok(credential(
                Some("interactive"),
                Some("new-refresh"),
                Some(Utc::now() + Duration::hours(1)),
            ))
        }
    }

    #[test]
    fn test_credential_validity() {
        let now = Utc::now();
        assert!(credential(Some("t"), None, None).is_valid(now));
        assert!(credential(Some("t"), None, Some(now + Duration::hours(1))).is_valid(now));
        assert!(!credential(Some("t"), None, Some(now - Duration::hours(1))).is_valid(now));
        // Within the skew window counts as expired
        assert!(!credential(Some("t"), None, Some(now + Duration::seconds(10))).is_valid(now));
        assert!(!credential(None, Some("r"), None).is_valid(now));
    }

    #[test]
    fn test_ensure_returns_valid_stored_credential() {
        let store = MemoryStore::default();
        let stored = credential(Some("stored"), Some("r"), Some(Utc::now() + Duration::hours(1)));
        *store.stored.lock().unwrap() = Some(stored.clone());
        let authorizer = FakeAuthorizer::default();

        let result = ensure_valid_credential(&store, &authorizer, Utc::now()).unwrap();
        assert_eq!(result, stored);
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ensure_refreshes_expired_credential() {
        let store = MemoryStore::default();
        *store.stored.lock().unwrap() = Some(credential(
            Some("old"),
            Some("r"),
            Some(Utc::now() - Duration::minutes(5)),
        ));
        let authorizer = FakeAuthorizer::default();

        let result = ensure_valid_credential(&store, &authorizer, Utc::now()).unwrap();
        assert_eq!(result.token.as_deref(), Some("refreshed"));
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ensure_authorizes_without_refresh_token() {
        let store = MemoryStore::default();
        *store.stored.lock().unwrap() = Some(credential(
            Some("old"),
            None,
            Some(Utc::now() - Duration::minutes(5)),
        ));
        let authorizer = FakeAuthorizer::default();

        let result = ensure_valid_credential(&store, &authorizer, Utc::now()).unwrap();
        assert_eq!(result.token.as_deref(), Some("interactive"));
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ensure_authorizes_when_nothing_stored() {
        let store = MemoryStore::default();
        let authorizer = FakeAuthorizer::default();

        ensure_valid_credential(&store, &authorizer, Utc::now()).unwrap();
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 1);
        assert!(store.stored.lock().unwrap().is_some());
    }

    #[test]
    fn test_ensure_falls_back_when_refresh_fails() {
        let store = MemoryStore::default();
        *store.stored.lock().unwrap() = Some(credential(
            Some("old"),
            Some("revoked"),
            Some(Utc::now() - Duration::minutes(5)),
        ));
        let authorizer = FakeAuthorizer {
            fail_refresh: true,
            ..Default::default()
        };

        let result = ensure_valid_credential(&store, &authorizer, Utc::now()).unwrap();
        assert_eq!(result.token.as_deref(), Some("interactive"));
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reauthorize_always_runs_flow() {
        let store = MemoryStore::default();
        *store.stored.lock().unwrap() =
            Some(credential(Some("fine"), Some("r"), Some(Utc::now() + Duration::hours(1))));
        let authorizer = FakeAuthorizer::default();

        let result = reauthorize(&store, &authorizer).unwrap();
        assert_eq!(result.token.as_deref(), Some("interactive"));
        assert_eq!(authorizer.authorizations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_token_source_caches_credential() {
        struct SharedStore(Arc<MemoryStore>);
        impl CredentialStore for SharedStore {
            fn load(&self) -> Result<Option<Credential>> {
                self.0.load()
            }
            fn save(&self, credential: &Credential) -> Result<()> {
                self.0.save(credential)
            }
            fn clear(&self) -> Result<bool> {
                self.0.clear()
            }
        }

        let store = Arc::new(MemoryStore::default());
        let source = TokenSource::new(
            Box::new(SharedStore(Arc::clone(&store))),
            Box::new(FakeAuthorizer::default()),
        );

        assert_eq!(source.access_token().unwrap(), "interactive");
        assert_eq!(source.access_token().unwrap(), "interactive");
        // Authorized once, saved once
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("token.json"));

        assert!(store.load().unwrap().is_none());

        let original = credential(Some("t"), Some("r"), Some(Utc::now() + Duration::hours(1)));
        store.save(&original).unwrap();
        assert_eq!(store.load().unwrap(), Some(original));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_writes_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = FileCredentialStore::new(&path);

        store.save(&credential(Some("t"), None, None)).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        store.save(&credential(Some("t2"), None, None)).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(
            store.load().unwrap().and_then(|c| c.token).as_deref(),
            Some("t2")
        );
    }

    #[test]
    fn test_file_store_reads_google_token_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"token": "ya29.abc", "refresh_token": "1//r", "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "id.apps.googleusercontent.com", "client_secret": "s",
                "scopes": ["https://www.googleapis.com/auth/drive"], "universe_domain": "googleapis.com",
                "account": "", "expiry": "2024-05-01T10:00:00.123456Z"}"#,
        )
        .unwrap();

        let loaded = FileCredentialStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.token.as_deref(), Some("ya29.abc"));
        assert!(loaded.can_refresh());
        assert!(loaded.expiry.is_some());
    }

    #[test]
    fn test_client_secrets_parse() {
        let path = Path::new("auth.json");
        let installed = ClientSecrets::parse(
            r#"{"installed": {"client_id": "id", "client_secret": "s", "redirect_uris": ["http://localhost"]}}"#,
            path,
        )
        .unwrap();
        assert_eq!(installed.client_id, "id");
        assert_eq!(installed.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(installed.auth_uri, DEFAULT_AUTH_URI);

        let web = ClientSecrets::parse(r#"{"web": {"client_id": "w", "client_secret": "s"}}"#, path)
            .unwrap();
        assert_eq!(web.client_id, "w");

        assert!(ClientSecrets::parse("{}", path).is_err());
        assert!(ClientSecrets::parse("not json", path).is_err());
    }

    #[test]
    fn test_parse_redirect() {
        assert_eq!(
            parse_redirect("GET /?code=4%2F0Abc&scope=drive HTTP/1.1\r\n"),
            Redirect::Code("4/0Abc".to_string())
        );
        assert_eq!(
            parse_redirect("GET /?code=a+b HTTP/1.1\r\n"),
            Redirect::Code("a b".to_string())
        );
        assert_eq!(
            parse_redirect("GET /?error=access_denied HTTP/1.1\r\n"),
            Redirect::Denied("access_denied".to_string())
        );
        assert_eq!(parse_redirect("GET /favicon.ico HTTP/1.1\r\n"), Redirect::Other);
        assert_eq!(parse_redirect(""), Redirect::Other);
    }

    /// Send one request to the loopback listener and return the raw response.
    fn send_request(addr: std::net::SocketAddr, request_line: &str) -> String {
        use std::io::Read;

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(format!("{request_line}\r\nHost: localhost\r\n\r\n").as_bytes())
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_receive_code_skips_favicon() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = std::thread::spawn(move || {
            let favicon = send_request(addr, "GET /favicon.ico HTTP/1.1");
            let redirect = send_request(addr, "GET /?code=abc&scope=drive HTTP/1.1");
            (favicon, redirect)
        });

        let code =
            OAuthAuthorizer::receive_code(&listener, std::time::Duration::from_secs(2)).unwrap();
        let (favicon, redirect) = browser.join().unwrap();

        assert_eq!(code, "abc");
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(redirect.starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn test_receive_code_survives_idle_preconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = std::thread::spawn(move || {
            let idle = TcpStream::connect(addr).unwrap();
            let redirect = send_request(addr, "GET /?code=xyz HTTP/1.1");
            drop(idle);
            redirect
        });

        let code =
            OAuthAuthorizer::receive_code(&listener, std::time::Duration::from_millis(200))
                .unwrap();
        assert_eq!(code, "xyz");
        assert!(browser.join().unwrap().starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn test_receive_code_reports_denial() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let browser =
            std::thread::spawn(move || send_request(addr, "GET /?error=access_denied HTTP/1.1"));

        let result = OAuthAuthorizer::receive_code(&listener, std::time::Duration::from_secs(2));
        browser.join().unwrap();
        assert!(matches!(result, Err(Error::Auth(msg)) if msg.contains("access_denied")));
    }

    #[test]
    fn test_apply_token_response() {
        let base = credential(Some("old"), Some("keep-me"), None);

        let refreshed = apply_token_response(
            base.clone(),
            TokenResponse {
                access_token: "new".to_string(),
                expires_in: Some(3599),
                refresh_token: None,
                scope: None,
            },
        );
        assert_eq!(refreshed.token.as_deref(), Some("new"));
        assert_eq!(refreshed.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(refreshed.scopes, base.scopes);
        assert!(refreshed.is_valid(Utc::now()));

        let rotated = apply_token_response(
            base,
            TokenResponse {
                access_token: "new".to_string(),
                expires_in: None,
                refresh_token: Some("rotated".to_string()),
                scope: Some("a b".to_string()),
            },
        );
        assert_eq!(rotated.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(rotated.scopes, vec!["a".to_string(), "b".to_string()]);
        assert!(rotated.expiry.is_none());
    }

    #[test]
    fn test_missing_secrets_file_fails_authorize() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer =
            OAuthAuthorizer::from_file(dir.path().join("auth.json"), vec![DRIVE_SCOPE.to_string()]);
        assert!(matches!(
            authorizer.authorize(),
            Err(Error::ClientSecrets { .. })
        ));
    }

    #[test]
    fn test_authorization_url() {
        let secrets = ClientSecrets {
            client_id: "id 1".to_string(),
            client_secret: "s".to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        let authorizer = OAuthAuthorizer::new(secrets.clone(), vec![DRIVE_SCOPE.to_string()]);
        let url = authorizer.authorization_url(&secrets, "http://localhost:8080/");

        assert!(url.starts_with(DEFAULT_AUTH_URI));
        assert!(url.contains("client_id=id%201"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2F"));
        assert!(url.contains("access_type=offline"));
    }
}
