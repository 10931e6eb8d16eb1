use jsonwebtoken::{dangerous::insecure_decode, decode_header};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The three role tags the platform hands out inside its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Professor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Professor => "professor",
            Role::Student => "student",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "admin" => Some(Role::Admin),
            "professor" => Some(Role::Professor),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ClaimedRole
///
/// A role read out of the credential's claims payload without any signature check.
/// It is good enough to pick which screens to show; it is never proof of authority.
/// Every privileged action is re-validated by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedRole(Role);

impl ClaimedRole {
    /// The role as claimed. Only use for navigation and rendering decisions.
    pub fn unverified(&self) -> Role {
        self.0
    }
}

/// BearerToken
///
/// The opaque credential returned by the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// claimed_role
    ///
    /// Decodes the claims segment and extracts the role tag. Anything that is not a
    /// three-segment JWT with a JSON payload carrying a known `role` is malformed.
    pub fn claimed_role(&self) -> Result<ClaimedRole, SessionError> {
        let claims = decode_claims(&self.0)?;
        Role::parse(&claims.role)
            .map(ClaimedRole)
            .ok_or(SessionError::UnknownRole(claims.role))
    }
}

// Never print the credential itself.
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Claims
///
/// The subset of the credential payload the front end reads. `exp` is carried but
/// not enforced: the server is the one that rejects stale credentials. NumericDate
/// may be fractional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
}

fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    // Any algorithm is accepted; only the header and payload have to be well formed.
    decode_header(token).map_err(|e| SessionError::Malformed(e.to_string()))?;

    insecure_decode::<Claims>(token)
        .map(|data| data.claims)
        .map_err(|e| SessionError::Malformed(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("credential is malformed: {0}")]
    Malformed(String),
    #[error("credential claims unknown role '{0}'")]
    UnknownRole(String),
    #[error("session storage failed: {0}")]
    Io(#[from] io::Error),
    #[error("session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// SessionStore
///
/// The contract for holding the single session credential. Writes are not validated:
/// a malformed token is stored as-is and simply fails to decode at guard time.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<BearerToken>;
    fn set(&self, token: BearerToken) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// SessionState
///
/// Shared handle to the process-wide session store.
pub type SessionState = Arc<dyn SessionStore>;

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    token: BearerToken,
}

/// FileSessionStore
///
/// Keeps the credential in a small JSON file so it survives restarts, with an
/// in-memory copy for reads.
pub struct FileSessionStore {
    path: PathBuf,
    cached: RwLock<Option<BearerToken>>,
}

impl FileSessionStore {
    /// Opens the store, reading any credential left by a previous run.
    /// A missing or unreadable file means no session.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let cached = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PersistedSession>(&raw) {
                Ok(persisted) => Some(persisted.token),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "ignoring unreadable session file: {}", e);
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read session file: {}", e);
                None
            }
        };

        Self {
            path,
            cached: RwLock::new(cached),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<BearerToken> {
        self.cached.read().clone()
    }

    fn set(&self, token: BearerToken) -> Result<(), SessionError> {
        let raw = serde_json::to_string(&PersistedSession {
            token: token.clone(),
        })?;
        fs::write(&self.path, raw)?;
        *self.cached.write() = Some(token);
        tracing::info!("session stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.cached.write() = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("session cleared");
        Ok(())
    }
}

/// MemorySessionStore
///
/// Non-persistent store for tests and throwaway runs.
#[derive(Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<BearerToken>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: BearerToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<BearerToken> {
        self.token.read().clone()
    }

    fn set(&self, token: BearerToken) -> Result<(), SessionError> {
        *self.token.write() = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.token.write() = None;
        Ok(())
    }
}
