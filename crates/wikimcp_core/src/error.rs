use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Local pre-flight failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required parameter: {0}")]
    MissingRequired(String),
    #[error("conflicting parameters: {} cannot be used together", .0.join(", "))]
    ConflictingParameters(Vec<String>),
    #[error("invalid section identifier: {0:?}")]
    InvalidSection(String),
    #[error("invalid value {value:?} for {name} (expected {})", .allowed.join("|"))]
    InvalidEnumValue {
        name: String,
        value: String,
        allowed: Vec<&'static str>,
    },
    #[error("invalid type for {name}: expected {expected}")]
    InvalidType { name: String, expected: &'static str },
}

impl ValidationError {
    pub(crate) fn missing_one_of(names: &[&str]) -> Self {
        if names.len() == 1 {
            return Self::MissingRequired(names[0].to_string());
        }
        Self::MissingRequired(format!("one of {}", names.join(", ")))
    }

    pub(crate) fn conflicting(names: &[&str]) -> Self {
        Self::ConflictingParameters(names.iter().map(ToString::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),
    #[error("login rejected: {0}")]
    LoginRejected(String),
    #[error("token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),
}

/// Failures below the MediaWiki envelope. The only retryable kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("MediaWiki API unreachable: {0}")]
    Unreachable(String),
    #[error("malformed MediaWiki API response: {0}")]
    MalformedResponse(String),
}

/// Semantic rejection reported by the remote wiki.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("MediaWiki API error [{code}]: {info}")]
    Remote { code: String, info: String },
    #[error("warnings promoted to errors: {0}")]
    WarningsPromoted(String),
    #[error("unexpected response shape: {0}")]
    UnexpectedResponseShape(String),
}

const SESSION_FAILURE_CODES: &[&str] = &[
    "assertuserfailed",
    "assertbotfailed",
    "notloggedin",
    "readapidenied",
];

impl ApiError {
    pub fn remote(code: impl Into<String>, info: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            info: info.into(),
        }
    }

    pub(crate) fn shape(detail: impl Into<String>) -> Self {
        Self::UnexpectedResponseShape(detail.into())
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Remote { code, .. } => code,
            Self::WarningsPromoted(_) => "warningspromoted",
            Self::UnexpectedResponseShape(_) => "unexpectedresponseshape",
        }
    }

    pub fn is_bad_token(&self) -> bool {
        matches!(self, Self::Remote { code, .. } if code == "badtoken")
    }

    /// The session cookie itself was rejected; a fresh login is needed.
    pub fn is_session_failure(&self) -> bool {
        matches!(self, Self::Remote { code, .. } if SESSION_FAILURE_CODES.contains(&code.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("ConfigError: {0}")]
    Config(String),
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),
    #[error("AuthError: {0}")]
    Auth(#[from] AuthError),
    #[error("TransportError: {0}")]
    Transport(#[from] TransportError),
    #[error("ApiError: {0}")]
    Api(#[from] ApiError),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Validation(_) => "ValidationError",
            Self::Auth(_) => "AuthError",
            Self::Transport(_) => "TransportError",
            Self::Api(_) => "ApiError",
        }
    }

    /// Retry policy belongs to the caller; only unreachable transports qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Unreachable(_)))
    }
}
