//! Login and CSRF token lifecycle for one process.
//!
//! The state machine is `Unauthenticated -> LoggingIn -> Authenticated ->
//! TokenCached`. Login and token fetches run under a single async mutex so
//! concurrent callers share one in-flight acquisition; cached reads only
//! take the read half of the state lock. Each fetched token carries a
//! generation number, and invalidation is keyed on it, so a token rejected
//! by several callers at once is refetched exactly once.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{Credentials, ENV_PASSWORD, ENV_USERNAME};
use crate::envelope::ApiEnvelope;
use crate::error::{AuthError, TransportError};
use crate::executor::Executor;
use crate::params::ParamsBuilder;
use crate::transport::HttpMethod;

/// Token MediaWiki hands to logged-out clients.
const ANONYMOUS_TOKEN: &str = "+\\";
const TOKEN_FETCH_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Unauthenticated,
    LoggingIn,
    Authenticated,
    TokenCached,
}

impl AuthPhase {
    pub fn is_logged_in(self) -> bool {
        matches!(self, Self::Authenticated | Self::TokenCached)
    }
}

/// Which credential the remote rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The CSRF token is stale; the session is still good.
    Token,
    /// The session cookie is gone; log in again.
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    value: String,
    generation: u64,
}

impl CsrfToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct SessionState {
    phase: AuthPhase,
    csrf: Option<String>,
    generation: u64,
}

pub struct Session {
    executor: Executor,
    credentials: Option<Credentials>,
    acquire: Mutex<()>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(executor: Executor, credentials: Option<Credentials>) -> Self {
        Self {
            executor,
            credentials,
            acquire: Mutex::new(()),
            state: RwLock::new(SessionState {
                phase: AuthPhase::Unauthenticated,
                csrf: None,
                generation: 0,
            }),
        }
    }

    pub async fn phase(&self) -> AuthPhase {
        self.state.read().await.phase
    }

    /// Log in unless a session is already established. A caller arriving
    /// while another caller's login is in flight waits for its outcome.
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        if self.phase().await.is_logged_in() {
            return Ok(());
        }
        let _guard = self.acquire.lock().await;
        if self.phase().await.is_logged_in() {
            return Ok(());
        }
        self.login().await
    }

    /// The cached CSRF token, logging in and fetching one first if needed.
    pub async fn csrf_token(&self) -> Result<CsrfToken, AuthError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }
        let _guard = self.acquire.lock().await;
        // Another caller may have finished the acquisition while we waited.
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }
        if self.phase().await == AuthPhase::Unauthenticated {
            self.login().await?;
        }

        let value = self.fetch_csrf_token().await?;
        let mut state = self.state.write().await;
        state.generation += 1;
        state.csrf = Some(value.clone());
        state.phase = AuthPhase::TokenCached;
        info!(generation = state.generation, "acquired MediaWiki CSRF token");
        Ok(CsrfToken {
            value,
            generation: state.generation,
        })
    }

    /// Drop `stale` if it is still the cached token. Returns `false` when a
    /// concurrent caller already invalidated or replaced it.
    ///
    /// A session rejection still upgrades an earlier token rejection of the
    /// same generation whose refetch has not happened yet, so the pending
    /// reacquisition logs in again first.
    pub async fn invalidate(&self, stale: &CsrfToken, rejection: Rejection) -> bool {
        let mut state = self.state.write().await;
        if state.generation != stale.generation {
            return false;
        }
        if state.csrf.is_none() {
            let upgrade =
                rejection == Rejection::Session && state.phase == AuthPhase::Authenticated;
            if upgrade {
                state.phase = AuthPhase::Unauthenticated;
                warn!(
                    generation = stale.generation,
                    "MediaWiki session rejected while token refetch was pending"
                );
            }
            return upgrade;
        }
        state.csrf = None;
        state.phase = match rejection {
            Rejection::Token => AuthPhase::Authenticated,
            Rejection::Session => AuthPhase::Unauthenticated,
        };
        warn!(
            generation = stale.generation,
            ?rejection,
            "MediaWiki rejected cached credentials"
        );
        true
    }

    async fn cached_token(&self) -> Option<CsrfToken> {
        let state = self.state.read().await;
        state.csrf.as_ref().map(|value| CsrfToken {
            value: value.clone(),
            generation: state.generation,
        })
    }

    async fn set_phase(&self, phase: AuthPhase) {
        self.state.write().await.phase = phase;
    }

    // Caller holds `acquire`.
    async fn login(&self) -> Result<(), AuthError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            AuthError::MissingCredentials(format!("{ENV_USERNAME}/{ENV_PASSWORD}"))
        })?;
        self.set_phase(AuthPhase::LoggingIn).await;
        let outcome = self.perform_login(credentials).await;

        let mut state = self.state.write().await;
        state.csrf = None;
        state.phase = match outcome {
            Ok(()) => AuthPhase::Authenticated,
            Err(_) => AuthPhase::Unauthenticated,
        };
        outcome
    }

    async fn perform_login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let login_token = self.fetch_token("login").await?;

        let mut builder = ParamsBuilder::action("login");
        builder
            .set("lgname", credentials.username.as_str())
            .set("lgpassword", credentials.password.as_str());
        let envelope = self
            .executor
            .execute(
                HttpMethod::Post,
                &builder.build(),
                &[("lgtoken", login_token.as_str())],
            )
            .await
            .map_err(|error| {
                AuthError::TokenAcquisitionFailed(format!("login request failed: {error}"))
            })?;
        if let Some(error) = envelope.error() {
            return Err(AuthError::LoginRejected(format!(
                "[{}] {}",
                error.code, error.info
            )));
        }

        let login = envelope.body().get("login");
        let result = login
            .and_then(|login| login.get("result"))
            .and_then(Value::as_str);
        match result {
            Some("Success") => {
                info!(username = %credentials.username, "logged in to MediaWiki");
                Ok(())
            }
            other => Err(AuthError::LoginRejected(
                login
                    .and_then(|login| login.get("reason"))
                    .and_then(reason_text)
                    .or_else(|| other.map(ToString::to_string))
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }

    async fn fetch_csrf_token(&self) -> Result<String, AuthError> {
        let token = self.fetch_token("csrf").await?;
        if token == ANONYMOUS_TOKEN {
            return Err(AuthError::LoginRejected(
                "session is not logged in (received anonymous token)".to_string(),
            ));
        }
        Ok(token)
    }

    async fn fetch_token(&self, kind: &str) -> Result<String, AuthError> {
        let mut builder = ParamsBuilder::action("query");
        builder.set("meta", "tokens").set("type", kind);
        let params = builder.build();

        let mut last_error = None;
        for _ in 0..TOKEN_FETCH_ATTEMPTS {
            match self.executor.execute(HttpMethod::Get, &params, &[]).await {
                Ok(envelope) => return extract_token(&envelope, kind),
                Err(error @ TransportError::Unreachable(_)) => last_error = Some(error),
                Err(error) => {
                    return Err(AuthError::TokenAcquisitionFailed(format!(
                        "{kind} token: {error}"
                    )));
                }
            }
        }
        Err(AuthError::TokenAcquisitionFailed(format!(
            "{kind} token: {}",
            last_error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "no attempt made".to_string())
        )))
    }
}

fn extract_token(envelope: &ApiEnvelope, kind: &str) -> Result<String, AuthError> {
    if let Some(error) = envelope.error() {
        return Err(AuthError::TokenAcquisitionFailed(format!(
            "{kind} token: [{}] {}",
            error.code, error.info
        )));
    }
    envelope
        .body()
        .get("query")
        .and_then(|query| query.get("tokens"))
        .and_then(|tokens| tokens.get(format!("{kind}token")))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            AuthError::TokenAcquisitionFailed(format!("{kind} token missing from response"))
        })
}

fn reason_text(reason: &Value) -> Option<String> {
    match reason {
        Value::String(text) => Some(text.clone()),
        // errorformat other than bc nests the message.
        Value::Object(_) => reason
            .get("text")
            .or_else(|| reason.get("*"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::testing::{MockWiki, test_credentials};

    fn session_for(wiki: &Arc<MockWiki>) -> Session {
        Session::new(Executor::new(wiki.clone()), Some(test_credentials()))
    }

    #[tokio::test]
    async fn csrf_token_logs_in_then_caches() {
        let wiki = MockWiki::new();
        let session = session_for(&wiki);
        assert_eq!(session.phase().await, AuthPhase::Unauthenticated);

        let first = session.csrf_token().await.expect("token");
        let second = session.csrf_token().await.expect("token");
        assert_eq!(first, second);
        assert_eq!(session.phase().await, AuthPhase::TokenCached);
        assert_eq!(wiki.login_count(), 1);
        assert_eq!(wiki.csrf_fetch_count(), 1);

        let login = wiki
            .requests()
            .into_iter()
            .find(|request| request.param("action") == Some("login"))
            .expect("login request");
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.param("lgname"), Some("Bot@tool"));
        assert_eq!(login.param("lgtoken"), Some("login-token+\\"));
    }

    #[tokio::test]
    async fn missing_credentials_make_no_requests() {
        let wiki = MockWiki::new();
        let session = Session::new(Executor::new(wiki.clone()), None);
        let error = session.csrf_token().await.expect_err("must fail");
        assert!(matches!(error, AuthError::MissingCredentials(_)));
        assert!(wiki.requests().is_empty());
    }

    #[tokio::test]
    async fn rejected_login_returns_to_unauthenticated() {
        let wiki = MockWiki::new();
        wiki.reject_login("Incorrect username or password entered.");
        let session = session_for(&wiki);
        let error = session.ensure_authenticated().await.expect_err("rejected");
        assert_eq!(
            error,
            AuthError::LoginRejected("Incorrect username or password entered.".to_string())
        );
        assert_eq!(session.phase().await, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn token_invalidation_keeps_session_session_invalidation_drops_it() {
        let wiki = MockWiki::new();
        let session = session_for(&wiki);

        let token = session.csrf_token().await.expect("token");
        assert!(session.invalidate(&token, Rejection::Token).await);
        assert_eq!(session.phase().await, AuthPhase::Authenticated);
        // A second invalidation of the same generation is a no-op.
        assert!(!session.invalidate(&token, Rejection::Token).await);

        let fresh = session.csrf_token().await.expect("token");
        assert_eq!(fresh.generation(), token.generation() + 1);
        assert_eq!(wiki.login_count(), 1);

        assert!(session.invalidate(&fresh, Rejection::Session).await);
        assert_eq!(session.phase().await, AuthPhase::Unauthenticated);
        session.csrf_token().await.expect("token");
        assert_eq!(wiki.login_count(), 2);
        assert_eq!(wiki.csrf_fetch_count(), 3);
    }

    #[tokio::test]
    async fn session_rejection_upgrades_pending_token_rejection() {
        let wiki = MockWiki::new();
        let session = session_for(&wiki);

        let token = session.csrf_token().await.expect("token");
        assert!(session.invalidate(&token, Rejection::Token).await);
        assert!(session.invalidate(&token, Rejection::Session).await);
        assert_eq!(session.phase().await, AuthPhase::Unauthenticated);
        // Further rejections of the same generation change nothing.
        assert!(!session.invalidate(&token, Rejection::Session).await);

        session.csrf_token().await.expect("token");
        assert_eq!(wiki.login_count(), 2);
    }

    #[tokio::test]
    async fn caller_waits_for_login_in_flight() {
        let wiki = MockWiki::with_latency(50);
        wiki.reject_login("Incorrect username or password entered.");
        let session = Arc::new(session_for(&wiki));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ensure_authenticated().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(session.phase().await, AuthPhase::LoggingIn);

        let second = session.ensure_authenticated().await;
        assert!(matches!(second, Err(AuthError::LoginRejected(_))));
        assert!(matches!(
            first.await.expect("join"),
            Err(AuthError::LoginRejected(_))
        ));
        assert_eq!(wiki.login_count(), 2);
    }

    #[tokio::test]
    async fn caller_during_login_sees_the_established_session() {
        let wiki = MockWiki::with_latency(50);
        let session = Arc::new(session_for(&wiki));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ensure_authenticated().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        session.ensure_authenticated().await.expect("login");
        assert_eq!(session.phase().await, AuthPhase::Authenticated);
        assert_eq!(wiki.login_count(), 1);
        first.await.expect("join").expect("login");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_login() {
        let wiki = MockWiki::with_latency(20);
        let session = Arc::new(session_for(&wiki));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move { session.csrf_token().await }));
        }
        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.expect("join").expect("token"));
        }

        assert!(tokens.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(wiki.login_count(), 1);
        assert_eq!(wiki.csrf_fetch_count(), 1);
    }

    #[tokio::test]
    async fn anonymous_csrf_token_is_a_login_failure() {
        let wiki = MockWiki::new();
        wiki.set_csrf_token(ANONYMOUS_TOKEN);
        let session = session_for(&wiki);
        let error = session.csrf_token().await.expect_err("anonymous");
        assert!(matches!(error, AuthError::LoginRejected(_)));
    }

    #[tokio::test]
    async fn token_fetch_is_retried_once_on_transport_failure() {
        let wiki = MockWiki::new();
        wiki.fail_token_fetches(1);
        let session = session_for(&wiki);
        session.csrf_token().await.expect("second attempt succeeds");

        let wiki = MockWiki::new();
        wiki.fail_token_fetches(2);
        let session = session_for(&wiki);
        let error = session.csrf_token().await.expect_err("both attempts fail");
        assert!(matches!(error, AuthError::TokenAcquisitionFailed(_)));
    }

    #[test]
    fn extract_token_reports_error_envelope() {
        let envelope = ApiEnvelope::from_value(json!({
            "error": {"code": "readapidenied", "info": "You need read permission."}
        }));
        assert_eq!(
            extract_token(&envelope, "csrf"),
            Err(AuthError::TokenAcquisitionFailed(
                "csrf token: [readapidenied] You need read permission.".to_string()
            ))
        );
    }
}
