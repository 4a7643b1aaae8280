use std::sync::Arc;

use tracing::warn;

use crate::config::{ClientConfig, Credentials};
use crate::envelope::{Accepted, classify};
use crate::error::{ApiError, Result};
use crate::executor::Executor;
use crate::params::NormalizedParameters;
use crate::session::{Rejection, Session};
use crate::transport::{Endpoint, HttpMethod, HttpTransport, RawResponse, Transport};

/// Entry point shared by every operation handler. Cheap to clone; clones
/// share one transport (and so one cookie jar) and one [`Session`].
#[derive(Clone)]
pub struct WikiClient {
    executor: Executor,
    session: Arc<Session>,
}

impl WikiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            Some(config.credentials.clone()),
        ))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, credentials: Option<Credentials>) -> Self {
        let executor = Executor::new(transport);
        let session = Arc::new(Session::new(executor.clone(), credentials));
        Self { executor, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Read-only call: GET, no authentication.
    pub async fn read(
        &self,
        params: &NormalizedParameters,
        warnings_as_error: bool,
    ) -> Result<Accepted> {
        self.read_with(HttpMethod::Get, params, warnings_as_error)
            .await
    }

    /// Read-only call with an explicit method. Reads that carry page-sized
    /// inline content go as a form POST so they fit; no token is attached.
    pub async fn read_with(
        &self,
        method: HttpMethod,
        params: &NormalizedParameters,
        warnings_as_error: bool,
    ) -> Result<Accepted> {
        let envelope = self.executor.execute(method, params, &[]).await?;
        Ok(classify(envelope, warnings_as_error)?)
    }

    /// Read-only call whose body is not a JSON envelope (raw wikitext, XML).
    pub async fn read_text(
        &self,
        endpoint: Endpoint,
        params: &NormalizedParameters,
    ) -> Result<RawResponse> {
        Ok(self.executor.execute_text(endpoint, params).await?)
    }

    /// Mutating call: POST with `assert=user` and the session's CSRF token.
    /// A rejected token or session triggers one re-acquisition and one
    /// retry; a second rejection is returned to the caller.
    pub async fn write(
        &self,
        params: &NormalizedParameters,
        warnings_as_error: bool,
    ) -> Result<Accepted> {
        let mut retried = false;
        loop {
            let token = self.session.csrf_token().await?;
            let envelope = self
                .executor
                .execute(
                    HttpMethod::Post,
                    params,
                    &[("assert", "user"), ("token", token.value())],
                )
                .await?;

            match classify(envelope, warnings_as_error) {
                Err(error) if !retried => match rejection_of(&error) {
                    Some(rejection) => {
                        warn!(
                            action = params.get("action").unwrap_or(""),
                            code = error.code(),
                            "retrying after credential rejection"
                        );
                        self.session.invalidate(&token, rejection).await;
                        retried = true;
                    }
                    None => return Err(error.into()),
                },
                outcome => return Ok(outcome?),
            }
        }
    }
}

fn rejection_of(error: &ApiError) -> Option<Rejection> {
    if error.is_bad_token() {
        return Some(Rejection::Token);
    }
    if error.is_session_failure() {
        return Some(Rejection::Session);
    }
    None
}
