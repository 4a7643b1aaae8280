//! Scripted wiki used by unit tests in place of the HTTP transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::WikiClient;
use crate::config::Credentials;
use crate::error::TransportError;
use crate::transport::{ApiRequest, HttpMethod, RawResponse, Transport};

pub fn test_credentials() -> Credentials {
    Credentials {
        username: "Bot@tool".to_string(),
        password: "bot-password".to_string(),
    }
}

#[derive(Default)]
struct MockState {
    requests: Vec<ApiRequest>,
    responses: VecDeque<Result<RawResponse, TransportError>>,
    login_rejection: Option<String>,
    csrf_override: Option<String>,
    failing_token_fetches: usize,
    logins: usize,
    csrf_fetches: usize,
}

/// Answers login and token requests itself and replays queued responses
/// for everything else, recording every request it sees.
pub struct MockWiki {
    state: Mutex<MockState>,
    latency: Duration,
}

impl MockWiki {
    pub fn new() -> Arc<Self> {
        Self::with_latency(0)
    }

    pub fn with_latency(millis: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            latency: Duration::from_millis(millis),
        })
    }

    pub fn client(self: &Arc<Self>) -> WikiClient {
        WikiClient::with_transport(self.clone(), Some(test_credentials()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state")
    }

    pub fn push_json(&self, body: Value) {
        self.push(Ok(RawResponse::ok(body.to_string())));
    }

    pub fn push(&self, response: Result<RawResponse, TransportError>) {
        self.lock().responses.push_back(response);
    }

    pub fn reject_login(&self, reason: &str) {
        self.lock().login_rejection = Some(reason.to_string());
    }

    pub fn set_csrf_token(&self, token: &str) {
        self.lock().csrf_override = Some(token.to_string());
    }

    pub fn fail_token_fetches(&self, count: usize) {
        self.lock().failing_token_fetches = count;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Requests other than login and token traffic.
    pub fn operation_requests(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| !is_auth_request(request))
            .collect()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.lock()
            .requests
            .last()
            .cloned()
            .expect("at least one request")
    }

    pub fn login_count(&self) -> usize {
        self.lock().logins
    }

    pub fn csrf_fetch_count(&self) -> usize {
        self.lock().csrf_fetches
    }

    fn respond(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let is_token_query =
            request.param("action") == Some("query") && request.param("meta") == Some("tokens");
        if is_token_query && state.failing_token_fetches > 0 {
            state.failing_token_fetches -= 1;
            return Err(TransportError::Unreachable("connection reset".to_string()));
        }

        if is_token_query && request.param("type") == Some("login") {
            return Ok(json_response(json!({
                "batchcomplete": true,
                "query": {"tokens": {"logintoken": "login-token+\\"}}
            })));
        }
        if is_token_query {
            state.csrf_fetches += 1;
            let token = state
                .csrf_override
                .clone()
                .unwrap_or_else(|| format!("csrf-{}+\\", state.csrf_fetches));
            return Ok(json_response(json!({
                "batchcomplete": true,
                "query": {"tokens": {"csrftoken": token}}
            })));
        }
        if request.param("action") == Some("login") {
            state.logins += 1;
            let body = match &state.login_rejection {
                Some(reason) => json!({"login": {"result": "Failed", "reason": reason}}),
                None => json!({"login": {"result": "Success", "lguserid": 7, "lgusername": "Bot"}}),
            };
            return Ok(json_response(body));
        }

        state.responses.pop_front().unwrap_or_else(|| {
            Err(TransportError::Unreachable(
                "no scripted response left".to_string(),
            ))
        })
    }
}

#[async_trait]
impl Transport for MockWiki {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.respond(&request)
    }
}

fn is_auth_request(request: &ApiRequest) -> bool {
    request.param("action") == Some("login")
        || (request.param("action") == Some("query") && request.param("meta") == Some("tokens"))
}

fn json_response(body: Value) -> RawResponse {
    RawResponse::ok(body.to_string())
}

pub fn is_post(request: &ApiRequest) -> bool {
    request.method == HttpMethod::Post
}
