use std::sync::Arc;

use tracing::debug;

use crate::envelope::ApiEnvelope;
use crate::error::TransportError;
use crate::params::NormalizedParameters;
use crate::transport::{ApiRequest, Endpoint, HttpMethod, RawResponse, Transport};

/// Issues API calls and enforces the JSON envelope.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Call api.php with `format=json&formatversion=2`. `extra` is appended
    /// after the operation parameters so a CSRF token always travels last.
    pub async fn execute(
        &self,
        method: HttpMethod,
        params: &NormalizedParameters,
        extra: &[(&str, &str)],
    ) -> Result<ApiEnvelope, TransportError> {
        let mut pairs = Vec::with_capacity(params.len() + extra.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        pairs.extend(
            params
                .iter()
                .filter(|(key, _)| *key != "format" && *key != "formatversion")
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        for (key, value) in extra {
            pairs.push(((*key).to_string(), (*value).to_string()));
        }

        let response = self.send(method, Endpoint::Api, pairs).await?;
        decode_envelope(response)
    }

    /// Call without forcing JSON; the caller interprets the body.
    pub async fn execute_text(
        &self,
        endpoint: Endpoint,
        params: &NormalizedParameters,
    ) -> Result<RawResponse, TransportError> {
        self.send(HttpMethod::Get, endpoint, params.to_pairs()).await
    }

    async fn send(
        &self,
        method: HttpMethod,
        endpoint: Endpoint,
        params: Vec<(String, String)>,
    ) -> Result<RawResponse, TransportError> {
        let request = ApiRequest {
            method,
            endpoint,
            params,
        };
        debug!(
            action = request.param("action").unwrap_or(""),
            method = ?request.method,
            endpoint = ?request.endpoint,
            "MediaWiki request"
        );
        self.transport.send(request).await
    }
}

// MediaWiki answers most failures with HTTP 200, but a proxy or a fatal PHP
// error can produce other statuses. A decodable error envelope is still
// authoritative; anything else on a non-2xx is an unreachable backend.
fn decode_envelope(response: RawResponse) -> Result<ApiEnvelope, TransportError> {
    if response.is_success() {
        return ApiEnvelope::decode(&response.body);
    }
    match ApiEnvelope::decode(&response.body) {
        Ok(envelope) if envelope.error().is_some() => Ok(envelope),
        _ => Err(TransportError::Unreachable(format!(
            "MediaWiki API request failed with HTTP {}",
            response.status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::ParamsBuilder;
    use crate::testing::MockWiki;

    #[tokio::test]
    async fn forces_json_and_appends_extra_last() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({"query": {}}));
        let executor = Executor::new(wiki.clone());

        let mut builder = ParamsBuilder::action("query");
        builder.set("format", "xml");
        executor
            .execute(HttpMethod::Post, &builder.build(), &[("token", "abc+\\")])
            .await
            .expect("execute");

        let request = wiki.last_request();
        assert_eq!(request.param("format"), Some("json"));
        assert_eq!(request.param("formatversion"), Some("2"));
        assert_eq!(request.params.last(), Some(&("token".to_string(), "abc+\\".to_string())));
        assert_eq!(
            request.params.iter().filter(|(key, _)| key == "format").count(),
            1
        );
    }

    #[test]
    fn non_success_without_envelope_is_unreachable() {
        let error = decode_envelope(RawResponse {
            status: 503,
            body: "<html>Service Unavailable</html>".to_string(),
        })
        .expect_err("must fail");
        assert_eq!(
            error,
            TransportError::Unreachable("MediaWiki API request failed with HTTP 503".to_string())
        );
    }

    #[test]
    fn non_success_with_error_envelope_is_kept() {
        let envelope = decode_envelope(RawResponse {
            status: 500,
            body: r#"{"error":{"code":"internal_api_error_DBQueryError","info":"db"}}"#
                .to_string(),
        })
        .expect("envelope");
        assert_eq!(
            envelope.error().map(|error| error.code.as_str()),
            Some("internal_api_error_DBQueryError")
        );
    }

    #[test]
    fn success_with_html_body_is_malformed() {
        let error = decode_envelope(RawResponse::ok("<html>login wall</html>")).expect_err("bad");
        assert!(matches!(error, TransportError::MalformedResponse(_)));
    }
}
