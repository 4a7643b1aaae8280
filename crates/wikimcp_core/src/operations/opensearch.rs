use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use serde::Serialize;
use serde_json::Value;

use super::search::{clamp_limit, namespaces_or_main};
use super::{apply_common, warnings_as_error};
use crate::client::WikiClient;
use crate::envelope::Accepted;
use crate::error::{ApiError, Result, TransportError, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;
use crate::transport::Endpoint;

const PROFILES: &[&str] = &[
    "strict",
    "normal",
    "normal-subphrases",
    "fuzzy",
    "fast-fuzzy",
    "fuzzy-subphrases",
    "classic",
    "engine_autoselect",
];
const REDIRECTS: &[&str] = &["return", "resolve"];
const FORMATS: &[&str] = &["json", "xml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSearchRequest {
    pub search: String,
    pub namespaces: Vec<String>,
    pub limit: i64,
    pub profile: Option<String>,
    pub redirects: Option<String>,
    pub xml: bool,
    pub warnings_as_error: bool,
}

impl OpenSearchRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            search: args.required_string("search")?,
            namespaces: namespaces_or_main(args.integer_list("namespace")?),
            limit: clamp_limit(args.integer("limit")?),
            profile: args.enum_value("profile", PROFILES)?,
            redirects: args.enum_value("redirects", REDIRECTS)?,
            xml: args.enum_value("format", FORMATS)?.as_deref() == Some("xml"),
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("opensearch");
        builder
            .set("search", self.search.as_str())
            .list("namespace", &self.namespaces)
            .set("limit", self.limit.to_string())
            .set_opt("profile", self.profile.as_deref())
            .set_opt("redirects", self.redirects.as_deref());
        // The JSON path has format forced by the executor.
        if self.xml {
            builder.set("format", "xml");
        }
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OpenSearchResult {
    Json {
        search: String,
        suggestions: Vec<Suggestion>,
    },
    Xml {
        document: String,
    },
}

impl OpenSearchResult {
    /// The response is the array `[term, [titles], [descriptions], [urls]]`.
    fn from_accepted(accepted: &Accepted) -> Result<Self, ApiError> {
        let parts = accepted
            .body
            .as_array()
            .filter(|parts| parts.len() >= 2)
            .ok_or_else(|| ApiError::shape("opensearch response is not a result array"))?;
        let search = parts[0].as_str().unwrap_or_default().to_string();
        let column = |index: usize| -> Vec<String> {
            parts
                .get(index)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| item.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default()
        };
        let titles = column(1);
        let descriptions = column(2);
        let urls = column(3);

        let suggestions = titles
            .into_iter()
            .enumerate()
            .map(|(index, title)| Suggestion {
                title,
                description: descriptions.get(index).cloned().unwrap_or_default(),
                url: urls.get(index).cloned().unwrap_or_default(),
            })
            .collect();
        Ok(Self::Json {
            search,
            suggestions,
        })
    }
}

/// Finds a top-level `<error code=".." info="..">` in an XML response.
fn xml_error(document: &str) -> Result<Option<ApiError>, TransportError> {
    let mut reader = Reader::from_str(document);
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag) | Event::Empty(tag)) if tag.name().as_ref() == b"error" => {
                let mut code = String::from("unknown_error");
                let mut info = String::new();
                for attribute in tag.attributes().flatten() {
                    let raw = String::from_utf8_lossy(&attribute.value).into_owned();
                    let value = unescape(&raw)
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| raw.clone());
                    match attribute.key.as_ref() {
                        b"code" => code = value,
                        b"info" => info = value,
                        _ => {}
                    }
                }
                return Ok(Some(ApiError::remote(code, info)));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(error) => {
                return Err(TransportError::MalformedResponse(format!(
                    "invalid opensearch XML: {error}"
                )));
            }
        }
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = OpenSearchRequest::from_args(args)?;
    let params = request.to_params();

    if request.xml {
        let response = client.read_text(Endpoint::Api, &params).await?;
        if let Some(error) = xml_error(&response.body)? {
            return Err(error.into());
        }
        if !response.is_success() {
            return Err(TransportError::Unreachable(format!(
                "opensearch request failed with HTTP {}",
                response.status
            ))
            .into());
        }
        let result = OpenSearchResult::Xml {
            document: response.body,
        };
        return Ok(OperationResult::new(result, Vec::new()));
    }

    let accepted = client.read(&params, request.warnings_as_error).await?;
    let result = OpenSearchResult::from_accepted(&accepted)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
