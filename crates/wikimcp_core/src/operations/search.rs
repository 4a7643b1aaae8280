use serde::{Deserialize, Serialize};

use super::{apply_common, i64_field, string_field, warnings_as_error};
use crate::client::WikiClient;
use crate::envelope::Accepted;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;

pub const MAX_LIMIT: i64 = 500;
const DEFAULT_LIMIT: i64 = 10;
const WHAT_VALUES: &[&str] = &["text", "title", "nearmatch"];
const DEFAULT_INFO: &[&str] = &["totalhits", "suggestion", "rewrittenquery"];
const DEFAULT_PROP: &[&str] = &["size", "wordcount", "timestamp", "snippet"];
const SORT_VALUES: &[&str] = &[
    "create_timestamp_asc",
    "create_timestamp_desc",
    "incoming_links_asc",
    "incoming_links_desc",
    "just_match",
    "last_edit_asc",
    "last_edit_desc",
    "none",
    "random",
    "relevance",
    "user_random",
];
const QI_PROFILES: &[&str] = &[
    "classic",
    "classic_noboostlinks",
    "empty",
    "engine_autoselect",
    "popular_inclinks",
    "popular_inclinks_pv",
    "wsum_inclinks",
    "wsum_inclinks_pv",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub namespaces: Vec<String>,
    pub limit: i64,
    pub offset: Option<i64>,
    pub what: Option<String>,
    pub info: Vec<String>,
    pub prop: Vec<String>,
    pub interwiki: bool,
    pub enable_rewrites: bool,
    pub sort: Option<String>,
    pub qiprofile: Option<String>,
    pub warnings_as_error: bool,
}

/// Out-of-range limits are clamped rather than rejected.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub(crate) fn namespaces_or_main(values: Option<Vec<i64>>) -> Vec<String> {
    values
        .unwrap_or_else(|| vec![0])
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn list_or_default(values: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    values.unwrap_or_else(|| default.iter().map(ToString::to_string).collect())
}

impl SearchRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            query: args.required_string("query")?,
            namespaces: namespaces_or_main(args.integer_list("namespaces")?),
            limit: clamp_limit(args.integer("limit")?),
            offset: args.integer("offset")?.filter(|offset| *offset > 0),
            what: args.enum_value("what", WHAT_VALUES)?,
            info: list_or_default(args.list("info")?, DEFAULT_INFO),
            prop: list_or_default(args.list("prop")?, DEFAULT_PROP),
            interwiki: args.flag("interwiki")?,
            enable_rewrites: args.flag_or("enable_rewrites", true)?,
            sort: args.enum_value("srsort", SORT_VALUES)?,
            qiprofile: args.enum_value("qiprofile", QI_PROFILES)?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("query");
        builder
            .set("list", "search")
            .set("srsearch", self.query.as_str())
            .list("srnamespace", &self.namespaces)
            .set("srlimit", self.limit.to_string())
            .set_opt("sroffset", self.offset)
            .set_opt("srwhat", self.what.as_deref())
            .list("srinfo", &self.info)
            .list("srprop", &self.prop)
            .flag("srinterwiki", self.interwiki)
            .flag("srenablerewrites", self.enable_rewrites)
            .set_opt("srsort", self.sort.as_deref())
            .set_opt("srqiprofile", self.qiprofile.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(default)]
    pub ns: i64,
    #[serde(default)]
    pub pageid: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub wordcount: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub titlesnippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// In the order the wiki ranked them.
    pub hits: Vec<SearchHit>,
    pub totalhits: Option<i64>,
    pub suggestion: Option<String>,
    pub rewrittenquery: Option<String>,
    /// Offset to request the next page with, when there is one.
    pub next_offset: Option<i64>,
}

impl SearchResult {
    fn from_accepted(accepted: &Accepted) -> Result<Self, ApiError> {
        let hits: Vec<SearchHit> = accepted.decode(&["query", "search"])?;
        let info = accepted.subtree(&["query", "searchinfo"]).ok();
        let next_offset = accepted
            .subtree(&["continue"])
            .ok()
            .and_then(|cont| i64_field(cont, "sroffset"));
        Ok(Self {
            hits,
            totalhits: info.and_then(|info| i64_field(info, "totalhits")),
            suggestion: info.and_then(|info| string_field(info, "suggestion")),
            rewrittenquery: info.and_then(|info| string_field(info, "rewrittenquery")),
            next_offset,
        })
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = SearchRequest::from_args(args)?;
    let accepted = client
        .read(&request.to_params(), request.warnings_as_error)
        .await?;
    let result = SearchResult::from_accepted(&accepted)?;
    Ok(OperationResult::new(result, accepted.warnings))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::params::ArgumentBag;
    use crate::result::OperationPayload;
    use crate::testing::MockWiki;
    use crate::transport::HttpMethod;

    fn bag(value: Value) -> ArgumentBag {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-4)), 1);
        assert_eq!(clamp_limit(Some(9000)), 500);
    }

    #[test]
    fn defaults_fill_info_and_prop() {
        let args = bag(json!({"query": "cat"}));
        let params = SearchRequest::from_args(Args::new(&args))
            .expect("valid")
            .to_params();
        assert_eq!(params.get("srnamespace"), Some("0"));
        assert_eq!(params.get("srinfo"), Some("totalhits|suggestion|rewrittenquery"));
        assert_eq!(params.get("srprop"), Some("size|wordcount|timestamp|snippet"));
        assert_eq!(params.get("srenablerewrites"), Some("1"));
        assert!(!params.contains_key("sroffset"));
        assert!(!params.contains_key("srsort"));
    }

    #[test]
    fn empty_prop_list_is_omitted() {
        let args = bag(json!({"query": "cat", "prop": [], "namespaces": [0, 14]}));
        let params = SearchRequest::from_args(Args::new(&args))
            .expect("valid")
            .to_params();
        assert!(!params.contains_key("srprop"));
        assert_eq!(params.get("srnamespace"), Some("0|14"));
    }

    #[test]
    fn bad_sort_is_rejected() {
        let args = bag(json!({"query": "cat", "srsort": "alphabetical"}));
        assert!(matches!(
            SearchRequest::from_args(Args::new(&args)),
            Err(ValidationError::InvalidEnumValue { .. })
        ));
    }

    #[tokio::test]
    async fn three_hits_keep_remote_order() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({
            "batchcomplete": true,
            "continue": {"sroffset": 3, "continue": "-||"},
            "query": {
                "searchinfo": {"totalhits": 120},
                "search": [
                    {"ns": 0, "title": "Cat", "pageid": 6, "size": 100, "wordcount": 20,
                     "snippet": "The <span>cat</span>", "timestamp": "2024-01-01T00:00:00Z"},
                    {"ns": 0, "title": "Catnip", "pageid": 9, "size": 50, "wordcount": 8,
                     "snippet": "", "timestamp": "2024-01-02T00:00:00Z"},
                    {"ns": 0, "title": "Cat food", "pageid": 2, "size": 70, "wordcount": 12,
                     "snippet": "", "timestamp": "2024-01-03T00:00:00Z"}
                ]
            }
        }));
        let client = wiki.client();
        let args = bag(json!({"query": "cat", "limit": 3}));

        let result = run(&client, Args::new(&args)).await.expect("search");
        let OperationPayload::Search(search) = result.payload else {
            panic!("expected search payload");
        };
        let titles = search
            .hits
            .iter()
            .map(|hit| hit.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Cat", "Catnip", "Cat food"]);
        assert_eq!(search.totalhits, Some(120));
        assert_eq!(search.next_offset, Some(3));

        let request = wiki.last_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.param("srlimit"), Some("3"));
        assert_eq!(wiki.login_count(), 0);
    }

    #[tokio::test]
    async fn missing_search_list_is_unexpected_shape() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({"batchcomplete": true, "query": {}}));
        let client = wiki.client();
        let args = bag(json!({"query": "cat"}));

        let error = run(&client, Args::new(&args)).await.expect_err("shape");
        assert_eq!(
            error,
            crate::error::Error::Api(ApiError::UnexpectedResponseShape(
                "missing `query.search` in response".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn warnings_are_attached_unless_promoted() {
        let body = json!({
            "warnings": {"search": {"warnings": "The srqiprofile parameter is ignored."}},
            "query": {"search": []}
        });

        let wiki = MockWiki::new();
        wiki.push_json(body.clone());
        let client = wiki.client();
        let args = bag(json!({"query": "cat"}));
        let result = run(&client, Args::new(&args)).await.expect("soft success");
        assert_eq!(result.warnings.len(), 1);

        let wiki = MockWiki::new();
        wiki.push_json(body);
        let client = wiki.client();
        let args = bag(json!({"query": "cat", "warningsaserror": true}));
        let error = run(&client, Args::new(&args)).await.expect_err("promoted");
        assert!(matches!(
            error,
            crate::error::Error::Api(ApiError::WarningsPromoted(_))
        ));
    }
}
