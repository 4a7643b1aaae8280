//! One handler per tool. Each handler validates its argument bag into a
//! typed request, builds the wire parameters, and maps the accepted
//! payload into its result record.

pub mod compare;
pub mod delete;
pub mod edit;
pub mod get;
pub mod move_page;
pub mod opensearch;
pub mod parse;
pub mod search;
pub mod siteinfo;
pub mod undelete;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::WikiClient;
use crate::error::{Result, ValidationError};
use crate::params::{ArgumentBag, Args, ParamsBuilder};
use crate::result::OperationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Edit,
    Get,
    Move,
    Delete,
    Undelete,
    Search,
    OpenSearch,
    Compare,
    Parse,
    SiteInfo,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Edit,
        Operation::Get,
        Operation::Move,
        Operation::Delete,
        Operation::Undelete,
        Operation::Search,
        Operation::OpenSearch,
        Operation::Compare,
        Operation::Parse,
        Operation::SiteInfo,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Edit => "wiki_page_edit",
            Self::Get => "wiki_page_get",
            Self::Move => "wiki_page_move",
            Self::Delete => "wiki_page_delete",
            Self::Undelete => "wiki_page_undelete",
            Self::Search => "wiki_search",
            Self::OpenSearch => "wiki_opensearch",
            Self::Compare => "wiki_page_compare",
            Self::Parse => "wiki_page_parse",
            Self::SiteInfo => "wiki_meta_siteinfo",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|operation| operation.tool_name() == name)
    }

    /// Mutating operations go through the session and are sent as POST.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Edit | Self::Move | Self::Delete | Self::Undelete
        )
    }
}

/// Route one tool invocation to its handler.
pub async fn dispatch(
    client: &WikiClient,
    operation: Operation,
    bag: &ArgumentBag,
) -> Result<OperationResult> {
    let args = Args::new(bag);
    debug!(tool = operation.tool_name(), "dispatching tool call");
    let outcome = match operation {
        Operation::Edit => edit::run(client, args).await,
        Operation::Get => get::run(client, args).await,
        Operation::Move => move_page::run(client, args).await,
        Operation::Delete => delete::run(client, args).await,
        Operation::Undelete => undelete::run(client, args).await,
        Operation::Search => search::run(client, args).await,
        Operation::OpenSearch => opensearch::run(client, args).await,
        Operation::Compare => compare::run(client, args).await,
        Operation::Parse => parse::run(client, args).await,
        Operation::SiteInfo => siteinfo::run(client, args).await,
    };
    match &outcome {
        Ok(_) if operation.is_mutating() => info!(tool = operation.tool_name(), "tool call succeeded"),
        Ok(_) => debug!(tool = operation.tool_name(), "tool call succeeded"),
        Err(error) => info!(tool = operation.tool_name(), kind = error.kind(), "tool call failed: {error}"),
    }
    outcome
}

/// A page addressed either by title or by page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    Title(String),
    PageId(u64),
}

impl PageRef {
    /// Exactly one of `title_key` / `id_key` must be supplied.
    pub(crate) fn from_args(
        args: Args<'_>,
        title_key: &str,
        id_key: &str,
    ) -> Result<Self, ValidationError> {
        args.require_one(&[title_key, id_key])?;
        if let Some(id) = args.id(id_key)? {
            return Ok(Self::PageId(id));
        }
        Ok(Self::Title(args.required_string(title_key)?))
    }

    pub(crate) fn apply(&self, builder: &mut ParamsBuilder, title_key: &str, id_key: &str) {
        match self {
            Self::Title(title) => builder.set(title_key, title.as_str()),
            Self::PageId(id) => builder.set(id_key, id.to_string()),
        };
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Title(title) => title.clone(),
            Self::PageId(id) => format!("page ID {id}"),
        }
    }
}

/// `warningsaserror` is accepted by every tool.
pub(crate) fn warnings_as_error(args: Args<'_>) -> Result<bool, ValidationError> {
    args.flag("warningsaserror")
}

pub(crate) fn apply_common(builder: &mut ParamsBuilder, warnings_as_error: bool) {
    builder.flag("warningsaserror", warnings_as_error);
}

/// Optional string field of a payload object.
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToString::to_string)
}

pub(crate) fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

pub(crate) fn i64_field(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

/// formatversion=2 reports flags as booleans; older wikis send an empty string.
pub(crate) fn flag_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::MockWiki;

    #[test]
    fn tool_names_round_trip() {
        for operation in Operation::ALL {
            assert_eq!(Operation::from_tool_name(operation.tool_name()), Some(operation));
        }
        assert_eq!(Operation::from_tool_name("wiki_page_protect"), None);
    }

    #[test]
    fn only_side_effects_are_mutating() {
        let mutating = Operation::ALL
            .into_iter()
            .filter(|operation| operation.is_mutating())
            .map(Operation::tool_name)
            .collect::<Vec<_>>();
        assert_eq!(
            mutating,
            vec![
                "wiki_page_edit",
                "wiki_page_move",
                "wiki_page_delete",
                "wiki_page_undelete"
            ]
        );
    }

    #[test]
    fn flag_field_accepts_both_formats() {
        let value = json!({"new": true, "nochange": "", "minor": false});
        assert!(flag_field(&value, "new"));
        assert!(flag_field(&value, "nochange"));
        assert!(!flag_field(&value, "minor"));
        assert!(!flag_field(&value, "missing"));
    }

    #[tokio::test]
    async fn permission_denied_passes_through_for_every_read() {
        let reads = [
            (Operation::Search, json!({"query": "cat"})),
            (Operation::SiteInfo, json!({})),
            (Operation::Parse, json!({"page": "Main Page"})),
            (Operation::Compare, json!({"fromrev": 1, "torev": 2})),
        ];
        for (operation, args) in reads {
            let wiki = MockWiki::new();
            wiki.push_json(json!({
                "error": {"code": "permissiondenied", "info": "You are not allowed."}
            }));
            let client = wiki.client();
            let bag = args.as_object().cloned().unwrap_or_default();

            let error = dispatch(&client, operation, &bag).await.expect_err("denied");
            assert_eq!(
                error,
                crate::error::Error::Api(crate::error::ApiError::remote(
                    "permissiondenied",
                    "You are not allowed."
                )),
                "{}",
                operation.tool_name()
            );
        }
    }

    #[tokio::test]
    async fn permission_denied_passes_through_for_writes() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({
            "error": {"code": "permissiondenied", "info": "You are not allowed."}
        }));
        let client = wiki.client();
        let bag = json!({"title": "A", "reason": "cleanup"})
            .as_object()
            .cloned()
            .unwrap_or_default();

        let error = dispatch(&client, Operation::Delete, &bag)
            .await
            .expect_err("denied");
        assert_eq!(error.kind(), "ApiError");
        assert!(error.to_string().contains("[permissiondenied]"));
    }
}
