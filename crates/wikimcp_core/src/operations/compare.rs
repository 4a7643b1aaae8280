//! action=compare. Each side is either an existing page or revision, or
//! inline slot content supplied through templated `<prefix>_<slot>` keys.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::{apply_common, i64_field, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder, templated_slot_key};
use crate::result::OperationResult;
use crate::transport::HttpMethod;

const FROM_TEMPLATED: &[&str] = &["fromtext", "fromsection", "fromcontentmodel", "fromcontentformat"];
const TO_TEMPLATED: &[&str] = &["totext", "tosection", "tocontentmodel", "tocontentformat"];
/// Deprecated single-slot parameters and the templated key they stand for.
const FROM_LEGACY: &[(&str, &str)] = &[
    ("fromtext", "fromtext-main"),
    ("fromcontentmodel", "fromcontentmodel-main"),
    ("fromcontentformat", "fromcontentformat-main"),
];
const TO_LEGACY: &[(&str, &str)] = &[
    ("totext", "totext-main"),
    ("tocontentmodel", "tocontentmodel-main"),
    ("tocontentformat", "tocontentformat-main"),
    ("tosection", "tosection-main"),
];
const TORELATIVE: &[&str] = &["cur", "next", "prev"];
const DIFFTYPES: &[&str] = &["inline", "table", "unified"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Title(String),
    Id(u64),
    Rev(u64),
}

impl Locator {
    fn from_args(args: Args<'_>, side: &str) -> Result<Option<Self>, ValidationError> {
        let title_key = format!("{side}title");
        let id_key = format!("{side}id");
        let rev_key = format!("{side}rev");
        args.exclusive(&[title_key.as_str(), id_key.as_str(), rev_key.as_str()])?;

        if let Some(title) = args.string(&title_key)? {
            return Ok(Some(Self::Title(title)));
        }
        if let Some(id) = args.id(&id_key)? {
            return Ok(Some(Self::Id(id)));
        }
        Ok(args.id(&rev_key)?.map(Self::Rev))
    }

    fn apply(&self, builder: &mut ParamsBuilder, side: &str) {
        match self {
            Self::Title(title) => builder.set(&format!("{side}title"), title.as_str()),
            Self::Id(id) => builder.set(&format!("{side}id"), id.to_string()),
            Self::Rev(rev) => builder.set(&format!("{side}rev"), rev.to_string()),
        };
    }
}

/// Inline content for one side, keyed by hyphenated wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotContent {
    pub slots: Vec<String>,
    pub fields: BTreeMap<String, String>,
}

impl SlotContent {
    fn from_args(
        args: Args<'_>,
        side: &str,
        templated: &[&'static str],
        legacy: &[(&str, &str)],
    ) -> Result<Self, ValidationError> {
        let mut fields = BTreeMap::new();
        for key in args.bag().keys() {
            let Some((prefix, slot)) = templated_slot_key(key, templated) else {
                continue;
            };
            if let Some(value) = slot_value(args, key, prefix)? {
                fields.insert(format!("{prefix}-{slot}"), value);
            }
        }
        // The templated form wins; a legacy key only fills the main slot gap.
        for (legacy_key, wire_key) in legacy {
            if fields.contains_key(*wire_key) {
                continue;
            }
            let prefix = wire_key.trim_end_matches("-main");
            if let Some(value) = slot_value(args, legacy_key, prefix)? {
                fields.insert((*wire_key).to_string(), value);
            }
        }

        let slots = match args.list(&format!("{side}slots"))? {
            Some(slots) if !slots.is_empty() => slots,
            _ => fields
                .keys()
                .filter_map(|key| key.split_once('-').map(|(_, slot)| slot.to_string()))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        Ok(Self { slots, fields })
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.fields.is_empty()
    }

    fn apply(&self, builder: &mut ParamsBuilder, side: &str) {
        builder.list(&format!("{side}slots"), &self.slots);
        for (key, value) in &self.fields {
            builder.set(key, value.as_str());
        }
    }
}

fn slot_value(args: Args<'_>, key: &str, prefix: &str) -> Result<Option<String>, ValidationError> {
    if prefix.ends_with("text") {
        args.content(key)
    } else {
        args.string(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest {
    pub from: Option<Locator>,
    pub from_content: SlotContent,
    pub to: Option<Locator>,
    pub to_content: SlotContent,
    pub torelative: Option<String>,
    pub frompst: bool,
    pub topst: bool,
    pub prop: Option<Vec<String>>,
    pub slots: Option<Vec<String>>,
    pub difftype: Option<String>,
    pub warnings_as_error: bool,
}

impl CompareRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let from = Locator::from_args(args, "from")?;
        let from_content = SlotContent::from_args(args, "from", FROM_TEMPLATED, FROM_LEGACY)?;
        if from.is_none() && from_content.is_empty() {
            return Err(ValidationError::missing_one_of(&[
                "fromtitle",
                "fromid",
                "fromrev",
                "fromtext",
            ]));
        }

        let to = Locator::from_args(args, "to")?;
        let to_content = SlotContent::from_args(args, "to", TO_TEMPLATED, TO_LEGACY)?;
        let torelative = args.enum_value("torelative", TORELATIVE)?;
        if to.is_none() && to_content.is_empty() && torelative.is_none() {
            return Err(ValidationError::missing_one_of(&[
                "totitle",
                "toid",
                "torev",
                "torelative",
                "totext",
            ]));
        }

        Ok(Self {
            from,
            from_content,
            to,
            to_content,
            torelative,
            frompst: args.flag("frompst")?,
            topst: args.flag("topst")?,
            prop: args.list("prop")?,
            slots: args.list("slots")?,
            difftype: args.enum_value("difftype", DIFFTYPES)?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    /// Inline slot text goes in a form body; locator-only diffs stay GETs.
    pub fn method(&self) -> HttpMethod {
        if self.from_content.fields.is_empty() && self.to_content.fields.is_empty() {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        }
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("compare");
        if let Some(from) = &self.from {
            from.apply(&mut builder, "from");
        }
        self.from_content.apply(&mut builder, "from");
        if let Some(to) = &self.to {
            to.apply(&mut builder, "to");
        }
        self.to_content.apply(&mut builder, "to");
        builder
            .set_opt("torelative", self.torelative.as_deref())
            .flag("frompst", self.frompst)
            .flag("topst", self.topst)
            .list_opt("prop", self.prop.as_deref())
            .list_opt("slots", self.slots.as_deref())
            .set_opt("difftype", self.difftype.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    pub title: Option<String>,
    pub id: Option<u64>,
    pub revid: Option<u64>,
    pub ns: Option<i64>,
    pub size: Option<u64>,
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub comment: Option<String>,
}

impl RevisionSummary {
    fn from_payload(compare: &Value, side: &str) -> Self {
        let key = |field: &str| format!("{side}{field}");
        Self {
            title: string_field(compare, &key("title")),
            id: u64_field(compare, &key("id")),
            revid: u64_field(compare, &key("revid")),
            ns: i64_field(compare, &key("ns")),
            size: u64_field(compare, &key("size")),
            timestamp: string_field(compare, &key("timestamp")),
            user: string_field(compare, &key("user")),
            comment: string_field(compare, &key("comment")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompareResult {
    pub from: RevisionSummary,
    pub to: RevisionSummary,
    pub body: Option<String>,
    pub diffsize: Option<u64>,
    /// Per-slot diffs, present when `slots` was requested.
    pub bodies: BTreeMap<String, String>,
}

impl CompareResult {
    fn from_payload(compare: &Value) -> Result<Self, ApiError> {
        if !compare.is_object() {
            return Err(ApiError::shape("`compare` is not an object"));
        }
        let body = string_field(compare, "body").or_else(|| string_field(compare, "*"));
        let bodies = compare
            .get("bodies")
            .and_then(Value::as_object)
            .map(|bodies| {
                bodies
                    .iter()
                    .filter_map(|(slot, diff)| diff.as_str().map(|diff| (slot.clone(), diff.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            from: RevisionSummary::from_payload(compare, "from"),
            to: RevisionSummary::from_payload(compare, "to"),
            body,
            diffsize: u64_field(compare, "diffsize"),
            bodies,
        })
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = CompareRequest::from_args(args)?;
    let accepted = client
        .read_with(request.method(), &request.to_params(), request.warnings_as_error)
        .await?;
    let result = CompareResult::from_payload(accepted.subtree(&["compare"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::ArgumentBag;
    use crate::result::OperationPayload;
    use crate::testing::MockWiki;

    fn bag(value: Value) -> ArgumentBag {
        value.as_object().cloned().expect("object")
    }

    fn params_for(value: Value) -> NormalizedParameters {
        let args = bag(value);
        CompareRequest::from_args(Args::new(&args))
            .expect("valid")
            .to_params()
    }

    #[test]
    fn templated_slot_keys_are_hyphenated() {
        let params = params_for(json!({
            "fromtext_main": "old text",
            "fromcontentmodel_main": "wikitext",
            "torev": 12
        }));
        assert_eq!(params.get("fromtext-main"), Some("old text"));
        assert_eq!(params.get("fromcontentmodel-main"), Some("wikitext"));
        assert_eq!(params.get("fromslots"), Some("main"));
        assert!(!params.contains_key("fromtext_main"));
        assert_eq!(params.get("torev"), Some("12"));
    }

    #[test]
    fn legacy_text_fills_main_slot_only_when_templated_absent() {
        let params = params_for(json!({
            "fromtext": "legacy",
            "fromtext_main": "modern",
            "totext": "other"
        }));
        assert_eq!(params.get("fromtext-main"), Some("modern"));
        assert_eq!(params.get("totext-main"), Some("other"));
        assert_eq!(params.get("toslots"), Some("main"));
        assert!(!params.contains_key("fromtext"));
        assert!(!params.contains_key("totext"));
    }

    #[test]
    fn explicit_slot_list_is_kept() {
        let params = params_for(json!({
            "fromrev": 3,
            "totext_main": "a",
            "totext_aux": "b",
            "toslots": ["main"]
        }));
        assert_eq!(params.get("toslots"), Some("main"));
        assert_eq!(params.get("totext-aux"), Some("b"));

        let derived = params_for(json!({"fromrev": 3, "totext_main": "a", "totext_aux": "b"}));
        assert_eq!(derived.get("toslots"), Some("aux|main"));
    }

    #[test]
    fn each_side_needs_a_locator() {
        let args = bag(json!({"totitle": "B"}));
        assert!(matches!(
            CompareRequest::from_args(Args::new(&args)),
            Err(ValidationError::MissingRequired(_))
        ));

        let args = bag(json!({"fromtitle": "A"}));
        assert!(matches!(
            CompareRequest::from_args(Args::new(&args)),
            Err(ValidationError::MissingRequired(_))
        ));

        let args = bag(json!({"fromtitle": "A", "fromrev": 4, "torelative": "prev"}));
        assert!(matches!(
            CompareRequest::from_args(Args::new(&args)),
            Err(ValidationError::ConflictingParameters(_))
        ));
    }

    #[test]
    fn torelative_combines_with_to_locator() {
        let params = params_for(json!({"fromrev": 10, "torev": 11, "torelative": "prev"}));
        assert_eq!(params.get("torev"), Some("11"));
        assert_eq!(params.get("torelative"), Some("prev"));
    }

    #[tokio::test]
    async fn maps_both_sides_and_diff() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({
            "compare": {
                "fromid": 1, "fromrevid": 10, "fromns": 0, "fromtitle": "A", "fromsize": 100,
                "toid": 1, "torevid": 11, "tons": 0, "totitle": "A", "tosize": 120,
                "diffsize": 340,
                "body": "<tr><td>diff</td></tr>"
            }
        }));
        let client = wiki.client();
        let args = bag(json!({"fromrev": 10, "torelative": "next", "difftype": "table"}));

        let result = run(&client, Args::new(&args)).await.expect("compare");
        let OperationPayload::Compare(compare) = result.payload else {
            panic!("expected compare payload");
        };
        assert_eq!(compare.from.revid, Some(10));
        assert_eq!(compare.to.size, Some(120));
        assert_eq!(compare.body.as_deref(), Some("<tr><td>diff</td></tr>"));
        assert_eq!(compare.diffsize, Some(340));
        assert_eq!(wiki.last_request().param("difftype"), Some("table"));
        assert_eq!(wiki.last_request().method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn inline_slot_text_is_posted() {
        let wiki = MockWiki::new();
        wiki.push_json(json!({"compare": {"fromrevid": 10, "body": "<tr></tr>"}}));
        let client = wiki.client();
        let args = bag(json!({"fromrev": 10, "totext_main": "y".repeat(50_000)}));

        run(&client, Args::new(&args)).await.expect("compare");
        let request = wiki.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.param("totext-main").map(str::len), Some(50_000));
        assert_eq!(request.param("token"), None);
        assert_eq!(wiki.login_count(), 0);
    }
}
