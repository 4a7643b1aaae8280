use serde::Serialize;
use serde_json::Value;

use super::{PageRef, apply_common, flag_field, string_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: PageRef,
    pub to: String,
    pub reason: Option<String>,
    pub movetalk: bool,
    pub movesubpages: bool,
    /// Without the `suppressredirect` right the wiki ignores this and still
    /// leaves a redirect; that outcome is reported, not rejected.
    pub noredirect: bool,
    pub watchlist: Option<String>,
    pub watchlistexpiry: Option<String>,
    pub ignorewarnings: bool,
    pub tags: Option<Vec<String>>,
    pub warnings_as_error: bool,
}

impl MoveRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let from_key = if args.present("from_title") {
            "from_title"
        } else {
            "from"
        };
        let title = args.string_with_alias("from_title", "from")?;
        let fromid = args.id("fromid")?;
        let from = match (title, fromid) {
            (Some(_), Some(_)) => return Err(ValidationError::conflicting(&[from_key, "fromid"])),
            (Some(title), None) => PageRef::Title(title),
            (None, Some(id)) => PageRef::PageId(id),
            (None, None) => return Err(ValidationError::missing_one_of(&["from_title", "fromid"])),
        };

        Ok(Self {
            from,
            to: args.required_string("to")?,
            reason: args.string("reason")?,
            movetalk: args.flag("movetalk")?,
            movesubpages: args.flag("movesubpages")?,
            noredirect: args.flag("noredirect")?,
            watchlist: args.watchlist()?,
            watchlistexpiry: args.string("watchlistexpiry")?,
            ignorewarnings: args.flag("ignorewarnings")?,
            tags: args.list("tags")?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("move");
        self.from.apply(&mut builder, "from", "fromid");
        builder
            .set("to", self.to.as_str())
            .set_opt("reason", self.reason.as_deref())
            .flag("movetalk", self.movetalk)
            .flag("movesubpages", self.movesubpages)
            .flag("noredirect", self.noredirect)
            .set_opt("watchlist", self.watchlist.as_deref())
            .set_opt("watchlistexpiry", self.watchlistexpiry.as_deref())
            .flag("ignorewarnings", self.ignorewarnings)
            .list_opt("tags", self.tags.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveResult {
    pub from: String,
    pub to: String,
    pub reason: Option<String>,
    pub redirectcreated: bool,
    pub moveoverredirect: bool,
    pub talkfrom: Option<String>,
    pub talkto: Option<String>,
    /// Per-subpage outcomes as returned; entries may carry their own error.
    pub subpages: Vec<Value>,
    pub subpages_talk: Vec<Value>,
}

impl MoveResult {
    fn from_payload(moved: &Value) -> Result<Self, ApiError> {
        let from = string_field(moved, "from")
            .ok_or_else(|| ApiError::shape("missing `move.from` in response"))?;
        let to = string_field(moved, "to")
            .ok_or_else(|| ApiError::shape("missing `move.to` in response"))?;
        Ok(Self {
            from,
            to,
            reason: string_field(moved, "reason"),
            redirectcreated: flag_field(moved, "redirectcreated"),
            moveoverredirect: flag_field(moved, "moveoverredirect"),
            talkfrom: string_field(moved, "talkfrom"),
            talkto: string_field(moved, "talkto"),
            subpages: entries(moved, "subpages"),
            subpages_talk: entries(moved, "subpages-talk"),
        })
    }
}

fn entries(moved: &Value, key: &str) -> Vec<Value> {
    moved
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = MoveRequest::from_args(args)?;
    let accepted = client
        .write(&request.to_params(), request.warnings_as_error)
        .await?;
    let result = MoveResult::from_payload(accepted.subtree(&["move"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
