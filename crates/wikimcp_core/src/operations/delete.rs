use serde::Serialize;
use serde_json::Value;

use super::{PageRef, apply_common, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub page: PageRef,
    pub reason: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deletetalk: bool,
    pub watchlist: Option<String>,
    pub watchlistexpiry: Option<String>,
    pub oldimage: Option<String>,
    pub warnings_as_error: bool,
}

impl DeleteRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            page: PageRef::from_args(args, "title", "pageid")?,
            reason: args.string("reason")?,
            tags: args.list("tags")?,
            deletetalk: args.flag("deletetalk")?,
            watchlist: watchlist_with_legacy(args)?,
            watchlistexpiry: args.string("watchlistexpiry")?,
            oldimage: args.string("oldimage")?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("delete");
        self.page.apply(&mut builder, "title", "pageid");
        builder
            .set_opt("reason", self.reason.as_deref())
            .list_opt("tags", self.tags.as_deref())
            .flag("deletetalk", self.deletetalk)
            .set_opt("watchlist", self.watchlist.as_deref())
            .set_opt("watchlistexpiry", self.watchlistexpiry.as_deref())
            .set_opt("oldimage", self.oldimage.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

/// The deprecated `watch`/`unwatch` booleans only apply when `watchlist`
/// itself is absent.
fn watchlist_with_legacy(args: Args<'_>) -> Result<Option<String>, ValidationError> {
    if args.present("watchlist") {
        return args.watchlist();
    }
    if args.flag("watch")? {
        return Ok(Some("watch".to_string()));
    }
    if args.flag("unwatch")? {
        return Ok(Some("unwatch".to_string()));
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub title: String,
    pub reason: Option<String>,
    pub logid: Option<u64>,
}

impl DeleteResult {
    fn from_payload(deleted: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            title: string_field(deleted, "title")
                .ok_or_else(|| ApiError::shape("missing `delete.title` in response"))?,
            reason: string_field(deleted, "reason"),
            logid: u64_field(deleted, "logid"),
        })
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = DeleteRequest::from_args(args)?;
    let accepted = client
        .write(&request.to_params(), request.warnings_as_error)
        .await?;
    let result = DeleteResult::from_payload(accepted.subtree(&["delete"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
