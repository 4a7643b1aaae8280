use serde::Serialize;
use serde_json::Value;

use super::{apply_common, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;

/// Restores a deleted page. With neither `timestamps` nor `fileids` the
/// wiki restores every deleted revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeleteRequest {
    pub title: String,
    pub reason: Option<String>,
    pub tags: Option<Vec<String>>,
    pub timestamps: Option<Vec<String>>,
    pub fileids: Option<Vec<i64>>,
    pub undeletetalk: bool,
    pub watchlist: Option<String>,
    pub watchlistexpiry: Option<String>,
    pub warnings_as_error: bool,
}

impl UndeleteRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            title: args.required_string("title")?,
            reason: args.string("reason")?,
            tags: args.list("tags")?,
            timestamps: args.list("timestamps")?,
            fileids: args.integer_list("fileids")?,
            undeletetalk: args.flag("undeletetalk")?,
            watchlist: args.watchlist()?,
            watchlistexpiry: args.string("watchlistexpiry")?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let fileids = self.fileids.as_ref().map(|ids| {
            ids.iter().map(ToString::to_string).collect::<Vec<_>>()
        });
        let mut builder = ParamsBuilder::action("undelete");
        builder
            .set("title", self.title.as_str())
            .set_opt("reason", self.reason.as_deref())
            .list_opt("tags", self.tags.as_deref())
            .list_opt("timestamps", self.timestamps.as_deref())
            .list_opt("fileids", fileids.as_deref())
            .flag("undeletetalk", self.undeletetalk)
            .set_opt("watchlist", self.watchlist.as_deref())
            .set_opt("watchlistexpiry", self.watchlistexpiry.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndeleteResult {
    pub title: String,
    pub reason: Option<String>,
    pub revisions: u64,
    pub fileversions: u64,
}

impl UndeleteResult {
    fn from_payload(restored: &Value) -> Result<Self, ApiError> {
        Ok(Self {
            title: string_field(restored, "title")
                .ok_or_else(|| ApiError::shape("missing `undelete.title` in response"))?,
            reason: string_field(restored, "reason"),
            revisions: u64_field(restored, "revisions").unwrap_or(0),
            fileversions: u64_field(restored, "fileversions").unwrap_or(0),
        })
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = UndeleteRequest::from_args(args)?;
    let accepted = client
        .write(&request.to_params(), request.warnings_as_error)
        .await?;
    let result = UndeleteResult::from_payload(accepted.subtree(&["undelete"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
