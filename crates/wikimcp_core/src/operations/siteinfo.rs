use serde::Serialize;
use serde_json::{Map, Value};

use super::{apply_common, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;

const FILTER_IW: &[&str] = &["local", "!local"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfoRequest {
    pub siprop: Vec<String>,
    pub filteriw: Option<String>,
    pub showalldb: bool,
    pub numberingroup: bool,
    pub inlanguagecode: Option<String>,
    pub warnings_as_error: bool,
}

impl SiteInfoRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let siprop = match args.list("siprop")? {
            Some(siprop) if !siprop.is_empty() => siprop,
            _ => vec!["general".to_string()],
        };
        Ok(Self {
            siprop,
            filteriw: args.enum_value("sifilteriw", FILTER_IW)?,
            showalldb: args.flag("sishowalldb")?,
            numberingroup: args.flag("sinumberingroup")?,
            inlanguagecode: args.string("siinlanguagecode")?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("query");
        builder
            .set("meta", "siteinfo")
            .list("siprop", &self.siprop)
            .set_opt("sifilteriw", self.filteriw.as_deref())
            .flag("sishowalldb", self.showalldb)
            .flag("sinumberingroup", self.numberingroup)
            .set_opt("siinlanguagecode", self.inlanguagecode.as_deref());
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

/// Returned `query` sections keyed by name (`general`, `namespaces`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteInfoResult {
    pub sections: Map<String, Value>,
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = SiteInfoRequest::from_args(args)?;
    let accepted = client
        .read(&request.to_params(), request.warnings_as_error)
        .await?;
    let sections = accepted
        .subtree(&["query"])?
        .as_object()
        .cloned()
        .ok_or_else(|| ApiError::shape("`query` is not an object"))?;
    Ok(OperationResult::new(
        SiteInfoResult { sections },
        accepted.warnings,
    ))
}
