use serde::Serialize;
use serde_json::Value;

use super::{PageRef, apply_common, flag_field, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder, validate_edit_section};
use crate::result::OperationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub page: PageRef,
    pub text: Option<String>,
    pub appendtext: Option<String>,
    pub prependtext: Option<String>,
    pub section: Option<String>,
    pub sectiontitle: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub minor: bool,
    pub notminor: bool,
    pub bot: bool,
    pub createonly: bool,
    pub nocreate: bool,
    pub recreate: bool,
    pub redirect: bool,
    pub baserevid: Option<u64>,
    pub basetimestamp: Option<String>,
    pub starttimestamp: Option<String>,
    pub watchlist: Option<String>,
    pub watchlistexpiry: Option<String>,
    pub contentmodel: Option<String>,
    pub contentformat: Option<String>,
    pub undo: Option<u64>,
    pub undoafter: Option<u64>,
    pub warnings_as_error: bool,
}

impl EditRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let page = PageRef::from_args(args, "title", "pageid")?;

        let section = args.string("section")?;
        if let Some(section) = &section {
            validate_edit_section(section)?;
        }
        let sectiontitle = args.string("sectiontitle")?;
        let text = args.content("text")?;
        let appendtext = args.content("appendtext")?;
        let prependtext = args.content("prependtext")?;
        let undo = args.id("undo")?;

        let new_section = section.as_deref() == Some("new") && sectiontitle.is_some();
        if text.is_none()
            && appendtext.is_none()
            && prependtext.is_none()
            && undo.is_none()
            && !new_section
        {
            return Err(ValidationError::missing_one_of(&[
                "text",
                "appendtext",
                "prependtext",
                "undo",
            ]));
        }
        args.exclusive(&["createonly", "nocreate"])?;

        Ok(Self {
            page,
            text,
            appendtext,
            prependtext,
            section,
            sectiontitle,
            summary: args.string("summary")?,
            tags: args.list("tags")?,
            minor: args.flag("minor")?,
            notminor: args.flag("notminor")?,
            bot: args.flag_or("bot", true)?,
            createonly: args.flag("createonly")?,
            nocreate: args.flag("nocreate")?,
            recreate: args.flag("recreate")?,
            redirect: args.flag("redirect")?,
            baserevid: args.id("baserevid")?,
            basetimestamp: args.string("basetimestamp")?,
            starttimestamp: args.string("starttimestamp")?,
            watchlist: args.watchlist()?,
            watchlistexpiry: args.string("watchlistexpiry")?,
            contentmodel: args.string("contentmodel")?,
            contentformat: args.string("contentformat")?,
            undo,
            undoafter: args.id("undoafter")?,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("edit");
        self.page.apply(&mut builder, "title", "pageid");
        builder
            .set_opt("text", self.text.as_deref())
            .set_opt("appendtext", self.appendtext.as_deref())
            .set_opt("prependtext", self.prependtext.as_deref())
            .set_opt("section", self.section.as_deref())
            .set_opt("sectiontitle", self.sectiontitle.as_deref())
            .set_opt("summary", self.summary.as_deref())
            .list_opt("tags", self.tags.as_deref())
            .flag("minor", self.minor)
            .flag("notminor", self.notminor)
            .flag("bot", self.bot)
            .flag("createonly", self.createonly)
            .flag("nocreate", self.nocreate)
            .flag("recreate", self.recreate)
            .flag("redirect", self.redirect)
            .set_opt("baserevid", self.baserevid)
            .set_opt("basetimestamp", self.basetimestamp.as_deref())
            .set_opt("starttimestamp", self.starttimestamp.as_deref())
            .set_opt("watchlist", self.watchlist.as_deref())
            .set_opt("watchlistexpiry", self.watchlistexpiry.as_deref())
            .set_opt("contentmodel", self.contentmodel.as_deref())
            .set_opt("contentformat", self.contentformat.as_deref())
            .set_opt("undo", self.undo)
            .set_opt("undoafter", self.undoafter);
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditResult {
    pub result: String,
    pub title: Option<String>,
    pub pageid: Option<u64>,
    pub contentmodel: Option<String>,
    pub oldrevid: Option<u64>,
    pub newrevid: Option<u64>,
    pub newtimestamp: Option<String>,
    pub new: bool,
    pub nochange: bool,
}

impl EditResult {
    fn from_payload(edit: &Value) -> Result<Self, ApiError> {
        let result = string_field(edit, "result")
            .ok_or_else(|| ApiError::shape("missing `edit.result` in response"))?;
        // Captchas and abuse filters answer 200 without an `error` key.
        if result != "Success" {
            let info = edit
                .get("info")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_else(|| edit.to_string());
            return Err(ApiError::remote(
                format!("edit-{}", result.to_ascii_lowercase()),
                info,
            ));
        }
        Ok(Self {
            result,
            title: string_field(edit, "title"),
            pageid: u64_field(edit, "pageid"),
            contentmodel: string_field(edit, "contentmodel"),
            oldrevid: u64_field(edit, "oldrevid"),
            newrevid: u64_field(edit, "newrevid"),
            newtimestamp: string_field(edit, "newtimestamp"),
            new: flag_field(edit, "new"),
            nochange: flag_field(edit, "nochange"),
        })
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = EditRequest::from_args(args)?;
    let accepted = client
        .write(&request.to_params(), request.warnings_as_error)
        .await?;
    let result = EditResult::from_payload(accepted.subtree(&["edit"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
