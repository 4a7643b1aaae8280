use serde::Serialize;
use serde_json::Value;

use super::{PageRef, apply_common, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::envelope::Accepted;
use crate::error::{ApiError, Result, TransportError, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder};
use crate::result::OperationResult;
use crate::transport::Endpoint;

const METHODS: &[&str] = &["revisions", "parse", "raw", "extracts"];
const FORMATS: &[&str] = &["wikitext", "html", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GetMethod {
    Revisions,
    Parse,
    Raw,
    Extracts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Wikitext,
    Html,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub page: PageRef,
    pub method: GetMethod,
    pub format: ContentFormat,
    pub sentences: Option<i64>,
    pub chars: Option<i64>,
    pub warnings_as_error: bool,
}

impl GetRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let page = PageRef::from_args(args, "title", "pageid")?;
        let method = match args.enum_value("method", METHODS)?.as_deref() {
            Some("parse") => GetMethod::Parse,
            Some("raw") => GetMethod::Raw,
            Some("extracts") => GetMethod::Extracts,
            _ => GetMethod::Revisions,
        };
        let format = match args.enum_value("format", FORMATS)?.as_deref() {
            Some("html") => ContentFormat::Html,
            Some("text") => ContentFormat::Text,
            _ => ContentFormat::Wikitext,
        };
        // exsentences and exchars are exclusive remotely; sentences wins.
        let sentences = args.integer("sentences")?.filter(|count| *count > 0);
        let chars = match sentences {
            Some(_) => None,
            None => args.integer("chars")?.filter(|count| *count > 0),
        };

        Ok(Self {
            page,
            method,
            format,
            sentences,
            chars,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = match self.method {
            GetMethod::Revisions => {
                let mut builder = ParamsBuilder::action("query");
                builder
                    .set("prop", "revisions")
                    .set("rvslots", "*")
                    .set("rvprop", "content|ids|timestamp");
                self.page.apply(&mut builder, "titles", "pageids");
                builder
            }
            GetMethod::Parse => {
                let mut builder = ParamsBuilder::action("parse");
                let prop = match self.format {
                    ContentFormat::Html => "text",
                    _ => "wikitext",
                };
                builder.set("prop", prop);
                self.page.apply(&mut builder, "page", "pageid");
                builder
            }
            GetMethod::Raw => {
                let mut builder = ParamsBuilder::action("raw");
                self.page.apply(&mut builder, "title", "curid");
                return builder.build();
            }
            GetMethod::Extracts => {
                let mut builder = ParamsBuilder::action("query");
                builder
                    .set("prop", "extracts")
                    .set("exlimit", "1")
                    .set_opt("exsentences", self.sentences)
                    .set_opt("exchars", self.chars)
                    .flag("explaintext", self.format == ContentFormat::Text);
                self.page.apply(&mut builder, "titles", "pageids");
                builder
            }
        };
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageContent {
    pub title: Option<String>,
    pub pageid: Option<u64>,
    pub revid: Option<u64>,
    pub method: GetMethod,
    pub format: ContentFormat,
    pub content: String,
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = GetRequest::from_args(args)?;
    let params = request.to_params();

    if request.method == GetMethod::Raw {
        let content = fetch_raw(client, &request, &params).await?;
        return Ok(OperationResult::new(content, Vec::new()));
    }

    let accepted = client.read(&params, request.warnings_as_error).await?;
    let content = match request.method {
        GetMethod::Parse => from_parse(&request, &accepted)?,
        _ => from_query(&request, &accepted)?,
    };
    Ok(OperationResult::new(content, accepted.warnings))
}

async fn fetch_raw(
    client: &WikiClient,
    request: &GetRequest,
    params: &NormalizedParameters,
) -> Result<PageContent> {
    let response = client.read_text(Endpoint::Index, params).await?;
    if response.status == 404 {
        return Err(missing_page(&request.page).into());
    }
    if !response.is_success() {
        return Err(TransportError::Unreachable(format!(
            "raw page request failed with HTTP {}",
            response.status
        ))
        .into());
    }
    let title = match &request.page {
        PageRef::Title(title) => Some(title.clone()),
        PageRef::PageId(_) => None,
    };
    let pageid = match &request.page {
        PageRef::PageId(id) => Some(*id),
        PageRef::Title(_) => None,
    };
    Ok(PageContent {
        title,
        pageid,
        revid: None,
        method: GetMethod::Raw,
        format: ContentFormat::Wikitext,
        content: response.body,
    })
}

fn from_query(request: &GetRequest, accepted: &Accepted) -> Result<PageContent, ApiError> {
    let page = accepted
        .subtree(&["query", "pages"])?
        .as_array()
        .and_then(|pages| pages.first())
        .ok_or_else(|| ApiError::shape("empty `query.pages` in response"))?;
    if page.get("missing").is_some() {
        return Err(missing_page(&request.page));
    }
    if page.get("invalid").is_some() {
        let reason = string_field(page, "invalidreason").unwrap_or_default();
        return Err(ApiError::remote("invalidtitle", reason));
    }

    let (content, revid) = match request.method {
        GetMethod::Extracts => (string_field(page, "extract").unwrap_or_default(), None),
        _ => {
            let revision = page
                .get("revisions")
                .and_then(Value::as_array)
                .and_then(|revisions| revisions.first())
                .ok_or_else(|| ApiError::shape("missing `revisions` for page"))?;
            let content = revision
                .get("slots")
                .and_then(|slots| slots.get("main"))
                .and_then(|main| string_field(main, "content"))
                .or_else(|| string_field(revision, "content"))
                .ok_or_else(|| ApiError::shape("missing main slot content"))?;
            (content, u64_field(revision, "revid"))
        }
    };

    Ok(PageContent {
        title: string_field(page, "title"),
        pageid: u64_field(page, "pageid"),
        revid,
        method: request.method,
        format: match request.method {
            GetMethod::Extracts => request.format,
            _ => ContentFormat::Wikitext,
        },
        content,
    })
}

fn from_parse(request: &GetRequest, accepted: &Accepted) -> Result<PageContent, ApiError> {
    let parse = accepted.subtree(&["parse"])?;
    let (field, format) = match request.format {
        ContentFormat::Html => ("text", ContentFormat::Html),
        _ => ("wikitext", ContentFormat::Wikitext),
    };
    let content = match parse.get(field) {
        Some(Value::String(text)) => text.clone(),
        // formatversion=1 wraps the body as {"*": ...}.
        Some(wrapped) => string_field(wrapped, "*")
            .ok_or_else(|| ApiError::shape(format!("unreadable `parse.{field}`")))?,
        None => return Err(ApiError::shape(format!("missing `parse.{field}` in response"))),
    };
    Ok(PageContent {
        title: string_field(parse, "title"),
        pageid: u64_field(parse, "pageid"),
        revid: u64_field(parse, "revid"),
        method: GetMethod::Parse,
        format,
        content,
    })
}

fn missing_page(page: &PageRef) -> ApiError {
    match page {
        PageRef::Title(title) => {
            ApiError::remote("missingtitle", format!("The page \"{title}\" does not exist."))
        }
        PageRef::PageId(id) => {
            ApiError::remote("nosuchpageid", format!("There is no page with ID {id}."))
        }
    }
}
