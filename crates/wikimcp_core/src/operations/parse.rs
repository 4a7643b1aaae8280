use serde::Serialize;
use serde_json::{Map, Value};

use super::{apply_common, string_field, u64_field, warnings_as_error};
use crate::client::WikiClient;
use crate::error::{ApiError, Result, ValidationError};
use crate::params::{Args, NormalizedParameters, ParamsBuilder, validate_parse_section};
use crate::result::OperationResult;
use crate::transport::HttpMethod;

/// What is being parsed. `title` alone addresses an existing page; with
/// `text` or `summary` it only gives the content a context title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSource {
    Revision(u64),
    PageId(u64),
    Page(String),
    Text {
        text: String,
        title: Option<String>,
    },
    Summary {
        summary: String,
        title: Option<String>,
    },
}

impl ParseSource {
    fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        args.require_any(&["title", "pageid", "oldid", "text", "page", "summary"])?;
        args.exclusive(&["page", "pageid", "oldid", "text", "summary"])?;
        args.exclusive(&["title", "page", "pageid", "oldid"])?;

        let title = args.string("title")?;
        if let Some(oldid) = args.id("oldid")? {
            return Ok(Self::Revision(oldid));
        }
        if let Some(pageid) = args.id("pageid")? {
            return Ok(Self::PageId(pageid));
        }
        if let Some(page) = args.string("page")? {
            return Ok(Self::Page(page));
        }
        if let Some(text) = args.content("text")? {
            return Ok(Self::Text { text, title });
        }
        if let Some(summary) = args.string("summary")? {
            return Ok(Self::Summary { summary, title });
        }
        match title {
            Some(title) => Ok(Self::Page(title)),
            None => Err(ValidationError::missing_one_of(&[
                "title", "pageid", "oldid", "text", "page", "summary",
            ])),
        }
    }

    fn is_existing_page(&self) -> bool {
        matches!(self, Self::Revision(_) | Self::PageId(_) | Self::Page(_))
    }

    /// Inline text rides in the request body rather than the query string.
    fn method(&self) -> HttpMethod {
        if self.is_existing_page() {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        }
    }

    fn apply(&self, builder: &mut ParamsBuilder) {
        match self {
            Self::Revision(oldid) => {
                builder.set("oldid", oldid.to_string());
            }
            Self::PageId(pageid) => {
                builder.set("pageid", pageid.to_string());
            }
            Self::Page(page) => {
                builder.set("page", page.as_str());
            }
            Self::Text { text, title } => {
                builder.set("text", text.as_str()).set_opt("title", title.as_deref());
            }
            Self::Summary { summary, title } => {
                builder.set("summary", summary.as_str()).set_opt("title", title.as_deref());
            }
        }
    }
}

/// Property set requested when the caller names none. Summaries take none.
fn default_prop(source: &ParseSource, pst: bool, onlypst: bool) -> Vec<&'static str> {
    if matches!(source, ParseSource::Summary { .. }) {
        return Vec::new();
    }
    let mut prop = vec!["text", "categories", "links", "sections", "revid"];
    if source.is_existing_page() {
        prop.extend(["displaytitle", "parsewarnings"]);
        prop.extend(["templates", "images", "externallinks"]);
        if !pst && !onlypst {
            prop.extend(["langlinks", "iwlinks", "properties"]);
        }
    }
    prop
}

const FLAGS: &[&str] = &[
    "redirects",
    "usearticle",
    "parsoid",
    "pst",
    "onlypst",
    "disablelimitreport",
    "disableeditsection",
    "disablestylededuplication",
    "showstrategykeys",
    "preview",
    "sectionpreview",
    "disabletoc",
    "mobileformat",
];

const STRINGS: &[&str] = &[
    "sectiontitle",
    "wrapoutputclass",
    "useskin",
    "contentformat",
    "contentmodel",
    "templatesandboxtitle",
    "templatesandboxtext",
    "templatesandboxcontentmodel",
    "templatesandboxcontentformat",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    pub source: ParseSource,
    pub revid: Option<u64>,
    pub prop: Vec<String>,
    pub section: Option<String>,
    pub templatesandboxprefix: Option<Vec<String>>,
    /// Boolean switches that are set, in declaration order.
    pub flags: Vec<&'static str>,
    /// Plain string options that are set.
    pub options: Vec<(&'static str, String)>,
    pub warnings_as_error: bool,
}

impl ParseRequest {
    pub fn from_args(args: Args<'_>) -> Result<Self, ValidationError> {
        let source = ParseSource::from_args(args)?;

        let section = args.string("section")?;
        if let Some(section) = &section {
            validate_parse_section(section)?;
        }

        let mut flags = Vec::new();
        for flag in FLAGS {
            if args.flag(flag)? {
                flags.push(*flag);
            }
        }
        let mut options = Vec::new();
        for name in STRINGS {
            if let Some(value) = args.string(name)? {
                options.push((*name, value));
            }
        }

        let prop = match args.list("prop")? {
            Some(prop) => prop,
            None => default_prop(&source, flags.contains(&"pst"), flags.contains(&"onlypst"))
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        };

        Ok(Self {
            source,
            revid: args.id("revid")?,
            prop,
            section,
            templatesandboxprefix: args.list("templatesandboxprefix")?,
            flags,
            options,
            warnings_as_error: warnings_as_error(args)?,
        })
    }

    pub fn to_params(&self) -> NormalizedParameters {
        let mut builder = ParamsBuilder::action("parse");
        self.source.apply(&mut builder);
        builder
            .set_opt("revid", self.revid)
            .list("prop", &self.prop)
            .set_opt("section", self.section.as_deref())
            .list_opt("templatesandboxprefix", self.templatesandboxprefix.as_deref());
        for flag in &self.flags {
            builder.flag(flag, true);
        }
        for (name, value) in &self.options {
            builder.set(name, value.as_str());
        }
        apply_common(&mut builder, self.warnings_as_error);
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub title: Option<String>,
    pub pageid: Option<u64>,
    pub revid: Option<u64>,
    pub displaytitle: Option<String>,
    pub text: Option<String>,
    pub wikitext: Option<String>,
    /// Every other returned property (links, categories, sections, ...).
    pub properties: Map<String, Value>,
}

impl ParseResult {
    fn from_payload(parse: &Value) -> Result<Self, ApiError> {
        let Some(object) = parse.as_object() else {
            return Err(ApiError::shape("`parse` is not an object"));
        };
        let mut properties = object.clone();
        for known in ["title", "pageid", "revid", "displaytitle", "text", "wikitext"] {
            properties.remove(known);
        }
        Ok(Self {
            title: string_field(parse, "title"),
            pageid: u64_field(parse, "pageid"),
            revid: u64_field(parse, "revid"),
            displaytitle: string_field(parse, "displaytitle"),
            text: body_field(parse, "text"),
            wikitext: body_field(parse, "wikitext"),
            properties,
        })
    }
}

// formatversion=1 wraps bodies as {"*": ...}.
fn body_field(parse: &Value, key: &str) -> Option<String> {
    match parse.get(key)? {
        Value::String(text) => Some(text.clone()),
        wrapped => string_field(wrapped, "*"),
    }
}

pub async fn run(client: &WikiClient, args: Args<'_>) -> Result<OperationResult> {
    let request = ParseRequest::from_args(args)?;
    let method = if request.options.iter().any(|(name, _)| *name == "templatesandboxtext") {
        HttpMethod::Post
    } else {
        request.source.method()
    };
    let accepted = client
        .read_with(method, &request.to_params(), request.warnings_as_error)
        .await?;
    let result = ParseResult::from_payload(accepted.subtree(&["parse"])?)?;
    Ok(OperationResult::new(result, accepted.warnings))
}
