use serde::Serialize;

use crate::envelope::ApiWarning;
use crate::operations::compare::CompareResult;
use crate::operations::delete::DeleteResult;
use crate::operations::edit::EditResult;
use crate::operations::get::PageContent;
use crate::operations::move_page::MoveResult;
use crate::operations::opensearch::OpenSearchResult;
use crate::operations::parse::ParseResult;
use crate::operations::search::SearchResult;
use crate::operations::siteinfo::SiteInfoResult;
use crate::operations::undelete::UndeleteResult;

/// Structured outcome of one tool call. Non-fatal remote warnings travel
/// alongside the payload rather than inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    #[serde(flatten)]
    pub payload: OperationPayload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ApiWarning>,
}

impl OperationResult {
    pub fn new(payload: impl Into<OperationPayload>, warnings: Vec<ApiWarning>) -> Self {
        Self {
            payload: payload.into(),
            warnings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OperationPayload {
    Edit(EditResult),
    Page(PageContent),
    Move(MoveResult),
    Delete(DeleteResult),
    Undelete(UndeleteResult),
    Search(SearchResult),
    OpenSearch(OpenSearchResult),
    Compare(CompareResult),
    Parse(ParseResult),
    SiteInfo(SiteInfoResult),
}

macro_rules! payload_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for OperationPayload {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

payload_from!(
    Edit(EditResult),
    Page(PageContent),
    Move(MoveResult),
    Delete(DeleteResult),
    Undelete(UndeleteResult),
    Search(SearchResult),
    OpenSearch(OpenSearchResult),
    Compare(CompareResult),
    Parse(ParseResult),
    SiteInfo(SiteInfoResult),
);
