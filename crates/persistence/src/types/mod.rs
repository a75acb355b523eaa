//! Core types shared across the storage engine.

mod query;
mod resource;

pub use query::{
    Comparator, IncludeDirective, IncludeKind, ParsedParam, ParsedQuery, SortDirective,
};
pub use resource::StoredResource;

/// A typed value extracted from a resource for indexing, shared by the
/// extractor (C5), the catalog (C4), and the EAV custom-parameter side
/// table.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    /// `string` / `uri` search parameter value.
    Text(String),
    /// `number` search parameter value.
    Number(f64),
    /// `date` search parameter value, already normalised to an ISO date or
    /// datetime string.
    Date(String),
    /// `token` search parameter value: `(system, code)`. `system` is `None`
    /// when the source value was a bare string.
    Token {
        /// Coding system URI, if present.
        system: Option<String>,
        /// Coding code.
        code: String,
    },
    /// `reference` search parameter value: `(target type, target id)`.
    Reference {
        /// FHIR resource type of the reference target.
        target_type: String,
        /// Logical id of the reference target.
        target_id: String,
    },
}

/// The kind of search parameter, matching the catalog's `searchParamType`
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchParamType {
    /// Free-text, prefix-matched (`LIKE '%value%'`).
    String,
    /// Coded value, optionally with a system.
    Token,
    /// Decimal or integer, with prefix comparators.
    Number,
    /// Partial or full date/datetime, with prefix comparators.
    Date,
    /// `Type/id` reference, resolved through the reference graph.
    Reference,
    /// Opaque URI, exact or prefix matched.
    Uri,
}

impl SearchParamType {
    /// Parses the catalog's string encoding of a search parameter type.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "reference" => Some(Self::Reference),
            "uri" => Some(Self::Uri),
            _ => None,
        }
    }

    /// Renders the catalog string encoding back out.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Token => "token",
            Self::Number => "number",
            Self::Date => "date",
            Self::Reference => "reference",
            Self::Uri => "uri",
        }
    }
}
