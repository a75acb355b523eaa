//! Parsed representation of a FHIR search query.

use std::fmt;
use std::str::FromStr;

use super::SearchParamType;

/// Prefix comparator applied to date/number search values.
///
/// A two-letter prefix maps to a SQL operator; an unprefixed value behaves
/// as `eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `eq` -> `=`
    Eq,
    /// `ne` -> `!=`
    Ne,
    /// `gt` -> `>`
    Gt,
    /// `ge` -> `>=`
    Ge,
    /// `lt` -> `<`
    Lt,
    /// `le` -> `<=`
    Le,
    /// `sa` ("starts after") -> `>`
    Sa,
    /// `eb` ("ends before") -> `<`
    Eb,
}

impl Comparator {
    /// Splits a leading two-letter prefix off a search value, if present.
    pub fn parse_prefix(value: &str) -> (Self, &str) {
        if value.len() >= 2 {
            let (prefix, rest) = value.split_at(2);
            let cmp = match prefix {
                "eq" => Some(Self::Eq),
                "ne" => Some(Self::Ne),
                "gt" => Some(Self::Gt),
                "ge" => Some(Self::Ge),
                "lt" => Some(Self::Lt),
                "le" => Some(Self::Le),
                "sa" => Some(Self::Sa),
                "eb" => Some(Self::Eb),
                _ => None,
            };
            if let Some(cmp) = cmp {
                return (cmp, rest);
            }
        }
        (Self::Eq, value)
    }

    /// The SQL operator this comparator compiles to.
    pub fn sql_operator(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt | Self::Sa => ">",
            Self::Ge => ">=",
            Self::Lt | Self::Eb => "<",
            Self::Le => "<=",
        }
    }
}

/// One classified query-string parameter, after the value-shape rules have
/// been applied (reference vs. token vs. date/number vs. string).
#[derive(Debug, Clone)]
pub enum ParsedParam {
    /// `_id=value`
    Id(String),
    /// A reference parameter: `patient=Patient/123` or bare `123`.
    Reference {
        /// The catalog parameter name, e.g. `patient`.
        name: String,
        /// Target type, if the value carried one (`Type/id` form).
        target_type: Option<String>,
        /// Target id.
        target_id: String,
    },
    /// A token parameter: `code`, `sys|code`, `|code`, `sys|`.
    Token {
        /// Catalog parameter name.
        name: String,
        /// System half, if present and non-empty.
        system: Option<String>,
        /// Code half, if present and non-empty.
        code: Option<String>,
    },
    /// A date or number parameter with an optional comparator prefix.
    Comparable {
        /// Catalog parameter name.
        name: String,
        /// Declared catalog type (date or number).
        param_type: SearchParamType,
        /// Comparator applied to `value`.
        comparator: Comparator,
        /// The remaining value after the prefix was stripped.
        value: String,
    },
    /// A plain string parameter, matched with `LIKE '%value%'`.
    StringMatch {
        /// Catalog parameter name.
        name: String,
        /// Value to search for.
        value: String,
    },
}

/// `_sort` directive (SPEC_FULL addition): single field, optional `-` for
/// descending.
#[derive(Debug, Clone)]
pub struct SortDirective {
    /// Field/search-parameter name to sort by.
    pub field: String,
    /// Descending when true.
    pub descending: bool,
}

impl SortDirective {
    /// Parses a `_sort` value, e.g. `-_lastUpdated`.
    pub fn parse(raw: &str) -> Self {
        if let Some(field) = raw.strip_prefix('-') {
            Self {
                field: field.to_string(),
                descending: true,
            }
        } else {
            Self {
                field: raw.to_string(),
                descending: false,
            }
        }
    }
}

/// The kind of a `_include`/`_revinclude` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `_include`
    Include,
    /// `_revinclude`
    RevInclude,
}

/// A parsed `_include`/`_revinclude` directive: `SourceType:param[:TargetType]`
/// or `*`.
#[derive(Debug, Clone)]
pub struct IncludeDirective {
    /// Whether this is a forward or reverse include.
    pub kind: IncludeKind,
    /// `true` for the wildcard form `*`.
    pub wildcard: bool,
    /// Source resource type named by the directive (absent when wildcard).
    pub source_type: Option<String>,
    /// Search parameter named by the directive (absent when wildcard).
    pub search_param: Option<String>,
    /// Target type constraint, if given.
    pub target_type: Option<String>,
}

impl IncludeDirective {
    /// Parses one `_include`/`_revinclude` value.
    pub fn parse(kind: IncludeKind, raw: &str) -> Self {
        if raw == "*" {
            return Self {
                kind,
                wildcard: true,
                source_type: None,
                search_param: None,
                target_type: None,
            };
        }
        let mut parts = raw.splitn(3, ':');
        let source_type = parts.next().map(|s| s.to_string());
        let search_param = parts.next().map(|s| s.to_string());
        let target_type = parts.next().map(|s| s.to_string());
        Self {
            kind,
            wildcard: false,
            source_type,
            search_param,
            target_type,
        }
    }
}

/// A fully parsed search request against one resource type.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    /// Classified non-control parameters, ANDed together.
    pub params: Vec<ParsedParam>,
    /// `_include` directives.
    pub includes: Vec<IncludeDirective>,
    /// `_revinclude` directives.
    pub revincludes: Vec<IncludeDirective>,
    /// `_count` (page size); `None` uses the engine default.
    pub count: Option<usize>,
    /// Zero-based page offset, in units of `count`.
    pub page: usize,
    /// `_sort` directive, if present.
    pub sort: Option<SortDirective>,
}

impl fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncludeKind::Include => write!(f, "_include"),
            IncludeKind::RevInclude => write!(f, "_revinclude"),
        }
    }
}

impl FromStr for Comparator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "ge" => Ok(Self::Ge),
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            "sa" => Ok(Self::Sa),
            "eb" => Ok(Self::Eb),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparator_prefix_parses() {
        assert_eq!(Comparator::parse_prefix("ge2024-01-01").0.sql_operator(), ">=");
        assert_eq!(Comparator::parse_prefix("2024-01-01").0.sql_operator(), "=");
    }

    #[test]
    fn include_directive_parses_three_parts() {
        let d = IncludeDirective::parse(IncludeKind::Include, "Appointment:patient:Patient");
        assert_eq!(d.source_type.as_deref(), Some("Appointment"));
        assert_eq!(d.search_param.as_deref(), Some("patient"));
        assert_eq!(d.target_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn include_directive_wildcard() {
        let d = IncludeDirective::parse(IncludeKind::Include, "*");
        assert!(d.wildcard);
    }

    #[test]
    fn sort_directive_descending() {
        let s = SortDirective::parse("-_lastUpdated");
        assert!(s.descending);
        assert_eq!(s.field, "_lastUpdated");
    }
}
