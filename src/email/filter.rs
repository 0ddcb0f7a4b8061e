//! Email search filter.
//!
//! The searchable fields of [`Email`] are declared once, in
//! [`EMAIL_FILTER_FIELDS`]. An [`EmailFilter`] is compiled against that table
//! into predicates, which are rendered either as a SQL `WHERE` clause or
//! evaluated directly against an in-memory [`Email`]. Both paths share the
//! same semantics:
//!
//! - `ts`: closed interval, either bound may be open.
//! - `term`: ASCII case-insensitive substring of subject, body, to or from.
//! - `status`: equality.
//!
//! Present criteria are combined with AND.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;

use super::types::{Email, EmailStatus};
use crate::datetime::{ceil_to_storage, floor_to_storage, parse_timestamp, to_db_string};

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact match.
    Eq,
    /// Closed interval with optional bounds.
    Range,
    /// Text search across several fields.
    Term,
}

impl FilterOp {
    /// Short operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Range => "..",
            FilterOp::Term => "T",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Filter compilation errors.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    /// A compare field does not exist on Email.
    #[error("unknown filter field: {0}")]
    UnknownField(String),

    /// The operator cannot be applied to the field's type.
    #[error("operator {op} not allowed on field {field}")]
    OperatorNotAllowed {
        /// Field name.
        field: String,
        /// Rejected operator.
        op: FilterOp,
    },

    /// The criterion is declared but switched off.
    #[error("filter criterion {0} is not queryable")]
    NotQueryable(String),

    /// A single-field operator was declared with zero or several fields.
    #[error("filter criterion {0} must compare exactly one field")]
    InvalidSpec(String),

    /// A query value could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Query key.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Field of [`Email`] that a filter can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailField {
    Id,
    From,
    To,
    Subject,
    Body,
    Status,
    IsOut,
    IsSeen,
    Ts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Status,
    Bool,
    Timestamp,
}

impl EmailField {
    /// Resolve a field by its Email field name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(EmailField::Id),
            "from" => Some(EmailField::From),
            "to" => Some(EmailField::To),
            "subject" => Some(EmailField::Subject),
            "body" => Some(EmailField::Body),
            "status" => Some(EmailField::Status),
            "isOut" => Some(EmailField::IsOut),
            "isSeen" => Some(EmailField::IsSeen),
            "ts" => Some(EmailField::Ts),
            _ => None,
        }
    }

    /// Column in the `emails` table.
    pub fn column(&self) -> &'static str {
        match self {
            EmailField::Id => "id",
            EmailField::From => "sender",
            EmailField::To => "recipient",
            EmailField::Subject => "subject",
            EmailField::Body => "body",
            EmailField::Status => "status",
            EmailField::IsOut => "is_out",
            EmailField::IsSeen => "is_seen",
            EmailField::Ts => "ts",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            EmailField::Id
            | EmailField::From
            | EmailField::To
            | EmailField::Subject
            | EmailField::Body => FieldKind::Text,
            EmailField::Status => FieldKind::Status,
            EmailField::IsOut | EmailField::IsSeen => FieldKind::Bool,
            EmailField::Ts => FieldKind::Timestamp,
        }
    }

    fn allows(&self, op: FilterOp) -> bool {
        match op {
            FilterOp::Eq => matches!(self.kind(), FieldKind::Text | FieldKind::Status),
            FilterOp::Range => self.kind() == FieldKind::Timestamp,
            FilterOp::Term => self.kind() == FieldKind::Text,
        }
    }

    fn text_of<'e>(&self, email: &'e Email) -> Option<&'e str> {
        match self {
            EmailField::Id => email.id.as_ref().map(|id| id.as_str()),
            EmailField::From => Some(email.from.as_str()),
            EmailField::To => email.to.as_deref(),
            EmailField::Subject => email.subject.as_deref(),
            EmailField::Body => email.body.as_deref(),
            EmailField::Status => Some(email.status.as_str()),
            EmailField::IsOut | EmailField::IsSeen | EmailField::Ts => None,
        }
    }
}

/// Declarative description of one filter criterion.
#[derive(Debug, Clone, Copy)]
pub struct FilterFieldSpec {
    /// Criterion name on [`EmailFilter`].
    pub name: &'static str,
    /// Whether the criterion may be used at all.
    pub queryable: bool,
    /// Operator applied.
    pub op: FilterOp,
    /// Email fields the operator compares against.
    pub compare_fields: &'static [&'static str],
}

/// Filter configuration for [`Email`].
pub const EMAIL_FILTER_FIELDS: &[FilterFieldSpec] = &[
    FilterFieldSpec {
        name: "ts",
        queryable: true,
        op: FilterOp::Range,
        compare_fields: &["ts"],
    },
    FilterFieldSpec {
        name: "term",
        queryable: true,
        op: FilterOp::Term,
        compare_fields: &["subject", "body", "to", "from"],
    },
    FilterFieldSpec {
        name: "status",
        queryable: true,
        op: FilterOp::Eq,
        compare_fields: &["status"],
    },
];

/// Closed timestamp interval; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsRange {
    /// Inclusive lower bound.
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl TsRange {
    /// Interval `[from, to]`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Interval `[from, ∞)`.
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// Interval `(-∞, to]`.
    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    /// Check if neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// The same interval with bounds moved onto storage precision.
    ///
    /// Stored timestamps carry microseconds, so rounding `from` up and `to`
    /// down keeps exactly the stored instants the exact bounds would keep.
    pub fn at_storage_precision(&self) -> Self {
        Self {
            from: self.from.as_ref().map(ceil_to_storage),
            to: self.to.as_ref().map(floor_to_storage),
        }
    }

    /// Check if `ts` lies inside the interval.
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *ts >= from) && self.to.map_or(true, |to| *ts <= to)
    }
}

/// Search criteria for emails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailFilter {
    /// Timestamp interval.
    #[serde(default)]
    pub ts: Option<TsRange>,
    /// Text to look for in subject, body, to and from.
    #[serde(default)]
    pub term: Option<String>,
    /// Exact status.
    #[serde(default)]
    pub status: Option<EmailStatus>,
}

/// A compiled criterion.
#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq {
        field: EmailField,
        value: String,
    },
    Range {
        field: EmailField,
        range: TsRange,
    },
    Term {
        fields: Vec<EmailField>,
        needle: String,
    },
}

/// Value carried by a criterion of the filter.
enum CriterionValue<'f> {
    Range(TsRange),
    Text(&'f str),
    Status(EmailStatus),
}

impl EmailFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a timestamp interval.
    pub fn with_ts(mut self, range: TsRange) -> Self {
        self.ts = Some(range);
        self
    }

    /// Restrict to emails containing `term`.
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Restrict to one status.
    pub fn with_status(mut self, status: EmailStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Build a filter from query-string pairs.
    ///
    /// Keys are case-insensitive and `.` may be used instead of `_`:
    /// `ts.from`, `ts.to`, `term` (alias `T`), `status`. Unknown keys are
    /// ignored.
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::new();

        for (key, value) in pairs {
            let raw_key = key.as_ref();
            let value = value.as_ref();
            let invalid = || FilterError::InvalidValue {
                key: raw_key.to_string(),
                value: value.to_string(),
            };

            match raw_key.replace('.', "_").to_lowercase().as_str() {
                "ts_from" => {
                    let ts = parse_timestamp(value).ok_or_else(invalid)?;
                    filter.ts.get_or_insert_with(TsRange::default).from = Some(ts);
                }
                "ts_to" => {
                    let ts = parse_timestamp(value).ok_or_else(invalid)?;
                    filter.ts.get_or_insert_with(TsRange::default).to = Some(ts);
                }
                "term" | "t" => filter.term = Some(value.to_string()),
                "status" => filter.status = Some(value.parse().map_err(|_| invalid())?),
                _ => {}
            }
        }

        Ok(filter)
    }

    /// Check if the filter has no effective criteria.
    pub fn is_empty(&self) -> bool {
        self.ts.map_or(true, |range| range.is_unbounded())
            && self.normalized_term().is_none()
            && self.status.is_none()
    }

    fn normalized_term(&self) -> Option<&str> {
        self.term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    fn value_for(&self, name: &str) -> Option<CriterionValue<'_>> {
        match name {
            "ts" => self
                .ts
                .filter(|range| !range.is_unbounded())
                .map(CriterionValue::Range),
            "term" => self.normalized_term().map(CriterionValue::Text),
            "status" => self.status.map(CriterionValue::Status),
            _ => None,
        }
    }

    fn compile(&self, specs: &[FilterFieldSpec]) -> Result<Vec<Predicate>, FilterError> {
        let mut predicates = Vec::new();

        for spec in specs {
            let Some(value) = self.value_for(spec.name) else {
                continue;
            };
            if !spec.queryable {
                return Err(FilterError::NotQueryable(spec.name.to_string()));
            }

            let fields = spec
                .compare_fields
                .iter()
                .map(|name| {
                    let field = EmailField::from_name(name)
                        .ok_or_else(|| FilterError::UnknownField(name.to_string()))?;
                    if !field.allows(spec.op) {
                        return Err(FilterError::OperatorNotAllowed {
                            field: name.to_string(),
                            op: spec.op,
                        });
                    }
                    Ok(field)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let predicate = match (spec.op, value) {
                (FilterOp::Term, CriterionValue::Text(term)) if !fields.is_empty() => {
                    Predicate::Term {
                        fields,
                        needle: term.to_ascii_lowercase(),
                    }
                }
                (FilterOp::Range, CriterionValue::Range(range)) => Predicate::Range {
                    field: single_field(spec, &fields)?,
                    range: range.at_storage_precision(),
                },
                (FilterOp::Eq, CriterionValue::Status(status)) => Predicate::Eq {
                    field: single_field(spec, &fields)?,
                    value: status.as_str().to_string(),
                },
                (FilterOp::Eq, CriterionValue::Text(text)) => Predicate::Eq {
                    field: single_field(spec, &fields)?,
                    value: text.to_string(),
                },
                (FilterOp::Term, _) if fields.is_empty() => {
                    return Err(FilterError::InvalidSpec(spec.name.to_string()))
                }
                (op, _) => {
                    return Err(FilterError::OperatorNotAllowed {
                        field: spec.name.to_string(),
                        op,
                    })
                }
            };
            predicates.push(predicate);
        }

        Ok(predicates)
    }

    /// Check whether an email satisfies every criterion.
    pub fn matches(&self, email: &Email) -> Result<bool, FilterError> {
        self.matches_with(EMAIL_FILTER_FIELDS, email)
    }

    fn matches_with(&self, specs: &[FilterFieldSpec], email: &Email) -> Result<bool, FilterError> {
        let predicates = self.compile(specs)?;
        Ok(predicates.iter().all(|predicate| match predicate {
            Predicate::Eq { field, value } => field.text_of(email) == Some(value.as_str()),
            Predicate::Range { range, .. } => range.contains(&email.ts),
            Predicate::Term { fields, needle } => fields.iter().any(|field| {
                field
                    .text_of(email)
                    .is_some_and(|text| text.to_ascii_lowercase().contains(needle.as_str()))
            }),
        }))
    }

    /// Append a ` WHERE ...` clause for this filter to `query`.
    ///
    /// Nothing is appended when the filter has no effective criteria.
    pub fn push_where(&self, query: &mut QueryBuilder<'_, Sqlite>) -> Result<(), FilterError> {
        self.push_where_with(EMAIL_FILTER_FIELDS, query)
    }

    fn push_where_with(
        &self,
        specs: &[FilterFieldSpec],
        query: &mut QueryBuilder<'_, Sqlite>,
    ) -> Result<(), FilterError> {
        let predicates = self.compile(specs)?;
        if predicates.is_empty() {
            return Ok(());
        }

        query.push(" WHERE ");
        for (i, predicate) in predicates.into_iter().enumerate() {
            if i > 0 {
                query.push(" AND ");
            }
            match predicate {
                Predicate::Eq { field, value } => {
                    query.push(field.column());
                    query.push(" = ");
                    query.push_bind(value);
                }
                Predicate::Range { field, range } => {
                    query.push("(1 = 1");
                    if let Some(from) = range.from {
                        query.push(" AND ");
                        query.push(field.column());
                        query.push(" >= ");
                        query.push_bind(to_db_string(&from));
                    }
                    if let Some(to) = range.to {
                        query.push(" AND ");
                        query.push(field.column());
                        query.push(" <= ");
                        query.push_bind(to_db_string(&to));
                    }
                    query.push(")");
                }
                Predicate::Term { fields, needle } => {
                    query.push("(");
                    for (j, field) in fields.iter().enumerate() {
                        if j > 0 {
                            query.push(" OR ");
                        }
                        query.push("instr(lower(COALESCE(");
                        query.push(field.column());
                        query.push(", '')), ");
                        query.push_bind(needle.clone());
                        query.push(") > 0");
                    }
                    query.push(")");
                }
            }
        }

        Ok(())
    }
}

fn single_field(spec: &FilterFieldSpec, fields: &[EmailField]) -> Result<EmailField, FilterError> {
    match fields {
        [field] => Ok(*field),
        _ => Err(FilterError::InvalidSpec(spec.name.to_string())),
    }
}

/// Offset/limit window over ordered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: i64,
    /// Maximum rows to return.
    pub limit: i64,
}

impl Page {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 50;

    /// Create a page window.
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    /// Force the window into `offset >= 0` and `1 <= limit <= max_limit`.
    pub fn clamped(self, max_limit: i64) -> Self {
        Self {
            offset: self.offset.max(0),
            limit: self.limit.clamp(1, max_limit.max(1)),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}
