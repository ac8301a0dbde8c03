//! Collection listing parameters: filters, projection and pagination.
//!
//! The service's filter syntax is `query=<field>:<operator>:<value>`, or the
//! equality shorthand `query=<field>:<value>`. Every component is
//! percent-encoded; the `:` separators and the `,` joining projected fields
//! are left literal.

use std::fmt::Write as _;

/// Default page size used by the service and by `CollectionQuery::new`.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Comparison operators accepted in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Gte),
            "<=" => Some(Operator::Lte),
            _ => None,
        }
    }
}

/// A single `(field, operator, value)` filter.
///
/// `operator` is `None` for the two-part `field:value` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub operator: Option<Operator>,
    pub value: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            operator: Some(operator),
            value: value.to_string(),
        }
    }

    /// Two-part filter, `field:value`.
    pub fn matching(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            operator: None,
            value: value.to_string(),
        }
    }

    /// Encoded value of the `query` parameter, without the `query=` prefix.
    pub fn encode(&self) -> String {
        let field = urlencoding::encode(&self.field);
        let value = urlencoding::encode(&self.value);
        match self.operator {
            Some(op) => format!("{field}:{}:{value}", urlencoding::encode(op.as_str())),
            None => format!("{field}:{value}"),
        }
    }
}

/// How `get_collection` pages through a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pagination {
    /// Fetch page 1, read `item-count`, then every remaining page.
    #[default]
    All,
    /// Fetch exactly one page (1-based).
    Page(u32),
    /// Send no paging parameters; the service returns its default page.
    Disabled,
}

/// Parameters of a collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    pub pagination: Pagination,
    pub per_page: u32,
    pub project_on: Vec<String>,
    pub filters: Vec<Filter>,
    /// Raw `key=value` strings appended verbatim, ahead of everything else.
    pub extra_params: Vec<String>,
}

impl Default for CollectionQuery {
    fn default() -> Self {
        Self {
            pagination: Pagination::default(),
            per_page: DEFAULT_PER_PAGE,
            project_on: Vec::new(),
            filters: Vec::new(),
            extra_params: Vec::new(),
        }
    }
}

impl CollectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Page size; clamped to at least 1.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn project_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_on.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn extra_param(mut self, param: impl Into<String>) -> Self {
        self.extra_params.push(param.into());
        self
    }

    /// Query string (without the leading `?`) for the given page.
    ///
    /// `page` is ignored unless pagination is enabled. Returns an empty string
    /// when there is nothing to send.
    pub fn to_query_string(&self, page: u32) -> String {
        let mut params: Vec<String> = self.extra_params.clone();
        if !self.project_on.is_empty() {
            let fields: Vec<_> = self
                .project_on
                .iter()
                .map(|f| urlencoding::encode(f).into_owned())
                .collect();
            params.push(format!("projectOn={}", fields.join(",")));
        }
        for filter in &self.filters {
            params.push(format!("query={}", filter.encode()));
        }

        let mut query = params.join("&");
        let page = match self.pagination {
            Pagination::All => Some(page),
            Pagination::Page(n) => Some(n.max(1)),
            Pagination::Disabled => None,
        };
        if let Some(page) = page {
            if !query.is_empty() {
                query.push('&');
            }
            let _ = write!(query, "pageNumber={page}&perPage={}", self.per_page);
        }
        query
    }
}

/// Number of pages needed for `item_count` items; at least 1.
pub fn page_count(item_count: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let pages = item_count.div_ceil(per_page).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
