//! Query option construction.
//!
//! Structured query parameters recognized on tool invocations are collected
//! into a [`QueryOptions`] value and appended to the outgoing request as
//! independent query components. Unrecognized parameters are ignored; empty
//! values are dropped.

use serde_json::Value;

/// The query components attached to a read/list/navigate request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Filter expression, passed through to the service's query language.
    pub filter: Option<String>,

    /// Ordering expression.
    pub orderby: Option<String>,

    /// Field-selection list.
    pub select: Option<Vec<String>>,

    /// Expansion list for related entities.
    pub expand: Option<String>,

    /// Page size.
    pub top: Option<u32>,

    /// Page offset.
    pub skip: Option<u32>,

    /// Whether to include the total result count.
    pub count: bool,

    /// Free-text search expression.
    pub search: Option<String>,
}

impl QueryOptions {
    /// Collect recognized query parameters from tool arguments.
    ///
    /// Both bare (`filter`) and service-style (`$filter`) spellings are
    /// accepted. Anything else in `arguments` is left alone for the caller
    /// to interpret.
    pub fn from_arguments(arguments: &serde_json::Map<String, Value>) -> Self {
        let mut options = QueryOptions::default();

        if let Some(filter) = string_argument(arguments, &["filter", "$filter"]) {
            options.filter = Some(filter);
        }
        if let Some(orderby) = string_argument(arguments, &["orderby", "$orderby"]) {
            options.orderby = Some(orderby);
        }
        if let Some(select) = string_argument(arguments, &["select", "$select"]) {
            let fields: Vec<String> = select
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !fields.is_empty() {
                options.select = Some(fields);
            }
        }
        if let Some(expand) = string_argument(arguments, &["expand", "$expand"]) {
            options.expand = Some(expand);
        }
        options.top = integer_argument(arguments, &["top", "$top"]);
        options.skip = integer_argument(arguments, &["skip", "$skip"]);
        options.count = boolean_argument(arguments, &["count", "$count"]).unwrap_or(false);
        if let Some(search) = string_argument(arguments, &["search", "$search"]) {
            options.search = Some(search);
        }

        options
    }

    /// Apply the default field selection: all properties minus binary ones.
    ///
    /// Does nothing when the caller selected fields explicitly, and emits
    /// no selection when nothing would be excluded.
    pub fn apply_default_select(&mut self, all_properties: &[String], binary: &[String]) {
        if self.select.is_some() || binary.is_empty() {
            return;
        }
        let reduced: Vec<String> = all_properties
            .iter()
            .filter(|p| !binary.contains(p))
            .cloned()
            .collect();
        if reduced.len() == all_properties.len() {
            return;
        }
        self.select = Some(reduced);
    }

    /// Bound the response size when the caller gave no page size.
    pub fn apply_default_page_size(&mut self, default_top: u32) {
        if self.top.is_none() {
            self.top = Some(default_top);
        }
    }

    /// The deepest expansion path requested, measured in segments.
    ///
    /// `"Orders"` is depth 1, `"Orders/Items"` depth 2. Zero when no
    /// expansion is requested.
    pub fn expand_depth(&self) -> usize {
        self.expand
            .as_deref()
            .map(|expr| {
                expr.split(',')
                    .map(|item| item.trim())
                    .filter(|item| !item.is_empty())
                    .map(|item| item.split('/').count())
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Whether no component is set.
    pub fn is_empty(&self) -> bool {
        *self == QueryOptions::default()
    }

    /// Render the components as query-string pairs.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("$filter".to_string(), filter.clone()));
        }
        if let Some(orderby) = &self.orderby {
            pairs.push(("$orderby".to_string(), orderby.clone()));
        }
        if let Some(select) = &self.select {
            pairs.push(("$select".to_string(), select.join(",")));
        }
        if let Some(expand) = &self.expand {
            pairs.push(("$expand".to_string(), expand.clone()));
        }
        if let Some(top) = self.top {
            pairs.push(("$top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("$skip".to_string(), skip.to_string()));
        }
        if self.count {
            pairs.push(("$count".to_string(), "true".to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("$search".to_string(), search.clone()));
        }
        pairs
    }
}

/// First non-empty string value among the accepted spellings.
fn string_argument(
    arguments: &serde_json::Map<String, Value>,
    names: &[&str],
) -> Option<String> {
    for name in names {
        if let Some(value) = arguments.get(*name).and_then(Value::as_str) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// First integer value among the accepted spellings; numeric strings count.
fn integer_argument(
    arguments: &serde_json::Map<String, Value>,
    names: &[&str],
) -> Option<u32> {
    for name in names {
        match arguments.get(*name) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    return u32::try_from(v).ok();
                }
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<u32>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

/// First boolean value among the accepted spellings.
fn boolean_argument(
    arguments: &serde_json::Map<String, Value>,
    names: &[&str],
) -> Option<bool> {
    for name in names {
        match arguments.get(*name) {
            Some(Value::Bool(b)) => return Some(*b),
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<bool>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}
