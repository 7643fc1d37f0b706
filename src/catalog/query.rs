use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Row predicate applied to the serialized form of a catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq { column: String, value: Value },
    Ne { column: String, value: Value },
    /// Case-insensitive substring match on any of `columns`.
    Like { columns: Vec<String>, needle: String },
}

impl Filter {
    fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq { column, value } => row.get(column) == Some(value),
            Filter::Ne { column, value } => row.get(column) != Some(value),
            Filter::Like { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|c| {
                    row.get(c)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

/// Paginated, filtered listing request.
///
/// `current` is 1-based. A `page_size` of 0 returns every matching row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    pub current: usize,
    pub page_size: usize,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub descending: bool,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl PageQuery {
    pub fn all() -> Self {
        Self {
            current: 1,
            page_size: 0,
            filters: Vec::new(),
            order_by: None,
            descending: false,
        }
    }

    pub fn page(current: usize, page_size: usize) -> Self {
        Self {
            current: current.max(1),
            page_size,
            ..Self::all()
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn ne(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn like(mut self, columns: &[&str], needle: &str) -> Self {
        if !needle.is_empty() {
            self.filters.push(Filter::Like {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                needle: needle.to_string(),
            });
        }
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order_by = Some(column.to_string());
        self.descending = descending;
        self
    }

    /// Set the default ordering unless the caller chose one.
    pub(crate) fn with_default_order(mut self, column: &str) -> Self {
        if self.order_by.is_none() {
            self.order_by = Some(column.to_string());
        }
        self
    }
}

/// One page of rows plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Apply `query` to `rows`.
pub fn paginate<T: Serialize>(rows: Vec<T>, query: &PageQuery) -> Page<T> {
    let mut keyed: Vec<(Value, T)> = rows
        .into_iter()
        .map(|r| (serde_json::to_value(&r).unwrap_or(Value::Null), r))
        .filter(|(v, _)| query.filters.iter().all(|f| f.matches(v)))
        .collect();
    if let Some(col) = &query.order_by {
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = compare(a.get(col), b.get(col));
            if query.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    let total = keyed.len();
    let rows = if query.page_size == 0 {
        keyed.into_iter().map(|(_, r)| r).collect()
    } else {
        keyed
            .into_iter()
            .skip((query.current.max(1) - 1).saturating_mul(query.page_size))
            .take(query.page_size)
            .map(|(_, r)| r)
            .collect()
    };
    Page { rows, total }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
