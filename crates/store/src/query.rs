//! Filtered collection queries, builder-style.

use std::cmp::Ordering;

use serde_json::Value;

use crate::{DocumentStore, StoreError};

/// Field predicate operators supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone)]
struct Filter {
    field: String,
    op: FilterOp,
    value: Value,
}

/// Builder for equality/range queries over the direct children of a
/// collection. Dates compare correctly because they are stored as ISO-8601
/// strings, which order lexicographically.
pub struct QueryBuilder<'a> {
    store: &'a DocumentStore,
    collection: String,
    filters: Vec<Filter>,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(store: &'a DocumentStore, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lt, value)
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gt, value)
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value)
    }

    fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Run the query, returning `(document id, value)` pairs in ascending
    /// id order. Documents missing a filtered field never match.
    pub async fn execute(self) -> Result<Vec<(String, Value)>, StoreError> {
        let rows = self.store.list_collection(&self.collection).await?;
        Ok(rows
            .into_iter()
            .filter(|(_, doc)| self.filters.iter().all(|f| matches_filter(doc, f)))
            .collect())
    }
}

fn matches_filter(doc: &Value, filter: &Filter) -> bool {
    let actual = match doc.get(&filter.field) {
        Some(value) => value,
        None => return false,
    };
    match filter.op {
        FilterOp::Eq => actual == &filter.value,
        op => match compare_values(actual, &filter.value) {
            Some(ordering) => match op {
                FilterOp::Lt => ordering == Ordering::Less,
                FilterOp::Lte => ordering != Ordering::Greater,
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Gte => ordering != Ordering::Less,
                FilterOp::Eq => unreachable!(),
            },
            None => false,
        },
    }
}

/// Ordering is defined for number/number and string/string pairs only;
/// mixed or unordered types never match a range filter.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn range_filters_compare_iso_dates_lexicographically() {
        let doc = json!({ "endDate": "2025-03-31" });
        let filter = Filter {
            field: "endDate".to_string(),
            op: FilterOp::Lt,
            value: json!("2025-04-01"),
        };
        assert!(matches_filter(&doc, &filter));

        let boundary = Filter {
            field: "endDate".to_string(),
            op: FilterOp::Lt,
            value: json!("2025-03-31"),
        };
        assert!(!matches_filter(&doc, &boundary));
    }

    #[test]
    fn missing_field_never_matches() {
        let doc = json!({ "other": 1 });
        let filter = Filter {
            field: "endDate".to_string(),
            op: FilterOp::Eq,
            value: json!("2025-03-31"),
        };
        assert!(!matches_filter(&doc, &filter));
    }

    #[test]
    fn mixed_types_never_match_range() {
        let doc = json!({ "n": "12" });
        let filter = Filter {
            field: "n".to_string(),
            op: FilterOp::Gte,
            value: json!(5),
        };
        assert!(!matches_filter(&doc, &filter));
    }
}
