//! Normalization of declarative per-column sort and filter directives into
//! the provider-facing parameter lists.
//!
//! Columns declare their intent ("sort me descending", "filter on this
//! value"); these functions fold those directives into the ordered
//! [`SortOrder`] and [`Filter`] lists a [`ProviderParams`] carries, so the
//! provider only ever sees one canonical representation.
//!
//! [`ProviderParams`]: super::provider::ProviderParams

use serde_json::Value;

use super::provider::{Filter, SortDirection, SortOrder};

/// Where a newly activated sort key lands relative to existing ones in
/// multi-sort mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPriority {
    /// The newest key becomes the primary sort.
    Prepend,
    /// The newest key becomes the last tiebreaker.
    Append,
}

/// Process-wide default multi-sort priority.
///
/// Components take the priority as a construction parameter; this constant
/// is the documented default they fall back to.
pub const DEFAULT_MULTI_SORT_PRIORITY: SortPriority = SortPriority::Prepend;

/// One column's filter directive.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDirective {
    /// Dotted property path the column binds to.
    pub path: String,
    /// The column's current filter value.
    pub value: Value,
}

impl FilterDirective {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Apply one column's sort directive to the active order list, in place.
///
/// `direction: None` deactivates the column's sort. An already active path
/// keeps its position and only updates its direction; a newly activated path
/// is inserted at the end `priority` selects. Single-sort callers rebuild
/// from an empty list instead.
pub fn apply_sort_directive(
    orders: &mut Vec<SortOrder>,
    path: &str,
    direction: Option<SortDirection>,
    priority: SortPriority,
) {
    let existing = orders.iter().position(|order| order.path == path);
    match (direction, existing) {
        (None, Some(index)) => {
            orders.remove(index);
        }
        (None, None) => {}
        (Some(direction), Some(index)) => {
            orders[index].direction = direction;
        }
        (Some(direction), None) => {
            let order = SortOrder::new(path, direction);
            match priority {
                SortPriority::Prepend => orders.insert(0, order),
                SortPriority::Append => orders.push(order),
            }
        }
    }
}

/// Fold filter directives into the provider-facing filter list.
///
/// Declaration order is kept; directives whose value stringifies to the
/// empty string are inactive and dropped.
pub fn collect_filters(directives: &[FilterDirective]) -> Vec<Filter> {
    directives
        .iter()
        .filter(|directive| {
            let text = match &directive.value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            !text.is_empty()
        })
        .map(|directive| Filter::new(directive.path.clone(), directive.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn paths(orders: &[SortOrder]) -> Vec<&str> {
        orders.iter().map(|order| order.path.as_str()).collect()
    }

    #[test]
    fn test_prepend_makes_newest_primary() {
        let mut orders = vec![SortOrder::new("a", SortDirection::Ascending)];
        apply_sort_directive(
            &mut orders,
            "b",
            Some(SortDirection::Descending),
            SortPriority::Prepend,
        );
        assert_eq!(paths(&orders), vec!["b", "a"]);
        assert_eq!(orders[0].direction, SortDirection::Descending);
    }

    #[test]
    fn test_append_makes_newest_tiebreaker() {
        let mut orders = vec![SortOrder::new("a", SortDirection::Ascending)];
        apply_sort_directive(
            &mut orders,
            "b",
            Some(SortDirection::Ascending),
            SortPriority::Append,
        );
        assert_eq!(paths(&orders), vec!["a", "b"]);
    }

    #[test]
    fn test_direction_change_keeps_position() {
        let mut orders = vec![
            SortOrder::new("a", SortDirection::Ascending),
            SortOrder::new("b", SortDirection::Ascending),
        ];
        apply_sort_directive(
            &mut orders,
            "a",
            Some(SortDirection::Descending),
            SortPriority::Prepend,
        );
        assert_eq!(paths(&orders), vec!["a", "b"]);
        assert_eq!(orders[0].direction, SortDirection::Descending);
    }

    #[test]
    fn test_none_removes_entry() {
        let mut orders = vec![
            SortOrder::new("a", SortDirection::Ascending),
            SortOrder::new("b", SortDirection::Descending),
        ];
        apply_sort_directive(&mut orders, "a", None, SortPriority::Prepend);
        assert_eq!(paths(&orders), vec!["b"]);

        // Removing an inactive path is a no-op.
        apply_sort_directive(&mut orders, "zzz", None, SortPriority::Prepend);
        assert_eq!(paths(&orders), vec!["b"]);
    }

    #[test]
    fn test_collect_filters_drops_empty_values() {
        let directives = vec![
            FilterDirective::new("name", "ada"),
            FilterDirective::new("city", ""),
            FilterDirective::new("age", json!(null)),
            FilterDirective::new("score", json!(0)),
        ];
        let filters = collect_filters(&directives);
        let kept: Vec<_> = filters.iter().map(|filter| filter.path.as_str()).collect();
        // `0` stringifies to "0", which is not empty.
        assert_eq!(kept, vec!["name", "score"]);
    }

    #[test]
    fn test_collect_filters_keeps_declaration_order() {
        let directives = vec![
            FilterDirective::new("b", "2"),
            FilterDirective::new("a", "1"),
        ];
        let filters = collect_filters(&directives);
        assert_eq!(filters[0].path, "b");
        assert_eq!(filters[1].path, "a");
    }
}
