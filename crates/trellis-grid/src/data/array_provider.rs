//! In-memory data provider over an array of JSON values.
//!
//! This adapter backs the grid's "just give me a Vec" path: filtering is a
//! case-insensitive substring match on stringified values, sorting is a
//! stable multi-key sort, and pagination slices the processed result. Field
//! access uses dotted paths (`"name.last"`) over [`serde_json::Value`].

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::provider::{
    DataProviderFn, Filter, ProviderCallback, ProviderParams, SortDirection, SortOrder,
};

/// Resolve a dotted property path against a JSON object.
pub fn resolve_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Stringify a value for filtering and comparison. Absent and null values
/// normalize to the empty string; other non-strings use their JSON form.
fn normalize(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Compare two path-resolved values: numbers numerically, everything else as
/// normalized strings.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let (Some(Value::Number(x)), Some(Value::Number(y))) = (a, b) {
        let x = x.as_f64().unwrap_or(0.0);
        let y = y.as_f64().unwrap_or(0.0);
        // JSON numbers are never NaN, so a total order exists.
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    normalize(a).cmp(&normalize(b))
}

/// Keep the items whose every filter path contains the filter value,
/// case-insensitively.
pub fn filter_items(items: &[Value], filters: &[Filter]) -> Vec<Value> {
    items
        .iter()
        .filter(|item| {
            filters.iter().all(|filter| {
                let haystack = normalize(resolve_path(item, &filter.path)).to_lowercase();
                let needle = normalize(Some(&filter.value)).to_lowercase();
                haystack.contains(&needle)
            })
        })
        .cloned()
        .collect()
}

/// Stable in-place multi-key sort. The first key that distinguishes two
/// items wins.
///
/// `Descending` swaps the operands rather than negating the result, so the
/// empty-value normalization applies symmetrically in both directions
/// (absent values group at the opposite end, instead of interleaving).
pub fn multi_sort(items: &mut [Value], sort_orders: &[SortOrder]) {
    if sort_orders.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        for order in sort_orders {
            let (x, y) = match order.direction {
                SortDirection::Ascending => (a, b),
                SortDirection::Descending => (b, a),
            };
            let result = compare_values(
                resolve_path(x, &order.path),
                resolve_path(y, &order.path),
            );
            if result != Ordering::Equal {
                return result;
            }
        }
        Ordering::Equal
    });
}

/// Whether `path`'s parent resolves on `item`. A criterion keyed by
/// `"a.b.c"` is meaningless when `"a.b"` does not exist on the data, which
/// usually indicates a typo in a column configuration.
fn parent_path_valid(item: &Value, path: &str) -> bool {
    match path.rsplit_once('.') {
        None => true,
        Some((parent, _)) => resolve_path(item, parent).is_some(),
    }
}

/// Drop criteria whose parent path does not resolve on the first item,
/// warning for each. Never panics on bad paths.
fn retain_valid<'a, C>(
    items: &[Value],
    criteria: &'a [C],
    path_of: impl Fn(&C) -> &str,
    kind: &'static str,
) -> Vec<&'a C> {
    let Some(probe) = items.first() else {
        return criteria.iter().collect();
    };
    criteria
        .iter()
        .filter(|criterion| {
            let path = path_of(criterion);
            let valid = parent_path_valid(probe, path);
            if !valid {
                tracing::warn!(
                    target: "trellis_grid::data",
                    path,
                    kind,
                    "path does not resolve on the data; ignoring this criterion"
                );
            }
            valid
        })
        .collect()
}

/// Build a [`DataProviderFn`] serving pages out of an in-memory array.
///
/// Sorting mutates the stored array in place; filtering and pagination work
/// on a pass-local view. The adapter is flat: sub-level requests (a
/// `parent_item` present) complete empty.
pub fn create_array_data_provider(items: Vec<Value>) -> DataProviderFn<Value> {
    let store = Mutex::new(items);
    Arc::new(move |params: ProviderParams<Value>, callback: ProviderCallback<Value>| {
        if params.parent_item.is_some() {
            callback.complete(Vec::new(), Some(0));
            return;
        }

        let mut store = store.lock();

        let sort_orders: Vec<SortOrder> =
            retain_valid(&store, &params.sort_orders, |order| &order.path, "sort")
                .into_iter()
                .cloned()
                .collect();
        multi_sort(&mut store, &sort_orders);

        let filters: Vec<Filter> =
            retain_valid(&store, &params.filters, |filter| &filter.path, "filter")
                .into_iter()
                .cloned()
                .collect();
        let filtered = filter_items(&store, &filters);

        let start = (params.page * params.page_size).min(filtered.len());
        let end = ((params.page + 1) * params.page_size).min(filtered.len());
        let page = filtered[start..end].to_vec();
        callback.complete(page, Some(filtered.len()));
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(v: serde_json::Value) -> Vec<Value> {
        v.as_array().cloned().unwrap()
    }

    /// Drive the provider synchronously and capture the response.
    fn fetch(
        provider: &DataProviderFn<Value>,
        page: usize,
        page_size: usize,
        filters: Vec<Filter>,
        sort_orders: Vec<SortOrder>,
    ) -> (Vec<Value>, Option<usize>) {
        let result = Arc::new(Mutex::new(None));
        let result_clone = result.clone();
        let callback = ProviderCallback::new(move |items, size| {
            *result_clone.lock() = Some((items, size));
        });
        provider(
            ProviderParams {
                page,
                page_size,
                filters,
                sort_orders,
                parent_item: None,
            },
            callback,
        );
        let taken = result.lock().take();
        taken.expect("provider must complete synchronously")
    }

    #[test]
    fn test_resolve_dotted_path() {
        let item = json!({"name": {"last": "Ada"}, "age": 36});
        assert_eq!(resolve_path(&item, "name.last"), Some(&json!("Ada")));
        assert_eq!(resolve_path(&item, "age"), Some(&json!(36)));
        assert_eq!(resolve_path(&item, "name.first"), None);
        assert_eq!(resolve_path(&item, "missing.deep"), None);
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let items = values(json!([
            {"v": "Apple"}, {"v": "banana"}, {"v": "grape"}
        ]));
        let kept = filter_items(&items, &[Filter::new("v", "AP")]);
        let names: Vec<_> = kept.iter().map(|i| i["v"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Apple", "grape"]);
    }

    #[test]
    fn test_filter_normalizes_absent_to_empty() {
        let items = values(json!([{"v": "x"}, {}, {"v": null}]));
        // The empty string is a substring of everything, so an empty filter
        // value keeps all three.
        assert_eq!(filter_items(&items, &[Filter::new("v", "")]).len(), 3);
        // A real needle drops the absent and null ones.
        assert_eq!(filter_items(&items, &[Filter::new("v", "x")]).len(), 1);
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let mut items = values(json!([{"n": 10}, {"n": 9}, {"n": 2}]));
        multi_sort(&mut items, &[SortOrder::new("n", SortDirection::Ascending)]);
        let order: Vec<_> = items.iter().map(|i| i["n"].as_i64().unwrap()).collect();
        // Lexicographic order would be [10, 2, 9].
        assert_eq!(order, vec![2, 9, 10]);
    }

    #[test]
    fn test_descending_groups_empties_last() {
        let mut items = values(json!([{"v": "b"}, {"v": null}, {"v": "a"}]));
        multi_sort(&mut items, &[SortOrder::new("v", SortDirection::Descending)]);
        let order: Vec<_> = items
            .iter()
            .map(|i| i["v"].as_str().unwrap_or(""))
            .collect();
        // Empties sort first ascending, so operand-swapped descending puts
        // them last.
        assert_eq!(order, vec!["b", "a", ""]);
    }

    #[test]
    fn test_multi_sort_first_distinguishing_key_wins() {
        let mut items = values(json!([
            {"a": "x", "b": 2},
            {"a": "x", "b": 1},
            {"a": "w", "b": 9}
        ]));
        multi_sort(
            &mut items,
            &[
                SortOrder::new("a", SortDirection::Ascending),
                SortOrder::new("b", SortDirection::Ascending),
            ],
        );
        let order: Vec<_> = items
            .iter()
            .map(|i| (i["a"].as_str().unwrap().to_string(), i["b"].as_i64().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![("w".into(), 9), ("x".into(), 1), ("x".into(), 2)]
        );
    }

    #[test]
    fn test_provider_sorts_then_paginates() {
        let provider =
            create_array_data_provider(values(json!([{"v": "b"}, {"v": "a"}, {"v": "c"}])));
        let (page, size) = fetch(
            &provider,
            0,
            2,
            Vec::new(),
            vec![SortOrder::new("v", SortDirection::Ascending)],
        );
        assert_eq!(size, Some(3));
        assert_eq!(page, values(json!([{"v": "a"}, {"v": "b"}])));

        let (page, _) = fetch(
            &provider,
            1,
            2,
            Vec::new(),
            vec![SortOrder::new("v", SortDirection::Ascending)],
        );
        assert_eq!(page, values(json!([{"v": "c"}])));
    }

    #[test]
    fn test_provider_reports_filtered_size() {
        let provider = create_array_data_provider(values(json!([
            {"v": "Apple"}, {"v": "banana"}, {"v": "apricot"}
        ])));
        let (page, size) = fetch(&provider, 0, 10, vec![Filter::new("v", "ap")], Vec::new());
        assert_eq!(size, Some(2));
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_provider_page_past_end_is_empty() {
        let provider = create_array_data_provider(values(json!([{"v": "a"}])));
        let (page, size) = fetch(&provider, 5, 2, Vec::new(), Vec::new());
        assert_eq!(size, Some(1));
        assert!(page.is_empty());
    }

    #[test]
    fn test_invalid_parent_path_is_skipped() {
        let provider =
            create_array_data_provider(values(json!([{"v": "b"}, {"v": "a"}])));
        // "nope.deep" has no resolvable parent; the sort is ignored and the
        // original order survives.
        let (page, size) = fetch(
            &provider,
            0,
            10,
            Vec::new(),
            vec![SortOrder::new("nope.deep", SortDirection::Ascending)],
        );
        assert_eq!(size, Some(2));
        assert_eq!(page, values(json!([{"v": "b"}, {"v": "a"}])));
    }

    #[test]
    fn test_sub_level_requests_complete_empty() {
        let provider = create_array_data_provider(values(json!([{"v": "a"}])));
        let result = Arc::new(Mutex::new(None));
        let result_clone = result.clone();
        provider(
            ProviderParams {
                page: 0,
                page_size: 10,
                filters: Vec::new(),
                sort_orders: Vec::new(),
                parent_item: Some(json!({"v": "a"})),
            },
            ProviderCallback::new(move |items: Vec<Value>, size| {
                *result_clone.lock() = Some((items, size));
            }),
        );
        let taken = result.lock().take();
        assert_eq!(taken, Some((Vec::new(), Some(0))));
    }
}
