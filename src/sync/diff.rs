use std::collections::{HashMap, HashSet};

/// Name-keyed reconciliation of a live listing against persisted rows.
#[derive(Debug)]
pub(crate) struct NameDiff<'a, L, P> {
    /// Live entries with no persisted row, in live order.
    pub add: Vec<&'a L>,
    /// Live entries paired with the persisted row of the same name.
    pub keep: Vec<(&'a L, &'a P)>,
    /// Persisted rows whose name is no longer live.
    pub remove: Vec<&'a P>,
}

/// Diff `live` against `persisted` by name.
///
/// Names in `protected` count as live even though they have no entry in
/// `live`, so their persisted rows are neither removed nor re-added. A
/// duplicate live name keeps its first occurrence.
pub(crate) fn diff_by_name<'a, L, P>(
    live: &'a [L],
    live_name: impl Fn(&L) -> &str,
    persisted: &'a [P],
    persisted_name: impl Fn(&P) -> &str,
    protected: &HashSet<String>,
) -> NameDiff<'a, L, P> {
    let by_name: HashMap<&str, &P> = persisted.iter().map(|p| (persisted_name(p), p)).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut add = Vec::new();
    let mut keep = Vec::new();
    for entry in live {
        let name = live_name(entry);
        if !seen.insert(name) {
            continue;
        }
        match by_name.get(name) {
            Some(row) => keep.push((entry, *row)),
            None => add.push(entry),
        }
    }
    let remove = persisted
        .iter()
        .filter(|p| {
            let name = persisted_name(*p);
            !seen.contains(name) && !protected.contains(name)
        })
        .collect();
    NameDiff { add, keep, remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keep_remove() {
        let live = vec!["a", "b", "c"];
        let persisted = vec!["b", "d"];
        let diff = diff_by_name(&live, |s| *s, &persisted, |s| *s, &HashSet::new());
        assert_eq!(diff.add, vec![&"a", &"c"]);
        assert_eq!(diff.keep, vec![(&"b", &"b")]);
        assert_eq!(diff.remove, vec![&"d"]);
    }

    #[test]
    fn test_protected_names_survive() {
        let live: Vec<&str> = vec!["id"];
        let persisted = vec!["id", "location"];
        let protected: HashSet<String> = ["location".to_string()].into_iter().collect();
        let diff = diff_by_name(&live, |s| *s, &persisted, |s| *s, &protected);
        assert!(diff.remove.is_empty());
        assert!(diff.add.is_empty());
    }

    #[test]
    fn test_duplicate_live_name_added_once() {
        let live = vec!["x", "x"];
        let persisted: Vec<&str> = vec![];
        let diff = diff_by_name(&live, |s| *s, &persisted, |s| *s, &HashSet::new());
        assert_eq!(diff.add.len(), 1);
    }
}
