//! Keyed binary search over collections kept sorted by a string key.
//!
//! Every ordered collection in the store goes through [`search`] so that
//! upserts land at the right position and removals find their target in
//! O(log n) comparisons.

use std::cmp::Ordering;

/// Outcome of a keyed lookup.
///
/// When `found` is true, `index` is the position of the match. Otherwise it
/// is the position at which the key would have to be inserted to keep the
/// slice sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub found: bool,
    pub index: usize,
}

/// Search `items` (sorted ascending by `key`) for `target`.
///
/// If several items share the target key the leftmost one is reported.
pub fn search<T, F>(items: &[T], target: &str, key: F) -> Match
where
    F: Fn(&T) -> &str,
{
    let mut low = 0;
    let mut high = items.len();
    while low < high {
        let mid = low + (high - low) / 2;
        match key(&items[mid]).cmp(target) {
            Ordering::Less => low = mid + 1,
            Ordering::Equal | Ordering::Greater => high = mid,
        }
    }
    let found = items.get(low).is_some_and(|item| key(item) == target);
    Match { found, index: low }
}

/// Insert or overwrite `item` by key. Returns true if a new entry was inserted.
pub fn upsert<T, F>(items: &mut Vec<T>, item: T, key: F) -> bool
where
    F: Fn(&T) -> &str,
{
    let m = search(items, key(&item), &key);
    if m.found {
        items[m.index] = item;
        false
    } else {
        items.insert(m.index, item);
        true
    }
}

/// Remove the entry with key `target`, returning it if present.
pub fn remove<T, F>(items: &mut Vec<T>, target: &str, key: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    let m = search(items, target, key);
    m.found.then(|| items.remove(m.index))
}
