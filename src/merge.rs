//! Deep merge used when combining handler results and hydrating links.

use serde_json::Value;

/// Merges `source` into `target`. Objects merge key by key, arrays merge by index
/// (extra source items are appended), and any other pair is replaced by `source`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (k, v) in s {
                match t.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        t.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(t), Value::Array(s)) => {
            for (i, v) in s.into_iter().enumerate() {
                match t.get_mut(i) {
                    Some(existing) => deep_merge(existing, v),
                    None => t.push(v),
                }
            }
        }
        (t, s) => *t = s,
    }
}

/// Folds `values` left to right; later values win on conflicting leaves.
pub fn merge_all<I: IntoIterator<Item = Value>>(values: I) -> Value {
    let mut iter = values.into_iter();
    let Some(mut acc) = iter.next() else {
        return Value::Null;
    };
    for v in iter {
        deep_merge(&mut acc, v);
    }
    acc
}
