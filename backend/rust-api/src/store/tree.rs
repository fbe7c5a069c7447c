//! JSON key-tree operations shared by every store backend.
//!
//! Stored trees are normalized: arrays become objects keyed by index, nulls
//! and empty objects are dropped. Reads denormalize again, turning an object
//! whose keys are exactly `0..n` back into an array.

use serde_json::{Map, Value};

use super::StoreError;

pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let map: Map<String, Value> = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), normalize(item)))
                .filter(|(_, item)| !item.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Object(fields) => {
            let map: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

pub fn denormalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if is_index_keyed(map) {
                let mut items: Vec<(usize, Value)> = map
                    .iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, denormalize(v))))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Value::Array(items.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), denormalize(v)))
                        .collect(),
                )
            }
        }
        other => other.clone(),
    }
}

fn is_index_keyed(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && (0..map.len()).all(|i| map.contains_key(&i.to_string()))
        && map.keys().all(|k| k.parse::<usize>().is_ok_and(|i| i.to_string() == *k))
}

fn get_ref<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Denormalized copy of the subtree at `path`.
pub fn get(root: &Value, path: &[String]) -> Option<Value> {
    get_ref(root, path).map(denormalize)
}

/// Replaces the subtree at `path`; `Value::Null` deletes it and prunes
/// parents left empty.
pub fn set(root: &mut Value, path: &[String], value: Value) {
    set_normalized(root, path, normalize(value));
}

fn set_normalized(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        if rest.is_empty() {
            if value.is_null() {
                map.remove(head);
            } else {
                map.insert(head.clone(), value);
            }
            return;
        }

        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_normalized(child, rest, value);
        let prune = child.is_null() || child.as_object().is_some_and(|m| m.is_empty());
        if prune {
            map.remove(head);
        }
    }
}

pub fn merge(root: &mut Value, path: &[String], fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut target = path.to_vec();
        target.push(key);
        set(root, &target, value);
    }
}

pub fn increment(root: &mut Value, path: &[String], delta: i64) -> Result<i64, StoreError> {
    let current = match get_ref(root, path) {
        None => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| StoreError::TypeMismatch {
                path: path.join("/"),
            })?,
        Some(_) => {
            return Err(StoreError::TypeMismatch {
                path: path.join("/"),
            })
        }
    };

    let next = current.saturating_add(delta);
    set(root, path, Value::from(next));
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(raw: &str) -> Vec<String> {
        raw.split('/').map(str::to_string).collect()
    }

    #[test]
    fn arrays_are_stored_as_index_maps_and_read_back_as_arrays() {
        let mut root = json!({});
        set(&mut root, &p("quizzes/TBF1"), json!({ "questions": [{ "text": "a" }, { "text": "b" }] }));

        assert_eq!(root["quizzes"]["TBF1"]["questions"]["1"]["text"], "b");
        let quiz = get(&root, &p("quizzes/TBF1")).unwrap();
        assert_eq!(quiz["questions"][0]["text"], "a");
        assert!(quiz["questions"].is_array());
    }

    #[test]
    fn non_contiguous_numeric_keys_stay_an_object() {
        let value = json!({ "0": 1, "2": 3 });
        assert!(denormalize(&value).is_object());
        let padded = json!({ "0": 1, "01": 2 });
        assert!(denormalize(&padded).is_object());
    }

    #[test]
    fn writing_null_deletes_and_prunes_empty_parents() {
        let mut root = json!({});
        set(&mut root, &p("a/b/c"), json!(1));
        set(&mut root, &p("a/b/c"), Value::Null);

        assert!(get(&root, &p("a")).is_none());
        assert_eq!(root, json!({}));
    }

    #[test]
    fn merge_keeps_siblings() {
        let mut root = json!({});
        set(&mut root, &p("q/x"), json!({ "title": "t", "game_start": false }));
        let mut fields = Map::new();
        fields.insert("game_start".into(), json!(true));
        fields.insert("current_question".into(), json!(0));
        merge(&mut root, &p("q/x"), fields);

        let quiz = get(&root, &p("q/x")).unwrap();
        assert_eq!(quiz["title"], "t");
        assert_eq!(quiz["game_start"], true);
        assert_eq!(quiz["current_question"], 0);
    }

    #[test]
    fn increment_starts_from_zero_and_rejects_strings() {
        let mut root = json!({});
        assert_eq!(increment(&mut root, &p("s/alice/score"), 9).unwrap(), 9);
        assert_eq!(increment(&mut root, &p("s/alice/score"), 3).unwrap(), 12);

        set(&mut root, &p("s/bob/score"), json!("ten"));
        assert!(matches!(
            increment(&mut root, &p("s/bob/score"), 1),
            Err(StoreError::TypeMismatch { .. })
        ));
    }
}
