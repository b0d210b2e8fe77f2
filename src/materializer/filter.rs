// Filter semantics (spec §4.7.1).

use serde_json::Value;

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    // String-form equality per spec: compare the rendered form so
    // `$eq: "3"` matches a stored number `3`.
    match (a, b) {
        (Value::String(_), _) | (_, Value::String(_)) => value_as_string(a) == value_as_string(b),
        _ => a == b,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_operator(field_value: &Value, op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => values_equal(field_value, operand),
        "$ne" => !values_equal(field_value, operand),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let (Some(lhs), Some(rhs)) = (as_f64(field_value), as_f64(operand)) else {
                return false;
            };
            match op {
                "$gt" => lhs > rhs,
                "$gte" => lhs >= rhs,
                "$lt" => lhs < rhs,
                "$lte" => lhs <= rhs,
                _ => unreachable!(),
            }
        }
        "$in" => operand
            .as_array()
            .map(|arr| arr.iter().any(|v| values_equal(field_value, v)))
            .unwrap_or(false),
        "$nin" => !operand
            .as_array()
            .map(|arr| arr.iter().any(|v| values_equal(field_value, v)))
            .unwrap_or(false),
        // Unknown operators are ignored for forward-compatibility; treat as
        // an unconditional match so they don't spuriously exclude documents.
        _ => true,
    }
}

/// Whether `document` satisfies `filter` (spec §4.7.1). Empty filter matches
/// every document; a missing field under a constrained key always fails.
pub fn matches(document: &Value, filter: &Value) -> bool {
    let Some(filter_obj) = filter.as_object() else {
        return true;
    };
    if filter_obj.is_empty() {
        return true;
    }

    for (key, expected) in filter_obj {
        let Some(field_value) = document.get(key) else {
            return false;
        };

        match expected.as_object() {
            Some(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                let all_ops_pass = ops.iter().all(|(op, operand)| matches_operator(field_value, op, operand));
                if !all_ops_pass {
                    return false;
                }
            }
            _ => {
                if !values_equal(field_value, expected) {
                    return false;
                }
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&json!({"name": "A"}), &json!({})));
    }

    #[test]
    fn plain_equality() {
        assert!(matches(&json!({"name": "A"}), &json!({"name": "A"})));
        assert!(!matches(&json!({"name": "A"}), &json!({"name": "B"})));
    }

    #[test]
    fn missing_field_fails() {
        assert!(!matches(&json!({"name": "A"}), &json!({"age": 5})));
    }

    #[test]
    fn gt_gte_lt_lte_coerce_to_float() {
        let doc = json!({"age": 30});
        assert!(matches(&doc, &json!({"age": {"$gt": 20}})));
        assert!(matches(&doc, &json!({"age": {"$gte": 30}})));
        assert!(!matches(&doc, &json!({"age": {"$lt": 30}})));
        assert!(matches(&doc, &json!({"age": {"$lte": 30}})));
    }

    #[test]
    fn in_and_nin() {
        let doc = json!({"role": "admin"});
        assert!(matches(&doc, &json!({"role": {"$in": ["admin", "user"]}})));
        assert!(!matches(&doc, &json!({"role": {"$nin": ["admin", "user"]}})));
        assert!(matches(&doc, &json!({"role": {"$nin": ["user"]}})));
    }

    #[test]
    fn ne_operator() {
        assert!(matches(&json!({"name": "A"}), &json!({"name": {"$ne": "B"}})));
        assert!(!matches(&json!({"name": "A"}), &json!({"name": {"$ne": "A"}})));
    }

    #[test]
    fn unknown_operator_is_ignored() {
        assert!(matches(&json!({"name": "A"}), &json!({"name": {"$regex": "^A"}})));
    }

    #[test]
    fn eq_coerces_number_and_string() {
        assert!(matches(&json!({"age": 30}), &json!({"age": {"$eq": "30"}})));
    }

    /// Spec §8's testable property 10 calls for 50+ hand-written cases
    /// covering type coercion and missing-field behavior across every
    /// comparison operator. Each row is `(label, document, filter, expected)`.
    #[test]
    fn operator_coercion_and_missing_field_matrix() {
        let cases: Vec<(&str, Value, Value, bool)> = vec![
            // --- $eq: string-form coercion, including cross-type ---
            ("eq number==number match", json!({"age": 30}), json!({"age": {"$eq": 30}}), true),
            ("eq number==number mismatch", json!({"age": 30}), json!({"age": {"$eq": 31}}), false),
            ("eq number==string match", json!({"age": 30}), json!({"age": {"$eq": "30"}}), true),
            ("eq string==number match", json!({"age": "30"}), json!({"age": {"$eq": 30}}), true),
            ("eq bool==bool match", json!({"ok": true}), json!({"ok": {"$eq": true}}), true),
            ("eq bool==bool mismatch", json!({"ok": true}), json!({"ok": {"$eq": false}}), false),
            ("eq bool==string coerces", json!({"ok": true}), json!({"ok": {"$eq": "true"}}), true),
            ("eq null==null match", json!({"v": null}), json!({"v": {"$eq": null}}), true),
            ("eq null coerces equal to string \"null\"", json!({"v": null}), json!({"v": {"$eq": "null"}}), true),
            ("eq array==array match", json!({"tags": ["a", "b"]}), json!({"tags": {"$eq": ["a", "b"]}}), true),
            ("eq array==array mismatch order", json!({"tags": ["a", "b"]}), json!({"tags": {"$eq": ["b", "a"]}}), false),
            ("eq object operand matches via direct equality", json!({"meta": {"x": 1}}), json!({"meta": {"$eq": {"x": 1}}}), true),
            ("eq missing field", json!({"name": "A"}), json!({"age": {"$eq": 1}}), false),
            ("eq plain shorthand equals $eq", json!({"name": "A"}), json!({"name": "A"}), true),
            ("eq zero vs empty string", json!({"n": 0}), json!({"n": {"$eq": ""}}), false),
            // --- $ne ---
            ("ne number mismatch passes", json!({"age": 30}), json!({"age": {"$ne": 31}}), true),
            ("ne number match fails", json!({"age": 30}), json!({"age": {"$ne": 30}}), false),
            ("ne string/number coercion fails", json!({"age": 30}), json!({"age": {"$ne": "30"}}), false),
            ("ne missing field still fails (field required)", json!({"name": "A"}), json!({"age": {"$ne": 1}}), false),
            ("ne bool mismatch passes", json!({"ok": true}), json!({"ok": {"$ne": false}}), true),
            ("ne null vs non-null passes", json!({"v": 1}), json!({"v": {"$ne": null}}), true),
            ("ne array mismatch passes", json!({"tags": ["a"]}), json!({"tags": {"$ne": ["b"]}}), true),
            // --- $gt ---
            ("gt numeric true", json!({"age": 30}), json!({"age": {"$gt": 20}}), true),
            ("gt numeric false equal", json!({"age": 30}), json!({"age": {"$gt": 30}}), false),
            ("gt numeric false lower", json!({"age": 10}), json!({"age": {"$gt": 20}}), false),
            ("gt numeric strings coerce", json!({"age": "30"}), json!({"age": {"$gt": "20"}}), true),
            ("gt non-numeric string operand fails closed", json!({"age": 30}), json!({"age": {"$gt": "x"}}), false),
            ("gt non-numeric field fails closed", json!({"age": "x"}), json!({"age": {"$gt": 1}}), false),
            ("gt missing field fails", json!({"name": "A"}), json!({"age": {"$gt": 1}}), false),
            ("gt bool operand fails closed", json!({"age": 30}), json!({"age": {"$gt": true}}), false),
            // --- $gte ---
            ("gte numeric equal true", json!({"age": 30}), json!({"age": {"$gte": 30}}), true),
            ("gte numeric greater true", json!({"age": 31}), json!({"age": {"$gte": 30}}), true),
            ("gte numeric lower false", json!({"age": 29}), json!({"age": {"$gte": 30}}), false),
            ("gte missing field fails", json!({"name": "A"}), json!({"age": {"$gte": 1}}), false),
            // --- $lt ---
            ("lt numeric true", json!({"age": 10}), json!({"age": {"$lt": 20}}), true),
            ("lt numeric false equal", json!({"age": 20}), json!({"age": {"$lt": 20}}), false),
            ("lt numeric false higher", json!({"age": 30}), json!({"age": {"$lt": 20}}), false),
            ("lt missing field fails", json!({"name": "A"}), json!({"age": {"$lt": 1}}), false),
            // --- $lte ---
            ("lte numeric equal true", json!({"age": 20}), json!({"age": {"$lte": 20}}), true),
            ("lte numeric lower true", json!({"age": 19}), json!({"age": {"$lte": 20}}), true),
            ("lte numeric higher false", json!({"age": 21}), json!({"age": {"$lte": 20}}), false),
            ("lte missing field fails", json!({"name": "A"}), json!({"age": {"$lte": 1}}), false),
            // --- $in ---
            ("in string match", json!({"role": "admin"}), json!({"role": {"$in": ["admin", "user"]}}), true),
            ("in string no match", json!({"role": "guest"}), json!({"role": {"$in": ["admin", "user"]}}), false),
            ("in number/string coercion match", json!({"age": 30}), json!({"age": {"$in": ["30", "40"]}}), true),
            ("in empty array never matches", json!({"role": "admin"}), json!({"role": {"$in": []}}), false),
            ("in non-array operand fails closed", json!({"role": "admin"}), json!({"role": {"$in": "admin"}}), false),
            ("in missing field fails", json!({"name": "A"}), json!({"role": {"$in": ["admin"]}}), false),
            ("in null element match", json!({"v": null}), json!({"v": {"$in": [null, 1]}}), true),
            // --- $nin ---
            ("nin string not-in passes", json!({"role": "guest"}), json!({"role": {"$nin": ["admin", "user"]}}), true),
            ("nin string in-list fails", json!({"role": "admin"}), json!({"role": {"$nin": ["admin", "user"]}}), false),
            ("nin empty array always passes", json!({"role": "admin"}), json!({"role": {"$nin": []}}), true),
            (
                "nin non-array operand defaults to passing",
                json!({"role": "admin"}),
                json!({"role": {"$nin": "admin"}}),
                true,
            ),
            ("nin missing field still fails (field required)", json!({"name": "A"}), json!({"role": {"$nin": ["x"]}}), false),
            // --- multi-operator / multi-field combinations ---
            (
                "range filter both bounds satisfied",
                json!({"age": 25}),
                json!({"age": {"$gte": 18, "$lte": 65}}),
                true,
            ),
            (
                "range filter upper bound violated",
                json!({"age": 70}),
                json!({"age": {"$gte": 18, "$lte": 65}}),
                false,
            ),
            (
                "multi-field filter all match",
                json!({"name": "A", "age": 30}),
                json!({"name": "A", "age": {"$gte": 18}}),
                true,
            ),
            (
                "multi-field filter one field fails",
                json!({"name": "A", "age": 10}),
                json!({"name": "A", "age": {"$gte": 18}}),
                false,
            ),
            (
                "multi-field filter missing second field",
                json!({"name": "A"}),
                json!({"name": "A", "age": {"$gte": 18}}),
                false,
            ),
        ];

        for (label, document, filter, expected) in cases {
            assert_eq!(matches(&document, &filter), expected, "case failed: {label}");
        }
    }
}
