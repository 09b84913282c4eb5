//! Minimal JSON-patch (RFC 6902) diff between an incoming object and the
//! mutator's defaulted version of it (spec.md 4.J: "return a JSON-patch diff
//! between the incoming and mutated object").

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Walks `before` and `after` structurally and emits the patch operations
/// that turn one into the other. Object keys are compared by name, array
/// elements positionally (sufficient here: the mutator only ever adds
/// defaulted fields or replaces scalars, never reorders arrays).
pub fn diff(before: &Value, after: &Value) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_at("", before, after, &mut patches);
    patches
}

fn diff_at(path: &str, before: &Value, after: &Value, out: &mut Vec<Patch>) {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, before_value) in b {
                let child_path = format!("{path}/{}", escape(key));
                match a.get(key) {
                    Some(after_value) => diff_at(&child_path, before_value, after_value, out),
                    None => out.push(Patch {
                        op: PatchOp::Remove,
                        path: child_path,
                        value: None,
                    }),
                }
            }
            for (key, after_value) in a {
                if !b.contains_key(key) {
                    out.push(Patch {
                        op: PatchOp::Add,
                        path: format!("{path}/{}", escape(key)),
                        value: Some(after_value.clone()),
                    });
                }
            }
        }
        (Value::Array(b), Value::Array(a)) => {
            for (idx, after_value) in a.iter().enumerate() {
                let child_path = format!("{path}/{idx}");
                match b.get(idx) {
                    Some(before_value) => diff_at(&child_path, before_value, after_value, out),
                    None => out.push(Patch {
                        op: PatchOp::Add,
                        path: child_path,
                        value: Some(after_value.clone()),
                    }),
                }
            }
            for idx in a.len()..b.len() {
                out.push(Patch {
                    op: PatchOp::Remove,
                    path: format!("{path}/{idx}"),
                    value: None,
                });
            }
        }
        (b, a) if b != a => out.push(Patch {
            op: PatchOp::Replace,
            path: path.to_string(),
            value: Some(a.clone()),
        }),
        _ => {}
    }
}

/// RFC 6901 pointer escaping: `~` then `/`.
fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
