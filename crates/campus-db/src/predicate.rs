//! Rendering of storage-neutral predicates into SurrealQL.
//!
//! The only place where compiled policy predicates meet engine syntax.
//! Every comparison value becomes a bound parameter; field paths are
//! emitted verbatim except `id`, which maps to the record key.

use campus_core::predicate::{Comparison, FilterOp, Predicate};
use serde_json::Value;

/// A rendered WHERE fragment plus its parameter bindings.
#[derive(Debug, Clone, Default)]
pub(crate) struct RenderedPredicate {
    pub clause: String,
    pub binds: Vec<(String, Value)>,
}

impl RenderedPredicate {
    /// `" AND (<clause>)"` when non-empty, suitable for appending to a
    /// WHERE that already has a leading condition.
    pub fn and_clause(&self) -> String {
        if self.clause.is_empty() {
            String::new()
        } else {
            format!(" AND ({})", self.clause)
        }
    }

    /// `" WHERE <clause>"` when non-empty.
    pub fn where_clause(&self) -> String {
        if self.clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }
}

/// Render a predicate with bind parameters prefixed `$<prefix><n>`.
///
/// The prefix keeps policy bindings clearly apart from the operation's
/// own parameters in the same query.
pub(crate) fn render(predicate: &Predicate, prefix: &str) -> RenderedPredicate {
    let mut rendered = RenderedPredicate::default();
    let mut n = 0usize;

    let mut clauses: Vec<String> = Vec::new();
    for cmp in &predicate.all {
        clauses.push(render_comparison(cmp, prefix, &mut n, &mut rendered.binds));
    }
    if !predicate.any_of.is_empty() {
        let members: Vec<String> = predicate
            .any_of
            .iter()
            .map(|cmp| render_comparison(cmp, prefix, &mut n, &mut rendered.binds))
            .collect();
        clauses.push(format!("({})", members.join(" OR ")));
    }
    if !predicate.all_of.is_empty() {
        let members: Vec<String> = predicate
            .all_of
            .iter()
            .map(|cmp| render_comparison(cmp, prefix, &mut n, &mut rendered.binds))
            .collect();
        clauses.push(format!("({})", members.join(" AND ")));
    }

    rendered.clause = clauses.join(" AND ");
    rendered
}

fn render_comparison(
    cmp: &Comparison,
    prefix: &str,
    n: &mut usize,
    binds: &mut Vec<(String, Value)>,
) -> String {
    let field = field_path(&cmp.field);

    // Exists needs no parameter; everything else binds its value.
    if cmp.op == FilterOp::Exists {
        return if cmp.value.as_bool().unwrap_or(true) {
            format!("{field} IS NOT NONE")
        } else {
            format!("{field} IS NONE")
        };
    }

    let name = format!("{prefix}{n}");
    *n += 1;
    binds.push((name.clone(), cmp.value.clone()));

    match cmp.op {
        FilterOp::Equal => format!("{field} = ${name}"),
        FilterOp::NotEqual => format!("{field} != ${name}"),
        FilterOp::GreaterThan => format!("{field} > ${name}"),
        FilterOp::GreaterThanOrEqual => format!("{field} >= ${name}"),
        FilterOp::LessThan => format!("{field} < ${name}"),
        FilterOp::LessThanOrEqual => format!("{field} <= ${name}"),
        // Scalar membership or array overlap, matching the document-store
        // semantics of the in-memory evaluator.
        FilterOp::In => format!("({field} INSIDE ${name} OR {field} ANYINSIDE ${name})"),
        FilterOp::NotIn => format!("!({field} INSIDE ${name} OR {field} ANYINSIDE ${name})"),
        FilterOp::Matches => {
            format!("string::contains(string::lowercase({field}), string::lowercase(${name}))")
        }
        FilterOp::Exists => unreachable!("handled above"),
    }
}

/// Logical field path → stored field path. The logical `id` is the
/// record key.
fn field_path(field: &str) -> String {
    if field == "id" {
        "meta::id(id)".to_string()
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_predicate_renders_nothing() {
        let rendered = render(&Predicate::default(), "w");
        assert!(rendered.clause.is_empty());
        assert!(rendered.and_clause().is_empty());
        assert!(rendered.where_clause().is_empty());
    }

    #[test]
    fn buckets_render_with_their_connectives() {
        let predicate = Predicate {
            all: vec![Comparison::new("mid_edit", FilterOp::Equal, false)],
            any_of: vec![
                Comparison::new("public", FilterOp::Equal, true),
                Comparison::new("id", FilterOp::In, json!(["a"])),
            ],
            all_of: vec![Comparison::new("viewed", FilterOp::GreaterThan, 10)],
        };
        let rendered = render(&predicate, "w");

        assert_eq!(
            rendered.clause,
            "mid_edit = $w0 AND (public = $w1 OR (meta::id(id) INSIDE $w2 OR meta::id(id) ANYINSIDE $w2)) AND (viewed > $w3)"
        );
        assert_eq!(rendered.binds.len(), 4);
        assert_eq!(rendered.binds[0], ("w0".into(), json!(false)));
        assert_eq!(rendered.binds[2], ("w2".into(), json!(["a"])));
    }

    #[test]
    fn exists_renders_without_binding() {
        let predicate = Predicate::default()
            .and(Comparison::new("thumbnail", FilterOp::Exists, true))
            .and(Comparison::new("credit", FilterOp::Exists, false));
        let rendered = render(&predicate, "w");
        assert_eq!(
            rendered.clause,
            "thumbnail IS NOT NONE AND credit IS NONE"
        );
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn nested_fields_pass_through() {
        let predicate = Predicate::default().and(Comparison::new(
            "edit_data.current_editor",
            FilterOp::Equal,
            "u1",
        ));
        let rendered = render(&predicate, "s");
        assert_eq!(rendered.clause, "edit_data.current_editor = $s0");
    }
}
