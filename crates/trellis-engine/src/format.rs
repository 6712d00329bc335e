//! Textual plan formatters.
//!
//! `format_plan` produces the canonical JSON of the serialized proto with
//! one-space indentation; byte-stable given the same input, which is what the
//! golden-style tests diff. `format_plan_text` is a human-oriented tree view.

use serde::Serialize;
use substrait::proto;

use crate::error::Error;
use crate::plan::Plan;
use crate::relation::Relation;

pub fn format_plan(plan: &Plan) -> Result<String, Error> {
    format_plan_proto(&plan.to_proto()?)
}

pub fn format_plan_proto(plan: &proto::Plan) -> Result<String, Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    plan.serialize(&mut serializer)?;

    Ok(String::from_utf8(buf).expect("serialized JSON is UTF-8"))
}

/// A tab-indented walk of the relation tree.
pub fn format_plan_text(plan: &Plan) -> String {
    let mut out = String::new();
    format_relation(plan.root(), &mut out, 0);
    out
}

fn format_relation(relation: &Relation, out: &mut String, indent: usize) {
    if indent > 0 {
        out.push('\n');
    }
    for _ in 0..indent {
        out.push('\t');
    }
    out.push_str(&relation.to_string());

    for child in relation.children() {
        format_relation(child, out, indent + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::table::{AnonymousCatalog, Table};
    use std::sync::Arc;
    use trellis_substrait::{Field, Schema, Type};

    fn bound_plan() -> Plan {
        let mut plan = Plan::new(Relation::projection(
            Relation::selection(
                Relation::read(Table::named(vec!["db".into(), "t".into()])),
                Expr::column("col1"),
            ),
            vec![Expr::column("col1")],
        ));
        let catalog: Arc<dyn crate::table::Catalog> =
            Arc::new(AnonymousCatalog::new(Schema::new(vec![Field::new(
                "col1",
                Type::boolean(false),
            )])));
        plan.set_catalog(&catalog);
        plan
    }

    #[test]
    fn format_is_byte_stable() {
        let plan = bound_plan();
        let first = format_plan(&plan).unwrap();
        let second = format_plan(&plan).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn text_tree_indents_children() {
        let plan = bound_plan();
        assert_eq!(
            format_plan_text(&plan),
            "Projection: #col1\n\tSelection: #col1\n\t\tRead: table=db.t"
        );
    }
}
