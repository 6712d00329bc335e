//! A plan: a list of relations with a distinguished root.

use std::sync::Arc;

use substrait::proto;
use trellis_substrait::ExtensionRegistry;

use crate::error::Error;
use crate::relation::Relation;
use crate::serialization::{relation_from_proto, restore_root_names};
use crate::table::Catalog;

/// The Substrait minor version written into serialized plans.
const SUBSTRAIT_MINOR_VERSION: u32 = 53;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    relations: Vec<Relation>,
}

impl Plan {
    /// A plan with `root` as its only relation.
    pub fn new(root: Relation) -> Self {
        Self {
            relations: vec![root],
        }
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// The first relation is the root.
    pub fn root(&self) -> &Relation {
        &self.relations[0]
    }

    /// Binds the catalog to every named table in every relation.
    pub fn set_catalog(&mut self, catalog: &Arc<dyn Catalog>) {
        for relation in &mut self.relations {
            relation.set_catalog(catalog);
        }
    }

    /// Serializes the plan, assigning extension anchors as function calls are
    /// encountered. The extension registry lives exactly as long as this
    /// serialization.
    pub fn to_proto(&self) -> Result<proto::Plan, Error> {
        let mut extensions = ExtensionRegistry::new();

        let mut relations = Vec::with_capacity(self.relations.len());
        for (i, relation) in self.relations.iter().enumerate() {
            let rel = relation.to_proto(&mut extensions)?;

            let rel_type = if i == 0 {
                let schema = relation.schema()?;
                proto::plan_rel::RelType::Root(proto::RelRoot {
                    input: Some(rel),
                    names: schema.names(),
                })
            } else {
                proto::plan_rel::RelType::Rel(rel)
            };

            relations.push(proto::PlanRel {
                rel_type: Some(rel_type),
            });
        }

        let (extension_uris, extension_declarations) = extensions.to_proto()?;

        Ok(proto::Plan {
            version: Some(proto::Version {
                minor_number: SUBSTRAIT_MINOR_VERSION,
                patch_number: 0,
                ..Default::default()
            }),
            extension_uris,
            extensions: extension_declarations,
            relations,
            ..Default::default()
        })
    }

    /// Reconstructs a plan from its proto form. Extensions decode first so
    /// scalar functions can resolve their anchors.
    pub fn from_proto(plan: &proto::Plan) -> Result<Self, Error> {
        let extensions = ExtensionRegistry::from_proto(plan)?;

        let mut root: Option<Relation> = None;
        let mut siblings = Vec::new();

        for plan_rel in &plan.relations {
            match &plan_rel.rel_type {
                Some(proto::plan_rel::RelType::Rel(rel)) => {
                    siblings.push(relation_from_proto(rel, &extensions)?);
                }
                Some(proto::plan_rel::RelType::Root(rel_root)) => {
                    if root.is_some() {
                        return Err(Error::MultipleRootRelations);
                    }
                    let input = rel_root.input.as_ref().ok_or_else(|| {
                        Error::UnrecognizedProtoType(
                            "root relation without an input".to_string(),
                        )
                    })?;
                    let relation = relation_from_proto(input, &extensions)?;
                    root = Some(restore_root_names(relation, &rel_root.names)?);
                }
                None => {
                    return Err(Error::UnrecognizedProtoType(
                        "plan relation without a rel type".to_string(),
                    ))
                }
            }
        }

        let mut relations = vec![root.ok_or(Error::NoRootRelation)?];
        relations.extend(siblings);

        Ok(Self { relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::table::{AnonymousCatalog, Table};
    use trellis_substrait::{Field, Schema, Type};

    fn test_catalog() -> Arc<dyn Catalog> {
        Arc::new(AnonymousCatalog::new(Schema::new(vec![
            Field::new("col1", Type::boolean(false)),
            Field::new("col2", Type::string(false)),
        ])))
    }

    fn bound_plan(relation: Relation) -> Plan {
        let mut plan = Plan::new(relation);
        plan.set_catalog(&test_catalog());
        plan
    }

    #[test]
    fn root_carries_output_names() {
        let plan = bound_plan(Relation::read(Table::named(vec![
            "db".into(),
            "t".into(),
        ])));

        let proto_plan = plan.to_proto().unwrap();
        assert_eq!(proto_plan.relations.len(), 1);

        let Some(proto::plan_rel::RelType::Root(root)) = &proto_plan.relations[0].rel_type
        else {
            panic!("expected a root relation");
        };
        assert_eq!(root.names, vec!["col1", "col2"]);
        assert!(root.input.is_some());
    }

    #[test]
    fn unbound_plan_does_not_serialize() {
        let plan = Plan::new(Relation::read(Table::named(vec!["db".into(), "t".into()])));
        assert!(matches!(plan.to_proto(), Err(Error::UnboundTable)));
    }

    #[test]
    fn matching_root_names_decode_without_a_wrapper() {
        let plan = bound_plan(Relation::projection(
            Relation::read(Table::named(vec!["db".into(), "t".into()])),
            vec![Expr::column("col1"), Expr::column("col2")],
        ));

        let decoded = Plan::from_proto(&plan.to_proto().unwrap()).unwrap();
        let Relation::Projection(projection) = decoded.root() else {
            panic!("expected the projection to decode without a renaming wrapper");
        };
        assert_eq!(
            projection.exprs,
            vec![Expr::column_index(0), Expr::column_index(1)]
        );
        assert!(matches!(*projection.input, Relation::Read(_)));
    }

    #[test]
    fn renamed_root_decodes_with_a_renaming_projection() {
        let plan = bound_plan(Relation::projection(
            Relation::read(Table::named(vec!["db".into(), "t".into()])),
            vec![
                Expr::alias(Expr::column("col1"), "first"),
                Expr::alias(Expr::column("col2"), "second"),
            ],
        ));

        let decoded = Plan::from_proto(&plan.to_proto().unwrap()).unwrap();
        assert_eq!(
            decoded.root().schema().unwrap().names(),
            vec!["first", "second"]
        );

        let Relation::Projection(wrapper) = decoded.root() else {
            panic!("expected a renaming projection at the root");
        };
        assert_eq!(
            wrapper.exprs,
            vec![
                Expr::alias(Expr::column_index(0), "first"),
                Expr::alias(Expr::column_index(1), "second"),
            ]
        );
    }

    #[test]
    fn multiple_roots_are_rejected() {
        let plan = bound_plan(Relation::read(Table::named(vec![
            "db".into(),
            "t".into(),
        ])));
        let mut proto_plan = plan.to_proto().unwrap();
        let root = proto_plan.relations[0].clone();
        proto_plan.relations.push(root);

        assert!(matches!(
            Plan::from_proto(&proto_plan),
            Err(Error::MultipleRootRelations)
        ));
    }

    #[test]
    fn plan_without_a_root_is_rejected() {
        let proto_plan = proto::Plan::default();
        assert!(matches!(
            Plan::from_proto(&proto_plan),
            Err(Error::NoRootRelation)
        ));
    }
}
