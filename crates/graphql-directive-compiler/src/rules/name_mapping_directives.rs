//! `@mapsTo` and `@refersTo` point models and fields at differently named storage.

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, TypeDefinition},
    Positioned,
};
use serde::Deserialize;

use super::{
    model_directive::is_model,
    visitor::{Visitor, VisitorContext},
};
use crate::{datasource::DataSourceMap, directive_de::parse_directive, name_mapping::FieldMapEntry};

pub const MAPS_TO_DIRECTIVE: &str = "mapsTo";
pub const REFERS_TO_DIRECTIVE: &str = "refersTo";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NameArguments {
    name: String,
}

pub struct NameMappingDirectives<'d> {
    data_sources: &'d DataSourceMap,
}

impl<'d> NameMappingDirectives<'d> {
    pub fn new(data_sources: &'d DataSourceMap) -> Self {
        Self { data_sources }
    }
}

impl<'a> Visitor<'a> for NameMappingDirectives<'_> {
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        let directive_name = directive.node.name.node.as_str();

        if directive_name != MAPS_TO_DIRECTIVE && directive_name != REFERS_TO_DIRECTIVE {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        if !is_model(parent_type) {
            ctx.report_error(
                vec![directive.pos],
                format!("@{directive_name} is only supported on @model types. Check type \"{type_name}\"."),
            );
            return;
        }

        let arguments = match parse_directive::<NameArguments>(directive) {
            Ok(arguments) => arguments,
            Err(error) => {
                ctx.append_errors(vec![error]);
                return;
            }
        };

        let is_sql = self.data_sources.is_sql_model(type_name);

        match (directive_name, field) {
            (MAPS_TO_DIRECTIVE, Some(_)) => {
                ctx.report_error(vec![directive.pos], "@mapsTo may only be added to object definitions.");
            }
            (MAPS_TO_DIRECTIVE, None) => {
                ctx.resource_helper.set_model_name_mapping(type_name, arguments.name);
            }
            (_, _) if !is_sql => {
                ctx.report_error(vec![directive.pos], "@refersTo is not supported on DynamoDB models.");
            }
            (_, None) => {
                ctx.resource_helper.set_model_name_mapping(type_name, arguments.name);
            }
            (_, Some(field)) => {
                ctx.resource_helper
                    .model_field_map_mut(type_name)
                    .add_mapped_field(FieldMapEntry {
                        original_field_name: arguments.name,
                        current_field_name: field.node.name.node.to_string(),
                    });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        datasource::{ModelDataSourceStrategy, SqlModelDataSourceDbConnectionConfig, SqlModelDataSourceStrategy},
        rules::visitor::{visit, VisitorNil},
    };

    fn sql_strategy() -> ModelDataSourceStrategy {
        ModelDataSourceStrategy::Mysql(SqlModelDataSourceStrategy {
            name: "blog".to_string(),
            db_connection_config: SqlModelDataSourceDbConnectionConfig {
                hostname_ssm_path: "/blog/host".to_string(),
                port_ssm_path: "/blog/port".to_string(),
                username_ssm_path: "/blog/user".to_string(),
                password_ssm_path: "/blog/password".to_string(),
                database_name_ssm_path: "/blog/database".to_string(),
            },
            vpc_configuration: None,
            custom_sql_statements: Default::default(),
            sql_lambda_provisioned_concurrency_config: None,
        })
    }

    const SCHEMA: &str = indoc! {r#"
        type Task @model @refersTo(name: "tasks") {
            id: ID!
            title: String @refersTo(name: "task_title")
        }

        type Note @model @mapsTo(name: "Memo") {
            id: ID!
        }
    "#};

    #[test]
    fn records_mappings() {
        let data_sources: DataSourceMap = [
            ("Task", sql_strategy()),
            ("Note", ModelDataSourceStrategy::default()),
        ]
        .into_iter()
        .collect();

        let document = parse_schema(SCHEMA).unwrap();
        let mut ctx = VisitorContext::new(&document);
        visit(
            &mut VisitorNil.with(NameMappingDirectives::new(&data_sources)),
            &mut ctx,
            &document,
        );

        assert!(ctx.errors.is_empty());
        assert_eq!(ctx.resource_helper.model_name_mapping("Task"), "tasks");
        assert_eq!(ctx.resource_helper.model_name_mapping("Note"), "Memo");
        assert_eq!(
            ctx.resource_helper.model_field_map("Task").unwrap().mapped_fields(),
            &[FieldMapEntry {
                original_field_name: "task_title".to_string(),
                current_field_name: "title".to_string(),
            }]
        );
    }

    #[test]
    fn refers_to_requires_a_sql_model() {
        let data_sources = DataSourceMap::new();

        let document = parse_schema(SCHEMA).unwrap();
        let mut ctx = VisitorContext::new(&document);
        visit(
            &mut VisitorNil.with(NameMappingDirectives::new(&data_sources)),
            &mut ctx,
            &document,
        );

        let errors: Vec<_> = ctx.errors.iter().map(|error| error.message()).collect();
        assert_eq!(
            errors,
            vec![
                "@refersTo is not supported on DynamoDB models.",
                "@refersTo is not supported on DynamoDB models.",
            ]
        );
    }
}
