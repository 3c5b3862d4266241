//! `@sql` backs a `Query` or `Mutation` field with a custom SQL statement.

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, TypeDefinition},
    Positioned,
};
use serde::Deserialize;

use super::visitor::{Visitor, VisitorContext};
use crate::{
    config::TransformConfig,
    directive_de::parse_directive,
    schema_types::{MUTATION_TYPE, QUERY_TYPE},
};

pub const SQL_DIRECTIVE: &str = "sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDirectiveConfig {
    pub type_name: String,
    pub field_name: String,
    /// The statement, resolved when given by reference.
    pub statement: String,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SqlArguments {
    #[serde(default)]
    statement: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

pub struct SqlDirective<'c> {
    config: &'c TransformConfig,
}

impl<'c> SqlDirective<'c> {
    pub fn new(config: &'c TransformConfig) -> Self {
        Self { config }
    }
}

impl<'a> Visitor<'a> for SqlDirective<'_> {
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        if directive.node.name.node != SQL_DIRECTIVE {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        let Some(field) = field else {
            ctx.report_error(
                vec![directive.pos],
                format!("@sql directive may only be added to field definitions. Check type \"{type_name}\"."),
            );
            return;
        };

        let field_name = field.node.name.node.as_str();
        let location = format!("Check type \"{type_name}\" and field \"{field_name}\".");

        if type_name != QUERY_TYPE && type_name != MUTATION_TYPE {
            ctx.report_error(
                vec![directive.pos],
                format!("@sql directive can only be used on Query or Mutation types. {location}"),
            );
            return;
        }

        let arguments = match parse_directive::<SqlArguments>(directive) {
            Ok(arguments) => arguments,
            Err(error) => {
                ctx.append_errors(vec![error]);
                return;
            }
        };

        let statement = match (arguments.statement, arguments.reference.as_deref()) {
            (Some(_), Some(_)) => {
                ctx.report_error(
                    vec![directive.pos],
                    format!("@sql directive can have either 'statement' or 'reference' argument but not both. {location}"),
                );
                return;
            }
            (Some(statement), None) if statement.trim().is_empty() => {
                ctx.report_error(
                    vec![directive.pos],
                    format!("@sql directive 'statement' argument must not be empty. {location}"),
                );
                return;
            }
            (Some(statement), None) => statement,
            (None, Some(reference)) => match self.config.sql_statement(reference) {
                Some(statement) => statement.to_string(),
                None => {
                    ctx.report_error(
                        vec![directive.pos],
                        format!(
                            "@sql directive 'reference' argument must be a valid custom query name. {location} \
                             The custom query \"{reference}\" does not exist in \"sql-statements\" directory."
                        ),
                    );
                    return;
                }
            },
            (None, None) => {
                ctx.report_error(
                    vec![directive.pos],
                    format!("@sql directive must have either a 'statement' or a 'reference' argument. {location}"),
                );
                return;
            }
        };

        ctx.sql_fields.push(SqlDirectiveConfig {
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
            statement,
            reference: arguments.reference,
        });
    }
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::rules::visitor::{visit, VisitorNil};

    fn run(schema: &str, config: &TransformConfig) -> (Vec<SqlDirectiveConfig>, Vec<String>) {
        let document = parse_schema(schema).unwrap();
        let mut ctx = VisitorContext::new(&document);
        visit(&mut VisitorNil.with(SqlDirective::new(config)), &mut ctx, &document);

        (ctx.sql_fields, ctx.errors.into_iter().map(|error| error.message).collect())
    }

    #[test]
    fn resolves_references() {
        let mut config = TransformConfig::default();
        config
            .sql_statements
            .insert("calculate-tax".to_string(), "SELECT * FROM TAXRATE WHERE ZIP = :zip".to_string());

        let (fields, errors) = run(
            r#"type Query { calculateTax(zip: String): AWSJSON @sql(reference: "calculate-tax") }"#,
            &config,
        );

        assert!(errors.is_empty());
        assert_eq!(
            fields,
            vec![SqlDirectiveConfig {
                type_name: "Query".to_string(),
                field_name: "calculateTax".to_string(),
                statement: "SELECT * FROM TAXRATE WHERE ZIP = :zip".to_string(),
                reference: Some("calculate-tax".to_string()),
            }]
        );
    }

    #[rstest]
    #[case::both_arguments(
        r#"type Query { tax: Int @sql(statement: "SELECT 1", reference: "tax") }"#,
        r#"@sql directive can have either 'statement' or 'reference' argument but not both. Check type "Query" and field "tax"."#
    )]
    #[case::empty_statement(
        r#"type Mutation { reset: Int @sql(statement: "  ") }"#,
        r#"@sql directive 'statement' argument must not be empty. Check type "Mutation" and field "reset"."#
    )]
    #[case::unknown_reference(
        r#"type Query { tax: Int @sql(reference: "tax") }"#,
        r#"@sql directive 'reference' argument must be a valid custom query name. Check type "Query" and field "tax". The custom query "tax" does not exist in "sql-statements" directory."#
    )]
    #[case::not_a_root_type(
        r#"type Post { tax: Int @sql(statement: "SELECT 1") }"#,
        r#"@sql directive can only be used on Query or Mutation types. Check type "Post" and field "tax"."#
    )]
    #[case::no_arguments(
        r#"type Query { tax: Int @sql }"#,
        r#"@sql directive must have either a 'statement' or a 'reference' argument. Check type "Query" and field "tax"."#
    )]
    fn invalid_sql_directives(#[case] schema: &str, #[case] expected: &str) {
        let (fields, errors) = run(schema, &TransformConfig::default());

        assert!(fields.is_empty());
        assert_eq!(errors, vec![expected.to_string()]);
    }
}
