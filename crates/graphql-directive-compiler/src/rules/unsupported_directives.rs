//! Rejects directives that SQL backed models cannot honour.

use std::collections::HashSet;

use async_graphql_parser::{
    parse_schema,
    types::{ConstDirective, FieldDefinition, ServiceDocument, TypeDefinition},
    Positioned,
};

use super::visitor::{visit, Visitor, VisitorContext};
use crate::{
    datasource::DataSourceMap,
    error::{Error, UnsupportedDirectiveError, UNSUPPORTED_SQL_DIRECTIVES},
    schema_types::QUERY_TYPE,
};

/// Fails on the first unsupported directive found on `Query` or on a SQL model.
///
/// Blank schemas and empty data source maps are accepted as is.
pub fn check_for_unsupported_directives(schema: &str, data_sources: &DataSourceMap) -> Result<(), Error> {
    if schema.trim().is_empty() || data_sources.is_empty() {
        return Ok(());
    }

    let document = parse_schema(schema)?;
    validate_document(&document, data_sources)?;

    Ok(())
}

pub(crate) fn validate_document(
    document: &ServiceDocument,
    data_sources: &DataSourceMap,
) -> Result<(), UnsupportedDirectiveError> {
    let relational: HashSet<&str> = data_sources.sql_models().collect();

    if relational.is_empty() {
        return Ok(());
    }

    let mut rule = UnsupportedDirectives {
        relational,
        violation: None,
    };

    let mut ctx = VisitorContext::new(document);
    visit(&mut rule, &mut ctx, document);

    match rule.violation {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

struct UnsupportedDirectives<'m> {
    relational: HashSet<&'m str>,
    violation: Option<UnsupportedDirectiveError>,
}

impl<'a> Visitor<'a> for UnsupportedDirectives<'_> {
    fn enter_directive(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        if self.violation.is_some() {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        if type_name != QUERY_TYPE && !self.relational.contains(type_name) {
            return;
        }

        let directive_name = directive.node.name.node.as_str();

        if UNSUPPORTED_SQL_DIRECTIVES.contains(&directive_name) {
            self.violation = Some(UnsupportedDirectiveError {
                directive: directive_name.to_string(),
                type_name: type_name.to_string(),
                field_name: field.map(|field| field.node.name.node.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::datasource::{
        ModelDataSourceStrategy, SqlModelDataSourceDbConnectionConfig, SqlModelDataSourceStrategy,
    };

    fn postgres() -> ModelDataSourceStrategy {
        ModelDataSourceStrategy::Postgres(SqlModelDataSourceStrategy {
            name: "inventory".to_string(),
            db_connection_config: SqlModelDataSourceDbConnectionConfig {
                hostname_ssm_path: "/inventory/host".to_string(),
                port_ssm_path: "/inventory/port".to_string(),
                username_ssm_path: "/inventory/user".to_string(),
                password_ssm_path: "/inventory/password".to_string(),
                database_name_ssm_path: "/inventory/database".to_string(),
            },
            vpc_configuration: None,
            custom_sql_statements: Default::default(),
            sql_lambda_provisioned_concurrency_config: None,
        })
    }

    const SCHEMA: &str = indoc! {r"
        type Post @model {
            id: ID!
            title: String @searchable
        }
    "};

    #[test]
    fn searchable_on_a_sql_model_field() {
        let data_sources: DataSourceMap = [("Post", postgres())].into_iter().collect();

        let error = check_for_unsupported_directives(SCHEMA, &data_sources).unwrap_err();

        assert_matches!(&error, Error::UnsupportedDirective(UnsupportedDirectiveError { directive, type_name, field_name })
            if directive == "searchable" && type_name == "Post" && field_name.as_deref() == Some("title"));
        assert_eq!(
            error.to_string(),
            "@searchable directive on type \"Post\" and field \"title\" is not supported on a SQL datasource. \
             Following directives are not supported on a SQL datasource: searchable, predictions, function, manyToMany, http, mapsTo"
        );
    }

    #[test]
    fn searchable_on_a_dynamodb_model() {
        let data_sources: DataSourceMap = [("Post", ModelDataSourceStrategy::default())].into_iter().collect();

        assert!(check_for_unsupported_directives(SCHEMA, &data_sources).is_ok());
    }

    #[rstest]
    #[case::blank_schema("   ", true)]
    #[case::no_data_sources(SCHEMA, false)]
    fn no_ops(#[case] schema: &str, #[case] with_data_sources: bool) {
        let data_sources: DataSourceMap = if with_data_sources {
            [("Post", postgres())].into_iter().collect()
        } else {
            DataSourceMap::new()
        };

        assert!(check_for_unsupported_directives(schema, &data_sources).is_ok());
    }

    #[test]
    fn query_fields_are_checked_with_any_sql_model() {
        let schema = indoc! {r"
            type Post @model { id: ID! }
            type Query { echo(msg: String): String @function(name: echo) }
        "};
        let data_sources: DataSourceMap = [("Post", postgres())].into_iter().collect();

        let error = check_for_unsupported_directives(schema, &data_sources).unwrap_err();

        assert_matches!(error, Error::UnsupportedDirective(UnsupportedDirectiveError { ref directive, ref type_name, .. })
            if directive == "function" && type_name == "Query");
    }

    #[test]
    fn type_level_directive_is_reported_first() {
        let schema = indoc! {r#"
            type Post @model @mapsTo(name: "Article") {
                id: ID!
                title: String @searchable
            }
        "#};
        let data_sources: DataSourceMap = [("Post", postgres())].into_iter().collect();

        let error = check_for_unsupported_directives(schema, &data_sources).unwrap_err();

        assert!(error
            .to_string()
            .starts_with("@mapsTo directive on type \"Post\"  is not supported on a SQL datasource."));
    }
}
