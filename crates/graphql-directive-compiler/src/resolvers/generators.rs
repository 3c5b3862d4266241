//! Request templates for index queries, per backing store.

use graphql_mapping_template::{
    boolean, compound, if_else, iff, iff_inline, int, method_call, obj, print, raw, reference, set, string,
    RESOLVER_VERSION_ID,
};

use super::{
    key_snippets::{set_query_snippet, DEFAULT_PAGE_LIMIT, MODEL_QUERY_EXPRESSION},
    sql::{generate_lambda_request_template, SqlOperation},
};
use crate::{context::TransformerContext, datasource::DbType, error::ResolverError, rules::index_directive::IndexConfig};

pub trait IndexQueryGenerator {
    fn generate_index_query_request_template(
        &self,
        index: &IndexConfig,
        ctx: &TransformerContext<'_>,
        table_name: &str,
        operation_name: &str,
    ) -> String;
}

/// A DynamoDB `Query` on the index.
pub struct DynamoDbIndexQueryGenerator;

/// An `INDEX` operation of the SQL Lambda.
pub struct SqlIndexQueryGenerator;

static DYNAMODB_GENERATOR: DynamoDbIndexQueryGenerator = DynamoDbIndexQueryGenerator;
static SQL_GENERATOR: SqlIndexQueryGenerator = SqlIndexQueryGenerator;

/// Picks the generator for a database type tag. No tag means DynamoDB.
pub fn select_generator(db_type: Option<&str>) -> Result<&'static dyn IndexQueryGenerator, ResolverError> {
    let Some(tag) = db_type else {
        return Ok(&DYNAMODB_GENERATOR);
    };

    match tag.parse::<DbType>() {
        Ok(DbType::Dynamodb) => Ok(&DYNAMODB_GENERATOR),
        Ok(DbType::Mysql | DbType::Postgres) => Ok(&SQL_GENERATOR),
        Err(_) => Err(ResolverError::UnknownDatabaseType(tag.to_string())),
    }
}

impl IndexQueryGenerator for DynamoDbIndexQueryGenerator {
    fn generate_index_query_request_template(
        &self,
        index: &IndexConfig,
        ctx: &TransformerContext<'_>,
        _table_name: &str,
        _operation_name: &str,
    ) -> String {
        let request = "QueryRequest";

        print(&compound([
            set_query_snippet(&index.key, &ctx.types, false),
            set(
                reference("limit"),
                method_call(
                    reference("util.defaultIfNull"),
                    [reference("context.args.limit"), int(DEFAULT_PAGE_LIMIT)],
                ),
            ),
            set(
                reference(request),
                obj([
                    ("version", string(RESOLVER_VERSION_ID)),
                    ("operation", string("Query")),
                    ("limit", reference("limit")),
                    ("query", reference(MODEL_QUERY_EXPRESSION)),
                    ("index", string(&index.name)),
                ]),
            ),
            if_else(
                raw("!$util.isNull($ctx.args.sortDirection) && $ctx.args.sortDirection == \"DESC\""),
                set(reference(format!("{request}.scanIndexForward")), boolean(false)),
                set(reference(format!("{request}.scanIndexForward")), boolean(true)),
            ),
            iff_inline(
                reference("context.args.nextToken"),
                set(reference(format!("{request}.nextToken")), reference("context.args.nextToken")),
            ),
            iff(
                reference("context.args.filter"),
                set(
                    reference(format!("{request}.filter")),
                    raw("$util.parseJson(\"$util.transform.toDynamoDBFilterExpression($ctx.args.filter)\")"),
                ),
            ),
            raw(format!("$util.toJson(${request})")),
        ]))
    }
}

impl IndexQueryGenerator for SqlIndexQueryGenerator {
    fn generate_index_query_request_template(
        &self,
        _index: &IndexConfig,
        ctx: &TransformerContext<'_>,
        table_name: &str,
        operation_name: &str,
    ) -> String {
        generate_lambda_request_template(table_name, SqlOperation::Index, operation_name, ctx)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::{config::TransformConfig, context::with_context};

    #[rstest]
    #[case::unset(None, r#""operation": "Query""#)]
    #[case::dynamodb(Some("DYNAMODB"), r#""operation": "Query""#)]
    #[case::mysql(Some("MYSQL"), r#"#set( $lambdaInput.operation = "INDEX" )"#)]
    #[case::postgres(Some("POSTGRES"), r#"#set( $lambdaInput.operation = "INDEX" )"#)]
    fn known_database_types(#[case] db_type: Option<&str>, #[case] operation: &str) {
        let schema = r#"
            type Post @model {
              id: ID!
              title: String! @index(name: "byTitle", queryField: "postsByTitle")
            }
        "#;

        let request = with_context(schema, &TransformConfig::default(), |ctx, _, indexes| {
            select_generator(db_type)
                .unwrap()
                .generate_index_query_request_template(&indexes[0], ctx, "Post", "postsByTitle")
        });

        assert!(request.contains(operation), "{request}");
    }

    #[test]
    fn unknown_database_type() {
        assert_matches!(
            select_generator(Some("ORACLE")).err(),
            Some(ResolverError::UnknownDatabaseType(tag)) if tag == "ORACLE"
        );
    }
}
