//! Request and response templates invoking the SQL Lambda.
//!
//! The Lambda receives the mapped table name, the operation and the merged arguments. Metadata tells it which
//! fields are stored as JSON, which are arrays, and how GraphQL field names map to columns.

use graphql_mapping_template::{
    compound, empty_list, empty_obj, iff, list, method_call, not, obj, print_block, qref, reference, set, string,
    Expression, RESOLVER_VERSION_ID,
};

use super::model::generate_default_response_mapping_template;
use crate::{
    context::TransformerContext,
    schema_types::{is_list_type, SchemaTypes},
};

/// The operation the SQL Lambda performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlOperation {
    Create,
    Update,
    Delete,
    Get,
    List,
    Sync,
    /// A query on a secondary index.
    Index,
    /// A custom `@sql` statement.
    RawSql,
}

pub fn generate_lambda_request_template(
    table_name: &str,
    operation: SqlOperation,
    operation_name: &str,
    ctx: &TransformerContext<'_>,
) -> String {
    let mapped_table_name = ctx.resource_helper.model_name_mapping(table_name);

    print_block(
        "Invoke RDS Lambda data source",
        &compound([
            set(reference("lambdaInput"), empty_obj()),
            set(reference("lambdaInput.args"), empty_obj()),
            set(reference("lambdaInput.table"), string(mapped_table_name)),
            set(reference("lambdaInput.operation"), string(operation.as_ref())),
            set(reference("lambdaInput.operationName"), string(operation_name)),
            set(reference("lambdaInput.args.metadata"), empty_obj()),
            set(reference("lambdaInput.args.metadata.keys"), empty_list()),
            auth_filter_statement("lambdaInput.args.metadata.authFilter"),
            set(
                reference("lambdaInput.args.metadata.nonScalarFields"),
                list(get_non_scalar_fields(table_name, &ctx.types).into_iter().map(string)),
            ),
            set(
                reference("lambdaInput.args.metadata.arrayFields"),
                list(get_array_fields(table_name, &ctx.types).into_iter().map(string)),
            ),
            field_mapping_input(),
            qref(method_call(
                reference("lambdaInput.args.metadata.keys.addAll"),
                [default_if_null(reference("ctx.stash.keys"), empty_list())],
            )),
            set(
                reference("lambdaInput.args.input"),
                default_if_null(reference("ctx.stash.defaultValues"), empty_obj()),
            ),
            qref(method_call(
                reference("lambdaInput.args.input.putAll"),
                [default_if_null(reference("context.arguments"), empty_obj())],
            )),
            invoke_payload(),
        ]),
    )
}

/// Runs a custom `@sql` statement with the field arguments.
pub fn generate_sql_lambda_request_template(statement: &str, operation_name: &str) -> String {
    print_block(
        "Invoke RDS Lambda data source",
        &compound([
            set(reference("lambdaInput"), empty_obj()),
            set(reference("lambdaInput.args"), empty_obj()),
            set(reference("lambdaInput.statement"), string(statement)),
            set(reference("lambdaInput.operation"), string(SqlOperation::RawSql.as_ref())),
            set(reference("lambdaInput.operationName"), string(operation_name)),
            set(reference("lambdaInput.args.metadata"), empty_obj()),
            auth_filter_statement("lambdaInput.args.metadata.authFilter"),
            qref(method_call(
                reference("lambdaInput.args.putAll"),
                [default_if_null(reference("context.arguments"), empty_obj())],
            )),
            invoke_payload(),
        ]),
    )
}

pub fn generate_get_lambda_response_template(is_sync_enabled: bool) -> String {
    generate_default_response_mapping_template(is_sync_enabled, false)
}

pub fn generate_default_lambda_response_mapping_template(is_sync_enabled: bool, mutation: bool) -> String {
    generate_default_response_mapping_template(is_sync_enabled, mutation)
}

/// Fields stored as JSON: lists, objects and `AWSJSON`.
pub fn get_non_scalar_fields(model: &str, types: &SchemaTypes<'_>) -> Vec<String> {
    types
        .object_fields(model)
        .filter(|field| types.is_array_or_object(&field.node.ty.node))
        .map(|field| field.node.name.node.to_string())
        .collect()
}

pub fn get_array_fields(model: &str, types: &SchemaTypes<'_>) -> Vec<String> {
    types
        .object_fields(model)
        .filter(|field| is_list_type(&field.node.ty.node))
        .map(|field| field.node.name.node.to_string())
        .collect()
}

fn auth_filter_statement(key: &str) -> Expression {
    iff(
        not(method_call(reference("util.isNullOrEmpty"), [reference("ctx.stash.authFilter")])),
        set(reference(key), reference("ctx.stash.authFilter")),
    )
}

/// Copies the field map stashed by the init slot into the Lambda metadata.
fn field_mapping_input() -> Expression {
    compound([
        set(reference("lambdaInput.args.metadata.fieldMap"), empty_obj()),
        qref(method_call(
            reference("lambdaInput.args.metadata.fieldMap.putAll"),
            [default_if_null(reference("context.stash.fieldMap"), empty_obj())],
        )),
    ])
}

fn invoke_payload() -> Expression {
    obj([
        ("version", string(RESOLVER_VERSION_ID)),
        ("operation", string("Invoke")),
        (
            "payload",
            method_call(reference("util.toJson"), [reference("lambdaInput")]),
        ),
    ])
}

fn default_if_null(value: Expression, default: Expression) -> Expression {
    method_call(reference("util.defaultIfNull"), [value, default])
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn field_classification() {
        let document = parse_schema(
            r"
            enum Status { DRAFT PUBLISHED }
            type Address { street: String }
            type Post @model {
                id: ID!
                status: Status
                tags: [String]
                statuses: [Status!]!
                address: Address
                metadata: AWSJSON
                rating: Int
            }
            ",
        )
        .unwrap();
        let types = SchemaTypes::new(&document);

        assert_eq!(
            get_non_scalar_fields("Post", &types),
            vec!["tags", "statuses", "address", "metadata"]
        );
        assert_eq!(get_array_fields("Post", &types), vec!["tags", "statuses"]);
    }

    #[test]
    fn mutation_response_is_tagged() {
        assert_eq!(
            generate_default_lambda_response_mapping_template(false, true),
            indoc! {r#"
                ## [Start] ResponseTemplate. **
                $util.qr($ctx.result.put("__operation", "Mutation"))
                #if( $ctx.error )
                  $util.error($ctx.error.message, $ctx.error.type)
                #else
                  $util.toJson($ctx.result)
                #end
                ## [End] ResponseTemplate. **"#}
        );
    }

    #[test]
    fn sync_responses_return_the_result_with_errors() {
        assert_eq!(
            generate_get_lambda_response_template(true),
            indoc! {r#"
                ## [Start] ResponseTemplate. **
                #if( $ctx.error )
                  $util.error($ctx.error.message, $ctx.error.type, $ctx.result)
                #else
                  $util.toJson($ctx.result)
                #end
                ## [End] ResponseTemplate. **"#}
        );
        assert!(!generate_default_lambda_response_mapping_template(true, false).contains("__operation"));
    }

    #[test]
    fn custom_statement_request() {
        let template = generate_sql_lambda_request_template("SELECT * FROM TAXRATE WHERE ZIP = :zip", "calculateTax");

        assert!(template.contains(r#"#set( $lambdaInput.statement = "SELECT * FROM TAXRATE WHERE ZIP = :zip" )"#));
        assert!(template.contains(r#"#set( $lambdaInput.operation = "RAW_SQL" )"#));
        assert!(template.contains(r#"$util.qr($lambdaInput.args.putAll($util.defaultIfNull($context.arguments, {})))"#));
    }
}
