//! The table, data source and CRUD resolvers every `@model` starts out with.
//!
//! Custom keys and indexes are layered on top of these afterwards.

use graphql_mapping_template::{
    boolean, compound, empty_list, empty_obj, for_each, if_else, iff, iff_inline, int, method_call, obj, print_block,
    qref, raw, reference, set, string, to_json, Expression, RESOLVER_VERSION_ID,
};
use strum::IntoEnumIterator;

use super::{
    auth::generate_auth_expression_for_sandbox_mode,
    key_snippets::{DEFAULT_PAGE_LIMIT, DYNAMODB_NAME_OVERRIDE_MAP, MODEL_OBJECT_KEY, MODEL_QUERY_EXPRESSION},
    pipeline::{Resolver, SlotName, SlotTemplate},
    sql::{
        generate_default_lambda_response_mapping_template, generate_get_lambda_response_template,
        generate_lambda_request_template, SqlOperation,
    },
};
use crate::{
    context::TransformerContext,
    datasource::{DbType, DynamoDbProvisionStrategy},
    error::{Error, ResolverError},
    name_mapping::ResolverReference,
    provisioning::{DataSource, DataSourceKind, Table, SQL_LAMBDA_DATA_SOURCE, SQL_LAMBDA_FUNCTION, SQL_STACK_NAME},
    rules::model_directive::{ModelConfig, ModelOperation},
};

/// Provisions every model and registers its CRUD resolvers.
pub(crate) fn generate_model_resources(ctx: &mut TransformerContext<'_>) -> Result<(), Error> {
    let models: Vec<ModelConfig> = ctx.models.values().cloned().collect();

    for model in &models {
        let strategy = ctx
            .data_sources
            .get(&model.name)
            .cloned()
            .ok_or_else(|| ResolverError::NoDatasourceForModel(model.name.clone()))?;

        match strategy.provision_strategy() {
            Some(provision_strategy) => generate_dynamodb_model(model, provision_strategy, ctx)?,
            None => generate_sql_model(model, strategy.db_type(), ctx)?,
        }
    }

    Ok(())
}

fn generate_dynamodb_model(
    model: &ModelConfig,
    provision_strategy: DynamoDbProvisionStrategy,
    ctx: &mut TransformerContext<'_>,
) -> Result<(), ResolverError> {
    let table_name = ctx.resource_helper.model_name_mapping(&model.name).to_string();
    let table = Table::new(&model.name, &table_name, provision_strategy);
    let data_source = table.resource_id().to_string();

    tracing::debug!("provisioning {} for model {}", table.resource_id(), model.name);

    ctx.provisioning.add_data_source(DataSource {
        name: data_source.clone(),
        stack_id: table.stack_id().to_string(),
        kind: DataSourceKind::DynamoDb {
            table: table.resource_id().to_string(),
        },
    });
    ctx.provisioning.add_table(table);

    let is_sync_enabled = ctx.is_project_using_datastore();

    for operation in model_operations(model, is_sync_enabled) {
        let Some(key) = ctx.resolver_key(&model.name, operation) else {
            continue;
        };

        let request = match operation {
            ModelOperation::Get => dynamodb_get_request_template(),
            ModelOperation::List => dynamodb_list_request_template(),
            ModelOperation::Sync => dynamodb_sync_request_template(),
            ModelOperation::Create => dynamodb_create_request_template(),
            ModelOperation::Update => dynamodb_update_request_template(),
            ModelOperation::Delete => dynamodb_delete_request_template(),
        };

        let response = generate_default_response_mapping_template(is_sync_enabled, operation.is_mutation());
        let resolver = Resolver::new(key, Some(data_source.clone()), request, response, &model.name);

        register(ctx, model, operation, resolver)?;
    }

    Ok(())
}

/// Every SQL backed resolver shares one Lambda data source, created on first use.
pub(super) fn ensure_sql_data_source(ctx: &mut TransformerContext<'_>, db_type: DbType) {
    if ctx.provisioning.data_source(SQL_LAMBDA_DATA_SOURCE).is_some() {
        return;
    }

    tracing::debug!("provisioning {SQL_LAMBDA_DATA_SOURCE} for {db_type}");

    ctx.provisioning.add_data_source(DataSource {
        name: SQL_LAMBDA_DATA_SOURCE.to_string(),
        stack_id: SQL_STACK_NAME.to_string(),
        kind: DataSourceKind::Lambda {
            function_name: SQL_LAMBDA_FUNCTION.to_string(),
            db_type,
        },
    });
}

fn generate_sql_model(
    model: &ModelConfig,
    db_type: DbType,
    ctx: &mut TransformerContext<'_>,
) -> Result<(), ResolverError> {
    ensure_sql_data_source(ctx, db_type);

    let is_sync_enabled = ctx.is_project_using_datastore();

    for operation in model_operations(model, is_sync_enabled) {
        let Some(key) = ctx.resolver_key(&model.name, operation) else {
            continue;
        };

        let sql_operation = match operation {
            ModelOperation::Get => SqlOperation::Get,
            ModelOperation::List => SqlOperation::List,
            ModelOperation::Sync => SqlOperation::Sync,
            ModelOperation::Create => SqlOperation::Create,
            ModelOperation::Update => SqlOperation::Update,
            ModelOperation::Delete => SqlOperation::Delete,
        };

        let request = generate_lambda_request_template(&model.name, sql_operation, &key.field_name, ctx);
        let response = if operation == ModelOperation::Get {
            generate_get_lambda_response_template(is_sync_enabled)
        } else {
            generate_default_lambda_response_mapping_template(is_sync_enabled, operation.is_mutation())
        };

        ctx.resource_helper.add_resolver_reference(
            &model.name,
            ResolverReference {
                type_name: key.type_name.clone(),
                field_name: key.field_name.clone(),
                is_list: matches!(operation, ModelOperation::List | ModelOperation::Sync),
            },
        );

        let resolver = Resolver::new(key, Some(SQL_LAMBDA_DATA_SOURCE.to_string()), request, response, &model.name);

        register(ctx, model, operation, resolver)?;
    }

    Ok(())
}

fn model_operations(model: &ModelConfig, is_sync_enabled: bool) -> impl Iterator<Item = ModelOperation> + '_ {
    ModelOperation::iter()
        .filter(move |operation| is_sync_enabled || *operation != ModelOperation::Sync)
        .filter(move |operation| model.resolver_field(*operation).is_some())
}

/// Adds the init and post-auth slots shared by every store, then registers the resolver.
fn register(
    ctx: &mut TransformerContext<'_>,
    model: &ModelConfig,
    operation: ModelOperation,
    mut resolver: Resolver,
) -> Result<(), ResolverError> {
    let has_id = ctx.types.field(&model.name, "id").is_some();

    if let Some(init) = init_defaults_template(model, operation, has_id) {
        resolver.add_to_slot(SlotName::Init, SlotTemplate::request(init));
    }

    if operation == ModelOperation::Sync {
        if let Some(sync) = &ctx.config.sync {
            resolver.add_to_slot(
                SlotName::Init,
                SlotTemplate::request(sync_init_template(sync.delta_sync_table_ttl)),
            );
        }
    }

    resolver.add_to_slot(
        SlotName::PostAuth,
        SlotTemplate::request(generate_auth_expression_for_sandbox_mode(
            ctx.config.parameters.sandbox_mode_enabled,
        )),
    );

    tracing::trace!("registering resolver {}", resolver.key());
    ctx.resolvers.add(resolver)
}

/// Stashes the values a mutation writes unless its input overrides them: a generated `id` and the timestamps.
fn init_defaults_template(model: &ModelConfig, operation: ModelOperation, has_id: bool) -> Option<String> {
    let timestamps = match operation {
        ModelOperation::Create => [&model.timestamps.created_at, &model.timestamps.updated_at]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>(),
        ModelOperation::Update => model.timestamps.updated_at.iter().collect(),
        _ => return None,
    };

    let generates_id = operation == ModelOperation::Create && has_id;

    if timestamps.is_empty() && !generates_id {
        return None;
    }

    let mut statements = vec![qref(method_call(
        reference("ctx.stash.put"),
        [
            string("defaultValues"),
            method_call(
                reference("util.defaultIfNull"),
                [reference("ctx.stash.defaultValues"), empty_obj()],
            ),
        ],
    ))];

    if generates_id {
        statements.push(qref(method_call(
            reference("ctx.stash.defaultValues.put"),
            [string("id"), method_call(reference("util.autoId"), [])],
        )));
    }

    if !timestamps.is_empty() {
        statements.push(set(
            reference("createdAt"),
            method_call(reference("util.time.nowISO8601"), []),
        ));

        for field in timestamps {
            statements.push(qref(method_call(
                reference("ctx.stash.defaultValues.put"),
                [string(field), reference("createdAt")],
            )));
        }
    }

    statements.push(empty_payload());

    Some(print_block("Initialization default values", &compound(statements)))
}

fn sync_init_template(delta_sync_table_ttl: u32) -> String {
    print_block(
        "Sync Request template",
        &compound([
            qref(method_call(
                reference("ctx.stash.put"),
                [string("deltaSyncTableTtl"), int(i64::from(delta_sync_table_ttl))],
            )),
            empty_payload(),
        ]),
    )
}

fn empty_payload() -> Expression {
    to_json(obj([("version", string(RESOLVER_VERSION_ID)), ("payload", empty_obj())]))
}

/// Errors are raised, results returned as is. Mutation results are tagged with `__operation`.
///
/// With sync enabled the result travels along with the error, so that clients can resolve conflicts.
pub fn generate_default_response_mapping_template(is_sync_enabled: bool, mutation: bool) -> String {
    let mut statements = Vec::new();

    if mutation {
        statements.push(qref(method_call(
            reference("ctx.result.put"),
            [string("__operation"), string("Mutation")],
        )));
    }

    let mut error_params = vec![reference("ctx.error.message"), reference("ctx.error.type")];

    if is_sync_enabled {
        error_params.push(reference("ctx.result"));
    }

    statements.push(if_else(
        reference("ctx.error"),
        method_call(reference("util.error"), error_params),
        to_json(reference("ctx.result")),
    ));

    print_block("ResponseTemplate", &compound(statements))
}

/// `$key`: the stashed custom key, or the `id` argument.
fn item_key(variable: &str, id: &str) -> Expression {
    if_else(
        reference(format!("ctx.stash.metadata.{MODEL_OBJECT_KEY}")),
        set(reference(variable), reference(format!("ctx.stash.metadata.{MODEL_OBJECT_KEY}"))),
        set(
            reference(variable),
            obj([("id", reference(format!("util.dynamodb.toDynamoDB(${id})")))]),
        ),
    )
}

fn merge_values() -> Vec<Expression> {
    vec![
        set(
            reference("mergedValues"),
            method_call(
                reference("util.defaultIfNull"),
                [reference("ctx.stash.defaultValues"), empty_obj()],
            ),
        ),
        qref(method_call(
            reference("mergedValues.putAll"),
            [method_call(
                reference("util.defaultIfNull"),
                [reference("ctx.args.input"), empty_obj()],
            )],
        )),
    ]
}

fn page_limit() -> Expression {
    set(
        reference("limit"),
        method_call(
            reference("util.defaultIfNull"),
            [reference("context.args.limit"), int(DEFAULT_PAGE_LIMIT)],
        ),
    )
}

fn filter_expression(request: &str) -> Expression {
    iff(
        reference("context.args.filter"),
        set(
            reference(format!("{request}.filter")),
            raw("$util.parseJson(\"$util.transform.toDynamoDBFilterExpression($ctx.args.filter)\")"),
        ),
    )
}

fn next_token(request: &str) -> Expression {
    iff_inline(
        reference("context.args.nextToken"),
        set(reference(format!("{request}.nextToken")), reference("context.args.nextToken")),
    )
}

fn dynamodb_get_request_template() -> String {
    print_block(
        "Get Request template",
        &compound([
            set(
                reference("GetRequest"),
                obj([("version", string(RESOLVER_VERSION_ID)), ("operation", string("GetItem"))]),
            ),
            item_key("key", "ctx.args.id"),
            qref(method_call(reference("GetRequest.put"), [string("key"), reference("key")])),
            to_json(reference("GetRequest")),
        ]),
    )
}

/// A query when the pre-auth slot stashed a key condition, a scan otherwise.
fn dynamodb_list_request_template() -> String {
    let query_expression = format!("ctx.stash.{MODEL_QUERY_EXPRESSION}");

    print_block(
        "List Request",
        &compound([
            page_limit(),
            set(
                reference("ListRequest"),
                obj([("version", string(RESOLVER_VERSION_ID)), ("limit", reference("limit"))]),
            ),
            next_token("ListRequest"),
            filter_expression("ListRequest"),
            if_else(
                raw(format!(
                    "!$util.isNull(${query_expression}) && !$util.isNullOrEmpty(${query_expression}.expression)"
                )),
                compound([
                    qref(method_call(
                        reference("ListRequest.put"),
                        [string("operation"), string("Query")],
                    )),
                    qref(method_call(
                        reference("ListRequest.put"),
                        [string("query"), reference(&query_expression)],
                    )),
                    if_else(
                        raw("!$util.isNull($ctx.args.sortDirection) && $ctx.args.sortDirection == \"DESC\""),
                        set(reference("ListRequest.scanIndexForward"), boolean(false)),
                        set(reference("ListRequest.scanIndexForward"), boolean(true)),
                    ),
                ]),
                qref(method_call(
                    reference("ListRequest.put"),
                    [string("operation"), string("Scan")],
                )),
            ),
            to_json(reference("ListRequest")),
        ]),
    )
}

/// The pre-auth slot stashes a ready query when the sync filter matched a key.
fn dynamodb_sync_request_template() -> String {
    print_block(
        "Sync Request template",
        &if_else(
            reference("ctx.stash.QueryRequest"),
            to_json(reference("ctx.stash.QueryRequest")),
            compound([
                page_limit(),
                set(
                    reference("SyncRequest"),
                    obj([
                        ("version", string(RESOLVER_VERSION_ID)),
                        ("operation", string("Sync")),
                        ("limit", reference("limit")),
                        ("lastSync", reference("util.defaultIfNull($ctx.args.lastSync, null)")),
                    ]),
                ),
                next_token("SyncRequest"),
                filter_expression("SyncRequest"),
                to_json(reference("SyncRequest")),
            ]),
        ),
    )
}

fn dynamodb_create_request_template() -> String {
    let mut statements = merge_values();

    statements.extend([
        set(
            reference("PutObject"),
            obj([
                ("version", string(RESOLVER_VERSION_ID)),
                ("operation", string("PutItem")),
                (
                    "attributeValues",
                    method_call(reference("util.dynamodb.toMapValues"), [reference("mergedValues")]),
                ),
            ]),
        ),
        item_key("Key", "mergedValues.id"),
        qref(method_call(reference("PutObject.put"), [string("key"), reference("Key")])),
        to_json(reference("PutObject")),
    ]);

    print_block("Create Request template", &compound(statements))
}

/// Sets every input attribute outside the key. Composite sort keys use the placeholder name the pre-auth slot
/// registered, as `#` is not allowed in expression names.
fn dynamodb_update_request_template() -> String {
    let mut statements = merge_values();

    statements.extend([
        item_key("Key", "mergedValues.id"),
        set(reference("expSet"), empty_list()),
        set(reference("expNames"), empty_obj()),
        set(reference("expValues"), empty_obj()),
        for_each(
            reference("entry"),
            reference("mergedValues.entrySet()"),
            [iff(
                raw("!$Key.containsKey($entry.key)"),
                compound([
                    set(
                        reference("entryName"),
                        raw(format!(
                            "$util.defaultIfNull($ctx.stash.metadata.{DYNAMODB_NAME_OVERRIDE_MAP}.get($entry.key), $entry.key)"
                        )),
                    ),
                    raw("$util.qr($expSet.add(\"#$entryName = :$entryName\"))"),
                    raw("$util.qr($expNames.put(\"#$entryName\", $entry.key))"),
                    raw("$util.qr($expValues.put(\":$entryName\", $util.dynamodb.toDynamoDB($entry.value)))"),
                ]),
            )],
        ),
        set(reference("expression"), string("SET")),
        for_each(
            reference("assignment"),
            reference("expSet"),
            [
                set(reference("expression"), string("$expression $assignment")),
                iff_inline(
                    reference("foreach.hasNext"),
                    set(reference("expression"), string("$expression,")),
                ),
            ],
        ),
        set(
            reference("UpdateItem"),
            obj([
                ("version", string(RESOLVER_VERSION_ID)),
                ("operation", string("UpdateItem")),
                ("key", reference("Key")),
                (
                    "update",
                    obj([
                        ("expression", string("$expression")),
                        ("expressionNames", reference("expNames")),
                        ("expressionValues", reference("expValues")),
                    ]),
                ),
            ]),
        ),
        to_json(reference("UpdateItem")),
    ]);

    print_block("Update Request template", &compound(statements))
}

fn dynamodb_delete_request_template() -> String {
    print_block(
        "Delete Request template",
        &compound([
            set(
                reference("DeleteRequest"),
                obj([("version", string(RESOLVER_VERSION_ID)), ("operation", string("DeleteItem"))]),
            ),
            item_key("Key", "ctx.args.input.id"),
            qref(method_call(reference("DeleteRequest.put"), [string("key"), reference("Key")])),
            to_json(reference("DeleteRequest")),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rules::model_directive::Timestamps;

    fn post() -> ModelConfig {
        ModelConfig {
            name: "Post".to_string(),
            get: Some("getPost".to_string()),
            list: Some("listPosts".to_string()),
            sync: Some("syncPosts".to_string()),
            create: Some("createPost".to_string()),
            update: Some("updatePost".to_string()),
            delete: None,
            timestamps: Timestamps::default(),
        }
    }

    #[test]
    fn operations_skip_disabled_fields_and_sync_without_datastore() {
        let model = post();

        assert_eq!(
            model_operations(&model, false).collect::<Vec<_>>(),
            vec![
                ModelOperation::Get,
                ModelOperation::List,
                ModelOperation::Create,
                ModelOperation::Update
            ]
        );
        assert!(model_operations(&model, true).any(|operation| operation == ModelOperation::Sync));
    }

    #[test]
    fn create_defaults_generate_id_and_timestamps() {
        assert_eq!(
            init_defaults_template(&post(), ModelOperation::Create, true).unwrap(),
            indoc! {r#"
                ## [Start] Initialization default values. **
                $util.qr($ctx.stash.put("defaultValues", $util.defaultIfNull($ctx.stash.defaultValues, {})))
                $util.qr($ctx.stash.defaultValues.put("id", $util.autoId()))
                #set( $createdAt = $util.time.nowISO8601() )
                $util.qr($ctx.stash.defaultValues.put("createdAt", $createdAt))
                $util.qr($ctx.stash.defaultValues.put("updatedAt", $createdAt))
                $util.toJson({
                  "version": "2018-05-29",
                  "payload": {}
                })
                ## [End] Initialization default values. **"#}
        );
    }

    #[test]
    fn defaults_depend_on_operation_and_timestamps() {
        let mut model = post();

        let update = init_defaults_template(&model, ModelOperation::Update, true).unwrap();
        assert!(!update.contains("autoId"));
        assert!(update.contains(r#"$util.qr($ctx.stash.defaultValues.put("updatedAt", $createdAt))"#));
        assert!(!update.contains(r#""createdAt""#));

        assert_eq!(init_defaults_template(&model, ModelOperation::Get, true), None);

        model.timestamps = Timestamps {
            created_at: None,
            updated_at: None,
        };
        assert_eq!(init_defaults_template(&model, ModelOperation::Update, true), None);
        assert_eq!(init_defaults_template(&model, ModelOperation::Create, false), None);
    }

    #[test]
    fn list_request_queries_when_a_key_condition_was_stashed() {
        let template = dynamodb_list_request_template();

        assert!(template.contains(
            "#if( !$util.isNull($ctx.stash.modelQueryExpression) && !$util.isNullOrEmpty($ctx.stash.modelQueryExpression.expression) )"
        ));
        assert!(template.contains(r#"$util.qr($ListRequest.put("operation", "Scan"))"#));
    }

    #[test]
    fn update_request_uses_placeholder_names_for_composite_keys() {
        let template = dynamodb_update_request_template();

        assert!(template.contains(
            "#set( $entryName = $util.defaultIfNull($ctx.stash.metadata.dynamodbNameOverrideMap.get($entry.key), $entry.key) )"
        ));
        assert!(template.contains("#set( $Key = $ctx.stash.metadata.modelObjectKey )"));
    }
}
