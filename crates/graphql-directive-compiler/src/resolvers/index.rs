//! Custom primary keys and secondary indexes, layered over the CRUD resolvers of their model.
//!
//! Changes to a resolver land in its pre-auth slot. A DynamoDB model also gets its table key schema replaced and
//! its indexes provisioned. Relational models only learn which columns make up their key.

use graphql_mapping_template::{compound, iff, print, raw, reference};
use serde_json::json;

use super::{
    auth::generate_auth_expression_for_sandbox_mode,
    generators::select_generator,
    key_snippets::{
        ensure_composite_key_snippet, merge_inputs_and_defaults_snippet, set_primary_key_snippet, set_query_snippet,
        validate_index_argument_snippet, MODEL_QUERY_EXPRESSION,
    },
    pipeline::{Resolver, ResolverKey, SlotName, SlotTemplate},
    sync::PRIMARY_KEY_SYNC_NAME,
};
use crate::{
    context::TransformerContext,
    datasource::DbType,
    error::{Error, KeyOperation, ProvisioningError, ResolverError},
    key_schema::{derive_attribute_definitions, derive_key_schema, AttributeType},
    name_mapping::ResolverReference,
    provisioning::{
        table_resource_id, GlobalSecondaryIndex, LocalSecondaryIndex, ProjectionType, TableKey, READ_IOPS_PARAMETER,
        SQL_LAMBDA_DATA_SOURCE, WRITE_IOPS_PARAMETER,
    },
    rules::{index_directive::IndexConfig, model_directive::ModelOperation, primary_key_directive::PrimaryKeyConfig},
    schema_types::QUERY_TYPE,
};

/// Applies every custom primary key, then every secondary index.
pub(crate) fn apply_keys_and_indexes(
    primary_keys: &[PrimaryKeyConfig],
    indexes: &[IndexConfig],
    ctx: &mut TransformerContext<'_>,
) -> Result<(), Error> {
    for config in primary_keys {
        if ctx.is_sql_model(&config.object) {
            update_sql_resolvers(config, ctx);
        } else {
            replace_ddb_primary_key(config, ctx)?;
            update_resolvers(config, ctx);
        }
    }

    for index in indexes {
        append_secondary_index(index, ctx)?;
        update_resolvers_for_index(index, ctx)?;
    }

    Ok(())
}

/// Swaps the `id` key of the model table for the configured one.
pub fn replace_ddb_primary_key(config: &PrimaryKeyConfig, ctx: &mut TransformerContext<'_>) -> Result<(), Error> {
    let key_schema = derive_key_schema(&config.key);
    let attribute_definitions = derive_attribute_definitions(&config.key, &ctx.types);

    tracing::debug!("replacing the primary key of {}", table_resource_id(&config.object));

    ctx.table_mut(&config.object)?
        .replace_key_schema(key_schema, attribute_definitions);

    Ok(())
}

/// Teaches the CRUD resolvers of a DynamoDB model its primary key.
pub fn update_resolvers(config: &PrimaryKeyConfig, ctx: &mut TransformerContext<'_>) {
    let key = &config.key;

    let get = vec![set_primary_key_snippet(key, false)];
    let list = vec![
        print(&set_query_snippet(key, &ctx.types, true)),
        format!("$util.qr($ctx.stash.put(\"{MODEL_QUERY_EXPRESSION}\", ${MODEL_QUERY_EXPRESSION}))"),
    ];
    let create_or_update = vec![
        merge_inputs_and_defaults_snippet(),
        set_primary_key_snippet(key, true),
        ensure_composite_key_snippet(key, false),
    ];
    let delete = vec![merge_inputs_and_defaults_snippet(), set_primary_key_snippet(key, true)];

    let slots = [
        (ModelOperation::Get, get),
        (ModelOperation::List, list),
        (ModelOperation::Create, create_or_update.clone()),
        (ModelOperation::Update, create_or_update),
        (ModelOperation::Delete, delete),
    ];

    for (operation, lines) in slots {
        add_to_model_resolver(ctx, &config.object, operation, &lines);
    }

    if ctx.is_project_using_datastore() {
        if let Some(sync) = ctx.resolver_key(&config.object, ModelOperation::Sync) {
            ctx.sync_queries.add(sync, PRIMARY_KEY_SYNC_NAME, key);
        }
    }
}

/// Relational models pass the names of their key columns on to the SQL Lambda.
pub fn update_sql_resolvers(config: &PrimaryKeyConfig, ctx: &mut TransformerContext<'_>) {
    let keys = config
        .key
        .key_names()
        .into_iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let lines = [format!("$util.qr($ctx.stash.put(\"keys\", [{keys}]))")];

    for operation in [
        ModelOperation::Get,
        ModelOperation::List,
        ModelOperation::Create,
        ModelOperation::Update,
        ModelOperation::Delete,
        ModelOperation::Sync,
    ] {
        add_to_model_resolver(ctx, &config.object, operation, &lines);
    }
}

/// Provisions the index on the model table: local when it shares the table partition key and local indexes are
/// allowed, global otherwise. Relational models have nothing to provision.
pub fn append_secondary_index(index: &IndexConfig, ctx: &mut TransformerContext<'_>) -> Result<(), Error> {
    if ctx.is_sql_model(&index.object) {
        return Ok(());
    }

    if index.name.is_empty() {
        return Err(ResolverError::MissingIndexName.into());
    }

    let primary_partition_key = index
        .primary_key_field
        .as_ref()
        .map_or("id", |field| field.name.as_str());

    let attribute_definitions = derive_attribute_definitions(&index.key, &ctx.types);
    let attribute_type = |name: &str| {
        attribute_definitions
            .iter()
            .find(|definition| definition.attribute_name == name)
            .map_or(AttributeType::S, |definition| definition.attribute_type)
    };

    let partition_key = TableKey {
        name: index.key.field.name.clone(),
        attribute_type: attribute_type(&index.key.field.name),
    };
    let sort_key = index.key.sort_key_name().map(|name| TableKey {
        attribute_type: attribute_type(&name),
        name,
    });

    let is_local = !ctx.config.parameters.secondary_key_as_gsi && primary_partition_key == partition_key.name;
    let table = ctx.table_mut(&index.object)?;

    if is_local {
        tracing::debug!("adding local secondary index {} to {}", index.name, table.resource_id());

        table.add_local_secondary_index(LocalSecondaryIndex {
            index_name: index.name.clone(),
            projection_type: ProjectionType::All,
            sort_key,
        });
    } else {
        tracing::debug!("adding global secondary index {} to {}", index.name, table.resource_id());

        table.add_global_secondary_index(GlobalSecondaryIndex {
            index_name: index.name.clone(),
            projection_type: ProjectionType::All,
            partition_key,
            sort_key,
            read_capacity: json!({ "Ref": READ_IOPS_PARAMETER }),
            write_capacity: json!({ "Ref": WRITE_IOPS_PARAMETER }),
        });
    }

    Ok(())
}

/// Guards the mutations of a model against partial composite sort keys of the index, and generates the index
/// query when one is requested.
pub fn update_resolvers_for_index(index: &IndexConfig, ctx: &mut TransformerContext<'_>) -> Result<(), Error> {
    if index.name.is_empty() {
        return Err(ResolverError::MissingIndexName.into());
    }

    let db_type = ctx.db_type(&index.object)?;

    if db_type == DbType::Dynamodb {
        for (operation, key_operation) in [
            (ModelOperation::Create, KeyOperation::Create),
            (ModelOperation::Update, KeyOperation::Update),
        ] {
            let checks = [
                validate_index_argument_snippet(index, key_operation),
                ensure_composite_key_snippet(&index.key, true),
            ];

            if checks.iter().any(|check| !check.is_empty()) {
                let lines: Vec<String> = std::iter::once(merge_inputs_and_defaults_snippet())
                    .chain(checks)
                    .collect();

                add_to_model_resolver(ctx, &index.object, operation, &lines);
            }
        }

        let delete = ensure_composite_key_snippet(&index.key, false);

        if !delete.is_empty() {
            add_to_model_resolver(
                ctx,
                &index.object,
                ModelOperation::Delete,
                &[merge_inputs_and_defaults_snippet(), delete],
            );
        }
    }

    if index.query_field.is_some() {
        make_query_resolver(index, ctx, db_type)?;
    }

    if db_type == DbType::Dynamodb && ctx.is_project_using_datastore() {
        if let Some(sync) = ctx.resolver_key(&index.object, ModelOperation::Sync) {
            ctx.sync_queries.add(sync, &index.name, &index.key);
        }
    }

    Ok(())
}

/// Registers `Query.<queryField>`, reading the model through the index.
pub fn make_query_resolver(index: &IndexConfig, ctx: &mut TransformerContext<'_>, db_type: DbType) -> Result<(), Error> {
    let query_field = match index.query_field.as_deref() {
        Some(query_field) if !index.name.is_empty() => query_field,
        _ => return Err(ResolverError::MissingQueryField.into()),
    };

    let model = index.object.as_str();

    let (data_source, stack_id) = if db_type.is_sql() {
        (SQL_LAMBDA_DATA_SOURCE.to_string(), model.to_string())
    } else {
        (table_resource_id(model), ctx.table(model)?.stack_id().to_string())
    };

    if ctx.provisioning.data_source(&data_source).is_none() {
        return Err(ProvisioningError::DataSourceNotFound { name: data_source }.into());
    }

    let request = select_generator(Some(db_type.as_ref()))?.generate_index_query_request_template(
        index,
        ctx,
        model,
        query_field,
    );

    let response = print(&compound([
        iff(
            reference("ctx.error"),
            raw("$util.error($ctx.error.message, $ctx.error.type)"),
        ),
        raw("$util.toJson($ctx.result)"),
    ]));

    let mut resolver = Resolver::new(
        ResolverKey::new(QUERY_TYPE, query_field),
        Some(data_source),
        request,
        response,
        stack_id,
    );

    resolver.add_to_slot(
        SlotName::PostAuth,
        SlotTemplate::request(generate_auth_expression_for_sandbox_mode(
            ctx.config.parameters.sandbox_mode_enabled,
        )),
    );

    tracing::debug!("registering index query {} on {}", resolver.key(), index.name);
    ctx.resolvers.add(resolver)?;

    if db_type.is_sql() {
        ctx.resource_helper.add_resolver_reference(
            model,
            ResolverReference {
                type_name: QUERY_TYPE.to_string(),
                field_name: query_field.to_string(),
                is_list: false,
            },
        );
    }

    Ok(())
}

/// Appends one pre-auth template holding `lines`. Templates outside of sync queries end with an empty payload.
pub fn add_index_to_resolver_slot(resolver: &mut Resolver, lines: &[String], is_sync: bool) {
    let payload = if is_sync { "" } else { "{}" };
    let template = format!("{}\n{payload}", lines.join("\n"));

    resolver.add_to_slot(SlotName::PreAuth, SlotTemplate::request(template));
}

fn add_to_model_resolver(ctx: &mut TransformerContext<'_>, model: &str, operation: ModelOperation, lines: &[String]) {
    let Some(key) = ctx.resolver_key(model, operation) else {
        return;
    };

    match ctx.resolvers.get_mut(&key) {
        Some(resolver) => add_index_to_resolver_slot(resolver, lines, false),
        None => tracing::debug!("no resolver {key} to add key handling to"),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::TransformConfig,
        context::with_context,
        datasource::DynamoDbProvisionStrategy,
        provisioning::{ProvisioningContext, Table},
    };

    const SCHEMA: &str = indoc! {r#"
        type Post @model {
          id: ID! @primaryKey(sortKeyFields: ["title"])
          title: String! @index(name: "byTitle", queryField: "postsByTitle")
        }
    "#};

    #[test]
    fn slot_templates_end_with_an_empty_payload() {
        let mut resolver = Resolver::new(ResolverKey::new("Query", "getPost"), None, "{}", "{}", "Post");

        add_index_to_resolver_slot(&mut resolver, &["#set( $a = 1 )".to_string(), "#set( $b = 2 )".to_string()], false);
        add_index_to_resolver_slot(&mut resolver, &["#set( $c = 3 )".to_string()], true);

        let requests: Vec<_> = resolver
            .slot(SlotName::PreAuth)
            .iter()
            .map(|template| template.request.as_deref())
            .collect();

        assert_eq!(
            requests,
            vec![
                Some("#set( $a = 1 )\n#set( $b = 2 )\n{}"),
                Some("#set( $c = 3 )\n")
            ]
        );
    }

    #[test]
    fn primary_key_of_an_unprovisioned_table() {
        with_context(SCHEMA, &TransformConfig::default(), |ctx, primary_keys, _| {
            let error = replace_ddb_primary_key(&primary_keys[0], ctx).unwrap_err();

            assert_eq!(error.to_string(), "Table not found in stack with table name PostTable");
        });
    }

    #[test]
    fn index_query_without_a_data_source() {
        with_context(SCHEMA, &TransformConfig::default(), |ctx, _, indexes| {
            ctx.provisioning
                .add_table(Table::new("Post", "Post", DynamoDbProvisionStrategy::Default));

            let error = make_query_resolver(&indexes[0], ctx, DbType::Dynamodb).unwrap_err();

            assert_eq!(error.to_string(), "Could not find datasource with name PostTable in context.");
            assert!(ctx.resolvers.is_empty());
        });
    }

    #[test]
    fn unnamed_index() {
        with_context(SCHEMA, &TransformConfig::default(), |ctx, _, indexes| {
            let index = IndexConfig {
                name: String::new(),
                ..indexes[0].clone()
            };

            assert_eq!(
                update_resolvers_for_index(&index, ctx).unwrap_err().to_string(),
                "Expected name while updating index resolvers."
            );
            assert_eq!(
                append_secondary_index(&index, ctx).unwrap_err().to_string(),
                "Expected name while updating index resolvers."
            );
        });
    }
}
