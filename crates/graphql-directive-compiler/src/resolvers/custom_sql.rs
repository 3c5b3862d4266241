//! Resolvers of `Query` and `Mutation` fields backed by a custom `@sql` statement.

use super::{
    auth::generate_auth_expression_for_sandbox_mode,
    model::ensure_sql_data_source,
    pipeline::{Resolver, ResolverKey, SlotName, SlotTemplate},
    sql::{generate_default_lambda_response_mapping_template, generate_sql_lambda_request_template},
};
use crate::{
    context::TransformerContext,
    datasource::DbType,
    error::{Error, ResolverError},
    provisioning::{SQL_LAMBDA_DATA_SOURCE, SQL_STACK_NAME},
    rules::sql_directive::SqlDirectiveConfig,
    schema_types::MUTATION_TYPE,
};

pub(crate) fn generate_custom_sql_resolvers(
    sql_fields: &[SqlDirectiveConfig],
    ctx: &mut TransformerContext<'_>,
) -> Result<(), Error> {
    for field in sql_fields {
        let db_type = custom_sql_db_type(field, ctx)?;
        ensure_sql_data_source(ctx, db_type);

        let request = generate_sql_lambda_request_template(&field.statement, &field.field_name);
        let response = generate_default_lambda_response_mapping_template(
            ctx.is_project_using_datastore(),
            field.type_name == MUTATION_TYPE,
        );

        let mut resolver = Resolver::new(
            ResolverKey::new(&field.type_name, &field.field_name),
            Some(SQL_LAMBDA_DATA_SOURCE.to_string()),
            request,
            response,
            SQL_STACK_NAME,
        );

        resolver.add_to_slot(
            SlotName::PostAuth,
            SlotTemplate::request(generate_auth_expression_for_sandbox_mode(
                ctx.config.parameters.sandbox_mode_enabled,
            )),
        );

        tracing::debug!("registering custom SQL resolver {}", resolver.key());
        ctx.resolvers.add(resolver)?;
    }

    Ok(())
}

/// The strategy configured for the field, else the default strategy, else the one of any relational model.
fn custom_sql_db_type(field: &SqlDirectiveConfig, ctx: &TransformerContext<'_>) -> Result<DbType, ResolverError> {
    let config = ctx.config;

    config
        .custom_sql_data_source(&field.type_name, &field.field_name)
        .map(|custom| custom.strategy.db_type())
        .or_else(|| {
            config
                .default_data_source
                .as_ref()
                .map(|strategy| strategy.db_type())
                .filter(|db_type| db_type.is_sql())
        })
        .or_else(|| {
            ctx.data_sources
                .iter()
                .map(|(_, strategy)| strategy.db_type())
                .find(|db_type| db_type.is_sql())
        })
        .filter(|db_type| db_type.is_sql())
        .ok_or_else(|| ResolverError::NoDatasourceForCustomSql {
            type_name: field.type_name.clone(),
            field_name: field.field_name.clone(),
        })
}
