use async_graphql_parser::types::ServiceDocument;

use self::{
    index_directive::IndexDirective,
    model_directive::ModelDirective,
    name_mapping_directives::NameMappingDirectives,
    primary_key_directive::PrimaryKeyDirective,
    sql_directive::SqlDirective,
    visitor::{visit, ParsedDirectives, VisitorContext, VisitorNil},
};
use crate::{config::TransformConfig, datasource::DataSourceMap, Error};

pub mod index_directive;
pub mod model_directive;
pub mod name_mapping_directives;
pub mod primary_key_directive;
pub mod sql_directive;
pub mod unsupported_directives;
pub mod visitor;

/// Runs every directive rule over the document. All rule errors are reported together.
pub(crate) fn parse_directives(
    document: &ServiceDocument,
    config: &TransformConfig,
    data_sources: &DataSourceMap,
) -> Result<ParsedDirectives, Error> {
    let mut rules = VisitorNil
        .with(ModelDirective)
        .with(PrimaryKeyDirective)
        .with(IndexDirective)
        .with(SqlDirective::new(config))
        .with(NameMappingDirectives::new(data_sources));

    let mut ctx = VisitorContext::new(document);
    visit(&mut rules, &mut ctx, document);

    if !ctx.errors.is_empty() {
        return Err(Error::Validation(ctx.errors));
    }

    let parsed = ctx.finish();
    tracing::debug!(
        models = parsed.models.len(),
        primary_keys = parsed.primary_keys.len(),
        indexes = parsed.indexes.len(),
        sql_fields = parsed.sql_fields.len(),
        "parsed directives"
    );

    Ok(parsed)
}
