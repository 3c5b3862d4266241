//! Compiles a GraphQL schema annotated with `@model`, `@primaryKey`, `@index`, `@sql` and name mapping
//! directives into AppSync resolver pipelines and the DynamoDB or SQL Lambda resources behind them.
//!
//! ```
//! use graphql_directive_compiler::{compile, TransformConfig};
//!
//! let api = compile("type Post @model { id: ID! title: String }", &TransformConfig::default()).unwrap();
//! assert!(api.resolver_templates().contains_key("Query.getPost.req.vtl"));
//! ```

#![deny(unsafe_code, rust_2018_idioms)]

mod context;
mod directive_de;

pub mod config;
pub mod datasource;
pub mod error;
pub mod key_schema;
pub mod name_mapping;
pub mod provisioning;
pub mod resolvers;
pub mod rules;
pub mod schema_types;

use std::collections::BTreeMap;

use async_graphql_parser::parse_schema;
use serde::Serialize;

pub use self::{
    config::TransformConfig,
    context::TransformerContext,
    error::{Error, ProvisioningError, ResolverError},
    name_mapping::ResourceHelper,
    provisioning::Stack,
    resolvers::{Resolver, ResolverKey, ResolverRegistry},
    rules::unsupported_directives::check_for_unsupported_directives,
};
use self::{
    resolvers::{custom_sql::generate_custom_sql_resolvers, index::apply_keys_and_indexes, model::generate_model_resources},
    rules::{parse_directives, unsupported_directives::validate_document},
    schema_types::SchemaTypes,
};

/// The outcome of a compilation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledApi {
    pub resolvers: ResolverRegistry,
    pub stack: Stack,
    #[serde(skip)]
    pub resource_helper: ResourceHelper,
}

impl CompiledApi {
    /// Every template of every resolver, keyed by file name.
    pub fn resolver_templates(&self) -> BTreeMap<String, String> {
        self.resolvers.iter().flat_map(Resolver::templates).collect()
    }
}

/// Compiles `schema` with the given configuration.
#[tracing::instrument(skip_all)]
pub fn compile(schema: &str, config: &TransformConfig) -> Result<CompiledApi, Error> {
    let document = parse_schema(schema)?;

    let data_sources = {
        let types = SchemaTypes::new(&document);
        config.resolve_data_sources(types.model_names())
    };

    validate_document(&document, &data_sources)?;

    let parsed = parse_directives(&document, config, &data_sources)?;
    tracing::debug!("compiling {} models", parsed.models.len());

    let mut stack = Stack::new();

    let (mut resolvers, resource_helper, sync_queries) = {
        let mut ctx = TransformerContext::new(
            config,
            SchemaTypes::new(&document),
            data_sources,
            parsed.models,
            parsed.resource_helper,
            &mut stack,
        );

        generate_model_resources(&mut ctx)?;
        apply_keys_and_indexes(&parsed.primary_keys, &parsed.indexes, &mut ctx)?;
        generate_custom_sql_resolvers(&parsed.sql_fields, &mut ctx)?;

        (ctx.resolvers, ctx.resource_helper, ctx.sync_queries)
    };

    sync_queries.apply(&mut resolvers);
    name_mapping::attach_field_mapping_slots(&resource_helper, &mut resolvers);

    tracing::debug!("generated {} resolvers", resolvers.len());

    Ok(CompiledApi {
        resolvers,
        stack,
        resource_helper,
    })
}
