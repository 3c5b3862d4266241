use indexmap::IndexMap;

use crate::{
    config::TransformConfig,
    datasource::{DataSourceMap, DbType},
    error::{ProvisioningError, ResolverError},
    name_mapping::ResourceHelper,
    provisioning::{table_resource_id, ProvisioningContext, Table},
    resolvers::{ResolverKey, ResolverRegistry, SyncQueryAccumulator},
    rules::model_directive::{ModelConfig, ModelOperation},
    schema_types::{SchemaTypes, MUTATION_TYPE, QUERY_TYPE},
};

/// State shared by every stage generating resources and resolvers.
pub struct TransformerContext<'a> {
    pub config: &'a TransformConfig,
    pub types: SchemaTypes<'a>,
    pub data_sources: DataSourceMap,
    pub models: IndexMap<String, ModelConfig>,
    pub provisioning: &'a mut dyn ProvisioningContext,
    pub resolvers: ResolverRegistry,
    pub resource_helper: ResourceHelper,
    pub sync_queries: SyncQueryAccumulator,
}

impl<'a> TransformerContext<'a> {
    pub fn new(
        config: &'a TransformConfig,
        types: SchemaTypes<'a>,
        data_sources: DataSourceMap,
        models: IndexMap<String, ModelConfig>,
        resource_helper: ResourceHelper,
        provisioning: &'a mut dyn ProvisioningContext,
    ) -> Self {
        Self {
            config,
            types,
            data_sources,
            models,
            provisioning,
            resolvers: ResolverRegistry::new(),
            resource_helper,
            sync_queries: SyncQueryAccumulator::default(),
        }
    }

    pub fn is_project_using_datastore(&self) -> bool {
        self.config.is_project_using_datastore()
    }

    pub fn db_type(&self, model: &str) -> Result<DbType, ResolverError> {
        self.data_sources
            .get(model)
            .map(|strategy| strategy.db_type())
            .ok_or_else(|| ResolverError::NoDatasourceForModel(model.to_string()))
    }

    pub fn is_sql_model(&self, model: &str) -> bool {
        self.data_sources.is_sql_model(model)
    }

    pub fn table(&self, model: &str) -> Result<&Table, ProvisioningError> {
        let resource_id = table_resource_id(model);

        self.provisioning
            .table(&resource_id)
            .ok_or(ProvisioningError::TableNotFound { table: resource_id })
    }

    pub fn table_mut(&mut self, model: &str) -> Result<&mut Table, ProvisioningError> {
        let resource_id = table_resource_id(model);

        self.provisioning
            .table_mut(&resource_id)
            .ok_or(ProvisioningError::TableNotFound { table: resource_id })
    }

    /// The root field a model generated for an operation, if it did.
    pub fn resolver_key(&self, model: &str, operation: ModelOperation) -> Option<ResolverKey> {
        let field = self.models.get(model)?.resolver_field(operation)?;
        let type_name = if operation.is_query() { QUERY_TYPE } else { MUTATION_TYPE };

        Some(ResolverKey::new(type_name, field))
    }
}

/// Runs `test` against a context holding the models of `schema` and nothing provisioned yet.
#[cfg(test)]
pub(crate) fn with_context<R>(
    schema: &str,
    config: &TransformConfig,
    test: impl FnOnce(
        &mut TransformerContext<'_>,
        &[crate::rules::primary_key_directive::PrimaryKeyConfig],
        &[crate::rules::index_directive::IndexConfig],
    ) -> R,
) -> R {
    let document = async_graphql_parser::parse_schema(schema).unwrap();
    let data_sources = config.resolve_data_sources(SchemaTypes::new(&document).model_names());
    let parsed = crate::rules::parse_directives(&document, config, &data_sources).unwrap();
    let mut stack = crate::provisioning::Stack::new();

    let mut ctx = TransformerContext::new(
        config,
        SchemaTypes::new(&document),
        data_sources,
        parsed.models,
        parsed.resource_helper,
        &mut stack,
    );

    test(&mut ctx, &parsed.primary_keys, &parsed.indexes)
}
