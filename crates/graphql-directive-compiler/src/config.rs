use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    datasource::{CustomSqlDataSourceStrategy, DataSourceMap, ModelDataSourceStrategy},
    error::ConfigError,
};

/// Everything a compilation needs besides the schema itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformConfig {
    pub parameters: TransformParameters,
    /// Enables DataStore conflict detection and the sync queries.
    pub sync: Option<SyncConfig>,
    /// Strategies for specific models.
    pub data_sources: DataSourceMap,
    /// The strategy of every model absent from `data_sources`. DynamoDB when unset.
    pub default_data_source: Option<ModelDataSourceStrategy>,
    pub custom_sql_data_sources: Vec<CustomSqlDataSourceStrategy>,
    /// Named SQL statements `@sql(reference: ...)` can point at.
    pub sql_statements: IndexMap<String, String>,
}

impl TransformConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn is_project_using_datastore(&self) -> bool {
        self.sync.is_some()
    }

    /// The strategy of every model, falling back to the default strategy.
    pub fn resolve_data_sources<'a>(&self, models: impl IntoIterator<Item = &'a str>) -> DataSourceMap {
        let fallback = self.default_data_source.clone().unwrap_or_default();

        models
            .into_iter()
            .map(|model| {
                let strategy = self.data_sources.get(model).cloned().unwrap_or_else(|| fallback.clone());
                (model, strategy)
            })
            .collect()
    }

    /// Looks up a named SQL statement, including the ones declared by SQL strategies.
    pub fn sql_statement(&self, reference: &str) -> Option<&str> {
        self.sql_statements
            .get(reference)
            .or_else(|| {
                self.data_sources
                    .iter()
                    .chain(self.default_data_source.iter().map(|strategy| ("", strategy)))
                    .filter_map(|(_, strategy)| strategy.sql())
                    .chain(self.custom_sql_data_sources.iter().filter_map(|custom| custom.strategy.sql()))
                    .find_map(|strategy| strategy.custom_sql_statements.get(reference))
            })
            .map(String::as_str)
    }

    pub fn custom_sql_data_source(&self, type_name: &str, field_name: &str) -> Option<&CustomSqlDataSourceStrategy> {
        self.custom_sql_data_sources
            .iter()
            .find(|custom| custom.type_name.as_ref() == type_name && custom.field_name == field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformParameters {
    /// Lets API key requests through resolvers that have no authorization rules.
    pub sandbox_mode_enabled: bool,
    /// Always create global secondary indexes, even when a local one would do.
    #[serde(rename = "secondaryKeyAsGSI")]
    pub secondary_key_as_gsi: bool,
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self {
            sandbox_mode_enabled: false,
            secondary_key_as_gsi: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub conflict_handler: ConflictHandler,
    /// How long, in minutes, the delta table keeps its records.
    pub delta_sync_table_ttl: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_handler: ConflictHandler::default(),
            delta_sync_table_ttl: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictHandler {
    #[default]
    Automerge,
    OptimisticConcurrency,
    Lambda,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datasource::{DbType, DynamoDbProvisionStrategy};

    #[test]
    fn loads_toml_configuration() {
        let config = TransformConfig::from_toml_str(indoc! {r#"
            [parameters]
            sandboxModeEnabled = true
            secondaryKeyAsGSI = false

            [sync]
            deltaSyncTableTtl = 15

            [dataSources.Post]
            dbType = "DYNAMODB"
            provisionStrategy = "AMPLIFY_TABLE"

            [dataSources.Tag]
            dbType = "MYSQL"
            name = "blog"
            customSqlStatements = { "top-tags" = "SELECT * FROM tags LIMIT 10" }

            [dataSources.Tag.dbConnectionConfig]
            hostnameSsmPath = "/blog/host"
            portSsmPath = "/blog/port"
            usernameSsmPath = "/blog/user"
            passwordSsmPath = "/blog/password"
            databaseNameSsmPath = "/blog/database"

            [sqlStatements]
            calculate-tax = "SELECT * FROM TAXRATE WHERE ZIP = :zip"
        "#})
        .unwrap();

        assert!(config.parameters.sandbox_mode_enabled);
        assert!(!config.parameters.secondary_key_as_gsi);
        assert!(config.is_project_using_datastore());
        assert_eq!(config.sync.as_ref().map(|sync| sync.delta_sync_table_ttl), Some(15));
        assert_eq!(
            config.data_sources.get("Post").and_then(|strategy| strategy.provision_strategy()),
            Some(DynamoDbProvisionStrategy::AmplifyTable)
        );
        assert_eq!(config.data_sources.get("Tag").map(|strategy| strategy.db_type()), Some(DbType::Mysql));
        assert_eq!(
            config.sql_statement("calculate-tax"),
            Some("SELECT * FROM TAXRATE WHERE ZIP = :zip")
        );
        assert_eq!(config.sql_statement("top-tags"), Some("SELECT * FROM tags LIMIT 10"));
        assert_eq!(config.sql_statement("missing"), None);
    }

    #[test]
    fn unknown_db_type_is_rejected() {
        let error = TransformConfig::from_json_str(r#"{ "dataSources": { "Post": { "dbType": "ORACLE" } } }"#).unwrap_err();

        assert!(matches!(error, ConfigError::Json(_)));
    }

    #[test]
    fn models_fall_back_to_the_default_strategy() {
        let config = TransformConfig::default();
        let resolved = config.resolve_data_sources(["Post", "Comment"]);

        assert_eq!(resolved.get("Comment").map(|strategy| strategy.db_type()), Some(DbType::Dynamodb));
        assert!(resolved.sql_models().next().is_none());
    }
}
