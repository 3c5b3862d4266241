//! Where the data of each model lives.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The database type tag of a data source strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DbType {
    Dynamodb,
    Mysql,
    Postgres,
}

impl DbType {
    pub fn is_sql(self) -> bool {
        matches!(self, DbType::Mysql | DbType::Postgres)
    }
}

/// How a DynamoDB table backing a model is provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DynamoDbProvisionStrategy {
    /// A regular `AWS::DynamoDB::Table`.
    #[default]
    Default,
    /// A table managed by a custom resource, configured through property overrides.
    AmplifyTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dbType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelDataSourceStrategy {
    Dynamodb {
        #[serde(default, rename = "provisionStrategy")]
        provision_strategy: DynamoDbProvisionStrategy,
    },
    Mysql(SqlModelDataSourceStrategy),
    Postgres(SqlModelDataSourceStrategy),
}

impl Default for ModelDataSourceStrategy {
    fn default() -> Self {
        ModelDataSourceStrategy::Dynamodb {
            provision_strategy: DynamoDbProvisionStrategy::Default,
        }
    }
}

impl ModelDataSourceStrategy {
    pub fn db_type(&self) -> DbType {
        match self {
            ModelDataSourceStrategy::Dynamodb { .. } => DbType::Dynamodb,
            ModelDataSourceStrategy::Mysql(_) => DbType::Mysql,
            ModelDataSourceStrategy::Postgres(_) => DbType::Postgres,
        }
    }

    pub fn is_sql(&self) -> bool {
        self.db_type().is_sql()
    }

    pub fn provision_strategy(&self) -> Option<DynamoDbProvisionStrategy> {
        match self {
            ModelDataSourceStrategy::Dynamodb { provision_strategy } => Some(*provision_strategy),
            _ => None,
        }
    }

    pub fn sql(&self) -> Option<&SqlModelDataSourceStrategy> {
        match self {
            ModelDataSourceStrategy::Mysql(strategy) | ModelDataSourceStrategy::Postgres(strategy) => Some(strategy),
            ModelDataSourceStrategy::Dynamodb { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlModelDataSourceStrategy {
    pub name: String,
    pub db_connection_config: SqlModelDataSourceDbConnectionConfig,
    #[serde(default)]
    pub vpc_configuration: Option<VpcConfig>,
    #[serde(default)]
    pub custom_sql_statements: IndexMap<String, String>,
    #[serde(default)]
    pub sql_lambda_provisioned_concurrency_config: Option<ProvisionedConcurrencyConfig>,
}

/// SSM parameter paths holding the database connection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlModelDataSourceDbConnectionConfig {
    pub hostname_ssm_path: String,
    pub port_ssm_path: String,
    pub username_ssm_path: String,
    pub password_ssm_path: String,
    pub database_name_ssm_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    pub vpc_id: String,
    pub security_group_ids: Vec<String>,
    pub subnet_availability_zone_config: Vec<SubnetAvailabilityZone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetAvailabilityZone {
    pub subnet_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedConcurrencyConfig {
    pub provisioned_concurrent_executions: u32,
}

/// Which type can host a custom SQL field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr)]
pub enum CustomSqlTypeName {
    Query,
    Mutation,
}

/// The data source serving a custom `@sql` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSqlDataSourceStrategy {
    pub type_name: CustomSqlTypeName,
    pub field_name: String,
    pub strategy: ModelDataSourceStrategy,
}

/// Model name to data source strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSourceMap(IndexMap<String, ModelDataSourceStrategy>);

impl DataSourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, strategy: ModelDataSourceStrategy) {
        self.0.insert(model.into(), strategy);
    }

    pub fn get(&self, model: &str) -> Option<&ModelDataSourceStrategy> {
        self.0.get(model)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_sql_model(&self, model: &str) -> bool {
        self.get(model).is_some_and(ModelDataSourceStrategy::is_sql)
    }

    pub fn sql_models(&self) -> impl Iterator<Item = &str> + '_ {
        self.0
            .iter()
            .filter(|(_, strategy)| strategy.is_sql())
            .map(|(model, _)| model.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelDataSourceStrategy)> + '_ {
        self.0.iter().map(|(model, strategy)| (model.as_str(), strategy))
    }
}

impl<K: Into<String>> FromIterator<(K, ModelDataSourceStrategy)> for DataSourceMap {
    fn from_iter<T: IntoIterator<Item = (K, ModelDataSourceStrategy)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(model, strategy)| (model.into(), strategy)).collect())
    }
}
