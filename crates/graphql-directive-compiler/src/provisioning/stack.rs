use indexmap::IndexMap;
use serde::Serialize;

use super::{ProvisioningContext, Table};
use crate::datasource::DbType;

/// The data source every SQL backed resolver invokes.
pub const SQL_LAMBDA_DATA_SOURCE: &str = "SQLLambdaDataSource";
pub const SQL_LAMBDA_FUNCTION: &str = "SQLFunction";
/// The stack holding the SQL Lambda and its data source.
pub const SQL_STACK_NAME: &str = "SqlApiStack";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub name: String,
    pub stack_id: String,
    pub kind: DataSourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceKind {
    #[serde(rename = "AMAZON_DYNAMODB")]
    DynamoDb { table: String },
    #[serde(rename = "AWS_LAMBDA", rename_all = "camelCase")]
    Lambda { function_name: String, db_type: DbType },
}

/// An in-memory stack of tables and data sources, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    tables: IndexMap<String, Table>,
    data_sources: IndexMap<String, DataSource>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.tables.values()
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &DataSource> + '_ {
        self.data_sources.values()
    }
}

impl ProvisioningContext for Stack {
    fn add_table(&mut self, table: Table) {
        tracing::trace!("provisioning table {}", table.resource_id());
        self.tables.insert(table.resource_id().to_string(), table);
    }

    fn table(&self, resource_id: &str) -> Option<&Table> {
        self.tables.get(resource_id)
    }

    fn table_mut(&mut self, resource_id: &str) -> Option<&mut Table> {
        self.tables.get_mut(resource_id)
    }

    fn add_data_source(&mut self, data_source: DataSource) {
        tracing::trace!("provisioning data source {}", data_source.name);
        self.data_sources.insert(data_source.name.clone(), data_source);
    }

    fn data_source(&self, name: &str) -> Option<&DataSource> {
        self.data_sources.get(name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::datasource::DynamoDbProvisionStrategy;

    #[test]
    fn data_sources_serialize_with_their_type() {
        let mut stack = Stack::new();
        stack.add_table(Table::new("Post", "Post", DynamoDbProvisionStrategy::Default));
        stack.add_data_source(DataSource {
            name: SQL_LAMBDA_DATA_SOURCE.to_string(),
            stack_id: "Tag".to_string(),
            kind: DataSourceKind::Lambda {
                function_name: SQL_LAMBDA_FUNCTION.to_string(),
                db_type: DbType::Mysql,
            },
        });

        assert!(stack.table("PostTable").is_some());
        assert!(stack.table("Post").is_none());
        assert_eq!(
            serde_json::to_value(stack.data_source(SQL_LAMBDA_DATA_SOURCE).unwrap()).unwrap(),
            json!({
                "name": "SQLLambdaDataSource",
                "stackId": "Tag",
                "kind": { "type": "AWS_LAMBDA", "functionName": "SQLFunction", "dbType": "MYSQL" },
            })
        );
    }
}
