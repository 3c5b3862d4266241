use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{PAY_PER_REQUEST_CONDITION, READ_IOPS_PARAMETER, WRITE_IOPS_PARAMETER};
use crate::{
    datasource::DynamoDbProvisionStrategy,
    key_schema::{AttributeDefinition, AttributeType, KeySchemaEntry, KeyType},
};

const DYNAMODB_TABLE_RESOURCE: &str = "AWS::DynamoDB::Table";
const AMPLIFY_TABLE_RESOURCE: &str = "Custom::AmplifyDynamoDBTable";

/// `PostTable`
pub fn table_resource_id(model: &str) -> String {
    format!("{model}Table")
}

/// A named key attribute and its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableKey {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionType {
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub projection_type: ProjectionType,
    pub partition_key: TableKey,
    pub sort_key: Option<TableKey>,
    pub read_capacity: Value,
    pub write_capacity: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecondaryIndex {
    pub index_name: String,
    pub projection_type: ProjectionType,
    pub sort_key: Option<TableKey>,
}

/// The resource as it will be synthesized. Managed changes the resource cannot express go to `overrides`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTableResource {
    pub resource_type: &'static str,
    pub properties: Map<String, Value>,
    /// Dotted paths, such as `Properties.globalSecondaryIndexes.0`, applied over `properties`.
    pub overrides: IndexMap<String, Value>,
}

impl RawTableResource {
    fn add_override(&mut self, path: impl Into<String>, value: Value) {
        self.overrides.insert(path.into(), value);
    }

    /// The properties once every override is applied.
    pub fn effective_properties(&self) -> Map<String, Value> {
        let mut root = Value::Object(Map::new());
        root["Properties"] = Value::Object(self.properties.clone());

        for (path, value) in &self.overrides {
            apply_override(&mut root, path, value.clone());
        }

        match root["Properties"].take() {
            Value::Object(properties) => properties,
            _ => Map::new(),
        }
    }
}

fn apply_override(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        let next_is_index = segments.peek().is_some_and(|next| next.parse::<usize>().is_ok());

        current = match (current, segment.parse::<usize>()) {
            (Value::Array(items), Ok(index)) => {
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            (node, _) => {
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }

                match node {
                    Value::Object(map) => map.entry(segment.to_string()).or_insert_with(|| {
                        if next_is_index {
                            Value::Array(Vec::new())
                        } else {
                            Value::Null
                        }
                    }),
                    _ => return,
                }
            }
        };

        if last {
            *current = value;
            return;
        }
    }
}

/// A model table: the managed view the transform works with, and its raw resource.
///
/// Every method mutating the managed view mirrors the change to the raw resource before returning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    resource_id: String,
    table_name: String,
    stack_id: String,
    provision_strategy: DynamoDbProvisionStrategy,
    key_schema: Vec<KeySchemaEntry>,
    attribute_definitions: Vec<AttributeDefinition>,
    partition_key: TableKey,
    global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    local_secondary_indexes: Vec<LocalSecondaryIndex>,
    raw: RawTableResource,
}

impl Table {
    /// A table keyed by a string `id`, as every model starts out.
    pub fn new(model: &str, table_name: &str, provision_strategy: DynamoDbProvisionStrategy) -> Self {
        let key_schema = vec![KeySchemaEntry {
            attribute_name: "id".to_string(),
            key_type: KeyType::Hash,
        }];

        let attribute_definitions = vec![AttributeDefinition {
            attribute_name: "id".to_string(),
            attribute_type: AttributeType::S,
        }];

        let resource_type = match provision_strategy {
            DynamoDbProvisionStrategy::Default => DYNAMODB_TABLE_RESOURCE,
            DynamoDbProvisionStrategy::AmplifyTable => AMPLIFY_TABLE_RESOURCE,
        };

        let mut properties = Map::new();
        properties.insert("tableName".to_string(), Value::String(table_name.to_string()));
        properties.insert("keySchema".to_string(), key_schema_value(&key_schema));
        properties.insert(
            "attributeDefinitions".to_string(),
            attribute_definitions_value(&attribute_definitions),
        );

        Self {
            resource_id: table_resource_id(model),
            table_name: table_name.to_string(),
            stack_id: model.to_string(),
            provision_strategy,
            key_schema,
            attribute_definitions,
            partition_key: TableKey {
                name: "id".to_string(),
                attribute_type: AttributeType::S,
            },
            global_secondary_indexes: Vec::new(),
            local_secondary_indexes: Vec::new(),
            raw: RawTableResource {
                resource_type,
                properties,
                overrides: IndexMap::new(),
            },
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn provision_strategy(&self) -> DynamoDbProvisionStrategy {
        self.provision_strategy
    }

    pub fn key_schema(&self) -> &[KeySchemaEntry] {
        &self.key_schema
    }

    pub fn attribute_definitions(&self) -> &[AttributeDefinition] {
        &self.attribute_definitions
    }

    pub fn partition_key(&self) -> &TableKey {
        &self.partition_key
    }

    pub fn global_secondary_indexes(&self) -> &[GlobalSecondaryIndex] {
        &self.global_secondary_indexes
    }

    pub fn local_secondary_indexes(&self) -> &[LocalSecondaryIndex] {
        &self.local_secondary_indexes
    }

    pub fn raw(&self) -> &RawTableResource {
        &self.raw
    }

    /// Swaps the primary key. Attribute definitions of the old key go away unless the new key reuses them.
    pub fn replace_key_schema(&mut self, key_schema: Vec<KeySchemaEntry>, attribute_definitions: Vec<AttributeDefinition>) {
        let old_key_attributes: Vec<String> = self
            .key_schema
            .iter()
            .map(|entry| entry.attribute_name.clone())
            .collect();

        self.attribute_definitions
            .retain(|definition| !old_key_attributes.contains(&definition.attribute_name));

        let partition_key_name = key_schema
            .iter()
            .find(|entry| entry.key_type == KeyType::Hash)
            .map(|entry| entry.attribute_name.clone())
            .unwrap_or_else(|| "id".to_string());

        let partition_key_type = attribute_definitions
            .iter()
            .find(|definition| definition.attribute_name == partition_key_name)
            .map(|definition| definition.attribute_type)
            .unwrap_or(AttributeType::S);

        self.key_schema = key_schema;
        self.partition_key = TableKey {
            name: partition_key_name,
            attribute_type: partition_key_type,
        };

        for definition in attribute_definitions {
            self.register_attribute(definition);
        }

        self.sync_key_schema_to_raw();
    }

    pub fn add_global_secondary_index(&mut self, index: GlobalSecondaryIndex) {
        self.register_key_attributes(&index.partition_key, index.sort_key.as_ref());
        self.global_secondary_indexes.push(index);

        self.sync_attribute_definitions_to_raw();
        self.sync_global_secondary_index_to_raw();
    }

    pub fn add_local_secondary_index(&mut self, index: LocalSecondaryIndex) {
        if let Some(sort_key) = &index.sort_key {
            self.register_attribute(AttributeDefinition {
                attribute_name: sort_key.name.clone(),
                attribute_type: sort_key.attribute_type,
            });
        }

        self.local_secondary_indexes.push(index);

        self.sync_attribute_definitions_to_raw();
        self.sync_local_secondary_indexes_to_raw();
    }

    fn register_key_attributes(&mut self, partition_key: &TableKey, sort_key: Option<&TableKey>) {
        for key in std::iter::once(partition_key).chain(sort_key) {
            self.register_attribute(AttributeDefinition {
                attribute_name: key.name.clone(),
                attribute_type: key.attribute_type,
            });
        }
    }

    fn register_attribute(&mut self, definition: AttributeDefinition) {
        if !self
            .attribute_definitions
            .iter()
            .any(|existing| existing.attribute_name == definition.attribute_name)
        {
            self.attribute_definitions.push(definition);
        }
    }

    fn uses_overrides(&self) -> bool {
        self.provision_strategy == DynamoDbProvisionStrategy::AmplifyTable
    }

    fn sync_key_schema_to_raw(&mut self) {
        let key_schema = key_schema_value(&self.key_schema);

        if self.uses_overrides() {
            self.raw.add_override("Properties.keySchema", key_schema);
        } else {
            self.raw.properties.insert("keySchema".to_string(), key_schema);
        }

        self.sync_attribute_definitions_to_raw();
    }

    fn sync_attribute_definitions_to_raw(&mut self) {
        let definitions = attribute_definitions_value(&self.attribute_definitions);

        if self.uses_overrides() {
            self.raw.add_override("Properties.attributeDefinitions", definitions);
        } else {
            self.raw.properties.insert("attributeDefinitions".to_string(), definitions);
        }
    }

    /// Mirrors the last global index, with its throughput gated on the billing mode.
    fn sync_global_secondary_index_to_raw(&mut self) {
        let Some(index) = self.global_secondary_indexes.last() else {
            return;
        };

        let mut key_schema = vec![KeySchemaEntry {
            attribute_name: index.partition_key.name.clone(),
            key_type: KeyType::Hash,
        }];

        if let Some(sort_key) = &index.sort_key {
            key_schema.push(KeySchemaEntry {
                attribute_name: sort_key.name.clone(),
                key_type: KeyType::Range,
            });
        }

        let descriptor = json!({
            "indexName": index.index_name,
            "keySchema": key_schema_value(&key_schema),
            "projection": { "projectionType": index.projection_type.to_string() },
            "provisionedThroughput": {
                "Fn::If": [
                    PAY_PER_REQUEST_CONDITION,
                    { "Ref": "AWS::NoValue" },
                    {
                        "ReadCapacityUnits": { "Ref": READ_IOPS_PARAMETER },
                        "WriteCapacityUnits": { "Ref": WRITE_IOPS_PARAMETER },
                    },
                ],
            },
        });

        if self.uses_overrides() {
            let position = self.global_secondary_indexes.len() - 1;
            self.raw
                .add_override(format!("Properties.globalSecondaryIndexes.{position}"), descriptor);
        } else {
            match self.raw.properties.get_mut("globalSecondaryIndexes") {
                Some(Value::Array(indexes)) => indexes.push(descriptor),
                _ => {
                    self.raw
                        .properties
                        .insert("globalSecondaryIndexes".to_string(), Value::Array(vec![descriptor]));
                }
            }
        }
    }

    fn sync_local_secondary_indexes_to_raw(&mut self) {
        let partition_key = self.partition_key.name.clone();

        let indexes = self
            .local_secondary_indexes
            .iter()
            .map(|index| {
                let mut key_schema = vec![KeySchemaEntry {
                    attribute_name: partition_key.clone(),
                    key_type: KeyType::Hash,
                }];

                if let Some(sort_key) = &index.sort_key {
                    key_schema.push(KeySchemaEntry {
                        attribute_name: sort_key.name.clone(),
                        key_type: KeyType::Range,
                    });
                }

                json!({
                    "indexName": index.index_name,
                    "keySchema": key_schema_value(&key_schema),
                    "projection": { "projectionType": index.projection_type.to_string() },
                })
            })
            .collect();

        if self.uses_overrides() {
            self.raw
                .add_override("Properties.localSecondaryIndexes", Value::Array(indexes));
        } else {
            self.raw
                .properties
                .insert("localSecondaryIndexes".to_string(), Value::Array(indexes));
        }
    }
}

fn key_schema_value(key_schema: &[KeySchemaEntry]) -> Value {
    serde_json::to_value(key_schema).unwrap_or(Value::Null)
}

fn attribute_definitions_value(definitions: &[AttributeDefinition]) -> Value {
    serde_json::to_value(definitions).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn by_author(index_name: &str) -> GlobalSecondaryIndex {
        GlobalSecondaryIndex {
            index_name: index_name.to_string(),
            projection_type: ProjectionType::All,
            partition_key: TableKey {
                name: "author".to_string(),
                attribute_type: AttributeType::S,
            },
            sort_key: Some(TableKey {
                name: "date".to_string(),
                attribute_type: AttributeType::S,
            }),
            read_capacity: json!({ "Ref": READ_IOPS_PARAMETER }),
            write_capacity: json!({ "Ref": WRITE_IOPS_PARAMETER }),
        }
    }

    #[test]
    fn replacing_the_key_drops_old_attributes() {
        let mut table = Table::new("Post", "Post", DynamoDbProvisionStrategy::Default);

        table.replace_key_schema(
            vec![
                KeySchemaEntry {
                    attribute_name: "slug".to_string(),
                    key_type: KeyType::Hash,
                },
                KeySchemaEntry {
                    attribute_name: "rating".to_string(),
                    key_type: KeyType::Range,
                },
            ],
            vec![
                AttributeDefinition {
                    attribute_name: "slug".to_string(),
                    attribute_type: AttributeType::S,
                },
                AttributeDefinition {
                    attribute_name: "rating".to_string(),
                    attribute_type: AttributeType::N,
                },
            ],
        );

        assert_eq!(
            table.partition_key(),
            &TableKey {
                name: "slug".to_string(),
                attribute_type: AttributeType::S,
            }
        );
        assert_eq!(
            table.raw().properties["attributeDefinitions"],
            json!([
                { "attributeName": "slug", "attributeType": "S" },
                { "attributeName": "rating", "attributeType": "N" },
            ])
        );
        assert_eq!(
            table.raw().properties["keySchema"],
            json!([
                { "attributeName": "slug", "keyType": "HASH" },
                { "attributeName": "rating", "keyType": "RANGE" },
            ])
        );
        assert!(table.raw().overrides.is_empty());
    }

    #[test]
    fn amplify_tables_record_overrides() {
        let mut table = Table::new("Post", "Post", DynamoDbProvisionStrategy::AmplifyTable);

        table.add_global_secondary_index(by_author("byAuthor"));
        table.add_global_secondary_index(by_author("byAuthorAgain"));

        let overrides: Vec<_> = table.raw().overrides.keys().map(String::as_str).collect();
        assert_eq!(
            overrides,
            vec![
                "Properties.attributeDefinitions",
                "Properties.globalSecondaryIndexes.0",
                "Properties.globalSecondaryIndexes.1",
            ]
        );
        assert!(!table.raw().properties.contains_key("globalSecondaryIndexes"));

        let effective = table.raw().effective_properties();
        assert_eq!(effective["globalSecondaryIndexes"][1]["indexName"], json!("byAuthorAgain"));
        assert_eq!(
            effective["globalSecondaryIndexes"][0]["provisionedThroughput"]["Fn::If"][0],
            json!("ShouldUsePayPerRequestBilling")
        );
    }

    #[test]
    fn default_tables_append_to_the_raw_list() {
        let mut table = Table::new("Post", "Post", DynamoDbProvisionStrategy::Default);

        table.add_global_secondary_index(by_author("byAuthor"));

        assert_eq!(table.attribute_definitions().len(), 3);
        assert_eq!(
            table.raw().properties["globalSecondaryIndexes"][0]["keySchema"],
            json!([
                { "attributeName": "author", "keyType": "HASH" },
                { "attributeName": "date", "keyType": "RANGE" },
            ])
        );
    }

    #[test]
    fn local_indexes_share_the_partition_key() {
        let mut table = Table::new("Post", "Post", DynamoDbProvisionStrategy::Default);

        table.add_local_secondary_index(LocalSecondaryIndex {
            index_name: "byDate".to_string(),
            projection_type: ProjectionType::All,
            sort_key: Some(TableKey {
                name: "date".to_string(),
                attribute_type: AttributeType::S,
            }),
        });

        assert_eq!(
            table.raw().properties["localSecondaryIndexes"][0]["keySchema"][0]["attributeName"],
            json!("id")
        );
        assert!(table.global_secondary_indexes().is_empty());
    }

    #[test]
    fn amplify_tables_override_local_indexes() {
        let mut table = Table::new("Post", "Post", DynamoDbProvisionStrategy::AmplifyTable);

        table.add_local_secondary_index(LocalSecondaryIndex {
            index_name: "byDate".to_string(),
            projection_type: ProjectionType::All,
            sort_key: Some(TableKey {
                name: "date".to_string(),
                attribute_type: AttributeType::S,
            }),
        });

        assert!(!table.raw().properties.contains_key("localSecondaryIndexes"));
        assert!(table.raw().overrides.contains_key("Properties.localSecondaryIndexes"));

        let effective = table.raw().effective_properties();
        assert_eq!(effective["localSecondaryIndexes"][0]["indexName"], json!("byDate"));
        assert_eq!(
            effective["localSecondaryIndexes"][0]["keySchema"][1]["attributeName"],
            json!("date")
        );
    }
}
