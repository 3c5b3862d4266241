//! Deriving backing-store keys from `@primaryKey` and `@index` configurations.

use async_graphql_parser::types::Type;
use heck::ToLowerCamelCase;
use itertools::Itertools;
use serde::Serialize;

use crate::schema_types::SchemaTypes;

/// Joins the fields of a composite sort key, both in attribute names and values.
pub const COMPOSITE_KEY_SEPARATOR: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum AttributeType {
    S,
    N,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySchemaEntry {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: AttributeType,
}

/// A field taking part in a key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyField {
    pub name: String,
    pub ty: Type,
}

/// The partition field and the ordered sort fields of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFields {
    pub field: KeyField,
    pub sort_key: Vec<KeyField>,
}

impl KeyFields {
    pub fn sort_key_fields(&self) -> Vec<&str> {
        self.sort_key.iter().map(|field| field.name.as_str()).collect()
    }

    /// The partition field followed by the sort fields.
    pub fn key_names(&self) -> Vec<&str> {
        std::iter::once(self.field.name.as_str())
            .chain(self.sort_key.iter().map(|field| field.name.as_str()))
            .collect()
    }

    /// The range key attribute: the sole sort field, or the composite of all of them.
    pub fn sort_key_name(&self) -> Option<String> {
        match self.sort_key.as_slice() {
            [] => None,
            [single] => Some(single.name.clone()),
            fields => Some(composite_attribute_name(fields.iter().map(|field| field.name.as_str()))),
        }
    }
}

/// `a#b#c`
pub fn composite_attribute_name<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields.into_iter().join(COMPOSITE_KEY_SEPARATOR)
}

/// `${mergedValues.a}#${mergedValues.b}`
pub fn composite_attribute_value<'a>(fields: impl IntoIterator<Item = &'a str>, args_prefix: &str) -> String {
    fields
        .into_iter()
        .map(|field| format!("${{{args_prefix}.{field}}}"))
        .join(COMPOSITE_KEY_SEPARATOR)
}

/// The name a composite sort key goes by in GraphQL arguments: `aB` for `a#b`.
pub fn composite_argument_name<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields.into_iter().join("_").to_lower_camel_case()
}

/// The HASH entry for the partition field, then a RANGE entry when there is a sort key.
pub fn derive_key_schema(key: &KeyFields) -> Vec<KeySchemaEntry> {
    let mut schema = vec![KeySchemaEntry {
        attribute_name: key.field.name.clone(),
        key_type: KeyType::Hash,
    }];

    if let Some(sort_key_name) = key.sort_key_name() {
        schema.push(KeySchemaEntry {
            attribute_name: sort_key_name,
            key_type: KeyType::Range,
        });
    }

    schema
}

/// One definition per key attribute. A composite sort key is a single synthetic string attribute.
pub fn derive_attribute_definitions(key: &KeyFields, types: &SchemaTypes<'_>) -> Vec<AttributeDefinition> {
    let mut definitions = vec![AttributeDefinition {
        attribute_name: key.field.name.clone(),
        attribute_type: types.attribute_type(&key.field.ty),
    }];

    match key.sort_key.as_slice() {
        [] => {}
        [single] => definitions.push(AttributeDefinition {
            attribute_name: single.name.clone(),
            attribute_type: types.attribute_type(&single.ty),
        }),
        fields => definitions.push(AttributeDefinition {
            attribute_name: composite_attribute_name(fields.iter().map(|field| field.name.as_str())),
            attribute_type: AttributeType::S,
        }),
    }

    definitions
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const SCHEMA: &str = r"
        enum Genre { ROCK JAZZ }

        type Post @model {
            id: ID!
            date: AWSDateTime!
            author: String!
            genre: Genre!
            rating: Int!
            title: String
        }
    ";

    fn key(types: &SchemaTypes<'_>, field: &str, sort_key: &[&str]) -> KeyFields {
        let key_field = |name: &str| KeyField {
            name: name.to_string(),
            ty: types.field("Post", name).unwrap().node.ty.node.clone(),
        };

        KeyFields {
            field: key_field(field),
            sort_key: sort_key.iter().map(|name| key_field(*name)).collect(),
        }
    }

    #[rstest]
    #[case::no_sort_key(&[], 1, 1)]
    #[case::single_sort_key(&["date"], 2, 2)]
    #[case::composite_of_two(&["author", "date"], 2, 2)]
    #[case::composite_of_three(&["author", "genre", "date"], 2, 2)]
    fn entry_counts(#[case] sort_key: &[&str], #[case] schema_entries: usize, #[case] definitions: usize) {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let key = key(&types, "id", sort_key);

        let key_schema = derive_key_schema(&key);
        assert_eq!(key_schema.len(), schema_entries);
        assert_eq!(key_schema[0].key_type, KeyType::Hash);
        assert_eq!(derive_attribute_definitions(&key, &types).len(), definitions);
    }

    #[test]
    fn primary_key_with_date_sort_key() {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let key = key(&types, "id", &["date"]);

        assert_eq!(
            derive_key_schema(&key),
            vec![
                KeySchemaEntry {
                    attribute_name: "id".to_string(),
                    key_type: KeyType::Hash,
                },
                KeySchemaEntry {
                    attribute_name: "date".to_string(),
                    key_type: KeyType::Range,
                },
            ]
        );
    }

    #[test]
    fn composite_sort_key_is_a_string_attribute() {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let key = key(&types, "id", &["rating", "date"]);

        let definitions = derive_attribute_definitions(&key, &types);

        assert_eq!(
            definitions[1],
            AttributeDefinition {
                attribute_name: "rating#date".to_string(),
                attribute_type: AttributeType::S,
            }
        );
        assert_eq!(derive_key_schema(&key)[1].attribute_name, "rating#date");
    }

    #[test]
    fn enum_fields_are_strings() {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let key = key(&types, "genre", &["rating"]);

        let definitions = derive_attribute_definitions(&key, &types);

        assert_eq!(definitions[0].attribute_type, AttributeType::S);
        assert_eq!(definitions[1].attribute_type, AttributeType::N);
    }

    #[test]
    fn derivation_is_idempotent() {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let key = key(&types, "author", &["genre", "date"]);

        assert_eq!(derive_key_schema(&key), derive_key_schema(&key));
        assert_eq!(
            derive_attribute_definitions(&key, &types),
            derive_attribute_definitions(&key, &types)
        );
    }

    #[test]
    fn composite_names() {
        assert_eq!(composite_attribute_name(["status", "date"]), "status#date");
        assert_eq!(
            composite_attribute_value(["status", "date"], "mergedValues"),
            "${mergedValues.status}#${mergedValues.date}"
        );
        assert_eq!(composite_argument_name(["status", "createdAt"]), "statusCreatedAt");
    }
}
