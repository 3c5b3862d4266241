use async_graphql_parser::{
    types::{BaseType, FieldDefinition, ServiceDocument, Type, TypeDefinition, TypeKind, TypeSystemDefinition},
    Positioned,
};
use indexmap::IndexMap;

use crate::key_schema::AttributeType;

pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";

const NUMERIC_SCALARS: [&str; 3] = ["Int", "Float", "AWSTimestamp"];

const SCALARS: [&str; 15] = [
    "String",
    "ID",
    "Int",
    "Float",
    "Boolean",
    "AWSDate",
    "AWSTime",
    "AWSDateTime",
    "AWSTimestamp",
    "AWSEmail",
    "AWSURL",
    "AWSPhone",
    "AWSIPAddress",
    "BigInt",
    "Double",
];

/// Type definitions of a parsed schema, extensions included, looked up by name.
#[derive(Debug, Clone)]
pub struct SchemaTypes<'a> {
    types: IndexMap<&'a str, Vec<&'a Positioned<TypeDefinition>>>,
}

impl<'a> SchemaTypes<'a> {
    pub fn new(document: &'a ServiceDocument) -> Self {
        let mut types: IndexMap<&'a str, Vec<_>> = IndexMap::new();

        for definition in &document.definitions {
            if let TypeSystemDefinition::Type(type_definition) = definition {
                types
                    .entry(type_definition.node.name.node.as_str())
                    .or_default()
                    .push(type_definition);
            }
        }

        Self { types }
    }

    /// The first definition of a type, ignoring extensions.
    pub fn get_type(&self, name: &str) -> Option<&'a Positioned<TypeDefinition>> {
        let definitions = self.types.get(name)?;

        definitions
            .iter()
            .find(|definition| !definition.node.extend)
            .or_else(|| definitions.first())
            .copied()
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.get_type(name)
            .is_some_and(|definition| matches!(definition.node.kind, TypeKind::Enum(_)))
    }

    pub fn is_object(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(|definitions| {
            definitions
                .iter()
                .any(|definition| matches!(definition.node.kind, TypeKind::Object(_)))
        })
    }

    /// Names of every enum type.
    pub fn enum_types(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.types
            .iter()
            .filter(|(_, definitions)| {
                definitions
                    .iter()
                    .any(|definition| matches!(definition.node.kind, TypeKind::Enum(_)))
            })
            .map(|(name, _)| *name)
    }

    /// Object types annotated with `@model`, in document order.
    pub fn model_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.types
            .iter()
            .filter(|(_, definitions)| {
                definitions.iter().any(|definition| {
                    matches!(definition.node.kind, TypeKind::Object(_))
                        && definition
                            .node
                            .directives
                            .iter()
                            .any(|directive| directive.node.name.node == crate::rules::model_directive::MODEL_DIRECTIVE)
                })
            })
            .map(|(name, _)| *name)
    }

    /// Fields of an object type across its definition and extensions.
    pub fn object_fields(&self, name: &str) -> impl Iterator<Item = &'a Positioned<FieldDefinition>> + '_ {
        self.types
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter_map(|definition| match &definition.node.kind {
                TypeKind::Object(object) => Some(object.fields.iter()),
                _ => None,
            })
            .flatten()
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&'a Positioned<FieldDefinition>> {
        self.object_fields(type_name)
            .find(|field| field.node.name.node == field_name)
    }

    /// Key attribute type of a field: enums and non-numeric scalars are strings.
    pub fn attribute_type(&self, ty: &Type) -> AttributeType {
        let base = base_type_name(ty);

        if self.is_enum(base) {
            AttributeType::S
        } else if NUMERIC_SCALARS.contains(&base) {
            AttributeType::N
        } else {
            AttributeType::S
        }
    }

    /// Lists and composite types, as opposed to scalars and enums.
    pub fn is_array_or_object(&self, ty: &Type) -> bool {
        match &ty.base {
            BaseType::List(_) => true,
            BaseType::Named(name) => {
                let name = name.as_str();
                name == "AWSJSON" || !(is_scalar_name(name) || self.is_enum(name) || self.is_custom_scalar(name))
            }
        }
    }

    fn is_custom_scalar(&self, name: &str) -> bool {
        self.get_type(name)
            .is_some_and(|definition| matches!(definition.node.kind, TypeKind::Scalar))
    }
}

pub fn base_type_name(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => base_type_name(inner),
    }
}

pub fn is_list_type(ty: &Type) -> bool {
    matches!(ty.base, BaseType::List(_))
}

pub fn is_scalar_name(name: &str) -> bool {
    SCALARS.contains(&name)
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use rstest::rstest;

    use super::*;

    const SCHEMA: &str = r"
        enum Status { DRAFT PUBLISHED }

        type Post @model {
            id: ID!
            rating: Int
            score: Float
            status: Status!
            tags: [String!]
            metadata: AWSJSON
            author: Author
            publishedAt: AWSTimestamp
        }

        type Author {
            name: String
        }

        extend type Post {
            slug: String
        }
    ";

    #[rstest]
    #[case::id("id", AttributeType::S)]
    #[case::int("rating", AttributeType::N)]
    #[case::float("score", AttributeType::N)]
    #[case::enum_field("status", AttributeType::S)]
    #[case::timestamp("publishedAt", AttributeType::N)]
    fn attribute_types(#[case] field: &str, #[case] expected: AttributeType) {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let field = types.field("Post", field).unwrap();

        assert_eq!(types.attribute_type(&field.node.ty.node), expected);
    }

    #[rstest]
    #[case::scalar("rating", false)]
    #[case::enum_field("status", false)]
    #[case::list("tags", true)]
    #[case::json("metadata", true)]
    #[case::object("author", true)]
    fn array_or_object(#[case] field: &str, #[case] expected: bool) {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);
        let field = types.field("Post", field).unwrap();

        assert_eq!(types.is_array_or_object(&field.node.ty.node), expected);
    }

    #[test]
    fn extensions_contribute_fields() {
        let document = parse_schema(SCHEMA).unwrap();
        let types = SchemaTypes::new(&document);

        assert!(types.field("Post", "slug").is_some());
        assert_eq!(types.model_names().collect::<Vec<_>>(), vec!["Post"]);
        assert_eq!(types.enum_types().collect::<Vec<_>>(), vec!["Status"]);
    }
}
