//! `@primaryKey` replaces the default `id` key of a model.

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, TypeDefinition},
    Pos, Positioned,
};
use serde::Deserialize;

use super::{
    model_directive::is_model,
    visitor::{Visitor, VisitorContext},
};
use crate::{
    directive_de::parse_directive,
    key_schema::{KeyField, KeyFields},
};

pub const PRIMARY_KEY_DIRECTIVE: &str = "primaryKey";

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyConfig {
    pub object: String,
    pub key: KeyFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PrimaryKeyArguments {
    #[serde(default)]
    sort_key_fields: Vec<String>,
}

pub struct PrimaryKeyDirective;

impl<'a> Visitor<'a> for PrimaryKeyDirective {
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        if directive.node.name.node != PRIMARY_KEY_DIRECTIVE {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        let Some(field) = field else {
            ctx.report_error(
                vec![directive.pos],
                "The @primaryKey directive may only be added to field definitions.",
            );
            return;
        };

        if !is_model(parent_type) {
            ctx.report_error(
                vec![directive.pos],
                "The @primaryKey directive may only be added to object definitions annotated with @model.",
            );
            return;
        }

        if ctx.primary_keys.iter().any(|primary_key| primary_key.object == type_name) {
            ctx.report_error(
                vec![directive.pos],
                format!("You may only supply one primary key on type '{type_name}'."),
            );
            return;
        }

        let arguments = match parse_directive::<PrimaryKeyArguments>(directive) {
            Ok(arguments) => arguments,
            Err(error) => {
                ctx.append_errors(vec![error]);
                return;
            }
        };

        let Some(key) = resolve_key_fields(
            ctx,
            directive.pos,
            type_name,
            field,
            &arguments.sort_key_fields,
            "the primary key",
        ) else {
            return;
        };

        let nullable = std::iter::once(&key.field)
            .chain(&key.sort_key)
            .any(|key_field| key_field.ty.nullable);

        if nullable {
            ctx.report_error(
                vec![directive.pos],
                format!("The primary key on type '{type_name}' must reference non-null fields."),
            );
            return;
        }

        ctx.primary_keys.push(PrimaryKeyConfig {
            object: type_name.to_string(),
            key,
        });
    }
}

/// Resolves the annotated field and its sort fields, which must all be scalars or enums of `type_name`.
pub(super) fn resolve_key_fields(
    ctx: &mut VisitorContext<'_>,
    pos: Pos,
    type_name: &str,
    field: &Positioned<FieldDefinition>,
    sort_key_fields: &[String],
    key_description: &str,
) -> Option<KeyFields> {
    let partition = KeyField {
        name: field.node.name.node.to_string(),
        ty: field.node.ty.node.clone(),
    };

    let mut sort_key = Vec::with_capacity(sort_key_fields.len());

    for sort_key_field in sort_key_fields {
        match ctx.types.field(type_name, sort_key_field) {
            Some(definition) => sort_key.push(KeyField {
                name: sort_key_field.clone(),
                ty: definition.node.ty.node.clone(),
            }),
            None => {
                ctx.report_error(
                    vec![pos],
                    format!(
                        "Can't find field '{sort_key_field}' in {type_name}, but it was specified in {key_description}."
                    ),
                );
                return None;
            }
        }
    }

    let invalid = std::iter::once(&partition)
        .chain(&sort_key)
        .find(|key_field| ctx.types.is_array_or_object(&key_field.ty));

    if let Some(invalid) = invalid {
        ctx.report_error(
            vec![pos],
            format!(
                "The key field '{}' on type '{type_name}' must be a scalar or an enum.",
                invalid.name
            ),
        );
        return None;
    }

    Some(KeyFields {
        field: partition,
        sort_key,
    })
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::parse_schema;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::rules::visitor::{visit, VisitorNil};

    fn run(schema: &str) -> (Vec<PrimaryKeyConfig>, Vec<String>) {
        let document = parse_schema(schema).unwrap();
        let mut ctx = VisitorContext::new(&document);
        visit(&mut VisitorNil.with(PrimaryKeyDirective), &mut ctx, &document);

        (
            ctx.primary_keys,
            ctx.errors.into_iter().map(|error| error.message).collect(),
        )
    }

    #[test]
    fn primary_key_with_sort_fields() {
        let (keys, errors) = run(r#"
            type Post @model {
                author: String! @primaryKey(sortKeyFields: ["status", "date"])
                status: String!
                date: AWSDateTime!
            }
        "#);

        assert!(errors.is_empty());
        assert_eq!(keys[0].object, "Post");
        assert_eq!(keys[0].key.key_names(), vec!["author", "status", "date"]);
        assert_eq!(keys[0].key.sort_key_name().as_deref(), Some("status#date"));
    }

    #[rstest]
    #[case::not_a_model(
        "type Post { id: ID! @primaryKey }",
        "The @primaryKey directive may only be added to object definitions annotated with @model."
    )]
    #[case::twice(
        "type Post @model { id: ID! @primaryKey slug: String! @primaryKey }",
        "You may only supply one primary key on type 'Post'."
    )]
    #[case::nullable_field(
        "type Post @model { id: ID @primaryKey }",
        "The primary key on type 'Post' must reference non-null fields."
    )]
    #[case::nullable_sort_field(
        r#"type Post @model { id: ID! @primaryKey(sortKeyFields: ["date"]) date: AWSDateTime }"#,
        "The primary key on type 'Post' must reference non-null fields."
    )]
    #[case::missing_sort_field(
        r#"type Post @model { id: ID! @primaryKey(sortKeyFields: ["date"]) }"#,
        "Can't find field 'date' in Post, but it was specified in the primary key."
    )]
    #[case::list_field(
        "type Post @model { tags: [String!]! @primaryKey }",
        "The key field 'tags' on type 'Post' must be a scalar or an enum."
    )]
    fn invalid_primary_keys(#[case] schema: &str, #[case] expected: &str) {
        let (_, errors) = run(schema);

        assert_eq!(errors, vec![expected.to_string()]);
    }
}
