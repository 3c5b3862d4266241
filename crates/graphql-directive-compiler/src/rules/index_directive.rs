//! `@index` declares a secondary index on a model, with an optional dedicated query.

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, TypeDefinition},
    Positioned,
};
use heck::ToUpperCamelCase;
use serde::Deserialize;

use super::{
    model_directive::is_model,
    primary_key_directive::{resolve_key_fields, PRIMARY_KEY_DIRECTIVE},
    visitor::{Visitor, VisitorContext},
};
use crate::{
    directive_de::parse_directive,
    key_schema::{KeyField, KeyFields},
};

pub const INDEX_DIRECTIVE: &str = "index";

/// A secondary index of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Empty only when given as such. Compilation rejects it when the index is provisioned.
    pub name: String,
    pub object: String,
    /// The partition field of the model's primary key, when `@primaryKey` replaces `id`.
    pub primary_key_field: Option<KeyField>,
    pub query_field: Option<String>,
    pub key: KeyFields,
}

impl IndexConfig {
    pub fn sort_key_fields(&self) -> Vec<&str> {
        self.key.sort_key_fields()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IndexArguments {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sort_key_fields: Vec<String>,
    #[serde(default)]
    query_field: Option<String>,
}

/// `byAuthorAndDate` for an index on `author` sorted by `date`.
pub fn default_index_name(field: &str, sort_key_fields: &[String]) -> String {
    std::iter::once(field)
        .chain(sort_key_fields.iter().map(String::as_str))
        .map(|part| part.to_upper_camel_case())
        .fold(String::from("by"), |mut name, part| {
            if name.len() > 2 {
                name.push_str("And");
            }
            name.push_str(&part);
            name
        })
}

pub struct IndexDirective;

impl<'a> Visitor<'a> for IndexDirective {
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        if directive.node.name.node != INDEX_DIRECTIVE {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        let Some(field) = field else {
            ctx.report_error(
                vec![directive.pos],
                "The @index directive may only be added to field definitions.",
            );
            return;
        };

        if !is_model(parent_type) {
            ctx.report_error(
                vec![directive.pos],
                "The @index directive may only be added to object definitions annotated with @model.",
            );
            return;
        }

        let arguments = match parse_directive::<IndexArguments>(directive) {
            Ok(arguments) => arguments,
            Err(error) => {
                ctx.append_errors(vec![error]);
                return;
            }
        };

        let name = arguments
            .name
            .unwrap_or_else(|| default_index_name(&field.node.name.node, &arguments.sort_key_fields));

        if ctx
            .indexes
            .iter()
            .any(|index| index.object == type_name && !name.is_empty() && index.name == name)
        {
            ctx.report_error(
                vec![directive.pos],
                format!("You may only supply one index named '{name}' on type '{type_name}'."),
            );
            return;
        }

        let Some(key) = resolve_key_fields(
            ctx,
            directive.pos,
            type_name,
            field,
            &arguments.sort_key_fields,
            &format!("index '{name}'"),
        ) else {
            return;
        };

        let primary_key_field = ctx.types.object_fields(type_name).find_map(|candidate| {
            candidate
                .node
                .directives
                .iter()
                .any(|directive| directive.node.name.node == PRIMARY_KEY_DIRECTIVE)
                .then(|| KeyField {
                    name: candidate.node.name.node.to_string(),
                    ty: candidate.node.ty.node.clone(),
                })
        });

        ctx.indexes.push(IndexConfig {
            name,
            object: type_name.to_string(),
            primary_key_field,
            query_field: arguments.query_field,
            key,
        });
    }
}
