//! `@model` marks an object type as stored, with generated CRUD operations.

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, TypeDefinition, TypeKind},
    Positioned,
};
use inflector::string::pluralize::to_plural;
use serde::{Deserialize, Deserializer};

use super::visitor::{Visitor, VisitorContext};
use crate::directive_de::parse_directive;

pub const MODEL_DIRECTIVE: &str = "model";

/// The generated root fields of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ModelOperation {
    Get,
    List,
    Sync,
    Create,
    Update,
    Delete,
}

impl ModelOperation {
    pub fn is_query(self) -> bool {
        matches!(self, ModelOperation::Get | ModelOperation::List | ModelOperation::Sync)
    }

    pub fn is_mutation(self) -> bool {
        !self.is_query()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub name: String,
    pub get: Option<String>,
    pub list: Option<String>,
    pub sync: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
    pub timestamps: Timestamps,
}

impl ModelConfig {
    fn new(name: &str, arguments: ModelArguments) -> Self {
        let plural = to_plural(name);

        let (get, list, sync) = match arguments.queries {
            None => (
                Some(format!("get{name}")),
                Some(format!("list{plural}")),
                Some(format!("sync{plural}")),
            ),
            Some(None) => (None, None, None),
            Some(Some(queries)) => (queries.get, queries.list, queries.sync),
        };

        let (create, update, delete) = match arguments.mutations {
            None => (
                Some(format!("create{name}")),
                Some(format!("update{name}")),
                Some(format!("delete{name}")),
            ),
            Some(None) => (None, None, None),
            Some(Some(mutations)) => (mutations.create, mutations.update, mutations.delete),
        };

        let timestamps = match arguments.timestamps {
            None => Timestamps::default(),
            Some(None) => Timestamps {
                created_at: None,
                updated_at: None,
            },
            Some(Some(timestamps)) => timestamps,
        };

        Self {
            name: name.to_string(),
            get,
            list,
            sync,
            create,
            update,
            delete,
            timestamps,
        }
    }

    /// The root field generated for an operation, unless disabled.
    pub fn resolver_field(&self, operation: ModelOperation) -> Option<&str> {
        match operation {
            ModelOperation::Get => self.get.as_deref(),
            ModelOperation::List => self.list.as_deref(),
            ModelOperation::Sync => self.sync.as_deref(),
            ModelOperation::Create => self.create.as_deref(),
            ModelOperation::Update => self.update.as_deref(),
            ModelOperation::Delete => self.delete.as_deref(),
        }
    }
}

/// Attributes maintained on every write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Timestamps {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: Some("createdAt".to_string()),
            updated_at: Some("updatedAt".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ModelArguments {
    #[serde(default, deserialize_with = "deserialize_some")]
    queries: Option<Option<ModelQueries>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    mutations: Option<Option<ModelMutations>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    timestamps: Option<Option<Timestamps>>,
    // Subscriptions are generated elsewhere. The argument is accepted and ignored.
    #[serde(default)]
    #[allow(dead_code)]
    subscriptions: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelQueries {
    #[serde(default)]
    get: Option<String>,
    #[serde(default)]
    list: Option<String>,
    #[serde(default)]
    sync: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelMutations {
    #[serde(default)]
    create: Option<String>,
    #[serde(default)]
    update: Option<String>,
    #[serde(default)]
    delete: Option<String>,
}

/// Tells an explicit `null` apart from an absent argument.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

pub struct ModelDirective;

impl<'a> Visitor<'a> for ModelDirective {
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        if directive.node.name.node != MODEL_DIRECTIVE {
            return;
        }

        let type_name = parent_type.node.name.node.as_str();

        if field.is_some() || !matches!(parent_type.node.kind, TypeKind::Object(_)) {
            ctx.report_error(
                vec![directive.pos],
                "The @model directive may only be added to object definitions.",
            );
            return;
        }

        if ctx.models.contains_key(type_name) {
            ctx.report_error(
                vec![directive.pos],
                format!("The @model directive may only be added once to type '{type_name}'."),
            );
            return;
        }

        match parse_directive::<ModelArguments>(directive) {
            Ok(arguments) => {
                ctx.models
                    .insert(type_name.to_string(), ModelConfig::new(type_name, arguments));
            }
            Err(error) => ctx.append_errors(vec![error]),
        }
    }
}

/// Whether a type definition carries `@model`.
pub(crate) fn is_model(type_definition: &Positioned<TypeDefinition>) -> bool {
    type_definition
        .node
        .directives
        .iter()
        .any(|directive| directive.node.name.node == MODEL_DIRECTIVE)
}
