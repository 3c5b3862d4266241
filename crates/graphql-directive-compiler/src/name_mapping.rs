//! Model and field renames declared by `@mapsTo` and `@refersTo`.

use graphql_mapping_template::{compound, method_call, obj, print_block, qref, raw, reference, string};
use indexmap::IndexMap;
use serde::Serialize;

use crate::resolvers::pipeline::{ResolverKey, ResolverRegistry, SlotName, SlotTemplate};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHelper {
    model_name_mappings: IndexMap<String, String>,
    field_maps: IndexMap<String, ModelFieldMap>,
}

impl ResourceHelper {
    pub fn set_model_name_mapping(&mut self, model: impl Into<String>, original: impl Into<String>) {
        self.model_name_mappings.insert(model.into(), original.into());
    }

    /// The name the backing store knows a model by.
    pub fn model_name_mapping<'s>(&'s self, model: &'s str) -> &'s str {
        self.model_name_mappings
            .get(model)
            .map(String::as_str)
            .unwrap_or(model)
    }

    pub fn model_field_map(&self, model: &str) -> Option<&ModelFieldMap> {
        self.field_maps.get(model)
    }

    pub fn model_field_map_mut(&mut self, model: &str) -> &mut ModelFieldMap {
        self.field_maps.entry(model.to_string()).or_default()
    }

    pub fn field_maps(&self) -> impl Iterator<Item = (&str, &ModelFieldMap)> + '_ {
        self.field_maps.iter().map(|(model, map)| (model.as_str(), map))
    }

    /// Records a resolver serving `model` when some of its fields are renamed.
    pub fn add_resolver_reference(&mut self, model: &str, reference: ResolverReference) {
        if let Some(map) = self.field_maps.get_mut(model) {
            if !map.mapped_fields.is_empty() {
                map.add_resolver_reference(reference);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFieldMap {
    mapped_fields: Vec<FieldMapEntry>,
    resolver_references: Vec<ResolverReference>,
}

impl ModelFieldMap {
    pub fn add_mapped_field(&mut self, entry: FieldMapEntry) {
        self.mapped_fields
            .retain(|existing| existing.current_field_name != entry.current_field_name);
        self.mapped_fields.push(entry);
    }

    pub fn mapped_fields(&self) -> &[FieldMapEntry] {
        &self.mapped_fields
    }

    pub fn add_resolver_reference(&mut self, reference: ResolverReference) {
        if !self.resolver_references.contains(&reference) {
            self.resolver_references.push(reference);
        }
    }

    pub fn resolver_references(&self) -> &[ResolverReference] {
        &self.resolver_references
    }
}

/// A GraphQL field and the column it is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapEntry {
    pub original_field_name: String,
    pub current_field_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverReference {
    pub type_name: String,
    pub field_name: String,
    pub is_list: bool,
}

/// Stashes the field map in the `init` slot of every referenced resolver, for the SQL Lambda to translate columns.
pub(crate) fn attach_field_mapping_slots(helper: &ResourceHelper, resolvers: &mut ResolverRegistry) {
    for (model, field_map) in helper.field_maps() {
        if field_map.mapped_fields().is_empty() {
            continue;
        }

        let snippet = field_mapping_snippet(field_map);

        for resolver_reference in field_map.resolver_references() {
            let key = ResolverKey::new(&resolver_reference.type_name, &resolver_reference.field_name);

            match resolvers.get_mut(&key) {
                Some(resolver) => resolver.add_to_slot(SlotName::Init, SlotTemplate::request(snippet.clone())),
                None => tracing::debug!("No resolver {key} to attach the field mapping of {model} to"),
            }
        }
    }
}

fn field_mapping_snippet(field_map: &ModelFieldMap) -> String {
    let mapping = obj(field_map
        .mapped_fields()
        .iter()
        .map(|entry| (entry.current_field_name.clone(), string(&entry.original_field_name))));

    print_block(
        "Set field mapping",
        &compound([
            qref(method_call(reference("ctx.stash.put"), [string("fieldMap"), mapping])),
            raw("{}"),
        ]),
    )
}
