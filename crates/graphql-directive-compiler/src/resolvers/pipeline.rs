use std::{collections::BTreeMap, fmt};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::ResolverError;

/// The named stages of a resolver pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SlotName {
    Init,
    PreAuth,
    Auth,
    PostAuth,
    PreDataLoad,
    PostDataLoad,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotTemplate {
    pub request: Option<String>,
    pub response: Option<String>,
}

impl SlotTemplate {
    pub fn request(template: impl Into<String>) -> Self {
        Self {
            request: Some(template.into()),
            response: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverKey {
    pub type_name: String,
    pub field_name: String,
}

impl ResolverKey {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for ResolverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// A field resolver: main request and response templates, plus ordered slots around them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolver {
    pub type_name: String,
    pub field_name: String,
    pub data_source: Option<String>,
    pub request_template: String,
    pub response_template: String,
    /// The stack the resolver is created in.
    pub stack_id: String,
    slots: BTreeMap<SlotName, Vec<SlotTemplate>>,
}

impl Resolver {
    pub fn new(
        key: ResolverKey,
        data_source: Option<String>,
        request_template: impl Into<String>,
        response_template: impl Into<String>,
        stack_id: impl Into<String>,
    ) -> Self {
        Self {
            type_name: key.type_name,
            field_name: key.field_name,
            data_source,
            request_template: request_template.into(),
            response_template: response_template.into(),
            stack_id: stack_id.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> ResolverKey {
        ResolverKey::new(&self.type_name, &self.field_name)
    }

    /// Appends after whatever the slot already holds.
    pub fn add_to_slot(&mut self, slot: SlotName, template: SlotTemplate) {
        self.slots.entry(slot).or_default().push(template);
    }

    pub fn slot(&self, slot: SlotName) -> &[SlotTemplate] {
        self.slots.get(&slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every template of the resolver, keyed by file name.
    ///
    /// Slot templates are numbered from 1 within their slot: `Query.getPost.preAuth.1.req.vtl`.
    pub fn templates(&self) -> BTreeMap<String, String> {
        let prefix = format!("{}.{}", self.type_name, self.field_name);
        let mut templates = BTreeMap::new();

        templates.insert(format!("{prefix}.req.vtl"), self.request_template.clone());
        templates.insert(format!("{prefix}.res.vtl"), self.response_template.clone());

        for (slot, slot_templates) in &self.slots {
            for (position, template) in slot_templates.iter().enumerate() {
                let number = position + 1;

                if let Some(request) = &template.request {
                    templates.insert(format!("{prefix}.{slot}.{number}.req.vtl"), request.clone());
                }

                if let Some(response) = &template.response {
                    templates.insert(format!("{prefix}.{slot}.{number}.res.vtl"), response.clone());
                }
            }
        }

        templates
    }
}

/// Every resolver of a compilation, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverRegistry {
    resolvers: IndexMap<ResolverKey, Resolver>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver. A type and field can only be resolved once.
    pub fn add(&mut self, resolver: Resolver) -> Result<(), ResolverError> {
        let key = resolver.key();

        if self.resolvers.contains_key(&key) {
            return Err(ResolverError::DuplicateResolver {
                type_name: key.type_name,
                field_name: key.field_name,
            });
        }

        self.resolvers.insert(key, resolver);
        Ok(())
    }

    pub fn get(&self, key: &ResolverKey) -> Option<&Resolver> {
        self.resolvers.get(key)
    }

    pub fn get_mut(&mut self, key: &ResolverKey) -> Option<&mut Resolver> {
        self.resolvers.get_mut(key)
    }

    pub fn contains(&self, key: &ResolverKey) -> bool {
        self.resolvers.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolver> + '_ {
        self.resolvers.values()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Serialize for ResolverRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.resolvers.values())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn slots_append_and_number_their_templates() {
        let mut resolver = Resolver::new(
            ResolverKey::new("Query", "getPost"),
            Some("PostTable".to_string()),
            "request",
            "response",
            "Post",
        );

        resolver.add_to_slot(SlotName::PostAuth, SlotTemplate::request("sandbox"));
        resolver.add_to_slot(SlotName::PreAuth, SlotTemplate::request("first"));
        resolver.add_to_slot(SlotName::PreAuth, SlotTemplate::request("second"));

        assert_eq!(
            resolver
                .slot(SlotName::PreAuth)
                .iter()
                .filter_map(|template| template.request.as_deref())
                .collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert!(resolver.slot(SlotName::Finish).is_empty());

        let templates = resolver.templates();
        assert_eq!(
            templates.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "Query.getPost.postAuth.1.req.vtl",
                "Query.getPost.preAuth.1.req.vtl",
                "Query.getPost.preAuth.2.req.vtl",
                "Query.getPost.req.vtl",
                "Query.getPost.res.vtl",
            ]
        );
        assert_eq!(templates["Query.getPost.preAuth.2.req.vtl"], "second");
    }

    #[test]
    fn slot_order_follows_execution() {
        assert!(SlotName::Init < SlotName::PreAuth);
        assert!(SlotName::PostAuth < SlotName::PreDataLoad);
        assert_eq!(SlotName::PreDataLoad.to_string(), "preDataLoad");
    }

    #[test]
    fn registering_a_field_twice_keeps_the_first_resolver() {
        let mut registry = ResolverRegistry::new();
        let key = ResolverKey::new("Query", "postsByTitle");

        registry
            .add(Resolver::new(key.clone(), None, "first", "response", "Post"))
            .unwrap();

        assert_eq!(
            registry.add(Resolver::new(key.clone(), None, "second", "response", "Post")),
            Err(ResolverError::DuplicateResolver {
                type_name: "Query".to_string(),
                field_name: "postsByTitle".to_string(),
            })
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&key).unwrap().templates()["Query.postsByTitle.req.vtl"], "first");
    }
}
