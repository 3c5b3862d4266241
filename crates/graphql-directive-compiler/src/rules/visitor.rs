use std::fmt::{self, Display, Formatter};

use async_graphql_parser::{
    types::{ConstDirective, FieldDefinition, ServiceDocument, TypeDefinition, TypeKind, TypeSystemDefinition},
    Pos, Positioned,
};
use indexmap::IndexMap;

use super::{
    index_directive::IndexConfig, model_directive::ModelConfig, primary_key_directive::PrimaryKeyConfig,
    sql_directive::SqlDirectiveConfig,
};
use crate::{name_mapping::ResourceHelper, schema_types::SchemaTypes};

/// The VisitorContext shared by every rule while walking the schema.
pub struct VisitorContext<'a> {
    pub(crate) types: SchemaTypes<'a>,
    pub(crate) errors: Vec<RuleError>,
    pub(crate) models: IndexMap<String, ModelConfig>,
    pub(crate) primary_keys: Vec<PrimaryKeyConfig>,
    pub(crate) indexes: Vec<IndexConfig>,
    pub(crate) sql_fields: Vec<SqlDirectiveConfig>,
    pub(crate) resource_helper: ResourceHelper,
}

/// What the rules extracted from the directives of a schema.
#[derive(Debug, Default)]
pub struct ParsedDirectives {
    pub models: IndexMap<String, ModelConfig>,
    pub primary_keys: Vec<PrimaryKeyConfig>,
    pub indexes: Vec<IndexConfig>,
    pub sql_fields: Vec<SqlDirectiveConfig>,
    pub resource_helper: ResourceHelper,
}

impl<'a> VisitorContext<'a> {
    pub(crate) fn new(document: &'a ServiceDocument) -> Self {
        Self {
            types: SchemaTypes::new(document),
            errors: Vec::new(),
            models: IndexMap::new(),
            primary_keys: Vec::new(),
            indexes: Vec::new(),
            sql_fields: Vec::new(),
            resource_helper: ResourceHelper::default(),
        }
    }

    pub(crate) fn finish(self) -> ParsedDirectives {
        ParsedDirectives {
            models: self.models,
            primary_keys: self.primary_keys,
            indexes: self.indexes,
            sql_fields: self.sql_fields,
            resource_helper: self.resource_helper,
        }
    }

    pub(crate) fn report_error<T: Into<String>>(&mut self, locations: Vec<Pos>, msg: T) {
        self.errors.push(RuleError::new(locations, msg));
    }

    pub(crate) fn append_errors(&mut self, errors: Vec<RuleError>) {
        self.errors.extend(errors);
    }
}

pub trait Visitor<'a> {
    fn enter_directive(
        &mut self,
        _ctx: &mut VisitorContext<'a>,
        _directive: &'a Positioned<ConstDirective>,
        _parent_type: &'a Positioned<TypeDefinition>,
        _field: Option<&'a Positioned<FieldDefinition>>,
    ) {
    }
}

/// Empty Value
pub struct VisitorNil;

impl VisitorNil {
    pub(crate) const fn with<V>(self, visitor: V) -> VisitorCons<V, Self> {
        VisitorCons(visitor, self)
    }
}

/// Concat rule
pub struct VisitorCons<A, B>(A, B);

impl<A, B> VisitorCons<A, B> {
    pub(crate) const fn with<V>(self, visitor: V) -> VisitorCons<V, Self> {
        VisitorCons(visitor, self)
    }
}

impl<'a> Visitor<'a> for VisitorNil {}

/// The monoid implementation for Visitor
impl<'a, A, B> Visitor<'a> for VisitorCons<A, B>
where
    A: Visitor<'a>,
    B: Visitor<'a>,
{
    fn enter_directive(
        &mut self,
        ctx: &mut VisitorContext<'a>,
        directive: &'a Positioned<ConstDirective>,
        parent_type: &'a Positioned<TypeDefinition>,
        field: Option<&'a Positioned<FieldDefinition>>,
    ) {
        self.0.enter_directive(ctx, directive, parent_type, field);
        self.1.enter_directive(ctx, directive, parent_type, field);
    }
}

/// Walks the type definitions of a document. Type-level directives are visited before the fields.
pub fn visit<'a, V: Visitor<'a>>(v: &mut V, ctx: &mut VisitorContext<'a>, doc: &'a ServiceDocument) {
    for definition in &doc.definitions {
        let TypeSystemDefinition::Type(ty) = definition else {
            continue;
        };

        for directive in &ty.node.directives {
            v.enter_directive(ctx, directive, ty, None);
        }

        if let TypeKind::Object(object) = &ty.node.kind {
            for field in &object.fields {
                for directive in &field.node.directives {
                    v.enter_directive(ctx, directive, ty, Some(field));
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub(crate) locations: Vec<Pos>,
    pub(crate) message: String,
}

impl RuleError {
    pub(crate) fn new(locations: Vec<Pos>, msg: impl Into<String>) -> Self {
        Self {
            locations,
            message: msg.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn locations(&self) -> &[Pos] {
        &self.locations
    }
}

impl Display for RuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (idx, loc) in self.locations.iter().enumerate() {
            if idx == 0 {
                write!(f, "[")?;
            } else {
                write!(f, ", ")?;
            }

            write!(f, "{}:{}", loc.line, loc.column)?;

            if idx == self.locations.len() - 1 {
                write!(f, "] ")?;
            }
        }

        write!(f, "{}", self.message)?;
        Ok(())
    }
}
