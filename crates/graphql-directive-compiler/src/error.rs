use std::fmt;

use itertools::Itertools;

use crate::rules::visitor::RuleError;

/// Every way a compilation can fail. Each of them aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parser(#[from] async_graphql_parser::Error),
    #[error("{}", format_rule_errors(.0))]
    Validation(Vec<RuleError>),
    #[error(transparent)]
    UnsupportedDirective(#[from] UnsupportedDirectiveError),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn format_rule_errors(errors: &[RuleError]) -> String {
    errors.iter().map(ToString::to_string).join("\n")
}

/// Directives that a relational model, or the `Query` type of a schema with relational models, may not carry.
pub const UNSUPPORTED_SQL_DIRECTIVES: [&str; 6] = ["searchable", "predictions", "function", "manyToMany", "http", "mapsTo"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedDirectiveError {
    pub directive: String,
    pub type_name: String,
    pub field_name: Option<String>,
}

impl fmt::Display for UnsupportedDirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self
            .field_name
            .as_ref()
            .map(|field| format!("and field \"{field}\""))
            .unwrap_or_default();

        write!(
            f,
            "@{} directive on type \"{}\" {field} is not supported on a SQL datasource. \
             Following directives are not supported on a SQL datasource: {}",
            self.directive,
            self.type_name,
            UNSUPPORTED_SQL_DIRECTIVES.join(", ")
        )
    }
}

impl std::error::Error for UnsupportedDirectiveError {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Table not found in stack with table name {table}")]
    TableNotFound { table: String },
    #[error("Could not find datasource with name {name} in context.")]
    DataSourceNotFound { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("Expected name while updating index resolvers.")]
    MissingIndexName,
    #[error("Expected name and queryField to be defined while generating resolver.")]
    MissingQueryField,
    #[error("Unknown database type {0}")]
    UnknownDatabaseType(String),
    #[error("No datasource found for model {0}")]
    NoDatasourceForModel(String),
    #[error("A resolver for {type_name}.{field_name} already exists.")]
    DuplicateResolver { type_name: String, field_name: String },
    #[error("No SQL data source strategy is configured for {type_name}.{field_name}")]
    NoDatasourceForCustomSql { type_name: String, field_name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// The mutation a composite key check is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum KeyOperation {
    Create,
    Update,
}

impl KeyOperation {
    pub fn gerund(self) -> &'static str {
        match self {
            KeyOperation::Create => "creating",
            KeyOperation::Update => "updating",
        }
    }
}

/// Errors raised at request time by the generated templates.
///
/// They never abort a compilation: their `Display` output is embedded into `$util.error(...)`
/// calls. Template variables such as `$keyFieldName` are left for the template engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateArgumentError {
    #[error(
        "When {} any part of the composite sort key for @index '{index}', you must provide all fields for the key. Missing key: '$keyFieldName'.",
        .operation.gerund()
    )]
    PartialCompositeKey { operation: KeyOperation, index: String },
    #[error("sortDirection is not supported for List operations without a Sort key defined.")]
    SortDirectionWithoutSortKey,
    #[error("When providing argument 'sortDirection' you must also provide argument '{key}'.")]
    SortDirectionWithoutPartitionKey { key: String },
    #[error("When providing argument '{key}' you must also provide arguments {previous}")]
    KeyArgumentWithoutPrevious { key: String, previous: String },
}

impl TemplateArgumentError {
    /// The error type reported by `$util.error`.
    pub const ERROR_TYPE: &'static str = "InvalidArgumentsError";

    /// A `$util.error(...)` call raising this error.
    pub fn to_template_call(&self, with_type: bool) -> String {
        if with_type {
            format!("$util.error(\"{self}\", \"{}\")", Self::ERROR_TYPE)
        } else {
            format!("$util.error(\"{self}\")")
        }
    }
}
