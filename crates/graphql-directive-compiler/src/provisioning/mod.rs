//! The backing resources a compilation provisions.

mod stack;
mod table;

pub use stack::{DataSource, DataSourceKind, Stack, SQL_LAMBDA_DATA_SOURCE, SQL_LAMBDA_FUNCTION, SQL_STACK_NAME};
pub use table::{
    table_resource_id, GlobalSecondaryIndex, LocalSecondaryIndex, ProjectionType, RawTableResource, Table, TableKey,
};

pub const READ_IOPS_PARAMETER: &str = "DynamoDBModelTableReadIOPS";
pub const WRITE_IOPS_PARAMETER: &str = "DynamoDBModelTableWriteIOPS";
pub const PAY_PER_REQUEST_CONDITION: &str = "ShouldUsePayPerRequestBilling";

/// Where generated tables and data sources are registered.
///
/// Implementations hand out [`Table`]s, whose mutating methods keep the raw resource in sync with the managed view.
/// Callers never touch the raw resource themselves.
pub trait ProvisioningContext {
    fn add_table(&mut self, table: Table);

    /// Looks a table up by its resource id, such as `PostTable`.
    fn table(&self, resource_id: &str) -> Option<&Table>;

    fn table_mut(&mut self, resource_id: &str) -> Option<&mut Table>;

    fn add_data_source(&mut self, data_source: DataSource);

    fn data_source(&self, name: &str) -> Option<&DataSource>;
}
