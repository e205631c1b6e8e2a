use crate::{error::Result, Row, TableInfo, ToValue, Value};

/// A record type stored in one table
///
/// Usually implemented with `#[derive(Entity)]`.
pub trait Entity: Sized + Send + Sync {
    type PrimaryKey: ToValue + Send;

    /// Table name
    const TABLE_NAME: &'static str;

    /// Primary key column name
    const PRIMARY_KEY: &'static str;

    /// Table layout, used to create the table
    const INFO: TableInfo;

    /// Convert database row to self
    fn from_row(row: Row) -> Result<Self>;

    /// Column and value pairs to write, an unset auto increment key is omitted
    fn to_pairs(&self) -> Vec<(&'static str, Value)>;

    fn primary_key(&self) -> Self::PrimaryKey;

    /// Store the key generated on insert, no-op unless the key is auto increment
    ///
    /// Fails with `OutOfRange` when `id` does not fit the key type.
    fn set_primary_key(&mut self, id: u64) -> Result<()>;
}
