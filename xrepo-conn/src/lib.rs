//! Persistence session used by `xrepo` repositories
//!
//! A [`Connection`] is a cheap handle over a [`Driver`]. Drivers execute plain SQL text with
//! positional parameters; the connection turns table level requests (insert, upsert, lookup,
//! conditional find and count) into that text.

mod connection;
mod drivers;
mod filter;
mod info;
pub mod query;
mod value;

use std::{collections::HashMap, sync::Arc};

pub use connection::Connection;
pub use filter::Filter;
pub use info::{ColumnInfo, ColumnType, IndexInfo, IndexKeyInfo, TableInfo};
pub use value::{FromValue, ToValue, Value};

#[cfg(feature = "sqlite")]
pub use drivers::sqlite;

use xrepo_error::Result;

#[async_trait::async_trait]
pub trait Driver: Sync + Send {
    /// Run every `(sql, params_list)` pair atomically, returns the insert id of each executed row
    async fn execute_many(&self, pairs: Vec<(String, Vec<Vec<Value>>)>) -> Result<Vec<u64>>;
    async fn query_many(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>>;
    async fn init_table(&self, info: &TableInfo) -> Result<()>;
    /// Open a transaction scope
    async fn begin(&self) -> Result<Box<dyn TxDriver>>;
}

/// Handle of an open transaction scope
#[async_trait::async_trait]
pub trait TxDriver: Sync + Send {
    /// Driver whose statements run inside this scope
    fn session(&self) -> Arc<dyn Driver>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Row {
    pub(crate) values: HashMap<String, Value>,
}

impl Row {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get<T: FromValue<Output = T>>(&self, index: &str) -> Result<T> {
        if let Some(v) = self.values.get(index) {
            Ok(T::from_value(v)?)
        } else {
            Err(xrepo_error::out_of_range!(
                "Column `{}` not found, values length: {}",
                index,
                self.values.len()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get() {
        let row = Row::new([("id", Value::I64(3)), ("name", Value::Null)]);

        assert_eq!(row.get::<u32>("id").unwrap(), 3);
        assert_eq!(row.get::<Option<String>>("name").unwrap(), None);
        assert!(matches!(
            row.get::<u32>("email"),
            Err(xrepo_error::Error::OutOfRange(_))
        ));
    }
}
