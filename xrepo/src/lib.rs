//! Generic repository over a persistence session
//!
//! ```ignore
//! #[derive(Debug, Entity)]
//! #[xrepo(table_name = "user")]
//! struct User {
//!     #[xrepo(primary_key, auto_increment)]
//!     id: u32,
//!     name: String,
//! }
//!
//! let repo = Repository::<User>::new(Connection::connect("sqlite://memory").await?);
//! repo.init().await?;
//!
//! let mut user = User { id: 0, name: "John Doe".into() };
//! repo.create(&mut user).await?;
//!
//! let found = repo.find_by_condition(filter!("name LIKE ?", "%John%")).await?;
//! ```

mod batch;
mod entity;
mod repository;

pub use async_trait::async_trait;
pub use xrepo_conn::{
    filter, query, ColumnInfo, ColumnType, Connection, Driver, Filter, FromValue, IndexInfo,
    IndexKeyInfo, Row, TableInfo, ToValue, TxDriver, Value,
};
pub use xrepo_error as error;
pub use xrepo_macro::Entity;

#[cfg(feature = "sqlite")]
pub use xrepo_conn::sqlite;

pub use batch::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use entity::Entity;
pub use repository::Repository;

/// Version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
