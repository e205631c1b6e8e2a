use std::{future::Future, sync::Arc};

use crate::{
    query::{DeleteBuilder, InsertBuilder, SelectBuilder},
    Driver, Filter, Result, Row, TableInfo, Value,
};

#[derive(Clone)]
pub struct Connection {
    driver: Arc<dyn Driver>,
}

impl Connection {
    /// # Open connect
    ///
    /// Sqlite example:
    ///     - `connect("sqlite://memory")`
    ///     - `connect("sqlite:///tmp/db.sqlite")`
    pub async fn connect(url: &str) -> Result<Self> {
        #[cfg(feature = "sqlite")]
        if let Some(path) = url.strip_prefix("sqlite://") {
            let builder = if path == "memory" {
                crate::sqlite::Builder::memory()
            } else {
                crate::sqlite::Builder::file(path)
            };

            return builder.connect();
        }

        Err(xrepo_error::connection!("Unsupported url `{}`", url))
    }

    /// Wrap a custom driver
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub async fn init_table(&self, info: &TableInfo) -> Result<()> {
        self.driver.init_table(info).await
    }

    /// Insert one row, returns its insert id
    pub async fn insert(&self, table: &str, pairs: Vec<(&'static str, Value)>) -> Result<u64> {
        self.insert_batch(table, vec![pairs], 1)
            .await?
            .into_iter()
            .next()
            .ok_or(xrepo_error::database!("Insert into `{}` returned no id", table))
    }

    /// Insert rows in one atomic round trip
    ///
    /// Consecutive rows sharing a column list are grouped into statements of at most
    /// `batch_size` rows.
    pub async fn insert_batch(
        &self,
        table: &str,
        rows: Vec<Vec<(&'static str, Value)>>,
        batch_size: usize,
    ) -> Result<Vec<u64>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = batch_size.max(1);
        let mut groups = Vec::<(Vec<&'static str>, Vec<Vec<Value>>)>::new(); // (cols, params_list)
        for row in rows {
            let (cols, params): (Vec<_>, Vec<_>) = row.into_iter().unzip();

            // Check if columns same with last group
            if let Some((last_cols, params_list)) = groups.last_mut() {
                if last_cols == &cols && params_list.len() < batch_size {
                    params_list.push(params);
                    continue;
                }
            }

            groups.push((cols, vec![params]));
        }

        let mut pairs = Vec::with_capacity(groups.len());
        for (cols, params_list) in groups {
            let sql = InsertBuilder::new(table).columns(&cols).build()?;
            pairs.push((sql, params_list));
        }

        self.driver.execute_many(pairs).await
    }

    /// Insert or update by `key`
    ///
    /// Rows without the key column are plain inserts. Returns the insert id, which is only
    /// meaningful when the row was inserted without a key.
    pub async fn save(
        &self,
        table: &str,
        key: &str,
        pairs: Vec<(&'static str, Value)>,
    ) -> Result<u64> {
        let has_key = pairs.iter().any(|(col, _)| *col == key);
        let (cols, params): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

        let mut builder = InsertBuilder::new(table);
        builder.columns(&cols);
        if has_key {
            builder.on_conflict_update(key);
        }
        let sql = builder.build()?;

        self.driver
            .execute_many(vec![(sql, vec![params])])
            .await?
            .into_iter()
            .next()
            .ok_or(xrepo_error::database!("Save into `{}` returned no id", table))
    }

    pub async fn delete(&self, table: &str, key: &str, id: Value) -> Result<()> {
        let sql = DeleteBuilder::new(table)
            .filter(&format!("{} = ?", key))
            .build()?;
        self.driver.execute_many(vec![(sql, vec![vec![id]])]).await?;

        Ok(())
    }

    /// First row whose `key` equals `id`, `Error::NotFound` if there is none
    pub async fn first(&self, table: &str, key: &str, id: Value) -> Result<Row> {
        let sql = SelectBuilder::new(table)
            .column("*")
            .filter(&format!("{} = ?", key))
            .order_by(key, true)
            .limit(1)
            .build()?;

        self.driver
            .query_many(&sql, vec![id.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                xrepo_error::not_found!("No row in `{}` where {} = {:?}", table, key, id)
            })
    }

    pub async fn find(&self, table: &str, filter: Option<&Filter>) -> Result<Vec<Row>> {
        let mut builder = SelectBuilder::new(table);
        builder.column("*");
        let params = Self::apply_filter(&mut builder, filter);

        self.driver.query_many(&builder.build()?, params).await
    }

    pub async fn count(&self, table: &str, filter: Option<&Filter>) -> Result<u64> {
        let mut builder = SelectBuilder::new(table);
        builder.column("COUNT(*) AS total");
        let params = Self::apply_filter(&mut builder, filter);

        let rows = self.driver.query_many(&builder.build()?, params).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(xrepo_error::database!("Count on `{}` returned no rows", table))?;

        row.get("total")
    }

    /// Run `f` inside a transaction
    ///
    /// `f` receives a connection bound to the transaction. The transaction commits if `f`
    /// returns `Ok`, otherwise it rolls back and the error of `f` is returned. Calling this on
    /// a transactional connection opens a nested scope.
    pub async fn transaction<T, E, F, Fut>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<xrepo_error::Error>,
    {
        log::debug!("Begin transaction");
        let tx = self.driver.begin().await?;
        let conn = Connection::new(tx.session());

        match f(conn).await {
            Ok(v) => {
                log::debug!("Commit transaction");
                tx.commit().await?;
                Ok(v)
            }
            Err(e) => {
                log::debug!("Rollback transaction");
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!("Rollback transaction error: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    fn apply_filter(builder: &mut SelectBuilder, filter: Option<&Filter>) -> Vec<Value> {
        match filter {
            Some(filter) => {
                builder.filter(filter.predicate());
                filter.params().to_vec()
            }
            None => vec![],
        }
    }
}
