use std::{future::Future, marker::PhantomData};

use crate::{batch::effective_batch_size, error::Result, Connection, Entity, Filter, ToValue};

/// CRUD access to one entity type through one session
///
/// Every method forwards to the bound [`Connection`]; errors come back unchanged except a
/// missing row in [`find_by_id`](Self::find_by_id), which is `Ok(None)`.
pub struct Repository<E: Entity> {
    conn: Connection,
    _marker: PhantomData<E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.conn.clone())
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            _marker: PhantomData,
        }
    }

    /// The session this repository is bound to
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create table and indexes if they do not exist
    pub async fn init(&self) -> Result<()> {
        self.conn.init_table(&E::INFO).await
    }

    /// Insert one record, the generated key is written back
    pub async fn create(&self, entity: &mut E) -> Result<()> {
        let id = self.conn.insert(E::TABLE_NAME, entity.to_pairs()).await?;
        entity.set_primary_key(id)
    }

    /// Insert records in chunks of at most `batch_size`
    ///
    /// `batch_size` outside `1..=1000`, or `None`, means 1000. Chunks are inserted one
    /// after another, each in a single round trip. The first failing chunk stops the loop
    /// and its error is returned; chunks before it stay inserted. Generated keys are
    /// written back chunk by chunk.
    pub async fn create_batch(&self, entities: &mut [E], batch_size: Option<usize>) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let batch_size = effective_batch_size(batch_size);
        log::debug!(
            "Insert {} rows into `{}`, {} per chunk",
            entities.len(),
            E::TABLE_NAME,
            batch_size
        );

        for chunk in entities.chunks_mut(batch_size) {
            let rows = chunk.iter().map(|e| e.to_pairs()).collect::<Vec<_>>();
            let ids = self
                .conn
                .insert_batch(E::TABLE_NAME, rows, chunk.len())
                .await?;

            for (entity, id) in chunk.iter_mut().zip(ids) {
                entity.set_primary_key(id)?;
            }
        }

        Ok(())
    }

    /// Save every column of the record, inserting it if the key does not exist yet
    pub async fn update(&self, entity: &mut E) -> Result<()> {
        let pairs = entity.to_pairs();
        let has_key = pairs.iter().any(|(col, _)| *col == E::PRIMARY_KEY);

        let id = self.conn.save(E::TABLE_NAME, E::PRIMARY_KEY, pairs).await?;
        if !has_key {
            entity.set_primary_key(id)?;
        }

        Ok(())
    }

    pub async fn delete(&self, id: E::PrimaryKey) -> Result<()> {
        self.conn
            .delete(E::TABLE_NAME, E::PRIMARY_KEY, id.to_value())
            .await
    }

    pub async fn find_by_id(&self, id: E::PrimaryKey) -> Result<Option<E>> {
        match self
            .conn
            .first(E::TABLE_NAME, E::PRIMARY_KEY, id.to_value())
            .await
        {
            Ok(row) => Ok(Some(E::from_row(row)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn find_all(&self) -> Result<Vec<E>> {
        let rows = self.conn.find(E::TABLE_NAME, None).await?;

        rows.into_iter().map(E::from_row).collect()
    }

    pub async fn find_by_condition(&self, filter: Filter) -> Result<Vec<E>> {
        filter.validate()?;
        let rows = self.conn.find(E::TABLE_NAME, Some(&filter)).await?;

        rows.into_iter().map(E::from_row).collect()
    }

    pub async fn count_by_condition(&self, filter: Filter) -> Result<u64> {
        filter.validate()?;

        self.conn.count(E::TABLE_NAME, Some(&filter)).await
    }

    pub async fn exists_by_condition(&self, filter: Filter) -> Result<bool> {
        Ok(self.count_by_condition(filter).await? > 0)
    }

    /// Run `f` with a repository bound to a new transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back and returns the error otherwise. Dropping the
    /// returned future before it finishes rolls back as well.
    ///
    /// Use only the repository passed to `f` inside it. On SQLite the parent session waits
    /// until the transaction finishes, so calling `self` (or any repository sharing its
    /// connection) from within `f` never completes.
    ///
    /// ```ignore
    /// repo.transaction(|tx_repo| async move {
    ///     tx_repo.create(&mut user).await?;
    ///     tx_repo.update(&mut other).await?;
    ///     Ok::<_, xrepo::error::Error>(())
    /// })
    /// .await?;
    /// ```
    pub async fn transaction<T, TxErr, F, Fut>(&self, f: F) -> std::result::Result<T, TxErr>
    where
        F: FnOnce(Repository<E>) -> Fut,
        Fut: Future<Output = std::result::Result<T, TxErr>>,
        TxErr: From<crate::error::Error>,
    {
        self.conn
            .transaction(|conn| f(Repository::new(conn)))
            .await
    }
}
