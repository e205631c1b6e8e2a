//! # Sqlite driver
//!
//! A single `rusqlite` connection shared behind a mutex, every statement runs on the tokio
//! blocking pool. An async gate serialises plain statements against open transactions, so
//! while a transaction is open, work on the parent connection waits for it to finish. Each
//! transaction has a gate of its own for nested scopes.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    task::spawn_blocking,
};
use xrepo_error::Result;

use crate::{ColumnType, Connection, Driver, IndexInfo, Row, TableInfo, TxDriver, Value};

type SharedConn = Arc<Mutex<rusqlite::Connection>>;

enum Target {
    Memory,
    File(PathBuf),
}

pub struct Builder {
    target: Target,
    busy_timeout: Option<Duration>,
}

impl Builder {
    pub fn memory() -> Self {
        Self {
            target: Target::Memory,
            busy_timeout: None,
        }
    }

    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            target: Target::File(path.as_ref().to_path_buf()),
            busy_timeout: None,
        }
    }

    /// How long a statement waits on a locked database file before failing
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<SqliteConnProxy> {
        let conn = match &self.target {
            Target::Memory => rusqlite::Connection::open_in_memory()
                .map_err(|e| xrepo_error::connection!("Sqlite open_in_memory error: {}", e))?,
            Target::File(path) => rusqlite::Connection::open(path).map_err(|e| {
                xrepo_error::connection!("Sqlite open `{}` error: {}", path.display(), e)
            })?,
        };

        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)
                .map_err(|e| xrepo_error::connection!("Sqlite set busy timeout error: {}", e))?;
        }

        Ok(SqliteConnProxy::new(conn))
    }

    pub fn connect(self) -> Result<Connection> {
        Ok(Connection::new(Arc::new(self.build()?)))
    }
}

#[derive(Clone)]
pub struct SqliteConnProxy {
    conn: SharedConn,
    gate: Arc<AsyncMutex<()>>,
}

impl SqliteConnProxy {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(AsyncMutex::new(())),
        }
    }
}

#[async_trait::async_trait]
impl Driver for SqliteConnProxy {
    async fn execute_many(&self, pairs: Vec<(String, Vec<Vec<Value>>)>) -> Result<Vec<u64>> {
        let _gate = self.gate.lock().await;
        run_blocking(&self.conn, move |conn| execute_pairs(conn, pairs)).await
    }

    async fn query_many(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        let _gate = self.gate.lock().await;
        run_blocking(&self.conn, move |conn| query_rows(conn, &sql, &params)).await
    }

    async fn init_table(&self, info: &TableInfo) -> Result<()> {
        let sqls = gen_init_sqls(info);
        let _gate = self.gate.lock().await;
        run_blocking(&self.conn, move |conn| execute_ddl(conn, sqls)).await
    }

    async fn begin(&self) -> Result<Box<dyn TxDriver>> {
        let gate = self.gate.clone().lock_owned().await;

        // The scope is built next to BEGIN, a cancelled caller drops it and rolls back
        let conn = self.conn.clone();
        let tx = run_blocking(&self.conn, move |c| {
            log::trace!("Start transaction");
            c.execute_batch("BEGIN")
                .map_err(|e| xrepo_error::database!("Start transaction error: {}", e))?;

            Ok(SqliteTxProxy::new(conn, gate, None, 0, None))
        })
        .await?;

        Ok(Box::new(tx))
    }
}

struct TxState {
    conn: SharedConn,
    gate: Mutex<Option<OwnedMutexGuard<()>>>, // Parent gate, held until the scope finishes
    child_gate: Arc<AsyncMutex<()>>,          // Taken by nested scopes
    savepoint: Option<String>,                // None is the outermost scope
    depth: usize,
    parent: Option<Arc<TxState>>,
    finished: AtomicBool,
}

impl TxState {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
            || self.parent.as_ref().map_or(false, |p| p.is_finished())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_finished() {
            return Err(xrepo_error::connection!("Transaction already finished"));
        }

        Ok(())
    }

    fn finish_sql(&self, commit: bool) -> String {
        match (&self.savepoint, commit) {
            (None, true) => "COMMIT".into(),
            (None, false) => "ROLLBACK".into(),
            (Some(sp), true) => format!("RELEASE SAVEPOINT {}", sp),
            (Some(sp), false) => {
                format!("ROLLBACK TO SAVEPOINT {sp}; RELEASE SAVEPOINT {sp}", sp = sp)
            }
        }
    }

    /// Commit or roll back the scope, `conn` must be locked by the caller
    fn close(&self, conn: &rusqlite::Connection, commit: bool) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(xrepo_error::connection!("Transaction already finished"));
        }

        let res = if self.parent.as_ref().map_or(false, |p| p.is_finished()) {
            Err(xrepo_error::connection!("Parent transaction already finished"))
        } else {
            let sql = self.finish_sql(commit);
            log::trace!("Execute `{}`", sql);
            let res = conn.execute_batch(&sql).map_err(|e| {
                xrepo_error::database!("Finish transaction error: {}, sql: `{}`", e, sql)
            });

            // A failed commit must not leave the scope open
            if res.is_err() && commit {
                if let Err(e) = conn.execute_batch(&self.finish_sql(false)) {
                    log::error!("Rollback after failed commit error: {}", e);
                }
            }

            res
        };

        if let Ok(mut gate) = self.gate.lock() {
            gate.take();
        }

        res
    }
}

impl Drop for TxState {
    fn drop(&mut self) {
        if self.is_finished() {
            return;
        }

        log::warn!(
            "Transaction dropped before finishing, execute `{}`",
            self.finish_sql(false)
        );
        match self.conn.lock() {
            Ok(conn) => {
                if let Err(e) = self.close(&conn, false) {
                    log::error!("Rollback dropped transaction error: {}", e);
                }
            }
            Err(e) => log::error!("SqliteTxProxy lock error: {}", e),
        }
    }
}

#[derive(Clone)]
pub struct SqliteTxProxy {
    state: Arc<TxState>,
}

impl SqliteTxProxy {
    fn new(
        conn: SharedConn,
        gate: OwnedMutexGuard<()>,
        savepoint: Option<String>,
        depth: usize,
        parent: Option<Arc<TxState>>,
    ) -> Self {
        Self {
            state: Arc::new(TxState {
                conn,
                gate: Mutex::new(Some(gate)),
                child_gate: Arc::new(AsyncMutex::new(())),
                savepoint,
                depth,
                parent,
                finished: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Driver for SqliteTxProxy {
    async fn execute_many(&self, pairs: Vec<(String, Vec<Vec<Value>>)>) -> Result<Vec<u64>> {
        let _gate = self.state.child_gate.lock().await;
        run_scoped(&self.state, move |state, conn| {
            state.ensure_active()?;
            execute_pairs(conn, pairs)
        })
        .await
    }

    async fn query_many(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        let _gate = self.state.child_gate.lock().await;
        run_scoped(&self.state, move |state, conn| {
            state.ensure_active()?;
            query_rows(conn, &sql, &params)
        })
        .await
    }

    async fn init_table(&self, info: &TableInfo) -> Result<()> {
        let sqls = gen_init_sqls(info);
        let _gate = self.state.child_gate.lock().await;
        run_scoped(&self.state, move |state, conn| {
            state.ensure_active()?;
            execute_ddl(conn, sqls)
        })
        .await
    }

    async fn begin(&self) -> Result<Box<dyn TxDriver>> {
        let gate = self.state.child_gate.clone().lock_owned().await;

        let tx = run_scoped(&self.state, move |state, conn| {
            state.ensure_active()?;

            let depth = state.depth + 1;
            let name = format!("xrepo_sp_{}", depth);
            let sql = format!("SAVEPOINT {}", name);
            log::trace!("Execute `{}`", sql);
            conn.execute_batch(&sql)
                .map_err(|e| xrepo_error::database!("Start savepoint error: {}", e))?;

            Ok(SqliteTxProxy::new(
                state.conn.clone(),
                gate,
                Some(name),
                depth,
                Some(state.clone()),
            ))
        })
        .await?;

        Ok(Box::new(tx))
    }
}

#[async_trait::async_trait]
impl TxDriver for SqliteTxProxy {
    fn session(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    async fn commit(&self) -> Result<()> {
        run_scoped(&self.state, |state, conn| state.close(conn, true)).await
    }

    async fn rollback(&self) -> Result<()> {
        run_scoped(&self.state, |state, conn| state.close(conn, false)).await
    }
}

/// Run `f` on the blocking pool with the connection of `state` locked
///
/// The scope handle is released after the lock, its last drop rolls back and locks again.
async fn run_scoped<T, F>(state: &Arc<TxState>, f: F) -> Result<T>
where
    F: FnOnce(&Arc<TxState>, &mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    spawn_blocking(move || {
        let res = match state.conn.lock() {
            Ok(mut conn) => f(&state, &mut *conn),
            Err(e) => Err(xrepo_error::connection!("SqliteTxProxy lock error: {}", e)),
        };
        drop(state);

        res
    })
    .await
    .map_err(|e| xrepo_error::runtime!("Tokio join error: {}", e))?
}

async fn run_blocking<T, F>(conn: &SharedConn, f: F) -> Result<T>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = conn.clone();
    spawn_blocking(move || {
        let mut conn = conn
            .lock()
            .map_err(|e| xrepo_error::connection!("SqliteConnProxy lock error: {}", e))?;

        f(&mut conn)
    })
    .await
    .map_err(|e| xrepo_error::runtime!("Tokio join error: {}", e))?
}

/// Savepoint works both outside and inside an explicit transaction
fn execute_pairs(
    conn: &mut rusqlite::Connection,
    pairs: Vec<(String, Vec<Vec<Value>>)>,
) -> Result<Vec<u64>> {
    let sp = conn
        .savepoint()
        .map_err(|e| xrepo_error::database!("Start savepoint error: {}", e))?;

    let mut ids = Vec::<u64>::new();
    for (sql, params_list) in pairs {
        log::trace!("Prepare execute many `{}`", sql);
        let mut stmt = sp
            .prepare(&sql)
            .map_err(|e| xrepo_error::database!("Prepare error: {}, sql: `{}`", e, sql))?;

        for params in params_list {
            log::trace!("Execute {:?}", params);

            stmt.execute(&value_to_rusqlite_param(&params)[..])
                .map_err(|e| xrepo_error::database!("Execute error: {}", e))?;

            // Insert id
            ids.push(sp.last_insert_rowid() as u64);
        }
    }

    log::trace!("Release savepoint");
    sp.commit()
        .map_err(|e| xrepo_error::database!("Release savepoint error: {}", e))?;

    Ok(ids)
}

fn query_rows(conn: &mut rusqlite::Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    log::trace!("Prepare query many `{}`", sql);
    let mut stmt = conn.prepare(sql).map_err(|e| {
        xrepo_error::database!("Prepare query many error: {}, sql: `{}`", e, sql)
    })?;

    log::trace!("Query many {:?}", params);
    let mut sql_rows = stmt
        .query(&value_to_rusqlite_param(params)[..])
        .map_err(|e| xrepo_error::database!("Query error: {}", e))?;

    let mut rows = Vec::<Row>::new();
    while let Some(row) = sql_rows
        .next()
        .map_err(|e| xrepo_error::database!("Fetch row error: {}", e))?
    {
        let row = rusqlite_row_to_row(row)?;
        log::trace!("Append row: {:?}", row);
        rows.push(row);
    }

    Ok(rows)
}

fn execute_ddl(conn: &mut rusqlite::Connection, sqls: Vec<String>) -> Result<()> {
    for sql in sqls {
        log::trace!("Execute `{}`", sql);
        conn.execute(&sql, [])
            .map_err(|e| xrepo_error::database!("Create table error: {}, sql: `{}`", e, sql))?;
    }

    Ok(())
}

fn value_to_rusqlite_param(params: &[Value]) -> Vec<&'_ dyn rusqlite::ToSql> {
    params.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
}

fn rusqlite_row_to_row(src: &rusqlite::Row<'_>) -> Result<Row> {
    use rusqlite::types::ValueRef;

    let stmt = src.as_ref();

    let mut values = HashMap::new();
    for i in 0..stmt.column_count() {
        let column_name = stmt
            .column_name(i)
            .map_err(|e| xrepo_error::database!("Get column name error: {}", e))?
            .to_string();

        let value = match src
            .get_ref(i)
            .map_err(|e| xrepo_error::database!("Get column `{}` error: {}", column_name, e))?
        {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::I64(v),
            ValueRef::Real(v) => Value::F64(v),
            ValueRef::Text(v) => Value::Str(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
        };
        values.insert(column_name, value);
    }

    Ok(Row { values })
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match &self {
            Value::Null => <Option<u8> as rusqlite::ToSql>::to_sql(&None),
            Value::Bool(v) => <bool as rusqlite::ToSql>::to_sql(v),
            Value::U8(v) => <u8 as rusqlite::ToSql>::to_sql(v),
            Value::I8(v) => <i8 as rusqlite::ToSql>::to_sql(v),
            Value::U16(v) => <u16 as rusqlite::ToSql>::to_sql(v),
            Value::I16(v) => <i16 as rusqlite::ToSql>::to_sql(v),
            Value::U32(v) => <u32 as rusqlite::ToSql>::to_sql(v),
            Value::I32(v) => <i32 as rusqlite::ToSql>::to_sql(v),
            Value::U64(v) => <u64 as rusqlite::ToSql>::to_sql(v),
            Value::I64(v) => <i64 as rusqlite::ToSql>::to_sql(v),
            Value::F32(v) => <f32 as rusqlite::ToSql>::to_sql(v),
            Value::F64(v) => <f64 as rusqlite::ToSql>::to_sql(v),
            Value::Str(v) => <String as rusqlite::ToSql>::to_sql(v),
            Value::Bytes(v) => <Vec<u8> as rusqlite::ToSql>::to_sql(v),
        }
    }
}

fn gen_init_sqls(info: &TableInfo) -> Vec<String> {
    let mut sqls = vec![gen_create_table(info)];
    sqls.extend(
        info.indexes
            .iter()
            .map(|idx| gen_create_index(info.name, idx)),
    );

    sqls
}

fn gen_create_table(info: &TableInfo) -> String {
    let cols = info
        .columns
        .iter()
        .map(|col| {
            let parts = [
                col.name.to_string(),
                column_type_to_sqlite_type(&col.ty).to_string(),
                if col.is_primary_key {
                    "PRIMARY KEY".into()
                } else {
                    String::new()
                },
                if col.is_auto_increment {
                    "AUTOINCREMENT".into()
                } else {
                    String::new()
                },
                if col.is_not_null {
                    "NOT NULL".into()
                } else {
                    String::new()
                },
                col.default
                    .map(|def| format!("DEFAULT {}", def))
                    .unwrap_or_default(),
                if col.is_unique {
                    "UNIQUE".into()
                } else {
                    String::new()
                },
            ];

            parts
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>();

    format!(
        "CREATE TABLE IF NOT EXISTS {table_name} ({cols})",
        table_name = info.name,
        cols = cols.join(", ")
    )
}

fn gen_create_index(table_name: &str, index_info: &IndexInfo) -> String {
    let cols = index_info
        .keys
        .iter()
        .map(|k| k.column_name)
        .collect::<Vec<_>>();

    format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {table_name} ({cols})",
        index_name = index_info.name,
        table_name = table_name,
        cols = cols.join(", ")
    )
}

fn column_type_to_sqlite_type(col: &ColumnType) -> &'static str {
    match col {
        ColumnType::Bool
        | ColumnType::I8
        | ColumnType::U8
        | ColumnType::I16
        | ColumnType::U16
        | ColumnType::I32
        | ColumnType::U32
        | ColumnType::I64
        | ColumnType::U64 => "INTEGER",
        ColumnType::F32 | ColumnType::F64 => "REAL",
        ColumnType::Str(_) => "TEXT",
        ColumnType::Bytes(_) => "BLOB",
    }
}
