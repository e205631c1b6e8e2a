//! Driver double that records calls instead of touching a database

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use xrepo::{error::Result, Driver, Row, TableInfo, TxDriver, Value};

type Pairs = Vec<(String, Vec<Vec<Value>>)>;

#[derive(Default)]
struct Inner {
    executes: Mutex<Vec<Pairs>>,
    events: Mutex<Vec<&'static str>>,
    fail_on: Option<usize>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct RecordingDriver {
    inner: Arc<Inner>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `call`-th `execute_many`, counting from 1
    pub fn failing_on(call: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                fail_on: Some(call),
                ..Default::default()
            }),
        }
    }

    pub fn failure_message(call: usize) -> String {
        format!("Injected failure on call {}", call)
    }

    /// Every `execute_many` call made so far, failed ones included
    pub fn executes(&self) -> Vec<Pairs> {
        self.inner.executes.lock().unwrap().clone()
    }

    /// Number of parameter rows per `execute_many` call
    pub fn rows_per_call(&self) -> Vec<usize> {
        self.executes()
            .iter()
            .map(|pairs| pairs.iter().map(|(_, list)| list.len()).sum())
            .collect()
    }

    /// Transaction events in order: `begin`, `commit`, `rollback`
    pub fn events(&self) -> Vec<&'static str> {
        self.inner.events.lock().unwrap().clone()
    }

    fn event(&self, name: &'static str) {
        self.inner.events.lock().unwrap().push(name);
    }
}

#[xrepo::async_trait]
impl Driver for RecordingDriver {
    async fn execute_many(&self, pairs: Vec<(String, Vec<Vec<Value>>)>) -> Result<Vec<u64>> {
        let rows = pairs.iter().map(|(_, list)| list.len()).sum::<usize>();
        let call = {
            let mut executes = self.inner.executes.lock().unwrap();
            executes.push(pairs);
            executes.len()
        };

        if self.inner.fail_on == Some(call) {
            return Err(xrepo::error::database!("{}", Self::failure_message(call)));
        }

        let first = self.inner.next_id.fetch_add(rows as u64, Ordering::SeqCst) + 1;
        Ok((first..first + rows as u64).collect())
    }

    async fn query_many(&self, _sql: &str, _params: Vec<Value>) -> Result<Vec<Row>> {
        Ok(vec![])
    }

    async fn init_table(&self, _info: &TableInfo) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn TxDriver>> {
        self.event("begin");
        Ok(Box::new(RecordingTx {
            driver: self.clone(),
        }))
    }
}

struct RecordingTx {
    driver: RecordingDriver,
}

#[xrepo::async_trait]
impl TxDriver for RecordingTx {
    fn session(&self) -> Arc<dyn Driver> {
        Arc::new(self.driver.clone())
    }

    async fn commit(&self) -> Result<()> {
        self.driver.event("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.driver.event("rollback");
        Ok(())
    }
}
