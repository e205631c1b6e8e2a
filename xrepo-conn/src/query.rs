//! SQL text builders
//!
//! Values never appear in the generated text, every value is a `?` placeholder bound by the driver.

use xrepo_error::Result;

#[derive(Debug, Default)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    conflict_key: Option<String>,
}

impl InsertBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Set columns, each one gets a placeholder
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::query::InsertBuilder;
    ///
    /// let sql = InsertBuilder::new("ta")
    ///     .columns(&["a", "b", "c"])
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(&sql, "INSERT INTO ta (a, b, c) VALUES (?, ?, ?)");
    ///
    /// let sql = InsertBuilder::new("ta").build().unwrap();
    ///
    /// assert_eq!(&sql, "INSERT INTO ta DEFAULT VALUES");
    /// ```
    pub fn columns(&mut self, cols: &[&str]) -> &mut Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect::<Vec<String>>();
        self
    }

    /// Turn the insert into an upsert keyed by `key`
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::query::InsertBuilder;
    ///
    /// let sql = InsertBuilder::new("ta")
    ///     .columns(&["id", "a", "b"])
    ///     .on_conflict_update("id")
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     &sql,
    ///     "INSERT INTO ta (id, a, b) VALUES (?, ?, ?) ON CONFLICT (id) DO UPDATE SET a = excluded.a, b = excluded.b"
    /// );
    /// ```
    pub fn on_conflict_update(&mut self, key: &str) -> &mut Self {
        self.conflict_key = Some(key.into());
        self
    }

    /// Build sql
    pub fn build(&self) -> Result<String> {
        // Validate builder
        self.validate()?;

        let mut parts = Vec::<String>::new();

        // Build prefix
        parts.push(format!("INSERT INTO {}", self.table));

        if self.columns.is_empty() {
            parts.push("DEFAULT VALUES".into());
            return Ok(parts.join(" "));
        }

        // Build columns and placeholders
        parts.push(format!("({})", self.columns.join(", ")));
        parts.push("VALUES".into());
        parts.push(format!(
            "({})",
            self.columns
                .iter()
                .map(|_| "?")
                .collect::<Vec<_>>()
                .join(", ")
        ));

        // Build upsert
        if let Some(key) = &self.conflict_key {
            let sets = self
                .columns
                .iter()
                .filter(|col| *col != key)
                .map(|col| format!("{col} = excluded.{col}", col = col))
                .collect::<Vec<_>>();

            parts.push(format!("ON CONFLICT ({})", key));
            if sets.is_empty() {
                parts.push("DO NOTHING".into());
            } else {
                parts.push(format!("DO UPDATE SET {}", sets.join(", ")));
            }
        }

        Ok(parts.join(" "))
    }

    /// Validate builder
    fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(xrepo_error::query_builder!("Insert empty table name"));
        }

        if let Some(key) = &self.conflict_key {
            if !self.columns.contains(key) {
                return Err(xrepo_error::query_builder!(
                    "Conflict key `{}` is not an inserted column",
                    key
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    predicate: Option<String>,
    order_bys: Vec<(String, bool)>, // (column, is_asc)
    limit: Option<u64>,
}

impl SelectBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Append column
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::query::SelectBuilder;
    ///
    /// let sql = SelectBuilder::new("ta")
    ///     .column("a")
    ///     .column("b")
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(&sql, "SELECT a, b FROM ta");
    /// ```
    pub fn column(&mut self, col: &str) -> &mut Self {
        self.columns.push(col.into());
        self
    }

    /// Set where predicate, it is wrapped in parentheses
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::query::SelectBuilder;
    ///
    /// let sql = SelectBuilder::new("ta")
    ///     .column("*")
    ///     .filter("a > ? OR b < ?")
    ///     .order_by("a", false)
    ///     .limit(1)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(&sql, "SELECT * FROM ta WHERE (a > ? OR b < ?) ORDER BY a DESC LIMIT 1");
    /// ```
    pub fn filter(&mut self, predicate: &str) -> &mut Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn order_by(&mut self, col: &str, is_asc: bool) -> &mut Self {
        self.order_bys.push((col.into(), is_asc));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Build sql
    pub fn build(&self) -> Result<String> {
        // Validate builder
        self.validate()?;

        let mut parts = Vec::<String>::new();

        // Build prefix
        parts.push(format!(
            "SELECT {} FROM {}",
            self.columns.join(", "),
            self.table
        ));

        // Build where
        if let Some(pred) = &self.predicate {
            parts.push(format!("WHERE ({})", pred));
        }

        // Build order by
        if !self.order_bys.is_empty() {
            parts.push(format!(
                "ORDER BY {}",
                self.order_bys
                    .iter()
                    .map(|(col, is_asc)| format!("{} {}", col, if *is_asc { "ASC" } else { "DESC" }))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        // Build limit
        if let Some(limit) = self.limit {
            parts.push(format!("LIMIT {}", limit));
        }

        Ok(parts.join(" "))
    }

    /// Validate builder
    fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(xrepo_error::query_builder!("Select empty table name"));
        }

        if self.columns.is_empty() {
            return Err(xrepo_error::query_builder!("Select empty columns"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DeleteBuilder {
    table: String,
    predicate: Option<String>,
}

impl DeleteBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Set where predicate, a delete without one is refused
    ///
    /// # Examples
    ///
    /// ```
    /// use xrepo_conn::query::DeleteBuilder;
    ///
    /// let sql = DeleteBuilder::new("ta").filter("id = ?").build().unwrap();
    ///
    /// assert_eq!(&sql, "DELETE FROM ta WHERE (id = ?)");
    ///
    /// assert!(DeleteBuilder::new("ta").build().is_err());
    /// ```
    pub fn filter(&mut self, predicate: &str) -> &mut Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Build sql
    pub fn build(&self) -> Result<String> {
        let pred = match &self.predicate {
            Some(pred) if !pred.trim().is_empty() => pred,
            _ => {
                return Err(xrepo_error::query_builder!(
                    "Delete from `{}` without where condition",
                    self.table
                ))
            }
        };

        Ok(format!("DELETE FROM {} WHERE ({})", self.table, pred))
    }
}
