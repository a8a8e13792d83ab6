use ticketdb_core::{Statement, Value};

/// SET clause for a partial UPDATE; only supplied columns are assigned
#[derive(Debug, Default)]
pub(crate) struct Assignments {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Assignments {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.clauses.push(format!("{} = %s", column));
            self.params.push(value.into());
        }
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Build `UPDATE table SET ... WHERE filter [RETURNING ...]`.
    ///
    /// `touch` columns are set to `CURRENT_TIMESTAMP`; they do not count as
    /// supplied columns for [`is_empty`](Self::is_empty).
    pub(crate) fn into_statement(
        self,
        table: &str,
        touch: &[&str],
        filter: &str,
        filter_params: Vec<Value>,
        returning: Option<&str>,
    ) -> Statement {
        let mut clauses = self.clauses;
        clauses.extend(touch.iter().map(|c| format!("{} = CURRENT_TIMESTAMP", c)));

        let mut sql = format!("UPDATE {} SET {} WHERE {}", table, clauses.join(", "), filter);
        if let Some(returning) = returning {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }

        let mut params = self.params;
        params.extend(filter_params);
        Statement::new(sql, params)
    }
}
