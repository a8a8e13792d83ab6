use std::sync::Arc;

use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::{Account, Role};

const ACCOUNT_COLUMNS: &str = "id, email, role, created_at";

/// User accounts.
///
/// Passwords are hashed by the caller; this model only stores and compares
/// the hash.
#[derive(Clone)]
pub struct AccountModel {
    executor: Arc<dyn Execute>,
}

impl AccountModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    /// Create an account, returning its id
    pub async fn create(&self, email: &str, password_hash: &str, role: Role) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO users (email, password_hash, role) VALUES (%s, %s, %s) RETURNING id",
            vec![email.into(), password_hash.into(), role.into()],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    /// The account matching both email and password hash, if any
    pub async fn find_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> ModelResult<Option<Account>> {
        let statement = Statement::new(
            format!(
                "SELECT {} FROM users WHERE email = %s AND password_hash = %s",
                ACCOUNT_COLUMNS
            ),
            vec![email.into(), password_hash.into()],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    pub async fn list(&self) -> ModelResult<Vec<Account>> {
        let statement = Statement::raw(format!(
            "SELECT {} FROM users ORDER BY id",
            ACCOUNT_COLUMNS
        ));
        decode::all(self.executor.execute(&statement).await?)
    }

    pub async fn get(&self, id: i32) -> ModelResult<Option<Account>> {
        let statement = Statement::new(
            format!("SELECT {} FROM users WHERE id = %s", ACCOUNT_COLUMNS),
            vec![Value::Int32(id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }
}
