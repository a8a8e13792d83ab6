use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::Macro;
use crate::update::Assignments;

const MACRO_COLUMNS: &str = "id, name, actions, description, created_at, updated_at";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroUpdate {
    pub name: Option<String>,
    pub actions: Option<serde_json::Value>,
    pub description: Option<String>,
}

/// Per-user macros; every lookup is scoped to the owning user
#[derive(Clone)]
pub struct MacroModel {
    executor: Arc<dyn Execute>,
}

impl MacroModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        name: &str,
        user_id: i32,
        actions: serde_json::Value,
        description: Option<&str>,
    ) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO macros (name, user_id, actions, description)
             VALUES (%s, %s, %s, %s) RETURNING id",
            vec![
                name.into(),
                Value::Int32(user_id),
                Value::Json(actions),
                description.into(),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    pub async fn list_for_user(&self, user_id: i32) -> ModelResult<Vec<Macro>> {
        let statement = Statement::new(
            format!(
                "SELECT {} FROM macros WHERE user_id = %s ORDER BY name",
                MACRO_COLUMNS
            ),
            vec![Value::Int32(user_id)],
        );
        decode::all(self.executor.execute(&statement).await?)
    }

    pub async fn get(&self, id: i32, user_id: i32) -> ModelResult<Option<Macro>> {
        let statement = Statement::new(
            format!(
                "SELECT {} FROM macros WHERE id = %s AND user_id = %s",
                MACRO_COLUMNS
            ),
            vec![Value::Int32(id), Value::Int32(user_id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Apply the supplied changes and bump `updated_at`
    pub async fn update(
        &self,
        id: i32,
        user_id: i32,
        update: MacroUpdate,
    ) -> ModelResult<Option<Macro>> {
        let mut set = Assignments::new();
        set.set("name", update.name)
            .set("actions", update.actions.map(Value::Json))
            .set("description", update.description);

        if set.is_empty() {
            return Ok(None);
        }

        let statement = set.into_statement(
            "macros",
            &["updated_at"],
            "id = %s AND user_id = %s",
            vec![Value::Int32(id), Value::Int32(user_id)],
            Some(MACRO_COLUMNS),
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Whether a macro was deleted
    pub async fn delete(&self, id: i32, user_id: i32) -> ModelResult<bool> {
        let statement = Statement::new(
            "DELETE FROM macros WHERE id = %s AND user_id = %s RETURNING id",
            vec![Value::Int32(id), Value::Int32(user_id)],
        );
        Ok(decode::any_returned(&self.executor.execute(&statement).await?))
    }
}
