use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::SavedFilter;
use crate::update::Assignments;

const FILTER_COLUMNS: &str = "id, name, filter_criteria, is_macro, created_at, updated_at";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedFilterUpdate {
    pub name: Option<String>,
    pub filter_criteria: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct SavedFilterModel {
    executor: Arc<dyn Execute>,
}

impl SavedFilterModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        name: &str,
        user_id: i32,
        filter_criteria: serde_json::Value,
        is_macro: bool,
    ) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO saved_filters (name, user_id, filter_criteria, is_macro)
             VALUES (%s, %s, %s, %s) RETURNING id",
            vec![
                name.into(),
                Value::Int32(user_id),
                Value::Json(filter_criteria),
                Value::Bool(is_macro),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    /// A user's filters; macro-flagged filters only when `include_macros`
    pub async fn list_for_user(
        &self,
        user_id: i32,
        include_macros: bool,
    ) -> ModelResult<Vec<SavedFilter>> {
        let statement = Statement::new(
            format!(
                "SELECT {} FROM saved_filters
                 WHERE user_id = %s AND (is_macro = %s OR %s = TRUE)
                 ORDER BY name",
                FILTER_COLUMNS
            ),
            vec![
                Value::Int32(user_id),
                Value::Bool(false),
                Value::Bool(include_macros),
            ],
        );
        decode::all(self.executor.execute(&statement).await?)
    }

    pub async fn get(&self, id: i32, user_id: i32) -> ModelResult<Option<SavedFilter>> {
        let statement = Statement::new(
            format!(
                "SELECT {} FROM saved_filters WHERE id = %s AND user_id = %s",
                FILTER_COLUMNS
            ),
            vec![Value::Int32(id), Value::Int32(user_id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    pub async fn update(
        &self,
        id: i32,
        user_id: i32,
        update: SavedFilterUpdate,
    ) -> ModelResult<Option<SavedFilter>> {
        let mut set = Assignments::new();
        set.set("name", update.name)
            .set("filter_criteria", update.filter_criteria.map(Value::Json));

        if set.is_empty() {
            return Ok(None);
        }

        let statement = set.into_statement(
            "saved_filters",
            &["updated_at"],
            "id = %s AND user_id = %s",
            vec![Value::Int32(id), Value::Int32(user_id)],
            Some(FILTER_COLUMNS),
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    pub async fn delete(&self, id: i32, user_id: i32) -> ModelResult<bool> {
        let statement = Statement::new(
            "DELETE FROM saved_filters WHERE id = %s AND user_id = %s RETURNING id",
            vec![Value::Int32(id), Value::Int32(user_id)],
        );
        Ok(decode::any_returned(&self.executor.execute(&statement).await?))
    }
}
