use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::{CustomField, CustomFieldValue};
use crate::update::Assignments;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomField {
    pub field_name: String,
    pub field_type: String,
    pub field_options: Option<serde_json::Value>,
    pub is_required: bool,
    pub validation_rules: Option<serde_json::Value>,
    pub help_text: Option<String>,
    pub depends_on: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldUpdate {
    pub field_name: Option<String>,
    pub field_type: Option<String>,
    pub field_options: Option<serde_json::Value>,
    pub is_required: Option<bool>,
}

/// Custom field definitions and their per-ticket values
#[derive(Clone)]
pub struct CustomFieldModel {
    executor: Arc<dyn Execute>,
}

impl CustomFieldModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    pub async fn create(&self, field: NewCustomField) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO custom_fields (
                field_name, field_type, field_options, is_required,
                validation_rules, help_text, depends_on
             )
             VALUES (%s, %s, %s, %s, %s, %s, %s) RETURNING id",
            vec![
                field.field_name.into(),
                field.field_type.into(),
                field.field_options.into(),
                Value::Bool(field.is_required),
                field.validation_rules.into(),
                field.help_text.into(),
                field.depends_on.into(),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    pub async fn list(&self) -> ModelResult<Vec<CustomField>> {
        let statement = Statement::raw("SELECT * FROM custom_fields ORDER BY field_name");
        decode::all(self.executor.execute(&statement).await?)
    }

    pub async fn get(&self, id: i32) -> ModelResult<Option<CustomField>> {
        let statement = Statement::new(
            "SELECT * FROM custom_fields WHERE id = %s",
            vec![Value::Int32(id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Apply the supplied changes and return the updated field.
    ///
    /// `None` when nothing is supplied (no statement is issued) or no field
    /// has this id.
    pub async fn update(
        &self,
        id: i32,
        update: CustomFieldUpdate,
    ) -> ModelResult<Option<CustomField>> {
        let mut set = Assignments::new();
        set.set("field_name", update.field_name)
            .set("field_type", update.field_type)
            .set("field_options", update.field_options)
            .set("is_required", update.is_required);

        if set.is_empty() {
            return Ok(None);
        }

        let statement = set.into_statement(
            "custom_fields",
            &[],
            "id = %s",
            vec![Value::Int32(id)],
            Some("*"),
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Insert or replace a ticket's value for a field, returning the row id
    pub async fn save_value(
        &self,
        ticket_id: i32,
        field_id: i32,
        field_value: &str,
    ) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO ticket_custom_fields (ticket_id, field_id, field_value)
             VALUES (%s, %s, %s)
             ON CONFLICT (ticket_id, field_id)
             DO UPDATE SET field_value = EXCLUDED.field_value
             RETURNING id",
            vec![
                Value::Int32(ticket_id),
                Value::Int32(field_id),
                field_value.into(),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    pub async fn values_for_ticket(&self, ticket_id: i32) -> ModelResult<Vec<CustomFieldValue>> {
        let statement = Statement::new(
            "SELECT cf.field_name, cf.field_type, tcf.field_value
             FROM ticket_custom_fields tcf
             JOIN custom_fields cf ON tcf.field_id = cf.id
             WHERE tcf.ticket_id = %s
             ORDER BY cf.field_name",
            vec![Value::Int32(ticket_id)],
        );
        decode::all(self.executor.execute(&statement).await?)
    }
}
