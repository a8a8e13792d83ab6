//! Records returned by the models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketdb_core::{Row, Value};

use crate::decode::{self, FromRow};
use crate::error::{ModelError, ModelResult};

/// Account role; agents and admins see private comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(ModelError::UnexpectedResult(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::String(role.as_str().to_string())
    }
}

/// A user account; the password hash is never loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

impl FromRow for Account {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            email: decode::string(row, "email")?,
            role: decode::string(row, "role")?.parse()?,
            created_at: decode::timestamp(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: Option<String>,
    pub created_by: Option<i32>,
    pub assigned_to: Option<i32>,
    pub creator_email: Option<String>,
    pub assignee_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FromRow for Ticket {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            title: decode::string(row, "title")?,
            description: decode::string(row, "description")?,
            status: decode::string(row, "status")?,
            priority: decode::string(row, "priority")?,
            category: decode::opt_string(row, "category")?,
            created_by: decode::opt_id(row, "created_by")?,
            assigned_to: decode::opt_id(row, "assigned_to")?,
            creator_email: decode::opt_string(row, "creator_email")?,
            assignee_email: decode::opt_string(row, "assignee_email")?,
            created_at: decode::timestamp(row, "created_at")?,
            updated_at: decode::timestamp(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i32,
    pub ticket_id: i32,
    pub user_id: i32,
    pub content: String,
    pub is_private: bool,
    pub user_email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl FromRow for Comment {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            ticket_id: decode::id(row, "ticket_id")?,
            user_id: decode::id(row, "user_id")?,
            content: decode::string(row, "content")?,
            is_private: decode::flag(row, "is_private")?,
            user_email: decode::string(row, "user_email")?,
            created_at: decode::timestamp(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i32,
    pub file_name: String,
    pub data: Vec<u8>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl FromRow for Attachment {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            file_name: decode::string(row, "file_name")?,
            data: decode::bytes(row, "file_data")?,
            uploaded_at: decode::timestamp(row, "uploaded_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i32,
    pub field_name: String,
    pub field_type: String,
    pub field_options: serde_json::Value,
    pub is_required: bool,
    pub validation_rules: serde_json::Value,
    pub help_text: Option<String>,
    pub depends_on: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

impl FromRow for CustomField {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            field_name: decode::string(row, "field_name")?,
            field_type: decode::string(row, "field_type")?,
            field_options: decode::json(row, "field_options")?,
            is_required: decode::flag(row, "is_required")?,
            validation_rules: decode::json(row, "validation_rules")?,
            help_text: decode::opt_string(row, "help_text")?,
            depends_on: decode::opt_id(row, "depends_on")?,
            created_at: decode::timestamp(row, "created_at")?,
        })
    }
}

/// A custom field value attached to a ticket, with its field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub field_name: String,
    pub field_type: String,
    pub field_value: Option<String>,
}

impl FromRow for CustomFieldValue {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            field_name: decode::string(row, "field_name")?,
            field_type: decode::string(row, "field_type")?,
            field_value: decode::opt_string(row, "field_value")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub id: i32,
    pub name: String,
    pub actions: serde_json::Value,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FromRow for Macro {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            name: decode::string(row, "name")?,
            actions: decode::json(row, "actions")?,
            description: decode::opt_string(row, "description")?,
            created_at: decode::timestamp(row, "created_at")?,
            updated_at: decode::timestamp(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: i32,
    pub name: String,
    pub filter_criteria: serde_json::Value,
    pub is_macro: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FromRow for SavedFilter {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            id: decode::id(row, "id")?,
            name: decode::string(row, "name")?,
            filter_criteria: decode::json(row, "filter_criteria")?,
            is_macro: decode::flag(row, "is_macro")?,
            created_at: decode::timestamp(row, "created_at")?,
            updated_at: decode::timestamp(row, "updated_at")?,
        })
    }
}

/// Stored consent choices; `consents` holds the choices plus the time they
/// were given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    pub consents: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

impl FromRow for Consent {
    fn from_row(row: &Row) -> ModelResult<Self> {
        Ok(Self {
            consents: decode::json(row, "consents")?,
            created_at: decode::timestamp(row, "created_at")?,
        })
    }
}
