use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::Ticket;
use crate::update::Assignments;

const TICKET_SELECT: &str = "SELECT t.*, u1.email AS creator_email, u2.email AS assignee_email
    FROM tickets t
    LEFT JOIN users u1 ON t.created_by = u1.id
    LEFT JOIN users u2 ON t.assigned_to = u2.id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: Option<String>,
    pub created_by: i32,
    pub assigned_to: Option<i32>,
}

/// Columns to change; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<i32>,
}

#[derive(Clone)]
pub struct TicketModel {
    executor: Arc<dyn Execute>,
}

impl TicketModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    pub async fn create(&self, ticket: NewTicket) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO tickets (title, description, status, priority, category, created_by, assigned_to)
             VALUES (%s, %s, %s, %s, %s, %s, %s) RETURNING id",
            vec![
                ticket.title.into(),
                ticket.description.into(),
                ticket.status.into(),
                ticket.priority.into(),
                ticket.category.into(),
                Value::Int32(ticket.created_by),
                ticket.assigned_to.into(),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    /// Every ticket, newest first, with creator and assignee emails
    pub async fn list(&self) -> ModelResult<Vec<Ticket>> {
        let statement = Statement::raw(format!(
            "{} ORDER BY t.created_at DESC, t.id DESC",
            TICKET_SELECT
        ));
        decode::all(self.executor.execute(&statement).await?)
    }

    pub async fn get(&self, id: i32) -> ModelResult<Option<Ticket>> {
        let statement = Statement::new(
            format!("{} WHERE t.id = %s", TICKET_SELECT),
            vec![Value::Int32(id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Apply the supplied changes and bump `updated_at`.
    ///
    /// Returns false without touching the database when nothing is
    /// supplied, or when no ticket has this id.
    pub async fn update(&self, id: i32, update: TicketUpdate) -> ModelResult<bool> {
        let mut set = Assignments::new();
        set.set("status", update.status)
            .set("priority", update.priority)
            .set("assigned_to", update.assigned_to);

        if set.is_empty() {
            return Ok(false);
        }

        let statement = set.into_statement(
            "tickets",
            &["updated_at"],
            "id = %s",
            vec![Value::Int32(id)],
            None,
        );
        let outcome = self.executor.execute(&statement).await?;
        Ok(outcome.row_count() > 0)
    }
}
