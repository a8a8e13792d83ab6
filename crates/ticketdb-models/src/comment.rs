use std::sync::Arc;

use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::{Comment, Role};

#[derive(Clone)]
pub struct CommentModel {
    executor: Arc<dyn Execute>,
}

impl CommentModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    pub async fn add(
        &self,
        ticket_id: i32,
        user_id: i32,
        content: &str,
        is_private: bool,
    ) -> ModelResult<i32> {
        let statement = Statement::new(
            "INSERT INTO comments (ticket_id, user_id, content, is_private)
             VALUES (%s, %s, %s, %s) RETURNING id",
            vec![
                Value::Int32(ticket_id),
                Value::Int32(user_id),
                content.into(),
                Value::Bool(is_private),
            ],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    /// A ticket's comments, newest first, with the author's email
    pub async fn for_ticket(&self, ticket_id: i32) -> ModelResult<Vec<Comment>> {
        let statement = Statement::new(
            "SELECT c.*, u.email AS user_email
             FROM comments c
             JOIN users u ON c.user_id = u.id
             WHERE c.ticket_id = %s
             ORDER BY c.created_at DESC, c.id DESC",
            vec![Value::Int32(ticket_id)],
        );
        decode::all(self.executor.execute(&statement).await?)
    }

    /// The comments a user with `role` may read; private comments are for staff
    pub async fn visible_to(&self, ticket_id: i32, role: Role) -> ModelResult<Vec<Comment>> {
        let comments = self.for_ticket(ticket_id).await?;
        Ok(visible(comments, role))
    }
}

pub(crate) fn visible(comments: Vec<Comment>, role: Role) -> Vec<Comment> {
    if role.is_staff() {
        return comments;
    }
    comments.into_iter().filter(|c| !c.is_private).collect()
}
