use std::sync::Arc;

use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

/// Best-effort audit trail.
///
/// Recording never fails the caller's operation: a failed insert is logged
/// and dropped.
#[derive(Clone)]
pub struct AuditLog {
    executor: Arc<dyn Execute>,
}

impl AuditLog {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    /// Returns whether the entry was stored
    pub async fn record(
        &self,
        operation: &str,
        entity_type: &str,
        entity_id: Option<i32>,
        user_id: Option<i32>,
        details: Option<serde_json::Value>,
    ) -> bool {
        let statement = Statement::new(
            "INSERT INTO audit_logs (operation, entity_type, entity_id, user_id, details)
             VALUES (%s, %s, %s, %s, %s)",
            vec![
                operation.into(),
                entity_type.into(),
                entity_id.into(),
                user_id.into(),
                details.map_or(Value::Null, Value::Json),
            ],
        );

        match self.executor.execute(&statement).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    operation,
                    entity_type,
                    entity_id,
                    error = %e,
                    "failed to record audit entry"
                );
                false
            }
        }
    }
}
