use std::sync::Arc;

use chrono::Utc;
use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::ModelResult;
use crate::records::Consent;

/// Data-processing consent, one record per user
#[derive(Clone)]
pub struct ConsentModel {
    executor: Arc<dyn Execute>,
}

impl ConsentModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    /// Store a user's choices, replacing any earlier record.
    ///
    /// The stored document is `{"consents": .., "timestamp": ..}` so the
    /// time the choice was made travels with it.
    pub async fn save(
        &self,
        user_id: i32,
        consents: serde_json::Value,
        ip_address: Option<&str>,
    ) -> ModelResult<()> {
        let document = serde_json::json!({
            "consents": consents,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let statement = Statement::new(
            "INSERT INTO gdpr_consents (user_id, consents, ip_address)
             VALUES (%s, %s, %s)
             ON CONFLICT (user_id)
             DO UPDATE SET consents = EXCLUDED.consents,
                           ip_address = EXCLUDED.ip_address,
                           created_at = CURRENT_TIMESTAMP",
            vec![Value::Int32(user_id), Value::Json(document), ip_address.into()],
        );
        self.executor.execute(&statement).await?;
        Ok(())
    }

    pub async fn get(&self, user_id: i32) -> ModelResult<Option<Consent>> {
        let statement = Statement::new(
            "SELECT consents, created_at FROM gdpr_consents WHERE user_id = %s",
            vec![Value::Int32(user_id)],
        );
        decode::optional(self.executor.execute(&statement).await?)
    }

    /// Remove a user's consent record; true when one existed
    pub async fn withdraw(&self, user_id: i32) -> ModelResult<bool> {
        let statement = Statement::new(
            "DELETE FROM gdpr_consents WHERE user_id = %s",
            vec![Value::Int32(user_id)],
        );
        Ok(self.executor.execute(&statement).await?.row_count() > 0)
    }
}
