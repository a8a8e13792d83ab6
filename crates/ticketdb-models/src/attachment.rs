use std::path::Path;
use std::sync::Arc;

use ticketdb_connection::Execute;
use ticketdb_core::{Statement, Value};

use crate::decode;
use crate::error::{ModelError, ModelResult};
use crate::records::Attachment;

/// File extensions accepted for upload, lowercase and without the dot
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "doc", "docx", "png", "jpg", "jpeg"];

/// Largest accepted upload
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct AttachmentModel {
    executor: Arc<dyn Execute>,
}

impl AttachmentModel {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self { executor }
    }

    /// Store a file for a ticket, returning the attachment id.
    ///
    /// Files with an unlisted extension or larger than
    /// [`MAX_ATTACHMENT_BYTES`] are rejected before anything is sent.
    pub async fn save(&self, ticket_id: i32, file_name: &str, data: Vec<u8>) -> ModelResult<i32> {
        validate(file_name, data.len())?;

        let statement = Statement::new(
            "INSERT INTO attachments (ticket_id, file_name, file_data) VALUES (%s, %s, %s) RETURNING id",
            vec![Value::Int32(ticket_id), file_name.into(), Value::Bytes(data)],
        );
        decode::returned_id(self.executor.execute(&statement).await?)
    }

    pub async fn for_ticket(&self, ticket_id: i32) -> ModelResult<Vec<Attachment>> {
        let statement = Statement::new(
            "SELECT id, file_name, file_data, uploaded_at FROM attachments
             WHERE ticket_id = %s ORDER BY id",
            vec![Value::Int32(ticket_id)],
        );
        decode::all(self.executor.execute(&statement).await?)
    }
}

pub(crate) fn validate(file_name: &str, size: usize) -> ModelResult<()> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(ModelError::InvalidAttachment(format!(
                "'{}' is not an allowed file type",
                file_name
            )));
        }
    }

    if size > MAX_ATTACHMENT_BYTES {
        return Err(ModelError::InvalidAttachment(format!(
            "'{}' is {} bytes; the limit is {} bytes",
            file_name, size, MAX_ATTACHMENT_BYTES
        )));
    }
    Ok(())
}
