//! ticketdb models - data access for the ticket tracker
//!
//! Each model wraps an [`Execute`](ticketdb_connection::Execute)
//! implementation and issues parameterized statements only. Models never
//! touch the pool directly, so retries and reconnects are inherited from
//! the executor they are given.
//!
//! # Models
//!
//! - [`AccountModel`] - user accounts and credential lookup
//! - [`TicketModel`] - tickets joined with creator and assignee
//! - [`CommentModel`] - ticket comments, with private-comment visibility
//! - [`AttachmentModel`] - uploaded files with type and size checks
//! - [`CustomFieldModel`] - field definitions and per-ticket values
//! - [`MacroModel`] / [`SavedFilterModel`] - per-user macros and filters
//! - [`AuditLog`] - best-effort audit trail
//! - [`ConsentModel`] - data-processing consent records

mod account;
mod attachment;
mod audit;
mod comment;
mod consent;
mod custom_field;
mod decode;
mod error;
mod macros;
mod records;
mod saved_filter;
mod ticket;
mod update;

pub use account::AccountModel;
pub use attachment::{ALLOWED_EXTENSIONS, AttachmentModel, MAX_ATTACHMENT_BYTES};
pub use audit::AuditLog;
pub use comment::CommentModel;
pub use consent::ConsentModel;
pub use custom_field::{CustomFieldModel, CustomFieldUpdate, NewCustomField};
pub use decode::FromRow;
pub use error::{ModelError, ModelResult};
pub use macros::{MacroModel, MacroUpdate};
pub use records::{
    Account, Attachment, Comment, Consent, CustomField, CustomFieldValue, Macro, Role,
    SavedFilter, Ticket,
};
pub use saved_filter::{SavedFilterModel, SavedFilterUpdate};
pub use ticket::{NewTicket, TicketModel, TicketUpdate};
