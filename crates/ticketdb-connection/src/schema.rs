//! Relations the ticket tracker needs
//!
//! Every statement is `CREATE TABLE IF NOT EXISTS`, so running the
//! initializer against an existing database changes nothing. Relations are
//! listed in dependency order: a table only references tables before it.

use ticketdb_core::{Result, Statement};

use crate::executor::Execute;

/// One relation and the statement that creates it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub ddl: &'static str,
}

const RELATIONS: &[Relation] = &[
    Relation {
        name: "users",
        ddl: "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash VARCHAR(255) NOT NULL,
            role VARCHAR(20) NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "tickets",
        ddl: "CREATE TABLE IF NOT EXISTS tickets (
            id SERIAL PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL,
            status VARCHAR(50) NOT NULL,
            priority VARCHAR(20) NOT NULL,
            category VARCHAR(50),
            created_by INTEGER REFERENCES users(id),
            assigned_to INTEGER REFERENCES users(id),
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "attachments",
        ddl: "CREATE TABLE IF NOT EXISTS attachments (
            id SERIAL PRIMARY KEY,
            ticket_id INTEGER REFERENCES tickets(id),
            file_name VARCHAR(255) NOT NULL,
            file_data BYTEA NOT NULL,
            uploaded_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "comments",
        ddl: "CREATE TABLE IF NOT EXISTS comments (
            id SERIAL PRIMARY KEY,
            ticket_id INTEGER REFERENCES tickets(id),
            user_id INTEGER REFERENCES users(id),
            content TEXT NOT NULL,
            is_private BOOLEAN DEFAULT FALSE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "custom_fields",
        ddl: "CREATE TABLE IF NOT EXISTS custom_fields (
            id SERIAL PRIMARY KEY,
            field_name VARCHAR(255) NOT NULL,
            field_type VARCHAR(50) NOT NULL,
            field_options JSONB,
            is_required BOOLEAN DEFAULT FALSE,
            validation_rules JSONB,
            help_text TEXT,
            depends_on INTEGER REFERENCES custom_fields(id),
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "ticket_custom_fields",
        ddl: "CREATE TABLE IF NOT EXISTS ticket_custom_fields (
            id SERIAL PRIMARY KEY,
            ticket_id INTEGER REFERENCES tickets(id),
            field_id INTEGER REFERENCES custom_fields(id),
            field_value TEXT,
            UNIQUE(ticket_id, field_id)
        )",
    },
    Relation {
        name: "macros",
        ddl: "CREATE TABLE IF NOT EXISTS macros (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            user_id INTEGER REFERENCES users(id),
            actions JSONB NOT NULL,
            description TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "saved_filters",
        ddl: "CREATE TABLE IF NOT EXISTS saved_filters (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            user_id INTEGER REFERENCES users(id),
            filter_criteria JSONB NOT NULL,
            is_macro BOOLEAN DEFAULT FALSE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "audit_logs",
        ddl: "CREATE TABLE IF NOT EXISTS audit_logs (
            id SERIAL PRIMARY KEY,
            operation VARCHAR(50) NOT NULL,
            entity_type VARCHAR(50) NOT NULL,
            entity_id INTEGER,
            user_id INTEGER REFERENCES users(id),
            details JSONB,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    },
    Relation {
        name: "gdpr_consents",
        ddl: "CREATE TABLE IF NOT EXISTS gdpr_consents (
            id SERIAL PRIMARY KEY,
            user_id INTEGER REFERENCES users(id),
            consents JSONB,
            ip_address VARCHAR(45),
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id)
        )",
    },
];

/// Creates any missing relation, in order
#[derive(Debug, Clone, Copy)]
pub struct SchemaInitializer {
    relations: &'static [Relation],
}

impl SchemaInitializer {
    pub fn new() -> Self {
        Self {
            relations: RELATIONS,
        }
    }

    pub fn relations(&self) -> &'static [Relation] {
        self.relations
    }

    /// Relation names in creation order
    pub fn relation_names(&self) -> impl Iterator<Item = &'static str> {
        self.relations.iter().map(|relation| relation.name)
    }

    /// Run every `CREATE TABLE IF NOT EXISTS` through `executor`.
    ///
    /// Stops at the first relation that cannot be created.
    pub async fn ensure_schema(&self, executor: &dyn Execute) -> Result<()> {
        for relation in self.relations {
            if let Err(err) = executor.execute(&Statement::raw(relation.ddl)).await {
                tracing::error!(relation = relation.name, error = %err, "failed to create relation");
                return Err(err);
            }
            tracing::debug!(relation = relation.name, "relation ensured");
        }
        tracing::info!(relations = self.relations.len(), "schema ready");
        Ok(())
    }
}

impl Default for SchemaInitializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
