//! Tests for schema initialization

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use ticketdb_core::{DbError, QueryOutcome, Result, Statement};

use super::*;
use crate::executor::QueryExecutor;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::retry::RetryPolicy;
use crate::testing::MockFactory;

/// Records statements; fails on the relation named in `fail_on`
#[derive(Default)]
struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl Execute for RecordingExecutor {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        self.statements.lock().push(statement.text().to_string());
        if let Some(name) = self.fail_on
            && statement
                .text()
                .starts_with(&format!("CREATE TABLE IF NOT EXISTS {name} "))
        {
            return Err(DbError::QueryExecution {
                attempts: 1,
                source: Box::new(DbError::Query("permission denied for schema public".into())),
            });
        }
        Ok(QueryOutcome::no_result_set(0))
    }
}

#[test]
fn test_relations_are_listed_in_creation_order() {
    let names: Vec<_> = SchemaInitializer::new().relation_names().collect();
    assert_eq!(
        names,
        vec![
            "users",
            "tickets",
            "attachments",
            "comments",
            "custom_fields",
            "ticket_custom_fields",
            "macros",
            "saved_filters",
            "audit_logs",
            "gdpr_consents",
        ]
    );
}

#[test]
fn test_every_relation_is_created_idempotently() {
    for relation in SchemaInitializer::default().relations() {
        assert!(
            relation
                .ddl
                .starts_with(&format!("CREATE TABLE IF NOT EXISTS {} (", relation.name)),
            "{} must be created with IF NOT EXISTS",
            relation.name
        );
        assert_eq!(Statement::raw(relation.ddl).placeholder_count().unwrap(), 0);
    }
}

#[test]
fn test_references_only_point_backwards() {
    let relations = SchemaInitializer::new().relations();
    for (index, relation) in relations.iter().enumerate() {
        for target in relation.ddl.split("REFERENCES ").skip(1) {
            let referenced = target.split('(').next().unwrap_or_default().trim();
            let position = relations
                .iter()
                .position(|r| r.name == referenced)
                .unwrap_or_else(|| panic!("{} references unknown {referenced}", relation.name));
            assert!(
                position <= index,
                "{} references {referenced}, which is created later",
                relation.name
            );
        }
    }
}

#[test]
fn test_unique_constraints_follow_upsert_targets() {
    let relations = SchemaInitializer::new().relations();
    let find = |name: &str| relations.iter().find(|r| r.name == name).unwrap().ddl;

    assert!(find("ticket_custom_fields").contains("UNIQUE(ticket_id, field_id)"));
    assert!(find("gdpr_consents").contains("UNIQUE(user_id)"));
    assert!(find("users").contains("email VARCHAR(255) UNIQUE NOT NULL"));
}

#[tokio::test]
async fn test_ensure_schema_runs_each_relation_once_in_order() {
    let executor = RecordingExecutor::default();
    let schema = SchemaInitializer::new();

    schema.ensure_schema(&executor).await.unwrap();
    schema.ensure_schema(&executor).await.unwrap();

    let statements = executor.statements.lock().clone();
    assert_eq!(statements.len(), 20);
    let expected: Vec<_> = schema.relations().iter().map(|r| r.ddl.to_string()).collect();
    assert_eq!(statements[..10], expected[..]);
    assert_eq!(statements[10..], expected[..]);
}

#[tokio::test]
async fn test_ensure_schema_stops_at_first_failure() {
    let executor = RecordingExecutor {
        fail_on: Some("comments"),
        ..Default::default()
    };

    let err = SchemaInitializer::new()
        .ensure_schema(&executor)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::QueryExecution { attempts: 1, .. }));
    assert_eq!(executor.statements.lock().len(), 4);
}

#[tokio::test]
async fn test_ensure_schema_through_query_executor() {
    let factory = MockFactory::new();
    let pool = Arc::new(ConnectionPool::new(PoolConfig::new(1, 2), factory.clone()));
    let executor = QueryExecutor::new(pool, RetryPolicy::default());

    SchemaInitializer::new()
        .ensure_schema(&executor)
        .await
        .unwrap();

    assert_eq!(factory.executions().len(), 10);
    assert_eq!(factory.commits(), 10);
}
