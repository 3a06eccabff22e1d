//! Integration tests for the on-disk cache store.

use campus_core::{EntityKind, Fee, FeeStatus, Teacher};
use campus_db::{Database, DbConfig};
use chrono::NaiveDate;
use tempfile::TempDir;

fn fee(id: &str, student_id: &str, status: FeeStatus) -> Fee {
    Fee {
        id: id.to_string(),
        student_id: student_id.to_string(),
        description: "Term 1 tuition".to_string(),
        amount_cents: 125_000,
        due_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        status,
    }
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("campus.db");

    {
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.records::<Fee>()
            .upsert_many(&[
                fee("f-1", "s-1", FeeStatus::Pending),
                fee("f-2", "s-1", FeeStatus::Paid),
            ])
            .await
            .unwrap();
        db.close().await;
    }

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    let fees = db.records::<Fee>().list_by_parent("s-1").await.unwrap();
    assert_eq!(fees.len(), 2);
    assert_eq!(fees[1].status, FeeStatus::Paid);
}

#[tokio::test]
async fn test_migrations_rerun_on_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("campus.db");

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    db.run_migrations().await.unwrap();

    let status = db.migration_status().await.unwrap();
    assert_eq!(status.applied, status.total);
    assert!(status.is_current());
}

#[tokio::test]
async fn test_replaying_a_batch_converges() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("campus.db")))
        .await
        .unwrap();
    let repo = db.records::<Teacher>();

    let batch: Vec<Teacher> = (1..=3)
        .map(|i| Teacher {
            id: format!("t-{i}"),
            user_id: None,
            full_name: format!("Teacher {i}"),
            subject: "History".to_string(),
            email: None,
            phone: None,
        })
        .collect();

    for _ in 0..3 {
        repo.upsert_many(&batch).await.unwrap();
    }

    let counts = db.cache_counts().await.unwrap();
    for (kind, count) in counts {
        let expected = if kind == EntityKind::Teachers { 3 } else { 0 };
        assert_eq!(count, expected, "unexpected row count for {kind}");
    }
}
