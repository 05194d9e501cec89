use chrono::{Duration, Utc};
use pond_monitor::db::models::{HealthReport, HealthStatus, LogQuery, NewWaterQualityLog};
use pond_monitor::db::{CropStore, LogStore, ReportStore, Repository};
use pond_monitor::readings::Readings;
use sqlx::PgPool;

async fn insert_crop(pool: &PgPool, crop_id: &str, status: &str) {
    sqlx::query("INSERT INTO crops (crop_id, pond_id, status) VALUES ($1, $2, $3)")
        .bind(crop_id)
        .bind(format!("POND{}", &crop_id[4..]))
        .bind(status)
        .execute(pool)
        .await
        .expect("Failed to insert crop");
}

fn readings() -> Readings {
    Readings {
        dissolved_oxygen_mg_l: 6.12,
        ph: 8.05,
        temperature_c: 29.4,
        ammonia_ppm: 0.112,
        nitrite_ppm: 0.041,
        salinity_ppt: 19.0,
    }
}

fn new_log(n: u64, crop_id: &str, minutes_ago: i64) -> NewWaterQualityLog {
    NewWaterQualityLog {
        log_id: format!("WQ_LOG{:06}", n),
        crop_id: crop_id.to_string(),
        recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        readings: readings(),
        remarks: "Simulated real-time sensor log.".to_string(),
    }
}

fn report(crop_id: &str, status: HealthStatus, reason: &str, action: &str) -> HealthReport {
    HealthReport {
        crop_id: crop_id.to_string(),
        status,
        reason: reason.to_string(),
        recommended_action: action.to_string(),
        report_timestamp: Utc::now(),
    }
}

/// Eligible crops include the legacy "Ongoing" status and exclude closed crops
#[sqlx::test]
async fn test_eligible_crop_ids(pool: PgPool) {
    let repo = Repository::new(pool.clone());

    insert_crop(&pool, "CROP0006", "active").await;
    insert_crop(&pool, "CROP0003", "Ongoing").await;
    insert_crop(&pool, "CROP0001", "harvested").await;
    insert_crop(&pool, "CROP0002", "failed").await;

    let ids = repo
        .eligible_crop_ids()
        .await
        .expect("Failed to query crops");

    assert_eq!(ids, vec!["CROP0003".to_string(), "CROP0006".to_string()]);
}

#[sqlx::test]
async fn test_no_eligible_crops(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0001", "harvested").await;

    let ids = repo.eligible_crop_ids().await.expect("Query failed");
    assert!(ids.is_empty());
}

/// Insert logs and read them back newest first
#[sqlx::test]
async fn test_insert_and_read_logs(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0003", "active").await;
    insert_crop(&pool, "CROP0006", "active").await;

    let logs = vec![
        new_log(1, "CROP0003", 30),
        new_log(2, "CROP0006", 20),
        new_log(3, "CROP0003", 10),
    ];

    let result = repo.insert_logs(&logs).await.expect("Insert failed");
    assert_eq!(result.inserted, 3);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM water_quality_logs")
        .fetch_one(&pool)
        .await
        .expect("Count failed");
    assert_eq!(count, 3);

    let latest = repo
        .recent_logs(&LogQuery::latest(2))
        .await
        .expect("Query failed");
    let ids: Vec<&str> = latest.iter().map(|l| l.log_id.as_str()).collect();
    assert_eq!(ids, vec!["WQ_LOG000003", "WQ_LOG000002"]);

    let stored = &latest[0];
    assert_eq!(stored.crop_id, "CROP0003");
    assert_eq!(stored.readings(), readings());
    assert_eq!(stored.remarks, "Simulated real-time sensor log.");
}

#[sqlx::test]
async fn test_recent_logs_filters(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0003", "active").await;
    insert_crop(&pool, "CROP0006", "active").await;

    repo.insert_logs(&[
        new_log(1, "CROP0003", 30),
        new_log(2, "CROP0006", 20),
        new_log(3, "CROP0003", 10),
    ])
    .await
    .expect("Insert failed");

    let crop_logs = repo
        .recent_logs(&LogQuery::latest_for_crop("CROP0006", 10))
        .await
        .expect("Query failed");
    assert_eq!(crop_logs.len(), 1);
    assert_eq!(crop_logs[0].log_id, "WQ_LOG000002");

    let since = Utc::now() - Duration::minutes(25);
    let recent = repo
        .recent_logs(&LogQuery::latest(10).since(since))
        .await
        .expect("Query failed");
    assert_eq!(recent.len(), 2);

    let all = repo
        .recent_logs(&LogQuery::default())
        .await
        .expect("Query failed");
    assert_eq!(all.len(), 3);
}

#[sqlx::test]
async fn test_insert_empty_batch(pool: PgPool) {
    let repo = Repository::new(pool);

    let result = repo.insert_logs(&[]).await.expect("Insert failed");
    assert_eq!(result.inserted, 0);
}

/// A duplicate log id fails the whole batch
#[sqlx::test]
async fn test_failed_batch_is_rolled_back(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0003", "active").await;

    repo.insert_logs(&[new_log(1, "CROP0003", 5)])
        .await
        .expect("Insert failed");

    let result = repo
        .insert_logs(&[new_log(2, "CROP0003", 4), new_log(1, "CROP0003", 3)])
        .await;
    assert!(result.is_err());

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM water_quality_logs")
        .fetch_one(&pool)
        .await
        .expect("Count failed");
    assert_eq!(count, 1);
}

/// Repeated upserts leave exactly one row holding the latest values
#[sqlx::test]
async fn test_upsert_report_is_idempotent(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0003", "active").await;

    let warning = report(
        "CROP0003",
        HealthStatus::Warning,
        "Low Dissolved Oxygen",
        "Start all aerators immediately.",
    );
    repo.upsert_report(&warning).await.expect("Upsert failed");
    repo.upsert_report(&warning).await.expect("Upsert failed");

    let healthy = report(
        "CROP0003",
        HealthStatus::Healthy,
        "N/A",
        "No action required.",
    );
    repo.upsert_report(&healthy).await.expect("Upsert failed");

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM health_reports WHERE crop_id = $1",
    )
    .bind("CROP0003")
    .fetch_one(&pool)
    .await
    .expect("Count failed");
    assert_eq!(count, 1);

    let stored = repo
        .get_report("CROP0003")
        .await
        .expect("Query failed")
        .expect("Report missing");
    assert_eq!(stored.status, HealthStatus::Healthy);
    assert_eq!(stored.reason, "N/A");
    assert_eq!(stored.recommended_action, "No action required.");
}

#[sqlx::test]
async fn test_list_reports(pool: PgPool) {
    let repo = Repository::new(pool.clone());
    insert_crop(&pool, "CROP0006", "active").await;
    insert_crop(&pool, "CROP0003", "active").await;

    assert!(repo.get_report("CROP0003").await.expect("Query failed").is_none());

    repo.upsert_report(&report(
        "CROP0006",
        HealthStatus::Healthy,
        "N/A",
        "No action required.",
    ))
    .await
    .expect("Upsert failed");
    repo.upsert_report(&report(
        "CROP0003",
        HealthStatus::Warning,
        "High Ammonia Levels",
        "Reduce feed and prepare for water exchange.",
    ))
    .await
    .expect("Upsert failed");

    let reports = repo.list_reports().await.expect("Query failed");
    let crops: Vec<&str> = reports.iter().map(|r| r.crop_id.as_str()).collect();
    assert_eq!(crops, vec!["CROP0003", "CROP0006"]);
    assert_eq!(reports[0].status, HealthStatus::Warning);
}

/// Migrations are re-runnable and close releases the pool
#[sqlx::test]
async fn test_migrations_then_close(pool: PgPool) {
    let repo = Repository::new(pool.clone());

    repo.run_migrations().await.expect("Migrations failed");
    repo.close().await;

    assert!(pool.is_closed());
}
