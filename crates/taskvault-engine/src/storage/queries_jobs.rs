//! Scheduled-job registry queries.
//!
//! The scheduler keeps its registrations in the `scheduled_jobs` table so a
//! restart can pick up where a previous process left off (anchors included).

use taskvault_core::db::unix_timestamp;

use super::db::{DatabaseError, Store};
use super::models::JobRecord;

impl Store {
    /// Get a job registration by name.
    pub async fn get_job(&self, name: &str) -> Result<Option<JobRecord>, DatabaseError> {
        let job = sqlx::query_as::<_, JobRecord>("SELECT * FROM scheduled_jobs WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool().await)
            .await?;

        Ok(job)
    }

    /// All job registrations.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>, DatabaseError> {
        let jobs = sqlx::query_as::<_, JobRecord>("SELECT * FROM scheduled_jobs ORDER BY name")
            .fetch_all(&self.pool().await)
            .await?;

        Ok(jobs)
    }

    /// Insert or overwrite a job registration. Names are unique.
    pub async fn save_job(&self, job: &JobRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO scheduled_jobs
                (name, interval_ms, flex_ms, battery_not_low, device_idle, network_required,
                 policy, anchor_ms, created_at, updated_at, last_run_at, last_outcome)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&job.name)
        .bind(job.interval_ms)
        .bind(job.flex_ms)
        .bind(job.battery_not_low)
        .bind(job.device_idle)
        .bind(job.network_required)
        .bind(&job.policy)
        .bind(job.anchor_ms)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.last_run_at)
        .bind(&job.last_outcome)
        .execute(&self.pool().await)
        .await?;

        Ok(())
    }

    /// Remove a job registration. Returns whether a row existed.
    pub async fn delete_job(&self, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE name = ?")
            .bind(name)
            .execute(&self.pool().await)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of a firing.
    pub async fn record_job_outcome(
        &self,
        name: &str,
        run_at: i64,
        outcome: &str,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "UPDATE scheduled_jobs SET last_run_at = ?, last_outcome = ?, updated_at = ? WHERE name = ?",
        )
        .bind(run_at)
        .bind(outcome)
        .bind(now)
        .bind(name)
        .execute(&self.pool().await)
        .await?;

        Ok(())
    }
}
