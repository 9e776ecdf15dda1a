// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, PgPool, Postgres, Transaction};

use super::{Store, StoreResult};
use crate::models::{
    Assignment, AssignmentFilter, AssignmentPatch, Citizen, Complaint, ComplaintStatus, Department,
    EscalationLevel, NewAssignment, Resource, Worker,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn release_in(
    tx: &mut Transaction<'_, Postgres>,
    worker_ids: &[i64],
    resource_ids: &[i64],
) -> StoreResult<()> {
    query(r#"UPDATE public.workers SET status = 'Available' WHERE worker_id = ANY($1)"#)
        .bind(worker_ids)
        .execute(&mut **tx)
        .await?;
    query(r#"UPDATE public.resources SET status = 'Available' WHERE resource_id = ANY($1)"#)
        .bind(resource_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn texts<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn complaint(&self, id: i64) -> StoreResult<Option<Complaint>> {
        let row = query_as::<_, Complaint>(r#"SELECT * FROM public.complaints WHERE complaint_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn escalation_candidates(
        &self,
        level: EscalationLevel,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Complaint>> {
        let rows = query_as::<_, Complaint>(
            r#"SELECT * FROM public.complaints
               WHERE escalation_level = $1
                 AND ladder_started_at <= $2
                 AND status = ANY($3)
               ORDER BY ladder_started_at"#,
        )
        .bind(level.as_str())
        .bind(started_before)
        .bind(texts(&ComplaintStatus::ACTIVE))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn escalate_complaint(
        &self,
        id: i64,
        from: EscalationLevel,
        to: EscalationLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let res = query(
            r#"UPDATE public.complaints
               SET escalation_level = $3, escalated_at = $4, updated_at = $4
               WHERE complaint_id = $1 AND escalation_level = $2 AND status = ANY($5)"#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .bind(texts(&ComplaintStatus::ACTIVE))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn escalated_complaints(&self, level: EscalationLevel) -> StoreResult<Vec<Complaint>> {
        let rows = query_as::<_, Complaint>(
            r#"SELECT * FROM public.complaints
               WHERE escalation_level = $1 AND status = ANY($2)
               ORDER BY escalated_at DESC NULLS LAST, complaint_id DESC"#,
        )
        .bind(level.as_str())
        .bind(texts(&ComplaintStatus::ACTIVE))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn overdue_complaints(&self) -> StoreResult<Vec<Complaint>> {
        let rows = query_as::<_, Complaint>(
            r#"SELECT * FROM public.complaints WHERE overdue ORDER BY updated_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn transition_complaint(
        &self,
        id: i64,
        from: &[ComplaintStatus],
        to: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>> {
        let row = query_as::<_, Complaint>(
            r#"
            UPDATE public.complaints SET
              status      = $3,
              resolved_at = CASE WHEN $3 = 'resolved' THEN $4 ELSE resolved_at END,
              updated_at  = $4
            WHERE complaint_id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(texts(from))
        .bind(to.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn reassign_complaint(
        &self,
        id: i64,
        department: Department,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>> {
        let row = query_as::<_, Complaint>(
            r#"
            UPDATE public.complaints SET
              department        = $2,
              escalation_level  = 'staff',
              escalated_at      = NULL,
              ladder_started_at = $3,
              updated_at        = $3
            WHERE complaint_id = $1 AND status = ANY($4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(department.as_str())
        .bind(at)
        .bind(texts(&ComplaintStatus::ACTIVE))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_complaint_overdue(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        query(r#"UPDATE public.complaints SET overdue = TRUE, updated_at = $2 WHERE complaint_id = $1"#)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reject_complaint(
        &self,
        id: i64,
        freeze_at: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<(Complaint, Citizen)>> {
        let mut tx = self.pool.begin().await?;

        let complaint = query_as::<_, Complaint>(
            r#"
            UPDATE public.complaints SET status = 'rejected', updated_at = $2
            WHERE complaint_id = $1 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(texts(&ComplaintStatus::ACTIVE))
        .fetch_optional(&mut *tx)
        .await?;
        let Some(complaint) = complaint else {
            tx.rollback().await?;
            return Ok(None);
        };

        let citizen = query_as::<_, Citizen>(
            r#"
            UPDATE public.citizens SET
              warnings = warnings + 1,
              approved = CASE WHEN warnings + 1 >= $2 THEN FALSE ELSE approved END
            WHERE citizen_id = $1
            RETURNING *
            "#,
        )
        .bind(complaint.citizen_id)
        .bind(freeze_at)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(citizen) = citizen else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((complaint, citizen)))
    }

    async fn citizen(&self, id: i64) -> StoreResult<Option<Citizen>> {
        let row = query_as::<_, Citizen>(r#"SELECT * FROM public.citizens WHERE citizen_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn workers(&self, ids: &[i64]) -> StoreResult<Vec<Worker>> {
        let rows = query_as::<_, Worker>(
            r#"SELECT * FROM public.workers WHERE worker_id = ANY($1) ORDER BY worker_id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn resources(&self, ids: &[i64]) -> StoreResult<Vec<Resource>> {
        let rows = query_as::<_, Resource>(
            r#"SELECT * FROM public.resources WHERE resource_id = ANY($1) ORDER BY resource_id"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn reserve(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Row locks taken here make a concurrent reservation of the same ids
        // wait, then re-check the status guard after we commit.
        let workers = query(
            r#"UPDATE public.workers SET status = 'On-Duty'
               WHERE worker_id = ANY($1) AND status = 'Available'"#,
        )
        .bind(worker_ids)
        .execute(&mut *tx)
        .await?;
        if workers.rows_affected() != worker_ids.len() as u64 {
            tx.rollback().await?;
            return Ok(false);
        }

        let resources = query(
            r#"UPDATE public.resources SET status = 'In Use'
               WHERE resource_id = ANY($1) AND status = 'Available'"#,
        )
        .bind(resource_ids)
        .execute(&mut *tx)
        .await?;
        if resources.rows_affected() != resource_ids.len() as u64 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn release(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        release_in(&mut tx, worker_ids, resource_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_assignment(&self, new: NewAssignment) -> StoreResult<Assignment> {
        let row = query_as::<_, Assignment>(
            r#"
            INSERT INTO public.assignments
              (complaint_id, worker_ids, resource_ids, department, location, description,
               status, start_date, end_date, login_id, login_password_hash, otp_hash, otp_expires_at)
            VALUES
              ($1,$2,$3,$4,$5,$6,'Active',$7,$8,$9,$10,$11,$12)
            RETURNING *
            "#,
        )
        .bind(new.complaint_id)
        .bind(&new.worker_ids)
        .bind(&new.resource_ids)
        .bind(new.department.as_str())
        .bind(new.location)
        .bind(new.description)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.login_id)
        .bind(new.login_password_hash)
        .bind(new.otp_hash)
        .bind(new.otp_expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn assignment(&self, id: i64) -> StoreResult<Option<Assignment>> {
        let row = query_as::<_, Assignment>(r#"SELECT * FROM public.assignments WHERE assignment_id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn assignment_by_login(&self, login_id: &str) -> StoreResult<Option<Assignment>> {
        let row = query_as::<_, Assignment>(r#"SELECT * FROM public.assignments WHERE login_id = $1"#)
            .bind(login_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn active_assignment_for(&self, complaint_id: i64) -> StoreResult<Option<Assignment>> {
        let row = query_as::<_, Assignment>(
            r#"SELECT * FROM public.assignments WHERE complaint_id = $1 AND status = 'Active'"#,
        )
        .bind(complaint_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let rows = query_as::<_, Assignment>(
            r#"SELECT * FROM public.assignments
               WHERE ($1::BIGINT IS NULL OR $1 = ANY(worker_ids))
                 AND ($2::BIGINT IS NULL OR $2 = ANY(resource_ids))
                 AND ($3::TEXT IS NULL OR department = $3)
               ORDER BY assignment_id DESC"#,
        )
        .bind(filter.worker_id)
        .bind(filter.resource_id)
        .bind(filter.department.map(|d| d.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_assignment(
        &self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> StoreResult<Option<Assignment>> {
        let row = query_as::<_, Assignment>(
            r#"
            UPDATE public.assignments SET
              department  = COALESCE($2, department),
              location    = COALESCE($3, location),
              start_date  = COALESCE($4, start_date),
              end_date    = COALESCE($5, end_date),
              description = COALESCE($6, description),
              updated_at  = now()
            WHERE assignment_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.department.map(|d| d.as_str()))
        .bind(patch.location.as_deref())
        .bind(patch.start_date)
        .bind(patch.end_date)
        .bind(patch.description.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_assignment(&self, id: i64) -> StoreResult<Option<Assignment>> {
        let mut tx = self.pool.begin().await?;
        let row = query_as::<_, Assignment>(
            r#"DELETE FROM public.assignments WHERE assignment_id = $1 RETURNING *"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(a) = row.as_ref().filter(|a| a.is_active()) {
            release_in(&mut tx, &a.worker_ids, &a.resource_ids).await?;
        }
        tx.commit().await?;
        Ok(row)
    }

    async fn close_assignment(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let row = query_as::<_, Assignment>(
            r#"
            UPDATE public.assignments SET
              status              = 'Resolved',
              login_id            = NULL,
              login_password_hash = NULL,
              otp_hash            = NULL,
              otp_expires_at      = NULL,
              updated_at          = $2
            WHERE assignment_id = $1 AND status = 'Active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(a) = row else {
            tx.rollback().await?;
            return Ok(false);
        };
        release_in(&mut tx, &a.worker_ids, &a.resource_ids).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn overdue_candidates(
        &self,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Assignment>> {
        let rows = query_as::<_, Assignment>(
            r#"SELECT * FROM public.assignments
               WHERE status = 'Active' AND NOT overdue AND start_date <= $1
               ORDER BY start_date"#,
        )
        .bind(started_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn flag_assignment_overdue(&self, id: i64) -> StoreResult<bool> {
        let res = query(
            r#"UPDATE public.assignments SET overdue = TRUE, updated_at = now()
               WHERE assignment_id = $1 AND NOT overdue"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<()> {
        query(r#"UPDATE public.assignments SET reminder_sent = TRUE WHERE assignment_id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
