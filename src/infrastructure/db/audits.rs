use crate::domain::answers::{Audience, NormalizedAnswerRow};
use crate::domain::audit::{AuditRecord, Finding, FindingRecord, PendingAuditPayload, SeverityCounts, UserType};
use crate::domain::error::{AppError, Result};
use crate::domain::responses::Responses;
use crate::domain::session::CurrentUser;
use crate::domain::taxonomy::{from_db_severity, from_db_status, to_db_severity, to_db_status, DbStatus, Status};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Audits, their findings and the row-wise answers behind them.
///
/// Severity and status cross this boundary only through the taxonomy
/// mapping: rows hold the storage vocabulary, callers get the dashboard one.
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_audit(
        &self,
        user: &CurrentUser,
        payload: &PendingAuditPayload,
        responses_hash: Option<&str>,
    ) -> Result<AuditRecord> {
        self.insert_audit_with_answers(user, payload, responses_hash, &[])
            .await
    }

    /// Audit, findings and answer rows in one transaction.
    pub async fn insert_audit_with_answers(
        &self,
        user: &CurrentUser,
        payload: &PendingAuditPayload,
        responses_hash: Option<&str>,
        answers: &[(Audience, Responses)],
    ) -> Result<AuditRecord> {
        let record = AuditRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            user_type: payload.user_type,
            score: payload.score,
            summary_md: payload.summary_md.clone(),
            counts: payload.counts,
            analytics: payload.analytics.clone(),
            meta: payload.meta.clone(),
            responses_hash: responses_hash.map(str::to_string),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        write_audit(&mut tx, &record, &payload.baseline_findings).await?;
        for (audience, responses) in answers {
            write_answers(&mut tx, &record.id, Some(*audience), responses).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit audit: {e}")))?;

        Ok(record)
    }

    /// Store one row per (question, option). Returns the number of rows.
    pub async fn insert_answers(
        &self,
        audit_id: &str,
        audience: Option<Audience>,
        responses: &Responses,
    ) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let inserted = write_answers(&mut tx, audit_id, audience, responses).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit answers: {e}")))?;

        Ok(inserted)
    }

    pub async fn list_answer_rows(&self, audit_id: &str) -> Result<Vec<NormalizedAnswerRow>> {
        let rows = sqlx::query_as::<_, AnswerEntity>(
            "SELECT question, option_value, audience FROM audit_answers WHERE audit_id = ? ORDER BY id",
        )
        .bind(audit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list answers: {e}")))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_audit(&self, audit_id: &str) -> Result<AuditRecord> {
        let audit = sqlx::query_as::<_, AuditEntity>(
            "SELECT id, user_id, user_type, score, summary_md, counts_json, analytics_json, meta_json, responses_hash, created_at
             FROM audits WHERE id = ?",
        )
        .bind(audit_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch audit: {e}")))?;

        match audit {
            Some(audit) => Ok(audit.into()),
            None => Err(AppError::NotFound(format!("Audit not found: {}", audit_id))),
        }
    }

    pub async fn list_audits(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<AuditRecord>> {
        let limit = match limit {
            Some(value) if value > 0 => value.min(500),
            _ => DEFAULT_LIST_LIMIT,
        };

        let audits = sqlx::query_as::<_, AuditEntity>(
            "SELECT id, user_id, user_type, score, summary_md, counts_json, analytics_json, meta_json, responses_hash, created_at
             FROM audits WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list audits: {e}")))?;

        Ok(audits.into_iter().map(Into::into).collect())
    }

    pub async fn list_findings(&self, audit_id: &str) -> Result<Vec<FindingRecord>> {
        let findings = sqlx::query_as::<_, FindingEntity>(
            "SELECT id, audit_id, severity, status, title, description, remediation
             FROM audit_findings WHERE audit_id = ? ORDER BY id",
        )
        .bind(audit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list findings: {e}")))?;

        Ok(findings.into_iter().map(Into::into).collect())
    }

    pub async fn get_finding(&self, finding_id: i64) -> Result<FindingRecord> {
        let finding = sqlx::query_as::<_, FindingEntity>(
            "SELECT id, audit_id, severity, status, title, description, remediation
             FROM audit_findings WHERE id = ?",
        )
        .bind(finding_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch finding: {e}")))?;

        match finding {
            Some(finding) => Ok(finding.into()),
            None => Err(AppError::NotFound(format!(
                "Finding not found: {}",
                finding_id
            ))),
        }
    }

    pub async fn update_finding_status(
        &self,
        finding_id: i64,
        status: Status,
    ) -> Result<FindingRecord> {
        let result = sqlx::query("UPDATE audit_findings SET status = ? WHERE id = ?")
            .bind(to_db_status(Some(status.as_str())).as_str())
            .bind(finding_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update finding: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Finding not found: {}",
                finding_id
            )));
        }
        self.get_finding(finding_id).await
    }
}

async fn write_audit(
    conn: &mut SqliteConnection,
    record: &AuditRecord,
    findings: &[Finding],
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audits (id, user_id, user_type, score, summary_md, counts_json, analytics_json, meta_json, responses_hash, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(record.user_type.as_str())
    .bind(record.score)
    .bind(&record.summary_md)
    .bind(serde_json::to_string(&record.counts)?)
    .bind(serde_json::to_string(&record.analytics)?)
    .bind(serde_json::to_string(&record.meta)?)
    .bind(&record.responses_hash)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to insert audit: {e}")))?;

    for finding in findings {
        sqlx::query(
            "INSERT INTO audit_findings (audit_id, severity, status, title, description, remediation)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(to_db_severity(Some(finding.severity.as_str())).as_str())
        .bind(DbStatus::Open.as_str())
        .bind(&finding.title)
        .bind(&finding.description)
        .bind(&finding.remediation)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert finding: {e}")))?;
    }
    Ok(())
}

async fn write_answers(
    conn: &mut SqliteConnection,
    audit_id: &str,
    audience: Option<Audience>,
    responses: &Responses,
) -> Result<usize> {
    let mut inserted = 0;
    for (question, options) in responses.iter() {
        for option in options {
            sqlx::query(
                "INSERT INTO audit_answers (audit_id, audience, question, option_value) VALUES (?, ?, ?, ?)",
            )
            .bind(audit_id)
            .bind(audience.map(|a| a.as_str()))
            .bind(question)
            .bind(option)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert answer: {e}")))?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[derive(sqlx::FromRow)]
struct AuditEntity {
    id: String,
    user_id: String,
    user_type: String,
    score: Option<f64>,
    summary_md: String,
    counts_json: String,
    analytics_json: String,
    meta_json: String,
    responses_hash: Option<String>,
    created_at: i64,
}

impl From<AuditEntity> for AuditRecord {
    fn from(entity: AuditEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            user_type: UserType::parse(&entity.user_type),
            score: entity.score,
            summary_md: entity.summary_md,
            counts: serde_json::from_str::<SeverityCounts>(&entity.counts_json).unwrap_or_default(),
            analytics: serde_json::from_str::<Value>(&entity.analytics_json).unwrap_or(Value::Null),
            meta: serde_json::from_str::<Value>(&entity.meta_json).unwrap_or(Value::Null),
            responses_hash: entity.responses_hash,
            created_at: entity.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FindingEntity {
    id: i64,
    audit_id: String,
    severity: String,
    status: String,
    title: String,
    description: String,
    remediation: Option<String>,
}

impl From<FindingEntity> for FindingRecord {
    fn from(entity: FindingEntity) -> Self {
        Self {
            id: entity.id,
            audit_id: entity.audit_id,
            severity: from_db_severity(Some(&entity.severity)),
            status: from_db_status(Some(&entity.status)),
            title: entity.title,
            description: entity.description,
            remediation: entity.remediation,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerEntity {
    question: String,
    option_value: String,
    audience: Option<String>,
}

impl From<AnswerEntity> for NormalizedAnswerRow {
    fn from(entity: AnswerEntity) -> Self {
        Self {
            question: entity.question,
            option_value: entity.option_value,
            audience: entity.audience.as_deref().and_then(Audience::parse),
        }
    }
}
