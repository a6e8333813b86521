use crate::application::use_cases::response_normalizer::{
    embedded_for_audience, responses_from_audit_embedded, responses_from_embedded_value,
};
use crate::domain::answers::Audience;
use crate::domain::audit::{AuditRecord, PendingAuditPayload};
use crate::domain::error::Result;
use crate::domain::session::{ClientId, CurrentUser};
use crate::infrastructure::db::audits::AuditRepository;
use crate::infrastructure::pending_store::{KeyValueStorage, PendingAuditStore};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Carries an audit computed before sign-in across the authentication
/// boundary: stage it, then persist it once a session exists.
///
/// Every client stages into its own slot of the shared storage.
pub struct AuditCarryoverUseCase {
    storage: Arc<dyn KeyValueStorage>,
    repository: Arc<AuditRepository>,
    claim_lock: Mutex<()>,
}

impl AuditCarryoverUseCase {
    pub fn new(storage: Arc<dyn KeyValueStorage>, repository: Arc<AuditRepository>) -> Self {
        Self {
            storage,
            repository,
            claim_lock: Mutex::new(()),
        }
    }

    fn store_for(&self, client: &ClientId) -> PendingAuditStore {
        PendingAuditStore::for_client(self.storage.clone(), client)
    }

    pub fn stash(&self, client: &ClientId, payload: &PendingAuditPayload) {
        self.store_for(client).save(payload);
    }

    pub fn pending(&self, client: &ClientId) -> Option<PendingAuditPayload> {
        self.store_for(client).load()
    }

    pub fn discard(&self, client: &ClientId) {
        self.store_for(client).clear();
    }

    /// Persist the audit `client` staged, on behalf of `user`.
    ///
    /// Returns `Ok(None)` without touching the staged payload when there is
    /// no session or nothing is staged. The payload is cleared only after
    /// the audit and its answers are committed. Claims run one at a time so
    /// a payload is persisted at most once.
    pub async fn claim(
        &self,
        client: &ClientId,
        user: Option<CurrentUser>,
    ) -> Result<Option<AuditRecord>> {
        let Some(user) = user else {
            return Ok(None);
        };
        let _guard = self.claim_lock.lock().await;
        let pending = self.store_for(client);
        let Some(payload) = pending.load() else {
            return Ok(None);
        };

        let document = json!({ "meta": payload.meta });
        let responses_hash = responses_from_audit_embedded(&document).fingerprint();
        let answers: Vec<_> = [Audience::Developer, Audience::Organization]
            .into_iter()
            .filter_map(|audience| {
                let responses = embedded_for_audience(&document, audience)
                    .map(responses_from_embedded_value)?;
                (!responses.is_empty()).then_some((audience, responses))
            })
            .collect();

        let record = self
            .repository
            .insert_audit_with_answers(&user, &payload, Some(&responses_hash), &answers)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    user_id = %user.id,
                    client_id = %client,
                    "Failed to persist pending audit"
                );
                e
            })?;

        pending.clear();
        info!(audit_id = %record.id, user_id = %user.id, "Pending audit claimed");
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{Finding, SeverityCounts, UserType};
    use crate::domain::error::AppError;
    use crate::domain::taxonomy::Severity;
    use crate::infrastructure::db::connection::init_in_memory_db;
    use crate::infrastructure::pending_store::MemoryStorage;
    use serde_json::Value;

    async fn setup() -> (AuditCarryoverUseCase, Arc<AuditRepository>, sqlx::SqlitePool) {
        let pool = init_in_memory_db().await.unwrap();
        let repository = Arc::new(AuditRepository::new(pool.clone()));
        (
            AuditCarryoverUseCase::new(Arc::new(MemoryStorage::new()), repository.clone()),
            repository,
            pool,
        )
    }

    fn client(id: &str) -> ClientId {
        ClientId::parse(Some(id)).unwrap()
    }

    fn payload() -> PendingAuditPayload {
        let findings = vec![Finding {
            severity: Severity::Medium,
            title: "No timelock".to_string(),
            description: "Upgrades apply immediately".to_string(),
            remediation: None,
        }];
        PendingAuditPayload {
            score: Some(71.0),
            summary_md: "One issue".to_string(),
            counts: SeverityCounts::from_findings(&findings),
            baseline_findings: findings,
            analytics: Value::Null,
            meta: json!({
                "developer_responses": [{"question": "Q1", "options": ["yes", "no"]}],
                "organization_responses": [{"question": "Q2", "options": ["weekly"]}]
            }),
            user_type: UserType::Developer,
        }
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: "user-1".to_string(),
            email: Some("dev@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_claim_without_session_keeps_payload() {
        let (use_case, _, _) = setup().await;
        let tab = client("tab");
        use_case.stash(&tab, &payload());

        assert!(use_case.claim(&tab, None).await.unwrap().is_none());
        assert_eq!(use_case.pending(&tab), Some(payload()));
    }

    #[tokio::test]
    async fn test_claim_with_nothing_pending() {
        let (use_case, _, _) = setup().await;
        assert!(use_case
            .claim(&client("tab"), Some(user()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_claim_persists_and_clears() {
        let (use_case, repository, _) = setup().await;
        let tab = client("tab");
        use_case.stash(&tab, &payload());

        let record = use_case.claim(&tab, Some(user())).await.unwrap().unwrap();
        assert_eq!(record.user_id, "user-1");
        assert!(use_case.pending(&tab).is_none());

        let findings = repository.list_findings(&record.id).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);

        let rows = repository.list_answer_rows(&record.id).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].audience, Some(Audience::Organization));

        let stored = repository.get_audit(&record.id).await.unwrap();
        let expected = responses_from_audit_embedded(&stored.as_document());
        assert_eq!(stored.responses_hash, Some(expected.fingerprint()));
    }

    #[tokio::test]
    async fn test_failed_claim_keeps_payload_for_retry() {
        let (use_case, _, pool) = setup().await;
        let tab = client("tab");
        use_case.stash(&tab, &payload());

        sqlx::query("DROP TABLE audit_findings")
            .execute(&pool)
            .await
            .unwrap();

        let err = use_case.claim(&tab, Some(user())).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(use_case.pending(&tab), Some(payload()));
    }

    #[tokio::test]
    async fn test_discard_clears() {
        let (use_case, _, _) = setup().await;
        let tab = client("tab");
        use_case.stash(&tab, &payload());
        use_case.discard(&tab);
        assert!(use_case.pending(&tab).is_none());
    }

    #[tokio::test]
    async fn test_claim_only_sees_own_client_slot() {
        let (use_case, repository, _) = setup().await;
        let alice = client("alice");
        let bob = client("bob");
        use_case.stash(&alice, &payload());

        assert!(use_case.pending(&bob).is_none());
        assert!(use_case.claim(&bob, Some(user())).await.unwrap().is_none());
        use_case.discard(&bob);

        assert_eq!(use_case.pending(&alice), Some(payload()));
        assert!(repository.list_audits("user-1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_claims_persist_once() {
        let (use_case, repository, _) = setup().await;
        let tab = client("tab");
        use_case.stash(&tab, &payload());

        let (first, second) = tokio::join!(
            use_case.claim(&tab, Some(user())),
            use_case.claim(&tab, Some(user()))
        );
        let claimed = [first.unwrap(), second.unwrap()]
            .into_iter()
            .flatten()
            .count();
        assert_eq!(claimed, 1);
        assert_eq!(repository.list_audits("user-1", None).await.unwrap().len(), 1);
        assert!(use_case.pending(&tab).is_none());
    }
}
