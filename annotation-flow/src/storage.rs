use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{AnnotationError, Result};
use crate::record::{DiseaseRecord, FieldDiff, UserRecord};
use crate::session::Session;

/// Disease documents keyed by disease name
#[async_trait]
pub trait DiseaseRepository: Send + Sync {
    async fn find(&self, disease_key: &str) -> Result<Option<DiseaseRecord>>;
    /// Partial update by path; fails with `DiseaseNotFound` for an unknown key
    async fn update_fields(&self, disease_key: &str, updates: &FieldDiff) -> Result<()>;
    /// Replaces the whole document, creating it if absent
    async fn upsert(&self, record: DiseaseRecord) -> Result<()>;
}

/// Annotator records keyed by email
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<UserRecord>>;
    /// Inserts only if no user with this email exists; returns the stored record
    async fn insert_if_absent(&self, user: UserRecord) -> Result<UserRecord>;
    async fn set_last_drug(&self, email: &str, drug: &str) -> Result<()>;
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory document store
#[derive(Clone, Default)]
pub struct InMemoryDiseaseRepository {
    diseases: Arc<DashMap<String, DiseaseRecord>>,
}

impl InMemoryDiseaseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiseaseRepository for InMemoryDiseaseRepository {
    async fn find(&self, disease_key: &str) -> Result<Option<DiseaseRecord>> {
        Ok(self.diseases.get(disease_key).map(|entry| entry.clone()))
    }

    async fn update_fields(&self, disease_key: &str, updates: &FieldDiff) -> Result<()> {
        let mut entry = self
            .diseases
            .get_mut(disease_key)
            .ok_or_else(|| AnnotationError::DiseaseNotFound(disease_key.to_string()))?;

        // Stage on a copy so a bad path leaves the document untouched
        let mut staged = entry.clone();
        for (path, value) in updates {
            staged.apply_update(path, value.clone())?;
        }
        *entry = staged;
        Ok(())
    }

    async fn upsert(&self, record: DiseaseRecord) -> Result<()> {
        self.diseases.insert(record.disease_key.clone(), record);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<DashMap<String, UserRecord>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(email).map(|entry| entry.clone()))
    }

    async fn insert_if_absent(&self, user: UserRecord) -> Result<UserRecord> {
        let entry = self.users.entry(user.email.clone()).or_insert(user);
        Ok(entry.clone())
    }

    async fn set_last_drug(&self, email: &str, drug: &str) -> Result<()> {
        let mut entry = self
            .users
            .get_mut(email)
            .ok_or_else(|| AnnotationError::UserNotFound(email.to_string()))?;
        entry.last_drug = Some(drug.to_string());
        Ok(())
    }
}

/// In-memory implementation of SessionStorage
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DrugMap, DrugRecord, FieldPath};
    use serde_json::{Value, json};

    fn single_update(path: FieldPath, value: Value) -> FieldDiff {
        FieldDiff::from([(path, value)])
    }

    fn glioblastoma() -> DiseaseRecord {
        let drugs: DrugMap = vec![("DrugA", DrugRecord::default())].into_iter().collect();
        DiseaseRecord::new("glioblastoma", drugs)
    }

    #[tokio::test]
    async fn test_disease_partial_update() {
        let repo = InMemoryDiseaseRepository::new();
        repo.upsert(glioblastoma()).await.unwrap();

        repo.update_fields(
            "glioblastoma",
            &single_update(FieldPath::questionnaire("DrugA", "Q9_note"), json!("ok")),
        )
        .await
        .unwrap();

        let stored = repo.find("glioblastoma").await.unwrap().unwrap();
        assert_eq!(
            stored.drug("DrugA").unwrap().questionnaire["Q9_note"],
            json!("ok")
        );
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document_untouched() {
        let repo = InMemoryDiseaseRepository::new();
        repo.upsert(glioblastoma()).await.unwrap();

        let mut updates = single_update(FieldPath::completed("DrugA"), json!(true));
        updates.insert(FieldPath::completed("Missing"), json!(true));

        assert!(repo.update_fields("glioblastoma", &updates).await.is_err());
        let stored = repo.find("glioblastoma").await.unwrap().unwrap();
        assert!(!stored.drug("DrugA").unwrap().is_completed());

        let err = repo
            .update_fields("unknown", &FieldDiff::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotationError::DiseaseNotFound(_)));
    }

    #[tokio::test]
    async fn test_user_created_once() {
        let repo = InMemoryUserRepository::new();
        let first = repo
            .insert_if_absent(UserRecord::new("a@lab.org", "glioblastoma"))
            .await
            .unwrap();
        repo.set_last_drug("a@lab.org", "DrugA").await.unwrap();

        let second = repo
            .insert_if_absent(UserRecord::new("a@lab.org", "pancreatic cancer"))
            .await
            .unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.assigned_disease, "glioblastoma");
        assert_eq!(second.last_drug.as_deref(), Some("DrugA"));

        assert!(repo.set_last_drug("b@lab.org", "DrugA").await.is_err());
    }
}
