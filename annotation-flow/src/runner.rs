//! AnnotationRunner – loads a session, performs exactly **one** interaction
//! (render, navigate, submit, confirm) against the repositories, and persists
//! the updated session back to storage.
//!
//! Every call is one read → modify → write cycle. Nothing is cached between
//! calls: each render re-reads the disease document, so progress always
//! reflects the latest stored state.
//!
//! ```text
//! start_session ─▶ EditingDrug ──submit──▶ ConfirmAdvance ──confirm(true)──▶ EditingDrug (next)
//!                     ▲  │                      │                        └─▶ AllComplete
//!                     │  └─navigate/back─┐      │
//!                     └──────────────────┘◀─confirm(false)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::binder::{FormDefaults, FormValues, QuestionnaireBinder};
use crate::context::NavigationContext;
use crate::error::{AnnotationError, Result};
use crate::navigator::{DrugStatus, NavigationMode, Navigator, Progress};
use crate::record::{DiseaseRecord, FieldDiff, FieldPath, UserRecord, normalize_key};
use crate::schema::SchemaVersion;
use crate::session::{AnnotationPhase, Session};
use crate::storage::{
    DiseaseRepository, InMemoryDiseaseRepository, InMemorySessionStorage, InMemoryUserRepository,
    SessionStorage, UserRepository,
};

/// Schema and navigation defaults. A document's own `schema_version` wins
/// over `schema`; `mode` falls back to the schema's original mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationConfig {
    pub schema: SchemaVersion,
    pub mode: Option<NavigationMode>,
}

impl AnnotationConfig {
    pub fn new(schema: SchemaVersion) -> Self {
        Self { schema, mode: None }
    }

    pub fn with_mode(mut self, mode: NavigationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn resolve(&self, record: &DiseaseRecord) -> (SchemaVersion, NavigationMode) {
        let schema = record.schema_version.unwrap_or(self.schema);
        (schema, self.mode.unwrap_or_else(|| schema.default_navigation()))
    }
}

/// The drug being edited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugView {
    pub name: String,
    pub rationale_bullets: Vec<String>,
    pub form: FormDefaults,
    /// Answers awaiting confirmation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<FormValues>,
}

/// What the UI renders after an interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationView {
    pub session_id: String,
    pub disease: String,
    pub phase: AnnotationPhase,
    pub progress: Progress,
    pub drugs: Vec<DrugStatus>,
    pub current: Option<DrugView>,
    pub can_go_back: bool,
}

/// Result of a confirmed advance
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub drug: String,
    /// Questionnaire fields that actually changed
    pub written: FieldDiff,
    pub marked_complete: bool,
    pub view: AnnotationView,
}

/// High-level helper that orchestrates the _load → step → save_ pattern for
/// annotation sessions.
#[derive(Clone)]
pub struct AnnotationRunner {
    diseases: Arc<dyn DiseaseRepository>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStorage>,
    config: AnnotationConfig,
}

impl AnnotationRunner {
    pub fn new(
        diseases: Arc<dyn DiseaseRepository>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStorage>,
        config: AnnotationConfig,
    ) -> Self {
        Self {
            diseases,
            users,
            sessions,
            config,
        }
    }

    /// Runner backed entirely by in-memory storage
    pub fn in_memory(config: AnnotationConfig) -> Self {
        Self::new(
            Arc::new(InMemoryDiseaseRepository::new()),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemorySessionStorage::new()),
            config,
        )
    }

    pub fn diseases(&self) -> Arc<dyn DiseaseRepository> {
        self.diseases.clone()
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    pub fn config(&self) -> AnnotationConfig {
        self.config
    }

    /// Opens a session for an already-identified annotator. Creates the
    /// user record on first visit and resumes from its last drug.
    pub async fn start_session(&self, email: &str, assigned_disease: &str) -> Result<AnnotationView> {
        let email = normalize_key(email);
        let disease_key = normalize_key(assigned_disease);

        let mut record = self.load_disease(&disease_key).await?;
        let user = self
            .users
            .insert_if_absent(UserRecord::new(email.clone(), disease_key.clone()))
            .await?;
        if user.assigned_disease != disease_key {
            warn!(
                email = %email,
                stored = %user.assigned_disease,
                requested = %disease_key,
                "Session disease differs from the user's recorded assignment"
            );
        }

        let (_, mode) = self.config.resolve(&record);
        if mode == NavigationMode::CompletionFlag {
            record = self.backfill_completion_flags(record).await?;
        }

        let mut session = Session::new(
            email,
            disease_key,
            NavigationContext::resuming_from(user.last_drug),
        );
        info!(session_id = %session.id, email = %session.email, disease = %session.disease_key, "Session started");

        let view = self.render_session(&mut session, &record)?;
        self.sessions.save(session).await?;
        Ok(view)
    }

    /// Re-reads the disease and returns the current view
    pub async fn render(&self, session_id: &str) -> Result<AnnotationView> {
        let mut session = self.load_session(session_id).await?;
        let record = self.load_disease(&session.disease_key).await?;

        let view = self.render_session(&mut session, &record)?;
        self.sessions.save(session).await?;
        Ok(view)
    }

    /// Jumps to `drug` regardless of its completion state
    pub async fn navigate_to(&self, session_id: &str, drug: &str) -> Result<AnnotationView> {
        let mut session = self.load_session(session_id).await?;
        ensure_navigable(&session, "navigate")?;

        let record = self.load_disease(&session.disease_key).await?;
        record.drug(drug)?;

        self.move_to(&mut session, &record, drug.to_string()).await
    }

    /// Moves to the drug before the current one
    pub async fn go_back(&self, session_id: &str) -> Result<AnnotationView> {
        let mut session = self.load_session(session_id).await?;
        ensure_navigable(&session, "go back")?;

        let record = self.load_disease(&session.disease_key).await?;
        let (schema, mode) = self.config.resolve(&record);
        let previous = session
            .phase
            .drug()
            .and_then(|current| {
                Navigator::for_schema(mode, schema).previous_drug(&record.drug_map, current)
            })
            .ok_or_else(|| AnnotationError::InvalidTransition {
                phase: format!("{} at the first drug", session.phase),
                action: "go back".to_string(),
            })?;

        self.move_to(&mut session, &record, previous).await
    }

    /// Holds the submitted answers and asks for confirmation
    pub async fn submit(&self, session_id: &str, form: FormValues) -> Result<AnnotationView> {
        let mut session = self.load_session(session_id).await?;
        let drug = match &session.phase {
            AnnotationPhase::EditingDrug { drug } => drug.clone(),
            AnnotationPhase::AllComplete => {
                return Err(AnnotationError::SessionComplete(session.id.clone()));
            }
            other => return Err(invalid_transition(other, "submit answers")),
        };

        let record = self.load_disease(&session.disease_key).await?;
        let (schema, _) = self.config.resolve(&record);
        QuestionnaireBinder::for_record(schema, &record).validate(&form)?;

        session.pending_form = Some(form);
        session.navigation.pending_advance = true;
        session.phase = AnnotationPhase::ConfirmAdvance { drug: drug.clone() };
        info!(session_id = %session.id, drug = %drug, "Answers submitted, awaiting confirmation");

        let view = self.render_session(&mut session, &record)?;
        self.sessions.save(session).await?;
        Ok(view)
    }

    /// `accept = false` returns to editing with the stored answers;
    /// `accept = true` writes the changed fields and advances
    pub async fn confirm(&self, session_id: &str, accept: bool) -> Result<CommitOutcome> {
        let mut session = self.load_session(session_id).await?;
        let drug = match &session.phase {
            AnnotationPhase::ConfirmAdvance { drug } => drug.clone(),
            AnnotationPhase::AllComplete => {
                return Err(AnnotationError::SessionComplete(session.id.clone()));
            }
            other => return Err(invalid_transition(other, "confirm")),
        };

        let form = session.pending_form.take().unwrap_or_default();
        session.navigation.pending_advance = false;

        if !accept {
            info!(session_id = %session.id, drug = %drug, "Advance cancelled");
            session.phase = AnnotationPhase::EditingDrug { drug: drug.clone() };
            let record = self.load_disease(&session.disease_key).await?;
            let view = self.render_session(&mut session, &record)?;
            self.sessions.save(session).await?;
            return Ok(CommitOutcome {
                drug,
                written: FieldDiff::new(),
                marked_complete: false,
                view,
            });
        }

        let record = self.load_disease(&session.disease_key).await?;
        let (schema, mode) = self.config.resolve(&record);
        let binder = QuestionnaireBinder::for_record(schema, &record);
        let written = binder.commit(&drug, record.drug(&drug)?, &form)?;

        let mut updates = written.clone();
        let marked_complete = mode == NavigationMode::CompletionFlag;
        if marked_complete {
            updates.insert(FieldPath::completed(&drug), Value::Bool(true));
        }
        if !updates.is_empty() {
            self.diseases
                .update_fields(&session.disease_key, &updates)
                .await?;
        }
        self.users.set_last_drug(&session.email, &drug).await?;

        info!(
            session_id = %session.id,
            drug = %drug,
            changed_fields = written.len(),
            marked_complete,
            "Drug saved"
        );

        session.navigation.record_advance(drug.clone());
        session.phase = AnnotationPhase::AwaitingDrugSelection;

        let record = self.load_disease(&session.disease_key).await?;
        let view = self.render_session(&mut session, &record)?;
        self.sessions.save(session).await?;

        Ok(CommitOutcome {
            drug,
            written,
            marked_complete,
            view,
        })
    }

    /// Records the resume point and discards the session
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let session = self.load_session(session_id).await?;
        if let Some(drug) = session.navigation.current_drug.as_deref() {
            self.users.set_last_drug(&session.email, drug).await?;
        }
        self.sessions.delete(session_id).await?;
        info!(session_id = %session_id, "Session ended");
        Ok(())
    }

    async fn move_to(
        &self,
        session: &mut Session,
        record: &DiseaseRecord,
        drug: String,
    ) -> Result<AnnotationView> {
        self.users.set_last_drug(&session.email, &drug).await?;
        info!(session_id = %session.id, drug = %drug, "Navigating");

        session.navigation.request_navigation(drug);
        session.pending_form = None;
        session.phase = AnnotationPhase::AwaitingDrugSelection;

        let view = self.render_session(session, record)?;
        self.sessions.save(session.clone()).await?;
        Ok(view)
    }

    /// Resolves the phase against the current snapshot and builds the view
    fn render_session(&self, session: &mut Session, record: &DiseaseRecord) -> Result<AnnotationView> {
        let (schema, mode) = self.config.resolve(record);
        let navigator = Navigator::for_schema(mode, schema);

        let keep_confirming = matches!(
            &session.phase,
            AnnotationPhase::ConfirmAdvance { drug } if record.drug_map.contains(drug)
        );

        if !keep_confirming && !session.is_complete() {
            match navigator.select_current_drug(&record.drug_map, &session.navigation) {
                Some(drug) => {
                    session.navigation.current_drug = Some(drug.clone());
                    session.phase = AnnotationPhase::EditingDrug { drug };
                }
                None => {
                    info!(session_id = %session.id, disease = %record.disease_key, "All drugs annotated");
                    session.navigation.current_drug = None;
                    session.pending_form = None;
                    session.phase = AnnotationPhase::AllComplete;
                }
            }
        }

        let current_name = session.phase.drug();
        let current = match current_name {
            Some(name) => {
                let drug = record.drug(name)?;
                Some(DrugView {
                    name: name.to_string(),
                    rationale_bullets: drug.rationale_bullets.clone(),
                    form: QuestionnaireBinder::for_record(schema, record).prefill(drug),
                    pending: session.pending_form.clone(),
                })
            }
            None => None,
        };

        Ok(AnnotationView {
            session_id: session.id.clone(),
            disease: record.disease_key.clone(),
            phase: session.phase.clone(),
            progress: navigator.progress(&record.drug_map, current_name),
            drugs: navigator.drug_statuses(&record.drug_map, current_name),
            can_go_back: current_name
                .and_then(|name| navigator.previous_drug(&record.drug_map, name))
                .is_some(),
            current,
        })
    }

    async fn backfill_completion_flags(&self, record: DiseaseRecord) -> Result<DiseaseRecord> {
        let updates: FieldDiff = record
            .drug_map
            .iter()
            .filter(|(_, drug)| drug.completed.is_none())
            .map(|(name, _)| (FieldPath::completed(name), Value::Bool(false)))
            .collect();

        if updates.is_empty() {
            return Ok(record);
        }

        info!(disease = %record.disease_key, drugs = updates.len(), "Backfilling completion flags");
        self.diseases
            .update_fields(&record.disease_key, &updates)
            .await?;
        self.load_disease(&record.disease_key).await
    }

    async fn load_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AnnotationError::SessionNotFound(session_id.to_string()))
    }

    async fn load_disease(&self, disease_key: &str) -> Result<DiseaseRecord> {
        self.diseases
            .find(disease_key)
            .await?
            .ok_or_else(|| AnnotationError::DiseaseNotFound(disease_key.to_string()))
    }
}

fn ensure_navigable(session: &Session, action: &str) -> Result<()> {
    match &session.phase {
        AnnotationPhase::AllComplete => Err(AnnotationError::SessionComplete(session.id.clone())),
        AnnotationPhase::ConfirmAdvance { .. } => Err(invalid_transition(&session.phase, action)),
        _ => Ok(()),
    }
}

fn invalid_transition(phase: &AnnotationPhase, action: &str) -> AnnotationError {
    AnnotationError::InvalidTransition {
        phase: phase.to_string(),
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::UiValue;
    use crate::record::DrugRecord;
    use serde_json::json;

    fn drug(completed: Option<bool>, interest: &str) -> DrugRecord {
        let mut record: DrugRecord = serde_json::from_value(json!({
            "rationale_bullets": ["Inhibits tumour growth in vitro"],
            "questionnaire": {
                "Q3_interest": interest,
                "Q1_FDA_status": "Not_FDA_approved",
                "Q2_Research_status": "rarely_discussed",
                "Q8_supporting_evidence_references": [],
                "Q4_combination_therapy": null,
                "Q5_reasoning_makes_sense": true,
                "Q7_neurotoxicity_concern": false,
                "Q9_note": ""
            }
        }))
        .unwrap();
        record.completed = completed;
        record
    }

    async fn seeded(config: AnnotationConfig, drugs: Vec<(&str, DrugRecord)>) -> AnnotationRunner {
        let runner = AnnotationRunner::in_memory(config);
        runner
            .diseases()
            .upsert(DiseaseRecord::new("glioblastoma", drugs.into_iter().collect()))
            .await
            .unwrap();
        runner
    }

    #[tokio::test]
    async fn test_start_shows_first_open_drug() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![
                ("DrugA", drug(Some(true), "Of_interest")),
                ("DrugB", drug(Some(false), "Of_interest")),
            ],
        )
        .await;

        let view = runner.start_session(" A@Lab.org ", "Glioblastoma").await.unwrap();
        assert_eq!(
            view.phase,
            AnnotationPhase::EditingDrug {
                drug: "DrugB".to_string()
            }
        );
        assert_eq!(view.progress.to_string(), "1/2");
        assert!(view.can_go_back);

        let current = view.current.unwrap();
        assert_eq!(current.rationale_bullets.len(), 1);
        assert_eq!(current.form.schema, SchemaVersion::FdaSplit);

        let user = runner.users().find("a@lab.org").await.unwrap().unwrap();
        assert_eq!(user.assigned_disease, "glioblastoma");
    }

    #[tokio::test]
    async fn test_confirmed_advance_writes_only_changes() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![
                ("DrugA", drug(Some(false), "Of_interest")),
                ("DrugB", drug(Some(true), "Of_interest")),
            ],
        )
        .await;
        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();

        let mut form = view.current.unwrap().form.values();
        form.insert("Q1".to_string(), UiValue::text("Not of interest"));

        let view = runner.submit(&view.session_id, form).await.unwrap();
        assert_eq!(view.phase.name(), "confirm_advance");

        let outcome = runner.confirm(&view.session_id, true).await.unwrap();
        assert_eq!(outcome.drug, "DrugA");
        assert!(outcome.marked_complete);
        assert_eq!(outcome.written.len(), 1);
        assert_eq!(
            outcome
                .written
                .get(&FieldPath::questionnaire("DrugA", "Q3_interest")),
            Some(&json!("Not_of_interest"))
        );
        assert_eq!(outcome.view.phase, AnnotationPhase::AllComplete);
        assert_eq!(outcome.view.progress.to_string(), "2/2");

        let stored = runner.diseases().find("glioblastoma").await.unwrap().unwrap();
        let drug_a = stored.drug("DrugA").unwrap();
        assert!(drug_a.is_completed());
        assert_eq!(drug_a.questionnaire["Q3_interest"], json!("Not_of_interest"));

        let user = runner.users().find("a@lab.org").await.unwrap().unwrap();
        assert_eq!(user.last_drug.as_deref(), Some("DrugA"));
    }

    #[tokio::test]
    async fn test_all_complete_is_terminal() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![("DrugA", drug(Some(true), "Of_interest"))],
        )
        .await;

        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        assert_eq!(view.phase, AnnotationPhase::AllComplete);
        assert!(view.current.is_none());

        let err = runner
            .submit(&view.session_id, FormValues::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotationError::SessionComplete(_)));
        let err = runner.navigate_to(&view.session_id, "DrugA").await.unwrap_err();
        assert!(matches!(err, AnnotationError::SessionComplete(_)));
    }

    #[tokio::test]
    async fn test_cancel_keeps_drug_and_store() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![("DrugA", drug(Some(false), "Of_interest"))],
        )
        .await;
        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();

        let form = FormValues::from([("Q1".to_string(), UiValue::text("Not of interest"))]);
        runner.submit(&view.session_id, form).await.unwrap();

        let outcome = runner.confirm(&view.session_id, false).await.unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(
            outcome.view.phase,
            AnnotationPhase::EditingDrug {
                drug: "DrugA".to_string()
            }
        );

        let stored = runner.diseases().find("glioblastoma").await.unwrap().unwrap();
        assert_eq!(
            stored.drug("DrugA").unwrap().questionnaire["Q3_interest"],
            json!("Of_interest")
        );
        assert!(!stored.drug("DrugA").unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_navigation_and_back() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![
                ("DrugA", drug(Some(true), "Of_interest")),
                ("DrugB", drug(Some(true), "Of_interest")),
                ("DrugC", drug(Some(false), "Of_interest")),
            ],
        )
        .await;
        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        assert_eq!(view.phase.drug(), Some("DrugC"));

        let view = runner.go_back(&view.session_id).await.unwrap();
        assert_eq!(view.phase.drug(), Some("DrugB"));

        let view = runner.navigate_to(&view.session_id, "DrugA").await.unwrap();
        assert_eq!(view.phase.drug(), Some("DrugA"));
        assert!(!view.can_go_back);

        let err = runner.go_back(&view.session_id).await.unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidTransition { .. }));

        let err = runner
            .navigate_to(&view.session_id, "DrugZ")
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotationError::DrugNotFound { .. }));

        // Re-confirming a completed drug clears the override and moves on
        let session_id = view.session_id.clone();
        runner.submit(&session_id, FormValues::new()).await.unwrap();
        let outcome = runner.confirm(&session_id, true).await.unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.view.phase.drug(), Some("DrugC"));

        let user = runner.users().find("a@lab.org").await.unwrap().unwrap();
        assert_eq!(user.last_drug.as_deref(), Some("DrugA"));
    }

    #[tokio::test]
    async fn test_missing_completion_flags_are_backfilled() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![
                ("DrugA", drug(None, "Of_interest")),
                ("DrugB", drug(Some(true), "Of_interest")),
            ],
        )
        .await;

        runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        let stored = runner.diseases().find("glioblastoma").await.unwrap().unwrap();
        assert_eq!(stored.drug("DrugA").unwrap().completed, Some(false));
        assert_eq!(stored.drug("DrugB").unwrap().completed, Some(true));
    }

    #[tokio::test]
    async fn test_empty_field_mode_resumes_after_saved_drug() {
        let runner = seeded(
            AnnotationConfig::new(SchemaVersion::FdaSplit).with_mode(NavigationMode::EmptyField),
            vec![
                ("DrugA", drug(None, "")),
                ("DrugB", drug(None, "")),
            ],
        )
        .await;
        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        assert_eq!(view.phase.drug(), Some("DrugA"));

        // Leave DrugA incomplete; the scan resumes after it
        runner.submit(&view.session_id, FormValues::new()).await.unwrap();
        let outcome = runner.confirm(&view.session_id, true).await.unwrap();
        assert!(!outcome.marked_complete);
        assert_eq!(outcome.view.phase.drug(), Some("DrugB"));

        let stored = runner.diseases().find("glioblastoma").await.unwrap().unwrap();
        assert_eq!(stored.drug("DrugA").unwrap().completed, None);

        runner.end_session(&view.session_id).await.unwrap();
        let err = runner.render(&view.session_id).await.unwrap_err();
        assert!(matches!(err, AnnotationError::SessionNotFound(_)));

        let user = runner.users().find("a@lab.org").await.unwrap().unwrap();
        assert_eq!(user.last_drug.as_deref(), Some("DrugB"));
    }

    #[tokio::test]
    async fn test_document_schema_overrides_config() {
        let runner = AnnotationRunner::in_memory(AnnotationConfig::default());
        let mut record = DiseaseRecord::new(
            "glioblastoma",
            vec![("DrugA", DrugRecord::default())].into_iter().collect(),
        );
        record.schema_version = Some(SchemaVersion::Flat);
        runner.diseases().upsert(record).await.unwrap();

        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        assert_eq!(view.current.unwrap().form.schema, SchemaVersion::Flat);
    }

    #[tokio::test]
    async fn test_unknown_disease_and_invalid_answers() {
        let runner = seeded(
            AnnotationConfig::default(),
            vec![("DrugA", drug(Some(false), "Of_interest"))],
        )
        .await;

        let err = runner.start_session("a@lab.org", "melanoma").await.unwrap_err();
        assert!(matches!(err, AnnotationError::DiseaseNotFound(_)));

        let view = runner.start_session("a@lab.org", "glioblastoma").await.unwrap();
        let form = FormValues::from([("Q5".to_string(), UiValue::text("Perhaps"))]);
        let err = runner.submit(&view.session_id, form).await.unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidAnswer { .. }));

        let err = runner.confirm(&view.session_id, true).await.unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidTransition { .. }));
    }
}
