//! Drug selection and progress.
//!
//! Selection is pure: it reads a drug map snapshot and a
//! [`NavigationContext`] and returns the drug to show. Persisting the
//! resume point is the runner's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::context::NavigationContext;
use crate::error::AnnotationError;
use crate::record::{DrugMap, DrugRecord};
use crate::schema::SchemaVersion;

/// How a drug counts as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// The stored `completed` flag decides; first unflagged drug is next
    CompletionFlag,
    /// A drug is open while any questionnaire answer is empty; scanning
    /// resumes after the last visited drug
    EmptyField,
}

impl NavigationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationMode::CompletionFlag => "completion_flag",
            NavigationMode::EmptyField => "empty_field",
        }
    }
}

impl fmt::Display for NavigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavigationMode {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion_flag" => Ok(NavigationMode::CompletionFlag),
            "empty_field" => Ok(NavigationMode::EmptyField),
            other => Err(AnnotationError::InvalidAnswer {
                field: "navigation_mode".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Derived on every render, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// 1-based position of the current drug
    pub position: Option<usize>,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// One row of the drug list shown next to the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugStatus {
    pub name: String,
    pub completed: bool,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    mode: NavigationMode,
    /// Fields outside the questionnaire that empty-field mode also checks
    record_keys: Vec<&'static str>,
}

impl Navigator {
    /// Navigator that only looks at questionnaire answers
    pub fn new(mode: NavigationMode) -> Self {
        Self {
            mode,
            record_keys: Vec::new(),
        }
    }

    pub fn for_schema(mode: NavigationMode, schema: SchemaVersion) -> Self {
        Self {
            mode,
            record_keys: schema.record_keys().collect(),
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.mode
    }

    pub fn is_complete(&self, drug: &DrugRecord) -> bool {
        match self.mode {
            NavigationMode::CompletionFlag => drug.is_completed(),
            NavigationMode::EmptyField => !drug.has_empty_answer(&self.record_keys),
        }
    }

    /// Picks the drug to show, or `None` once every drug is complete.
    ///
    /// An explicit `navigate_to` naming a known drug wins in both modes.
    pub fn select_current_drug(
        &self,
        drug_map: &DrugMap,
        context: &NavigationContext,
    ) -> Option<String> {
        if let Some(target) = context.navigate_to.as_deref() {
            if drug_map.contains(target) {
                debug!(drug = %target, "Navigation override");
                return Some(target.to_string());
            }
            debug!(drug = %target, "Ignoring override for unknown drug");
        }

        let selected = match self.mode {
            NavigationMode::CompletionFlag => self.first_incomplete(drug_map, 0),
            NavigationMode::EmptyField => {
                let resume_from = context
                    .last_visited
                    .as_deref()
                    .and_then(|last| drug_map.position(last))
                    .map(|idx| idx + 1);

                resume_from
                    .and_then(|start| self.first_incomplete(drug_map, start))
                    .or_else(|| self.first_incomplete(drug_map, 0))
            }
        };

        debug!(mode = %self.mode, selected = ?selected, "Selected drug");
        selected
    }

    fn first_incomplete(&self, drug_map: &DrugMap, start: usize) -> Option<String> {
        drug_map
            .iter()
            .skip(start)
            .find(|(_, record)| !self.is_complete(record))
            .map(|(name, _)| name.to_string())
    }

    /// Drug before `current` in stored order
    pub fn previous_drug(&self, drug_map: &DrugMap, current: &str) -> Option<String> {
        let idx = drug_map.position(current)?;
        let prev = idx.checked_sub(1)?;
        drug_map.get_index(prev).map(|(name, _)| name.to_string())
    }

    pub fn progress(&self, drug_map: &DrugMap, current: Option<&str>) -> Progress {
        Progress {
            completed: drug_map
                .iter()
                .filter(|(_, record)| self.is_complete(record))
                .count(),
            total: drug_map.len(),
            position: current
                .and_then(|name| drug_map.position(name))
                .map(|idx| idx + 1),
        }
    }

    pub fn drug_statuses(&self, drug_map: &DrugMap, current: Option<&str>) -> Vec<DrugStatus> {
        drug_map
            .iter()
            .map(|(name, record)| DrugStatus {
                name: name.to_string(),
                completed: self.is_complete(record),
                current: current == Some(name),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flagged(completed: bool) -> DrugRecord {
        DrugRecord {
            completed: Some(completed),
            ..DrugRecord::default()
        }
    }

    fn answered(filled: bool) -> DrugRecord {
        let mut record = DrugRecord::default();
        record
            .questionnaire
            .insert("Q3_interest".to_string(), json!("Of_interest"));
        record.questionnaire.insert(
            "Q9_note".to_string(),
            if filled { json!("checked") } else { json!("") },
        );
        record
    }

    fn map(entries: Vec<(&str, DrugRecord)>) -> DrugMap {
        entries.into_iter().collect()
    }

    #[test]
    fn test_completion_flag_returns_first_open_drug() {
        let drugs = map(vec![("DrugA", flagged(true)), ("DrugB", flagged(false))]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);

        let selected = navigator.select_current_drug(&drugs, &NavigationContext::new());
        assert_eq!(selected.as_deref(), Some("DrugB"));

        let progress = navigator.progress(&drugs, selected.as_deref());
        assert_eq!(progress.to_string(), "1/2");
        assert_eq!(progress.position, Some(2));
    }

    #[test]
    fn test_completion_flag_missing_flag_is_open() {
        let drugs = map(vec![("DrugA", flagged(true)), ("DrugB", DrugRecord::default())]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);

        assert_eq!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::new())
                .as_deref(),
            Some("DrugB")
        );
    }

    #[test]
    fn test_completion_flag_all_done() {
        let drugs = map(vec![("DrugA", flagged(true)), ("DrugB", flagged(true))]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);

        assert!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::new())
                .is_none()
        );
        assert!(navigator.select_current_drug(&DrugMap::new(), &NavigationContext::new()).is_none());
    }

    #[test]
    fn test_override_wins_over_completion() {
        let drugs = map(vec![("DrugA", flagged(true)), ("DrugB", flagged(true))]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);
        let mut context = NavigationContext::new();
        context.request_navigation("DrugA");

        assert_eq!(
            navigator.select_current_drug(&drugs, &context).as_deref(),
            Some("DrugA")
        );

        context.request_navigation("Unknown");
        assert!(navigator.select_current_drug(&drugs, &context).is_none());
    }

    #[test]
    fn test_empty_field_all_answered_returns_none() {
        let drugs = map(vec![("DrugA", answered(true)), ("DrugB", answered(true))]);
        let navigator = Navigator::new(NavigationMode::EmptyField);

        assert!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::new())
                .is_none()
        );
        assert!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::resuming_from(Some("DrugA".into())))
                .is_none()
        );
    }

    #[test]
    fn test_empty_field_resumes_after_last_visited() {
        let drugs = map(vec![
            ("DrugA", answered(false)),
            ("DrugB", answered(true)),
            ("DrugC", answered(false)),
        ]);
        let navigator = Navigator::new(NavigationMode::EmptyField);

        let context = NavigationContext::resuming_from(Some("DrugB".to_string()));
        assert_eq!(
            navigator.select_current_drug(&drugs, &context).as_deref(),
            Some("DrugC")
        );

        // Nothing open after DrugC, so the scan wraps to the start
        let context = NavigationContext::resuming_from(Some("DrugC".to_string()));
        assert_eq!(
            navigator.select_current_drug(&drugs, &context).as_deref(),
            Some("DrugA")
        );

        assert_eq!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::new())
                .as_deref(),
            Some("DrugA")
        );
    }

    #[test]
    fn test_empty_field_ignores_false_answers() {
        let mut record = answered(true);
        record
            .questionnaire
            .insert("Q4_combination_therapy".to_string(), json!(false));
        let drugs = map(vec![("DrugA", record)]);

        let navigator = Navigator::new(NavigationMode::EmptyField);
        assert!(
            navigator
                .select_current_drug(&drugs, &NavigationContext::new())
                .is_none()
        );
    }

    #[test]
    fn test_empty_field_checks_flat_record_fields() {
        let mut blank_status = answered(true);
        blank_status
            .extra
            .insert("latest_status".to_string(), json!(""));
        for key in ["preclinical_results", "references", "notes"] {
            blank_status.extra.insert(key.to_string(), json!("x"));
        }
        let drugs = map(vec![("DrugA", blank_status)]);

        let questionnaire_only = Navigator::new(NavigationMode::EmptyField);
        assert!(
            questionnaire_only
                .select_current_drug(&drugs, &NavigationContext::new())
                .is_none()
        );

        let flat = Navigator::for_schema(NavigationMode::EmptyField, SchemaVersion::Flat);
        assert_eq!(
            flat.select_current_drug(&drugs, &NavigationContext::new())
                .as_deref(),
            Some("DrugA")
        );
        assert_eq!(flat.progress(&drugs, None).to_string(), "0/1");
    }

    #[test]
    fn test_previous_drug() {
        let drugs = map(vec![("DrugA", flagged(false)), ("DrugB", flagged(false))]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);

        assert_eq!(navigator.previous_drug(&drugs, "DrugB").as_deref(), Some("DrugA"));
        assert!(navigator.previous_drug(&drugs, "DrugA").is_none());
        assert!(navigator.previous_drug(&drugs, "Missing").is_none());
    }

    #[test]
    fn test_drug_statuses_mark_current() {
        let drugs = map(vec![("DrugA", flagged(true)), ("DrugB", flagged(false))]);
        let navigator = Navigator::new(NavigationMode::CompletionFlag);

        let statuses = navigator.drug_statuses(&drugs, Some("DrugB"));
        assert_eq!(
            statuses,
            vec![
                DrugStatus {
                    name: "DrugA".to_string(),
                    completed: true,
                    current: false
                },
                DrugStatus {
                    name: "DrugB".to_string(),
                    completed: false,
                    current: true
                },
            ]
        );
    }
}
