use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::binder::FormValues;
use crate::context::NavigationContext;

/// Where a session stands in the annotation workflow. A missing session is
/// the not-logged-in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnnotationPhase {
    /// Started; the next render picks a drug
    AwaitingDrugSelection,
    EditingDrug { drug: String },
    /// Answers submitted, waiting for the annotator to confirm moving on
    ConfirmAdvance { drug: String },
    /// Terminal for this session
    AllComplete,
}

impl AnnotationPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationPhase::AwaitingDrugSelection => "awaiting_drug_selection",
            AnnotationPhase::EditingDrug { .. } => "editing_drug",
            AnnotationPhase::ConfirmAdvance { .. } => "confirm_advance",
            AnnotationPhase::AllComplete => "all_complete",
        }
    }

    pub fn drug(&self) -> Option<&str> {
        match self {
            AnnotationPhase::EditingDrug { drug } | AnnotationPhase::ConfirmAdvance { drug } => {
                Some(drug)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AnnotationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Session information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub email: String,
    pub disease_key: String,
    pub phase: AnnotationPhase,
    pub navigation: NavigationContext,
    /// Submitted answers held until the advance is confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_form: Option<FormValues>,
}

impl Session {
    pub fn new(email: impl Into<String>, disease_key: impl Into<String>, navigation: NavigationContext) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            disease_key: disease_key.into(),
            phase: AnnotationPhase::AwaitingDrugSelection,
            navigation,
            pending_form: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == AnnotationPhase::AllComplete
    }
}
