//! Questionnaire schema versions and their field tables.
//!
//! Stored documents went through several questionnaire shapes. Each shape is
//! one [`SchemaVersion`] with a static table of [`FieldSpec`]s; the binder
//! walks the table instead of carrying per-version form logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnnotationError;
use crate::navigator::NavigationMode;

/// Placeholder replaced by the disease name in disease-specific stored values
pub const DISEASE_PLACEHOLDER: &str = "{disease}";

pub const YES_LABEL: &str = "Yes";
pub const NO_LABEL: &str = "No";
pub const UNSET_LABEL: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    #[default]
    /// FDA status and research status as separate single choices,
    /// newline-separated references, tri-state flags
    FdaSplit,
    /// Research status as a multi-select with FDA approval folded in,
    /// comma-separated PMIDs
    ResearchStatus,
    /// Interest in the questionnaire, everything else as flat fields on the
    /// drug record
    Flat,
}

impl SchemaVersion {
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            SchemaVersion::FdaSplit => FDA_SPLIT_FIELDS,
            SchemaVersion::ResearchStatus => RESEARCH_STATUS_FIELDS,
            SchemaVersion::Flat => FLAT_FIELDS,
        }
    }

    /// Keys of fields stored directly on the drug record
    pub fn record_keys(self) -> impl Iterator<Item = &'static str> {
        self.fields()
            .iter()
            .filter(|spec| spec.location == FieldLocation::Record)
            .map(|spec| spec.db_key)
    }

    /// Navigation mode the version was originally annotated with
    pub fn default_navigation(self) -> NavigationMode {
        match self {
            SchemaVersion::FdaSplit | SchemaVersion::Flat => NavigationMode::CompletionFlag,
            SchemaVersion::ResearchStatus => NavigationMode::EmptyField,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::FdaSplit => "fda_split",
            SchemaVersion::ResearchStatus => "research_status",
            SchemaVersion::Flat => "flat",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fda_split" => Ok(SchemaVersion::FdaSplit),
            "research_status" => Ok(SchemaVersion::ResearchStatus),
            "flat" => Ok(SchemaVersion::Flat),
            other => Err(AnnotationError::InvalidAnswer {
                field: "schema_version".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Where a field is stored inside the drug record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// `drug_map.<drug>.questionnaire.<db_key>`
    Questionnaire,
    /// `drug_map.<drug>.<db_key>`
    Record,
}

/// One entry of a bidirectional label ↔ stored-value table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: &'static str,
    pub stored: &'static str,
}

impl ChoiceOption {
    const fn new(label: &'static str, stored: &'static str) -> Self {
        Self { label, stored }
    }

    pub fn stored_for(&self, disease: &str) -> String {
        resolve_template(self.stored, disease)
    }
}

/// Stored values starting with `prefix` are read as `canonical`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyAlias {
    pub prefix: &'static str,
    pub canonical: &'static str,
}

/// A separate stored field whose values surface as one extra label of a
/// multi-select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSource {
    pub db_key: &'static str,
    pub values: &'static [&'static str],
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSeparator {
    Newline,
    Comma,
}

impl ListSeparator {
    pub fn joiner(self) -> &'static str {
        match self {
            ListSeparator::Newline => "\n",
            ListSeparator::Comma => ", ",
        }
    }

    pub fn delimiter(self) -> char {
        match self {
            ListSeparator::Newline => '\n',
            ListSeparator::Comma => ',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Choice {
        options: &'static [ChoiceOption],
        aliases: &'static [LegacyAlias],
    },
    MultiChoice {
        options: &'static [ChoiceOption],
        fold: Option<FoldSource>,
    },
    /// Yes / No / unset
    TriState,
    TextList {
        separator: ListSeparator,
    },
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub ui_key: &'static str,
    pub prompt: &'static str,
    pub location: FieldLocation,
    pub db_key: &'static str,
    pub kind: FieldKind,
}

pub fn resolve_template(value: &str, disease: &str) -> String {
    value.replace(DISEASE_PLACEHOLDER, disease)
}

const INTEREST_WITH_FDA: &[ChoiceOption] = &[
    ChoiceOption::new("Of interest", "Of_interest"),
    ChoiceOption::new("Not of interest", "Not_of_interest"),
    ChoiceOption::new(
        "Have already tested (or FDA-approved)",
        "Have_already_tested (or FDA-approved)",
    ),
];

const INTEREST: &[ChoiceOption] = &[
    ChoiceOption::new("Of interest", "Of_interest"),
    ChoiceOption::new("Not of interest", "Not_of_interest"),
    ChoiceOption::new("Have already tested", "Have_already_tested"),
];

const FDA_STATUS: &[ChoiceOption] = &[
    ChoiceOption::new("FDA-Approved", "FDA_approved_for_{disease}"),
    ChoiceOption::new("FDA-Approved for other diseases", "FDA_approved_for_other_disease"),
    ChoiceOption::new("No", "Not_FDA_approved"),
];

const FDA_STATUS_ALIASES: &[LegacyAlias] = &[LegacyAlias {
    prefix: "FDA_approved_for_[Disease]",
    canonical: "FDA_approved_for_{disease}",
}];

const RESEARCH_STATUS: &[ChoiceOption] = &[
    ChoiceOption::new("FDA-Approved", "FDA_approved_for_other_disease"),
    ChoiceOption::new("Positive clinical outcomes", "positive_clinical_outcomes"),
    ChoiceOption::new("Negative clinical outcomes", "negative_clinical_outcomes"),
    ChoiceOption::new("Positive in-vivo outcomes", "positive_in_vivo_outcomes"),
    ChoiceOption::new("Negative in-vivo outcomes", "negative_in_vivo_outcomes"),
    ChoiceOption::new("Positive in-vitro outcomes", "positive_in_vitro_outcomes"),
    ChoiceOption::new("Negative in-vitro outcomes", "negative_in_vitro_outcomes"),
    ChoiceOption::new("Rarely discussed", "rarely_discussed"),
    ChoiceOption::new("Irrelevant drugs", "irrelevant_drugs"),
];

// Any disease-specific FDA approval reads as the generic one
const RESEARCH_STATUS_ALIASES: &[LegacyAlias] = &[LegacyAlias {
    prefix: "FDA_approved",
    canonical: "FDA_approved_for_other_disease",
}];

const FDA_FOLD: FoldSource = FoldSource {
    db_key: "Q1_FDA_status",
    values: &[
        "FDA_approved_for_{disease}",
        "FDA_approved_for_[Disease]",
        "FDA_approved_for_other_disease",
    ],
    label: "FDA-Approved",
};

const FDA_SPLIT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        ui_key: "Q1",
        prompt: "Q1. Is this drug of interest for repurposing?",
        location: FieldLocation::Questionnaire,
        db_key: "Q3_interest",
        kind: FieldKind::Choice {
            options: INTEREST_WITH_FDA,
            aliases: &[],
        },
    },
    FieldSpec {
        ui_key: "Q2",
        prompt: "Q2. What is the current FDA status?",
        location: FieldLocation::Questionnaire,
        db_key: "Q1_FDA_status",
        kind: FieldKind::Choice {
            options: FDA_STATUS,
            aliases: FDA_STATUS_ALIASES,
        },
    },
    FieldSpec {
        ui_key: "Q3",
        prompt: "Q3. What is the current testing status?",
        location: FieldLocation::Questionnaire,
        db_key: "Q2_Research_status",
        kind: FieldKind::Choice {
            options: RESEARCH_STATUS,
            aliases: RESEARCH_STATUS_ALIASES,
        },
    },
    FieldSpec {
        ui_key: "Q4",
        prompt: "Q4. Supporting Evidence (references)",
        location: FieldLocation::Questionnaire,
        db_key: "Q8_supporting_evidence_references",
        kind: FieldKind::TextList {
            separator: ListSeparator::Newline,
        },
    },
    FieldSpec {
        ui_key: "Q5",
        prompt: "Q5. Combination therapy possible?",
        location: FieldLocation::Questionnaire,
        db_key: "Q4_combination_therapy",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q6",
        prompt: "Q6. Does GPT's reasoning make sense?",
        location: FieldLocation::Questionnaire,
        db_key: "Q5_reasoning_makes_sense",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q7",
        prompt: "Q7. Neurotoxicity Concern?",
        location: FieldLocation::Questionnaire,
        db_key: "Q7_neurotoxicity_concern",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q8",
        prompt: "Q8. Additional Notes (Optional)",
        location: FieldLocation::Questionnaire,
        db_key: "Q9_note",
        kind: FieldKind::Text,
    },
];

const RESEARCH_STATUS_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        ui_key: "Q1",
        prompt: "Q1. Is this drug of interest for repurposing? (Please select one)",
        location: FieldLocation::Questionnaire,
        db_key: "Q3_interest",
        kind: FieldKind::Choice {
            options: INTEREST,
            aliases: &[],
        },
    },
    FieldSpec {
        ui_key: "Q2",
        prompt: "Q2. What is the current testing status? (Select all that apply)",
        location: FieldLocation::Questionnaire,
        db_key: "Q2_Research_status",
        kind: FieldKind::MultiChoice {
            options: RESEARCH_STATUS,
            fold: Some(FDA_FOLD),
        },
    },
    FieldSpec {
        ui_key: "Q3",
        prompt: "Q3. Combination therapy possible?",
        location: FieldLocation::Questionnaire,
        db_key: "Q4_combination_therapy",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q4",
        prompt: "Q4. Does GPT's reasoning make sense?",
        location: FieldLocation::Questionnaire,
        db_key: "Q5_reasoning_makes_sense",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q5",
        prompt: "Q5. Delivery Method Notes (e.g., oral, IV, nanoparticle, etc.)",
        location: FieldLocation::Questionnaire,
        db_key: "Q6_delivery_method_notes",
        kind: FieldKind::Text,
    },
    FieldSpec {
        ui_key: "Q6",
        prompt: "Q6. Neurotoxicity Concern?",
        location: FieldLocation::Questionnaire,
        db_key: "Q7_neurotoxicity_concern",
        kind: FieldKind::TriState,
    },
    FieldSpec {
        ui_key: "Q7",
        prompt: "Q7. Supporting Evidence (PMIDs, comma-separated)",
        location: FieldLocation::Questionnaire,
        db_key: "Q8_supporting_evidence_pmids",
        kind: FieldKind::TextList {
            separator: ListSeparator::Comma,
        },
    },
    FieldSpec {
        ui_key: "Q8",
        prompt: "Q8. Additional Notes (Optional)",
        location: FieldLocation::Questionnaire,
        db_key: "Q9_note",
        kind: FieldKind::Text,
    },
];

const FLAT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        ui_key: "Q1",
        prompt: "Q1. Is this drug of interest for repurposing?",
        location: FieldLocation::Questionnaire,
        db_key: "Q3_interest",
        kind: FieldKind::Choice {
            options: INTEREST,
            aliases: &[],
        },
    },
    FieldSpec {
        ui_key: "Q2",
        prompt: "Q2. What is the latest status?",
        location: FieldLocation::Record,
        db_key: "latest_status",
        kind: FieldKind::Choice {
            options: RESEARCH_STATUS,
            aliases: RESEARCH_STATUS_ALIASES,
        },
    },
    FieldSpec {
        ui_key: "Q3",
        prompt: "Q3. Preclinical results",
        location: FieldLocation::Record,
        db_key: "preclinical_results",
        kind: FieldKind::Text,
    },
    FieldSpec {
        ui_key: "Q4",
        prompt: "Q4. Supporting Evidence (references)",
        location: FieldLocation::Record,
        db_key: "references",
        kind: FieldKind::TextList {
            separator: ListSeparator::Newline,
        },
    },
    FieldSpec {
        ui_key: "Q5",
        prompt: "Q5. Notes",
        location: FieldLocation::Record,
        db_key: "notes",
        kind: FieldKind::Text,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_version_has_unique_keys() {
        for version in [
            SchemaVersion::FdaSplit,
            SchemaVersion::ResearchStatus,
            SchemaVersion::Flat,
        ] {
            let ui: HashSet<_> = version.fields().iter().map(|f| f.ui_key).collect();
            let db: HashSet<_> = version.fields().iter().map(|f| f.db_key).collect();
            assert_eq!(ui.len(), version.fields().len(), "{version}");
            assert_eq!(db.len(), version.fields().len(), "{version}");
        }
    }

    #[test]
    fn test_option_labels_are_unique() {
        for options in [INTEREST_WITH_FDA, INTEREST, FDA_STATUS, RESEARCH_STATUS] {
            let labels: HashSet<_> = options.iter().map(|o| o.label).collect();
            assert_eq!(labels.len(), options.len());
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(
            "research_status".parse::<SchemaVersion>().unwrap(),
            SchemaVersion::ResearchStatus
        );
        assert_eq!(SchemaVersion::Flat.to_string(), "flat");
        assert!("v4".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_disease_template() {
        assert_eq!(
            FDA_STATUS[0].stored_for("glioblastoma"),
            "FDA_approved_for_glioblastoma"
        );
        assert_eq!(FDA_STATUS[2].stored_for("glioblastoma"), "Not_FDA_approved");
    }
}
