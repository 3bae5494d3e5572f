//! Questionnaire form binding: stored values → widget defaults (prefill) and
//! widget values → minimal storage diff (commit).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{AnnotationError, Result};
use crate::record::{DiseaseRecord, DrugRecord, FieldDiff, FieldPath, is_empty_answer};
use crate::schema::{
    ChoiceOption, FieldKind, FieldLocation, FieldSpec, FoldSource, LegacyAlias, ListSeparator,
    NO_LABEL, SchemaVersion, UNSET_LABEL, YES_LABEL, resolve_template,
};

/// Value of one widget as the UI surface sends and receives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiValue {
    List(Vec<String>),
    Text(String),
    Unset,
}

impl UiValue {
    pub fn text(value: impl Into<String>) -> Self {
        UiValue::Text(value.into())
    }
}

/// Submitted form: UI key → widget value
pub type FormValues = BTreeMap<String, UiValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    SingleChoice,
    MultiChoice,
    TriState,
    TextList,
    Text,
}

/// Everything the UI needs to render one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefault {
    pub ui_key: String,
    pub prompt: String,
    pub widget: Widget,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub value: UiValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefaults {
    pub schema: SchemaVersion,
    pub fields: Vec<FieldDefault>,
}

impl FormDefaults {
    /// The defaults as an unchanged submission
    pub fn values(&self) -> FormValues {
        self.fields
            .iter()
            .map(|field| (field.ui_key.clone(), field.value.clone()))
            .collect()
    }
}

/// Binds one schema version's field table to a disease's stored values
#[derive(Debug, Clone)]
pub struct QuestionnaireBinder {
    schema: SchemaVersion,
    disease: String,
}

impl QuestionnaireBinder {
    /// `disease` fills disease-specific stored values such as
    /// `FDA_approved_for_<disease>`
    pub fn new(schema: SchemaVersion, disease: impl Into<String>) -> Self {
        Self {
            schema,
            disease: disease.into(),
        }
    }

    /// Uses the parent disease for per-annotator copies
    pub fn for_record(schema: SchemaVersion, record: &DiseaseRecord) -> Self {
        let disease = record
            .parent_disease
            .clone()
            .unwrap_or_else(|| record.disease_key.clone());
        Self::new(schema, disease)
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn prefill(&self, drug: &DrugRecord) -> FormDefaults {
        let fields = self
            .schema
            .fields()
            .iter()
            .map(|spec| self.prefill_field(spec, drug))
            .collect();

        FormDefaults {
            schema: self.schema,
            fields,
        }
    }

    /// Diff of `form` against `drug`, addressed under `drug_name`.
    ///
    /// Fields missing from `form` are left alone. A field is written only
    /// when its new value differs both from what is stored and from what
    /// the prefilled form would submit; an unanswered field that stays
    /// unanswered is not a change.
    pub fn commit(&self, drug_name: &str, drug: &DrugRecord, form: &FormValues) -> Result<FieldDiff> {
        let mut diff = FieldDiff::new();

        for spec in self.schema.fields() {
            let Some(ui_value) = form.get(spec.ui_key) else {
                continue;
            };

            let new_value = self.to_stored(spec, ui_value)?;

            // Legacy shapes and unrecognized values prefill in normalized
            // form; submitting that form back is not an edit
            let untouched = self.to_stored(spec, &self.prefill_field(spec, drug).value).ok();
            if untouched.as_ref() == Some(&new_value) {
                continue;
            }

            let old_value = stored_value(spec, drug).cloned().unwrap_or(Value::Null);

            if is_empty_answer(&old_value) && is_empty_answer(&new_value) {
                continue;
            }
            if old_value != new_value {
                debug!(field = spec.db_key, "Field changed");
                diff.insert(field_path(spec, drug_name), new_value);
            }
        }

        Ok(diff)
    }

    /// Checks every submitted value against its field's vocabulary
    pub fn validate(&self, form: &FormValues) -> Result<()> {
        for spec in self.schema.fields() {
            if let Some(ui_value) = form.get(spec.ui_key) {
                self.to_stored(spec, ui_value)?;
            }
        }
        Ok(())
    }

    fn prefill_field(&self, spec: &FieldSpec, drug: &DrugRecord) -> FieldDefault {
        let stored = stored_value(spec, drug);

        let (widget, options, value) = match spec.kind {
            FieldKind::Choice { options, aliases } => (
                Widget::SingleChoice,
                labels(options),
                self.choice_label(spec, options, aliases, stored),
            ),
            FieldKind::MultiChoice { options, fold } => (
                Widget::MultiChoice,
                labels(options),
                self.multi_choice_labels(spec, options, fold, stored, drug),
            ),
            FieldKind::TriState => (
                Widget::TriState,
                vec![
                    UNSET_LABEL.to_string(),
                    YES_LABEL.to_string(),
                    NO_LABEL.to_string(),
                ],
                UiValue::text(match stored {
                    Some(Value::Bool(true)) => YES_LABEL,
                    Some(Value::Bool(false)) => NO_LABEL,
                    _ => UNSET_LABEL,
                }),
            ),
            FieldKind::TextList { separator } => (
                Widget::TextList,
                Vec::new(),
                UiValue::Text(as_string_list(stored).join(separator.joiner())),
            ),
            FieldKind::Text => (
                Widget::Text,
                Vec::new(),
                UiValue::Text(match stored {
                    Some(Value::String(s)) => s.clone(),
                    _ => String::new(),
                }),
            ),
        };

        FieldDefault {
            ui_key: spec.ui_key.to_string(),
            prompt: spec.prompt.to_string(),
            widget,
            options,
            value,
        }
    }

    fn choice_label(
        &self,
        spec: &FieldSpec,
        options: &[ChoiceOption],
        aliases: &[LegacyAlias],
        stored: Option<&Value>,
    ) -> UiValue {
        let Some(raw) = stored.and_then(Value::as_str) else {
            return UiValue::Unset;
        };

        let canonical = self.canonicalize(raw, aliases);
        match self.label_for(options, &canonical) {
            Some(label) => UiValue::text(label),
            None => {
                if !raw.is_empty() {
                    warn!(field = spec.db_key, value = raw, "Unrecognized stored value, leaving unselected");
                }
                UiValue::Unset
            }
        }
    }

    fn multi_choice_labels(
        &self,
        spec: &FieldSpec,
        options: &[ChoiceOption],
        fold: Option<FoldSource>,
        stored: Option<&Value>,
        drug: &DrugRecord,
    ) -> UiValue {
        if let Some(Value::String(_)) = stored {
            debug!(field = spec.db_key, "Normalizing single stored value to a list");
        }

        let mut selected: Vec<String> = Vec::new();
        for raw in as_string_list(stored) {
            match self.label_for(options, &raw) {
                Some(label) if !selected.iter().any(|s| s == label) => selected.push(label.to_string()),
                Some(_) => {}
                None => warn!(field = spec.db_key, value = %raw, "Dropping unrecognized stored value"),
            }
        }

        if let Some(fold) = fold {
            let folded = drug
                .questionnaire
                .get(fold.db_key)
                .and_then(Value::as_str)
                .is_some_and(|raw| {
                    fold.values
                        .iter()
                        .any(|v| resolve_template(v, &self.disease) == raw)
                });

            if folded && !selected.iter().any(|s| s == fold.label) {
                selected.insert(0, fold.label.to_string());
            }
        }

        UiValue::List(selected)
    }

    fn to_stored(&self, spec: &FieldSpec, ui_value: &UiValue) -> Result<Value> {
        match spec.kind {
            FieldKind::Choice { options, .. } => match ui_value {
                UiValue::Unset => Ok(Value::Null),
                UiValue::Text(label) if label.is_empty() => Ok(Value::Null),
                UiValue::Text(label) => self.stored_for_label(spec, options, label),
                UiValue::List(_) => Err(invalid(spec, ui_value)),
            },
            FieldKind::MultiChoice { options, .. } => {
                let picked: Vec<&String> = match ui_value {
                    UiValue::Unset => Vec::new(),
                    UiValue::Text(label) if label.is_empty() => Vec::new(),
                    UiValue::Text(label) => vec![label],
                    UiValue::List(items) => items.iter().collect(),
                };
                let stored = picked
                    .into_iter()
                    .map(|label| self.stored_for_label(spec, options, label))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(stored))
            }
            FieldKind::TriState => match ui_value {
                UiValue::Unset => Ok(Value::Null),
                UiValue::Text(label) => match label.as_str() {
                    YES_LABEL => Ok(Value::Bool(true)),
                    NO_LABEL => Ok(Value::Bool(false)),
                    UNSET_LABEL | "" => Ok(Value::Null),
                    _ => Err(invalid(spec, ui_value)),
                },
                UiValue::List(_) => Err(invalid(spec, ui_value)),
            },
            FieldKind::TextList { separator } => {
                let items = match ui_value {
                    UiValue::Unset => Vec::new(),
                    UiValue::Text(text) => parse_list(text, separator),
                    UiValue::List(items) => items
                        .iter()
                        .map(|item| item.trim())
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect(),
                };
                Ok(Value::Array(items.into_iter().map(Value::String).collect()))
            }
            FieldKind::Text => match ui_value {
                UiValue::Unset => Ok(Value::String(String::new())),
                UiValue::Text(text) => Ok(Value::String(text.clone())),
                UiValue::List(_) => Err(invalid(spec, ui_value)),
            },
        }
    }

    fn canonicalize(&self, raw: &str, aliases: &[LegacyAlias]) -> String {
        for alias in aliases {
            if raw.starts_with(alias.prefix) {
                let canonical = resolve_template(alias.canonical, &self.disease);
                if canonical != raw {
                    warn!(from = raw, to = %canonical, "Normalizing legacy stored value");
                }
                return canonical;
            }
        }
        raw.to_string()
    }

    /// Older documents hold the label itself instead of the stored value
    fn label_for<'a>(&self, options: &'a [ChoiceOption], stored: &str) -> Option<&'a str> {
        options
            .iter()
            .find(|option| option.stored_for(&self.disease) == stored)
            .or_else(|| options.iter().find(|option| option.label == stored))
            .map(|option| option.label)
    }

    fn stored_for_label(&self, spec: &FieldSpec, options: &[ChoiceOption], label: &str) -> Result<Value> {
        options
            .iter()
            .find(|option| option.label == label)
            .map(|option| Value::String(option.stored_for(&self.disease)))
            .ok_or_else(|| AnnotationError::InvalidAnswer {
                field: spec.ui_key.to_string(),
                value: label.to_string(),
            })
    }
}

fn stored_value<'a>(spec: &FieldSpec, drug: &'a DrugRecord) -> Option<&'a Value> {
    match spec.location {
        FieldLocation::Questionnaire => drug.questionnaire.get(spec.db_key),
        FieldLocation::Record => drug.extra.get(spec.db_key),
    }
}

fn field_path(spec: &FieldSpec, drug_name: &str) -> FieldPath {
    match spec.location {
        FieldLocation::Questionnaire => FieldPath::questionnaire(drug_name, spec.db_key),
        FieldLocation::Record => FieldPath::drug_field(drug_name, spec.db_key),
    }
}

fn labels(options: &[ChoiceOption]) -> Vec<String> {
    options.iter().map(|o| o.label.to_string()).collect()
}

/// A single stored string reads as a one-element list
fn as_string_list(stored: Option<&Value>) -> Vec<String> {
    match stored {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_list(text: &str, separator: ListSeparator) -> Vec<String> {
    text.split(separator.delimiter())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(spec: &FieldSpec, ui_value: &UiValue) -> AnnotationError {
    AnnotationError::InvalidAnswer {
        field: spec.ui_key.to_string(),
        value: serde_json::to_string(ui_value).unwrap_or_default(),
    }
}
