use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AnnotationError, Result};
use crate::schema::SchemaVersion;

/// Top-level key under which drug records live inside a disease document
pub const DRUG_MAP_ROOT: &str = "drug_map";
/// Key of the nested questionnaire object inside a drug record
pub const QUESTIONNAIRE_ROOT: &str = "questionnaire";

/// Stored answers keyed by question key. Shapes vary across schema versions.
pub type Questionnaire = Map<String, Value>;

/// Trims and lowercases an identifier (email or disease key)
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `""`, `null`, `[]` and `{}` count as unanswered. `false` is an answer.
pub fn is_empty_answer(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// One drug inside a disease document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    #[serde(default)]
    pub rationale_bullets: Vec<String>,
    /// `None` when the document predates the completion flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default)]
    pub questionnaire: Questionnaire,
    /// Flat schema-specific fields (`latest_status`, `notes`, ...) and
    /// anything else the loader stored alongside the drug
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DrugRecord {
    pub fn is_completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }

    /// Any questionnaire answer empty, or any of `record_keys` missing or
    /// empty on the record itself
    pub fn has_empty_answer(&self, record_keys: &[&str]) -> bool {
        self.questionnaire.values().any(is_empty_answer)
            || record_keys
                .iter()
                .any(|key| self.extra.get(*key).is_none_or(is_empty_answer))
    }
}

/// Drug name → record, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugMap {
    entries: Vec<(String, DrugRecord)>,
}

impl DrugMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; a replaced drug keeps its position
    pub fn insert(&mut self, name: impl Into<String>, record: DrugRecord) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = record,
            None => self.entries.push((name, record)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DrugRecord> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, record)| record)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DrugRecord> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, record)| record)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DrugRecord)> {
        self.entries.iter().map(|(key, record)| (key.as_str(), record))
    }

    pub fn get_index(&self, idx: usize) -> Option<(&str, &DrugRecord)> {
        self.entries
            .get(idx)
            .map(|(key, record)| (key.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorders entries to follow `order`. Drugs missing from `order` keep
    /// their relative order after the listed ones.
    pub fn reorder(&mut self, order: &[String]) {
        let rank = |name: &str| order.iter().position(|o| o == name).unwrap_or(usize::MAX);
        self.entries.sort_by_key(|(name, _)| rank(name));
    }
}

impl<K: Into<String>> FromIterator<(K, DrugRecord)> for DrugMap {
    fn from_iter<I: IntoIterator<Item = (K, DrugRecord)>>(iter: I) -> Self {
        let mut map = DrugMap::new();
        for (name, record) in iter {
            map.insert(name, record);
        }
        map
    }
}

impl Serialize for DrugMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, record) in &self.entries {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DrugMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DrugMapVisitor;

        impl<'de> Visitor<'de> for DrugMapVisitor {
            type Value = DrugMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of drug name to drug record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<DrugMap, A::Error> {
                let mut map = DrugMap::new();
                while let Some((name, record)) = access.next_entry::<String, DrugRecord>()? {
                    map.insert(name, record);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(DrugMapVisitor)
    }
}

/// One disease document: the unit an annotation session works on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    #[serde(rename = "disease")]
    pub disease_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_disease: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<SchemaVersion>,
    #[serde(default)]
    pub drug_map: DrugMap,
}

impl DiseaseRecord {
    pub fn new(disease_key: impl Into<String>, drug_map: DrugMap) -> Self {
        Self {
            disease_key: disease_key.into(),
            parent_disease: None,
            annotator: None,
            schema_version: None,
            drug_map,
        }
    }

    /// Per-annotator copy of a disease, keyed `<disease>_<annotator>`
    pub fn annotator_copy(disease: &str, annotator: &str, drug_map: DrugMap) -> Self {
        let parent = normalize_key(disease);
        let annotator = normalize_key(annotator).replace(' ', "_");
        Self {
            disease_key: format!("{}_{}", parent, annotator),
            parent_disease: Some(parent),
            annotator: Some(annotator),
            schema_version: None,
            drug_map,
        }
    }

    pub fn drug(&self, name: &str) -> Result<&DrugRecord> {
        self.drug_map
            .get(name)
            .ok_or_else(|| AnnotationError::DrugNotFound {
                disease: self.disease_key.clone(),
                drug: name.to_string(),
            })
    }

    /// `$set`-style partial update: writes `value` at `path`, creating
    /// intermediate objects below the drug as needed
    pub fn apply_update(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let (drug, rest) = match path.segments() {
            [root, drug, rest @ ..] if root == DRUG_MAP_ROOT && !rest.is_empty() => (drug, rest),
            _ => return Err(AnnotationError::InvalidPath(path.to_string())),
        };

        let disease = self.disease_key.clone();
        let record = self
            .drug_map
            .get_mut(drug)
            .ok_or_else(|| AnnotationError::DrugNotFound {
                disease,
                drug: drug.clone(),
            })?;

        let mut doc = serde_json::to_value(&*record)?;
        if !set_at(&mut doc, rest, value) {
            return Err(AnnotationError::InvalidPath(path.to_string()));
        }
        *record = serde_json::from_value(doc)?;
        Ok(())
    }
}

fn set_at(target: &mut Value, segments: &[String], value: Value) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut cursor = target;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return false;
        };
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    match cursor {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        _ => false,
    }
}

/// Address of one stored field, rendered as a dotted path
/// (`drug_map.<drug>.questionnaire.<key>`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn questionnaire(drug: &str, key: &str) -> Self {
        Self(vec![
            DRUG_MAP_ROOT.to_string(),
            drug.to_string(),
            QUESTIONNAIRE_ROOT.to_string(),
            key.to_string(),
        ])
    }

    pub fn drug_field(drug: &str, field: &str) -> Self {
        Self(vec![
            DRUG_MAP_ROOT.to_string(),
            drug.to_string(),
            field.to_string(),
        ])
    }

    pub fn completed(drug: &str) -> Self {
        Self::drug_field(drug, "completed")
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Partial update: storage path → new value
pub type FieldDiff = BTreeMap<FieldPath, Value>;

/// An annotator. Created once, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub assigned_disease: String,
    #[serde(default)]
    pub last_drug: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: impl Into<String>, assigned_disease: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            assigned_disease: assigned_disease.into(),
            last_drug: None,
            created_at: Utc::now(),
        }
    }
}
