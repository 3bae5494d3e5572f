use annotation_flow::{DiseaseRecord, DrugMap, FormValues, SchemaVersion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub email: String,
    pub disease: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub drug: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub answers: FormValues,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub confirm: bool,
}

/// Body of `PUT /diseases/{disease}`; the key comes from the path
#[derive(Debug, Serialize, Deserialize)]
pub struct DiseaseDocument {
    #[serde(default)]
    pub parent_disease: Option<String>,
    #[serde(default)]
    pub annotator: Option<String>,
    #[serde(default)]
    pub schema_version: Option<SchemaVersion>,
    pub drug_map: DrugMap,
}

impl DiseaseDocument {
    pub fn into_record(self, disease_key: String) -> DiseaseRecord {
        let mut record = DiseaseRecord::new(disease_key, self.drug_map);
        record.parent_disease = self.parent_disease;
        record.annotator = self.annotator;
        record.schema_version = self.schema_version;
        record
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiseaseResponse {
    pub disease: String,
    pub drugs: usize,
    pub status: String,
}
