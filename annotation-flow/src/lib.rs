pub mod binder;
pub mod context;
pub mod error;
pub mod navigator;
pub mod record;
pub mod runner;
pub mod schema;
pub mod session;
pub mod storage;
#[cfg(feature = "postgres")]
pub mod storage_postgres;

// Re-export commonly used types
pub use binder::{FieldDefault, FormDefaults, FormValues, QuestionnaireBinder, UiValue, Widget};
pub use context::NavigationContext;
pub use error::{AnnotationError, Result};
pub use navigator::{DrugStatus, NavigationMode, Navigator, Progress};
pub use record::{
    DiseaseRecord, DrugMap, DrugRecord, FieldDiff, FieldPath, Questionnaire, UserRecord,
};
pub use runner::{AnnotationConfig, AnnotationRunner, AnnotationView, CommitOutcome, DrugView};
pub use schema::SchemaVersion;
pub use session::{AnnotationPhase, Session};
pub use storage::{
    DiseaseRepository, InMemoryDiseaseRepository, InMemorySessionStorage, InMemoryUserRepository,
    SessionStorage, UserRepository,
};
#[cfg(feature = "postgres")]
pub use storage_postgres::PostgresAnnotationStore;
