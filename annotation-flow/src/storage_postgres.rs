use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::error::{AnnotationError, Result};
use crate::record::{DRUG_MAP_ROOT, DiseaseRecord, FieldDiff, FieldPath, UserRecord};
use crate::storage::{DiseaseRepository, UserRepository};

/// PostgreSQL document store.
///
/// Disease documents are kept as JSONB. JSONB does not preserve object key
/// order, so the drug order lives in its own `drug_order` column and is
/// reapplied on read. Partial updates go through `jsonb_set` on the path
/// segments, never a read-modify-write of the whole document.
#[derive(Clone)]
pub struct PostgresAnnotationStore {
    pool: PgPool,
}

impl PostgresAnnotationStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS diseases (
                disease     TEXT PRIMARY KEY,
                drug_order  TEXT[] NOT NULL DEFAULT '{}',
                document    JSONB NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotators (
                email             TEXT PRIMARY KEY,
                assigned_disease  TEXT NOT NULL,
                last_drug         TEXT,
                created_at        TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Annotation tables ready");
        Ok(())
    }
}

/// Makes sure every object between the drug and the leaf exists, since
/// `jsonb_set` only creates the last key
async fn ensure_parents(
    tx: &mut Transaction<'_, Postgres>,
    disease_key: &str,
    path: &FieldPath,
) -> Result<()> {
    let segments = path.segments();
    for depth in 3..segments.len() {
        let prefix = segments[..depth].to_vec();
        sqlx::query(
            r#"
            UPDATE diseases
            SET document = jsonb_set(document, $2, COALESCE(document #> $2, '{}'::jsonb), true)
            WHERE disease = $1
            "#,
        )
        .bind(disease_key)
        .bind(prefix)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl DiseaseRepository for PostgresAnnotationStore {
    async fn find(&self, disease_key: &str) -> Result<Option<DiseaseRecord>> {
        let row: Option<(Vec<String>, Json<DiseaseRecord>)> =
            sqlx::query_as("SELECT drug_order, document FROM diseases WHERE disease = $1")
                .bind(disease_key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(order, Json(mut record))| {
            record.drug_map.reorder(&order);
            record
        }))
    }

    async fn update_fields(&self, disease_key: &str, updates: &FieldDiff) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM diseases WHERE disease = $1 FOR UPDATE")
            .bind(disease_key)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AnnotationError::DiseaseNotFound(disease_key.to_string()));
        }

        for (path, value) in updates {
            let segments = path.segments();
            if segments.len() < 3 || segments[0] != DRUG_MAP_ROOT {
                return Err(AnnotationError::InvalidPath(path.to_string()));
            }

            let drug_path = segments[..2].to_vec();
            let has_drug: (bool,) =
                sqlx::query_as("SELECT (document #> $2) IS NOT NULL FROM diseases WHERE disease = $1")
                    .bind(disease_key)
                    .bind(drug_path)
                    .fetch_one(&mut *tx)
                    .await?;
            if !has_drug.0 {
                return Err(AnnotationError::DrugNotFound {
                    disease: disease_key.to_string(),
                    drug: segments[1].clone(),
                });
            }

            ensure_parents(&mut tx, disease_key, path).await?;

            sqlx::query(
                r#"
                UPDATE diseases
                SET document = jsonb_set(document, $2, $3, true),
                    updated_at = NOW()
                WHERE disease = $1
                "#,
            )
            .bind(disease_key)
            .bind(segments.to_vec())
            .bind(Json(value))
            .execute(&mut *tx)
            .await?;

            debug!(disease = %disease_key, path = %path, "Field updated");
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert(&self, record: DiseaseRecord) -> Result<()> {
        let order: Vec<String> = record.drug_map.names().map(str::to_string).collect();

        sqlx::query(
            r#"
            INSERT INTO diseases (disease, drug_order, document, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (disease) DO UPDATE
            SET drug_order = EXCLUDED.drug_order,
                document = EXCLUDED.document,
                updated_at = NOW()
            "#,
        )
        .bind(&record.disease_key)
        .bind(order)
        .bind(Json(&record))
        .execute(&self.pool)
        .await?;

        info!(disease = %record.disease_key, drugs = record.drug_map.len(), "Disease upserted");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresAnnotationStore {
    async fn find(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, chrono::DateTime<chrono::Utc>)>(
            "SELECT email, assigned_disease, last_drug, created_at FROM annotators WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(email, assigned_disease, last_drug, created_at)| UserRecord {
            email,
            assigned_disease,
            last_drug,
            created_at,
        }))
    }

    async fn insert_if_absent(&self, user: UserRecord) -> Result<UserRecord> {
        sqlx::query(
            r#"
            INSERT INTO annotators (email, assigned_disease, last_drug, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&user.email)
        .bind(&user.assigned_disease)
        .bind(&user.last_drug)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        UserRepository::find(self, &user.email)
            .await?
            .ok_or_else(|| AnnotationError::UserNotFound(user.email.clone()))
    }

    async fn set_last_drug(&self, email: &str, drug: &str) -> Result<()> {
        let result = sqlx::query("UPDATE annotators SET last_drug = $2 WHERE email = $1")
            .bind(email)
            .bind(drug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AnnotationError::UserNotFound(email.to_string()));
        }
        Ok(())
    }
}
