use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use itertools::Itertools;
use serde_json::Value;
use sqlx::{
    migrate::{MigrateDatabase, Migrator},
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Executor, PgPool, Postgres, QueryBuilder, Row,
};
use tracing::debug;

use crate::{
    config::schema::DEFAULT_SRID,
    data_types::{
        ColumnType, JsonObject, NewUploadRecord, TableData, UploadId, UploadKind,
        UploadRecord,
    },
    utils::{qualified_name, quote_identifier},
};

use super::interface::{Error, Repository, Result};

// Postgres caps the number of bind parameters in a single statement
const BIND_LIMIT: usize = 65535;

const RECORD_COLUMNS: &str =
    "id, kind, name, file, uploaded_time, ST_AsText(geometry) AS geometry";

#[derive(Debug)]
pub struct PostgresRepository {
    pub executor: PgPool,
    pub schema_name: String,
}

impl PostgresRepository {
    pub const MIGRATOR: Migrator = sqlx::migrate!("migrations/postgres");

    pub async fn try_new(dsn: String, schema_name: String) -> Result<Self> {
        if !Postgres::database_exists(&dsn).await? {
            let _ = Postgres::create_database(&dsn).await;
        }

        let repo = PostgresRepository::connect(dsn, schema_name.clone()).await?;

        repo.executor
            .execute(
                format!(
                    "CREATE SCHEMA IF NOT EXISTS {};",
                    quote_identifier(&schema_name)
                )
                .as_str(),
            )
            .await?;

        // Setup the schema
        repo.setup().await?;
        Ok(repo)
    }

    pub async fn connect(dsn: String, schema_name: String) -> Result<Self> {
        let schema_name_2 = schema_name.clone();

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(16)
            .idle_timeout(Duration::from_millis(30000))
            .test_before_acquire(true)
            .after_connect(move |c, _m| {
                let schema_name = quote_identifier(&schema_name);
                Box::pin(async move {
                    let query = format!("SET search_path TO {schema_name},public;");
                    c.execute(sqlx::query(&query)).await?;
                    Ok(())
                })
            })
            .connect(&dsn)
            .await?;

        Ok(Self {
            executor: pool,
            schema_name: schema_name_2,
        })
    }

    pub fn interpret_error(error: sqlx::Error, relation: &str) -> Error {
        if let sqlx::Error::Database(ref d) = error {
            // Reference: https://www.postgresql.org/docs/current/errcodes-appendix.html
            if let Some(code) = d.code() {
                if code == "42P01" {
                    return Error::RelationDoesNotExist {
                        name: relation.to_string(),
                    };
                }
            }
        }
        Error::SqlxError(error)
    }

    fn table(&self, table_name: &str) -> String {
        qualified_name(&self.schema_name, table_name)
    }

    fn record_from_row(row: &PgRow) -> Result<UploadRecord> {
        let kind: String = row.try_get("kind")?;
        let kind = kind
            .parse::<UploadKind>()
            .map_err(|_| Error::UnknownUploadKind(kind))?;

        Ok(UploadRecord {
            id: row.try_get("id")?,
            kind,
            name: row.try_get("name")?,
            file: row.try_get("file")?,
            uploaded_time: row.try_get("uploaded_time")?,
            geometry: row.try_get("geometry")?,
        })
    }

    fn text_cell(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn setup(&self) -> Result<()> {
        Self::MIGRATOR.run(&self.executor).await?;
        Ok(())
    }

    async fn create_upload(&self, record: &NewUploadRecord) -> Result<UploadRecord> {
        let row = sqlx::query(&format!(
            r#"
        INSERT INTO upload_record (kind, name, file, uploaded_time, geometry)
        VALUES ($1, $2, $3, $4, ST_GeomFromText($5, {DEFAULT_SRID}))
        RETURNING {RECORD_COLUMNS}
        "#
        ))
        .bind(record.kind.as_ref())
        .bind(&record.name)
        .bind(&record.file)
        .bind(Utc::now())
        .bind(&record.geometry)
        .fetch_one(&self.executor)
        .await?;

        Self::record_from_row(&row)
    }

    async fn get_upload(&self, id: UploadId) -> Result<Option<UploadRecord>> {
        sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM upload_record WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .as_ref()
        .map(Self::record_from_row)
        .transpose()
    }

    async fn list_uploads(&self) -> Result<Vec<UploadRecord>> {
        sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM upload_record ORDER BY uploaded_time DESC, id DESC"
        ))
        .fetch_all(&self.executor)
        .await?
        .iter()
        .map(Self::record_from_row)
        .collect()
    }

    async fn delete_upload(&self, id: UploadId) -> Result<Option<UploadRecord>> {
        sqlx::query(&format!(
            "DELETE FROM upload_record WHERE id = $1 RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .as_ref()
        .map(Self::record_from_row)
        .transpose()
    }

    async fn replace_table(&self, table_name: &str, data: &TableData) -> Result<u64> {
        if data.columns.is_empty() {
            return Err(Error::NoColumns {
                name: table_name.to_string(),
            });
        }

        let table = self.table(table_name);
        let column_defs = data
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type.to_sql()))
            .join(", ");
        let column_names = data
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .join(", ");

        let mut tx = self.executor.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {table} ({column_defs})"))
            .execute(&mut *tx)
            .await?;

        let rows_per_statement = (BIND_LIMIT / data.columns.len()).max(1);
        let mut written = 0;

        for chunk in data.rows.chunks(rows_per_statement) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {table} ({column_names}) "));

            builder.push_values(chunk, |mut b, row| {
                for (column, value) in data.columns.iter().zip(row) {
                    let value = column.column_type.coerce(value);
                    match column.column_type {
                        ColumnType::Boolean => {
                            b.push_bind(value.as_bool());
                        }
                        ColumnType::BigInt => {
                            b.push_bind(value.as_i64());
                        }
                        ColumnType::Double => {
                            b.push_bind(value.as_f64());
                        }
                        ColumnType::Text => {
                            b.push_bind(Self::text_cell(value));
                        }
                        ColumnType::Geometry { srid } => {
                            b.push("ST_GeomFromText(")
                                .push_bind_unseparated(Self::text_cell(value))
                                .push_unseparated(format!(", {srid})"));
                        }
                    }
                }
            });

            written += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!("Replaced table {table} with {written} row(s)");

        Ok(written)
    }

    async fn drop_table(&self, table_name: &str) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table(table_name)))
            .execute(&self.executor)
            .await?;
        Ok(())
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(self.table(table_name))
            .fetch_one(&self.executor)
            .await?;
        Ok(exists)
    }

    async fn select_rows(
        &self,
        relation: &str,
        geometry_column: Option<&str>,
    ) -> Result<Vec<JsonObject>> {
        let quoted = quote_identifier(relation);

        let sql = match geometry_column {
            Some(column) => format!(
                r#"SELECT
                    (to_jsonb(t) - $1::text)
                    || jsonb_build_object($1::text, ST_AsGeoJSON(t.{}, 15)::jsonb)
                FROM {quoted} AS t"#,
                quote_identifier(column)
            ),
            None => format!("SELECT to_jsonb(t) FROM {quoted} AS t"),
        };

        let mut query = sqlx::query_scalar::<_, Json<JsonObject>>(&sql);
        if let Some(column) = geometry_column {
            query = query.bind(column.to_string());
        }

        let rows = query
            .fetch_all(&self.executor)
            .await
            .map_err(|e| Self::interpret_error(e, relation))?;

        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }
}

pub mod testutils {
    use uuid::Uuid;

    use super::PostgresRepository;

    pub fn get_random_schema() -> String {
        format!("test_{}", Uuid::new_v4().simple())
    }

    pub async fn make_repository(dsn: &str) -> PostgresRepository {
        let schema_name = get_random_schema();

        PostgresRepository::try_new(dsn.to_string(), schema_name)
            .await
            .expect("Error setting up the database")
    }
}
