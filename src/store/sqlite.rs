// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::diff::ListingPatch;
use crate::store::models::{FieldValue, ListingRecord, RawApiLogEntry};
use crate::store::traits::{ListingStore, ResponseLog, StoreError};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Mapped column names in the order `ListingRecord::fields` yields them.
static LISTING_COLUMNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    ListingRecord::new(0)
        .fields()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
});

static UPSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let columns = LISTING_COLUMNS.join(", ");
    let placeholders = vec!["?"; LISTING_COLUMNS.len() + 2].join(", ");
    let updates = LISTING_COLUMNS
        .iter()
        .chain(std::iter::once(&"api_log_id"))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO listings (external_id, {columns}, api_log_id) VALUES ({placeholders}) \
         ON CONFLICT(external_id) DO UPDATE SET {updates}"
    )
});

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        // Access is strictly sequential, one connection is enough
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                external_id INTEGER PRIMARY KEY,
                licence_plate TEXT,
                vin TEXT,
                engine_name TEXT,
                engine_code TEXT,
                engine_type TEXT,
                price INTEGER,
                prices TEXT NOT NULL DEFAULT '[]',
                odometer_km INTEGER,
                status TEXT,
                days_for_sale INTEGER,
                dates_published TEXT,
                dates_removed TEXT,
                dates_changed TEXT,
                dates_sold TEXT,
                brand TEXT,
                model TEXT,
                series TEXT,
                generation TEXT,
                chassis TEXT,
                model_year INTEGER,
                name TEXT,
                sales_name TEXT,
                transmission_type TEXT,
                color TEXT,
                number_of_doors INTEGER,
                acceleration_0_to_100_kmh REAL,
                power_kw REAL,
                horsepower_hp REAL,
                electric_engine TEXT,
                type_of_electric_car TEXT,
                trim_packages TEXT NOT NULL DEFAULT '[]',
                fuels TEXT NOT NULL DEFAULT '[]',
                awards TEXT,
                url TEXT,
                source TEXT,
                wltp_fuel_consumption_combined_min REAL,
                wltp_fuel_consumption_combined_max REAL,
                wltp_co2_emission_combined_min REAL,
                wltp_co2_emission_combined_max REAL,
                nedc_fuel_consumption_combined_min REAL,
                nedc_fuel_consumption_combined_max REAL,
                nedc_co2_emission_combined_min REAL,
                nedc_co2_emission_combined_max REAL,
                euro_ncap_year INTEGER,
                euro_ncap_result INTEGER,
                image_urls TEXT NOT NULL DEFAULT '[]',
                api_log_id TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_logs (
                id TEXT PRIMARY KEY,
                received_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite listing store schema");
        Ok(())
    }

    /// Read back a raw payload by correlation id
    #[cfg(test)]
    pub async fn get_log_entry(&self, id: Uuid) -> Result<Option<RawApiLogEntry>, StoreError> {
        let row = sqlx::query("SELECT id, received_at, payload FROM api_logs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let received_at = chrono::DateTime::parse_from_rfc3339(&row.try_get::<String, _>("received_at")?)
            .map_err(|e| StoreError::Malformed(format!("received_at: {e}")))?
            .with_timezone(&chrono::Utc);

        Ok(Some(RawApiLogEntry {
            id,
            received_at,
            payload: serde_json::from_str(&row.try_get::<String, _>("payload")?)?,
        }))
    }
}

fn json_column(value: &Value) -> Result<Option<String>, StoreError> {
    match value {
        Value::Null => Ok(None),
        other => Ok(Some(serde_json::to_string(other)?)),
    }
}

fn bind_field<'q>(query: SqliteQuery<'q>, value: &FieldValue) -> Result<SqliteQuery<'q>, StoreError> {
    Ok(match value {
        FieldValue::Int(v) => query.bind(*v),
        FieldValue::Float(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::Json(v) => query.bind(json_column(v)?),
    })
}

fn listing_from_row(row: &SqliteRow) -> Result<ListingRecord, StoreError> {
    let text = |column: &str| row.try_get::<Option<String>, _>(column);
    let int = |column: &str| row.try_get::<Option<i64>, _>(column);
    let float = |column: &str| row.try_get::<Option<f64>, _>(column);
    let json = |column: &str| -> Result<Value, StoreError> {
        match text(column)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Value::Null),
        }
    };
    let list = |column: &str| -> Result<Vec<Value>, StoreError> {
        match json(column)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::Malformed(format!("{column} is not a list: {other}"))),
        }
    };

    let api_log_id = text("api_log_id")?
        .map(|raw| Uuid::parse_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Malformed(format!("api_log_id: {e}")))?;

    Ok(ListingRecord {
        external_id: row.try_get("external_id")?,
        licence_plate: text("licence_plate")?,
        vin: text("vin")?,
        engine_name: text("engine_name")?,
        engine_code: text("engine_code")?,
        engine_type: text("engine_type")?,
        price: int("price")?,
        prices: list("prices")?,
        odometer_km: int("odometer_km")?,
        status: text("status")?,
        days_for_sale: int("days_for_sale")?,
        dates_published: text("dates_published")?,
        dates_removed: text("dates_removed")?,
        dates_changed: text("dates_changed")?,
        dates_sold: text("dates_sold")?,
        brand: text("brand")?,
        model: text("model")?,
        series: text("series")?,
        generation: text("generation")?,
        chassis: text("chassis")?,
        model_year: int("model_year")?,
        name: text("name")?,
        sales_name: text("sales_name")?,
        transmission_type: text("transmission_type")?,
        color: text("color")?,
        number_of_doors: int("number_of_doors")?,
        acceleration_0_to_100_kmh: float("acceleration_0_to_100_kmh")?,
        power_kw: float("power_kw")?,
        horsepower_hp: float("horsepower_hp")?,
        electric_engine: json("electric_engine")?,
        type_of_electric_car: text("type_of_electric_car")?,
        trim_packages: list("trim_packages")?,
        fuels: list("fuels")?,
        awards: json("awards")?,
        url: text("url")?,
        source: text("source")?,
        wltp_fuel_consumption_combined_min: float("wltp_fuel_consumption_combined_min")?,
        wltp_fuel_consumption_combined_max: float("wltp_fuel_consumption_combined_max")?,
        wltp_co2_emission_combined_min: float("wltp_co2_emission_combined_min")?,
        wltp_co2_emission_combined_max: float("wltp_co2_emission_combined_max")?,
        nedc_fuel_consumption_combined_min: float("nedc_fuel_consumption_combined_min")?,
        nedc_fuel_consumption_combined_max: float("nedc_fuel_consumption_combined_max")?,
        nedc_co2_emission_combined_min: float("nedc_co2_emission_combined_min")?,
        nedc_co2_emission_combined_max: float("nedc_co2_emission_combined_max")?,
        euro_ncap_year: int("euro_ncap_year")?,
        euro_ncap_result: int("euro_ncap_result")?,
        image_urls: list("image_urls")?,
        api_log_id,
    })
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn list_external_ids(&self, offset: u64, limit: u64) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query("SELECT external_id FROM listings ORDER BY external_id LIMIT ?1 OFFSET ?2")
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("external_id").map_err(StoreError::from))
            .collect()
    }

    async fn ids_missing_images(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT external_id FROM listings \
             WHERE external_id IN ({placeholders}) \
             AND (image_urls IS NULL OR image_urls IN ('', '[]')) \
             ORDER BY external_id"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("external_id").map_err(StoreError::from))
            .collect()
    }

    async fn get_listing(&self, external_id: i64) -> Result<Option<ListingRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM listings WHERE external_id = ?1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(listing_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_listing(&self, record: &ListingRecord) -> Result<(), StoreError> {
        let mut query = sqlx::query(UPSERT_SQL.as_str()).bind(record.external_id);
        for (_, value) in record.fields() {
            query = bind_field(query, &value)?;
        }
        query = query.bind(record.api_log_id.map(|id| id.to_string()));

        query.execute(&self.pool).await?;

        debug!(external_id = record.external_id, "Upserted listing");
        Ok(())
    }

    async fn patch_listing(
        &self,
        patch: &ListingPatch,
        api_log_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let assignments = patch
            .columns()
            .map(|column| format!("{column} = ?"))
            .chain(std::iter::once("api_log_id = ?".to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        // `IS` compares NULLs as equal, so the guard also holds for null columns
        let guards = patch
            .columns()
            .map(|column| format!(" AND {column} IS ?"))
            .collect::<String>();
        let sql = format!("UPDATE listings SET {assignments} WHERE external_id = ?{guards}");

        let mut query = sqlx::query(&sql);
        for change in patch.changes.values() {
            query = bind_field(query, &change.new)?;
        }
        query = query
            .bind(api_log_id.map(|id| id.to_string()))
            .bind(patch.external_id);
        for change in patch.changes.values() {
            query = bind_field(query, &change.old)?;
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(patch.external_id));
        }

        debug!(
            external_id = patch.external_id,
            columns = patch.len(),
            "Patched listing"
        );
        Ok(())
    }
}

#[async_trait]
impl ResponseLog for SqliteStore {
    async fn log_response(&self, payload: &Value) -> Result<Uuid, StoreError> {
        let entry = RawApiLogEntry::new(payload.clone());

        sqlx::query("INSERT INTO api_logs (id, received_at, payload) VALUES (?1, ?2, ?3)")
            .bind(entry.id.to_string())
            .bind(entry.received_at.to_rfc3339())
            .bind(serde_json::to_string(&entry.payload)?)
            .execute(&self.pool)
            .await?;

        debug!(log_id = %entry.id, "Logged provider response");
        Ok(entry.id)
    }
}
