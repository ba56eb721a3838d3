use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::settings::{Confirmation, Environment, Form, FormSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::NotApplicable => "N/A",
        }
    }

    pub fn from_str(s: &str) -> Option<PaymentStatus> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Paid" => Some(PaymentStatus::Paid),
            "Cancelled" => Some(PaymentStatus::Cancelled),
            "N/A" => Some(PaymentStatus::NotApplicable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub unit_price: BigDecimal,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// A form submission (the order) and everything the integration stores on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub form_id: i64,
    #[serde(default)]
    pub source_url: String,
    /// Submitted field values keyed by field label or id.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub payment_request_number: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_amount: Option<BigDecimal>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn order_total(&self) -> BigDecimal {
        self.line_items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + &item.unit_price * BigDecimal::from(item.quantity))
    }
}

/// Values written when a submission enters the payment flow.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub payment_request_number: String,
    pub status: PaymentStatus,
    pub amount: BigDecimal,
    pub environment: Option<Environment>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("entry {0} does not exist")]
    EntryMissing(i64),
    #[error("seed data could not be loaded: {0}")]
    Seed(String),
}

/// Submissions and their payment state.
///
/// Every write is a per-field overwrite: applying the same update twice leaves
/// the same record, and concurrent writers resolve last-write-wins per field.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>, StoreError>;
    /// Newest entry carrying this request number.
    async fn find_by_request_number(&self, request_number: &str) -> Result<Option<Entry>, StoreError>;
    async fn order_total(&self, _form: &Form, entry: &Entry) -> Result<BigDecimal, StoreError> {
        Ok(entry.order_total())
    }
    async fn record_submission(&self, entry_id: i64, record: &SubmissionRecord) -> Result<(), StoreError>;
    async fn update_status(&self, entry_id: i64, status: PaymentStatus) -> Result<(), StoreError>;
    /// `None` leaves the stored value untouched.
    async fn update_payment(&self, entry_id: i64, amount: Option<&BigDecimal>, date: Option<NaiveDate>) -> Result<(), StoreError>;
    async fn merge_metadata(&self, entry_id: i64, meta: &BTreeMap<String, String>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait FormStore: Send + Sync {
    async fn get_form(&self, form_id: i64) -> Result<Option<Form>, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    forms: RwLock<HashMap<i64, Form>>,
    entries: RwLock<BTreeMap<i64, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Self {
        Self {
            forms: RwLock::new(seed.forms.into_iter().map(|f| (f.id, f)).collect()),
            entries: RwLock::new(seed.entries.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    pub async fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let seed: StoreSeed = serde_json::from_str(&raw).map_err(|e| StoreError::Seed(e.to_string()))?;
        tracing::info!(forms = seed.forms.len(), entries = seed.entries.len(), "loaded store seed");
        Ok(Self::from_seed(seed))
    }

    pub async fn insert_form(&self, form: Form) {
        self.forms.write().await.insert(form.id, form);
    }

    pub async fn insert_entry(&self, entry: Entry) {
        self.entries.write().await.insert(entry.id, entry);
    }

    async fn with_entry<F>(&self, entry_id: i64, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entry) + Send,
    {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&entry_id).ok_or(StoreError::EntryMissing(entry_id))?;
        apply(entry);
        Ok(())
    }
}

#[async_trait]
impl EntryStore for InMemoryStore {
    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>, StoreError> {
        Ok(self.entries.read().await.get(&entry_id).cloned())
    }

    async fn find_by_request_number(&self, request_number: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .rev()
            .find(|e| e.payment_request_number.as_deref() == Some(request_number))
            .cloned())
    }

    async fn record_submission(&self, entry_id: i64, record: &SubmissionRecord) -> Result<(), StoreError> {
        self.with_entry(entry_id, |entry| {
            entry.payment_request_number = Some(record.payment_request_number.clone());
            entry.payment_status = Some(record.status);
            entry.payment_amount = Some(record.amount.clone());
            if let Some(env) = record.environment {
                entry.meta.insert("upay_environment".to_string(), env.as_str().to_string());
            }
        })
        .await
    }

    async fn update_status(&self, entry_id: i64, status: PaymentStatus) -> Result<(), StoreError> {
        self.with_entry(entry_id, |entry| entry.payment_status = Some(status)).await
    }

    async fn update_payment(&self, entry_id: i64, amount: Option<&BigDecimal>, date: Option<NaiveDate>) -> Result<(), StoreError> {
        let amount = amount.cloned();
        self.with_entry(entry_id, |entry| {
            if let Some(amount) = amount {
                entry.payment_amount = Some(amount);
            }
            if let Some(date) = date {
                entry.payment_date = Some(date);
            }
        })
        .await
    }

    async fn merge_metadata(&self, entry_id: i64, meta: &BTreeMap<String, String>) -> Result<(), StoreError> {
        self.with_entry(entry_id, |entry| {
            entry.meta.extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
        .await
    }
}

#[async_trait]
impl FormStore for InMemoryStore {
    async fn get_form(&self, form_id: i64) -> Result<Option<Form>, StoreError> {
        Ok(self.forms.read().await.get(&form_id).cloned())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    form_id: i64,
    source_url: String,
    fields: Json<BTreeMap<String, String>>,
    line_items: Json<Vec<LineItem>>,
    payment_request_number: Option<String>,
    payment_status: Option<String>,
    payment_amount: Option<BigDecimal>,
    payment_date: Option<NaiveDate>,
    meta: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            form_id: row.form_id,
            source_url: row.source_url,
            fields: row.fields.0,
            line_items: row.line_items.0,
            payment_request_number: row.payment_request_number,
            payment_status: row.payment_status.as_deref().and_then(PaymentStatus::from_str),
            payment_amount: row.payment_amount,
            payment_date: row.payment_date,
            meta: row.meta.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FormRow {
    id: i64,
    title: String,
    settings: Json<FormSettings>,
    confirmations: Json<Vec<Confirmation>>,
}

const ENTRY_COLUMNS: &str = "id, form_id, source_url, fields, line_items, payment_request_number, payment_status, payment_amount, payment_date, meta, created_at";

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    fn expect_row(entry_id: i64, rows_affected: u64) -> Result<(), StoreError> {
        if rows_affected == 0 {
            return Err(StoreError::EntryMissing(entry_id));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryStore for PgStore {
    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!("SELECT {ENTRY_COLUMNS} FROM upay_entries WHERE id = $1"))
            .bind(entry_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Entry::from))
    }

    async fn find_by_request_number(&self, request_number: &str) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM upay_entries WHERE payment_request_number = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(request_number)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Entry::from))
    }

    async fn record_submission(&self, entry_id: i64, record: &SubmissionRecord) -> Result<(), StoreError> {
        let env_meta = match record.environment {
            Some(env) => serde_json::json!({ "upay_environment": env.as_str() }),
            None => serde_json::json!({}),
        };
        let result = sqlx::query(
            r#"UPDATE upay_entries
               SET payment_request_number = $2,
                   payment_status = $3,
                   payment_amount = $4,
                   meta = meta || $5::jsonb,
                   updated_at = now()
               WHERE id = $1"#,
        )
        .bind(entry_id)
        .bind(&record.payment_request_number)
        .bind(record.status.as_str())
        .bind(record.amount.clone())
        .bind(Json(env_meta))
        .execute(&self.db)
        .await?;
        Self::expect_row(entry_id, result.rows_affected())
    }

    async fn update_status(&self, entry_id: i64, status: PaymentStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE upay_entries SET payment_status = $2, updated_at = now() WHERE id = $1")
            .bind(entry_id)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;
        Self::expect_row(entry_id, result.rows_affected())
    }

    async fn update_payment(&self, entry_id: i64, amount: Option<&BigDecimal>, date: Option<NaiveDate>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE upay_entries
               SET payment_amount = COALESCE($2, payment_amount),
                   payment_date = COALESCE($3, payment_date),
                   updated_at = now()
               WHERE id = $1"#,
        )
        .bind(entry_id)
        .bind(amount.cloned())
        .bind(date)
        .execute(&self.db)
        .await?;
        Self::expect_row(entry_id, result.rows_affected())
    }

    async fn merge_metadata(&self, entry_id: i64, meta: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE upay_entries SET meta = meta || $2::jsonb, updated_at = now() WHERE id = $1")
            .bind(entry_id)
            .bind(Json(meta))
            .execute(&self.db)
            .await?;
        Self::expect_row(entry_id, result.rows_affected())
    }
}

#[async_trait]
impl FormStore for PgStore {
    async fn get_form(&self, form_id: i64) -> Result<Option<Form>, StoreError> {
        let row = sqlx::query_as::<_, FormRow>("SELECT id, title, settings, confirmations FROM upay_forms WHERE id = $1")
            .bind(form_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| Form { id: r.id, title: r.title, settings: r.settings.0, confirmations: r.confirmations.0 }))
    }
}
