//! Vaccine batch inventory with first-expiry-first-out deduction.
//!
//! Batches live in the keyed record store like every other screen. Each
//! change to a batch's remaining quantity also appends a [`StockMovement`]
//! to the `stock_movements` table, which is never rewritten.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crud::{Collection, CrudContext, CrudError, FormErrors, InsertAt, Record, Validator};
use crate::db::{self, DatabaseError};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{MovementType, StockStatus};
use crate::pipeline::{
    count_where, group_by, in_date_range, text_matches, Choice, RecordFilter, Screen,
};

/// Batches expiring within this many days are flagged.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

const VACCINES: &[(&str, &str)] = &[
    ("BCG", "Serum Institute"),
    ("OPV", "Bharat Biotech"),
    ("DTP", "Sanofi Pasteur"),
    ("Measles", "Serum Institute"),
    ("Hepatitis B", "GSK"),
    ("Rotavirus", "Merck"),
    ("Pneumococcal", "Pfizer"),
    ("HPV", "Merck"),
];

pub const FACILITIES: &[&str] = &["FAC001", "FAC002", "FAC003"];
const RECORD_COUNT: usize = 40;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No available stock for vaccine: {vaccine} in facility: {facility}")]
    NoStock { vaccine: String, facility: String },

    #[error("Insufficient stock. Available: {available}, requested: {requested} for batch {batch}")]
    Insufficient {
        available: u32,
        requested: u32,
        batch: String,
    },

    #[error("Batch number {batch} already exists in facility {facility}")]
    DuplicateBatch { batch: String, facility: String },

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Vaccine mismatch for batch {0}")]
    VaccineMismatch(String),

    #[error("Invalid form: {0}")]
    Invalid(FormErrors),

    #[error(transparent)]
    Crud(CrudError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<CrudError> for InventoryError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Invalid(errors) => Self::Invalid(errors),
            CrudError::NotFound(id) => Self::BatchNotFound(id),
            other => Self::Crud(other),
        }
    }
}

impl From<rusqlite::Error> for InventoryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineBatch {
    pub id: u64,
    pub batch_number: String,
    pub vaccine_name: String,
    pub manufacturer: String,
    pub quantity_received: u32,
    pub quantity_remaining: u32,
    pub expiry_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub facility_id: String,
    pub created_at: DateTime<Utc>,
}

impl VaccineBatch {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }

    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        self.expiry_date < today + Duration::days(EXPIRY_WARNING_DAYS)
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    /// Usable for deduction: stock left and not yet at its expiry date.
    pub fn is_available(&self, today: NaiveDate) -> bool {
        self.quantity_remaining > 0 && self.expiry_date > today
    }
}

impl Record for VaccineBatch {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub facility_id: String,
    pub vaccine_name: String,
    pub batch_number: String,
    pub movement_type: MovementType,
    pub quantity: u32,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    fn for_batch(
        batch: &VaccineBatch,
        movement_type: MovementType,
        quantity: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            facility_id: batch.facility_id.clone(),
            vaccine_name: batch.vaccine_name.clone(),
            batch_number: batch.batch_number.clone(),
            movement_type,
            quantity,
            reason: Some(reason.into()),
            created_at: Utc::now(),
        }
    }
}

/// Per-vaccine totals over available batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub vaccine_id: String,
    pub vaccine_name: String,
    pub current_quantity: u64,
    pub oldest_expiry_date: Option<NaiveDate>,
    pub status: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_batches: usize,
    pub total_doses: u64,
    pub expiring_soon: usize,
    pub expired: usize,
    pub depleted: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InventoryFilter {
    pub search: Option<String>,
    pub vaccine_name: Choice<String>,
    pub facility_id: Choice<String>,
    pub expiry_from: Option<NaiveDate>,
    pub expiry_to: Option<NaiveDate>,
}

impl RecordFilter<VaccineBatch> for InventoryFilter {
    fn matches(&self, b: &VaccineBatch) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&b.batch_number, &b.vaccine_name, &b.manufacturer],
        ) && self.vaccine_name.admits_str(&b.vaccine_name)
            && self.facility_id.admits_str(&b.facility_id)
            && in_date_range(self.expiry_from, self.expiry_to, b.expiry_date)
    }
}

impl CsvRow for VaccineBatch {
    const HEADERS: &'static [&'static str] = &[
        "Batch Number",
        "Vaccine",
        "Manufacturer",
        "Received",
        "Remaining",
        "Receipt Date",
        "Expiry Date",
        "Facility",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.batch_number.clone(),
            self.vaccine_name.clone(),
            self.manufacturer.clone(),
            self.quantity_received.to_string(),
            self.quantity_remaining.to_string(),
            self.receipt_date.to_string(),
            self.expiry_date.to_string(),
            self.facility_id.clone(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Movement journal
// ═══════════════════════════════════════════════════════════

pub fn record_movement(conn: &Connection, movement: &StockMovement) -> Result<(), InventoryError> {
    conn.execute(
        "INSERT INTO stock_movements
            (id, facility_id, vaccine_name, batch_number, movement_type, quantity, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            movement.id,
            movement.facility_id,
            movement.vaccine_name,
            movement.batch_number,
            movement.movement_type.as_str(),
            movement.quantity,
            movement.reason,
            movement.created_at.to_rfc3339(),
        ],
    )?;
    tracing::info!(
        batch = %movement.batch_number,
        kind = %movement.movement_type,
        quantity = movement.quantity,
        "Stock movement recorded"
    );
    Ok(())
}

/// Movements for one facility, optionally narrowed to a batch, oldest first.
pub fn list_movements(
    conn: &Connection,
    facility_id: &str,
    batch_number: Option<&str>,
) -> Result<Vec<StockMovement>, InventoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, facility_id, vaccine_name, batch_number, movement_type, quantity, reason, created_at
         FROM stock_movements
         WHERE facility_id = ?1 AND (?2 IS NULL OR batch_number = ?2)
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt.query_map(params![facility_id, batch_number], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, u32>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut movements = Vec::new();
    for row in rows {
        let (id, facility_id, vaccine_name, batch_number, kind, quantity, reason, created) = row?;
        let created_at = DateTime::parse_from_rfc3339(&created)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| DatabaseError::InvalidEnum {
                field: "created_at".into(),
                value: created.clone(),
            })?;
        movements.push(StockMovement {
            id,
            facility_id,
            vaccine_name,
            batch_number,
            movement_type: kind.parse()?,
            quantity,
            reason,
            created_at,
        });
    }
    Ok(movements)
}

// ═══════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════

/// Available batches in first-expiry-first-out order.
pub fn available_batches<'a>(
    batches: &'a [VaccineBatch],
    facility_id: &str,
    vaccine_name: Option<&str>,
    today: NaiveDate,
) -> Vec<&'a VaccineBatch> {
    let vaccine_name = vaccine_name.map(str::trim);
    let mut out: Vec<&VaccineBatch> = batches
        .iter()
        .filter(|b| b.facility_id == facility_id && b.is_available(today))
        .filter(|b| vaccine_name.map_or(true, |v| b.vaccine_name == v))
        .collect();
    out.sort_by_key(|b| b.expiry_date);
    out
}

/// Batches with stock whose expiry falls between today and the warning horizon.
pub fn expiring_soon<'a>(
    batches: &'a [VaccineBatch],
    facility_id: &str,
    today: NaiveDate,
) -> Vec<&'a VaccineBatch> {
    let horizon = today + Duration::days(EXPIRY_WARNING_DAYS);
    batches
        .iter()
        .filter(|b| b.facility_id == facility_id && b.quantity_remaining > 0)
        .filter(|b| b.expiry_date >= today && b.expiry_date <= horizon)
        .collect()
}

pub fn expired_batches<'a>(
    batches: &'a [VaccineBatch],
    facility_id: &str,
    today: NaiveDate,
) -> Vec<&'a VaccineBatch> {
    batches
        .iter()
        .filter(|b| b.facility_id == facility_id && b.quantity_remaining > 0 && b.is_expired(today))
        .collect()
}

/// Stock per vaccine over unexpired, non-empty batches, sorted by name.
///
/// `facility_id` of `None` sums across every facility.
pub fn stock_levels(
    batches: &[VaccineBatch],
    facility_id: Option<&str>,
    today: NaiveDate,
) -> Vec<StockLevel> {
    let usable: Vec<VaccineBatch> = batches
        .iter()
        .filter(|b| facility_id.map_or(true, |f| b.facility_id == f))
        .filter(|b| !b.is_expired(today) && b.quantity_remaining > 0)
        .cloned()
        .collect();

    let mut levels: Vec<StockLevel> = group_by(&usable, |b| b.vaccine_name.clone())
        .into_iter()
        .map(|(vaccine_name, members)| {
            let current_quantity: u64 = members.iter().map(|b| b.quantity_remaining as u64).sum();
            StockLevel {
                vaccine_id: vaccine_name.to_lowercase().replace(' ', "-"),
                oldest_expiry_date: members.iter().map(|b| b.expiry_date).min(),
                status: StockStatus::for_quantity(current_quantity),
                current_quantity,
                vaccine_name,
            }
        })
        .collect();
    levels.sort_by_key(|l| l.vaccine_name.to_lowercase());
    levels
}

pub fn stats(batches: &[VaccineBatch], today: NaiveDate) -> InventoryStats {
    InventoryStats {
        total_batches: batches.len(),
        total_doses: batches.iter().map(|b| b.quantity_remaining as u64).sum(),
        expiring_soon: count_where(batches, |b| {
            b.quantity_remaining > 0 && !b.is_expired(today) && b.is_expiring_soon(today)
        }),
        expired: count_where(batches, |b| b.quantity_remaining > 0 && b.is_expired(today)),
        depleted: count_where(batches, |b| b.quantity_remaining == 0),
    }
}

pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<VaccineBatch> {
    let created_at = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    (0..RECORD_COUNT)
        .map(|i| {
            let (vaccine, manufacturer) = *rng.pick(VACCINES);
            let received: u32 = rng.int(100..1001);
            let remaining = if rng.chance(0.1) { 0 } else { rng.int(0..received + 1) };
            VaccineBatch {
                id: i as u64 + 1,
                batch_number: format!("BN-{}-{:04}", rng.alnum_code(4), i + 1),
                vaccine_name: vaccine.to_string(),
                manufacturer: manufacturer.to_string(),
                quantity_received: received,
                quantity_remaining: remaining,
                expiry_date: today + Duration::days(rng.int(-30..365)),
                receipt_date: rng.days_before(today, 10..180),
                facility_id: rng.pick(FACILITIES).to_string(),
                created_at,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchForm {
    pub batch_number: String,
    pub vaccine_name: String,
    pub manufacturer: String,
    pub quantity_received: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
    pub receipt_date: Option<NaiveDate>,
    pub facility_id: String,
}

impl BatchForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("batchNumber")
            .required("vaccineName")
            .required("manufacturer")
            .required("quantityReceived")
            .min("quantityReceived", 1.0)
            .required("expiryDate")
            .required("receiptDate")
            .required("facilityId")
    }
}

fn find_duplicate<'a>(
    batches: &'a [VaccineBatch],
    batch_number: &str,
    facility_id: &str,
) -> Option<&'a VaccineBatch> {
    batches
        .iter()
        .find(|b| b.batch_number == batch_number && b.facility_id == facility_id)
}

/// Register a new batch with its full quantity remaining.
pub fn create_batch(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    form: BatchForm,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<VaccineBatch, InventoryError> {
    BatchForm::validator().check(&form, ctx.notices)?;
    if find_duplicate(batches.records(), &form.batch_number, &form.facility_id).is_some() {
        ctx.notices.error("Batch number already exists in this facility");
        return Err(InventoryError::DuplicateBatch {
            batch: form.batch_number,
            facility: form.facility_id,
        });
    }

    let quantity = form.quantity_received.unwrap_or(1);
    let batch = VaccineBatch {
        id: next_id(batches.records()),
        batch_number: form.batch_number,
        vaccine_name: form.vaccine_name,
        manufacturer: form.manufacturer,
        quantity_received: quantity,
        quantity_remaining: quantity,
        expiry_date: form.expiry_date.unwrap_or(today),
        receipt_date: form.receipt_date.unwrap_or(today),
        facility_id: form.facility_id,
        created_at: now,
    };
    batches.create(ctx, batch.clone(), InsertAt::Back)?;
    Ok(batch)
}

fn next_id(batches: &[VaccineBatch]) -> u64 {
    batches.iter().map(|b| b.id).max().unwrap_or(0) + 1
}

/// Edit a batch. Remaining shifts by the change in received quantity.
pub fn update_batch(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: BatchForm,
) -> Result<VaccineBatch, InventoryError> {
    BatchForm::validator().check(&form, ctx.notices)?;
    let existing = batches
        .get(id)
        .cloned()
        .ok_or_else(|| InventoryError::BatchNotFound(id.to_string()))?;

    if let Some(other) = find_duplicate(batches.records(), &form.batch_number, &form.facility_id) {
        if other.id != existing.id {
            ctx.notices.error("Batch number already exists in this facility");
            return Err(InventoryError::DuplicateBatch {
                batch: form.batch_number,
                facility: form.facility_id,
            });
        }
    }

    let received = form.quantity_received.unwrap_or(existing.quantity_received);
    let remaining = i64::from(existing.quantity_remaining) + i64::from(received)
        - i64::from(existing.quantity_received);
    let remaining = u32::try_from(remaining).map_err(|_| InventoryError::Insufficient {
        available: existing.quantity_remaining,
        requested: existing.quantity_received - received,
        batch: existing.batch_number.clone(),
    })?;

    let updated = batches.update(ctx, id, |b| {
        b.batch_number = form.batch_number;
        b.vaccine_name = form.vaccine_name;
        b.manufacturer = form.manufacturer;
        b.quantity_received = received;
        b.quantity_remaining = remaining;
        if let Some(date) = form.expiry_date {
            b.expiry_date = date;
        }
        if let Some(date) = form.receipt_date {
            b.receipt_date = date;
        }
        b.facility_id = form.facility_id;
    })?;
    Ok(updated.clone())
}

/// Result of a stock deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    pub batch_id: u64,
    pub batch_number: String,
    pub remaining: u32,
    pub movement: StockMovement,
}

fn take_from_batch(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    batch: VaccineBatch,
    quantity: u32,
) -> Result<Deduction, InventoryError> {
    if batch.quantity_remaining < quantity {
        return Err(InventoryError::Insufficient {
            available: batch.quantity_remaining,
            requested: quantity,
            batch: batch.batch_number,
        });
    }

    let remaining = batch.quantity_remaining - quantity;
    let movement = StockMovement::for_batch(
        &batch,
        MovementType::Used,
        quantity,
        "Stock used for vaccination",
    );
    db::atomically(ctx.conn, || {
        batches.update_with(ctx, &batch.record_id(), "Stock deducted successfully", |b| {
            b.quantity_remaining = remaining;
        })?;
        record_movement(ctx.conn, &movement)
    })?;
    if remaining == 0 {
        tracing::info!(batch = %batch.batch_number, "Batch depleted");
    }

    Ok(Deduction {
        batch_id: batch.id,
        batch_number: batch.batch_number,
        remaining,
        movement,
    })
}

/// Deduct from the earliest-expiring available batch of `vaccine_name`.
///
/// Only that one batch is consulted; stock is never split across batches.
pub fn deduct_for_vaccine(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    facility_id: &str,
    vaccine_name: &str,
    quantity: u32,
    today: NaiveDate,
) -> Result<Deduction, InventoryError> {
    tracing::info!(facility_id, vaccine_name, quantity, "Deducting stock");
    let batch = available_batches(batches.records(), facility_id, Some(vaccine_name), today)
        .first()
        .map(|b| (*b).clone())
        .ok_or_else(|| InventoryError::NoStock {
            vaccine: vaccine_name.to_string(),
            facility: facility_id.to_string(),
        })?;
    take_from_batch(batches, ctx, batch, quantity)
}

/// Deduct from a specific batch by id.
pub fn deduct_from_batch(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    id: &str,
    quantity: u32,
) -> Result<Deduction, InventoryError> {
    let batch = batches
        .get(id)
        .cloned()
        .ok_or_else(|| InventoryError::BatchNotFound(id.to_string()))?;
    take_from_batch(batches, ctx, batch, quantity)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReceiveForm {
    pub batch_number: String,
    pub vaccine_name: String,
    pub quantity: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub received_from: Option<String>,
}

impl ReceiveForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("batchNumber")
            .required("vaccineName")
            .required("quantity")
            .min("quantity", 1.0)
            .required("expiryDate")
    }
}

/// Take delivery of a new batch and log a receipt movement.
///
/// A batch number may repeat within a facility only for a different vaccine.
pub fn receive_stock(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    facility_id: &str,
    form: ReceiveForm,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<VaccineBatch, InventoryError> {
    ReceiveForm::validator().check(&form, ctx.notices)?;
    let clash = batches.records().iter().any(|b| {
        b.batch_number == form.batch_number
            && b.facility_id == facility_id
            && b.vaccine_name.eq_ignore_ascii_case(&form.vaccine_name)
    });
    if clash {
        ctx.notices.error("Batch number already exists for this vaccine in this facility");
        return Err(InventoryError::DuplicateBatch {
            batch: form.batch_number,
            facility: facility_id.to_string(),
        });
    }

    let source = form.received_from.unwrap_or_else(|| "Unknown".to_string());
    let quantity = form.quantity.unwrap_or(1);
    let batch = VaccineBatch {
        id: next_id(batches.records()),
        batch_number: form.batch_number,
        vaccine_name: form.vaccine_name,
        manufacturer: source.clone(),
        quantity_received: quantity,
        quantity_remaining: quantity,
        expiry_date: form.expiry_date.unwrap_or(today),
        receipt_date: form.received_date.unwrap_or(today),
        facility_id: facility_id.to_string(),
        created_at: now,
    };
    let movement = StockMovement::for_batch(
        &batch,
        MovementType::Received,
        quantity,
        format!("Stock received from: {source}"),
    );
    db::atomically(ctx.conn, || {
        batches.create(ctx, batch.clone(), InsertAt::Back)?;
        record_movement(ctx.conn, &movement)
    })?;
    Ok(batch)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdjustForm {
    pub batch_number: String,
    pub vaccine_name: String,
    /// Signed change to the remaining quantity.
    pub quantity_change: i64,
    pub reason: String,
    pub notes: Option<String>,
}

impl AdjustForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("batchNumber")
            .required("vaccineName")
            .required("reason")
    }
}

/// Apply a signed correction to a batch and log it by reason.
pub fn adjust_stock(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    facility_id: &str,
    form: AdjustForm,
) -> Result<VaccineBatch, InventoryError> {
    AdjustForm::validator().check(&form, ctx.notices)?;
    let batch = find_duplicate(batches.records(), &form.batch_number, facility_id)
        .cloned()
        .ok_or_else(|| InventoryError::BatchNotFound(form.batch_number.clone()))?;
    if !batch.vaccine_name.eq_ignore_ascii_case(&form.vaccine_name) {
        return Err(InventoryError::VaccineMismatch(form.batch_number));
    }

    let remaining = i64::from(batch.quantity_remaining) + form.quantity_change;
    let remaining = u32::try_from(remaining).map_err(|_| InventoryError::Insufficient {
        available: batch.quantity_remaining,
        requested: u32::try_from(form.quantity_change.unsigned_abs()).unwrap_or(u32::MAX),
        batch: batch.batch_number.clone(),
    })?;

    let reason = match form.notes.as_deref().map(str::trim) {
        Some(notes) if !notes.is_empty() => format!("{}: {notes}", form.reason),
        _ => form.reason.clone(),
    };
    let movement = StockMovement::for_batch(
        &batch,
        MovementType::for_adjustment(&form.reason),
        u32::try_from(form.quantity_change.unsigned_abs()).unwrap_or(u32::MAX),
        reason,
    );
    db::atomically(ctx.conn, || {
        let updated = batches
            .update_with(ctx, &batch.record_id(), "Stock adjusted successfully", |b| {
                b.quantity_remaining = remaining;
            })?
            .clone();
        record_movement(ctx.conn, &movement)?;
        Ok(updated)
    })
}

pub struct InventoryScreen;

impl Screen for InventoryScreen {
    type Record = VaccineBatch;
    type Filter = InventoryFilter;
    type Stats = InventoryStats;
    type Insights = Vec<StockLevel>;

    const NAME: &'static str = "inventory";
    const STORAGE_KEY: &'static str = "vaccineBatches";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Vaccine batch";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<VaccineBatch> {
        generate(rng, today)
    }

    fn stats(all: &[VaccineBatch], _filtered: &[VaccineBatch], today: NaiveDate) -> InventoryStats {
        stats(all, today)
    }

    fn insights(records: &[VaccineBatch], _rng: &mut MockRng, today: NaiveDate) -> Vec<StockLevel> {
        stock_levels(records, None, today)
    }
}
