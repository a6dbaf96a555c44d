//! Vaccine allocations between facilities.
//!
//! An allocation moves a quantity of one batch from a source facility to a
//! destination facility. It starts Pending, is approved into transit, and
//! tracking updates record delivery. Cancelling keeps the record.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crud::{Collection, CrudContext, CrudError, InsertAt, Record, Validator};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{AllocationPriority, AllocationStatus};
use crate::notify::Confirm;
use crate::pipeline::{count_where, in_date_range, text_matches, Choice, RecordFilter, Screen};

pub const VACCINES: &[&str] = &[
    "BCG",
    "OPV",
    "DTP",
    "Measles",
    "Hepatitis B",
    "Polio",
    "Rotavirus",
    "Pneumococcal",
    "HPV",
    "Yellow Fever",
];

pub const TRANSPORT_METHODS: &[&str] = &[
    "Refrigerated Truck",
    "Air Freight",
    "Standard Delivery",
    "Express Courier",
    "Cold Chain Vehicle",
];

pub const STORAGE_CONDITIONS: &[&str] = &[
    "2-8°C (Cold Chain)",
    "-20°C (Frozen)",
    "15-25°C (Room Temperature)",
    "Ultra-Cold (-70°C)",
];

const MANUFACTURERS: &[&str] = &[
    "Serum Institute",
    "Pfizer",
    "Moderna",
    "AstraZeneca",
    "Johnson & Johnson",
    "Bharat Biotech",
];

const FACILITY_NAMES: &[&str] = &[
    "City Hospital",
    "County Clinic",
    "Regional Medical Center",
    "Community Health Center",
    "District Hospital",
    "Primary Care Facility",
    "Metropolitan Hospital",
    "Rural Health Post",
];

const REQUESTERS: &[&str] = &[
    "Dr. Smith",
    "Dr. Johnson",
    "Dr. Williams",
    "Dr. Brown",
    "Dr. Davis",
    "Dr. Miller",
];

const FACILITY_COUNT: usize = 15;
const RECORD_COUNT: usize = 50;
const CAMPAIGN_NOTE: &str = "Urgent delivery required for campaign";

pub const CURRENT_USER: &str = "Current User";

static BATCH_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9-]+$").unwrap());

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub facility_type: String,
    pub current_stock: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineAllocation {
    pub id: u32,
    pub allocation_number: String,
    pub vaccine_name: String,
    pub batch_number: String,
    pub manufacturer: String,
    pub quantity: u32,
    pub source_facility: String,
    pub destination_facility: String,
    pub allocation_date: NaiveDate,
    pub expected_delivery: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_delivery: Option<NaiveDate>,
    pub status: AllocationStatus,
    pub priority: AllocationPriority,
    pub transport_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Transit temperature in °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub storage_conditions: String,
}

impl Record for VaccineAllocation {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStats {
    pub total_allocations: usize,
    pub pending: usize,
    pub in_transit: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub total_quantity: u64,
    /// Whole days, over delivered allocations with a delivery date.
    pub avg_delivery_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationInsights {
    /// Every facility named as a source or destination, sorted.
    pub facilities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllocationFilter {
    pub search: Option<String>,
    pub vaccine: Choice<String>,
    pub status: Choice<AllocationStatus>,
    pub priority: Choice<AllocationPriority>,
    pub source_facility: Choice<String>,
    pub destination_facility: Choice<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilter<VaccineAllocation> for AllocationFilter {
    fn matches(&self, a: &VaccineAllocation) -> bool {
        text_matches(
            self.search.as_deref(),
            &[
                &a.allocation_number,
                &a.vaccine_name,
                &a.batch_number,
                &a.source_facility,
                &a.destination_facility,
            ],
        ) && self.vaccine.admits_str(&a.vaccine_name)
            && self.status.admits(&a.status)
            && self.priority.admits(&a.priority)
            && self.source_facility.admits_str(&a.source_facility)
            && self.destination_facility.admits_str(&a.destination_facility)
            && in_date_range(self.date_from, self.date_to, a.allocation_date)
    }
}

impl CsvRow for VaccineAllocation {
    const HEADERS: &'static [&'static str] = &[
        "Allocation Number",
        "Vaccine",
        "Batch",
        "Quantity",
        "Source",
        "Destination",
        "Date",
        "Expected Delivery",
        "Status",
        "Priority",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.allocation_number.clone(),
            self.vaccine_name.clone(),
            self.batch_number.clone(),
            self.quantity.to_string(),
            self.source_facility.clone(),
            self.destination_facility.clone(),
            self.allocation_date.to_string(),
            self.expected_delivery.to_string(),
            self.status.to_string(),
            self.priority.to_string(),
        ]
    }
}

pub fn allocation_number(year: i32, sequence: usize) -> String {
    format!("AL{year}{sequence:05}")
}

fn tracking_code(rng: &mut MockRng) -> String {
    format!("TRK{}", rng.alnum_code(10))
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

pub fn facilities(rng: &mut MockRng) -> Vec<Facility> {
    (0..FACILITY_COUNT)
        .map(|i| Facility {
            id: format!("FAC{:03}", i + 1),
            name: format!(
                "{} {}",
                FACILITY_NAMES[i % FACILITY_NAMES.len()],
                i / FACILITY_NAMES.len() + 1
            ),
            facility_type: match i % 3 {
                0 => "Hospital",
                1 => "Clinic",
                _ => "Health Center",
            }
            .to_string(),
            current_stock: rng.int(1000..6000),
            capacity: rng.int(7000..10000),
        })
        .collect()
}

/// Source and destination are always different facilities.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<VaccineAllocation> {
    let sites = facilities(rng);

    (0..RECORD_COUNT)
        .map(|i| {
            let allocation_date = rng.days_before(today, 0..60);
            let expected_delivery = allocation_date + Duration::days(rng.int(1..8));
            let status = *rng.pick(AllocationStatus::ALL);
            let actual_delivery = (status == AllocationStatus::Delivered)
                .then(|| expected_delivery + Duration::days(rng.int(-1..2)));

            let source = rng.int(0..sites.len());
            let mut destination = rng.int(0..sites.len());
            while destination == source {
                destination = rng.int(0..sites.len());
            }

            let dispatched = status != AllocationStatus::Pending;
            let moving = matches!(status, AllocationStatus::InTransit | AllocationStatus::Delivered);

            VaccineAllocation {
                id: i as u32 + 1,
                allocation_number: allocation_number(today.year(), i + 1),
                vaccine_name: rng.pick(VACCINES).to_string(),
                batch_number: format!("BATCH-{}", rng.alnum_code(8)),
                manufacturer: rng.pick(MANUFACTURERS).to_string(),
                quantity: rng.int(100..5100),
                source_facility: sites[source].name.clone(),
                destination_facility: sites[destination].name.clone(),
                allocation_date,
                expected_delivery,
                actual_delivery,
                status,
                priority: *rng.pick(AllocationPriority::ALL),
                transport_method: rng.pick(TRANSPORT_METHODS).to_string(),
                tracking_number: dispatched.then(|| tracking_code(rng)),
                requested_by: rng.pick(REQUESTERS).to_string(),
                approved_by: dispatched.then(|| rng.pick(REQUESTERS).to_string()),
                notes: (i % 3 == 0).then(|| CAMPAIGN_NOTE.to_string()),
                temperature: moving.then(|| f64::from(rng.int::<i32>(2..8))),
                storage_conditions: rng.pick(STORAGE_CONDITIONS).to_string(),
            }
        })
        .collect()
}

pub fn stats(allocations: &[VaccineAllocation]) -> AllocationStats {
    let by_status = |s: AllocationStatus| count_where(allocations, |a| a.status == s);

    let delivery_days: Vec<i64> = allocations
        .iter()
        .filter(|a| a.status == AllocationStatus::Delivered)
        .filter_map(|a| a.actual_delivery.map(|d| (d - a.allocation_date).num_days()))
        .collect();
    let avg_delivery_time = if delivery_days.is_empty() {
        0
    } else {
        (delivery_days.iter().sum::<i64>() as f64 / delivery_days.len() as f64).round() as i64
    };

    AllocationStats {
        total_allocations: allocations.len(),
        pending: by_status(AllocationStatus::Pending),
        in_transit: by_status(AllocationStatus::InTransit),
        delivered: by_status(AllocationStatus::Delivered),
        cancelled: by_status(AllocationStatus::Cancelled),
        total_quantity: allocations.iter().map(|a| a.quantity as u64).sum(),
        avg_delivery_time,
    }
}

pub fn unique_facilities(allocations: &[VaccineAllocation]) -> Vec<String> {
    let mut names: Vec<String> = allocations
        .iter()
        .flat_map(|a| [a.source_facility.clone(), a.destination_facility.clone()])
        .collect();
    names.sort();
    names.dedup();
    names
}

// ═══════════════════════════════════════════════════════════
// Forms & actions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllocationForm {
    pub vaccine_name: String,
    pub batch_number: String,
    pub manufacturer: String,
    pub quantity: Option<u32>,
    pub source_facility: String,
    pub destination_facility: String,
    pub allocation_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub priority: AllocationPriority,
    pub transport_method: String,
    pub storage_conditions: String,
    pub temperature: Option<f64>,
    pub requested_by: String,
    pub notes: Option<String>,
}

impl Default for AllocationForm {
    fn default() -> Self {
        Self {
            vaccine_name: String::new(),
            batch_number: String::new(),
            manufacturer: String::new(),
            quantity: None,
            source_facility: String::new(),
            destination_facility: String::new(),
            allocation_date: None,
            expected_delivery: None,
            priority: AllocationPriority::Medium,
            transport_method: String::new(),
            storage_conditions: String::new(),
            temperature: None,
            requested_by: CURRENT_USER.to_string(),
            notes: None,
        }
    }
}

impl AllocationForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("vaccineName")
            .required("batchNumber")
            .pattern("batchNumber", &BATCH_CODE)
            .required("manufacturer")
            .required("quantity")
            .min("quantity", 1.0)
            .required("sourceFacility")
            .required("destinationFacility")
            .required("allocationDate")
            .required("expectedDelivery")
            .required("transportMethod")
            .required("storageConditions")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingForm {
    #[serde(default)]
    pub tracking_number: String,
    pub status: Option<AllocationStatus>,
    #[serde(default)]
    pub actual_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TrackingForm {
    pub fn validator() -> Validator {
        Validator::new().required("trackingNumber").required("status")
    }
}

/// New allocations go first, numbered after the current count.
pub fn create_allocation(
    allocations: &mut Collection<VaccineAllocation>,
    ctx: &CrudContext<'_>,
    form: AllocationForm,
    today: NaiveDate,
) -> Result<VaccineAllocation, CrudError> {
    AllocationForm::validator().check(&form, ctx.notices)?;
    let sequence = allocations.len() + 1;
    let requested_by = if form.requested_by.trim().is_empty() {
        CURRENT_USER.to_string()
    } else {
        form.requested_by
    };
    let allocation = VaccineAllocation {
        id: sequence as u32,
        allocation_number: allocation_number(today.year(), sequence),
        vaccine_name: form.vaccine_name,
        batch_number: form.batch_number,
        manufacturer: form.manufacturer,
        quantity: form.quantity.unwrap_or(1),
        source_facility: form.source_facility,
        destination_facility: form.destination_facility,
        allocation_date: form.allocation_date.unwrap_or(today),
        expected_delivery: form.expected_delivery.unwrap_or(today),
        actual_delivery: None,
        status: AllocationStatus::Pending,
        priority: form.priority,
        transport_method: form.transport_method,
        tracking_number: None,
        requested_by,
        approved_by: None,
        notes: form.notes,
        temperature: form.temperature,
        storage_conditions: form.storage_conditions,
    };
    allocations.create(ctx, allocation.clone(), InsertAt::Front)?;
    Ok(allocation)
}

pub fn edit_allocation(
    allocations: &mut Collection<VaccineAllocation>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: AllocationForm,
) -> Result<VaccineAllocation, CrudError> {
    AllocationForm::validator().check(&form, ctx.notices)?;
    let updated = allocations.update(ctx, id, |a| {
        a.vaccine_name = form.vaccine_name;
        a.batch_number = form.batch_number;
        a.manufacturer = form.manufacturer;
        if let Some(quantity) = form.quantity {
            a.quantity = quantity;
        }
        a.source_facility = form.source_facility;
        a.destination_facility = form.destination_facility;
        if let Some(date) = form.allocation_date {
            a.allocation_date = date;
        }
        if let Some(date) = form.expected_delivery {
            a.expected_delivery = date;
        }
        a.priority = form.priority;
        a.transport_method = form.transport_method;
        a.storage_conditions = form.storage_conditions;
        a.temperature = form.temperature;
        a.requested_by = form.requested_by;
        a.notes = form.notes;
    })?;
    Ok(updated.clone())
}

pub fn update_tracking(
    allocations: &mut Collection<VaccineAllocation>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: TrackingForm,
) -> Result<VaccineAllocation, CrudError> {
    TrackingForm::validator().check(&form, ctx.notices)?;
    let updated = allocations.update_with(
        ctx,
        id,
        "Tracking information updated successfully",
        |a| {
            a.tracking_number = Some(form.tracking_number);
            if let Some(status) = form.status {
                a.status = status;
            }
            a.actual_delivery = form.actual_delivery;
            a.temperature = form.temperature;
            a.notes = form.notes;
        },
    )?;
    Ok(updated.clone())
}

fn allocation_label(allocations: &Collection<VaccineAllocation>, id: &str) -> Result<String, CrudError> {
    allocations
        .get(id)
        .map(|a| a.allocation_number.clone())
        .ok_or_else(|| CrudError::NotFound(id.to_string()))
}

/// Put a pending allocation in transit under a fresh tracking number.
pub fn approve_allocation(
    allocations: &mut Collection<VaccineAllocation>,
    ctx: &CrudContext<'_>,
    id: &str,
    confirm: &dyn Confirm,
    rng: &mut MockRng,
) -> Result<VaccineAllocation, CrudError> {
    let number = allocation_label(allocations, id)?;
    if !confirm.confirm(&format!("Approve allocation {number}?")) {
        return Err(CrudError::Cancelled);
    }
    let tracking = tracking_code(rng);
    let updated = allocations.update_with(ctx, id, "Allocation approved and in transit", |a| {
        a.status = AllocationStatus::InTransit;
        a.approved_by = Some(CURRENT_USER.to_string());
        a.tracking_number = Some(tracking);
    })?;
    Ok(updated.clone())
}

/// Mark cancelled. The record stays in the list.
pub fn cancel_allocation(
    allocations: &mut Collection<VaccineAllocation>,
    ctx: &CrudContext<'_>,
    id: &str,
    confirm: &dyn Confirm,
) -> Result<VaccineAllocation, CrudError> {
    let number = allocation_label(allocations, id)?;
    if !confirm.confirm(&format!(
        "Cancel allocation {number}? This action cannot be undone."
    )) {
        return Err(CrudError::Cancelled);
    }
    let updated = allocations.update_with(ctx, id, "Allocation cancelled", |a| {
        a.status = AllocationStatus::Cancelled;
    })?;
    Ok(updated.clone())
}

pub struct AllocationScreen;

impl Screen for AllocationScreen {
    type Record = VaccineAllocation;
    type Filter = AllocationFilter;
    type Stats = AllocationStats;
    type Insights = AllocationInsights;

    const NAME: &'static str = "vaccine-allocations";
    const STORAGE_KEY: &'static str = "vaccineAllocations";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Allocation";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<VaccineAllocation> {
        generate(rng, today)
    }

    fn stats(all: &[VaccineAllocation], _filtered: &[VaccineAllocation], _today: NaiveDate) -> AllocationStats {
        stats(all)
    }

    fn insights(records: &[VaccineAllocation], _rng: &mut MockRng, _today: NaiveDate) -> AllocationInsights {
        AllocationInsights {
            facilities: unique_facilities(records),
        }
    }

    fn export_stem(today: NaiveDate) -> String {
        format!("{}-{}", Self::NAME, today.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::notify::{AutoConfirm, NotificationCenter};
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    fn allocations() -> Vec<VaccineAllocation> {
        generate(&mut MockRng::seeded(99), today())
    }

    fn valid_form() -> AllocationForm {
        AllocationForm {
            vaccine_name: "BCG".into(),
            batch_number: "BATCH-ABC123".into(),
            manufacturer: "Pfizer".into(),
            quantity: Some(250),
            source_facility: "City Hospital 1".into(),
            destination_facility: "County Clinic 1".into(),
            allocation_date: Some(today()),
            expected_delivery: Some(today() + Duration::days(3)),
            transport_method: "Air Freight".into(),
            storage_conditions: STORAGE_CONDITIONS[0].into(),
            ..Default::default()
        }
    }

    #[test]
    fn fifteen_named_facilities() {
        let sites = facilities(&mut MockRng::seeded(1));
        assert_eq!(sites.len(), 15);
        assert_eq!(sites[0].name, "City Hospital 1");
        assert_eq!(sites[8].name, "County Clinic 2");
        assert_eq!(sites[14].id, "FAC015");
        assert_eq!(sites[1].facility_type, "Clinic");
    }

    #[test]
    fn generated_allocations_are_consistent() {
        let all = allocations();
        assert_eq!(all.len(), 50);
        assert_eq!(all[0].allocation_number, "AL202500001");
        for a in &all {
            assert_ne!(a.source_facility, a.destination_facility);
            assert!(a.expected_delivery > a.allocation_date);
            assert_eq!(a.actual_delivery.is_some(), a.status == AllocationStatus::Delivered);
            assert_eq!(a.tracking_number.is_some(), a.status != AllocationStatus::Pending);
            assert!(BATCH_CODE.is_match(&a.batch_number));
        }
    }

    #[test]
    fn stats_average_delivery_days() {
        let mut all = allocations();
        for a in all.iter_mut() {
            a.status = AllocationStatus::Pending;
            a.actual_delivery = None;
        }
        all[0].status = AllocationStatus::Delivered;
        all[0].actual_delivery = Some(all[0].allocation_date + Duration::days(2));
        all[1].status = AllocationStatus::Delivered;
        all[1].actual_delivery = Some(all[1].allocation_date + Duration::days(5));
        let st = stats(&all);
        assert_eq!(st.delivered, 2);
        assert_eq!(st.pending, 48);
        // 3.5 rounds half away from zero.
        assert_eq!(st.avg_delivery_time, 4);
        assert_eq!(stats(&[]).avg_delivery_time, 0);
    }

    #[test]
    fn lowercase_batch_rejected() {
        let mut form = valid_form();
        form.batch_number = "batch-abc".into();
        form.quantity = Some(0);
        let errors = AllocationForm::validator().validate(&form).unwrap_err();
        assert_eq!(errors.fields(), vec!["batchNumber", "quantity"]);
    }

    #[test]
    fn create_numbers_and_prepends() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("vaccineAllocations", 1, "Allocation", allocations());

        let mut form = valid_form();
        form.requested_by = "  ".into();
        let created = create_allocation(&mut coll, &ctx, form, today()).unwrap();
        assert_eq!(created.allocation_number, "AL202500051");
        assert_eq!(created.status, AllocationStatus::Pending);
        assert_eq!(created.requested_by, CURRENT_USER);
        assert_eq!(coll.records()[0].id, 51);
    }

    #[test]
    fn approve_then_track_then_cancel() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("vaccineAllocations", 1, "Allocation", allocations());
        let id = "7";

        let approved =
            approve_allocation(&mut coll, &ctx, id, &AutoConfirm(true), &mut MockRng::seeded(2)).unwrap();
        assert_eq!(approved.status, AllocationStatus::InTransit);
        assert_eq!(approved.approved_by.as_deref(), Some(CURRENT_USER));
        assert!(approved.tracking_number.as_deref().is_some_and(|t| t.starts_with("TRK")));

        let tracked = update_tracking(
            &mut coll,
            &ctx,
            id,
            TrackingForm {
                tracking_number: "TRK1".into(),
                status: Some(AllocationStatus::Delivered),
                actual_delivery: Some(today()),
                temperature: Some(4.0),
                notes: None,
            },
        )
        .unwrap();
        assert_eq!(tracked.status, AllocationStatus::Delivered);
        assert_eq!(tracked.actual_delivery, Some(today()));

        let refused = cancel_allocation(&mut coll, &ctx, id, &AutoConfirm(false));
        assert!(matches!(refused, Err(CrudError::Cancelled)));
        let cancelled = cancel_allocation(&mut coll, &ctx, id, &AutoConfirm(true)).unwrap();
        assert_eq!(cancelled.status, AllocationStatus::Cancelled);
        assert_eq!(coll.len(), 50);
        assert_eq!(notices.last().unwrap().message, "Allocation cancelled");
    }

    #[test]
    fn tracking_needs_number_and_status() {
        let form = TrackingForm {
            tracking_number: String::new(),
            status: None,
            actual_delivery: None,
            temperature: None,
            notes: None,
        };
        let errors = TrackingForm::validator().validate(&form).unwrap_err();
        assert_eq!(errors.errors.len(), 2);
    }

    #[test]
    fn filter_by_source_and_dates() {
        let all = allocations();
        let source = all[0].source_facility.clone();
        let filter = AllocationFilter {
            source_facility: Choice::only(source.clone()),
            date_from: Some(today() - Duration::days(30)),
            ..Default::default()
        };
        let out = filter_records(&all, &filter);
        assert!(out.iter().all(|a| a.source_facility == source));
        assert!(out.iter().all(|a| a.allocation_date >= today() - Duration::days(30)));
    }

    #[test]
    fn export_stem_carries_date() {
        assert_eq!(
            AllocationScreen::export_stem(today()),
            "vaccine-allocations-2025-05-20"
        );
    }

    #[test]
    fn facility_list_is_sorted_unique() {
        let names = unique_facilities(&allocations());
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }
}
