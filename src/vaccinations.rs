//! Administered doses.
//!
//! Recording a dose checks the patient and the dose sequence, takes one
//! dose out of stock and sets the date the next dose falls due. The stock
//! deduction, the vaccination record and any campaign tally commit in one
//! transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::campaigns::{self, Campaign, CampaignError};
use crate::crud::{Collection, CrudContext, CrudError, FormErrors, InsertAt, Record, Validator};
use crate::db::{self, DatabaseError};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::inventory::{self, Deduction, InventoryError, VaccineBatch, FACILITIES};
use crate::patients::{patient_id, Patient};
use crate::pipeline::{
    count_by_key, count_where, distinct_count, in_date_range, text_matches, Choice, RecordFilter,
    Screen,
};

/// Generated doses are spread over this many patients.
const GENERATED_PATIENTS: usize = 60;

const VACCINES: &[&str] = &["BCG", "OPV", "DTP", "Measles", "Hepatitis B", "Rotavirus", "Pneumococcal"];

const SITES: &[&str] = &["Left arm", "Right arm", "Left thigh", "Right thigh", "Oral"];

/// Vaccine, total doses in the series, days between doses.
const DOSE_RULES: &[(&str, u32, i64)] = &[
    ("BCG", 1, 0),
    ("OPV", 4, 28),
    ("DTP", 3, 28),
    ("PENTA", 3, 28),
    ("MEASLES", 2, 180),
    ("HEPATITIS B", 3, 28),
    ("ROTAVIRUS", 2, 28),
    ("PNEUMOCOCCAL", 3, 28),
    ("COVID-19", 3, 28),
    ("TETANUS", 5, 28),
    ("YELLOW FEVER", 1, 0),
    ("MENINGITIS", 1, 28),
];

const DEFAULT_RULE: (u32, i64) = (1, 28);

fn rule(vaccine: &str) -> (u32, i64) {
    DOSE_RULES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(vaccine.trim()))
        .map(|&(_, doses, interval)| (doses, interval))
        .unwrap_or(DEFAULT_RULE)
}

/// Doses in the full series of `vaccine`.
pub fn max_doses(vaccine: &str) -> u32 {
    rule(vaccine).0
}

/// When dose `dose + 1` falls due, or `None` when the series is complete.
pub fn next_dose_due(vaccine: &str, dose: u32, administered: NaiveDate) -> Option<NaiveDate> {
    let (doses, interval) = rule(vaccine);
    (dose < doses && interval > 0).then(|| administered + Duration::days(interval))
}

#[derive(Debug, Error)]
pub enum VaccinationError {
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Dose {dose} of {vaccine} has already been administered to this patient")]
    DuplicateDose { vaccine: String, dose: u32 },

    #[error("Invalid dose number. {vaccine} has a maximum of {max} doses.")]
    DoseOutOfRange { vaccine: String, max: u32 },

    #[error("Invalid form: {0}")]
    Invalid(FormErrors),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error(transparent)]
    Crud(CrudError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<CrudError> for VaccinationError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Invalid(errors) => Self::Invalid(errors),
            other => Self::Crud(other),
        }
    }
}

impl From<rusqlite::Error> for VaccinationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccination {
    pub id: u64,
    pub patient_id: String,
    /// Name at the time of the dose.
    pub patient_name: String,
    pub vaccine_name: String,
    pub dose_number: u32,
    pub batch_id: u64,
    pub batch_number: String,
    pub date_administered: NaiveDate,
    pub facility_id: String,
    pub administered_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_dose_due: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Record for Vaccination {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationStats {
    pub total_vaccinations: usize,
    pub administered_today: usize,
    pub last_seven_days: usize,
    pub unique_patients: usize,
    /// Next doses falling due within the coming week.
    pub due_this_week: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationInsights {
    pub by_vaccine: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaccinationFilter {
    pub search: Option<String>,
    pub vaccine: Choice<String>,
    pub facility_id: Choice<String>,
    pub patient_id: Option<String>,
    pub dose_number: Option<u32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilter<Vaccination> for VaccinationFilter {
    fn matches(&self, v: &Vaccination) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&v.patient_name, &v.patient_id, &v.vaccine_name, &v.batch_number],
        ) && self.vaccine.admits_str(&v.vaccine_name)
            && self.facility_id.admits_str(&v.facility_id)
            && self.patient_id.as_deref().map_or(true, |p| p == v.patient_id)
            && self.dose_number.map_or(true, |d| d == v.dose_number)
            && in_date_range(self.date_from, self.date_to, v.date_administered)
    }
}

impl CsvRow for Vaccination {
    const HEADERS: &'static [&'static str] = &[
        "Patient ID",
        "Patient",
        "Vaccine",
        "Dose",
        "Batch",
        "Date Administered",
        "Facility",
        "Administered By",
        "Next Dose Due",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.patient_id.clone(),
            self.patient_name.clone(),
            self.vaccine_name.clone(),
            self.dose_number.to_string(),
            self.batch_number.clone(),
            self.date_administered.to_string(),
            self.facility_id.clone(),
            self.administered_by.clone(),
            self.next_dose_due.map(|d| d.to_string()).unwrap_or_default(),
        ]
    }
}

/// A patient's doses, most recent first.
pub fn history(vaccinations: &[Vaccination], patient_id: &str) -> Vec<Vaccination> {
    let mut doses: Vec<Vaccination> = vaccinations
        .iter()
        .filter(|v| v.patient_id == patient_id)
        .cloned()
        .collect();
    doses.sort_by(|a, b| {
        b.date_administered
            .cmp(&a.date_administered)
            .then(b.dose_number.cmp(&a.dose_number))
    });
    doses
}

// ═══════════════════════════════════════════════════════════
// Generation & stats
// ═══════════════════════════════════════════════════════════

/// Each patient gets one or two vaccine series, dose by dose at the
/// series interval, stopping at today.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Vaccination> {
    let mut records = Vec::new();
    for p in 1..=GENERATED_PATIENTS {
        let patient = patient_id(p);
        let patient_name = rng.person_name();
        let facility = rng.pick(FACILITIES).to_string();
        let series = rng.int(1..3);
        for vaccine in rng.shuffle_take(VACCINES, series) {
            let given = rng.int(1..max_doses(vaccine) + 1);
            let mut date = rng.days_before(today, 20..400);
            for dose in 1..=given {
                if date > today {
                    break;
                }
                let batch_id: u64 = rng.int(1..41);
                let next = next_dose_due(vaccine, dose, date);
                records.push(Vaccination {
                    id: records.len() as u64 + 1,
                    patient_id: patient.clone(),
                    patient_name: patient_name.clone(),
                    vaccine_name: vaccine.to_string(),
                    dose_number: dose,
                    batch_id,
                    batch_number: format!("BN-{}-{batch_id:04}", rng.alnum_code(4)),
                    date_administered: date,
                    facility_id: facility.clone(),
                    administered_by: format!("Nurse {}", rng.person_name()),
                    administration_site: Some(rng.pick(SITES).to_string()),
                    notes: None,
                    next_dose_due: next,
                    campaign_id: None,
                    created_at: Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
                });
                match next {
                    // Some doses come late.
                    Some(due) => date = due + Duration::days(rng.int(0..10)),
                    None => break,
                }
            }
        }
    }
    records
}

pub fn stats(vaccinations: &[Vaccination], today: NaiveDate) -> VaccinationStats {
    let week_ahead = today + Duration::days(7);
    VaccinationStats {
        total_vaccinations: vaccinations.len(),
        administered_today: count_where(vaccinations, |v| v.date_administered == today),
        last_seven_days: count_where(vaccinations, |v| {
            v.date_administered <= today && v.date_administered > today - Duration::days(7)
        }),
        unique_patients: distinct_count(vaccinations, |v| v.patient_id.clone()),
        due_this_week: count_where(vaccinations, |v| {
            v.next_dose_due.is_some_and(|d| today <= d && d <= week_ahead)
        }),
    }
}

// ═══════════════════════════════════════════════════════════
// Recording
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaccinationForm {
    pub patient_id: String,
    pub vaccine_name: String,
    pub dose_number: Option<u32>,
    /// Take the dose from this batch instead of the earliest-expiring one.
    pub batch_id: Option<u64>,
    pub date_administered: Option<NaiveDate>,
    pub facility_id: String,
    pub administered_by: String,
    pub administration_site: Option<String>,
    pub notes: Option<String>,
    pub campaign_id: Option<u32>,
}

impl VaccinationForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("patientId")
            .required("vaccineName")
            .required("doseNumber")
            .min("doseNumber", 1.0)
            .required("facilityId")
    }
}

/// The collections a recorded dose writes to.
pub struct DoseLedger<'r> {
    pub vaccinations: &'r mut Collection<Vaccination>,
    pub batches: &'r mut Collection<VaccineBatch>,
    pub campaigns: &'r mut Collection<Campaign>,
}

fn take_dose(
    batches: &mut Collection<VaccineBatch>,
    ctx: &CrudContext<'_>,
    form: &VaccinationForm,
    today: NaiveDate,
) -> Result<Deduction, InventoryError> {
    match form.batch_id {
        Some(id) => {
            let id = id.to_string();
            let batch = batches
                .get(&id)
                .ok_or_else(|| InventoryError::BatchNotFound(id.clone()))?;
            if !batch.vaccine_name.eq_ignore_ascii_case(&form.vaccine_name) {
                return Err(InventoryError::VaccineMismatch(batch.batch_number.clone()));
            }
            inventory::deduct_from_batch(batches, ctx, &id, 1)
        }
        None => inventory::deduct_for_vaccine(
            batches,
            ctx,
            &form.facility_id,
            &form.vaccine_name,
            1,
            today,
        ),
    }
}

/// Record one administered dose.
///
/// Nothing is written unless the patient exists, the dose is new and
/// within the series, stock is available and any named campaign is
/// running for this vaccine.
pub fn record_vaccination(
    ledger: DoseLedger<'_>,
    patients: &[Patient],
    ctx: &CrudContext<'_>,
    form: VaccinationForm,
    now: DateTime<Utc>,
) -> Result<Vaccination, VaccinationError> {
    VaccinationForm::validator().check(&form, ctx.notices)?;
    let today = now.date_naive();
    let date = form.date_administered.unwrap_or(today);
    if date > today {
        ctx.notices.error("Date administered cannot be in the future");
        return Err(VaccinationError::Invalid(FormErrors::one(
            "dateAdministered",
            "past",
            "dateAdministered cannot be in the future",
        )));
    }

    let patient = patients
        .iter()
        .find(|p| p.id == form.patient_id)
        .ok_or_else(|| VaccinationError::PatientNotFound(form.patient_id.clone()))?;

    let vaccine = form.vaccine_name.trim().to_string();
    let dose = form.dose_number.unwrap_or(1);
    let max = max_doses(&vaccine);
    if dose > max {
        return Err(VaccinationError::DoseOutOfRange { vaccine, max });
    }
    let repeated = ledger.vaccinations.records().iter().any(|v| {
        v.patient_id == patient.id
            && v.vaccine_name.eq_ignore_ascii_case(&vaccine)
            && v.dose_number == dose
    });
    if repeated {
        ctx.notices.error("This dose has already been administered to the patient");
        return Err(VaccinationError::DuplicateDose { vaccine, dose });
    }
    let campaign_id = form.campaign_id.map(|id| id.to_string());
    if let Some(id) = &campaign_id {
        campaigns::accepting_dose(ledger.campaigns.records(), id, &vaccine, today)?;
    }

    let DoseLedger {
        vaccinations,
        batches,
        campaigns,
    } = ledger;
    db::atomically(ctx.conn, || -> Result<Vaccination, VaccinationError> {
        let deduction = take_dose(batches, ctx, &form, today)?;
        if let Some(id) = &campaign_id {
            campaigns::record_campaign_dose(campaigns, ctx, id, &vaccine, today)?;
        }
        let administered_by = match form.administered_by.trim() {
            "" => "Current User".to_string(),
            name => name.to_string(),
        };
        let record = Vaccination {
            id: vaccinations.records().iter().map(|v| v.id).max().unwrap_or(0) + 1,
            patient_id: patient.id.clone(),
            patient_name: patient.full_name.clone(),
            vaccine_name: vaccine.clone(),
            dose_number: dose,
            batch_id: deduction.batch_id,
            batch_number: deduction.batch_number,
            date_administered: date,
            facility_id: form.facility_id.clone(),
            administered_by,
            administration_site: form.administration_site.clone(),
            notes: form.notes.clone(),
            next_dose_due: next_dose_due(&vaccine, dose, date),
            campaign_id: form.campaign_id,
            created_at: now,
        };
        vaccinations.create(ctx, record.clone(), InsertAt::Front)?;
        tracing::info!(
            patient = %record.patient_id,
            vaccine = %record.vaccine_name,
            dose,
            batch = %record.batch_number,
            "Vaccination recorded"
        );
        Ok(record)
    })
}

pub struct VaccinationScreen;

impl Screen for VaccinationScreen {
    type Record = Vaccination;
    type Filter = VaccinationFilter;
    type Stats = VaccinationStats;
    type Insights = VaccinationInsights;

    const NAME: &'static str = "vaccinations";
    const STORAGE_KEY: &'static str = "vaccinations";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Vaccination";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Vaccination> {
        generate(rng, today)
    }

    fn stats(_all: &[Vaccination], filtered: &[Vaccination], today: NaiveDate) -> VaccinationStats {
        stats(filtered, today)
    }

    fn insights(records: &[Vaccination], _rng: &mut MockRng, _today: NaiveDate) -> VaccinationInsights {
        VaccinationInsights {
            by_vaccine: count_by_key(records, |v| v.vaccine_name.clone()),
        }
    }

    fn export_stem(today: NaiveDate) -> String {
        format!("{}-{}", Self::NAME, today.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaigns::{create_campaign, set_status, CampaignForm};
    use crate::db::open_memory_database;
    use crate::inventory::list_movements;
    use crate::models::{CampaignStatus, Gender, MovementType};
    use crate::notify::NotificationCenter;
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.from_utc_datetime(&today().and_hms_opt(10, 30, 0).unwrap())
    }

    fn patient(id: &str) -> Patient {
        Patient {
            id: id.into(),
            full_name: "Amara Okafor".into(),
            date_of_birth: today() - Duration::days(300),
            gender: Gender::Female,
            guardian_name: "Ngozi Okafor".into(),
            phone_number: None,
            national_id: None,
            address: None,
            facility_id: "FAC001".into(),
            created_at: now(),
        }
    }

    fn batch(id: u64, number: &str, vaccine: &str, remaining: u32, expiry_in: i64) -> VaccineBatch {
        VaccineBatch {
            id,
            batch_number: number.into(),
            vaccine_name: vaccine.into(),
            manufacturer: "Serum Institute".into(),
            quantity_received: 100,
            quantity_remaining: remaining,
            expiry_date: today() + Duration::days(expiry_in),
            receipt_date: today() - Duration::days(30),
            facility_id: "FAC001".into(),
            created_at: now(),
        }
    }

    struct Books {
        vaccinations: Collection<Vaccination>,
        batches: Collection<VaccineBatch>,
        campaigns: Collection<Campaign>,
    }

    impl Books {
        fn new() -> Self {
            Self {
                vaccinations: Collection::new("vaccinations", 1, "Vaccination", Vec::new()),
                batches: Collection::new(
                    "vaccineBatches",
                    1,
                    "Vaccine batch",
                    vec![
                        batch(1, "BN-LATE", "Measles", 20, 200),
                        batch(2, "BN-SOON", "Measles", 3, 15),
                        batch(3, "BN-OPV", "OPV", 10, 90),
                    ],
                ),
                campaigns: Collection::new("campaigns", 1, "Campaign", Vec::new()),
            }
        }

        fn ledger(&mut self) -> DoseLedger<'_> {
            DoseLedger {
                vaccinations: &mut self.vaccinations,
                batches: &mut self.batches,
                campaigns: &mut self.campaigns,
            }
        }
    }

    fn form(vaccine: &str, dose: u32) -> VaccinationForm {
        VaccinationForm {
            patient_id: "PAT00001".into(),
            vaccine_name: vaccine.into(),
            dose_number: Some(dose),
            facility_id: "FAC001".into(),
            ..Default::default()
        }
    }

    #[test]
    fn dose_rules_and_next_due_date() {
        assert_eq!(max_doses("bcg"), 1);
        assert_eq!(max_doses("Hepatitis B"), 3);
        assert_eq!(max_doses("Unknown"), 1);
        assert_eq!(next_dose_due("Measles", 1, today()), Some(today() + Duration::days(180)));
        assert_eq!(next_dose_due("Measles", 2, today()), None);
        assert_eq!(next_dose_due("BCG", 1, today()), None);
    }

    #[test]
    fn generated_series_are_sequential() {
        let all = generate(&mut MockRng::seeded(21), today());
        assert!(!all.is_empty());
        for v in &all {
            assert!(v.dose_number >= 1 && v.dose_number <= max_doses(&v.vaccine_name));
            assert!(v.date_administered <= today());
            assert_eq!(v.next_dose_due, next_dose_due(&v.vaccine_name, v.dose_number, v.date_administered));
        }
        let mut keys: Vec<(String, String, u32)> = all
            .iter()
            .map(|v| (v.patient_id.clone(), v.vaccine_name.clone(), v.dose_number))
            .collect();
        keys.sort();
        let before = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn recording_takes_earliest_expiring_batch() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut books = Books::new();
        let patients = vec![patient("PAT00001")];

        let v = record_vaccination(books.ledger(), &patients, &ctx, form("Measles", 1), now()).unwrap();
        assert_eq!(v.batch_number, "BN-SOON");
        assert_eq!(v.patient_name, "Amara Okafor");
        assert_eq!(v.next_dose_due, Some(today() + Duration::days(180)));
        assert_eq!(v.administered_by, "Current User");
        assert_eq!(books.batches.get("2").unwrap().quantity_remaining, 2);
        assert_eq!(books.vaccinations.len(), 1);

        let movements = list_movements(&conn, "FAC001", Some("BN-SOON")).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Used);
    }

    #[test]
    fn named_batch_must_match_vaccine() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut books = Books::new();
        let patients = vec![patient("PAT00001")];

        let mut wrong = form("Measles", 1);
        wrong.batch_id = Some(3);
        let err = record_vaccination(books.ledger(), &patients, &ctx, wrong, now()).unwrap_err();
        assert!(matches!(err, VaccinationError::Inventory(InventoryError::VaccineMismatch(_))));

        let mut named = form("Measles", 1);
        named.batch_id = Some(1);
        let v = record_vaccination(books.ledger(), &patients, &ctx, named, now()).unwrap();
        assert_eq!(v.batch_number, "BN-LATE");
        assert_eq!(books.batches.get("1").unwrap().quantity_remaining, 19);
    }

    #[test]
    fn repeated_or_out_of_series_doses_are_refused() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut books = Books::new();
        let patients = vec![patient("PAT00001")];

        record_vaccination(books.ledger(), &patients, &ctx, form("Measles", 1), now()).unwrap();
        let again = record_vaccination(books.ledger(), &patients, &ctx, form("measles", 1), now());
        assert!(matches!(again, Err(VaccinationError::DuplicateDose { dose: 1, .. })));

        let third = record_vaccination(books.ledger(), &patients, &ctx, form("Measles", 3), now());
        assert!(matches!(third, Err(VaccinationError::DoseOutOfRange { max: 2, .. })));

        let mut stranger = form("Measles", 2);
        stranger.patient_id = "PAT09999".into();
        let missing = record_vaccination(books.ledger(), &patients, &ctx, stranger, now());
        assert!(matches!(missing, Err(VaccinationError::PatientNotFound(_))));

        let mut future = form("Measles", 2);
        future.date_administered = Some(today() + Duration::days(1));
        let err = record_vaccination(books.ledger(), &patients, &ctx, future, now()).unwrap_err();
        assert!(matches!(err, VaccinationError::Invalid(ref e) if e.has("dateAdministered")));

        assert_eq!(books.vaccinations.len(), 1);
        assert_eq!(books.batches.get("2").unwrap().quantity_remaining, 2);
    }

    #[test]
    fn no_stock_means_no_record() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut books = Books::new();
        let patients = vec![patient("PAT00001")];

        let err = record_vaccination(books.ledger(), &patients, &ctx, form("DTP", 1), now()).unwrap_err();
        assert!(matches!(err, VaccinationError::Inventory(InventoryError::NoStock { .. })));
        assert!(books.vaccinations.is_empty());
        assert!(conn.is_autocommit());
    }

    #[test]
    fn campaign_dose_is_tallied_with_the_record() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut books = Books::new();
        let patients = vec![patient("PAT00001"), patient("PAT00002")];

        let campaign = create_campaign(
            &mut books.campaigns,
            &ctx,
            CampaignForm {
                name: "OPV Drive".into(),
                vaccine_name: "OPV".into(),
                start_date: Some(today()),
                end_date: Some(today() + Duration::days(7)),
                target_population: Some(10),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        let id = campaign.id.to_string();

        let mut planned = form("OPV", 1);
        planned.campaign_id = Some(campaign.id);
        let err = record_vaccination(books.ledger(), &patients, &ctx, planned.clone(), now()).unwrap_err();
        assert!(matches!(err, VaccinationError::Campaign(CampaignError::NotActive { .. })));
        assert_eq!(books.batches.get("3").unwrap().quantity_remaining, 10);

        set_status(&mut books.campaigns, &ctx, &id, CampaignStatus::Active).unwrap();
        let v = record_vaccination(books.ledger(), &patients, &ctx, planned, now()).unwrap();
        assert_eq!(v.campaign_id, Some(campaign.id));
        assert_eq!(books.campaigns.get(&id).unwrap().vaccinated_count, 1);
        assert_eq!(books.batches.get("3").unwrap().quantity_remaining, 9);
    }

    #[test]
    fn history_is_newest_first() {
        let all = generate(&mut MockRng::seeded(21), today());
        let patient_id = all[0].patient_id.clone();
        let doses = history(&all, &patient_id);
        assert!(!doses.is_empty());
        assert!(doses.iter().all(|v| v.patient_id == patient_id));
        assert!(doses
            .windows(2)
            .all(|w| w[0].date_administered >= w[1].date_administered));
    }

    #[test]
    fn filter_and_stats() {
        let all = generate(&mut MockRng::seeded(21), today());
        let filter = VaccinationFilter {
            vaccine: Choice::only("Measles".into()),
            dose_number: Some(1),
            ..Default::default()
        };
        let measles = filter_records(&all, &filter);
        assert!(measles.iter().all(|v| v.vaccine_name == "Measles" && v.dose_number == 1));

        let st = stats(&all, today());
        assert_eq!(st.total_vaccinations, all.len());
        assert!(st.unique_patients <= GENERATED_PATIENTS);
        assert_eq!(VaccinationScreen::stats(&all, &[], today()).total_vaccinations, 0);
    }
}
