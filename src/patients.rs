//! Patient registry.
//!
//! Patients are registered at a facility and carry the guardian contact
//! used when a dose is missed. Age is always derived from the date of
//! birth against the day asked about, never stored.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crud::{Collection, CrudContext, CrudError, FormErrors, InsertAt, Record, Validator};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::inventory::FACILITIES;
use crate::models::Gender;
use crate::notify::NotificationCenter;
use crate::pipeline::{count_by_key, count_where, in_date_range, text_matches, Choice, RecordFilter, Screen};

const RECORD_COUNT: usize = 60;
/// Generated patients are under this many years old.
const MAX_GENERATED_AGE_DAYS: i64 = 5 * 365;

const VILLAGES: &[&str] = &["Riverside", "Hilltop", "Market Street", "Lakeview", "Old Town"];

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9 -]{7,15}$").unwrap());

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub guardian_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub facility_id: String,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Whole years old on `today`; zero before the first birthday.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.date_of_birth).unwrap_or(0)
    }
}

impl Record for Patient {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub total_patients: usize,
    pub male: usize,
    pub female: usize,
    pub under_one: usize,
    pub under_five: usize,
    pub registered_this_month: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInsights {
    pub by_facility: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientFilter {
    /// Name, guardian, phone, national id or patient id.
    pub search: Option<String>,
    pub gender: Choice<Gender>,
    pub facility_id: Choice<String>,
    pub born_from: Option<NaiveDate>,
    pub born_to: Option<NaiveDate>,
}

impl RecordFilter<Patient> for PatientFilter {
    fn matches(&self, p: &Patient) -> bool {
        text_matches(
            self.search.as_deref(),
            &[
                &p.full_name,
                &p.guardian_name,
                p.phone_number.as_deref().unwrap_or(""),
                p.national_id.as_deref().unwrap_or(""),
                &p.id,
            ],
        ) && self.gender.admits(&p.gender)
            && self.facility_id.admits_str(&p.facility_id)
            && in_date_range(self.born_from, self.born_to, p.date_of_birth)
    }
}

impl CsvRow for Patient {
    const HEADERS: &'static [&'static str] = &[
        "Patient ID",
        "Full Name",
        "Date of Birth",
        "Gender",
        "Guardian",
        "Phone",
        "Address",
        "Facility",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.full_name.clone(),
            self.date_of_birth.to_string(),
            self.gender.to_string(),
            self.guardian_name.clone(),
            self.phone_number.clone().unwrap_or_default(),
            self.address.clone().unwrap_or_default(),
            self.facility_id.clone(),
        ]
    }
}

pub fn patient_id(sequence: usize) -> String {
    format!("PAT{sequence:05}")
}

fn next_sequence(patients: &[Patient]) -> usize {
    patients
        .iter()
        .filter_map(|p| p.id.strip_prefix("PAT")?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

// ═══════════════════════════════════════════════════════════
// Generation & stats
// ═══════════════════════════════════════════════════════════

pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Patient> {
    let registered = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    (0..RECORD_COUNT)
        .map(|i| {
            let date_of_birth = rng.days_before(today, 0..MAX_GENERATED_AGE_DAYS);
            Patient {
                id: patient_id(i + 1),
                full_name: rng.person_name(),
                date_of_birth,
                gender: *rng.pick(&[Gender::Male, Gender::Female]),
                guardian_name: rng.person_name(),
                phone_number: rng
                    .chance(0.8)
                    .then(|| format!("+1 555 {:04}", rng.int(0..10_000))),
                national_id: None,
                address: Some(rng.pick(VILLAGES).to_string()),
                facility_id: rng.pick(FACILITIES).to_string(),
                created_at: registered - chrono::Duration::days(rng.int(0..90)),
            }
        })
        .collect()
}

pub fn stats(patients: &[Patient], today: NaiveDate) -> PatientStats {
    let same_month = |d: NaiveDate| d.year() == today.year() && d.month() == today.month();
    PatientStats {
        total_patients: patients.len(),
        male: count_where(patients, |p| p.gender == Gender::Male),
        female: count_where(patients, |p| p.gender == Gender::Female),
        under_one: count_where(patients, |p| p.age_on(today) < 1),
        under_five: count_where(patients, |p| p.age_on(today) < 5),
        registered_this_month: count_where(patients, |p| same_month(p.created_at.date_naive())),
    }
}

// ═══════════════════════════════════════════════════════════
// Forms & actions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientForm {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub guardian_name: String,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub facility_id: String,
}

impl PatientForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("fullName")
            .required("dateOfBirth")
            .required("gender")
            .required("guardianName")
            .pattern("phoneNumber", &PHONE)
            .required("facilityId")
    }

    /// Field rules, then a date of birth no later than `today`.
    fn check(&self, today: NaiveDate, notices: &NotificationCenter) -> Result<(), CrudError> {
        Self::validator().check(self, notices)?;
        if self.date_of_birth.is_some_and(|dob| dob > today) {
            notices.error("Date of birth cannot be in the future");
            return Err(CrudError::Invalid(FormErrors::one(
                "dateOfBirth",
                "past",
                "dateOfBirth cannot be in the future",
            )));
        }
        Ok(())
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// New patients go first, numbered after the highest existing id.
pub fn register_patient(
    patients: &mut Collection<Patient>,
    ctx: &CrudContext<'_>,
    form: PatientForm,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Patient, CrudError> {
    form.check(today, ctx.notices)?;
    let patient = Patient {
        id: patient_id(next_sequence(patients.records())),
        full_name: form.full_name.trim().to_string(),
        date_of_birth: form.date_of_birth.unwrap_or(today),
        gender: form.gender.unwrap_or(Gender::Other),
        guardian_name: form.guardian_name.trim().to_string(),
        phone_number: blank_to_none(form.phone_number),
        national_id: blank_to_none(form.national_id),
        address: blank_to_none(form.address),
        facility_id: form.facility_id,
        created_at: now,
    };
    patients.create(ctx, patient.clone(), InsertAt::Front)?;
    tracing::info!(id = %patient.id, facility = %patient.facility_id, "Patient registered");
    Ok(patient)
}

pub fn edit_patient(
    patients: &mut Collection<Patient>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: PatientForm,
    today: NaiveDate,
) -> Result<Patient, CrudError> {
    form.check(today, ctx.notices)?;
    let updated = patients.update(ctx, id, |p| {
        p.full_name = form.full_name.trim().to_string();
        if let Some(dob) = form.date_of_birth {
            p.date_of_birth = dob;
        }
        if let Some(gender) = form.gender {
            p.gender = gender;
        }
        p.guardian_name = form.guardian_name.trim().to_string();
        p.phone_number = blank_to_none(form.phone_number);
        p.national_id = blank_to_none(form.national_id);
        p.address = blank_to_none(form.address);
        p.facility_id = form.facility_id;
    })?;
    Ok(updated.clone())
}

pub struct PatientScreen;

impl Screen for PatientScreen {
    type Record = Patient;
    type Filter = PatientFilter;
    type Stats = PatientStats;
    type Insights = PatientInsights;

    const NAME: &'static str = "patients";
    const STORAGE_KEY: &'static str = "patients";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Patient";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Patient> {
        generate(rng, today)
    }

    fn stats(_all: &[Patient], filtered: &[Patient], today: NaiveDate) -> PatientStats {
        stats(filtered, today)
    }

    fn insights(records: &[Patient], _rng: &mut MockRng, _today: NaiveDate) -> PatientInsights {
        PatientInsights {
            by_facility: count_by_key(records, |p| p.facility_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::pipeline::filter_records;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()
    }

    fn form() -> PatientForm {
        PatientForm {
            full_name: " Amara Okafor ".into(),
            date_of_birth: Some(today() - Duration::days(400)),
            gender: Some(Gender::Female),
            guardian_name: "Ngozi Okafor".into(),
            phone_number: Some("+234 801 5550".into()),
            national_id: Some("  ".into()),
            address: None,
            facility_id: "FAC001".into(),
        }
    }

    #[test]
    fn age_counts_whole_years() {
        let mut p = generate(&mut MockRng::seeded(1), today()).remove(0);
        p.date_of_birth = NaiveDate::from_ymd_opt(2023, 4, 11).unwrap();
        assert_eq!(p.age_on(today()), 1);
        p.date_of_birth = NaiveDate::from_ymd_opt(2023, 4, 10).unwrap();
        assert_eq!(p.age_on(today()), 2);
        p.date_of_birth = today() + Duration::days(1);
        assert_eq!(p.age_on(today()), 0);
    }

    #[test]
    fn generated_patients_are_under_five() {
        let patients = generate(&mut MockRng::seeded(4), today());
        assert_eq!(patients.len(), 60);
        assert_eq!(patients[59].id, "PAT00060");
        assert!(patients.iter().all(|p| p.age_on(today()) < 5));
        assert!(patients.iter().all(|p| FACILITIES.contains(&p.facility_id.as_str())));
    }

    #[test]
    fn register_numbers_after_highest_id() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut existing = generate(&mut MockRng::seeded(4), today());
        existing.remove(3);
        let mut coll = Collection::new("patients", 1, "Patient", existing);

        let p = register_patient(&mut coll, &ctx, form(), today(), Utc::now()).unwrap();
        assert_eq!(p.id, "PAT00061");
        assert_eq!(p.full_name, "Amara Okafor");
        assert_eq!(p.national_id, None);
        assert_eq!(coll.records()[0].id, "PAT00061");
        assert_eq!(notices.last().unwrap().message, "Patient created successfully");
    }

    #[test]
    fn future_birth_date_rejected() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("patients", 1, "Patient", Vec::new());

        let mut bad = form();
        bad.date_of_birth = Some(today() + Duration::days(1));
        match register_patient(&mut coll, &ctx, bad, today(), Utc::now()) {
            Err(CrudError::Invalid(errors)) => assert_eq!(errors.fields(), vec!["dateOfBirth"]),
            other => panic!("expected invalid form, got {other:?}"),
        }
        assert!(coll.is_empty());
    }

    #[test]
    fn form_requires_core_fields_and_valid_phone() {
        let errors = PatientForm::validator()
            .validate(&PatientForm {
                phone_number: Some("call me".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(
            errors.fields(),
            vec!["fullName", "dateOfBirth", "gender", "guardianName", "phoneNumber", "facilityId"]
        );
    }

    #[test]
    fn search_reaches_guardian_and_phone() {
        let patients = generate(&mut MockRng::seeded(4), today());
        let guardian = patients[0].guardian_name.clone();
        let filter = PatientFilter {
            search: Some(guardian.to_lowercase()),
            ..Default::default()
        };
        let out = filter_records(&patients, &filter);
        assert!(out.iter().any(|p| p.id == patients[0].id));

        let filter = PatientFilter {
            gender: Choice::only(Gender::Female),
            facility_id: Choice::only("FAC002".into()),
            ..Default::default()
        };
        assert!(filter_records(&patients, &filter)
            .iter()
            .all(|p| p.gender == Gender::Female && p.facility_id == "FAC002"));
    }

    #[test]
    fn stats_follow_the_supplied_date() {
        let mut patients = generate(&mut MockRng::seeded(4), today());
        for p in patients.iter_mut() {
            p.date_of_birth = today() - Duration::days(800);
        }
        patients[0].date_of_birth = today() - Duration::days(100);
        let st = stats(&patients, today());
        assert_eq!(st.total_patients, 60);
        assert_eq!(st.under_one, 1);
        assert_eq!(st.under_five, 60);
        assert_eq!(st.male + st.female, 60);

        let later = PatientScreen::stats(&[], &patients, today() + Duration::days(6 * 365));
        assert_eq!(later.under_five, 0);
    }
}
