//! Adverse events following immunization.
//!
//! Reported reactions with their clinical details, outcome, regulatory
//! follow-up and a six-criterion causality assessment. Analytics always
//! summarise the full event list; the monthly trend is expressed as a
//! reporting rate per 100,000 vaccinations.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::crud::{Collection, CrudContext, CrudError, InsertAt, Record, Validator};
use crate::export::{yes_no, CsvRow};
use crate::generator::MockRng;
use crate::models::{CausalityCategory, EventStatus, Gender, Outcome, ReporterType, Severity};
use crate::pipeline::{
    count_where, in_date_range, mean_by, rate, text_matches, Choice, RecordFilter, Screen,
};

pub const VACCINES: &[&str] = &[
    "BCG",
    "Hepatitis B",
    "Polio (OPV)",
    "Polio (IPV)",
    "DTP",
    "Hib",
    "Pneumococcal",
    "Rotavirus",
    "Measles",
    "MMR",
    "HPV",
    "COVID-19",
    "Influenza",
    "Varicella",
];

pub const COMMON_SYMPTOMS: &[&str] = &[
    "Fever",
    "Pain at injection site",
    "Redness",
    "Swelling",
    "Fatigue",
    "Headache",
    "Muscle pain",
    "Chills",
    "Nausea",
    "Vomiting",
    "Diarrhea",
    "Rash",
    "Itching",
    "Dizziness",
    "Allergic reaction",
    "Anaphylaxis",
    "Seizure",
    "Difficulty breathing",
    "Chest pain",
    "Loss of consciousness",
];

const MANUFACTURERS: &[&str] = &[
    "Pfizer",
    "Moderna",
    "AstraZeneca",
    "Johnson & Johnson",
    "Serum Institute",
];

const FACILITIES: &[&str] = &[
    "Central Hospital",
    "Regional Health Center",
    "Community Clinic",
    "District Hospital",
    "Urban Health Post",
];

const RECORD_COUNT: usize = 100;
/// Denominator for the monthly reporting rate.
const MONTHLY_VACCINATIONS: f64 = 10_000.0;
const TOP_SYMPTOMS: usize = 10;

pub const ASSESSOR: &str = "Current User";

static AGE_BUCKETS: &[(&str, u32)] = &[
    ("0-1", 1),
    ("1-5", 6),
    ("6-12", 13),
    ("13-18", 19),
    ("19-30", 31),
    ("31-50", 51),
    ("51-70", 71),
];

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdverseEvent {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub patient_age: u32,
    pub patient_gender: Gender,
    pub vaccine_name: String,
    pub vaccine_manufacturer: String,
    pub batch_number: String,
    pub vaccination_date: DateTime<Utc>,
    pub event_date: DateTime<Utc>,
    /// Hours between vaccination and onset.
    pub onset_time: f64,
    pub report_date: DateTime<Utc>,
    pub reported_by: String,
    pub reporter_type: ReporterType,

    pub severity: Severity,
    pub event_type: String,
    pub symptoms: Vec<String>,
    pub description: String,

    pub medical_history: String,
    pub concomitant_medications: String,
    pub allergies: String,
    pub previous_reactions: bool,

    pub outcome: Outcome,
    pub hospitalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospitalization_days: Option<u32>,
    pub treatment_provided: String,

    pub causality_category: CausalityCategory,
    pub causality_score: u32,
    pub assessed_by: String,
    pub assessment_date: DateTime<Utc>,
    pub assessment_notes: String,

    pub follow_up_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<DateTime<Utc>>,
    pub follow_up_notes: String,

    pub reported_to_authority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_report_date: Option<DateTime<Utc>>,
    pub regulatory_action_taken: String,

    pub status: EventStatus,
    pub facility_id: String,
    pub facility_name: String,
}

impl Record for AdverseEvent {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomCount {
    pub symptom: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineEventCount {
    pub vaccine_name: String,
    pub count: usize,
    /// Share of all events, percent.
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupCount {
    pub age_group: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAnalytics {
    pub total_events: usize,
    pub mild_events: usize,
    pub moderate_events: usize,
    pub severe_events: usize,
    pub fatal_events: usize,
    pub under_investigation: usize,
    pub investigated: usize,
    pub closed: usize,
    pub average_onset_time: f64,
    pub hospitalization_rate: f64,
    pub recovery_rate: f64,
    pub top_symptoms: Vec<SymptomCount>,
    pub events_by_vaccine: Vec<VaccineEventCount>,
    pub events_by_age: Vec<AgeGroupCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub month: String,
    pub total_events: usize,
    pub mild_events: usize,
    pub moderate_events: usize,
    pub severe_events: usize,
    pub fatal_events: usize,
    /// Events per 100,000 vaccinations.
    pub reporting_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdverseEventFilter {
    pub search: Option<String>,
    pub vaccine_name: Choice<String>,
    pub severity: Choice<Severity>,
    pub outcome: Choice<Outcome>,
    pub causality: Choice<CausalityCategory>,
    pub status: Choice<EventStatus>,
    pub report_date_start: Option<DateTime<Utc>>,
    pub report_date_end: Option<DateTime<Utc>>,
}

impl RecordFilter<AdverseEvent> for AdverseEventFilter {
    fn matches(&self, e: &AdverseEvent) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&e.patient_name, &e.vaccine_name, &e.event_type, &e.id],
        ) && self.vaccine_name.admits_str(&e.vaccine_name)
            && self.severity.admits(&e.severity)
            && self.outcome.admits(&e.outcome)
            && self.causality.admits(&e.causality_category)
            && self.status.admits(&e.status)
            && in_date_range(self.report_date_start, self.report_date_end, e.report_date)
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}

impl CsvRow for AdverseEvent {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Report Date",
        "Patient Name",
        "Age",
        "Gender",
        "Vaccine",
        "Manufacturer",
        "Batch",
        "Event Date",
        "Onset Hours",
        "Severity",
        "Event Type",
        "Symptoms",
        "Outcome",
        "Hospitalized",
        "Causality",
        "Status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            format_date(&self.report_date),
            self.patient_name.clone(),
            self.patient_age.to_string(),
            self.patient_gender.to_string(),
            self.vaccine_name.clone(),
            self.vaccine_manufacturer.clone(),
            self.batch_number.clone(),
            format_date(&self.event_date),
            format!("{:.1}", self.onset_time),
            self.severity.to_string(),
            self.event_type.clone(),
            self.symptoms.join("; "),
            self.outcome.to_string(),
            yes_no(self.hospitalized),
            self.causality_category.to_string(),
            self.status.to_string(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Severity rules
// ═══════════════════════════════════════════════════════════

pub fn event_types_for(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Mild => &["Local reaction", "Mild fever", "Injection site pain"],
        Severity::Moderate => &["Moderate fever", "Rash", "Headache"],
        Severity::Severe => &["High fever", "Severe allergic reaction", "Persistent vomiting"],
        Severity::LifeThreatening => &["Anaphylaxis", "Seizure", "Severe allergic reaction"],
        Severity::Fatal => &["Anaphylactic shock", "Cardiac arrest", "Severe complication"],
    }
}

pub fn symptom_count_for(severity: Severity) -> usize {
    match severity {
        Severity::Mild => 2,
        Severity::Moderate => 3,
        Severity::Severe => 4,
        Severity::LifeThreatening | Severity::Fatal => 5,
    }
}

fn outcome_for(severity: Severity, rng: &mut MockRng) -> Outcome {
    match severity {
        Severity::Fatal => Outcome::Fatal,
        Severity::LifeThreatening => {
            if rng.chance(0.5) {
                Outcome::NotRecovered
            } else {
                Outcome::Recovering
            }
        }
        Severity::Severe => {
            if rng.chance(0.3) {
                Outcome::Recovered
            } else {
                Outcome::Recovering
            }
        }
        Severity::Mild | Severity::Moderate => {
            if rng.chance(0.2) {
                Outcome::Recovering
            } else {
                Outcome::Recovered
            }
        }
    }
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0) as i64)
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

/// Vaccinations fall in the calendar year before `today`.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<AdverseEvent> {
    let year = today.year() - 1;
    let now = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));

    let mut events: Vec<AdverseEvent> = (0..RECORD_COUNT)
        .map(|i| {
            let month: u32 = rng.int(1..13);
            let day: u32 = rng.int(1..29);
            let vaccination_day = NaiveDate::from_ymd_opt(year, month, day).unwrap_or(today);
            let vaccination_date =
                Utc.from_utc_datetime(&vaccination_day.and_time(NaiveTime::MIN));
            let onset_hours: u32 = rng.int(0..168);
            let event_date = vaccination_date + Duration::hours(onset_hours as i64);
            let report_date = event_date + hours(rng.unit() * 7.0 * 24.0);

            let severity = *rng.pick(Severity::ALL);
            let hospitalized = severity.is_serious();

            let symptoms: Vec<String> = rng
                .shuffle_take(COMMON_SYMPTOMS, symptom_count_for(severity))
                .into_iter()
                .map(String::from)
                .collect();

            AdverseEvent {
                id: format!("AE-{:04}", i + 1),
                patient_id: format!("PAT-{}", rng.alnum_code(6)),
                patient_name: rng.person_name(),
                patient_age: rng.int(1..81),
                patient_gender: *rng.pick(Gender::ALL),
                vaccine_name: rng.pick(VACCINES).to_string(),
                vaccine_manufacturer: rng.pick(MANUFACTURERS).to_string(),
                batch_number: format!("BATCH-{}", rng.alnum_code(6)),
                vaccination_date,
                event_date,
                onset_time: onset_hours as f64,
                report_date,
                reported_by: rng.person_name(),
                reporter_type: *rng.pick(ReporterType::ALL),

                severity,
                event_type: rng.pick(event_types_for(severity)).to_string(),
                symptoms,
                description: format!(
                    "Patient experienced {} adverse event following vaccination.",
                    severity.as_str().to_lowercase()
                ),

                medical_history: pick_text(rng, 0.3, "Hypertension, Diabetes", "None reported"),
                concomitant_medications: pick_text(rng, 0.4, "Paracetamol, Antihistamines", "None"),
                allergies: pick_text(rng, 0.2, "Penicillin allergy", "None known"),
                previous_reactions: rng.chance(0.1),

                outcome: outcome_for(severity, rng),
                hospitalized,
                hospitalization_days: hospitalized.then(|| rng.int(1..15)),
                treatment_provided: if hospitalized {
                    "Symptomatic treatment, monitoring".into()
                } else {
                    "Home care advised".into()
                },

                causality_category: *rng.pick(CausalityCategory::ALL),
                causality_score: rng.int(1..19),
                assessed_by: rng.person_name(),
                assessment_date: report_date + hours(rng.unit() * 14.0 * 24.0),
                assessment_notes: "Causality assessment completed based on WHO criteria.".into(),

                follow_up_required: rng.chance(0.5),
                follow_up_date: rng
                    .chance(0.5)
                    .then(|| now + hours(rng.unit() * 30.0 * 24.0)),
                follow_up_notes: pick_text(rng, 0.5, "Follow-up scheduled", ""),

                reported_to_authority: rng.chance(0.7),
                authority_report_date: rng
                    .chance(0.7)
                    .then(|| report_date + hours(rng.unit() * 7.0 * 24.0)),
                regulatory_action_taken: pick_text(rng, 0.2, "Investigation initiated", "None"),

                status: *rng.pick(EventStatus::ALL),
                facility_id: format!("FAC-{}", rng.int::<u32>(1..6)),
                facility_name: rng.pick(FACILITIES).to_string(),
            }
        })
        .collect();

    events.sort_by(|a, b| b.report_date.cmp(&a.report_date));
    events
}

fn pick_text(rng: &mut MockRng, p: f64, hit: &str, miss: &str) -> String {
    let text = if rng.chance(p) { hit } else { miss };
    text.to_string()
}

// ═══════════════════════════════════════════════════════════
// Analytics
// ═══════════════════════════════════════════════════════════

pub fn analytics(events: &[AdverseEvent]) -> EventAnalytics {
    let total = events.len() as f64;
    let by_severity = |s: Severity| count_where(events, |e| e.severity == s);
    let by_status = |s: EventStatus| count_where(events, |e| e.status == s);

    EventAnalytics {
        total_events: events.len(),
        mild_events: by_severity(Severity::Mild),
        moderate_events: by_severity(Severity::Moderate),
        severe_events: by_severity(Severity::Severe),
        fatal_events: by_severity(Severity::Fatal),
        under_investigation: by_status(EventStatus::UnderInvestigation),
        investigated: by_status(EventStatus::Investigated),
        closed: by_status(EventStatus::Closed),
        average_onset_time: mean_by(events, |e| e.onset_time),
        hospitalization_rate: rate(count_where(events, |e| e.hospitalized) as f64, total),
        recovery_rate: rate(
            count_where(events, |e| e.outcome == Outcome::Recovered) as f64,
            total,
        ),
        top_symptoms: top_symptoms(events),
        events_by_vaccine: events_by_vaccine(events),
        events_by_age: events_by_age(events),
    }
}

/// Most frequent symptoms, ties in first-seen order.
pub fn top_symptoms(events: &[AdverseEvent]) -> Vec<SymptomCount> {
    let mut counts: Vec<SymptomCount> = Vec::new();
    for symptom in events.iter().flat_map(|e| e.symptoms.iter()) {
        match counts.iter_mut().find(|c| &c.symptom == symptom) {
            Some(c) => c.count += 1,
            None => counts.push(SymptomCount {
                symptom: symptom.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_SYMPTOMS);
    counts
}

pub fn events_by_vaccine(events: &[AdverseEvent]) -> Vec<VaccineEventCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in events {
        let entry = counts.entry(e.vaccine_name.as_str()).or_insert_with(|| {
            order.push(e.vaccine_name.as_str());
            0
        });
        *entry += 1;
    }
    let total = events.len() as f64;
    let mut out: Vec<VaccineEventCount> = order
        .into_iter()
        .map(|name| {
            let count = counts.get(name).copied().unwrap_or(0);
            VaccineEventCount {
                vaccine_name: name.to_string(),
                count,
                rate: rate(count as f64, total),
            }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

pub fn age_bucket(age: u32) -> &'static str {
    AGE_BUCKETS
        .iter()
        .find(|(_, upper)| age < *upper)
        .map_or("70+", |(label, _)| label)
}

/// All eight buckets, empty ones included.
pub fn events_by_age(events: &[AdverseEvent]) -> Vec<AgeGroupCount> {
    AGE_BUCKETS
        .iter()
        .map(|(label, _)| *label)
        .chain(std::iter::once("70+"))
        .map(|label| AgeGroupCount {
            age_group: label.to_string(),
            count: count_where(events, |e| age_bucket(e.patient_age) == label),
        })
        .collect()
}

/// Monthly counts by report date, oldest month first.
pub fn trend(events: &[AdverseEvent]) -> Vec<TrendData> {
    let mut months: Vec<((i32, u32), TrendData)> = Vec::new();
    for e in events {
        let key = (e.report_date.year(), e.report_date.month());
        let index = match months.iter().position(|(k, _)| *k == key) {
            Some(i) => i,
            None => {
                months.push((
                    key,
                    TrendData {
                        month: e.report_date.format("%b %Y").to_string(),
                        total_events: 0,
                        mild_events: 0,
                        moderate_events: 0,
                        severe_events: 0,
                        fatal_events: 0,
                        reporting_rate: 0.0,
                    },
                ));
                months.len() - 1
            }
        };
        let data = &mut months[index].1;
        data.total_events += 1;
        match e.severity {
            Severity::Mild => data.mild_events += 1,
            Severity::Moderate => data.moderate_events += 1,
            Severity::Severe => data.severe_events += 1,
            Severity::Fatal => data.fatal_events += 1,
            Severity::LifeThreatening => {}
        }
    }
    months.sort_by_key(|(k, _)| *k);
    months
        .into_iter()
        .map(|(_, mut data)| {
            data.reporting_rate = data.total_events as f64 / MONTHLY_VACCINATIONS * 100_000.0;
            data
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Causality assessment
// ═══════════════════════════════════════════════════════════

/// Six criteria scored 0..=3 each.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CausalityAssessment {
    pub temporal_relationship: u32,
    pub biological_plausibility: u32,
    pub previous_exposure: u32,
    pub other_causes: u32,
    pub rechallenge: u32,
    pub specificity: u32,
    pub notes: String,
}

const CRITERIA: &[&str] = &[
    "temporalRelationship",
    "biologicalPlausibility",
    "previousExposure",
    "otherCauses",
    "rechallenge",
    "specificity",
];

impl CausalityAssessment {
    pub fn total_score(&self) -> u32 {
        self.temporal_relationship
            + self.biological_plausibility
            + self.previous_exposure
            + self.other_causes
            + self.rechallenge
            + self.specificity
    }

    pub fn category(&self) -> CausalityCategory {
        CausalityCategory::for_score(self.total_score())
    }

    /// Spread an existing total evenly across the criteria.
    pub fn prefill(event: &AdverseEvent) -> Self {
        if event.causality_score == 0 {
            return Self::default();
        }
        let each = (event.causality_score as f64 / 6.0).round() as u32;
        Self {
            temporal_relationship: each,
            biological_plausibility: each,
            previous_exposure: each,
            other_causes: each,
            rechallenge: each,
            specificity: each,
            notes: event.assessment_notes.clone(),
        }
    }

    pub fn validator() -> Validator {
        CRITERIA
            .iter()
            .fold(Validator::new(), |v, field| {
                v.required(field).min(field, 0.0).max(field, 3.0)
            })
            .required("notes")
    }
}

/// Record an assessment: score, category, assessor and status.
pub fn apply_causality(
    events: &mut Collection<AdverseEvent>,
    ctx: &CrudContext<'_>,
    id: &str,
    assessment: &CausalityAssessment,
    now: DateTime<Utc>,
) -> Result<AdverseEvent, CrudError> {
    CausalityAssessment::validator().check(assessment, ctx.notices)?;
    let score = assessment.total_score();
    let category = assessment.category();
    let updated = events.update_with(ctx, id, "Causality assessment saved successfully", |e| {
        e.causality_score = score;
        e.causality_category = category;
        e.assessed_by = ASSESSOR.to_string();
        e.assessment_date = now;
        e.assessment_notes = assessment.notes.clone();
        e.status = EventStatus::Investigated;
    })?;
    tracing::info!(id, score, category = %category, "Causality assessed");
    Ok(updated.clone())
}

// ═══════════════════════════════════════════════════════════
// Report form
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdverseEventForm {
    pub patient_name: String,
    pub patient_age: u32,
    pub patient_gender: Option<Gender>,
    pub vaccine_name: String,
    pub vaccine_manufacturer: String,
    pub batch_number: String,
    pub vaccination_date: Option<DateTime<Utc>>,
    pub event_date: Option<DateTime<Utc>>,
    pub report_date: Option<DateTime<Utc>>,
    pub reported_by: String,
    pub reporter_type: ReporterType,
    pub severity: Severity,
    pub event_type: String,
    pub symptoms: Vec<String>,
    pub description: String,
    pub medical_history: String,
    pub concomitant_medications: String,
    pub allergies: String,
    pub previous_reactions: bool,
    pub outcome: Outcome,
    pub hospitalized: bool,
    pub hospitalization_days: u32,
    pub treatment_provided: String,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub follow_up_notes: String,
    pub reported_to_authority: bool,
    pub authority_report_date: Option<DateTime<Utc>>,
    pub regulatory_action_taken: String,
}

impl Default for AdverseEventForm {
    fn default() -> Self {
        Self {
            patient_name: String::new(),
            patient_age: 0,
            patient_gender: None,
            vaccine_name: String::new(),
            vaccine_manufacturer: String::new(),
            batch_number: String::new(),
            vaccination_date: None,
            event_date: None,
            report_date: None,
            reported_by: String::new(),
            reporter_type: ReporterType::HealthcareProvider,
            severity: Severity::Mild,
            event_type: String::new(),
            symptoms: Vec::new(),
            description: String::new(),
            medical_history: String::new(),
            concomitant_medications: String::new(),
            allergies: String::new(),
            previous_reactions: false,
            outcome: Outcome::Unknown,
            hospitalized: false,
            hospitalization_days: 0,
            treatment_provided: String::new(),
            follow_up_required: false,
            follow_up_date: None,
            follow_up_notes: String::new(),
            reported_to_authority: false,
            authority_report_date: None,
            regulatory_action_taken: String::new(),
        }
    }
}

impl AdverseEventForm {
    pub fn validator() -> Validator {
        [
            "patientName",
            "patientGender",
            "vaccineName",
            "vaccineManufacturer",
            "batchNumber",
            "vaccinationDate",
            "eventDate",
            "reportDate",
            "reportedBy",
            "eventType",
        ]
        .iter()
        .fold(Validator::new(), |v, f| v.required(f))
        .required("description")
        .min("patientAge", 0.0)
        .max("patientAge", 120.0)
    }

    /// Onset in hours; negative when the event precedes vaccination.
    fn onset_hours(&self) -> f64 {
        match (self.vaccination_date, self.event_date) {
            (Some(v), Some(e)) => (e - v).num_milliseconds() as f64 / 3_600_000.0,
            _ => 0.0,
        }
    }

    /// Build a record. `existing` keeps identity, causality, status and facility.
    fn into_event(self, existing: Option<&AdverseEvent>, now: DateTime<Utc>) -> AdverseEvent {
        let onset_time = self.onset_hours();
        let stamp = now.timestamp_millis();
        AdverseEvent {
            id: existing.map_or_else(|| format!("AE-{stamp}"), |e| e.id.clone()),
            patient_id: existing.map_or_else(|| format!("PAT-{stamp}"), |e| e.patient_id.clone()),
            patient_name: self.patient_name,
            patient_age: self.patient_age,
            patient_gender: self.patient_gender.unwrap_or(Gender::Other),
            vaccine_name: self.vaccine_name,
            vaccine_manufacturer: self.vaccine_manufacturer,
            batch_number: self.batch_number,
            vaccination_date: self.vaccination_date.unwrap_or(now),
            event_date: self.event_date.unwrap_or(now),
            onset_time,
            report_date: self.report_date.unwrap_or(now),
            reported_by: self.reported_by,
            reporter_type: self.reporter_type,
            severity: self.severity,
            event_type: self.event_type,
            symptoms: self.symptoms,
            description: self.description,
            medical_history: self.medical_history,
            concomitant_medications: self.concomitant_medications,
            allergies: self.allergies,
            previous_reactions: self.previous_reactions,
            outcome: self.outcome,
            hospitalized: self.hospitalized,
            hospitalization_days: self.hospitalized.then_some(self.hospitalization_days),
            treatment_provided: self.treatment_provided,
            causality_category: existing
                .map_or(CausalityCategory::Unclassifiable, |e| e.causality_category),
            causality_score: existing.map_or(0, |e| e.causality_score),
            assessed_by: existing.map_or_else(String::new, |e| e.assessed_by.clone()),
            assessment_date: existing.map_or(now, |e| e.assessment_date),
            assessment_notes: existing.map_or_else(String::new, |e| e.assessment_notes.clone()),
            follow_up_required: self.follow_up_required,
            follow_up_date: self.follow_up_date,
            follow_up_notes: self.follow_up_notes,
            reported_to_authority: self.reported_to_authority,
            authority_report_date: self.authority_report_date,
            regulatory_action_taken: self.regulatory_action_taken,
            status: existing.map_or(EventStatus::Reported, |e| e.status),
            facility_id: existing.map_or_else(|| "FAC-001".to_string(), |e| e.facility_id.clone()),
            facility_name: existing
                .map_or_else(|| "Current Facility".to_string(), |e| e.facility_name.clone()),
        }
    }
}

/// Report a new event; it goes to the top of the list.
pub fn report_event(
    events: &mut Collection<AdverseEvent>,
    ctx: &CrudContext<'_>,
    form: AdverseEventForm,
    now: DateTime<Utc>,
) -> Result<AdverseEvent, CrudError> {
    AdverseEventForm::validator().check(&form, ctx.notices)?;
    let event = form.into_event(None, now);
    events.create(ctx, event.clone(), InsertAt::Front)?;
    Ok(event)
}

/// Replace an event's reported fields, keeping its assessment and status.
pub fn edit_event(
    events: &mut Collection<AdverseEvent>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: AdverseEventForm,
    now: DateTime<Utc>,
) -> Result<AdverseEvent, CrudError> {
    AdverseEventForm::validator().check(&form, ctx.notices)?;
    let existing = events
        .get(id)
        .cloned()
        .ok_or_else(|| CrudError::NotFound(id.to_string()))?;
    let replacement = form.into_event(Some(&existing), now);
    let updated = events.update(ctx, id, |e| *e = replacement)?;
    Ok(updated.clone())
}

pub struct AdverseEventScreen;

impl Screen for AdverseEventScreen {
    type Record = AdverseEvent;
    type Filter = AdverseEventFilter;
    type Stats = EventAnalytics;
    type Insights = Vec<TrendData>;

    const NAME: &'static str = "adverse-events";
    const STORAGE_KEY: &'static str = "adverseEvents";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Adverse event";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<AdverseEvent> {
        generate(rng, today)
    }

    fn stats(all: &[AdverseEvent], _filtered: &[AdverseEvent], _today: NaiveDate) -> EventAnalytics {
        analytics(all)
    }

    fn insights(records: &[AdverseEvent], _rng: &mut MockRng, _today: NaiveDate) -> Vec<TrendData> {
        trend(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::notify::{AutoConfirm, NotificationCenter};
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    fn events() -> Vec<AdverseEvent> {
        generate(&mut MockRng::seeded(77), today())
    }

    fn valid_form() -> AdverseEventForm {
        AdverseEventForm {
            patient_name: "Jane Doe".into(),
            patient_age: 34,
            patient_gender: Some(Gender::Female),
            vaccine_name: "MMR".into(),
            vaccine_manufacturer: "Pfizer".into(),
            batch_number: "BATCH-XYZ123".into(),
            vaccination_date: Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()),
            event_date: Some(Utc.with_ymd_and_hms(2025, 6, 2, 20, 0, 0).unwrap()),
            report_date: Some(now()),
            reported_by: "Dr. Lee".into(),
            event_type: "Rash".into(),
            description: "Rash on both arms".into(),
            severity: Severity::Moderate,
            ..Default::default()
        }
    }

    #[test]
    fn generates_hundred_newest_first() {
        let events = events();
        assert_eq!(events.len(), 100);
        assert_eq!(events.iter().filter(|e| e.id == "AE-0001").count(), 1);
        assert!(events.windows(2).all(|w| w[0].report_date >= w[1].report_date));
    }

    #[test]
    fn generated_events_follow_severity_rules() {
        for e in events() {
            assert_eq!(e.symptoms.len(), symptom_count_for(e.severity));
            assert!(event_types_for(e.severity).contains(&e.event_type.as_str()));
            assert_eq!(e.hospitalized, e.severity.is_serious());
            assert_eq!(e.hospitalization_days.is_some(), e.hospitalized);
            if e.severity == Severity::Fatal {
                assert_eq!(e.outcome, Outcome::Fatal);
            }
            assert!(e.event_date >= e.vaccination_date);
            assert!(e.report_date >= e.event_date);
            assert!(e.onset_time < 168.0);
            assert_eq!(e.vaccination_date.year(), 2024);
        }
    }

    #[test]
    fn causality_extremes() {
        let all_three = CausalityAssessment {
            temporal_relationship: 3,
            biological_plausibility: 3,
            previous_exposure: 3,
            other_causes: 3,
            rechallenge: 3,
            specificity: 3,
            notes: "clear".into(),
        };
        assert_eq!(all_three.total_score(), 18);
        assert_eq!(all_three.category(), CausalityCategory::Certain);

        let zero = CausalityAssessment::default();
        assert_eq!(zero.total_score(), 0);
        assert_eq!(zero.category(), CausalityCategory::Unclassifiable);
    }

    #[test]
    fn causality_criteria_capped_at_three() {
        let bad = CausalityAssessment {
            temporal_relationship: 4,
            notes: "x".into(),
            ..Default::default()
        };
        let errors = CausalityAssessment::validator().validate(&bad).unwrap_err();
        assert_eq!(errors.fields(), vec!["temporalRelationship"]);
    }

    #[test]
    fn prefill_spreads_score() {
        let mut e = events()[0].clone();
        e.causality_score = 13;
        let form = CausalityAssessment::prefill(&e);
        assert_eq!(form.temporal_relationship, 2);
        assert_eq!(form.specificity, 2);
        e.causality_score = 0;
        assert_eq!(CausalityAssessment::prefill(&e), CausalityAssessment::default());
    }

    #[test]
    fn saving_assessment_marks_investigated() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("adverseEvents", 1, "Adverse event", events());
        let id = coll.records()[5].id.clone();

        let assessment = CausalityAssessment {
            temporal_relationship: 3,
            biological_plausibility: 2,
            previous_exposure: 2,
            other_causes: 2,
            rechallenge: 2,
            specificity: 2,
            notes: "Consistent timeline".into(),
        };
        let updated = apply_causality(&mut coll, &ctx, &id, &assessment, now()).unwrap();
        assert_eq!(updated.causality_score, 13);
        assert_eq!(updated.causality_category, CausalityCategory::Probable);
        assert_eq!(updated.assessed_by, ASSESSOR);
        assert_eq!(updated.status, EventStatus::Investigated);
        assert_eq!(updated.assessment_date, now());
    }

    #[test]
    fn report_event_goes_to_front_with_defaults() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("adverseEvents", 1, "Adverse event", events());

        let created = report_event(&mut coll, &ctx, valid_form(), now()).unwrap();
        assert_eq!(coll.records()[0].id, created.id);
        assert!(created.id.starts_with("AE-"));
        assert_eq!(created.status, EventStatus::Reported);
        assert_eq!(created.causality_category, CausalityCategory::Unclassifiable);
        assert_eq!(created.causality_score, 0);
        assert_eq!(created.facility_id, "FAC-001");
        assert_eq!(created.onset_time, 36.0);
        assert_eq!(coll.len(), 101);
    }

    #[test]
    fn invalid_report_is_rejected() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("adverseEvents", 1, "Adverse event", Vec::new());

        let mut form = valid_form();
        form.patient_age = 130;
        form.patient_name.clear();
        let err = report_event(&mut coll, &ctx, form, now()).unwrap_err();
        let CrudError::Invalid(errors) = err else {
            panic!("expected validation failure");
        };
        assert!(errors.has("patientAge"));
        assert!(errors.has("patientName"));
        assert!(coll.is_empty());
    }

    #[test]
    fn edit_preserves_assessment_and_status() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("adverseEvents", 1, "Adverse event", events());
        let original = coll.records()[3].clone();

        let edited = edit_event(&mut coll, &ctx, &original.id, valid_form(), now()).unwrap();
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.patient_id, original.patient_id);
        assert_eq!(edited.causality_score, original.causality_score);
        assert_eq!(edited.status, original.status);
        assert_eq!(edited.facility_name, original.facility_name);
        assert_eq!(edited.patient_name, "Jane Doe");

        coll.delete(&ctx, &original.id, &AutoConfirm(true)).unwrap();
        assert!(coll.get(&original.id).is_none());
    }

    #[test]
    fn analytics_over_full_set() {
        let events = events();
        let a = analytics(&events);
        assert_eq!(a.total_events, 100);
        assert!(a.top_symptoms.len() <= 10);
        assert!(a.top_symptoms.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(a.events_by_age.len(), 8);
        assert_eq!(a.events_by_age.iter().map(|g| g.count).sum::<usize>(), 100);
        let share: f64 = a.events_by_vaccine.iter().map(|v| v.rate).sum();
        assert!((share - 100.0).abs() < 1e-6);
    }

    #[test]
    fn analytics_of_empty_set_are_zero() {
        let a = analytics(&[]);
        assert_eq!(a.average_onset_time, 0.0);
        assert_eq!(a.hospitalization_rate, 0.0);
        assert_eq!(a.recovery_rate, 0.0);
        assert!(a.events_by_vaccine.is_empty());
    }

    #[test]
    fn age_buckets() {
        assert_eq!(age_bucket(0), "0-1");
        assert_eq!(age_bucket(1), "1-5");
        assert_eq!(age_bucket(12), "6-12");
        assert_eq!(age_bucket(18), "13-18");
        assert_eq!(age_bucket(70), "51-70");
        assert_eq!(age_bucket(71), "70+");
    }

    #[test]
    fn trend_is_chronological_with_rate() {
        let t = trend(&events());
        assert_eq!(t.iter().map(|m| m.total_events).sum::<usize>(), 100);
        for m in &t {
            assert!((m.reporting_rate - m.total_events as f64 * 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn filter_by_severity_and_search() {
        let events = events();
        let filter = AdverseEventFilter {
            severity: Choice::only(Severity::Mild),
            search: Some("ae-00".into()),
            ..Default::default()
        };
        let out = filter_records(&events, &filter);
        assert!(!out.is_empty());
        assert!(out.iter().all(|e| e.severity == Severity::Mild));
    }

    #[test]
    fn csv_row_matches_headers() {
        let e = &events()[0];
        let fields = e.csv_fields();
        assert_eq!(fields.len(), AdverseEvent::HEADERS.len());
        assert!(fields[9].contains('.'));
        assert!(fields[14] == "Yes" || fields[14] == "No");
    }
}
