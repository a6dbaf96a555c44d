//! Defaulter tracing: registered patients whose next dose is past due.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::DefaulterUrgency;
use crate::patients::Patient;
use crate::pipeline::{count_where, text_matches, Choice, RecordFilter};
use crate::vaccinations::Vaccination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaulter {
    pub patient_id: String,
    pub patient_name: String,
    pub age: u32,
    pub guardian_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub facility_id: String,
    pub vaccine_name: String,
    pub missed_dose: u32,
    /// "Measles (Dose 2)"
    pub missed_vaccine: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
    pub urgency: DefaulterUrgency,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaulterSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaulterFilter {
    pub search: Option<String>,
    pub urgency: Choice<DefaulterUrgency>,
    pub facility_id: Choice<String>,
    pub vaccine: Choice<String>,
}

impl RecordFilter<Defaulter> for DefaulterFilter {
    fn matches(&self, d: &Defaulter) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&d.patient_name, &d.patient_id, &d.guardian_name, &d.vaccine_name],
        ) && self.urgency.admits(&d.urgency)
            && self.facility_id.admits_str(&d.facility_id)
            && self.vaccine.admits_str(&d.vaccine_name)
    }
}

/// One entry per patient and vaccine whose latest dose has a next-dose
/// date before `today`. Most overdue first.
///
/// Doses for patients missing from the registry are skipped.
pub fn find_defaulters(
    patients: &[Patient],
    vaccinations: &[Vaccination],
    today: NaiveDate,
) -> Vec<Defaulter> {
    let registry: HashMap<&str, &Patient> = patients.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut latest: HashMap<(&str, String), &Vaccination> = HashMap::new();
    for v in vaccinations {
        latest
            .entry((v.patient_id.as_str(), v.vaccine_name.to_lowercase()))
            .and_modify(|held| {
                if v.dose_number > held.dose_number {
                    *held = v;
                }
            })
            .or_insert(v);
    }

    let mut defaulters: Vec<Defaulter> = latest
        .into_values()
        .filter_map(|v| {
            let due = v.next_dose_due.filter(|due| *due < today)?;
            let patient = registry.get(v.patient_id.as_str())?;
            let days_overdue = (today - due).num_days();
            let missed_dose = v.dose_number + 1;
            Some(Defaulter {
                patient_id: patient.id.clone(),
                patient_name: patient.full_name.clone(),
                age: patient.age_on(today),
                guardian_name: patient.guardian_name.clone(),
                phone_number: patient.phone_number.clone(),
                facility_id: patient.facility_id.clone(),
                vaccine_name: v.vaccine_name.clone(),
                missed_dose,
                missed_vaccine: format!("{} (Dose {missed_dose})", v.vaccine_name),
                due_date: due,
                days_overdue,
                urgency: DefaulterUrgency::for_days_overdue(days_overdue),
            })
        })
        .collect();

    defaulters.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| a.patient_id.cmp(&b.patient_id))
            .then_with(|| a.vaccine_name.cmp(&b.vaccine_name))
    });
    tracing::debug!(count = defaulters.len(), "Defaulters traced");
    defaulters
}

pub fn summary(defaulters: &[Defaulter]) -> DefaulterSummary {
    DefaulterSummary {
        total: defaulters.len(),
        critical: count_where(defaulters, |d| d.urgency == DefaulterUrgency::Critical),
        high: count_where(defaulters, |d| d.urgency == DefaulterUrgency::High),
        medium: count_where(defaulters, |d| d.urgency == DefaulterUrgency::Medium),
    }
}
