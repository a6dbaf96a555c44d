//! Vaccination campaigns.
//!
//! A campaign targets one vaccine over a date window and takes doses only
//! while ACTIVE. COMPLETED and CANCELLED are final: the tally stays, the
//! status does not change again.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crud::{Collection, CrudContext, CrudError, FormErrors, InsertAt, Record, Validator};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::inventory::FACILITIES;
use crate::models::CampaignStatus;
use crate::notify::NotificationCenter;
use crate::pipeline::{count_by_key, count_where, round2, text_matches, Choice, RecordFilter, Screen};

const RECORD_COUNT: usize = 20;

const CAMPAIGN_VACCINES: &[&str] = &["OPV", "Measles", "DTP", "Hepatitis B", "HPV", "Rotavirus"];

const CAMPAIGN_THEMES: &[&str] = &[
    "Catch-up Drive",
    "School Outreach",
    "Mobile Clinic Week",
    "Market Day Campaign",
    "National Immunization Day",
];

const AGE_GROUPS: &[&str] = &["0-11 months", "12-23 months", "2-5 years", "9-14 years"];

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaign not found: {0}")]
    NotFound(String),

    #[error("Campaign {name} is {status}, not ACTIVE")]
    NotActive { name: String, status: CampaignStatus },

    #[error("Campaign {campaign} does not cover {vaccine}")]
    VaccineMismatch { campaign: String, vaccine: String },

    #[error("Campaign {name} is already {status}")]
    Closed { name: String, status: CampaignStatus },

    #[error("Invalid form: {0}")]
    Invalid(FormErrors),

    #[error(transparent)]
    Crud(CrudError),
}

impl From<CrudError> for CampaignError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Invalid(errors) => Self::Invalid(errors),
            CrudError::NotFound(id) => Self::NotFound(id),
            other => Self::Crud(other),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub vaccine_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_age_group: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_population: Option<u32>,
    pub vaccinated_count: u32,
    pub status: CampaignStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Share of the target population vaccinated, 0 without a target.
    pub fn coverage_percentage(&self) -> f64 {
        match self.target_population {
            Some(target) if target > 0 => {
                round2(f64::from(self.vaccinated_count) / f64::from(target) * 100.0)
            }
            _ => 0.0,
        }
    }

    /// ACTIVE and inside its date window on `today`.
    pub fn is_running_on(&self, today: NaiveDate) -> bool {
        self.status == CampaignStatus::Active && self.start_date <= today && today <= self.end_date
    }
}

impl Record for Campaign {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub total_campaigns: usize,
    pub planned: usize,
    /// Running today, not merely marked ACTIVE.
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub total_vaccinated: u64,
    /// Over campaigns that set a target population.
    pub overall_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInsights {
    pub by_vaccine: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CampaignFilter {
    pub search: Option<String>,
    pub status: Choice<CampaignStatus>,
    pub vaccine: Choice<String>,
    pub facility_id: Choice<String>,
    /// Only campaigns whose window contains this date.
    pub active_on: Option<NaiveDate>,
}

impl RecordFilter<Campaign> for CampaignFilter {
    fn matches(&self, c: &Campaign) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&c.name, &c.vaccine_name, c.description.as_deref().unwrap_or("")],
        ) && self.status.admits(&c.status)
            && self.vaccine.admits_str(&c.vaccine_name)
            && self.facility_id.admits_str(c.facility_id.as_deref().unwrap_or(""))
            && self
                .active_on
                .map_or(true, |day| c.start_date <= day && day <= c.end_date)
    }
}

impl CsvRow for Campaign {
    const HEADERS: &'static [&'static str] = &[
        "Name",
        "Vaccine",
        "Target Age Group",
        "Start Date",
        "End Date",
        "Target Population",
        "Vaccinated",
        "Coverage (%)",
        "Status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.vaccine_name.clone(),
            self.target_age_group.clone().unwrap_or_default(),
            self.start_date.to_string(),
            self.end_date.to_string(),
            self.target_population.map(|t| t.to_string()).unwrap_or_default(),
            self.vaccinated_count.to_string(),
            format!("{:.2}", self.coverage_percentage()),
            self.status.to_string(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Generation & stats
// ═══════════════════════════════════════════════════════════

pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Campaign> {
    let created = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    (0..RECORD_COUNT)
        .map(|i| {
            let status = *rng.pick(CampaignStatus::ALL);
            let length = Duration::days(rng.int(7..45));
            let start_date = match status {
                CampaignStatus::Planned => today + Duration::days(rng.int(1..60)),
                CampaignStatus::Active => today - Duration::days(rng.int(0..length.num_days())),
                CampaignStatus::Completed | CampaignStatus::Cancelled => {
                    today - length - Duration::days(rng.int(1..120))
                }
            };
            let target: u32 = rng.int(500..5000);
            let vaccinated_count = match status {
                CampaignStatus::Planned => 0,
                _ => rng.int(0..target + 1),
            };
            let vaccine = rng.pick(CAMPAIGN_VACCINES).to_string();
            Campaign {
                id: i as u32 + 1,
                name: format!("{vaccine} {}", rng.pick(CAMPAIGN_THEMES)),
                description: rng.chance(0.5).then(|| format!("Targeted {vaccine} doses")),
                vaccine_name: vaccine,
                target_age_group: Some(rng.pick(AGE_GROUPS).to_string()),
                start_date,
                end_date: start_date + length,
                target_population: Some(target),
                vaccinated_count,
                status,
                facility_id: Some(rng.pick(FACILITIES).to_string()),
                district_id: None,
                created_at: created - Duration::days(rng.int(0..30)),
            }
        })
        .collect()
}

pub fn stats(campaigns: &[Campaign], today: NaiveDate) -> CampaignStats {
    let by_status = |s: CampaignStatus| count_where(campaigns, |c| c.status == s);
    let targeted: Vec<&Campaign> = campaigns
        .iter()
        .filter(|c| c.target_population.is_some_and(|t| t > 0))
        .collect();
    let reached: u64 = targeted.iter().map(|c| u64::from(c.vaccinated_count)).sum();
    let target: u64 = targeted
        .iter()
        .filter_map(|c| c.target_population.map(u64::from))
        .sum();

    CampaignStats {
        total_campaigns: campaigns.len(),
        planned: by_status(CampaignStatus::Planned),
        active: count_where(campaigns, |c| c.is_running_on(today)),
        completed: by_status(CampaignStatus::Completed),
        cancelled: by_status(CampaignStatus::Cancelled),
        total_vaccinated: campaigns.iter().map(|c| u64::from(c.vaccinated_count)).sum(),
        overall_coverage: if target == 0 {
            0.0
        } else {
            round2(reached as f64 / target as f64 * 100.0)
        },
    }
}

/// Campaigns running on `today`, optionally at one facility.
pub fn active_campaigns(campaigns: &[Campaign], facility_id: Option<&str>, today: NaiveDate) -> Vec<Campaign> {
    campaigns
        .iter()
        .filter(|c| c.is_running_on(today))
        .filter(|c| facility_id.map_or(true, |f| c.facility_id.as_deref() == Some(f)))
        .cloned()
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Forms & actions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CampaignForm {
    pub name: String,
    pub description: Option<String>,
    pub vaccine_name: String,
    pub target_age_group: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub target_population: Option<u32>,
    pub facility_id: Option<String>,
    pub district_id: Option<String>,
}

impl CampaignForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("name")
            .required("vaccineName")
            .required("startDate")
            .required("endDate")
            .min("targetPopulation", 1.0)
    }

    fn check(&self, notices: &NotificationCenter) -> Result<(), CrudError> {
        Self::validator().check(self, notices)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                notices.error("End date must be on or after the start date");
                return Err(CrudError::Invalid(FormErrors::one(
                    "endDate",
                    "after",
                    "endDate must be on or after startDate",
                )));
            }
        }
        Ok(())
    }
}

fn find_campaign(campaigns: &Collection<Campaign>, id: &str) -> Result<Campaign, CampaignError> {
    campaigns
        .get(id)
        .cloned()
        .ok_or_else(|| CampaignError::NotFound(id.to_string()))
}

/// New campaigns start PLANNED with nobody vaccinated.
pub fn create_campaign(
    campaigns: &mut Collection<Campaign>,
    ctx: &CrudContext<'_>,
    form: CampaignForm,
    now: DateTime<Utc>,
) -> Result<Campaign, CampaignError> {
    form.check(ctx.notices)?;
    let today = now.date_naive();
    let id = campaigns.records().iter().map(|c| c.id).max().unwrap_or(0) + 1;
    let campaign = Campaign {
        id,
        name: form.name.trim().to_string(),
        description: form.description,
        vaccine_name: form.vaccine_name,
        target_age_group: form.target_age_group,
        start_date: form.start_date.unwrap_or(today),
        end_date: form.end_date.unwrap_or(today),
        target_population: form.target_population,
        vaccinated_count: 0,
        status: CampaignStatus::Planned,
        facility_id: form.facility_id,
        district_id: form.district_id,
        created_at: now,
    };
    campaigns.create(ctx, campaign.clone(), InsertAt::Front)?;
    tracing::info!(id, name = %campaign.name, "Campaign created");
    Ok(campaign)
}

pub fn edit_campaign(
    campaigns: &mut Collection<Campaign>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: CampaignForm,
) -> Result<Campaign, CampaignError> {
    form.check(ctx.notices)?;
    let updated = campaigns.update(ctx, id, |c| {
        c.name = form.name.trim().to_string();
        c.description = form.description;
        c.vaccine_name = form.vaccine_name;
        c.target_age_group = form.target_age_group;
        if let Some(start) = form.start_date {
            c.start_date = start;
        }
        if let Some(end) = form.end_date {
            c.end_date = end;
        }
        c.target_population = form.target_population;
        c.facility_id = form.facility_id;
        c.district_id = form.district_id;
    })?;
    Ok(updated.clone())
}

/// Move a campaign to `status`. Closed campaigns stay closed.
pub fn set_status(
    campaigns: &mut Collection<Campaign>,
    ctx: &CrudContext<'_>,
    id: &str,
    status: CampaignStatus,
) -> Result<Campaign, CampaignError> {
    let current = find_campaign(campaigns, id)?;
    if current.status.is_closed() && current.status != status {
        ctx.notices.error(format!("Campaign is already {}", current.status));
        return Err(CampaignError::Closed {
            name: current.name,
            status: current.status,
        });
    }
    let message = format!("Campaign status updated to {status}");
    let updated = campaigns.update_with(ctx, id, &message, |c| c.status = status)?;
    tracing::info!(id, %status, "Campaign status updated");
    Ok(updated.clone())
}

/// Whether campaign `id` can take a dose of `vaccine` on `today`.
pub fn accepting_dose(
    campaigns: &[Campaign],
    id: &str,
    vaccine: &str,
    today: NaiveDate,
) -> Result<(), CampaignError> {
    let campaign = campaigns
        .iter()
        .find(|c| c.record_id() == id)
        .ok_or_else(|| CampaignError::NotFound(id.to_string()))?;
    if !campaign.is_running_on(today) {
        return Err(CampaignError::NotActive {
            name: campaign.name.clone(),
            status: campaign.status,
        });
    }
    if !campaign.vaccine_name.eq_ignore_ascii_case(vaccine) {
        return Err(CampaignError::VaccineMismatch {
            campaign: campaign.name.clone(),
            vaccine: vaccine.to_string(),
        });
    }
    Ok(())
}

/// Count one more vaccinated person against campaign `id`.
pub fn record_campaign_dose(
    campaigns: &mut Collection<Campaign>,
    ctx: &CrudContext<'_>,
    id: &str,
    vaccine: &str,
    today: NaiveDate,
) -> Result<Campaign, CampaignError> {
    accepting_dose(campaigns.records(), id, vaccine, today)?;
    let updated = campaigns.update_with(ctx, id, "Campaign tally updated", |c| {
        c.vaccinated_count = c.vaccinated_count.saturating_add(1);
    })?;
    Ok(updated.clone())
}

pub struct CampaignScreen;

impl Screen for CampaignScreen {
    type Record = Campaign;
    type Filter = CampaignFilter;
    type Stats = CampaignStats;
    type Insights = CampaignInsights;

    const NAME: &'static str = "campaigns";
    const STORAGE_KEY: &'static str = "campaigns";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Campaign";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<Campaign> {
        generate(rng, today)
    }

    fn stats(all: &[Campaign], _filtered: &[Campaign], today: NaiveDate) -> CampaignStats {
        stats(all, today)
    }

    fn insights(records: &[Campaign], _rng: &mut MockRng, _today: NaiveDate) -> CampaignInsights {
        CampaignInsights {
            by_vaccine: count_by_key(records, |c| c.vaccine_name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.from_utc_datetime(&today().and_hms_opt(9, 0, 0).unwrap())
    }

    fn campaigns() -> Vec<Campaign> {
        generate(&mut MockRng::seeded(8), today())
    }

    fn form() -> CampaignForm {
        CampaignForm {
            name: "Measles Catch-up".into(),
            vaccine_name: "Measles".into(),
            start_date: Some(today()),
            end_date: Some(today() + Duration::days(14)),
            target_population: Some(200),
            facility_id: Some("FAC001".into()),
            ..Default::default()
        }
    }

    #[test]
    fn generated_windows_match_status() {
        for c in campaigns() {
            assert!(c.start_date <= c.end_date);
            match c.status {
                CampaignStatus::Planned => {
                    assert!(c.start_date > today());
                    assert_eq!(c.vaccinated_count, 0);
                }
                CampaignStatus::Active => assert!(c.is_running_on(today())),
                _ => assert!(c.end_date < today()),
            }
            assert!(c.coverage_percentage() <= 100.0);
        }
    }

    #[test]
    fn coverage_is_zero_without_target() {
        let mut c = campaigns().remove(0);
        c.vaccinated_count = 50;
        c.target_population = Some(200);
        assert_eq!(c.coverage_percentage(), 25.0);
        c.target_population = None;
        assert_eq!(c.coverage_percentage(), 0.0);
    }

    #[test]
    fn create_starts_planned_and_validates_window() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("campaigns", 1, "Campaign", campaigns());

        let created = create_campaign(&mut coll, &ctx, form(), now()).unwrap();
        assert_eq!(created.id, 21);
        assert_eq!(created.status, CampaignStatus::Planned);
        assert_eq!(created.vaccinated_count, 0);

        let mut backwards = form();
        backwards.end_date = Some(today() - Duration::days(1));
        match create_campaign(&mut coll, &ctx, backwards, now()) {
            Err(CampaignError::Invalid(errors)) => assert!(errors.has("endDate")),
            other => panic!("expected invalid form, got {other:?}"),
        }
        assert_eq!(coll.len(), 21);
    }

    #[test]
    fn doses_count_only_while_running() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("campaigns", 1, "Campaign", Vec::new());
        let id = create_campaign(&mut coll, &ctx, form(), now()).unwrap().id.to_string();

        let planned = record_campaign_dose(&mut coll, &ctx, &id, "Measles", today());
        assert!(matches!(planned, Err(CampaignError::NotActive { .. })));

        set_status(&mut coll, &ctx, &id, CampaignStatus::Active).unwrap();
        let wrong = record_campaign_dose(&mut coll, &ctx, &id, "OPV", today());
        assert!(matches!(wrong, Err(CampaignError::VaccineMismatch { .. })));
        let tallied = record_campaign_dose(&mut coll, &ctx, &id, "measles", today()).unwrap();
        assert_eq!(tallied.vaccinated_count, 1);
        assert_eq!(tallied.coverage_percentage(), 0.5);

        let after_window = today() + Duration::days(15);
        assert!(accepting_dose(coll.records(), &id, "Measles", after_window).is_err());
        assert!(matches!(
            accepting_dose(coll.records(), "999", "Measles", today()),
            Err(CampaignError::NotFound(_))
        ));
    }

    #[test]
    fn closed_campaign_keeps_its_status() {
        let conn = open_memory_database().unwrap();
        let notices = NotificationCenter::new();
        let ctx = CrudContext { conn: &conn, notices: &notices };
        let mut coll = Collection::new("campaigns", 1, "Campaign", Vec::new());
        let id = create_campaign(&mut coll, &ctx, form(), now()).unwrap().id.to_string();

        set_status(&mut coll, &ctx, &id, CampaignStatus::Cancelled).unwrap();
        let reopened = set_status(&mut coll, &ctx, &id, CampaignStatus::Active);
        assert!(matches!(reopened, Err(CampaignError::Closed { .. })));
        assert_eq!(coll.get(&id).unwrap().status, CampaignStatus::Cancelled);
    }

    #[test]
    fn stats_count_running_campaigns_on_the_given_day() {
        let mut all = campaigns();
        for c in all.iter_mut() {
            c.status = CampaignStatus::Completed;
            c.target_population = Some(100);
            c.vaccinated_count = 50;
        }
        all[0].status = CampaignStatus::Active;
        all[0].start_date = today();
        all[0].end_date = today() + Duration::days(3);
        let st = stats(&all, today());
        assert_eq!(st.active, 1);
        assert_eq!(st.completed, 19);
        assert_eq!(st.overall_coverage, 50.0);
        assert_eq!(st.total_vaccinated, 1000);
        assert_eq!(stats(&all, today() + Duration::days(4)).active, 0);
        assert_eq!(stats(&[], today()).overall_coverage, 0.0);
    }

    #[test]
    fn filter_by_window_and_status() {
        let all = campaigns();
        let filter = CampaignFilter {
            status: Choice::only(CampaignStatus::Active),
            active_on: Some(today()),
            ..Default::default()
        };
        let running = filter_records(&all, &filter);
        assert_eq!(running, active_campaigns(&all, None, today()));
    }
}
