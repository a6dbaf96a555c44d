//! Coverage-gap analysis.
//!
//! One record per (facility, vaccine, age group) sample with its coverage
//! rate, the gap to full coverage, an urgency bucket and rule-based
//! recommendations. Roll-ups by district and by vaccine, plus intervention
//! plans for the most urgent gaps, are derived from the full set.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{CoverageTrend, InterventionStatus, PlanStatus, Priority};
use crate::pipeline::{
    count_where, distinct_count, group_by, in_range, mean_by, rate, round1, text_matches, Choice,
    RecordFilter, Screen,
};

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

pub const AGE_GROUPS: &[&str] = &[
    "0-1 months",
    "2-5 months",
    "6-11 months",
    "12-23 months",
    "2-5 years",
    "6-12 years",
    "13-18 years",
];

pub const DISTRICTS: &[&str] = &["DIST001", "DIST002", "DIST003", "DIST004", "DIST005"];
pub const FACILITIES: &[&str] = &["FAC001", "FAC002", "FAC003", "FAC004", "FAC005"];

const INTERVENTION_TYPES: &[&str] = &[
    "Outreach Campaign",
    "Mobile Vaccination Team",
    "Community Awareness Program",
    "House-to-House Vaccination",
    "School-based Campaign",
    "Market Day Vaccination",
];

const RECORD_COUNT: usize = 50;
const MAX_PLANS: usize = 10;
/// A facility "has a gap" above this gap percentage.
const GAP_THRESHOLD: f64 = 15.0;

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGap {
    pub id: u32,
    pub facility_id: String,
    pub facility_name: String,
    pub district_id: String,
    pub district_name: String,
    pub vaccine_name: String,
    pub age_group: String,
    pub target_population: u32,
    pub vaccinated: u32,
    pub unvaccinated: u32,
    pub coverage_rate: f64,
    pub gap_percentage: f64,
    pub priority: Priority,
    pub last_campaign_date: Option<NaiveDate>,
    pub days_since_last_campaign: Option<i64>,
    pub intervention_status: InterventionStatus,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub total_facilities: usize,
    pub facilities_with_gaps: usize,
    pub average_coverage_rate: f64,
    pub critical_gaps: usize,
    pub high_priority_gaps: usize,
    pub medium_priority_gaps: usize,
    pub low_priority_gaps: usize,
    pub total_target_population: u64,
    pub total_vaccinated: u64,
    pub total_unvaccinated: u64,
}

/// District roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicCoverage {
    pub district_id: String,
    pub district_name: String,
    pub facilities: usize,
    pub target_population: u64,
    pub vaccinated: u64,
    pub coverage_rate: f64,
    pub gap_count: usize,
    pub critical_gaps: usize,
    pub priority: Priority,
}

/// Vaccine roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineCoverage {
    pub vaccine_name: String,
    pub target_population: u64,
    pub vaccinated: u64,
    pub coverage_rate: f64,
    pub gap_percentage: f64,
    pub facilities_affected: usize,
    pub trend: CoverageTrend,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPlan {
    pub id: u32,
    pub gap_id: u32,
    pub facility_name: String,
    pub vaccine_name: String,
    pub age_group: String,
    pub target_population: u32,
    pub intervention_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: u32,
    pub status: PlanStatus,
    pub expected_coverage: f64,
    pub actual_coverage: Option<f64>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageInsights {
    pub districts: Vec<GeographicCoverage>,
    pub vaccines: Vec<VaccineCoverage>,
    pub interventions: Vec<InterventionPlan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverageGapFilter {
    pub search: Option<String>,
    pub vaccine_name: Choice<String>,
    pub age_group: Choice<String>,
    pub district_id: Choice<String>,
    pub facility_id: Choice<String>,
    pub priority: Choice<Priority>,
    pub intervention_status: Choice<InterventionStatus>,
    pub coverage_rate_min: Option<f64>,
    pub coverage_rate_max: Option<f64>,
}

impl RecordFilter<CoverageGap> for CoverageGapFilter {
    fn matches(&self, gap: &CoverageGap) -> bool {
        text_matches(
            self.search.as_deref(),
            &[
                &gap.facility_name,
                &gap.district_name,
                &gap.vaccine_name,
                &gap.age_group,
            ],
        ) && self.vaccine_name.admits_str(&gap.vaccine_name)
            && self.age_group.admits_str(&gap.age_group)
            && self.district_id.admits_str(&gap.district_id)
            && self.facility_id.admits_str(&gap.facility_id)
            && self.priority.admits(&gap.priority)
            && self.intervention_status.admits(&gap.intervention_status)
            && in_range(self.coverage_rate_min, self.coverage_rate_max, gap.coverage_rate)
    }
}

impl CsvRow for CoverageGap {
    const HEADERS: &'static [&'static str] = &[
        "Facility",
        "District",
        "Vaccine",
        "Age Group",
        "Target Population",
        "Vaccinated",
        "Unvaccinated",
        "Coverage Rate",
        "Gap Percentage",
        "Priority",
        "Intervention Status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.facility_name.clone(),
            self.district_name.clone(),
            self.vaccine_name.clone(),
            self.age_group.clone(),
            self.target_population.to_string(),
            self.vaccinated.to_string(),
            self.unvaccinated.to_string(),
            format!("{}%", self.coverage_rate),
            format!("{}%", self.gap_percentage),
            self.priority.to_string(),
            self.intervention_status.to_string(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════

/// Recommendation list for one gap, from its raw (unrounded) rate.
pub fn gap_recommendations(coverage_rate: f64, days_since_campaign: Option<i64>) -> Vec<String> {
    let gap = 100.0 - coverage_rate;
    let mut out = Vec::new();
    if coverage_rate < 70.0 {
        out.push("Conduct targeted outreach campaign");
        out.push("Increase community awareness programs");
    }
    if days_since_campaign.map_or(true, |d| d > 90) {
        out.push("Schedule new vaccination campaign");
    }
    if gap > 30.0 {
        out.push("Deploy mobile vaccination teams");
        out.push("Establish temporary vaccination posts");
    }
    if coverage_rate < 50.0 {
        out.push("Conduct house-to-house vaccination");
        out.push("Engage community leaders and health promoters");
    }
    out.into_iter().map(String::from).collect()
}

/// District urgency also escalates on the number of critical gaps.
pub fn district_priority(coverage_rate: f64, critical_gaps: usize) -> Priority {
    if coverage_rate < 50.0 || critical_gaps > 5 {
        Priority::Critical
    } else if coverage_rate < 70.0 || critical_gaps > 2 {
        Priority::High
    } else if coverage_rate < 85.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn vaccine_recommendations(vaccine: &str, coverage_rate: f64, trend: CoverageTrend) -> Vec<String> {
    let mut out = Vec::new();
    if coverage_rate < 70.0 {
        out.push(format!("Launch {vaccine} catch-up campaign"));
        out.push("Increase vaccine availability and accessibility".to_string());
    }
    if trend == CoverageTrend::Declining {
        out.push("Investigate reasons for declining coverage".to_string());
        out.push("Strengthen routine immunization services".to_string());
    }
    if 100.0 - coverage_rate > 30.0 {
        out.push("Implement mass vaccination drive".to_string());
        out.push("Enhance cold chain capacity".to_string());
    }
    out
}

fn draw_trend(rng: &mut MockRng) -> CoverageTrend {
    let v = rng.unit();
    if v < 0.3 {
        CoverageTrend::Declining
    } else if v < 0.7 {
        CoverageTrend::Stable
    } else {
        CoverageTrend::Improving
    }
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<CoverageGap> {
    let mut gaps: Vec<CoverageGap> = (0..RECORD_COUNT)
        .map(|i| {
            let facility = *rng.pick(FACILITIES);
            let vaccine = *rng.pick(VACCINES);
            let age_group = *rng.pick(AGE_GROUPS);
            let district = *rng.pick(DISTRICTS);

            let target_population: u32 = rng.int(100..1000);
            let raw_rate = rng.unit() * 100.0;
            let vaccinated = (target_population as f64 * raw_rate / 100.0).floor() as u32;

            let days_since = rng.chance(0.7).then(|| rng.int(1..181i64));
            let last_campaign_date = days_since.map(|d| today - Duration::days(d));
            let intervention_status = *rng.pick(InterventionStatus::ALL);

            CoverageGap {
                id: i as u32 + 1,
                facility_id: facility.to_string(),
                facility_name: format!("Health Center {facility}"),
                district_id: district.to_string(),
                district_name: format!("District {district}"),
                vaccine_name: vaccine.to_string(),
                age_group: age_group.to_string(),
                target_population,
                vaccinated,
                unvaccinated: target_population - vaccinated,
                coverage_rate: round1(raw_rate),
                gap_percentage: round1(100.0 - raw_rate),
                priority: Priority::for_coverage(raw_rate),
                last_campaign_date,
                days_since_last_campaign: days_since,
                intervention_status,
                recommendations: gap_recommendations(raw_rate, days_since),
            }
        })
        .collect();

    gaps.sort_by_key(|g| g.priority.rank());
    gaps
}

pub fn stats(gaps: &[CoverageGap]) -> CoverageStats {
    let with_gaps: Vec<&CoverageGap> = gaps.iter().filter(|g| g.gap_percentage > GAP_THRESHOLD).collect();
    let by = |p: Priority| count_where(gaps, |g| g.priority == p);

    CoverageStats {
        total_facilities: distinct_count(gaps, |g| g.facility_id.clone()),
        facilities_with_gaps: distinct_count(&with_gaps, |g| g.facility_id.clone()),
        average_coverage_rate: round1(mean_by(gaps, |g| g.coverage_rate)),
        critical_gaps: by(Priority::Critical),
        high_priority_gaps: by(Priority::High),
        medium_priority_gaps: by(Priority::Medium),
        low_priority_gaps: by(Priority::Low),
        total_target_population: gaps.iter().map(|g| g.target_population as u64).sum(),
        total_vaccinated: gaps.iter().map(|g| g.vaccinated as u64).sum(),
        total_unvaccinated: gaps.iter().map(|g| g.unvaccinated as u64).sum(),
    }
}

/// Per-district totals, lowest coverage first.
pub fn district_coverage(gaps: &[CoverageGap]) -> Vec<GeographicCoverage> {
    let mut out: Vec<GeographicCoverage> = group_by(gaps, |g| g.district_id.clone())
        .into_iter()
        .map(|(district_id, members)| {
            let target: u64 = members.iter().map(|g| g.target_population as u64).sum();
            let vaccinated: u64 = members.iter().map(|g| g.vaccinated as u64).sum();
            let critical = members.iter().filter(|g| g.priority == Priority::Critical).count();
            let coverage = rate(vaccinated as f64, target as f64);
            GeographicCoverage {
                district_name: members[0].district_name.clone(),
                facilities: distinct_count(&members, |g| g.facility_id.clone()),
                target_population: target,
                vaccinated,
                coverage_rate: round1(coverage),
                gap_count: members.len(),
                critical_gaps: critical,
                priority: district_priority(coverage, critical),
                district_id,
            }
        })
        .collect();
    out.sort_by(|a, b| a.coverage_rate.total_cmp(&b.coverage_rate));
    out
}

/// Per-vaccine totals with a simulated trend, lowest coverage first.
pub fn vaccine_coverage(gaps: &[CoverageGap], rng: &mut MockRng) -> Vec<VaccineCoverage> {
    let mut out: Vec<VaccineCoverage> = group_by(gaps, |g| g.vaccine_name.clone())
        .into_iter()
        .map(|(vaccine_name, members)| {
            let target: u64 = members.iter().map(|g| g.target_population as u64).sum();
            let vaccinated: u64 = members.iter().map(|g| g.vaccinated as u64).sum();
            let coverage = rate(vaccinated as f64, target as f64);
            let trend = draw_trend(rng);
            VaccineCoverage {
                target_population: target,
                vaccinated,
                coverage_rate: round1(coverage),
                gap_percentage: round1(100.0 - coverage),
                facilities_affected: distinct_count(&members, |g| g.facility_id.clone()),
                trend,
                recommendations: vaccine_recommendations(&vaccine_name, coverage, trend),
                vaccine_name,
            }
        })
        .collect();
    out.sort_by(|a, b| a.coverage_rate.total_cmp(&b.coverage_rate));
    out
}

/// Plans for the first Critical/High gaps, in record order.
pub fn intervention_plans(
    gaps: &[CoverageGap],
    rng: &mut MockRng,
    today: NaiveDate,
) -> Vec<InterventionPlan> {
    const PLAN_STATUSES: &[PlanStatus] = &[PlanStatus::Planned, PlanStatus::Ongoing, PlanStatus::Completed];

    gaps.iter()
        .filter(|g| matches!(g.priority, Priority::Critical | Priority::High))
        .take(MAX_PLANS)
        .enumerate()
        .map(|(i, gap)| {
            let intervention_type = *rng.pick(INTERVENTION_TYPES);
            let start_date = today + Duration::days(rng.int(1..31i64));
            let end_date = start_date + Duration::days(rng.int(10..30i64));
            let budget: u32 = rng.int(10_000..60_000);
            let expected = (gap.coverage_rate + 15.0 + rng.unit() * 15.0).min(95.0);
            let status = *rng.pick(PLAN_STATUSES);
            let actual = (status == PlanStatus::Completed)
                .then(|| round1((gap.coverage_rate + 10.0 + rng.unit() * 20.0).min(95.0)));

            InterventionPlan {
                id: i as u32 + 1,
                gap_id: gap.id,
                facility_name: gap.facility_name.clone(),
                vaccine_name: gap.vaccine_name.clone(),
                age_group: gap.age_group.clone(),
                target_population: gap.unvaccinated,
                intervention_type: intervention_type.to_string(),
                start_date,
                end_date,
                budget,
                status,
                expected_coverage: round1(expected),
                actual_coverage: actual,
                notes: format!(
                    "{intervention_type} targeting {} unvaccinated children",
                    gap.unvaccinated
                ),
            }
        })
        .collect()
}

pub struct CoverageGapScreen;

impl Screen for CoverageGapScreen {
    type Record = CoverageGap;
    type Filter = CoverageGapFilter;
    type Stats = CoverageStats;
    type Insights = CoverageInsights;

    const NAME: &'static str = "coverage-gaps";
    const STORAGE_KEY: &'static str = "coverageGapData";
    const RECORD_VERSION: u32 = 1;

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<CoverageGap> {
        generate(rng, today)
    }

    fn stats(all: &[CoverageGap], _filtered: &[CoverageGap], _today: NaiveDate) -> CoverageStats {
        stats(all)
    }

    fn insights(records: &[CoverageGap], rng: &mut MockRng, today: NaiveDate) -> CoverageInsights {
        CoverageInsights {
            districts: district_coverage(records),
            vaccines: vaccine_coverage(records, rng),
            interventions: intervention_plans(records, rng, today),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{filter_records, ScreenState};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn gaps() -> Vec<CoverageGap> {
        generate(&mut MockRng::seeded(2024), today())
    }

    #[test]
    fn generates_fifty_sorted_by_priority() {
        let gaps = gaps();
        assert_eq!(gaps.len(), 50);
        assert!(gaps.windows(2).all(|w| w[0].priority.rank() <= w[1].priority.rank()));
        let ids: std::collections::HashSet<u32> = gaps.iter().map(|g| g.id).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn derived_fields_are_consistent() {
        for gap in gaps() {
            assert_eq!(gap.unvaccinated, gap.target_population - gap.vaccinated);
            assert!((100..1000).contains(&gap.target_population));
            // Both rounded from the same raw rate, so they sum to 100 within rounding.
            assert!((gap.coverage_rate + gap.gap_percentage - 100.0).abs() <= 0.1 + 1e-9);
            assert_eq!(gap.facility_name, format!("Health Center {}", gap.facility_id));
            match (gap.last_campaign_date, gap.days_since_last_campaign) {
                (Some(date), Some(days)) => {
                    assert!((1..=180).contains(&days));
                    assert_eq!(today() - date, Duration::days(days));
                }
                (None, None) => {}
                other => panic!("campaign date and days disagree: {other:?}"),
            }
        }
    }

    #[test]
    fn recommendation_rules() {
        let low = gap_recommendations(40.0, None);
        assert_eq!(low.len(), 7);
        assert!(low.contains(&"Conduct house-to-house vaccination".to_string()));

        let healthy = gap_recommendations(90.0, Some(10));
        assert!(healthy.is_empty());

        let stale = gap_recommendations(90.0, Some(91));
        assert_eq!(stale, vec!["Schedule new vaccination campaign".to_string()]);
    }

    #[test]
    fn district_priority_escalates_on_critical_count() {
        assert_eq!(district_priority(90.0, 6), Priority::Critical);
        assert_eq!(district_priority(90.0, 3), Priority::High);
        assert_eq!(district_priority(80.0, 0), Priority::Medium);
        assert_eq!(district_priority(49.0, 0), Priority::Critical);
        assert_eq!(district_priority(90.0, 2), Priority::Low);
    }

    #[test]
    fn stats_over_full_set() {
        let gaps = gaps();
        let s = stats(&gaps);
        assert_eq!(
            s.critical_gaps + s.high_priority_gaps + s.medium_priority_gaps + s.low_priority_gaps,
            50
        );
        assert_eq!(s.total_target_population, s.total_vaccinated + s.total_unvaccinated);
        assert!(s.total_facilities <= FACILITIES.len());
        assert!(s.facilities_with_gaps <= s.total_facilities);
    }

    #[test]
    fn stats_of_empty_set_are_zero() {
        let s = stats(&[]);
        assert_eq!(s.total_facilities, 0);
        assert_eq!(s.average_coverage_rate, 0.0);
    }

    #[test]
    fn roll_ups_sorted_ascending() {
        let gaps = gaps();
        let districts = district_coverage(&gaps);
        assert!(districts.windows(2).all(|w| w[0].coverage_rate <= w[1].coverage_rate));
        assert_eq!(districts.iter().map(|d| d.gap_count).sum::<usize>(), 50);

        let vaccines = vaccine_coverage(&gaps, &mut MockRng::seeded(1));
        assert!(vaccines.windows(2).all(|w| w[0].coverage_rate <= w[1].coverage_rate));
    }

    #[test]
    fn plans_target_urgent_gaps_only() {
        let gaps = gaps();
        let plans = intervention_plans(&gaps, &mut MockRng::seeded(3), today());
        assert!(plans.len() <= 10);
        for plan in &plans {
            let gap = gaps.iter().find(|g| g.id == plan.gap_id).unwrap();
            assert!(matches!(gap.priority, Priority::Critical | Priority::High));
            assert!(plan.expected_coverage <= 95.0);
            assert!(plan.start_date > today());
            assert!(plan.end_date > plan.start_date);
            assert_eq!(plan.actual_coverage.is_some(), plan.status == PlanStatus::Completed);
        }
    }

    #[test]
    fn filter_by_priority_and_range() {
        let gaps = gaps();
        let filter = CoverageGapFilter {
            priority: Choice::only(Priority::Critical),
            coverage_rate_max: Some(30.0),
            ..Default::default()
        };
        let out = filter_records(&gaps, &filter);
        assert!(out.iter().all(|g| g.priority == Priority::Critical && g.coverage_rate <= 30.0));
        assert_eq!(filter_records(&out, &filter), out);
    }

    #[test]
    fn filter_deserializes_ui_sentinels() {
        let filter: CoverageGapFilter =
            serde_json::from_str(r#"{"search":"","priority":"","vaccineName":"all"}"#).unwrap();
        assert_eq!(filter_records(&gaps(), &filter).len(), 50);
    }

    #[test]
    fn screen_reset_restores_all() {
        let mut state = ScreenState::<CoverageGapScreen>::new(gaps());
        state.set_filter(CoverageGapFilter {
            search: Some("measles".into()),
            ..Default::default()
        });
        assert!(state
            .filtered()
            .iter()
            .all(|g| g.vaccine_name == "Measles"));
        state.reset_filters();
        assert_eq!(state.filtered().len(), 50);
    }

    #[test]
    fn csv_row_formats_percentages() {
        let gap = &gaps()[0];
        let fields = gap.csv_fields();
        assert_eq!(fields.len(), CoverageGap::HEADERS.len());
        assert_eq!(fields[7], format!("{}%", gap.coverage_rate));
    }
}
