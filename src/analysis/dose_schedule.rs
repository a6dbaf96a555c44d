//! Dose schedule optimization.
//!
//! One schedule per (vaccine, facility) pair with its resource allocation
//! and a heuristic optimization score. Scenario simulations estimate what
//! a given staffing level can achieve against the currently filtered dose
//! total; every run is kept under its own storage key.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::crud::{Collection, CrudContext, CrudError, InsertAt, Record, Validator};
use crate::db::{self, DatabaseError};
use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{SchedulePriority, ScheduleStatus};
use crate::pipeline::{count_where, in_date_range, mean_by, round2, text_matches, Choice, RecordFilter, Screen};

pub const VACCINES: &[&str] = &[
    "BCG",
    "OPV",
    "DTP",
    "Measles",
    "Hepatitis B",
    "Rotavirus",
    "Pneumococcal",
    "HPV",
    "Influenza",
    "COVID-19",
];

pub const FACILITIES: &[(&str, &str)] = &[
    ("FAC001", "Central Health Center"),
    ("FAC002", "Northern Clinic"),
    ("FAC003", "Southern Hospital"),
    ("FAC004", "Eastern Medical Center"),
    ("FAC005", "Western Health Facility"),
];

pub const AGE_GROUPS: &[&str] = &[
    "0-1 months",
    "2-4 months",
    "6-12 months",
    "1-2 years",
    "2-5 years",
    "6-11 years",
    "12-17 years",
    "18-64 years",
    "65+ years",
];

pub const SCENARIO_KEY: &str = "doseScenarios";

/// Doses one person at one point can give per working hour.
const DOSES_PER_HOUR: u64 = 10;

/// Upper bounds on staffing inputs.
const MAX_PERSONNEL: f64 = 1_000.0;
const MAX_POINTS: f64 = 100.0;
const MAX_DAYS: f64 = 365.0;
const OPTIMIZED_SCORE: u32 = 70;
const OPTIMIZE_BOOST: u32 = 15;
const NEW_SCHEDULE_SCORE: u32 = 50;

const OPTIMIZED_RECOMMENDATIONS: &[&str] = &[
    "Resource allocation optimized",
    "Timeline adjusted for efficiency",
    "Personnel scheduling improved",
];

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocation {
    pub personnel: u32,
    pub vaccination_points: u32,
    pub working_hours: u32,
    pub days_required: u32,
    pub daily_capacity: u64,
    pub utilization_rate: f64,
}

impl ResourceAllocation {
    /// Doses per day. Saturates instead of overflowing on oversized input.
    pub fn daily_capacity(personnel: u32, points: u32, hours: u32) -> u64 {
        u64::from(personnel)
            .saturating_mul(u64::from(points))
            .saturating_mul(u64::from(hours))
            .saturating_mul(DOSES_PER_HOUR)
    }

    /// Size the allocation for `scheduled` doses with `allocated` already given.
    pub fn plan(personnel: u32, points: u32, hours: u32, scheduled: u32, allocated: u32) -> Self {
        let daily_capacity = Self::daily_capacity(personnel, points, hours);
        let days_required = if daily_capacity == 0 {
            0
        } else {
            u32::try_from(u64::from(scheduled).div_ceil(daily_capacity)).unwrap_or(u32::MAX)
        };
        let capacity = daily_capacity.saturating_mul(u64::from(days_required)) as f64;
        let utilization_rate = if capacity == 0.0 {
            0.0
        } else {
            allocated as f64 / capacity * 100.0
        };
        Self {
            personnel,
            vaccination_points: points,
            working_hours: hours,
            days_required,
            daily_capacity,
            utilization_rate: round2(utilization_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseSchedule {
    pub id: String,
    pub vaccine_name: String,
    pub batch_number: String,
    pub target_population: u32,
    pub scheduled_doses: u32,
    pub allocated_doses: u32,
    pub remaining_doses: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub priority: SchedulePriority,
    pub status: ScheduleStatus,
    pub facility_id: String,
    pub facility_name: String,
    pub age_group: String,
    pub optimization_score: u32,
    pub constraints: Vec<String>,
    pub recommendations: Vec<String>,
    pub resource_allocation: ResourceAllocation,
}

impl Record for DoseSchedule {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStats {
    pub total_schedules: usize,
    pub optimized_schedules: usize,
    pub average_score: f64,
    pub total_doses: u64,
    pub allocated_doses: u64,
    pub remaining_capacity: u64,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoseScheduleFilter {
    pub search: Option<String>,
    pub vaccine: Choice<String>,
    pub priority: Choice<SchedulePriority>,
    pub status: Choice<ScheduleStatus>,
    pub start_from: Option<NaiveDate>,
    pub start_to: Option<NaiveDate>,
}

impl RecordFilter<DoseSchedule> for DoseScheduleFilter {
    fn matches(&self, s: &DoseSchedule) -> bool {
        // The date range only applies once both ends are chosen.
        let dates_match = match (self.start_from, self.start_to) {
            (Some(from), Some(to)) => in_date_range(Some(from), Some(to), s.start_date),
            _ => true,
        };
        text_matches(
            self.search.as_deref(),
            &[&s.vaccine_name, &s.facility_name, &s.batch_number],
        ) && self.vaccine.admits_str(&s.vaccine_name)
            && self.priority.admits(&s.priority)
            && self.status.admits(&s.status)
            && dates_match
    }
}

impl CsvRow for DoseSchedule {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Vaccine",
        "Batch",
        "Target Population",
        "Scheduled Doses",
        "Allocated",
        "Remaining",
        "Start Date",
        "End Date",
        "Priority",
        "Status",
        "Facility",
        "Age Group",
        "Score",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.vaccine_name.clone(),
            self.batch_number.clone(),
            self.target_population.to_string(),
            self.scheduled_doses.to_string(),
            self.allocated_doses.to_string(),
            self.remaining_doses.to_string(),
            self.start_date.format("%b %-d, %Y").to_string(),
            self.end_date.format("%b %-d, %Y").to_string(),
            self.priority.to_string(),
            self.status.to_string(),
            self.facility_name.clone(),
            self.age_group.clone(),
            self.optimization_score.to_string(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Scoring rules
// ═══════════════════════════════════════════════════════════

pub fn optimization_score(
    utilization_rate: f64,
    priority: SchedulePriority,
    status: ScheduleStatus,
) -> u32 {
    (utilization_rate * 0.4 + priority.score_bonus() + status.score_bonus()).floor() as u32
}

/// Constraint and matching recommendation lists for one schedule.
pub fn assess_constraints(
    scheduled: u32,
    remaining: u32,
    allocation: &ResourceAllocation,
    priority: SchedulePriority,
    status: ScheduleStatus,
) -> (Vec<String>, Vec<String>) {
    let mut constraints = Vec::new();
    let mut recommendations = Vec::new();
    let mut flag = |constraint: &str, recommendation: &str| {
        constraints.push(constraint.to_string());
        recommendations.push(recommendation.to_string());
    };

    if remaining as f64 > scheduled as f64 * 0.3 {
        flag("High remaining doses", "Increase daily vaccination capacity");
    }
    if allocation.utilization_rate < 50.0 {
        flag("Low resource utilization", "Optimize personnel allocation");
    }
    if allocation.days_required > 60 {
        flag("Extended timeline", "Add more vaccination points");
    }
    if priority == SchedulePriority::High && status == ScheduleStatus::Delayed {
        flag("High priority delayed", "Reallocate resources immediately");
    }
    (constraints, recommendations)
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<DoseSchedule> {
    let mut schedules = Vec::with_capacity(VACCINES.len() * FACILITIES.len());

    for vaccine in VACCINES {
        for (facility_id, facility_name) in FACILITIES {
            let target_population: u32 = rng.int(500..3500);
            let scheduled_doses = (target_population as f64 * rng.float(0.8, 1.0)).floor() as u32;
            let allocated_doses = (scheduled_doses as f64 * rng.float(0.5, 1.0)).floor() as u32;
            let remaining_doses = scheduled_doses - allocated_doses;

            let start_date = today + Duration::days(rng.int(-30..30));
            let end_date = start_date + Duration::days(rng.int(30..120));

            let priority = *rng.pick(SchedulePriority::ALL);
            let status = *rng.pick(ScheduleStatus::ALL);

            let allocation = ResourceAllocation::plan(
                rng.int(2..10),
                rng.int(1..5),
                8,
                scheduled_doses,
                allocated_doses,
            );
            // Score from the unrounded utilization.
            let raw_utilization = allocated_doses as f64
                / allocation
                    .daily_capacity
                    .saturating_mul(u64::from(allocation.days_required)) as f64
                * 100.0;
            let (constraints, recommendations) =
                assess_constraints(scheduled_doses, remaining_doses, &allocation, priority, status);

            let prefix: String = vaccine.chars().take(3).collect::<String>().to_uppercase();
            schedules.push(DoseSchedule {
                id: format!("SCH-{:03}", schedules.len() + 1),
                vaccine_name: vaccine.to_string(),
                batch_number: format!("BATCH-{prefix}-{}", rng.int::<u32>(1000..10000)),
                target_population,
                scheduled_doses,
                allocated_doses,
                remaining_doses,
                start_date,
                end_date,
                priority,
                status,
                facility_id: facility_id.to_string(),
                facility_name: facility_name.to_string(),
                age_group: rng.pick(AGE_GROUPS).to_string(),
                optimization_score: optimization_score(raw_utilization, priority, status),
                constraints,
                recommendations,
                resource_allocation: allocation,
            });
        }
    }
    schedules
}

pub fn stats(schedules: &[DoseSchedule]) -> OptimizationStats {
    let by_priority = |p: SchedulePriority| count_where(schedules, |s| s.priority == p);
    OptimizationStats {
        total_schedules: schedules.len(),
        optimized_schedules: count_where(schedules, |s| s.optimization_score >= OPTIMIZED_SCORE),
        average_score: mean_by(schedules, |s| s.optimization_score as f64),
        total_doses: schedules.iter().map(|s| s.scheduled_doses as u64).sum(),
        allocated_doses: schedules.iter().map(|s| s.allocated_doses as u64).sum(),
        remaining_capacity: schedules.iter().map(|s| s.remaining_doses as u64).sum(),
        high_priority: by_priority(SchedulePriority::High),
        medium_priority: by_priority(SchedulePriority::Medium),
        low_priority: by_priority(SchedulePriority::Low),
    }
}

/// Boost the score and replace the recommendations with the optimized set.
pub fn optimize(
    schedules: &mut Collection<DoseSchedule>,
    ctx: &CrudContext<'_>,
    id: &str,
) -> Result<DoseSchedule, CrudError> {
    let updated = schedules.update_with(ctx, id, "Schedule optimized successfully", |s| {
        s.optimization_score = (s.optimization_score + OPTIMIZE_BOOST).min(100);
        s.recommendations = OPTIMIZED_RECOMMENDATIONS.iter().map(|r| r.to_string()).collect();
    })?;
    Ok(updated.clone())
}

// ═══════════════════════════════════════════════════════════
// Schedule form
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleForm {
    pub vaccine_name: String,
    pub batch_number: String,
    pub target_population: u32,
    pub scheduled_doses: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub priority: SchedulePriority,
    pub facility_id: String,
    pub age_group: String,
    pub personnel: u32,
    pub vaccination_points: u32,
    pub working_hours: u32,
}

impl Default for ScheduleForm {
    fn default() -> Self {
        Self {
            vaccine_name: String::new(),
            batch_number: String::new(),
            target_population: 0,
            scheduled_doses: 0,
            start_date: None,
            end_date: None,
            priority: SchedulePriority::Medium,
            facility_id: String::new(),
            age_group: String::new(),
            personnel: 1,
            vaccination_points: 1,
            working_hours: 8,
        }
    }
}

impl ScheduleForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("vaccineName")
            .required("batchNumber")
            .min("targetPopulation", 1.0)
            .min("scheduledDoses", 1.0)
            .required("startDate")
            .required("endDate")
            .required("facilityId")
            .required("ageGroup")
            .min("personnel", 1.0)
            .max("personnel", MAX_PERSONNEL)
            .min("vaccinationPoints", 1.0)
            .max("vaccinationPoints", MAX_POINTS)
            .min("workingHours", 1.0)
            .max("workingHours", 24.0)
    }

    pub fn from_schedule(s: &DoseSchedule) -> Self {
        Self {
            vaccine_name: s.vaccine_name.clone(),
            batch_number: s.batch_number.clone(),
            target_population: s.target_population,
            scheduled_doses: s.scheduled_doses,
            start_date: Some(s.start_date),
            end_date: Some(s.end_date),
            priority: s.priority,
            facility_id: s.facility_id.clone(),
            age_group: s.age_group.clone(),
            personnel: s.resource_allocation.personnel,
            vaccination_points: s.resource_allocation.vaccination_points,
            working_hours: s.resource_allocation.working_hours,
        }
    }
}

/// New schedules are appended with a neutral score and no capacity plan yet.
pub fn create_schedule(
    schedules: &mut Collection<DoseSchedule>,
    ctx: &CrudContext<'_>,
    form: ScheduleForm,
    today: NaiveDate,
) -> Result<DoseSchedule, CrudError> {
    ScheduleForm::validator().check(&form, ctx.notices)?;
    let schedule = DoseSchedule {
        id: format!("SCH-{:03}", schedules.len() + 1),
        vaccine_name: form.vaccine_name,
        batch_number: form.batch_number,
        target_population: form.target_population,
        scheduled_doses: form.scheduled_doses,
        allocated_doses: 0,
        remaining_doses: form.scheduled_doses,
        start_date: form.start_date.unwrap_or(today),
        end_date: form.end_date.unwrap_or(today),
        priority: form.priority,
        status: ScheduleStatus::Scheduled,
        facility_id: form.facility_id,
        facility_name: "Selected Facility".into(),
        age_group: form.age_group,
        optimization_score: NEW_SCHEDULE_SCORE,
        constraints: Vec::new(),
        recommendations: Vec::new(),
        resource_allocation: ResourceAllocation {
            personnel: form.personnel,
            vaccination_points: form.vaccination_points,
            working_hours: form.working_hours,
            days_required: 0,
            daily_capacity: 0,
            utilization_rate: 0.0,
        },
    };
    schedules.create(ctx, schedule.clone(), InsertAt::Back)?;
    Ok(schedule)
}

/// Merge the form into an existing schedule; derived capacity fields stay.
pub fn edit_schedule(
    schedules: &mut Collection<DoseSchedule>,
    ctx: &CrudContext<'_>,
    id: &str,
    form: ScheduleForm,
) -> Result<DoseSchedule, CrudError> {
    ScheduleForm::validator().check(&form, ctx.notices)?;
    let updated = schedules.update(ctx, id, |s| {
        s.vaccine_name = form.vaccine_name;
        s.batch_number = form.batch_number;
        s.target_population = form.target_population;
        s.scheduled_doses = form.scheduled_doses;
        if let Some(start) = form.start_date {
            s.start_date = start;
        }
        if let Some(end) = form.end_date {
            s.end_date = end;
        }
        s.priority = form.priority;
        s.facility_id = form.facility_id;
        s.age_group = form.age_group;
        s.resource_allocation.personnel = form.personnel;
        s.resource_allocation.vaccination_points = form.vaccination_points;
        s.resource_allocation.working_hours = form.working_hours;
    })?;
    Ok(updated.clone())
}

// ═══════════════════════════════════════════════════════════
// Scenario simulation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityWeights {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub personnel_count: u32,
    pub vaccination_points: u32,
    pub working_hours_per_day: u32,
    pub days_available: u32,
    pub target_coverage: f64,
    pub priority_weights: PriorityWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResults {
    pub achievable_coverage: f64,
    pub doses_scheduled: u64,
    pub resource_utilization: f64,
    pub estimated_completion: NaiveDate,
    pub bottlenecks: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSimulation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: SimulationParameters,
    pub results: SimulationResults,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioForm {
    pub name: String,
    pub description: String,
    pub personnel_count: u32,
    pub vaccination_points: u32,
    pub working_hours_per_day: u32,
    pub days_available: u32,
    pub target_coverage: f64,
    pub high_priority_weight: u32,
    pub medium_priority_weight: u32,
    pub low_priority_weight: u32,
}

impl Default for ScenarioForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            personnel_count: 5,
            vaccination_points: 2,
            working_hours_per_day: 8,
            days_available: 30,
            target_coverage: 90.0,
            high_priority_weight: 3,
            medium_priority_weight: 2,
            low_priority_weight: 1,
        }
    }
}

impl ScenarioForm {
    pub fn validator() -> Validator {
        Validator::new()
            .required("name")
            .min("personnelCount", 1.0)
            .max("personnelCount", MAX_PERSONNEL)
            .min("vaccinationPoints", 1.0)
            .max("vaccinationPoints", MAX_POINTS)
            .min("workingHoursPerDay", 1.0)
            .max("workingHoursPerDay", 24.0)
            .min("daysAvailable", 1.0)
            .max("daysAvailable", MAX_DAYS)
            .min("targetCoverage", 0.0)
            .max("targetCoverage", 100.0)
            .min("highPriorityWeight", 1.0)
            .min("mediumPriorityWeight", 1.0)
            .min("lowPriorityWeight", 1.0)
    }
}

/// Evaluate a staffing scenario against `total_doses` still to schedule.
///
/// With nothing to schedule the achievable coverage is 0.
pub fn simulate(
    form: &ScenarioForm,
    total_doses: u64,
    id: String,
    now: DateTime<Utc>,
) -> ScenarioSimulation {
    let daily_capacity = ResourceAllocation::daily_capacity(
        form.personnel_count,
        form.vaccination_points,
        form.working_hours_per_day,
    );
    let total_capacity = daily_capacity.saturating_mul(u64::from(form.days_available));
    let doses_scheduled = total_capacity.min(total_doses);

    let achievable_coverage = if total_doses == 0 {
        0.0
    } else {
        (doses_scheduled as f64 / total_doses as f64 * 100.0).min(form.target_coverage)
    };
    let days_to_finish = if daily_capacity == 0 {
        0
    } else {
        doses_scheduled.div_ceil(daily_capacity)
    };
    let resource_utilization = if total_capacity == 0 {
        0.0
    } else {
        (doses_scheduled as f64 / total_capacity as f64 * 100.0).min(100.0)
    };

    let mut bottlenecks = Vec::new();
    let mut recommendations = Vec::new();
    if achievable_coverage < form.target_coverage {
        bottlenecks.push("Insufficient capacity to reach target coverage".to_string());
        recommendations.push("Increase personnel or vaccination points".to_string());
    }
    if (daily_capacity as f64) < total_doses as f64 / form.days_available.max(1) as f64 {
        bottlenecks.push("Daily capacity below required rate".to_string());
        recommendations.push("Extend working hours or add more days".to_string());
    }

    ScenarioSimulation {
        id,
        name: form.name.clone(),
        description: form.description.clone(),
        parameters: SimulationParameters {
            personnel_count: form.personnel_count,
            vaccination_points: form.vaccination_points,
            working_hours_per_day: form.working_hours_per_day,
            days_available: form.days_available,
            target_coverage: form.target_coverage,
            priority_weights: PriorityWeights {
                high: form.high_priority_weight,
                medium: form.medium_priority_weight,
                low: form.low_priority_weight,
            },
        },
        results: SimulationResults {
            achievable_coverage: round2(achievable_coverage),
            doses_scheduled,
            resource_utilization,
            estimated_completion: i64::try_from(days_to_finish)
                .ok()
                .and_then(|days| now.date_naive().checked_add_signed(Duration::try_days(days)?))
                .unwrap_or(NaiveDate::MAX),
            bottlenecks,
            recommendations,
        },
        created_at: now,
    }
}

/// Validate, simulate against the filtered dose total and append to the
/// stored scenario list.
pub fn run_simulation(
    ctx: &CrudContext<'_>,
    form: &ScenarioForm,
    filtered: &[DoseSchedule],
    now: DateTime<Utc>,
) -> Result<ScenarioSimulation, CrudError> {
    ScenarioForm::validator().check(form, ctx.notices)?;
    let mut scenarios = load_scenarios(ctx.conn)?;
    let id = format!("SIM-{:03}", scenarios.len() + 1);
    let scenario = simulate(form, stats(filtered).total_doses, id, now);
    scenarios.push(scenario.clone());
    db::save_records(ctx.conn, SCENARIO_KEY, DoseScheduleScreen::RECORD_VERSION, &scenarios)?;
    tracing::info!(
        id = %scenario.id,
        coverage = scenario.results.achievable_coverage,
        "Scenario simulated"
    );
    ctx.notices.success("Simulation completed successfully");
    Ok(scenario)
}

pub fn load_scenarios(conn: &rusqlite::Connection) -> Result<Vec<ScenarioSimulation>, DatabaseError> {
    Ok(db::load_records(conn, SCENARIO_KEY, DoseScheduleScreen::RECORD_VERSION)?.unwrap_or_default())
}

pub struct DoseScheduleScreen;

impl Screen for DoseScheduleScreen {
    type Record = DoseSchedule;
    type Filter = DoseScheduleFilter;
    type Stats = OptimizationStats;
    type Insights = ();

    const NAME: &'static str = "dose-schedules";
    const STORAGE_KEY: &'static str = "doseSchedules";
    const RECORD_VERSION: u32 = 1;
    const LABEL: &'static str = "Schedule";

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<DoseSchedule> {
        generate(rng, today)
    }

    fn stats(_all: &[DoseSchedule], filtered: &[DoseSchedule], _today: NaiveDate) -> OptimizationStats {
        stats(filtered)
    }

    fn insights(_records: &[DoseSchedule], _rng: &mut MockRng, _today: NaiveDate) {}
}
