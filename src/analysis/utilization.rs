//! Stock utilization analysis.
//!
//! Monthly stock-use samples per (vaccine, facility): how much was given,
//! wasted or expired, and an efficiency score (utilization minus wastage)
//! graded into four performance bands.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{Performance, Trend};
use crate::pipeline::{count_where, mean_by, rate, round1, text_matches, Choice, RecordFilter, Screen};

pub const VACCINES: &[&str] = &[
    "BCG",
    "OPV",
    "DTP",
    "Measles",
    "Hepatitis B",
    "Rotavirus",
    "Pneumococcal",
    "HPV",
    "Yellow Fever",
    "Tetanus",
];

pub const FACILITIES: &[(&str, &str)] = &[
    ("FAC001", "Central Health Center"),
    ("FAC002", "District Hospital"),
    ("FAC003", "Regional Medical Center"),
    ("FAC004", "Community Clinic"),
    ("FAC005", "Rural Health Post"),
];

const RECORD_COUNT: usize = 50;
const TREND_MONTHS: u32 = 12;
/// Average utilization must move by more than this to count as a trend.
const TREND_MARGIN: f64 = 5.0;

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationRecord {
    pub id: u32,
    pub vaccine_name: String,
    pub facility_id: String,
    pub facility_name: String,
    /// Display label, e.g. "Jan 2025 - Feb 2025".
    pub period: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_stock: u32,
    pub administered: u32,
    pub wastage: u32,
    pub expired: u32,
    pub remaining: u32,
    pub utilization_rate: f64,
    pub wastage_rate: f64,
    pub efficiency_score: f64,
    pub trend: Trend,
    pub status: Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationStats {
    pub total_vaccines_analyzed: usize,
    pub average_utilization_rate: f64,
    pub average_wastage_rate: f64,
    pub excellent_performance: usize,
    pub good_performance: usize,
    pub fair_performance: usize,
    pub poor_performance: usize,
    pub total_doses_administered: u64,
    pub total_doses_wasted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUtilization {
    pub month: String,
    pub utilization: f64,
    pub wastage: f64,
    pub administered: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinePerformance {
    pub vaccine_name: String,
    pub total_doses: u64,
    pub administered: u64,
    pub wastage: u64,
    pub utilization_rate: f64,
    pub wastage_rate: f64,
    pub efficiency_score: f64,
    pub trend: Trend,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityComparison {
    pub facility_id: String,
    pub facility_name: String,
    pub utilization_rate: f64,
    pub wastage_rate: f64,
    pub efficiency_score: f64,
    pub total_doses_administered: u64,
    pub rank: usize,
    pub performance: Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationInsights {
    pub trend: Vec<MonthlyUtilization>,
    pub vaccines: Vec<VaccinePerformance>,
    pub facilities: Vec<FacilityComparison>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UtilizationFilter {
    pub search: Option<String>,
    pub vaccine_name: Choice<String>,
    pub facility_id: Choice<String>,
    pub status: Choice<Performance>,
    pub trend: Choice<Trend>,
    /// Keep periods starting on or after this date.
    pub period_start: Option<NaiveDate>,
    /// Keep periods ending on or before this date.
    pub period_end: Option<NaiveDate>,
}

impl RecordFilter<UtilizationRecord> for UtilizationFilter {
    fn matches(&self, r: &UtilizationRecord) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&r.vaccine_name, &r.facility_name, &r.period],
        ) && self.vaccine_name.admits_str(&r.vaccine_name)
            && self.facility_id.admits_str(&r.facility_id)
            && self.status.admits(&r.status)
            && self.trend.admits(&r.trend)
            && self.period_start.map_or(true, |from| r.period_start >= from)
            && self.period_end.map_or(true, |to| r.period_end <= to)
    }
}

impl CsvRow for UtilizationRecord {
    const HEADERS: &'static [&'static str] = &[
        "Vaccine",
        "Facility",
        "Period",
        "Total Stock",
        "Administered",
        "Wastage",
        "Expired",
        "Remaining",
        "Utilization Rate (%)",
        "Wastage Rate (%)",
        "Efficiency Score",
        "Trend",
        "Status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.vaccine_name.clone(),
            self.facility_name.clone(),
            self.period.clone(),
            self.total_stock.to_string(),
            self.administered.to_string(),
            self.wastage.to_string(),
            self.expired.to_string(),
            self.remaining.to_string(),
            self.utilization_rate.to_string(),
            self.wastage_rate.to_string(),
            self.efficiency_score.to_string(),
            self.trend.to_string(),
            self.status.to_string(),
        ]
    }
}

/// Efficiency bands: 85 / 70 / 50.
pub fn grade(efficiency: f64) -> Performance {
    Performance::grade(efficiency, 85.0, 70.0, 50.0)
}

fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

pub fn period_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", month_label(start), month_label(end))
}

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

/// Each sample covers one month starting 1..=12 months before `today`.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<UtilizationRecord> {
    let mut records: Vec<UtilizationRecord> = (0..RECORD_COUNT)
        .map(|i| {
            let vaccine = rng.pick(VACCINES);
            let (facility_id, facility_name) = rng.pick(FACILITIES);
            let months_ago: u32 = rng.int(0..12);
            let period_start = months_before(today, months_ago + 1);
            let period_end = period_start
                .checked_add_months(Months::new(1))
                .unwrap_or(period_start);

            let total_stock: u32 = rng.int(100..1000);
            let stock = total_stock as f64;
            let administered = (stock * rng.float(0.5, 0.95)).floor() as u32;
            let wastage = (stock * rng.float(0.0, 0.15)).floor() as u32;
            let expired = (stock * rng.float(0.0, 0.1)).floor() as u32;
            // Draws can overshoot the stock; remaining never goes negative.
            let remaining = total_stock.saturating_sub(administered + wastage + expired);

            let utilization_rate = rate(administered as f64, stock);
            let wastage_rate = rate((wastage + expired) as f64, stock);
            let efficiency = utilization_rate - wastage_rate;

            UtilizationRecord {
                id: i as u32 + 1,
                vaccine_name: vaccine.to_string(),
                facility_id: facility_id.to_string(),
                facility_name: facility_name.to_string(),
                period: period_label(period_start, period_end),
                period_start,
                period_end,
                total_stock,
                administered,
                wastage,
                expired,
                remaining,
                utilization_rate: round1(utilization_rate),
                wastage_rate: round1(wastage_rate),
                efficiency_score: round1(efficiency),
                trend: *rng.pick(Trend::ALL),
                status: grade(efficiency),
            }
        })
        .collect();

    records.sort_by(|a, b| b.period_start.cmp(&a.period_start));
    records
}

pub fn stats(records: &[UtilizationRecord]) -> UtilizationStats {
    let by_status = |p: Performance| count_where(records, |r| r.status == p);
    UtilizationStats {
        total_vaccines_analyzed: records.len(),
        average_utilization_rate: round1(mean_by(records, |r| r.utilization_rate)),
        average_wastage_rate: round1(mean_by(records, |r| r.wastage_rate)),
        excellent_performance: by_status(Performance::Excellent),
        good_performance: by_status(Performance::Good),
        fair_performance: by_status(Performance::Fair),
        poor_performance: by_status(Performance::Poor),
        total_doses_administered: records.iter().map(|r| r.administered as u64).sum(),
        total_doses_wasted: records.iter().map(|r| (r.wastage + r.expired) as u64).sum(),
    }
}

// ═══════════════════════════════════════════════════════════
// Roll-ups
// ═══════════════════════════════════════════════════════════

/// The twelve calendar months ending with `today`'s, oldest first.
pub fn monthly_trend(records: &[UtilizationRecord], today: NaiveDate) -> Vec<MonthlyUtilization> {
    (0..TREND_MONTHS)
        .rev()
        .map(|back| {
            let month = months_before(today, back);
            let in_month: Vec<UtilizationRecord> = records
                .iter()
                .filter(|r| {
                    r.period_start.year() == month.year() && r.period_start.month() == month.month()
                })
                .cloned()
                .collect();
            MonthlyUtilization {
                month: month_label(month),
                utilization: round1(mean_by(&in_month, |r| r.utilization_rate)),
                wastage: round1(mean_by(&in_month, |r| r.wastage_rate)),
                administered: in_month.iter().map(|r| r.administered as u64).sum(),
            }
        })
        .collect()
}

struct Totals {
    stock: u64,
    administered: u64,
    lost: u64,
}

impl Totals {
    fn of<'a>(records: impl Iterator<Item = &'a UtilizationRecord>) -> Self {
        records.fold(
            Totals {
                stock: 0,
                administered: 0,
                lost: 0,
            },
            |t, r| Totals {
                stock: t.stock + r.total_stock as u64,
                administered: t.administered + r.administered as u64,
                lost: t.lost + (r.wastage + r.expired) as u64,
            },
        )
    }

    fn utilization(&self) -> f64 {
        rate(self.administered as f64, self.stock as f64)
    }

    fn wastage(&self) -> f64 {
        rate(self.lost as f64, self.stock as f64)
    }
}

pub fn vaccine_recommendation(utilization: f64, wastage: f64, efficiency: f64) -> &'static str {
    if utilization < 70.0 {
        "Increase vaccination campaigns and outreach programs"
    } else if wastage > 10.0 {
        "Implement better cold chain management and stock rotation"
    } else if efficiency >= 85.0 {
        "Maintain current practices and share best practices with other facilities"
    } else {
        "Review forecasting accuracy and adjust ordering patterns"
    }
}

/// Compare the three newest samples with the next three.
pub fn recent_trend(newest_first: &[&UtilizationRecord]) -> Trend {
    let recent = &newest_first[..newest_first.len().min(3)];
    let older = &newest_first[recent.len()..newest_first.len().min(6)];
    if recent.is_empty() || older.is_empty() {
        return Trend::Stable;
    }
    let avg = |rs: &[&UtilizationRecord]| {
        rs.iter().map(|r| r.utilization_rate).sum::<f64>() / rs.len() as f64
    };
    let (recent_avg, older_avg) = (avg(recent), avg(older));
    if recent_avg > older_avg + TREND_MARGIN {
        Trend::Increasing
    } else if recent_avg < older_avg - TREND_MARGIN {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Per-vaccine totals, best efficiency first. `records` must be newest first.
pub fn vaccine_performance(records: &[UtilizationRecord]) -> Vec<VaccinePerformance> {
    let mut out: Vec<VaccinePerformance> = VACCINES
        .iter()
        .filter_map(|vaccine| {
            let samples: Vec<&UtilizationRecord> =
                records.iter().filter(|r| r.vaccine_name == *vaccine).collect();
            if samples.is_empty() {
                return None;
            }
            let totals = Totals::of(samples.iter().copied());
            let utilization = totals.utilization();
            let wastage = totals.wastage();
            let efficiency = utilization - wastage;
            Some(VaccinePerformance {
                vaccine_name: vaccine.to_string(),
                total_doses: totals.stock,
                administered: totals.administered,
                wastage: totals.lost,
                utilization_rate: round1(utilization),
                wastage_rate: round1(wastage),
                efficiency_score: round1(efficiency),
                trend: recent_trend(&samples),
                recommendation: vaccine_recommendation(utilization, wastage, efficiency).to_string(),
            })
        })
        .collect();
    out.sort_by(|a, b| b.efficiency_score.total_cmp(&a.efficiency_score));
    out
}

/// Per-facility totals ranked by efficiency, rank 1 best.
pub fn facility_comparison(records: &[UtilizationRecord]) -> Vec<FacilityComparison> {
    let mut out: Vec<FacilityComparison> = FACILITIES
        .iter()
        .filter_map(|(id, name)| {
            let totals = Totals::of(records.iter().filter(|r| r.facility_id == *id));
            if totals.stock == 0 {
                return None;
            }
            let utilization = totals.utilization();
            let wastage = totals.wastage();
            let efficiency = utilization - wastage;
            Some(FacilityComparison {
                facility_id: id.to_string(),
                facility_name: name.to_string(),
                utilization_rate: round1(utilization),
                wastage_rate: round1(wastage),
                efficiency_score: round1(efficiency),
                total_doses_administered: totals.administered,
                rank: 0,
                performance: grade(efficiency),
            })
        })
        .collect();
    out.sort_by(|a, b| b.efficiency_score.total_cmp(&a.efficiency_score));
    for (i, f) in out.iter_mut().enumerate() {
        f.rank = i + 1;
    }
    out
}

pub struct UtilizationScreen;

impl Screen for UtilizationScreen {
    type Record = UtilizationRecord;
    type Filter = UtilizationFilter;
    type Stats = UtilizationStats;
    type Insights = UtilizationInsights;

    const NAME: &'static str = "utilization-analysis";
    const STORAGE_KEY: &'static str = "utilizationAnalysis";
    const RECORD_VERSION: u32 = 1;

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<UtilizationRecord> {
        generate(rng, today)
    }

    fn stats(all: &[UtilizationRecord], _filtered: &[UtilizationRecord], _today: NaiveDate) -> UtilizationStats {
        stats(all)
    }

    fn insights(records: &[UtilizationRecord], _rng: &mut MockRng, today: NaiveDate) -> UtilizationInsights {
        UtilizationInsights {
            trend: monthly_trend(records, today),
            vaccines: vaccine_performance(records),
            facilities: facility_comparison(records),
        }
    }
}
