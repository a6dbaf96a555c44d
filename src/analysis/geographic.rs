//! Geographic distribution of coverage.
//!
//! A fixed four-level hierarchy (national, regions, districts, facilities)
//! linked by parent ids. Summary cards follow the current filter; the
//! regional, district and facility tables always cover the whole tree.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{LocationLevel, Performance, Trend};
use crate::pipeline::{count_where, in_range, mean_by, round1, text_matches, Choice, RecordFilter, Screen};

pub const REGIONS: &[&str] = &["Central", "Eastern", "Northern", "Southern", "Western"];

const DISTRICTS_PER_REGION: usize = 3;
const FACILITIES_PER_DISTRICT: usize = 2;
/// Share of the population targeted for immunization.
const TARGET_SHARE: f64 = 0.1;
const NATIONAL_ID: &str = "NAT-1";

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicLocation {
    pub id: String,
    #[serde(rename = "type")]
    pub location_type: LocationLevel,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    pub code: String,
    /// Depth in the hierarchy, 0 for national.
    pub level: u8,
    pub population: u64,
    pub target_population: u64,
    pub facilities: u32,
    pub health_workers: u32,
    pub vaccines_administered: u64,
    pub coverage_rate: f64,
    pub performance_score: f64,
    pub rank: u32,
    pub trend: Trend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub status: Performance,
    pub last_updated: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    pub total_locations: usize,
    pub total_facilities: usize,
    pub total_population: u64,
    pub average_coverage: f64,
    pub excellent_locations: usize,
    pub good_locations: usize,
    pub fair_locations: usize,
    pub poor_locations: usize,
    pub top_performer: String,
    pub lowest_performer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalComparison {
    pub region_name: String,
    pub coverage: f64,
    pub population: u64,
    pub facilities: u32,
    pub vaccinations: u64,
    pub performance_score: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictPerformance {
    pub district_name: String,
    pub region_name: String,
    pub coverage: f64,
    pub facilities: u32,
    pub population: u64,
    pub performance_score: f64,
    pub status: Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityMetrics {
    pub facility_name: String,
    pub district_name: String,
    pub region_name: String,
    pub coverage: f64,
    pub population: u64,
    pub health_workers: u32,
    pub vaccinations: u64,
    pub performance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicInsights {
    pub regions: Vec<RegionalComparison>,
    pub districts: Vec<DistrictPerformance>,
    pub facilities: Vec<FacilityMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeographicFilter {
    pub search: Option<String>,
    pub level: Choice<LocationLevel>,
    pub status: Choice<Performance>,
    /// Compared case-insensitively, so "Increasing" and "increasing" agree.
    pub trend: Choice<String>,
    /// Substring of the location's own name or its parent's name.
    pub region: Choice<String>,
    pub min_coverage: Option<f64>,
    pub max_coverage: Option<f64>,
}

impl RecordFilter<GeographicLocation> for GeographicFilter {
    fn matches(&self, l: &GeographicLocation) -> bool {
        let trend_ok = self
            .trend
            .get()
            .map_or(true, |t| t.eq_ignore_ascii_case(l.trend.as_str()));
        let region_ok = self.region.get().map_or(true, |r| {
            l.name.contains(r.as_str()) || l.parent_name.as_deref().is_some_and(|p| p.contains(r.as_str()))
        });
        text_matches(self.search.as_deref(), &[&l.name, &l.code])
            && self.level.admits(&l.location_type)
            && self.status.admits(&l.status)
            && trend_ok
            && region_ok
            && in_range(self.min_coverage, self.max_coverage, l.coverage_rate)
    }
}

impl CsvRow for GeographicLocation {
    const HEADERS: &'static [&'static str] = &[
        "Location Name",
        "Type",
        "Code",
        "Parent",
        "Population",
        "Target Population",
        "Facilities",
        "Health Workers",
        "Vaccinations",
        "Coverage Rate",
        "Performance Score",
        "Status",
        "Trend",
        "Rank",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.location_type.to_string(),
            self.code.clone(),
            self.parent_name.clone().unwrap_or_else(|| "N/A".into()),
            self.population.to_string(),
            self.target_population.to_string(),
            self.facilities.to_string(),
            self.health_workers.to_string(),
            self.vaccines_administered.to_string(),
            format!("{}%", self.coverage_rate),
            self.performance_score.to_string(),
            self.status.to_string(),
            self.trend.to_string(),
            self.rank.to_string(),
        ]
    }
}

/// Coverage bands: 90 / 80 / 70.
pub fn grade(coverage: f64) -> Performance {
    Performance::grade(coverage, 90.0, 80.0, 70.0)
}

/// Above 85 is increasing; above `stable_floor` is stable.
pub fn trend_for(coverage: f64, stable_floor: f64) -> Trend {
    if coverage > 85.0 {
        Trend::Increasing
    } else if coverage > stable_floor {
        Trend::Stable
    } else {
        Trend::Decreasing
    }
}

fn region_code(region: &str) -> String {
    region.chars().take(3).collect::<String>().to_uppercase()
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

/// Ranges for one tier of the hierarchy.
struct Tier {
    level: LocationLevel,
    depth: u8,
    coverage: (f64, f64),
    population: (f64, f64),
    facilities: std::ops::Range<u32>,
    health_workers: std::ops::Range<u32>,
    score_spread: f64,
    stable_floor: f64,
}

const REGION_TIER: Tier = Tier {
    level: LocationLevel::Region,
    depth: 1,
    coverage: (75.0, 95.0),
    population: (8_000_000.0, 12_000_000.0),
    facilities: 40..60,
    health_workers: 200..300,
    score_spread: 5.0,
    stable_floor: 75.0,
};

const DISTRICT_TIER: Tier = Tier {
    level: LocationLevel::District,
    depth: 2,
    coverage: (70.0, 95.0),
    population: (1_500_000.0, 2_500_000.0),
    facilities: 10..20,
    health_workers: 50..100,
    score_spread: 4.0,
    stable_floor: 72.0,
};

const FACILITY_TIER: Tier = Tier {
    level: LocationLevel::Facility,
    depth: 3,
    coverage: (65.0, 95.0),
    population: (50_000.0, 200_000.0),
    facilities: 1..2,
    health_workers: 5..15,
    score_spread: 5.0,
    stable_floor: 70.0,
};

struct Placement {
    id: String,
    name: String,
    parent: (String, String),
    code: String,
    rank: u32,
    last_updated: NaiveDate,
}

fn draw_location(rng: &mut MockRng, tier: &Tier, at: Placement) -> GeographicLocation {
    let coverage = rng.float(tier.coverage.0, tier.coverage.1);
    let population = rng.float(tier.population.0, tier.population.1);
    let target = population * TARGET_SHARE;
    let facilities = rng.int(tier.facilities.clone());
    let health_workers = rng.int(tier.health_workers.clone());
    let spread = tier.score_spread;
    let score = coverage + rng.float(-spread, spread);
    let (latitude, longitude) = if tier.level == LocationLevel::Facility {
        (
            Some(-1.286389 + rng.float(0.0, 8.0)),
            Some(36.817223 + rng.float(0.0, 8.0)),
        )
    } else {
        (None, None)
    };

    GeographicLocation {
        id: at.id,
        location_type: tier.level,
        name: at.name,
        parent_id: Some(at.parent.0),
        parent_name: Some(at.parent.1),
        code: at.code,
        level: tier.depth,
        population: population.floor() as u64,
        target_population: target.floor() as u64,
        facilities,
        health_workers,
        vaccines_administered: (target * coverage / 100.0).floor() as u64,
        coverage_rate: round1(coverage),
        performance_score: round1(score),
        rank: at.rank,
        trend: trend_for(coverage, tier.stable_floor),
        latitude,
        longitude,
        status: grade(coverage),
        last_updated: at.last_updated,
    }
}

fn national(today: NaiveDate) -> GeographicLocation {
    GeographicLocation {
        id: NATIONAL_ID.into(),
        location_type: LocationLevel::National,
        name: "Kenya National Immunization Program".into(),
        parent_id: None,
        parent_name: None,
        code: "KE-NAT-001".into(),
        level: 0,
        population: 52_000_000,
        target_population: 5_200_000,
        facilities: 250,
        health_workers: 1250,
        vaccines_administered: 4_680_000,
        coverage_rate: 90.0,
        performance_score: 92.5,
        rank: 1,
        trend: Trend::Increasing,
        latitude: None,
        longitude: None,
        status: Performance::Excellent,
        last_updated: today,
    }
}

/// Build the whole tree: ids are numbered in creation order, ranks follow
/// the tiers, and the result is sorted by rank.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<GeographicLocation> {
    let days_ago = |n: usize| today - Duration::days(n as i64);
    let mut locations = vec![national(today)];
    let mut next_id = 2;

    let mut region_ids = Vec::with_capacity(REGIONS.len());
    for (index, region) in REGIONS.iter().enumerate() {
        let id = format!("REG-{next_id}");
        next_id += 1;
        region_ids.push(id.clone());
        let placement = Placement {
            id,
            name: format!("{region} Region"),
            parent: (NATIONAL_ID.into(), "Kenya National".into()),
            code: format!("KE-{}-{:03}", region_code(region), index + 1),
            rank: index as u32 + 2,
            last_updated: days_ago(1 + index),
        };
        locations.push(draw_location(rng, &REGION_TIER, placement));
    }

    let mut district_ids = Vec::with_capacity(REGIONS.len() * DISTRICTS_PER_REGION);
    for (reg_index, region) in REGIONS.iter().enumerate() {
        for d in 0..DISTRICTS_PER_REGION {
            let id = format!("DIST-{next_id}");
            next_id += 1;
            district_ids.push(id.clone());
            let placement = Placement {
                id,
                name: format!("{region} District {}", d + 1),
                parent: (region_ids[reg_index].clone(), format!("{region} Region")),
                code: format!("KE-{}-D{}", region_code(region), d + 1),
                rank: (reg_index * DISTRICTS_PER_REGION + d) as u32 + 7,
                last_updated: days_ago(2 + reg_index + d),
            };
            locations.push(draw_location(rng, &DISTRICT_TIER, placement));
        }
    }

    for (reg_index, region) in REGIONS.iter().enumerate() {
        for d in 0..DISTRICTS_PER_REGION {
            let district_index = reg_index * DISTRICTS_PER_REGION + d;
            for f in 0..FACILITIES_PER_DISTRICT {
                let id = format!("FAC-{next_id}");
                next_id += 1;
                let placement = Placement {
                    id,
                    name: format!("{region} HC {}-{}", d + 1, f + 1),
                    parent: (
                        district_ids[district_index].clone(),
                        format!("{region} District {}", d + 1),
                    ),
                    code: format!("KE-{}-F{}{}", region_code(region), d + 1, f + 1),
                    rank: (district_index * FACILITIES_PER_DISTRICT + f) as u32 + 22,
                    last_updated: days_ago(3 + f),
                };
                locations.push(draw_location(rng, &FACILITY_TIER, placement));
            }
        }
    }

    locations.sort_by_key(|l| l.rank);
    locations
}

// ═══════════════════════════════════════════════════════════
// Summaries
// ═══════════════════════════════════════════════════════════

/// Cards for the filtered set. Facility and population totals always come
/// from the full tree; an empty selection yields all zeros.
pub fn stats(all: &[GeographicLocation], filtered: &[GeographicLocation]) -> DistributionStats {
    if filtered.is_empty() {
        return DistributionStats::default();
    }
    let by_status = |p: Performance| count_where(filtered, |l| l.status == p);

    let mut ranked: Vec<&GeographicLocation> = filtered.iter().collect();
    ranked.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
    let name_of = |l: Option<&&GeographicLocation>| l.map_or_else(|| "N/A".to_string(), |l| l.name.clone());

    DistributionStats {
        total_locations: filtered.len(),
        total_facilities: count_where(all, |l| l.location_type == LocationLevel::Facility),
        total_population: all
            .iter()
            .filter(|l| l.location_type == LocationLevel::Region)
            .map(|l| l.population)
            .sum(),
        average_coverage: round1(mean_by(filtered, |l| l.coverage_rate)),
        excellent_locations: by_status(Performance::Excellent),
        good_locations: by_status(Performance::Good),
        fair_locations: by_status(Performance::Fair),
        poor_locations: by_status(Performance::Poor),
        top_performer: name_of(ranked.first()),
        lowest_performer: name_of(ranked.last()),
    }
}

fn of_level(all: &[GeographicLocation], level: LocationLevel) -> impl Iterator<Item = &GeographicLocation> {
    all.iter().filter(move |l| l.location_type == level)
}

fn find<'a>(all: &'a [GeographicLocation], id: Option<&str>) -> Option<&'a GeographicLocation> {
    let id = id?;
    all.iter().find(|l| l.id == id)
}

pub fn regional_comparison(all: &[GeographicLocation]) -> Vec<RegionalComparison> {
    let mut out: Vec<RegionalComparison> = of_level(all, LocationLevel::Region)
        .map(|r| RegionalComparison {
            region_name: r.name.clone(),
            coverage: r.coverage_rate,
            population: r.population,
            facilities: r.facilities,
            vaccinations: r.vaccines_administered,
            performance_score: r.performance_score,
            rank: r.rank,
        })
        .collect();
    out.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
    out
}

pub fn district_performance(all: &[GeographicLocation]) -> Vec<DistrictPerformance> {
    let mut out: Vec<DistrictPerformance> = of_level(all, LocationLevel::District)
        .map(|d| DistrictPerformance {
            district_name: d.name.clone(),
            region_name: d.parent_name.clone().unwrap_or_default(),
            coverage: d.coverage_rate,
            facilities: d.facilities,
            population: d.population,
            performance_score: d.performance_score,
            status: d.status,
        })
        .collect();
    out.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
    out
}

/// Facilities with their district and region resolved through parent ids.
pub fn facility_metrics(all: &[GeographicLocation]) -> Vec<FacilityMetrics> {
    let mut out: Vec<FacilityMetrics> = of_level(all, LocationLevel::Facility)
        .map(|f| {
            let district = find(all, f.parent_id.as_deref());
            let region = district.and_then(|d| find(all, d.parent_id.as_deref()));
            FacilityMetrics {
                facility_name: f.name.clone(),
                district_name: district.map(|d| d.name.clone()).unwrap_or_default(),
                region_name: region.map(|r| r.name.clone()).unwrap_or_default(),
                coverage: f.coverage_rate,
                population: f.population,
                health_workers: f.health_workers,
                vaccinations: f.vaccines_administered,
                performance_score: f.performance_score,
            }
        })
        .collect();
    out.sort_by(|a, b| b.performance_score.total_cmp(&a.performance_score));
    out
}

pub struct GeographicScreen;

impl Screen for GeographicScreen {
    type Record = GeographicLocation;
    type Filter = GeographicFilter;
    type Stats = DistributionStats;
    type Insights = GeographicInsights;

    const NAME: &'static str = "geographic-distribution";
    const STORAGE_KEY: &'static str = "geographic-locations";
    const RECORD_VERSION: u32 = 1;

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<GeographicLocation> {
        generate(rng, today)
    }

    fn stats(all: &[GeographicLocation], filtered: &[GeographicLocation], _today: NaiveDate) -> DistributionStats {
        stats(all, filtered)
    }

    fn insights(records: &[GeographicLocation], _rng: &mut MockRng, _today: NaiveDate) -> GeographicInsights {
        GeographicInsights {
            regions: regional_comparison(records),
            districts: district_performance(records),
            facilities: facility_metrics(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 10).unwrap()
    }

    fn tree() -> Vec<GeographicLocation> {
        generate(&mut MockRng::seeded(21), today())
    }

    #[test]
    fn hierarchy_shape() {
        let t = tree();
        assert_eq!(t.len(), 51);
        assert_eq!(of_level(&t, LocationLevel::National).count(), 1);
        assert_eq!(of_level(&t, LocationLevel::Region).count(), 5);
        assert_eq!(of_level(&t, LocationLevel::District).count(), 15);
        assert_eq!(of_level(&t, LocationLevel::Facility).count(), 30);
        assert!(t.windows(2).all(|w| w[0].rank < w[1].rank));
        assert_eq!(t[0].id, "NAT-1");
        assert_eq!(t[0].rank, 1);
    }

    #[test]
    fn parents_resolve() {
        let t = tree();
        for l in t.iter().filter(|l| l.level > 0) {
            let parent = find(&t, l.parent_id.as_deref()).expect("parent exists");
            assert_eq!(parent.level + 1, l.level);
            assert!(l.parent_name.as_deref().is_some_and(|p| parent.name.starts_with(p)));
        }
    }

    #[test]
    fn ranges_and_bands() {
        for l in tree().iter().filter(|l| l.location_type == LocationLevel::District) {
            assert!((70.0..=95.0).contains(&l.coverage_rate));
            assert!((10..20).contains(&l.facilities));
            assert!(l.latitude.is_none());
        }
        for l in tree().iter().filter(|l| l.location_type == LocationLevel::Facility) {
            assert!(l.latitude.is_some());
            assert_eq!(l.facilities, 1);
        }
        assert_eq!(grade(90.0), Performance::Excellent);
        assert_eq!(grade(79.9), Performance::Fair);
        assert_eq!(grade(69.9), Performance::Poor);
        assert_eq!(trend_for(72.5, 72.0), Trend::Stable);
        assert_eq!(trend_for(72.0, 72.0), Trend::Decreasing);
    }

    #[test]
    fn stats_follow_filter_but_totals_do_not() {
        let t = tree();
        let filter = GeographicFilter {
            level: Choice::only(LocationLevel::District),
            ..Default::default()
        };
        let districts = filter_records(&t, &filter);
        let st = stats(&t, &districts);
        assert_eq!(st.total_locations, 15);
        assert_eq!(st.total_facilities, 30);
        let region_pop: u64 = of_level(&t, LocationLevel::Region).map(|r| r.population).sum();
        assert_eq!(st.total_population, region_pop);
        assert_ne!(st.top_performer, "N/A");
    }

    #[test]
    fn empty_selection_zeroes_stats() {
        let t = tree();
        assert_eq!(stats(&t, &[]), DistributionStats::default());
    }

    #[test]
    fn region_filter_matches_own_and_parent_names() {
        let t = tree();
        let filter: GeographicFilter =
            serde_json::from_str(r#"{"region":"Central","trend":"All","level":"All"}"#).unwrap();
        let out = filter_records(&t, &filter);
        // Region itself, 3 districts, 6 facilities.
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn trend_filter_ignores_case() {
        let t = tree();
        let filter: GeographicFilter = serde_json::from_str(r#"{"trend":"Increasing"}"#).unwrap();
        let out = filter_records(&t, &filter);
        assert!(!out.is_empty());
        assert!(out.iter().all(|l| l.trend == Trend::Increasing));
    }

    #[test]
    fn facility_metrics_resolve_region() {
        let m = facility_metrics(&tree());
        assert_eq!(m.len(), 30);
        assert!(m.iter().all(|f| f.region_name.ends_with("Region")));
        assert!(m.windows(2).all(|w| w[0].performance_score >= w[1].performance_score));
    }

    #[test]
    fn csv_parent_defaults_to_na() {
        let t = tree();
        let fields = t[0].csv_fields();
        assert_eq!(fields[3], "N/A");
        assert_eq!(fields[9], "90%");
    }
}
