//! Audit trail of user actions.
//!
//! Read-only: entries are generated once and then only filtered, paged and
//! exported. Dates in the filter select whole days.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::export::CsvRow;
use crate::generator::MockRng;
use crate::models::{ActivityAction, ActivityCategory, ActivityStatus};
use crate::pipeline::{
    count_by_key, count_where, distinct_count, in_date_range, text_matches, Choice, RecordFilter,
    Screen,
};

const RECORD_COUNT: usize = 100;
/// Entries fall within this many hours before the anchor.
const WINDOW_HOURS: i64 = 168;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

struct Actor {
    name: &'static str,
    id: &'static str,
    role: &'static str,
}

const ACTORS: &[Actor] = &[
    Actor { name: "Facility Manager", id: "FM001", role: "Facility Manager" },
    Actor { name: "Health Worker", id: "HW001", role: "Health Worker" },
    Actor { name: "John Doe", id: "FM002", role: "Facility Manager" },
    Actor { name: "Jane Smith", id: "HW002", role: "Health Worker" },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub user_id: String,
    pub role: String,
    pub action: ActivityAction,
    pub category: ActivityCategory,
    pub entity: String,
    pub entity_id: String,
    pub description: String,
    pub ip_address: String,
    pub user_agent: String,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<FieldChange>>,
}

impl ActivityEntry {
    /// Deletes and failures are flagged in the summary.
    pub fn is_critical(&self) -> bool {
        self.action == ActivityAction::Delete || self.status == ActivityStatus::Failure
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_activities: usize,
    pub today_activities: usize,
    pub unique_users: usize,
    pub critical_actions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInsights {
    pub by_category: BTreeMap<String, usize>,
    pub by_user: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityFilter {
    pub search: Option<String>,
    pub category: Choice<ActivityCategory>,
    pub action: Choice<ActivityAction>,
    pub status: Choice<ActivityStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilter<ActivityEntry> for ActivityFilter {
    fn matches(&self, a: &ActivityEntry) -> bool {
        text_matches(
            self.search.as_deref(),
            &[&a.user, &a.description, &a.entity, &a.entity_id],
        ) && self.category.admits(&a.category)
            && self.action.admits(&a.action)
            && self.status.admits(&a.status)
            && in_date_range(self.date_from, self.date_to, a.timestamp.date_naive())
    }
}

impl CsvRow for ActivityEntry {
    const HEADERS: &'static [&'static str] = &[
        "Timestamp",
        "User",
        "Role",
        "Action",
        "Category",
        "Entity",
        "Entity ID",
        "Description",
        "Status",
        "IP Address",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.user.clone(),
            self.role.clone(),
            self.action.to_string(),
            self.category.to_string(),
            self.entity.clone(),
            self.entity_id.clone(),
            self.description.clone(),
            self.status.to_string(),
            self.ip_address.clone(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

pub fn entity_for(category: ActivityCategory) -> &'static str {
    match category {
        ActivityCategory::Authentication => "User Session",
        ActivityCategory::Patient => "Patient Record",
        ActivityCategory::Vaccination => "Vaccination Record",
        ActivityCategory::Inventory => "Vaccine Batch",
        ActivityCategory::Campaign => "Campaign",
        ActivityCategory::User => "User Account",
        ActivityCategory::Settings => "System Settings",
        ActivityCategory::Report => "Report",
    }
}

fn descriptions_for(action: ActivityAction) -> &'static [&'static str] {
    match action {
        ActivityAction::Create => &[
            "Created new patient record",
            "Added new vaccine batch to inventory",
            "Started new vaccination campaign",
            "Registered new user account",
        ],
        ActivityAction::Update => &[
            "Updated patient information",
            "Modified vaccine batch quantity",
            "Updated campaign targets",
            "Changed user permissions",
        ],
        ActivityAction::Delete => &[
            "Deleted patient record",
            "Removed expired vaccine batch",
            "Cancelled campaign",
            "Deactivated user account",
        ],
        ActivityAction::Login => &["Successful login", "User logged in"],
        ActivityAction::Logout => &["User logged out", "Session ended"],
        ActivityAction::Export => &["Exported data to CSV", "Generated PDF report"],
        ActivityAction::Read => &["Performed action"],
    }
}

/// Field diffs recorded for updates. Empty for categories without a form.
pub fn changes_for(category: ActivityCategory) -> Vec<FieldChange> {
    let pairs: &[(&str, &str, &str)] = match category {
        ActivityCategory::Patient => &[
            ("Phone Number", "0712345678", "0712345679"),
            ("Address", "123 Old Street", "456 New Avenue"),
        ],
        ActivityCategory::Inventory => &[
            ("Quantity Remaining", "150", "120"),
            ("Status", "Active", "Low Stock"),
        ],
        ActivityCategory::Campaign => &[
            ("Target Population", "500", "600"),
            ("End Date", "2025-01-31", "2025-02-15"),
        ],
        ActivityCategory::User => &[
            ("Role", "Health Worker", "Facility Manager"),
            ("Status", "Inactive", "Active"),
        ],
        _ => &[],
    };
    pairs
        .iter()
        .map(|(field, old, new)| FieldChange {
            field: field.to_string(),
            old_value: old.to_string(),
            new_value: new.to_string(),
        })
        .collect()
}

/// Last second of `today`, the point entries are counted back from.
fn anchor(today: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN)) + Duration::seconds(86_399)
}

fn draw_status(rng: &mut MockRng) -> ActivityStatus {
    if rng.chance(0.9) {
        ActivityStatus::Success
    } else if rng.chance(0.5) {
        ActivityStatus::Failure
    } else {
        ActivityStatus::Warning
    }
}

/// Newest first.
pub fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<ActivityEntry> {
    let end = anchor(today);
    let mut entries: Vec<ActivityEntry> = (0..RECORD_COUNT)
        .map(|i| {
            let actor = rng.pick(ACTORS);
            let category = *rng.pick(ActivityCategory::ALL);
            let action = *rng.pick(ActivityAction::ALL);
            let status = draw_status(rng);
            let hours_ago: i64 = rng.int(0..WINDOW_HOURS);

            ActivityEntry {
                id: format!("ACT{:05}", i + 1),
                timestamp: end - Duration::hours(hours_ago),
                user: actor.name.to_string(),
                user_id: actor.id.to_string(),
                role: actor.role.to_string(),
                action,
                category,
                entity: entity_for(category).to_string(),
                entity_id: format!("ENT{:04}", rng.int::<u32>(0..1000)),
                description: rng.pick(descriptions_for(action)).to_string(),
                ip_address: format!(
                    "192.168.{}.{}",
                    rng.int::<u8>(0..255),
                    rng.int::<u8>(0..255)
                ),
                user_agent: USER_AGENT.to_string(),
                status,
                changes: (action == ActivityAction::Update).then(|| changes_for(category)),
            }
        })
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

pub fn stats(entries: &[ActivityEntry], today: NaiveDate) -> ActivityStats {
    ActivityStats {
        total_activities: entries.len(),
        today_activities: count_where(entries, |a| a.timestamp.date_naive() == today),
        unique_users: distinct_count(entries, |a| a.user_id.clone()),
        critical_actions: count_where(entries, ActivityEntry::is_critical),
    }
}

/// "Just now", "5m ago", "3h ago", "2d ago", or the full timestamp past a week.
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - timestamp;
    if elapsed < Duration::minutes(1) {
        "Just now".to_string()
    } else if elapsed < Duration::hours(1) {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed < Duration::days(1) {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed < Duration::weeks(1) {
        format!("{}d ago", elapsed.num_days())
    } else {
        timestamp.format("%b %-d, %Y, %I:%M:%S %p").to_string()
    }
}

pub struct ActivityLogScreen;

impl Screen for ActivityLogScreen {
    type Record = ActivityEntry;
    type Filter = ActivityFilter;
    type Stats = ActivityStats;
    type Insights = ActivityInsights;

    const NAME: &'static str = "activity-log";
    const STORAGE_KEY: &'static str = "activityLog";
    const RECORD_VERSION: u32 = 1;

    fn generate(rng: &mut MockRng, today: NaiveDate) -> Vec<ActivityEntry> {
        generate(rng, today)
    }

    fn stats(all: &[ActivityEntry], _filtered: &[ActivityEntry], today: NaiveDate) -> ActivityStats {
        stats(all, today)
    }

    fn insights(records: &[ActivityEntry], _rng: &mut MockRng, _today: NaiveDate) -> ActivityInsights {
        ActivityInsights {
            by_category: count_by_key(records, |a| a.category.to_string()),
            by_user: count_by_key(records, |a| a.user.clone()),
        }
    }

    fn export_stem(today: NaiveDate) -> String {
        format!("{}-{}", Self::NAME, today.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter_records;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn entry(id: &str, category: ActivityCategory) -> ActivityEntry {
        ActivityEntry {
            id: id.into(),
            timestamp: anchor(today()),
            user: "Jane Smith".into(),
            user_id: "HW002".into(),
            role: "Health Worker".into(),
            action: ActivityAction::Read,
            category,
            entity: entity_for(category).into(),
            entity_id: "ENT0001".into(),
            description: "Performed action".into(),
            ip_address: "192.168.0.1".into(),
            user_agent: USER_AGENT.into(),
            status: ActivityStatus::Success,
            changes: None,
        }
    }

    #[test]
    fn category_filter_selects_one_of_three() {
        let entries = vec![
            entry("ACT00001", ActivityCategory::Patient),
            entry("ACT00002", ActivityCategory::Vaccination),
            entry("ACT00003", ActivityCategory::Inventory),
        ];
        let filter: ActivityFilter = serde_json::from_str(r#"{"category":"patient","status":"all"}"#).unwrap();
        let out = filter_records(&entries, &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "ACT00001");
    }

    #[test]
    fn generated_log_is_newest_first_within_a_week() {
        let entries = generate(&mut MockRng::seeded(5), today());
        assert_eq!(entries.len(), 100);
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        let end = anchor(today());
        assert!(entries.iter().all(|a| end - a.timestamp < Duration::hours(WINDOW_HOURS)));
        for a in &entries {
            assert_eq!(a.changes.is_some(), a.action == ActivityAction::Update);
            assert_eq!(a.entity, entity_for(a.category));
        }
    }

    #[test]
    fn stats_count_today_and_critical() {
        let mut entries = vec![
            entry("ACT00001", ActivityCategory::Patient),
            entry("ACT00002", ActivityCategory::User),
            entry("ACT00003", ActivityCategory::Report),
        ];
        entries[1].action = ActivityAction::Delete;
        entries[2].status = ActivityStatus::Failure;
        entries[2].timestamp -= Duration::days(2);
        entries[2].user_id = "FM001".into();

        let st = stats(&entries, today());
        assert_eq!(st.total_activities, 3);
        assert_eq!(st.today_activities, 2);
        assert_eq!(st.unique_users, 2);
        assert_eq!(st.critical_actions, 2);
    }

    #[test]
    fn screen_stats_count_today_against_supplied_date() {
        let entries = vec![
            entry("ACT00001", ActivityCategory::Patient),
            entry("ACT00002", ActivityCategory::User),
        ];
        assert_eq!(ActivityLogScreen::stats(&entries, &[], today()).today_activities, 2);
        let tomorrow = today() + Duration::days(1);
        assert_eq!(ActivityLogScreen::stats(&entries, &[], tomorrow).today_activities, 0);
    }

    #[test]
    fn date_range_covers_whole_days() {
        let entries = vec![entry("ACT00001", ActivityCategory::Patient)];
        let filter = ActivityFilter {
            date_from: Some(today()),
            date_to: Some(today()),
            ..Default::default()
        };
        assert_eq!(filter_records(&entries, &filter).len(), 1);
        let before = ActivityFilter {
            date_to: today().pred_opt(),
            ..Default::default()
        };
        assert!(filter_records(&entries, &before).is_empty());
    }

    #[test]
    fn search_spans_entity_id() {
        let entries = vec![entry("ACT00001", ActivityCategory::Patient)];
        let filter = ActivityFilter {
            search: Some("ent0001".into()),
            ..Default::default()
        };
        assert_eq!(filter_records(&entries, &filter).len(), 1);
    }

    #[test]
    fn relative_time_buckets() {
        let now = anchor(today());
        assert_eq!(relative_time(now - Duration::seconds(30), now), "Just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_time(now - Duration::days(2), now), "2d ago");
        assert!(relative_time(now - Duration::days(10), now).starts_with("Mar 4, 2025"));
    }

    #[test]
    fn csv_timestamp_is_iso_millis() {
        let row = entry("ACT00001", ActivityCategory::Patient).csv_fields();
        assert_eq!(row[0], "2025-03-14T23:59:59.000Z");
    }
}
