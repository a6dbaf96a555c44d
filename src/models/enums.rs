//! Enumerated record fields.
//!
//! Every enum serializes with its display spelling so stored JSON documents
//! read exactly like the labels shown in the tables (`"Life-Threatening"`,
//! `"In Transit"`, `"RECEIVED"`).

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// ═══════════════════════════════════════════════════════════
// Coverage gaps
// ═══════════════════════════════════════════════════════════

str_enum!(
    /// Coverage-gap urgency, most urgent first.
    Priority {
        Critical => "Critical",
        High => "High",
        Medium => "Medium",
        Low => "Low",
    }
);

impl Priority {
    /// Bucket a coverage rate: <50 Critical, <70 High, <85 Medium.
    pub fn for_coverage(rate: f64) -> Self {
        if rate < 50.0 {
            Self::Critical
        } else if rate < 70.0 {
            Self::High
        } else if rate < 85.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

str_enum!(InterventionStatus {
    Planned => "Planned",
    Ongoing => "Ongoing",
    Completed => "Completed",
    NotStarted => "Not Started",
});

str_enum!(CoverageTrend {
    Improving => "Improving",
    Stable => "Stable",
    Declining => "Declining",
});

str_enum!(PlanStatus {
    Planned => "Planned",
    Ongoing => "Ongoing",
    Completed => "Completed",
});

// ═══════════════════════════════════════════════════════════
// Adverse events
// ═══════════════════════════════════════════════════════════

str_enum!(Severity {
    Mild => "Mild",
    Moderate => "Moderate",
    Severe => "Severe",
    LifeThreatening => "Life-Threatening",
    Fatal => "Fatal",
});

impl Severity {
    /// Severe and worse are treated as serious (hospitalized, reported).
    pub fn is_serious(&self) -> bool {
        matches!(self, Self::Severe | Self::LifeThreatening | Self::Fatal)
    }
}

str_enum!(Outcome {
    Recovered => "Recovered",
    Recovering => "Recovering",
    NotRecovered => "Not Recovered",
    Fatal => "Fatal",
    Unknown => "Unknown",
});

str_enum!(CausalityCategory {
    Certain => "Certain",
    Probable => "Probable",
    Possible => "Possible",
    Unlikely => "Unlikely",
    Unrelated => "Unrelated",
    Unclassifiable => "Unclassifiable",
});

impl CausalityCategory {
    /// Map a total assessment score (six criteria, 0..=18) to a category.
    pub fn for_score(score: u32) -> Self {
        if score >= 15 {
            Self::Certain
        } else if score >= 12 {
            Self::Probable
        } else if score >= 8 {
            Self::Possible
        } else if score >= 4 {
            Self::Unlikely
        } else if score == 0 {
            Self::Unclassifiable
        } else {
            Self::Unrelated
        }
    }
}

str_enum!(EventStatus {
    Reported => "Reported",
    UnderInvestigation => "Under Investigation",
    Investigated => "Investigated",
    Closed => "Closed",
});

str_enum!(ReporterType {
    HealthcareProvider => "Healthcare Provider",
    Patient => "Patient",
    Caregiver => "Caregiver",
    Other => "Other",
});

str_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

// ═══════════════════════════════════════════════════════════
// Dose schedules
// ═══════════════════════════════════════════════════════════

str_enum!(SchedulePriority {
    High => "High",
    Medium => "Medium",
    Low => "Low",
});

impl SchedulePriority {
    pub fn score_bonus(&self) -> f64 {
        match self {
            Self::High => 30.0,
            Self::Medium => 20.0,
            Self::Low => 10.0,
        }
    }
}

str_enum!(ScheduleStatus {
    Scheduled => "Scheduled",
    InProgress => "In Progress",
    Completed => "Completed",
    Delayed => "Delayed",
});

impl ScheduleStatus {
    pub fn score_bonus(&self) -> f64 {
        match self {
            Self::Completed => 30.0,
            Self::InProgress => 20.0,
            Self::Scheduled | Self::Delayed => 10.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Utilization & geography
// ═══════════════════════════════════════════════════════════

str_enum!(Performance {
    Excellent => "Excellent",
    Good => "Good",
    Fair => "Fair",
    Poor => "Poor",
});

impl Performance {
    /// Threshold a percentage against three descending cut-offs.
    pub fn grade(value: f64, excellent: f64, good: f64, fair: f64) -> Self {
        if value >= excellent {
            Self::Excellent
        } else if value >= good {
            Self::Good
        } else if value >= fair {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

str_enum!(Trend {
    Increasing => "increasing",
    Stable => "stable",
    Decreasing => "decreasing",
});

str_enum!(LocationLevel {
    National => "National",
    Region => "Region",
    District => "District",
    Facility => "Facility",
});

// ═══════════════════════════════════════════════════════════
// Allocations & inventory
// ═══════════════════════════════════════════════════════════

str_enum!(AllocationStatus {
    Pending => "Pending",
    InTransit => "In Transit",
    Delivered => "Delivered",
    Cancelled => "Cancelled",
    Delayed => "Delayed",
});

str_enum!(AllocationPriority {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Urgent => "Urgent",
});

str_enum!(MovementType {
    Received => "RECEIVED",
    Used => "USED",
    Adjusted => "ADJUSTED",
    Damaged => "DAMAGED",
    Expired => "EXPIRED",
});

impl MovementType {
    /// Movement logged for a manual adjustment with the given reason.
    pub fn for_adjustment(reason: &str) -> Self {
        match reason.trim().to_uppercase().as_str() {
            "DAMAGED" => Self::Damaged,
            "EXPIRED" => Self::Expired,
            "LOST" => Self::Used,
            _ => Self::Adjusted,
        }
    }
}

str_enum!(StockStatus {
    Good => "GOOD",
    Low => "LOW",
    Critical => "CRITICAL",
});

impl StockStatus {
    /// More than 50 doses is good, 10 to 50 low, under 10 critical.
    pub fn for_quantity(quantity: u64) -> Self {
        match quantity {
            q if q > 50 => Self::Good,
            q if q >= 10 => Self::Low,
            _ => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Activity log
// ═══════════════════════════════════════════════════════════

str_enum!(ActivityCategory {
    Authentication => "authentication",
    Patient => "patient",
    Vaccination => "vaccination",
    Inventory => "inventory",
    Campaign => "campaign",
    User => "user",
    Settings => "settings",
    Report => "report",
});

str_enum!(ActivityAction {
    Create => "create",
    Read => "read",
    Update => "update",
    Delete => "delete",
    Login => "login",
    Logout => "logout",
    Export => "export",
});

str_enum!(ActivityStatus {
    Success => "success",
    Failure => "failure",
    Warning => "warning",
});

// ═══════════════════════════════════════════════════════════
// Campaigns & defaulters
// ═══════════════════════════════════════════════════════════

str_enum!(CampaignStatus {
    Planned => "PLANNED",
    Active => "ACTIVE",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl CampaignStatus {
    /// Completed and cancelled campaigns take no further doses.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

str_enum!(
    /// Follow-up urgency of a missed dose.
    DefaulterUrgency {
        Critical => "critical",
        High => "high",
        Medium => "medium",
    }
);

impl DefaulterUrgency {
    /// More than 60 days overdue is critical, 30 to 60 high.
    pub fn for_days_overdue(days: i64) -> Self {
        if days > 60 {
            Self::Critical
        } else if days >= 30 {
            Self::High
        } else {
            Self::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_round_trip() {
        for (variant, s) in [
            (Severity::Mild, "Mild"),
            (Severity::Moderate, "Moderate"),
            (Severity::Severe, "Severe"),
            (Severity::LifeThreatening, "Life-Threatening"),
            (Severity::Fatal, "Fatal"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Severity::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_display_spelling() {
        let json = serde_json::to_string(&AllocationStatus::InTransit).unwrap();
        assert_eq!(json, "\"In Transit\"");
        let back: EventStatus = serde_json::from_str("\"Under Investigation\"").unwrap();
        assert_eq!(back, EventStatus::UnderInvestigation);
        assert_eq!(
            serde_json::to_string(&MovementType::Received).unwrap(),
            "\"RECEIVED\""
        );
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = Priority::from_str("Urgent").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn coverage_priority_buckets() {
        assert_eq!(Priority::for_coverage(0.0), Priority::Critical);
        assert_eq!(Priority::for_coverage(49.9), Priority::Critical);
        assert_eq!(Priority::for_coverage(50.0), Priority::High);
        assert_eq!(Priority::for_coverage(69.9), Priority::High);
        assert_eq!(Priority::for_coverage(70.0), Priority::Medium);
        assert_eq!(Priority::for_coverage(84.9), Priority::Medium);
        assert_eq!(Priority::for_coverage(85.0), Priority::Low);
        assert_eq!(Priority::for_coverage(100.0), Priority::Low);
    }

    #[test]
    fn causality_categories_by_score() {
        assert_eq!(CausalityCategory::for_score(18), CausalityCategory::Certain);
        assert_eq!(CausalityCategory::for_score(15), CausalityCategory::Certain);
        assert_eq!(CausalityCategory::for_score(12), CausalityCategory::Probable);
        assert_eq!(CausalityCategory::for_score(8), CausalityCategory::Possible);
        assert_eq!(CausalityCategory::for_score(4), CausalityCategory::Unlikely);
        assert_eq!(CausalityCategory::for_score(3), CausalityCategory::Unrelated);
        assert_eq!(CausalityCategory::for_score(1), CausalityCategory::Unrelated);
        assert_eq!(
            CausalityCategory::for_score(0),
            CausalityCategory::Unclassifiable
        );
    }

    #[test]
    fn performance_grades() {
        assert_eq!(Performance::grade(90.0, 85.0, 70.0, 50.0), Performance::Excellent);
        assert_eq!(Performance::grade(70.0, 85.0, 70.0, 50.0), Performance::Good);
        assert_eq!(Performance::grade(55.0, 85.0, 70.0, 50.0), Performance::Fair);
        assert_eq!(Performance::grade(10.0, 85.0, 70.0, 50.0), Performance::Poor);
    }

    #[test]
    fn all_lists_every_variant() {
        assert_eq!(ActivityCategory::ALL.len(), 8);
        assert_eq!(Severity::ALL.len(), 5);
        assert!(Severity::Severe.is_serious());
        assert!(!Severity::Moderate.is_serious());
    }

    #[test]
    fn adjustment_reasons_map_to_movements() {
        assert_eq!(MovementType::for_adjustment("damaged"), MovementType::Damaged);
        assert_eq!(MovementType::for_adjustment("EXPIRED"), MovementType::Expired);
        assert_eq!(MovementType::for_adjustment("Lost"), MovementType::Used);
        assert_eq!(MovementType::for_adjustment("Correction"), MovementType::Adjusted);
        assert_eq!(MovementType::for_adjustment("recount"), MovementType::Adjusted);
    }

    #[test]
    fn defaulter_urgency_bands() {
        assert_eq!(DefaulterUrgency::for_days_overdue(61), DefaulterUrgency::Critical);
        assert_eq!(DefaulterUrgency::for_days_overdue(60), DefaulterUrgency::High);
        assert_eq!(DefaulterUrgency::for_days_overdue(30), DefaulterUrgency::High);
        assert_eq!(DefaulterUrgency::for_days_overdue(29), DefaulterUrgency::Medium);
        assert_eq!(
            "critical".parse::<DefaulterUrgency>().unwrap(),
            DefaulterUrgency::Critical
        );
    }

    #[test]
    fn closed_campaign_statuses() {
        assert!(CampaignStatus::Completed.is_closed());
        assert!(CampaignStatus::Cancelled.is_closed());
        assert!(!CampaignStatus::Active.is_closed());
        assert_eq!(CampaignStatus::from_str("PLANNED").unwrap(), CampaignStatus::Planned);
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::for_quantity(51), StockStatus::Good);
        assert_eq!(StockStatus::for_quantity(50), StockStatus::Low);
        assert_eq!(StockStatus::for_quantity(10), StockStatus::Low);
        assert_eq!(StockStatus::for_quantity(9), StockStatus::Critical);
    }
}
