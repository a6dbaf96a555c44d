//! Analytics screens over generated immunization data.

pub mod adverse_events;
pub mod coverage_gap;
pub mod dose_schedule;
pub mod geographic;
pub mod utilization;

pub use adverse_events::AdverseEventScreen;
pub use coverage_gap::CoverageGapScreen;
pub use dose_schedule::DoseScheduleScreen;
pub use geographic::GeographicScreen;
pub use utilization::UtilizationScreen;
