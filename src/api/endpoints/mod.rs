//! HTTP endpoint handlers.
//!
//! `screens` holds the handlers every record table shares; the other
//! modules carry each feature's own actions.

pub mod adverse_events;
pub mod allocations;
pub mod campaigns;
pub mod defaulters;
pub mod dose_schedules;
pub mod health;
pub mod inventory;
pub mod patients;
pub mod screens;
pub mod vaccinations;
