//! Filter → aggregate → paginate pipeline shared by every screen.
//!
//! A screen supplies its record type, a filter struct implementing
//! [`RecordFilter`], a generator and a stats function. [`ScreenState`]
//! wires them together: the full record set stays untouched, the filtered
//! subset is recomputed on every filter change, and pages are windows over
//! the filtered subset.

pub mod aggregate;
pub mod criteria;
pub mod paginate;
pub mod screen;

pub use aggregate::*;
pub use criteria::*;
pub use paginate::*;
pub use screen::*;
