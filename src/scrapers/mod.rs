//! Page scrapers for the Beatport chart pipeline.
//!
//! | Page | Module | Method |
//! |------|--------|--------|
//! | Chart listing | [`links`] | Regex scan of raw HTML |
//! | Track detail | [`detail`] | Embedded JSON, then markup fallbacks |
//! | (any) | [`structured`] | `__NEXT_DATA__` lookup and track-node search |
//!
//! Extraction never fails: a field that cannot be found is left empty and
//! the aggregator fills what it can from the track URL.

pub mod detail;
pub mod links;
pub mod structured;
