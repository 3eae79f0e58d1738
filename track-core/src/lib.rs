//! track-core: domain logic for the ADS-B track service.
//!
//! Pure, I/O-free building blocks:
//! - `types` — position/metadata records, shaped track output, error enum
//! - `tier` — storage tier selection across raw and aggregated tables
//! - `snapshot` — feeder `aircraft.json` parsing and normalization
//! - `shape` — grouping flat query rows into per-aircraft tracks

pub mod shape;
pub mod snapshot;
pub mod tier;
pub mod types;
