//! Storage tier selection.
//!
//! Positions exist in three parallel representations: the raw hypertable
//! and two continuous aggregates (1-minute and 5-minute buckets). Queries
//! address them only through the closed [`Tier`] enum — table and time
//! column names are fixed, never runtime-built strings.
//!
//! Per-aircraft and bulk lookups use different span thresholds on purpose:
//! bulk queries are costlier per unit time, so they fall back to coarser
//! tiers sooner.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// One of the three parallel position representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Raw,
    Minute,
    FiveMinute,
}

impl Tier {
    /// Table (or continuous aggregate view) backing this tier.
    pub fn table(self) -> &'static str {
        match self {
            Tier::Raw => "aircraft_positions",
            Tier::Minute => "aircraft_tracks_1min",
            Tier::FiveMinute => "aircraft_tracks_5min",
        }
    }

    /// Time column: raw rows carry `time`, aggregates carry `bucket`.
    pub fn time_column(self) -> &'static str {
        match self {
            Tier::Raw => "time",
            Tier::Minute | Tier::FiveMinute => "bucket",
        }
    }
}

/// Caller-requested data resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Full,
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinute,
    Auto,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Full => "full",
            Resolution::OneMinute => "1min",
            Resolution::FiveMinute => "5min",
            Resolution::Auto => "auto",
        }
    }
}

/// Tier for a single-aircraft track lookup.
///
/// `full` is the endpoint default and behaves like `auto` here: short spans
/// get raw fidelity, longer spans degrade to the aggregates.
pub fn select_track_tier(span: TimeDelta, resolution: Resolution) -> Tier {
    match resolution {
        Resolution::FiveMinute => Tier::FiveMinute,
        Resolution::OneMinute => Tier::Minute,
        Resolution::Full | Resolution::Auto => {
            if span > TimeDelta::days(30) {
                Tier::FiveMinute
            } else if span > TimeDelta::days(7) {
                Tier::Minute
            } else {
                Tier::Raw
            }
        }
    }
}

/// Tier for a bulk time-lapse lookup.
///
/// An explicit `full` always wins so callers can force raw fidelity over
/// any span. Auto thresholds sit lower than the per-aircraft ones.
pub fn select_bulk_tier(span: TimeDelta, resolution: Resolution) -> Tier {
    match resolution {
        Resolution::Full => Tier::Raw,
        Resolution::FiveMinute => Tier::FiveMinute,
        Resolution::OneMinute => Tier::Minute,
        Resolution::Auto => {
            if span > TimeDelta::days(7) {
                Tier::FiveMinute
            } else if span > TimeDelta::days(2) {
                Tier::Minute
            } else {
                Tier::Raw
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
