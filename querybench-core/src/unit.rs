// SPDX-License-Identifier: Apache-2.0

//! Time units for latency samples, ordered finer to coarser.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unit a latency aggregate is denominated in.
///
/// Variant order is the total ordering finer -> coarser, so the derived
/// `Ord` can answer whether a conversion narrows or widens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Nanos,
    Millis,
    Seconds,
}

impl TimeUnit {
    /// Short label used in log lines and reports.
    pub fn label(self) -> &'static str {
        match self {
            TimeUnit::Nanos => "ns",
            TimeUnit::Millis => "ms",
            TimeUnit::Seconds => "s",
        }
    }

    /// Division factor for converting a sample in `self` to `target`.
    ///
    /// Only finer-to-coarser hops have a factor; anything else (including
    /// the identity conversion) returns `None`.
    pub fn factor_to(self, target: TimeUnit) -> Option<Decimal> {
        match (self, target) {
            (TimeUnit::Nanos, TimeUnit::Millis) => Some(Decimal::from(1_000_000_i64)),
            (TimeUnit::Nanos, TimeUnit::Seconds) => Some(Decimal::from(1_000_000_000_i64)),
            (TimeUnit::Millis, TimeUnit::Seconds) => Some(Decimal::from(1_000_i64)),
            _ => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
