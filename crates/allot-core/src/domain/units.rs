//! Native-unit amounts.
//!
//! Costs are kept as integer wei and only rendered as decimal gwei/ether
//! strings at the edge, so aggregation never goes through floating point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

const GWEI_DECIMALS: u32 = 9;
const ETHER_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn from_gwei(gwei: u64) -> Self {
        Self(u128::from(gwei) * 10u128.pow(GWEI_DECIMALS))
    }

    pub fn value(self) -> u128 {
        self.0
    }

    /// `self * factor`, saturating instead of wrapping.
    pub fn times(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(u128::from(factor)))
    }

    pub fn to_gwei_string(self) -> String {
        format_units(self.0, GWEI_DECIMALS)
    }

    pub fn to_ether_string(self) -> String {
        format_units(self.0, ETHER_DECIMALS)
    }
}

impl Add for Wei {
    type Output = Wei;

    fn add(self, rhs: Wei) -> Wei {
        Wei(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Wei {
    fn sum<I: Iterator<Item = Wei>>(iter: I) -> Wei {
        iter.fold(Wei::ZERO, Add::add)
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// Render `value / 10^decimals` as an exact decimal string with trailing zeros trimmed.
fn format_units(value: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
