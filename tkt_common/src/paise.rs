use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const INR_CURRENCY_CODE: &str = "INR";

//--------------------------------------       Paise         ---------------------------------------------------------
/// An amount of Indian rupees, stored as an integer number of paise (1/100 INR).
///
/// All prices, discounts and order totals in the system use this type. Conversion to decimal rupees only happens at
/// the payment gateway boundary.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Paise(i64);

op!(binary Paise, Add, add);
op!(binary Paise, Sub, sub);
op!(inplace Paise, AddAssign, add_assign);
op!(inplace Paise, SubAssign, sub_assign);
op!(unary Paise, Neg, neg);

impl Mul<i64> for Paise {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Paise {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paise: {0}")]
pub struct PaiseConversionError(String);

impl From<i64> for Paise {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Paise {
    type Error = PaiseConversionError;

    /// Converts a decimal rupee amount (as used on the gateway wire format) into paise, rounding to the nearest paisa.
    fn try_from(rupees: f64) -> Result<Self, Self::Error> {
        if !rupees.is_finite() {
            return Err(PaiseConversionError(format!("{rupees} is not a finite amount")));
        }
        let paise = (rupees * 100.0).round();
        if paise.abs() > i64::MAX as f64 {
            return Err(PaiseConversionError(format!("{rupees} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(paise as i64))
    }
}

impl Display for Paise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

impl Paise {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    /// The amount as decimal rupees, for the gateway wire format.
    pub fn as_rupees(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns `rate` percent of this amount, rounded half-up to the nearest paisa. `rate` is expressed in hundredths
    /// of a percent, so `1250` is 12.5%.
    pub fn percentage(&self, rate: i64) -> Self {
        let scaled = i128::from(self.0) * i128::from(rate);
        let rounded = (scaled + 5_000 * scaled.signum()) / 10_000;
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}
