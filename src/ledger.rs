//! Quarterly reserve arithmetic.
//!
//! A reserve holds a plan ceiling per side (`accrual_sum`, `payment_sum`) and the amount consumed
//! so far (`used_acc`, `used_pay`). Write-offs only ever increase the consumed amounts and must
//! keep `used <= sum` on both sides. Persistence and the concurrency guard live in
//! `database::db::queries::reserves`; this module is pure.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::database::models::QuarterReserve;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveSide {
    Accrual,
    Payment,
}

impl ReserveSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accrual => "accrual",
            Self::Payment => "payment",
        }
    }

    /// Request field carrying this side's amount.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Accrual => "acc",
            Self::Payment => "pay",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub side: ReserveSide,
    pub requested: Decimal,
    pub available: Decimal,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reserve: requested {}, available {}",
            self.side.as_str(),
            self.requested,
            self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOffError {
    Negative(ReserveSide),
    Insufficient(Vec<Shortfall>),
}

/// Body of `POST /reserves/{id}/write_off`. Missing or null sides count as zero.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WriteOff {
    #[serde(default)]
    pub acc: Option<Decimal>,
    #[serde(default)]
    pub pay: Option<Decimal>,
}

impl WriteOff {
    pub fn new(acc: Decimal, pay: Decimal) -> Self {
        Self {
            acc: Some(acc),
            pay: Some(pay),
        }
    }

    pub fn accrual(&self) -> Decimal {
        self.acc.unwrap_or(Decimal::ZERO)
    }

    pub fn payment(&self) -> Decimal {
        self.pay.unwrap_or(Decimal::ZERO)
    }
}

pub fn balance(sum: Decimal, used: Decimal) -> Decimal {
    sum - used
}

/// Returns the reserve as it would be after the write-off, or every side that cannot cover it.
/// Nothing is applied unless both sides fit.
pub fn apply_write_off(
    reserve: &QuarterReserve,
    write_off: &WriteOff,
) -> Result<QuarterReserve, WriteOffError> {
    let acc = write_off.accrual();
    let pay = write_off.payment();
    if acc.is_sign_negative() && !acc.is_zero() {
        return Err(WriteOffError::Negative(ReserveSide::Accrual));
    }
    if pay.is_sign_negative() && !pay.is_zero() {
        return Err(WriteOffError::Negative(ReserveSide::Payment));
    }

    let mut shortfalls = Vec::new();
    let available_acc = reserve.balance_acc();
    if acc > available_acc {
        shortfalls.push(Shortfall {
            side: ReserveSide::Accrual,
            requested: acc,
            available: available_acc,
        });
    }
    let available_pay = reserve.balance_pay();
    if pay > available_pay {
        shortfalls.push(Shortfall {
            side: ReserveSide::Payment,
            requested: pay,
            available: available_pay,
        });
    }
    if !shortfalls.is_empty() {
        return Err(WriteOffError::Insufficient(shortfalls));
    }

    let mut next = reserve.clone();
    next.used_acc += acc;
    next.used_pay += pay;
    Ok(next)
}
