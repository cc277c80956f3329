use rust_decimal::Decimal;
use serde::Serialize;

use crate::ledger;

/// Quarter-scoped budget ceiling for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterReserve {
    pub id: i64,
    #[serde(rename = "item")]
    pub item_id: i64,
    pub year: i32,
    pub quarter: i32,
    pub accrual_sum: Decimal,
    pub payment_sum: Decimal,
    pub used_acc: Decimal,
    pub used_pay: Decimal,
    #[serde(skip)]
    pub version: i64,
}

impl QuarterReserve {
    pub fn balance_acc(&self) -> Decimal {
        ledger::balance(self.accrual_sum, self.used_acc)
    }

    pub fn balance_pay(&self) -> Decimal {
        ledger::balance(self.payment_sum, self.used_pay)
    }
}

/// Reserve plus the balances derived on read.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveView {
    #[serde(flatten)]
    pub reserve: QuarterReserve,
    pub balance_acc: Decimal,
    pub balance_pay: Decimal,
}

impl From<QuarterReserve> for ReserveView {
    fn from(reserve: QuarterReserve) -> Self {
        Self {
            balance_acc: reserve.balance_acc(),
            balance_pay: reserve.balance_pay(),
            reserve,
        }
    }
}
