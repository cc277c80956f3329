use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Month label → planned amount, as stored in `works.accruals` / `works.payments`.
pub type MonthlyPlan = BTreeMap<String, Decimal>;

/// Month keys in calendar order. These are the labels the frontend writes into plan maps.
pub const MONTH_LABELS: [&str; 12] = [
    "Янв", "Фев", "Мар", "Апр", "Май", "Июн", "Июл", "Авг", "Сен", "Окт", "Ноя", "Дек",
];

/// Zero-based calendar index of a month label.
pub fn month_index(label: &str) -> Option<usize> {
    MONTH_LABELS.iter().position(|m| *m == label)
}

/// Quarter (1..=4) the month falls into.
pub fn quarter_of(label: &str) -> Option<u8> {
    month_index(label).map(|idx| (idx / 3) as u8 + 1)
}

pub fn validate_month(field: &str, label: &str) -> ApiResult<()> {
    match month_index(label) {
        Some(_) => Ok(()),
        None => Err(ApiError::validation(
            field,
            format!("unknown month label {label:?}"),
        )),
    }
}

pub fn validate_plan(field: &str, plan: &MonthlyPlan) -> ApiResult<()> {
    plan.keys().try_for_each(|label| validate_month(field, label))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccPay {
    pub acc: Decimal,
    pub pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthTotal {
    pub month: &'static str,
    #[serde(flatten)]
    pub sums: AccPay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterTotal {
    pub quarter: u8,
    #[serde(flatten)]
    pub sums: AccPay,
}

/// Plan sums of a set of works per month (calendar order), per quarter and overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTotals {
    pub months: Vec<MonthTotal>,
    pub quarters: Vec<QuarterTotal>,
    pub total: AccPay,
}

fn add(field: &str, acc: Decimal, amount: Decimal) -> ApiResult<Decimal> {
    acc.checked_add(amount)
        .ok_or_else(|| ApiError::validation(field, "plan amounts are too large to total"))
}

/// Sums `(accruals, payments)` plan pairs. Keys that are not month labels are skipped.
pub fn plan_totals<'a, I>(plans: I) -> ApiResult<PlanTotals>
where
    I: IntoIterator<Item = (&'a MonthlyPlan, &'a MonthlyPlan)>,
{
    let mut months = [AccPay::default(); 12];
    for (accruals, payments) in plans {
        for (label, amount) in accruals {
            if let Some(idx) = month_index(label) {
                months[idx].acc = add("accruals", months[idx].acc, *amount)?;
            }
        }
        for (label, amount) in payments {
            if let Some(idx) = month_index(label) {
                months[idx].pay = add("payments", months[idx].pay, *amount)?;
            }
        }
    }

    let mut quarters: Vec<QuarterTotal> = (1..=4)
        .map(|quarter| QuarterTotal {
            quarter,
            sums: AccPay::default(),
        })
        .collect();
    let mut total = AccPay::default();
    for (idx, sums) in months.iter().enumerate() {
        let q = &mut quarters[idx / 3].sums;
        q.acc = add("accruals", q.acc, sums.acc)?;
        q.pay = add("payments", q.pay, sums.pay)?;
        total.acc = add("accruals", total.acc, sums.acc)?;
        total.pay = add("payments", total.pay, sums.pay)?;
    }

    Ok(PlanTotals {
        months: MONTH_LABELS
            .iter()
            .zip(months)
            .map(|(month, sums)| MonthTotal { month: *month, sums })
            .collect(),
        quarters,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarters_group_three_months() {
        assert_eq!(quarter_of("Янв"), Some(1));
        assert_eq!(quarter_of("Мар"), Some(1));
        assert_eq!(quarter_of("Апр"), Some(2));
        assert_eq!(quarter_of("Дек"), Some(4));
        assert_eq!(quarter_of("Jan"), None);
    }

    #[test]
    fn plan_with_unknown_label_is_rejected() {
        let mut plan = MonthlyPlan::new();
        plan.insert("Фев".into(), Decimal::ONE);
        assert!(validate_plan("accruals", &plan).is_ok());
        plan.insert("13".into(), Decimal::ONE);
        assert!(validate_plan("accruals", &plan).is_err());
    }

    #[test]
    fn totals_roll_months_into_quarters() {
        let a1: MonthlyPlan = [("Янв".to_string(), Decimal::new(1200, 0)), ("Мар".to_string(), Decimal::new(800, 0))]
            .into_iter()
            .collect();
        let p1: MonthlyPlan = [("Апр".to_string(), Decimal::new(500, 0))].into_iter().collect();
        let a2: MonthlyPlan = [("Мар".to_string(), Decimal::new(200, 0))].into_iter().collect();
        let p2 = MonthlyPlan::new();

        let totals = plan_totals([(&a1, &p1), (&a2, &p2)]).unwrap();
        assert_eq!(totals.months[2].month, "Мар");
        assert_eq!(totals.months[2].sums.acc, Decimal::new(1000, 0));
        assert_eq!(totals.quarters[0].sums.acc, Decimal::new(2200, 0));
        assert_eq!(totals.quarters[1].sums.pay, Decimal::new(500, 0));
        assert_eq!(totals.total, AccPay { acc: Decimal::new(2200, 0), pay: Decimal::new(500, 0) });
    }

    #[test]
    fn overflowing_totals_are_an_error_not_a_panic() {
        let huge: MonthlyPlan = [("Янв".to_string(), Decimal::MAX)].into_iter().collect();
        let one: MonthlyPlan = [("Янв".to_string(), Decimal::ONE)].into_iter().collect();
        let empty = MonthlyPlan::new();

        let err = plan_totals([(&huge, &empty), (&one, &empty)]).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "accruals"));
    }
}
