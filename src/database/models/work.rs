use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Certification, LegacyMonthlyEntry, Material, MonthlyPlan, WorkDetail};

/// VAT percentage applied to a work's cost lines. Serialized as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum VatRate {
    Zero,
    Five,
    #[default]
    Twenty,
}

impl TryFrom<i64> for VatRate {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            5 => Ok(Self::Five),
            20 => Ok(Self::Twenty),
            other => Err(format!("unsupported VAT rate {other}, expected 0, 5 or 20")),
        }
    }
}

impl From<VatRate> for i64 {
    fn from(rate: VatRate) -> Self {
        match rate {
            VatRate::Zero => 0,
            VatRate::Five => 5,
            VatRate::Twenty => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feasibility {
    #[default]
    Green,
    Yellow,
    Red,
}

impl Feasibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

impl std::str::FromStr for Feasibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            other => Err(format!("unknown feasibility {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Work {
    pub id: i64,
    #[serde(rename = "item")]
    pub item_id: i64,
    pub name: String,
    pub justification: String,
    pub comment: String,
    #[serde(flatten)]
    pub certification: Certification,
    pub accruals: MonthlyPlan, // plan Н
    pub payments: MonthlyPlan, // plan О
    pub year: i32,
    #[serde(rename = "responsible")]
    pub responsible_id: i64,
    pub vat_rate: VatRate,
    pub feasibility: Feasibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Work with its actuals and attachments.
///
/// `actual_accruals` / `actual_payments` are the legacy month-keyed encoding of the detail rows,
/// kept for clients that still read them.
#[derive(Debug, Clone, Serialize)]
pub struct WorkDto {
    #[serde(flatten)]
    pub work: Work,
    pub payment_details: Vec<WorkDetail>,
    pub accrual_details: Vec<WorkDetail>,
    pub actual_payments: BTreeMap<String, LegacyMonthlyEntry>,
    pub actual_accruals: BTreeMap<String, LegacyMonthlyEntry>,
    pub materials: Vec<Material>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_rate_round_trips_as_number() {
        let rate: VatRate = serde_json::from_str("5").unwrap();
        assert_eq!(rate, VatRate::Five);
        assert_eq!(serde_json::to_string(&VatRate::Twenty).unwrap(), "20");
        assert!(serde_json::from_str::<VatRate>("18").is_err());
    }

    #[test]
    fn feasibility_defaults_to_green() {
        assert_eq!(Feasibility::default(), Feasibility::Green);
        assert_eq!("red".parse::<Feasibility>().unwrap(), Feasibility::Red);
    }
}
