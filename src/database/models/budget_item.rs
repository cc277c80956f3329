use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Material, WorkDto};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Certification,
    Patenting,
    Metrology,
    Quality,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certification => "certification",
            Self::Patenting => "patenting",
            Self::Metrology => "metrology",
            Self::Quality => "quality",
        }
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certification" => Ok(Self::Certification),
            "patenting" => Ok(Self::Patenting),
            "metrology" => Ok(Self::Metrology),
            "quality" => Ok(Self::Quality),
            other => Err(format!("unknown work type {other:?}")),
        }
    }
}

/// Certification metadata. Budget items carry it, works mirror it and may override it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    #[serde(default)]
    pub is_certification: bool,
    #[serde(default)]
    pub work_type: Option<WorkType>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub responsible_parties: String,
    #[serde(default)]
    pub certificate_number: String,
    #[serde(default)]
    pub certification_body: String,
}

/// Partial certification fields from a request. Absent fields keep the base value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificationPatch {
    pub is_certification: Option<bool>,
    pub work_type: Option<WorkType>,
    pub product_name: Option<String>,
    pub responsible_parties: Option<String>,
    pub certificate_number: Option<String>,
    pub certification_body: Option<String>,
}

impl CertificationPatch {
    pub fn apply(self, base: Certification) -> Certification {
        Certification {
            is_certification: self.is_certification.unwrap_or(base.is_certification),
            work_type: self.work_type.or(base.work_type),
            product_name: self.product_name.unwrap_or(base.product_name),
            responsible_parties: self.responsible_parties.unwrap_or(base.responsible_parties),
            certificate_number: self.certificate_number.unwrap_or(base.certificate_number),
            certification_body: self.certification_body.unwrap_or(base.certification_body),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetItem {
    pub id: i64,
    pub name: String,
    pub position: i64, // sort key, ties allowed
    #[serde(rename = "group")]
    pub group_id: i64,
    #[serde(flatten)]
    pub certification: Certification,
    pub created_at: DateTime<Utc>,
}

/// Item with its works and item-level attachments, as returned by `/items`.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetItemDto {
    #[serde(flatten)]
    pub item: BudgetItem,
    pub works: Vec<WorkDto>,
    pub materials: Vec<Material>,
}
