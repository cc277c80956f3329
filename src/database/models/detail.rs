//! Per-month actual payment/accrual records.
//!
//! `WorkDetail` is the canonical record. The older month → `{amount, status}` maps
//! (`actual_payments` / `actual_accruals`) are only an encoding of the same rows: they are decoded
//! into `DetailInput` on write and re-encoded from `WorkDetail` on read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::month::{month_index, validate_month};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Payment,
    Accrual,
}

impl DetailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Accrual => "accrual",
        }
    }

    /// Request/response field holding the list of this kind.
    pub fn list_field(&self) -> &'static str {
        match self {
            Self::Payment => "payment_details",
            Self::Accrual => "accrual_details",
        }
    }
}

impl FromStr for DetailKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" | "payments" => Ok(Self::Payment),
            "accrual" | "accruals" => Ok(Self::Accrual),
            other => Err(format!("unknown detail kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkDetail {
    pub id: i64,
    #[serde(rename = "work")]
    pub work_id: i64,
    pub kind: DetailKind,
    pub month: String,
    pub amount: Decimal,
    pub status: Option<String>,
    pub creditor: String,
    pub contract: String,
    pub cost_center: String,
    pub document_ref: String,
    pub comment: Option<String>,
    pub comment_file: Option<String>,
    pub cancel_reason: Option<String>,
    pub transfer_reason: Option<String>,
    pub correction_reason: Option<String>,
    pub is_correction: bool,
}

/// One element of a `payment_details` / `accrual_details` request list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DetailInput {
    pub month: String,
    pub amount: Decimal,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub creditor: String,
    #[serde(default)]
    pub contract: String,
    #[serde(default)]
    pub cost_center: String,
    #[serde(default)]
    pub document_ref: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub comment_file: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    #[serde(default)]
    pub transfer_reason: Option<String>,
    #[serde(default)]
    pub correction_reason: Option<String>,
    #[serde(default)]
    pub is_correction: bool,
}

impl DetailInput {
    /// An empty attachment reference means "no attachment".
    pub fn attachment(&self) -> Option<&str> {
        self.comment_file
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

/// Legacy actual-figure entry: either a bare amount or `{amount, status}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyMonthlyEntry {
    WithStatus {
        amount: Decimal,
        #[serde(default)]
        status: Option<String>,
    },
    Amount(Decimal),
}

impl LegacyMonthlyEntry {
    pub fn into_detail(self, month: String) -> DetailInput {
        let (amount, status) = match self {
            Self::Amount(amount) => (amount, None),
            Self::WithStatus { amount, status } => (amount, status),
        };
        DetailInput {
            month,
            amount,
            status,
            ..DetailInput::default()
        }
    }

    pub fn from_detail(detail: &WorkDetail) -> Self {
        Self::WithStatus {
            amount: detail.amount,
            status: detail.status.clone(),
        }
    }
}

pub fn legacy_to_details(map: BTreeMap<String, LegacyMonthlyEntry>) -> Vec<DetailInput> {
    let mut details: Vec<DetailInput> = map
        .into_iter()
        .map(|(month, entry)| entry.into_detail(month))
        .collect();
    details.sort_by_key(|d| month_index(&d.month));
    details
}

pub fn details_to_legacy(rows: &[WorkDetail]) -> BTreeMap<String, LegacyMonthlyEntry> {
    rows.iter()
        .map(|d| (d.month.clone(), LegacyMonthlyEntry::from_detail(d)))
        .collect()
}

/// Rejects unknown month labels and repeated months before anything reaches the database.
pub fn validate_details(kind: DetailKind, details: &[DetailInput]) -> ApiResult<()> {
    let field = kind.list_field();
    let mut seen = HashSet::with_capacity(details.len());
    for detail in details {
        validate_month(field, &detail.month)?;
        if !seen.insert(detail.month.as_str()) {
            return Err(ApiError::validation(
                field,
                format!("duplicate month {:?}", detail.month),
            ));
        }
    }
    Ok(())
}

/// Attachment paths are only ever written by the upload endpoint. On a list write:
/// an absent `comment_file` keeps the stored attachment of that month, a blank one clears it,
/// and any other value must equal what is already stored.
pub fn reconcile_attachments(
    kind: DetailKind,
    details: &mut [DetailInput],
    stored: &[WorkDetail],
) -> ApiResult<()> {
    let current: HashMap<&str, &str> = stored
        .iter()
        .filter(|d| d.kind == kind)
        .filter_map(|d| Some((d.month.as_str(), d.comment_file.as_deref()?)))
        .collect();

    for detail in details.iter_mut() {
        let existing = current.get(detail.month.as_str()).copied();
        let supplied = detail.comment_file.is_some();
        let requested = detail.attachment().map(str::to_string);
        match (supplied, requested.as_deref()) {
            (false, _) => detail.comment_file = existing.map(str::to_string),
            (true, None) => detail.comment_file = None,
            (true, Some(file)) if Some(file) == existing => {}
            (true, Some(_)) => {
                return Err(ApiError::validation(
                    kind.list_field(),
                    format!(
                        "comment_file of {:?} can only be set by uploading an attachment",
                        detail.month
                    ),
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(month: &str, amount: i64) -> DetailInput {
        DetailInput {
            month: month.to_string(),
            amount: Decimal::new(amount, 0),
            ..DetailInput::default()
        }
    }

    #[test]
    fn duplicate_month_is_rejected() {
        let err = validate_details(
            DetailKind::Payment,
            &[input("Янв", 10), input("Фев", 5), input("Янв", 1)],
        )
        .unwrap_err();
        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "payment_details");
                assert!(message.contains("Янв"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn legacy_map_accepts_numbers_and_objects() {
        let map: BTreeMap<String, LegacyMonthlyEntry> =
            serde_json::from_str(r#"{"Мар": 800, "Янв": {"amount": "1200.5", "status": "paid"}}"#)
                .unwrap();
        let details = legacy_to_details(map);
        assert_eq!(details[0].month, "Янв");
        assert_eq!(details[0].amount, Decimal::new(12005, 1));
        assert_eq!(details[0].status.as_deref(), Some("paid"));
        assert_eq!(details[1].month, "Мар");
        assert_eq!(details[1].status, None);
    }

    #[test]
    fn blank_attachment_counts_as_none() {
        let mut d = input("Май", 1);
        d.comment_file = Some("  ".into());
        assert_eq!(d.attachment(), None);
        d.comment_file = Some("details/x.pdf".into());
        assert_eq!(d.attachment(), Some("details/x.pdf"));
    }

    fn stored(month: &str, file: Option<&str>) -> WorkDetail {
        WorkDetail {
            id: 1,
            work_id: 1,
            kind: DetailKind::Payment,
            month: month.to_string(),
            amount: Decimal::ONE,
            status: None,
            creditor: String::new(),
            contract: String::new(),
            cost_center: String::new(),
            document_ref: String::new(),
            comment: None,
            comment_file: file.map(str::to_string),
            cancel_reason: None,
            transfer_reason: None,
            correction_reason: None,
            is_correction: false,
        }
    }

    #[test]
    fn client_supplied_attachment_paths_are_rejected() {
        let mut details = vec![input("Янв", 1)];
        details[0].comment_file = Some("../../etc/passwd".into());
        let err = reconcile_attachments(DetailKind::Payment, &mut details, &[]).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "payment_details"));

        let rows = [stored("Янв", Some("details/a_scan.pdf"))];
        details[0].comment_file = Some("materials/b_other.pdf".into());
        assert!(reconcile_attachments(DetailKind::Payment, &mut details, &rows).is_err());
    }

    #[test]
    fn stored_attachment_survives_a_list_rewrite() {
        let rows = [
            stored("Янв", Some("details/a_scan.pdf")),
            stored("Фев", Some("details/b_scan.pdf")),
        ];
        let mut details = vec![input("Янв", 2), input("Фев", 3), input("Мар", 4)];
        details[1].comment_file = Some(String::new());
        details[2].comment_file = Some("details/a_scan.pdf".into());
        assert!(reconcile_attachments(DetailKind::Payment, &mut details, &rows).is_err());

        details[2].comment_file = None;
        reconcile_attachments(DetailKind::Payment, &mut details, &rows).unwrap();
        assert_eq!(details[0].attachment(), Some("details/a_scan.pdf"));
        assert_eq!(details[1].attachment(), None);
        assert_eq!(details[2].attachment(), None);

        // rows of the other kind are never borrowed from
        let mut accruals = vec![input("Янв", 1)];
        reconcile_attachments(DetailKind::Accrual, &mut accruals, &rows).unwrap();
        assert_eq!(accruals[0].attachment(), None);
    }
}
