use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PayoutError, Result};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Scheduled,
    Paid,
    Overdue,
    Cancelled,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 4] = [
        PayoutStatus::Scheduled,
        PayoutStatus::Paid,
        PayoutStatus::Overdue,
        PayoutStatus::Cancelled,
    ];
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutStatus::Scheduled => write!(f, "SCHEDULED"),
            PayoutStatus::Paid => write!(f, "PAID"),
            PayoutStatus::Overdue => write!(f, "OVERDUE"),
            PayoutStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// How the server arrived at a payout amount
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalculationBasis {
    pub method: String,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub base_amount: f64,
    #[serde(default)]
    pub calculated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PayoutRecord {
    pub id: u64,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub amount: f64,
    pub status: PayoutStatus,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub paid_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub calculation_basis: Option<CalculationBasis>,
}

impl PayoutRecord {
    /// Any status may be cancelled; cancelling twice is a no-op.
    pub fn cancel(&mut self) {
        self.status = PayoutStatus::Cancelled;
    }

    /// Only scheduled payouts can be marked paid. Returns whether the
    /// transition happened.
    pub fn mark_paid(&mut self, paid_on: NaiveDate) -> bool {
        if self.status != PayoutStatus::Scheduled {
            return false;
        }
        self.status = PayoutStatus::Paid;
        self.paid_date = Some(paid_on);
        true
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl Pagination {
    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// One page of the payouts listing, also the shape persisted to the cache
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Page {
    pub payouts: Vec<PayoutRecord>,
    pub pagination: Pagination,
}

impl Page {
    /// Reject pagination metadata that points past the last page
    pub fn validate(self) -> Result<Self> {
        if self.pagination.current_page > self.pagination.last_page {
            return Err(PayoutError::Decode(format!(
                "current_page {} is beyond last_page {}",
                self.pagination.current_page, self.pagination.last_page
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    BankTransfer,
    Cheque,
    CreditCard,
    /// Provider-specific method, e.g. "paypal"
    Provider(String),
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Cheque => write!(f, "cheque"),
            PaymentMethod::CreditCard => write!(f, "credit_card"),
            PaymentMethod::Provider(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = PayoutError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "bank_transfer" | "bank-transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" | "check" => Ok(PaymentMethod::Cheque),
            "credit_card" | "credit-card" => Ok(PaymentMethod::CreditCard),
            "" => Err(PayoutError::InvalidPaymentMethod(s.to_string())),
            other
                if other
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
            {
                Ok(PaymentMethod::Provider(other.to_string()))
            }
            _ => Err(PayoutError::InvalidPaymentMethod(s.to_string())),
        }
    }
}

/// Request body for marking a payout paid
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub method: PaymentMethod,
    pub reference_number: String,
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn new(method: PaymentMethod, reference_number: &str, notes: Option<String>) -> Self {
        Self {
            method,
            reference_number: reference_number.to_string(),
            notes,
        }
    }

    /// Trimmed reference number, or an error if nothing is left
    pub fn validated_reference(&self) -> Result<&str> {
        let reference = self.reference_number.trim();
        if reference.is_empty() {
            return Err(PayoutError::MissingReference);
        }
        Ok(reference)
    }

    pub fn to_body(&self) -> Result<serde_json::Value> {
        let reference = self.validated_reference()?;
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        Ok(serde_json::json!({
            "status": "paid",
            "payment_method": self.method.to_string(),
            "reference_number": reference,
            "notes": notes,
        }))
    }
}

fn amount_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount '{s}'"))),
    }
}
