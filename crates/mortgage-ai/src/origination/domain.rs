use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::FinanceError;

/// Identifier wrapper for borrower profiles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowerId(pub String);

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for BorrowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestPreference {
    #[default]
    Fixed,
    Adjustable,
}

impl InterestPreference {
    pub const fn label(self) -> &'static str {
        match self {
            InterestPreference::Fixed => "FIXED",
            InterestPreference::Adjustable => "ADJUSTABLE",
        }
    }
}

impl FromStr for InterestPreference {
    type Err = FinanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FIXED" => Ok(Self::Fixed),
            "ADJUSTABLE" | "ARM" => Ok(Self::Adjustable),
            other => Err(FinanceError::validation(
                "loan_interest_preference",
                format!("unknown preference '{other}'"),
            )),
        }
    }
}

/// Workflow position of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Init,
    PendingDocuments,
    InReview,
    Approved,
    Denied,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Init => "INIT",
            ApplicationStatus::PendingDocuments => "PENDING_DOCUMENTS",
            ApplicationStatus::InReview => "IN_REVIEW",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Denied => "DENIED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Denied)
    }

    /// Writing the current status again is always allowed.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Init, PendingDocuments)
                | (Init, InReview)
                | (Init, Denied)
                | (PendingDocuments, InReview)
                | (PendingDocuments, Denied)
                | (InReview, Approved)
                | (InReview, Denied)
                | (InReview, PendingDocuments)
        )
    }

    pub fn transition_to(self, next: ApplicationStatus) -> Result<ApplicationStatus, FinanceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FinanceError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = FinanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_ascii_uppercase()
            .replace(|c: char| c == '-' || c == ' ', "_");
        match normalized.as_str() {
            "INIT" => Ok(Self::Init),
            "PENDING_DOCUMENTS" => Ok(Self::PendingDocuments),
            "IN_REVIEW" => Ok(Self::InReview),
            "APPROVED" => Ok(Self::Approved),
            "DENIED" => Ok(Self::Denied),
            other => Err(FinanceError::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Requested financing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: Decimal,
    /// Term in years.
    pub loan_term: u32,
    pub loan_down_payment: Decimal,
    #[serde(default)]
    pub loan_interest_preference: InterestPreference,
    #[serde(default = "LoanTerms::default_loan_type")]
    pub loan_type: String,
    #[serde(default = "LoanTerms::default_loan_purpose")]
    pub loan_purpose: String,
}

impl LoanTerms {
    fn default_loan_type() -> String {
        "CONVENTIONAL".to_string()
    }

    fn default_loan_purpose() -> String {
        "PURCHASE".to_string()
    }

    pub(crate) fn validate(&self) -> Result<(), FinanceError> {
        non_negative("loan_amount", self.loan_amount)?;
        non_negative("loan_down_payment", self.loan_down_payment)?;
        Ok(())
    }
}

/// Collateral being financed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub property_price: Decimal,
    #[serde(default)]
    pub property_address: String,
    #[serde(default = "PropertyInfo::default_property_type")]
    pub property_type: String,
    #[serde(default = "PropertyInfo::default_occupancy_type")]
    pub occupancy_type: String,
}

impl PropertyInfo {
    fn default_property_type() -> String {
        "SINGLE_FAMILY".to_string()
    }

    fn default_occupancy_type() -> String {
        "PRIMARY".to_string()
    }

    pub(crate) fn validate(&self) -> Result<(), FinanceError> {
        non_negative("property_price", self.property_price)?;
        Ok(())
    }
}

/// Identity captured for a borrower at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBorrower {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub ssn: String,
}

impl NewBorrower {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Ownership record grouping the applications a broker works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub application_ids: Vec<ApplicationId>,
}

impl UserAccount {
    pub fn new(username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            application_ids: Vec::new(),
        }
    }

    /// Returns `false` when the application was already registered.
    pub fn add_application(&mut self, id: ApplicationId) -> bool {
        if self.application_ids.contains(&id) {
            return false;
        }
        self.application_ids.push(id);
        true
    }

    pub fn owns(&self, id: &ApplicationId) -> bool {
        self.application_ids.contains(id)
    }
}

pub(crate) fn non_negative(field: &'static str, amount: Decimal) -> Result<Decimal, FinanceError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FinanceError::validation(
            field,
            format!("{amount} must not be negative"),
        ));
    }
    Ok(amount)
}

/// Arithmetic on otherwise valid figures left the representable range.
pub(crate) fn out_of_range(field: &'static str) -> FinanceError {
    FinanceError::validation(field, "figure is too large to compute with")
}

/// Parse a currency figure as written by people or models: `"$60,000.00"`.
pub fn parse_amount(field: &'static str, raw: &str) -> Result<Decimal, FinanceError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(FinanceError::validation(field, "amount is empty"));
    }
    let amount = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| FinanceError::validation(field, format!("'{raw}' is not a number")))?;
    non_negative(field, amount)
}

/// Convert a binary float into a currency amount, rejecting NaN and infinities.
pub fn amount_from_f64(field: &'static str, value: f64) -> Result<Decimal, FinanceError> {
    if !value.is_finite() {
        return Err(FinanceError::validation(
            field,
            format!("{value} is not a finite number"),
        ));
    }
    let amount = Decimal::try_from(value)
        .map_err(|_| FinanceError::validation(field, format!("{value} is out of range")))?;
    non_negative(field, amount)
}
