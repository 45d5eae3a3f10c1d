//! Structured fields returned by the document-understanding services.
//!
//! Every field arrives either as a value or as the literal sentinel `"Unknown"`.
//! The models answer in raw JSON; `from_model_output` accepts that text directly.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::domain::parse_amount;
use super::error::FinanceError;

pub const UNKNOWN: &str = "Unknown";

/// One extracted field: a raw value or the `Unknown` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reading {
    Known(String),
    #[default]
    Unknown,
}

impl Reading {
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) {
            Reading::Unknown
        } else {
            Reading::Known(trimmed.to_string())
        }
    }

    pub fn known(value: impl ToString) -> Self {
        Reading::from_raw(&value.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Reading::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Reading::Known(value) => value,
            Reading::Unknown => UNKNOWN,
        }
    }

    /// `Ok(None)` for the sentinel; a present but unusable value is an extraction failure.
    pub fn amount(&self, field: &'static str) -> Result<Option<Decimal>, FinanceError> {
        match self {
            Reading::Unknown => Ok(None),
            Reading::Known(raw) => parse_amount(field, raw)
                .map(Some)
                .map_err(|err| FinanceError::Extraction(err.to_string())),
        }
    }

    /// Scores are positive whole numbers; zero is reserved for "not set".
    pub fn score(&self, field: &'static str) -> Result<Option<u32>, FinanceError> {
        let Some(amount) = self.amount(field)? else {
            return Ok(None);
        };
        let whole = amount.normalize();
        if whole.scale() != 0 || whole.is_zero() {
            return Err(FinanceError::Extraction(format!(
                "{field} '{}' is not a positive whole score",
                self.as_str()
            )));
        }
        u32::from_str(&whole.to_string())
            .map(Some)
            .map_err(|_| FinanceError::Extraction(format!("{field} '{whole}' is out of range")))
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReading {
    Number(serde_json::Number),
    Text(String),
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawReading>::deserialize(deserializer)? {
            None => Reading::Unknown,
            Some(RawReading::Number(number)) => Reading::Known(number.to_string()),
            Some(RawReading::Text(text)) => Reading::from_raw(&text),
        })
    }
}

/// Output of the income classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeExtraction {
    #[serde(default = "IncomeExtraction::unknown_type")]
    pub document_type: String,
    #[serde(default)]
    pub yearly_income: Reading,
}

#[derive(Debug, Deserialize)]
struct IncomeModelOutput {
    #[serde(default)]
    document_type: Reading,
    #[serde(default)]
    hourly_rate: Reading,
    #[serde(default)]
    hours_worked: Reading,
    #[serde(default)]
    pay_period: Reading,
    #[serde(default)]
    yearly_income: Reading,
}

impl IncomeExtraction {
    fn unknown_type() -> String {
        UNKNOWN.to_string()
    }

    pub fn new(document_type: impl Into<String>, yearly_income: Reading) -> Self {
        Self {
            document_type: document_type.into(),
            yearly_income,
        }
    }

    /// Parse the classifier's JSON answer, annualizing hourly pay when no yearly figure is given.
    pub fn from_model_output(raw: &str) -> Result<Self, FinanceError> {
        let output: IncomeModelOutput = serde_json::from_str(strip_fences(raw))
            .map_err(|err| FinanceError::Extraction(format!("income classifier output: {err}")))?;

        let yearly_income = if output.yearly_income.is_unknown() {
            annualize(&output.hourly_rate, &output.hours_worked, &output.pay_period)
        } else {
            output.yearly_income
        };

        Ok(Self {
            document_type: output.document_type.as_str().to_string(),
            yearly_income,
        })
    }
}

fn annualize(rate: &Reading, hours: &Reading, period: &Reading) -> Reading {
    let periods = match period.as_str().trim().to_ascii_lowercase().as_str() {
        "weekly" => dec!(52),
        "bi-weekly" | "biweekly" => dec!(26),
        _ => return Reading::Unknown,
    };
    match (rate.amount("hourly_rate"), hours.amount("hours_worked")) {
        (Ok(Some(rate)), Ok(Some(hours))) => rate
            .checked_mul(hours)
            .and_then(|per_period| per_period.checked_mul(periods))
            .map_or(Reading::Unknown, |yearly| Reading::Known(yearly.to_string())),
        _ => Reading::Unknown,
    }
}

/// Output of the credit-report extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditExtraction {
    #[serde(default)]
    pub credit_score: Reading,
    #[serde(default)]
    pub fico_score: Reading,
    #[serde(default)]
    pub monthly_expenses: Reading,
}

impl CreditExtraction {
    pub fn from_model_output(raw: &str) -> Result<Self, FinanceError> {
        serde_json::from_str(strip_fences(raw))
            .map_err(|err| FinanceError::Extraction(format!("credit extractor output: {err}")))
    }

    pub fn is_blank(&self) -> bool {
        self.credit_score.is_unknown()
            && self.fico_score.is_unknown()
            && self.monthly_expenses.is_unknown()
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
