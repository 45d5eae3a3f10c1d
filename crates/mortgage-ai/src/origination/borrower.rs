use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::domain::{non_negative, out_of_range, BorrowerId, NewBorrower};
use super::error::FinanceError;
use super::extraction::{CreditExtraction, IncomeExtraction};
use super::ledger::{IncomeEntry, IncomeLedger, IncomeSourceId};

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT: Decimal = dec!(100);

/// Single recurring monthly obligation figure for a borrower.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseTracker {
    monthly: Decimal,
}

impl ExpenseTracker {
    pub fn monthly(&self) -> Decimal {
        self.monthly
    }

    pub fn replace(&mut self, amount: Decimal) -> Result<(), FinanceError> {
        self.monthly = non_negative("monthly_expenses", amount)?;
        Ok(())
    }
}

/// Borrower financial profile: identity, credit metrics, income ledger and expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub id: BorrowerId,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub ssn: String,
    #[serde(default = "BorrowerProfile::default_marital_status")]
    pub marital_status: String,
    /// Zero means "not set".
    #[serde(default)]
    pub credit_score: u32,
    /// Zero means "not set".
    #[serde(default)]
    pub fico_score: u32,
    #[serde(default)]
    income: IncomeLedger,
    #[serde(default)]
    expenses: ExpenseTracker,
    #[serde(default)]
    dti_ratio: Option<Decimal>,
}

/// Manual correction of a borrower record; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BorrowerUpdate {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub ssn: Option<String>,
    pub marital_status: Option<String>,
    pub credit_score: Option<u32>,
    pub fico_score: Option<u32>,
    pub monthly_expenses: Option<Decimal>,
    pub income_sources: Option<Vec<IncomeEntry>>,
}

impl BorrowerUpdate {
    /// Whether applying this update can move any application aggregate.
    pub fn touches_financials(&self) -> bool {
        self.monthly_expenses.is_some() || self.income_sources.is_some()
    }
}

impl BorrowerProfile {
    fn default_marital_status() -> String {
        "SINGLE".to_string()
    }

    pub fn new(id: BorrowerId, identity: NewBorrower) -> Self {
        Self {
            id,
            name: identity.full_name(),
            phone: identity.phone,
            email: identity.email,
            ssn: identity.ssn,
            marital_status: Self::default_marital_status(),
            credit_score: 0,
            fico_score: 0,
            income: IncomeLedger::new(),
            expenses: ExpenseTracker::default(),
            dti_ratio: None,
        }
    }

    pub fn income(&self) -> &IncomeLedger {
        &self.income
    }

    pub fn total_income(&self) -> Decimal {
        self.income.total()
    }

    pub fn monthly_expenses(&self) -> Decimal {
        self.expenses.monthly()
    }

    /// `None` while the borrower has no income; never a stand-in zero.
    pub fn dti_ratio(&self) -> Option<Decimal> {
        self.dti_ratio
    }

    pub fn add_income_source(
        &mut self,
        label: impl Into<String>,
        amount: Decimal,
    ) -> Result<IncomeSourceId, FinanceError> {
        let entry = IncomeEntry::new(label, amount);
        self.staged(|borrower| borrower.income.add(entry))
    }

    pub fn replace_income_sources(&mut self, entries: Vec<IncomeEntry>) -> Result<(), FinanceError> {
        self.staged(|borrower| borrower.income.replace_all(entries))
    }

    pub fn amend_income_source(
        &mut self,
        id: IncomeSourceId,
        entry: IncomeEntry,
    ) -> Result<(), FinanceError> {
        self.staged(|borrower| borrower.income.amend(id, entry))
    }

    pub fn update_monthly_expenses(&mut self, amount: Decimal) -> Result<(), FinanceError> {
        self.staged(|borrower| borrower.expenses.replace(amount))
    }

    /// `monthly_expenses / (total_income / 12) * 100`.
    pub fn recompute_dti(&mut self) -> Result<Decimal, FinanceError> {
        let total_income = self.total_income();
        if total_income.is_zero() {
            self.dti_ratio = None;
            return Err(FinanceError::UndefinedDti {
                context: format!("borrower {}", self.id),
            });
        }
        let ratio = total_income
            .checked_div(MONTHS_PER_YEAR)
            .and_then(|monthly_income| self.monthly_expenses().checked_div(monthly_income))
            .and_then(|share| share.checked_mul(PERCENT))
            .ok_or_else(|| out_of_range("dti_ratio"))?;
        self.dti_ratio = Some(ratio);
        Ok(ratio)
    }

    /// Undefined is recorded as `None`; callers that need a number use `recompute_dti`.
    fn refresh_dti(&mut self) -> Result<(), FinanceError> {
        match self.recompute_dti() {
            Ok(_) | Err(FinanceError::UndefinedDti { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Run `change` against a copy and keep it only when the refreshed ratio is computable.
    fn staged<T, F>(&mut self, change: F) -> Result<T, FinanceError>
    where
        F: FnOnce(&mut Self) -> Result<T, FinanceError>,
    {
        let mut staged = self.clone();
        let outcome = change(&mut staged)?;
        staged.refresh_dti()?;
        *self = staged;
        Ok(outcome)
    }

    /// Append the income found in a classified document. The ledger is untouched on failure.
    pub fn ingest_income_document(
        &mut self,
        extracted: &IncomeExtraction,
    ) -> Result<IncomeSourceId, FinanceError> {
        let amount = extracted
            .yearly_income
            .amount("yearly_income")?
            .ok_or_else(|| {
                FinanceError::Extraction(format!(
                    "yearly income could not be read from {} document",
                    extracted.document_type
                ))
            })?;
        self.add_income_source(extracted.document_type.clone(), amount)
    }

    /// Apply a credit report. A missing credit score rejects the whole report;
    /// a missing FICO score falls back to the credit score.
    pub fn ingest_credit_report(&mut self, extracted: &CreditExtraction) -> Result<(), FinanceError> {
        let credit_score = extracted.credit_score.score("credit_score")?.ok_or_else(|| {
            FinanceError::Extraction("credit score could not be read from report".to_string())
        })?;
        let fico_score = extracted
            .fico_score
            .score("fico_score")?
            .unwrap_or(credit_score);
        let monthly_expenses = extracted.monthly_expenses.amount("monthly_expenses")?;

        self.staged(|borrower| {
            borrower.credit_score = credit_score;
            borrower.fico_score = fico_score;
            if let Some(amount) = monthly_expenses {
                borrower.expenses.replace(amount)?;
            }
            Ok(())
        })
    }

    /// Apply a manual correction. Every field is validated before anything changes.
    pub fn apply_update(&mut self, update: BorrowerUpdate) -> Result<(), FinanceError> {
        let mut staged = self.clone();

        if let Some(entries) = update.income_sources {
            staged.income.replace_all(entries)?;
        }
        if let Some(amount) = update.monthly_expenses {
            staged.expenses.replace(amount)?;
        }
        if let Some(phone) = update.phone {
            staged.phone = phone;
        }
        if let Some(email) = update.email {
            staged.email = email;
        }
        if let Some(ssn) = update.ssn {
            staged.ssn = ssn;
        }
        if let Some(status) = update.marital_status {
            staged.marital_status = status.trim().to_ascii_uppercase();
        }
        if let Some(score) = update.credit_score {
            staged.credit_score = score;
        }
        if let Some(score) = update.fico_score {
            staged.fico_score = score;
        }

        staged.refresh_dti()?;
        *self = staged;
        Ok(())
    }
}
