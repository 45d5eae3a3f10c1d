use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::borrower::BorrowerProfile;
use super::domain::{
    non_negative, out_of_range, ApplicationId, ApplicationStatus, BorrowerId, InterestPreference, LoanTerms,
    PropertyInfo,
};
use super::error::FinanceError;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT: Decimal = dec!(100);

/// Loan application with cached aggregates over its linked borrowers.
///
/// `total_income`, `total_monthly_expenses` and `dti` reflect the borrowers as they were at the
/// last aggregation; they go stale until `recompute_income_and_dti` runs again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub loan: LoanTerms,
    pub property: PropertyInfo,
    primary_borrower_id: Option<BorrowerId>,
    #[serde(default)]
    co_borrowers_id: Vec<BorrowerId>,
    #[serde(default)]
    pub ltv_override: Option<Decimal>,
    #[serde(default)]
    pub rate: Decimal,
    #[serde(default)]
    status: ApplicationStatus,
    #[serde(default)]
    total_income: Decimal,
    #[serde(default)]
    total_monthly_expenses: Decimal,
    #[serde(default)]
    dti: Decimal,
    #[serde(default)]
    llm_recommendation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Totals produced by one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub total_income: Decimal,
    pub total_monthly_expenses: Decimal,
    pub dti: Decimal,
}

impl Aggregate {
    /// Pool income and expenses over the primary borrower and every co-borrower.
    pub fn from_borrowers<'a, I>(
        application_id: &ApplicationId,
        borrowers: I,
    ) -> Result<Self, FinanceError>
    where
        I: IntoIterator<Item = &'a BorrowerProfile>,
    {
        let (total_income, total_monthly_expenses) = borrowers
            .into_iter()
            .try_fold(
                (Decimal::ZERO, Decimal::ZERO),
                |(income, expenses), borrower| {
                    Some((
                        income.checked_add(borrower.total_income())?,
                        expenses.checked_add(borrower.monthly_expenses())?,
                    ))
                },
            )
            .ok_or_else(|| out_of_range("total_income"))?;

        if total_income.is_zero() {
            return Err(FinanceError::UndefinedDti {
                context: format!("application {application_id}"),
            });
        }
        let dti = total_monthly_expenses
            .checked_mul(MONTHS_PER_YEAR)
            .and_then(|annual| annual.checked_div(total_income))
            .and_then(|share| share.checked_mul(PERCENT))
            .ok_or_else(|| out_of_range("dti"))?;

        Ok(Self {
            total_income,
            total_monthly_expenses,
            dti,
        })
    }
}

/// Partial edit of an application's terms, property, pricing or status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationUpdate {
    pub loan_amount: Option<Decimal>,
    pub loan_term: Option<u32>,
    pub loan_down_payment: Option<Decimal>,
    pub loan_interest_preference: Option<InterestPreference>,
    pub loan_type: Option<String>,
    pub loan_purpose: Option<String>,
    pub property_price: Option<Decimal>,
    pub property_address: Option<String>,
    pub property_type: Option<String>,
    pub occupancy_type: Option<String>,
    pub rate: Option<Decimal>,
    pub ltv: Option<Decimal>,
    pub status: Option<ApplicationStatus>,
}

impl LoanApplication {
    pub fn create(
        id: ApplicationId,
        loan: LoanTerms,
        property: PropertyInfo,
        now: DateTime<Utc>,
    ) -> Result<Self, FinanceError> {
        loan.validate()?;
        property.validate()?;

        let application = Self {
            id,
            loan,
            property,
            primary_borrower_id: None,
            co_borrowers_id: Vec::new(),
            ltv_override: None,
            rate: Decimal::ZERO,
            status: ApplicationStatus::Init,
            total_income: Decimal::ZERO,
            total_monthly_expenses: Decimal::ZERO,
            dti: Decimal::ZERO,
            llm_recommendation: None,
            created_at: now,
            last_updated: now,
        };
        application.derived_ltv()?;
        Ok(application)
    }

    pub fn primary_borrower_id(&self) -> Option<&BorrowerId> {
        self.primary_borrower_id.as_ref()
    }

    pub fn co_borrowers_id(&self) -> &[BorrowerId] {
        &self.co_borrowers_id
    }

    /// Primary borrower first, then co-borrowers in the order they were linked.
    pub fn borrower_ids(&self) -> impl Iterator<Item = &BorrowerId> {
        self.primary_borrower_id
            .iter()
            .chain(self.co_borrowers_id.iter())
    }

    pub fn involves(&self, borrower_id: &BorrowerId) -> bool {
        self.borrower_ids().any(|id| id == borrower_id)
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn total_income(&self) -> Decimal {
        self.total_income
    }

    pub fn total_monthly_expenses(&self) -> Decimal {
        self.total_monthly_expenses
    }

    /// Zero until the first successful aggregation.
    pub fn dti(&self) -> Decimal {
        self.dti
    }

    pub fn llm_recommendation(&self) -> Option<&str> {
        self.llm_recommendation.as_deref()
    }

    /// Explicit override when set, else `loan_amount / property_price * 100`, else zero.
    pub fn ltv(&self) -> Decimal {
        if let Some(ltv) = self.ltv_override.filter(|ltv| !ltv.is_zero()) {
            return ltv;
        }
        self.derived_ltv().unwrap_or(Decimal::ZERO)
    }

    /// Creation and updates reject terms whose ratio cannot be represented.
    fn derived_ltv(&self) -> Result<Decimal, FinanceError> {
        if self.property.property_price <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        self.loan
            .loan_amount
            .checked_div(self.property.property_price)
            .and_then(|share| share.checked_mul(PERCENT))
            .ok_or_else(|| out_of_range("ltv"))
    }

    pub fn set_primary_borrower(&mut self, borrower_id: BorrowerId) -> Result<(), FinanceError> {
        if self.co_borrowers_id.contains(&borrower_id) {
            return Err(FinanceError::validation(
                "primary_borrower_id",
                format!("{borrower_id} is already a co-borrower"),
            ));
        }
        self.primary_borrower_id = Some(borrower_id);
        Ok(())
    }

    pub fn add_co_borrower(&mut self, borrower_id: BorrowerId) -> Result<(), FinanceError> {
        if self.primary_borrower_id.as_ref() == Some(&borrower_id) {
            return Err(FinanceError::validation(
                "co_borrowers_id",
                format!("{borrower_id} is the primary borrower"),
            ));
        }
        if self.co_borrowers_id.contains(&borrower_id) {
            return Err(FinanceError::validation(
                "co_borrowers_id",
                format!("{borrower_id} is already a co-borrower"),
            ));
        }
        self.co_borrowers_id.push(borrower_id);
        Ok(())
    }

    pub fn remove_co_borrower(&mut self, borrower_id: &BorrowerId) -> Result<(), FinanceError> {
        let position = self
            .co_borrowers_id
            .iter()
            .position(|id| id == borrower_id)
            .ok_or_else(|| FinanceError::not_found("co-borrower", borrower_id.to_string()))?;
        self.co_borrowers_id.remove(position);
        Ok(())
    }

    /// Reload every linked borrower through `load` and replace the cached aggregates.
    ///
    /// All-or-nothing: a missing borrower or an undefined ratio leaves the application untouched.
    pub fn recompute_income_and_dti<F, E>(&mut self, mut load: F) -> Result<Aggregate, E>
    where
        F: FnMut(&BorrowerId) -> Result<Option<BorrowerProfile>, E>,
        E: From<FinanceError>,
    {
        let primary_id = self.primary_borrower_id.clone().ok_or_else(|| {
            FinanceError::not_found("primary borrower", format!("of application {}", self.id))
        })?;
        let mut borrowers = Vec::with_capacity(1 + self.co_borrowers_id.len());
        borrowers.push(
            load(&primary_id)?
                .ok_or_else(|| FinanceError::not_found("primary borrower", primary_id.to_string()))?,
        );
        for co_borrower_id in &self.co_borrowers_id {
            let borrower = load(co_borrower_id)?.ok_or_else(|| {
                FinanceError::not_found("co-borrower", co_borrower_id.to_string())
            })?;
            borrowers.push(borrower);
        }

        let aggregate = Aggregate::from_borrowers(&self.id, &borrowers)?;
        self.apply_aggregate(aggregate);
        Ok(aggregate)
    }

    pub fn apply_aggregate(&mut self, aggregate: Aggregate) {
        self.total_income = aggregate.total_income;
        self.total_monthly_expenses = aggregate.total_monthly_expenses;
        self.dti = aggregate.dti;
    }

    /// Drop cached totals that no longer describe the linked borrowers.
    pub fn clear_aggregates(&mut self) {
        self.total_income = Decimal::ZERO;
        self.total_monthly_expenses = Decimal::ZERO;
        self.dti = Decimal::ZERO;
    }

    pub fn set_status(&mut self, next: ApplicationStatus) -> Result<(), FinanceError> {
        self.status = self.status.transition_to(next)?;
        Ok(())
    }

    pub fn set_recommendation(&mut self, narrative: String) {
        self.llm_recommendation = Some(narrative);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }

    /// Validate the whole update first so a rejected field leaves the application as it was.
    pub fn apply_update(&mut self, update: ApplicationUpdate) -> Result<(), FinanceError> {
        let mut staged = self.clone();

        if let Some(amount) = update.loan_amount {
            staged.loan.loan_amount = non_negative("loan_amount", amount)?;
        }
        if let Some(term) = update.loan_term {
            staged.loan.loan_term = term;
        }
        if let Some(amount) = update.loan_down_payment {
            staged.loan.loan_down_payment = non_negative("loan_down_payment", amount)?;
        }
        if let Some(preference) = update.loan_interest_preference {
            staged.loan.loan_interest_preference = preference;
        }
        if let Some(loan_type) = update.loan_type {
            staged.loan.loan_type = loan_type;
        }
        if let Some(purpose) = update.loan_purpose {
            staged.loan.loan_purpose = purpose;
        }
        if let Some(price) = update.property_price {
            staged.property.property_price = non_negative("property_price", price)?;
        }
        if let Some(address) = update.property_address {
            staged.property.property_address = address;
        }
        if let Some(property_type) = update.property_type {
            staged.property.property_type = property_type;
        }
        if let Some(occupancy) = update.occupancy_type {
            staged.property.occupancy_type = occupancy;
        }
        if let Some(rate) = update.rate {
            staged.rate = non_negative("rate", rate)?;
        }
        if let Some(ltv) = update.ltv {
            staged.ltv_override = Some(non_negative("ltv", ltv)?);
        }
        if let Some(status) = update.status {
            staged.set_status(status)?;
        }
        staged.derived_ltv()?;

        *self = staged;
        Ok(())
    }
}
