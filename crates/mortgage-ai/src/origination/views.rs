use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::application::LoanApplication;
use super::borrower::BorrowerProfile;
use super::domain::{ApplicationId, ApplicationStatus, BorrowerId, LoanTerms, PropertyInfo};
use super::ledger::IncomeSource;
use super::service::ApplicationDetail;

const DISPLAY_DP: u32 = 2;

/// Borrower as exposed over HTTP. The SSN is reduced to its last four digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowerView {
    pub id: BorrowerId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub ssn_last4: String,
    pub marital_status: String,
    pub credit_score: u32,
    pub fico_score: u32,
    pub income_sources: Vec<IncomeSource>,
    pub total_income: Decimal,
    pub monthly_expenses: Decimal,
    pub dti_ratio: Option<Decimal>,
}

impl From<&BorrowerProfile> for BorrowerView {
    fn from(borrower: &BorrowerProfile) -> Self {
        let digits: Vec<char> = borrower.ssn.chars().filter(char::is_ascii_digit).collect();
        let ssn_last4 = digits[digits.len().saturating_sub(4)..].iter().collect();

        Self {
            id: borrower.id.clone(),
            name: borrower.name.clone(),
            phone: borrower.phone.clone(),
            email: borrower.email.clone(),
            ssn_last4,
            marital_status: borrower.marital_status.clone(),
            credit_score: borrower.credit_score,
            fico_score: borrower.fico_score,
            income_sources: borrower.income().sources().to_vec(),
            total_income: borrower.total_income(),
            monthly_expenses: borrower.monthly_expenses(),
            dti_ratio: borrower.dti_ratio().map(|ratio| ratio.round_dp(DISPLAY_DP)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub loan: LoanTerms,
    pub property: PropertyInfo,
    pub ltv: Decimal,
    pub rate: Decimal,
    pub status: ApplicationStatus,
    pub primary_borrower_id: Option<BorrowerId>,
    pub co_borrowers_id: Vec<BorrowerId>,
    pub total_income: Decimal,
    pub total_monthly_expenses: Decimal,
    pub dti: Decimal,
    pub llm_recommendation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<&LoanApplication> for ApplicationView {
    fn from(application: &LoanApplication) -> Self {
        Self {
            id: application.id.clone(),
            loan: application.loan.clone(),
            property: application.property.clone(),
            ltv: application.ltv().round_dp(DISPLAY_DP),
            rate: application.rate,
            status: application.status(),
            primary_borrower_id: application.primary_borrower_id().cloned(),
            co_borrowers_id: application.co_borrowers_id().to_vec(),
            total_income: application.total_income(),
            total_monthly_expenses: application.total_monthly_expenses(),
            dti: application.dti().round_dp(DISPLAY_DP),
            llm_recommendation: application.llm_recommendation().map(str::to_string),
            created_at: application.created_at,
            last_updated: application.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationDetailView {
    pub application: ApplicationView,
    pub borrowers: Vec<BorrowerView>,
}

impl From<&ApplicationDetail> for ApplicationDetailView {
    fn from(detail: &ApplicationDetail) -> Self {
        Self {
            application: ApplicationView::from(&detail.application),
            borrowers: detail.borrowers.iter().map(BorrowerView::from).collect(),
        }
    }
}
