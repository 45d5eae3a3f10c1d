use std::fmt::{self, Write as _};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::application::LoanApplication;
use super::borrower::BorrowerProfile;
use super::domain::{ApplicationId, InterestPreference};
use super::error::FinanceError;

/// Fixed-shape payload handed to the recommendation generator.
///
/// Mandatory figures are plain values; optional ones are `None` when the application has not
/// recorded them yet and render as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub application_id: ApplicationId,
    pub credit_score: u32,
    pub fico_score: Option<u32>,
    pub dti: Decimal,
    pub total_income: Decimal,
    pub loan_amount: Decimal,
    pub loan_term: Option<u32>,
    pub loan_down_payment: Option<Decimal>,
    pub loan_interest_preference: InterestPreference,
    pub property_price: Option<Decimal>,
    pub ltv: Option<Decimal>,
}

fn present<T: PartialEq + Default>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

/// Map an aggregated application and its primary borrower into a generator request.
pub fn build_request(
    application: &LoanApplication,
    primary: &BorrowerProfile,
) -> Result<RecommendationRequest, FinanceError> {
    if application.primary_borrower_id() != Some(&primary.id) {
        return Err(FinanceError::validation(
            "primary_borrower_id",
            format!(
                "{} is not the primary borrower of application {}",
                primary.id, application.id
            ),
        ));
    }
    if primary.credit_score == 0 {
        return Err(FinanceError::Precondition(
            "primary borrower has no credit score".to_string(),
        ));
    }
    if application.loan.loan_amount.is_zero() {
        return Err(FinanceError::Precondition("loan amount is not set".to_string()));
    }
    if application.dti().is_zero() {
        return Err(FinanceError::Precondition("DTI is not set".to_string()));
    }
    if application.total_income().is_zero() {
        return Err(FinanceError::Precondition(
            "total income is not set".to_string(),
        ));
    }

    Ok(RecommendationRequest {
        application_id: application.id.clone(),
        credit_score: primary.credit_score,
        fico_score: present(primary.fico_score),
        dti: application.dti(),
        total_income: application.total_income(),
        loan_amount: application.loan.loan_amount,
        loan_term: present(application.loan.loan_term),
        loan_down_payment: present(application.loan.loan_down_payment),
        loan_interest_preference: application.loan.loan_interest_preference,
        property_price: present(application.property.property_price),
        ltv: present(application.ltv()),
    })
}

/// Store the generator's narrative verbatim; its content is never inspected.
pub fn apply_response(application: &mut LoanApplication, narrative: String) {
    application.set_recommendation(narrative);
}

struct Shown<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for Shown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("Unknown"),
        }
    }
}

impl RecommendationRequest {
    /// Underwriting prompt text for the language model.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "Act as a senior mortgage underwriting assistant.\n\
             Assess whether the application below is likely to receive an automated \
             underwriting pre-approval. State the reasons either way and, when approval is \
             unlikely, give concrete steps the borrower can take to strengthen the file.\n\
             Recommend wholesale lenders and named programs that fit this profile and \
             explain why each fits. Be specific; skip disclaimers and hypotheticals.\n\n",
        );

        let percent = |value: Option<Decimal>| Shown(value.map(|v| format!("{}%", v.round_dp(2))));
        let dollars = |value: Option<Decimal>| Shown(value.map(|v| format!("${}", v.round_dp(2))));

        // Writing into a String cannot fail.
        let _ = writeln!(prompt, "Loan details:");
        let _ = writeln!(prompt, "- Requested amount: {}", dollars(Some(self.loan_amount)));
        let _ = writeln!(
            prompt,
            "- Term: {}",
            Shown(self.loan_term.map(|years| format!("{years} years")))
        );
        let _ = writeln!(prompt, "- Down payment: {}", dollars(self.loan_down_payment));
        let _ = writeln!(
            prompt,
            "- Interest preference: {}",
            self.loan_interest_preference.label()
        );
        let _ = writeln!(prompt, "- Property price: {}", dollars(self.property_price));
        let _ = writeln!(prompt, "- LTV: {}", percent(self.ltv));
        let _ = writeln!(prompt, "\nBorrower financials:");
        let _ = writeln!(prompt, "- Credit score: {}", self.credit_score);
        let _ = writeln!(prompt, "- FICO score: {}", Shown(self.fico_score));
        let _ = writeln!(prompt, "- DTI: {}", percent(Some(self.dti)));
        let _ = writeln!(prompt, "- Annual income: {}", dollars(Some(self.total_income)));

        prompt.push_str(
            "\nCover:\n\
             1. Recommended wholesale lenders\n\
             2. Program highlights such as low-FICO or high-LTV allowances\n\
             3. Why each recommendation suits this application\n\
             4. Limitations, and how to improve rate or terms\n\
             5. Conditional documents likely needed for approval\n",
        );
        prompt
    }
}
