use crate::infra::{build_service, DocumentBackend, OfflineDocuments};
use clap::Args;
use mortgage_ai::config::OriginationConfig;
use mortgage_ai::error::AppError;
use mortgage_ai::origination::{
    ApplicationDetailView, BorrowerView, InterestPreference, LoanTerms, NewApplication,
    NewBorrower, PropertyInfo,
};
use rust_decimal_macros::dec;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the co-borrower and show a single-borrower file.
    #[arg(long)]
    pub(crate) single_borrower: bool,
    /// Print the final application payload as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = build_service(
        OriginationConfig::default(),
        DocumentBackend::Offline(OfflineDocuments),
    )?;

    println!("Mortgage origination demo (offline document services, SSNs redacted)");
    let detail = service.create_application(None, demo_application(args.single_borrower))?;
    let application_id = detail.application.id.clone();
    println!(
        "- Created application {} with {} borrower(s), LTV {}%",
        application_id,
        detail.borrowers.len(),
        detail.application.ltv().round_dp(2)
    );

    let documents = [
        (
            r#"{"document_type": "W-2", "yearly_income": "60000"}"#,
            r#"{"credit_score": 728, "fico_score": 722, "monthly_expenses": "2000"}"#,
        ),
        (
            r#"{"document_type": "Paystub", "hourly_rate": "25", "hours_worked": "40", "pay_period": "weekly"}"#,
            r#"{"credit_score": 701, "fico_score": "Unknown", "monthly_expenses": "500"}"#,
        ),
    ];

    for (borrower, (income_document, credit_report)) in detail.borrowers.iter().zip(documents) {
        let ingestion = service.read_income_document(&borrower.id, income_document.as_bytes())?;
        let updated = service.read_credit_report(&borrower.id, credit_report.as_bytes())?;
        print_borrower(&ingestion.document_type, &BorrowerView::from(&updated));
    }

    let application = service.recompute_income_and_dti(&application_id)?;
    println!(
        "- Pooled income ${} | monthly obligations ${} | DTI {}%",
        application.total_income().round_dp(2),
        application.total_monthly_expenses().round_dp(2),
        application.dti().round_dp(2)
    );

    let application = service.generate_recommendation(&application_id)?;
    if let Some(narrative) = application.llm_recommendation() {
        println!("- Recommendation: {narrative}");
    }

    if args.json {
        let detail = service.application_detail(&application_id)?;
        match serde_json::to_string_pretty(&ApplicationDetailView::from(&detail)) {
            Ok(json) => println!("\nApplication payload:\n{json}"),
            Err(err) => println!("\nApplication payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn print_borrower(document_type: &str, borrower: &BorrowerView) {
    let dti = borrower
        .dti_ratio
        .map(|ratio| format!("{ratio}%"))
        .unwrap_or_else(|| "undefined".to_string());
    println!(
        "  - {} ({}, SSN ***-**-{}): {} read, income ${}, credit {}/{}, DTI {}",
        borrower.name,
        borrower.id,
        borrower.ssn_last4,
        document_type,
        borrower.total_income.round_dp(2),
        borrower.credit_score,
        borrower.fico_score,
        dti
    );
}

fn demo_application(single_borrower: bool) -> NewApplication {
    let mut borrowers = vec![NewBorrower {
        first_name: "Dana".to_string(),
        last_name: "Whitfield".to_string(),
        phone: "555-0110".to_string(),
        email: "dana@example.com".to_string(),
        ssn: "000-12-3456".to_string(),
    }];
    if !single_borrower {
        borrowers.push(NewBorrower {
            first_name: "Morgan".to_string(),
            last_name: "Whitfield".to_string(),
            phone: "555-0111".to_string(),
            email: "morgan@example.com".to_string(),
            ssn: "000-65-4321".to_string(),
        });
    }

    NewApplication {
        loan: LoanTerms {
            loan_amount: dec!(400000),
            loan_term: 30,
            loan_down_payment: dec!(100000),
            loan_interest_preference: InterestPreference::Fixed,
            loan_type: "CONVENTIONAL".to_string(),
            loan_purpose: "PURCHASE".to_string(),
        },
        property: PropertyInfo {
            property_price: dec!(500000),
            property_address: "48 Harbor View Rd".to_string(),
            property_type: "SINGLE_FAMILY".to_string(),
            occupancy_type: "PRIMARY".to_string(),
        },
        borrowers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn single_borrower_demo_runs() {
        run_demo(DemoArgs {
            single_borrower: true,
            json: true,
        })
        .expect("demo completes");
    }
}
