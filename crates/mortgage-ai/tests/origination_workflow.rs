use std::sync::{Arc, Mutex};

use mortgage_ai::config::OriginationConfig;
use mortgage_ai::origination::{
    ApplicationRepository, ApplicationStatus, ApplicationUpdate, BorrowerRepository,
    CreditExtraction, CreditExtractor, FinanceError, GatewayError, IncomeClassifier,
    IncomeExtraction, InterestPreference, LoanTerms, MemoryRecordStore, NewApplication,
    NewBorrower, OriginationService, OriginationServiceError, PropertyInfo,
    RecommendationGenerator, TextExtractor,
};
use rust_decimal_macros::dec;

/// Treats each document's text as the model answer and records generation prompts.
#[derive(Default)]
struct ModelReplay {
    prompts: Mutex<Vec<String>>,
}

impl TextExtractor for ModelReplay {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError> {
        String::from_utf8(document.to_vec())
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl IncomeClassifier for ModelReplay {
    fn classify(&self, text: &str) -> Result<IncomeExtraction, GatewayError> {
        IncomeExtraction::from_model_output(text)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl CreditExtractor for ModelReplay {
    fn extract_credit(&self, text: &str) -> Result<CreditExtraction, GatewayError> {
        CreditExtraction::from_model_output(text)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl RecommendationGenerator for ModelReplay {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts
            .lock()
            .expect("prompt mutex poisoned")
            .push(prompt.to_string());
        Ok("Eligible for conforming fixed-rate programs.".to_string())
    }
}

fn borrower(first_name: &str) -> NewBorrower {
    NewBorrower {
        first_name: first_name.to_string(),
        last_name: "Rivera".to_string(),
        phone: "555-0123".to_string(),
        email: format!("{}@example.com", first_name.to_ascii_lowercase()),
        ssn: "111-22-3333".to_string(),
    }
}

fn intake(borrowers: Vec<NewBorrower>) -> NewApplication {
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
            property_address: "7 Elm Street".to_string(),
            property_type: "SINGLE_FAMILY".to_string(),
            occupancy_type: "PRIMARY".to_string(),
        },
        borrowers,
    }
}

fn service() -> (
    OriginationService<MemoryRecordStore, ModelReplay>,
    Arc<MemoryRecordStore>,
    Arc<ModelReplay>,
) {
    let store = Arc::new(MemoryRecordStore::default());
    let documents = Arc::new(ModelReplay::default());
    let service = OriginationService::new(
        store.clone(),
        documents.clone(),
        OriginationConfig::default(),
    );
    service
        .create_user("admin", "Administrator")
        .expect("owner created");
    (service, store, documents)
}

#[test]
fn two_borrower_file_reaches_a_recommendation() {
    let (service, store, documents) = service();
    let detail = service
        .create_application(None, intake(vec![borrower("Sam"), borrower("Alex")]))
        .expect("application created");
    let application_id = detail.application.id.clone();
    let primary = detail.borrowers[0].id.clone();
    let co_borrower = detail.borrowers[1].id.clone();

    service
        .read_income_document(
            &primary,
            br#"```json
{"document_type": "W-2", "yearly_income": "$60,000"}
```"#,
        )
        .expect("primary income");
    service
        .read_credit_report(
            &primary,
            br#"{"credit_score": "735", "fico_score": "728", "monthly_expenses": "2000"}"#,
        )
        .expect("primary credit");
    service
        .read_income_document(
            &co_borrower,
            br#"{"document_type": "Paystub", "hourly_rate": "25", "hours_worked": "40", "pay_period": "weekly"}"#,
        )
        .expect("co-borrower income");
    service
        .read_credit_report(
            &co_borrower,
            br#"{"credit_score": 690, "fico_score": "Unknown", "monthly_expenses": 500}"#,
        )
        .expect("co-borrower credit");

    let co_profile = store
        .fetch_borrower(&co_borrower)
        .expect("fetch succeeds")
        .expect("co-borrower stored");
    assert_eq!(co_profile.total_income(), dec!(52000));
    assert_eq!(co_profile.fico_score, 690);

    let application = service
        .recompute_income_and_dti(&application_id)
        .expect("aggregates computed");
    assert_eq!(application.total_income(), dec!(112000));
    assert_eq!(application.total_monthly_expenses(), dec!(2500));
    assert_eq!(application.ltv(), dec!(80));

    let application = service
        .generate_recommendation(&application_id)
        .expect("recommendation generated");
    assert_eq!(
        application.llm_recommendation(),
        Some("Eligible for conforming fixed-rate programs.")
    );
    let prompts = documents.prompts.lock().expect("prompt mutex poisoned");
    assert!(prompts[0].contains("- Credit score: 735"));
    assert!(prompts[0].contains("- FICO score: 728"));

    let stored = store
        .fetch_application(&application_id)
        .expect("fetch succeeds")
        .expect("application stored");
    assert_eq!(stored, application);
}

#[test]
fn review_workflow_tracks_status() {
    let (service, _, _) = service();
    let detail = service
        .create_application(None, intake(vec![borrower("Sam")]))
        .expect("application created");
    let application_id = detail.application.id;

    for status in [
        ApplicationStatus::PendingDocuments,
        ApplicationStatus::InReview,
        ApplicationStatus::Denied,
    ] {
        service
            .update_application(
                &application_id,
                ApplicationUpdate {
                    status: Some(status),
                    ..ApplicationUpdate::default()
                },
            )
            .expect("allowed transition");
    }

    let reopened = service.update_application(
        &application_id,
        ApplicationUpdate {
            status: Some(ApplicationStatus::InReview),
            ..ApplicationUpdate::default()
        },
    );
    assert!(matches!(
        reopened,
        Err(OriginationServiceError::Finance(
            FinanceError::InvalidTransition { .. }
        ))
    ));
    assert_eq!(
        service
            .get_application(&application_id)
            .expect("application stored")
            .status(),
        ApplicationStatus::Denied
    );
}

#[test]
fn unreadable_model_answer_is_a_gateway_failure() {
    let (service, store, _) = service();
    let detail = service
        .create_application(None, intake(vec![borrower("Sam")]))
        .expect("application created");
    let primary = detail.borrowers[0].id.clone();

    let result = service.read_income_document(&primary, b"not json at all");

    assert!(matches!(result, Err(OriginationServiceError::Gateway(_))));
    let stored = store
        .fetch_borrower(&primary)
        .expect("fetch succeeds")
        .expect("borrower stored");
    assert!(stored.income().is_empty());
}
