use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::config::OriginationConfig;
use crate::origination::application::LoanApplication;
use crate::origination::borrower::BorrowerProfile;
use crate::origination::domain::{
    ApplicationId, BorrowerId, InterestPreference, LoanTerms, NewBorrower, PropertyInfo,
    UserAccount,
};
use crate::origination::error::FinanceError;
use crate::origination::extraction::{CreditExtraction, IncomeExtraction, Reading};
use crate::origination::gateway::{
    CreditExtractor, GatewayError, IncomeClassifier, RecommendationGenerator, TextExtractor,
};
use crate::origination::repository::{
    ApplicationRepository, BorrowerRepository, MemoryRecordStore, RepositoryError,
    UserRepository,
};
use crate::origination::service::{NewApplication, OriginationService};

pub(super) const OWNER: &str = "admin";

pub(super) fn loan_terms() -> LoanTerms {
    LoanTerms {
        loan_amount: dec!(400000),
        loan_term: 30,
        loan_down_payment: dec!(100000),
        loan_interest_preference: InterestPreference::Fixed,
        loan_type: "CONVENTIONAL".to_string(),
        loan_purpose: "PURCHASE".to_string(),
    }
}

pub(super) fn property() -> PropertyInfo {
    PropertyInfo {
        property_price: dec!(500000),
        property_address: "12 Orchard Lane, Springfield".to_string(),
        property_type: "SINGLE_FAMILY".to_string(),
        occupancy_type: "PRIMARY".to_string(),
    }
}

pub(super) fn identity(first_name: &str, last_name: &str) -> NewBorrower {
    NewBorrower {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone: "555-0100".to_string(),
        email: format!("{}@example.com", first_name.to_ascii_lowercase()),
        ssn: "123-45-6789".to_string(),
    }
}

pub(super) fn new_application(borrowers: usize) -> NewApplication {
    let names = [("Ada", "Lovelace"), ("Grace", "Hopper"), ("Alan", "Turing")];
    NewApplication {
        loan: loan_terms(),
        property: property(),
        borrowers: names
            .iter()
            .take(borrowers)
            .map(|(first, last)| identity(first, last))
            .collect(),
    }
}

pub(super) fn application(id: &str) -> LoanApplication {
    LoanApplication::create(
        ApplicationId(id.to_string()),
        loan_terms(),
        property(),
        chrono::Utc::now(),
    )
    .expect("valid application")
}

pub(super) fn borrower(id: &str, income: Decimal, expenses: Decimal) -> BorrowerProfile {
    let mut borrower = BorrowerProfile::new(BorrowerId(id.to_string()), identity("Test", id));
    if !income.is_zero() {
        borrower
            .add_income_source("W-2", income)
            .expect("valid income");
    }
    borrower
        .update_monthly_expenses(expenses)
        .expect("valid expenses");
    borrower
}

pub(super) fn loader(
    borrowers: &HashMap<BorrowerId, BorrowerProfile>,
) -> impl FnMut(&BorrowerId) -> Result<Option<BorrowerProfile>, FinanceError> + '_ {
    move |id| Ok(borrowers.get(id).cloned())
}

pub(super) fn income_reading(document_type: &str, yearly_income: &str) -> IncomeExtraction {
    IncomeExtraction::new(document_type, Reading::from_raw(yearly_income))
}

pub(super) fn credit_reading(credit: &str, fico: &str, expenses: &str) -> CreditExtraction {
    CreditExtraction {
        credit_score: Reading::from_raw(credit),
        fico_score: Reading::from_raw(fico),
        monthly_expenses: Reading::from_raw(expenses),
    }
}

/// Document services whose answers are set by the test before each call.
pub(super) struct ScriptedDocuments {
    income: Mutex<IncomeExtraction>,
    credit: Mutex<CreditExtraction>,
    narrative: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedDocuments {
    fn default() -> Self {
        Self {
            income: Mutex::new(income_reading("Unknown", "Unknown")),
            credit: Mutex::new(CreditExtraction::default()),
            narrative: Mutex::new(Some("Strong file; pursue conforming programs.".to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedDocuments {
    pub(super) fn answer_income(&self, reading: IncomeExtraction) {
        *self.income.lock().expect("income mutex poisoned") = reading;
    }

    pub(super) fn answer_credit(&self, reading: CreditExtraction) {
        *self.credit.lock().expect("credit mutex poisoned") = reading;
    }

    /// `None` makes the generator fail.
    pub(super) fn answer_narrative(&self, narrative: Option<&str>) {
        *self.narrative.lock().expect("narrative mutex poisoned") = narrative.map(str::to_string);
    }

    pub(super) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt mutex poisoned").clone()
    }
}

impl TextExtractor for ScriptedDocuments {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError> {
        String::from_utf8(document.to_vec())
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl IncomeClassifier for ScriptedDocuments {
    fn classify(&self, _text: &str) -> Result<IncomeExtraction, GatewayError> {
        Ok(self.income.lock().expect("income mutex poisoned").clone())
    }
}

impl CreditExtractor for ScriptedDocuments {
    fn extract_credit(&self, _text: &str) -> Result<CreditExtraction, GatewayError> {
        Ok(self.credit.lock().expect("credit mutex poisoned").clone())
    }
}

impl RecommendationGenerator for ScriptedDocuments {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts
            .lock()
            .expect("prompt mutex poisoned")
            .push(prompt.to_string());
        self.narrative
            .lock()
            .expect("narrative mutex poisoned")
            .clone()
            .ok_or_else(|| GatewayError::Unavailable("model offline".to_string()))
    }
}

pub(super) type TestService = OriginationService<MemoryRecordStore, ScriptedDocuments>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRecordStore>, Arc<ScriptedDocuments>) {
    let store = Arc::new(MemoryRecordStore::default());
    store
        .put_user(UserAccount::new(OWNER, "Administrator"))
        .expect("seed owner");
    let documents = Arc::new(ScriptedDocuments::default());
    let service = OriginationService::new(
        store.clone(),
        documents.clone(),
        OriginationConfig::default(),
    );
    (service, store, documents)
}

pub(super) struct UnavailableStore;

impl BorrowerRepository for UnavailableStore {
    fn fetch_borrower(&self, _id: &BorrowerId) -> Result<Option<BorrowerProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn put_borrower(&self, _borrower: BorrowerProfile) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl ApplicationRepository for UnavailableStore {
    fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn put_application(&self, _application: LoanApplication) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn scan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl UserRepository for UnavailableStore {
    fn fetch_user(&self, _username: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn put_user(&self, _user: UserAccount) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Memory store where every borrower id already looks taken.
#[derive(Default)]
pub(super) struct CrowdedStore {
    pub(super) inner: MemoryRecordStore,
}

impl BorrowerRepository for CrowdedStore {
    fn fetch_borrower(&self, id: &BorrowerId) -> Result<Option<BorrowerProfile>, RepositoryError> {
        Ok(Some(borrower(&id.0, Decimal::ZERO, Decimal::ZERO)))
    }

    fn put_borrower(&self, borrower: BorrowerProfile) -> Result<(), RepositoryError> {
        self.inner.put_borrower(borrower)
    }
}

impl ApplicationRepository for CrowdedStore {
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        self.inner.fetch_application(id)
    }

    fn put_application(&self, application: LoanApplication) -> Result<(), RepositoryError> {
        self.inner.put_application(application)
    }

    fn scan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        self.inner.scan_applications()
    }
}

impl UserRepository for CrowdedStore {
    fn fetch_user(&self, username: &str) -> Result<Option<UserAccount>, RepositoryError> {
        self.inner.fetch_user(username)
    }

    fn put_user(&self, user: UserAccount) -> Result<(), RepositoryError> {
        self.inner.put_user(user)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
