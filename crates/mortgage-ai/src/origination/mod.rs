//! Mortgage origination: borrower profiles, loan applications and their aggregates.
//!
//! Borrowers hold an income ledger, a monthly expense figure and credit scores. Applications
//! cache the pooled income, expenses and debt-to-income ratio of their primary borrower and
//! co-borrowers, plus loan-to-value figures and the latest underwriting narrative. Document
//! understanding and narrative generation sit behind the traits in `gateway`; persistence sits
//! behind the traits in `repository`.

pub mod application;
pub mod borrower;
pub mod domain;
pub mod error;
pub mod extraction;
pub mod gateway;
pub mod ledger;
pub mod recommendation;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use application::{Aggregate, ApplicationUpdate, LoanApplication};
pub use borrower::{BorrowerProfile, BorrowerUpdate, ExpenseTracker};
pub use domain::{
    amount_from_f64, parse_amount, ApplicationId, ApplicationStatus, BorrowerId,
    InterestPreference, LoanTerms, NewBorrower, PropertyInfo, UserAccount,
};
pub use error::FinanceError;
pub use extraction::{CreditExtraction, IncomeExtraction, Reading};
pub use gateway::{
    CreditExtractor, DocumentServices, GatewayError, IncomeClassifier, RecommendationGenerator,
    TextExtractor,
};
pub use ledger::{IncomeEntry, IncomeLedger, IncomeSource, IncomeSourceId};
pub use recommendation::{apply_response, build_request, RecommendationRequest};
pub use repository::{
    ApplicationRepository, BorrowerRepository, MemoryRecordStore, RecordStore, RepositoryError,
    UserRepository,
};
pub use router::{origination_router, OWNER_HEADER};
pub use service::{
    ApplicationDetail, IncomeIngestion, NewApplication, OriginationService,
    OriginationServiceError,
};
pub use views::{ApplicationDetailView, ApplicationView, BorrowerView};
