use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::application::{ApplicationUpdate, LoanApplication};
use super::borrower::{BorrowerProfile, BorrowerUpdate};
use super::domain::{ApplicationId, BorrowerId, LoanTerms, NewBorrower, PropertyInfo, UserAccount};
use super::error::FinanceError;
use super::gateway::{DocumentServices, GatewayError};
use super::recommendation::{apply_response, build_request};
use super::repository::{RecordStore, RepositoryError};
use crate::config::OriginationConfig;

/// Intake request creating an application together with its borrowers.
/// The first borrower listed becomes the primary borrower.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewApplication {
    pub loan: LoanTerms,
    pub property: PropertyInfo,
    pub borrowers: Vec<NewBorrower>,
}

/// Application together with every linked borrower, primary first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationDetail {
    pub application: LoanApplication,
    pub borrowers: Vec<BorrowerProfile>,
}

/// Result of reading an income document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomeIngestion {
    pub borrower: BorrowerProfile,
    pub document_type: String,
}

/// Service composing the record store with the external document services.
///
/// Every operation reads current records, computes, and writes back whole records; the store's
/// single-record put is the only serialization point. Operations that change a borrower's
/// income or expenses re-aggregate every application that references the borrower before
/// returning.
pub struct OriginationService<S, D> {
    store: Arc<S>,
    documents: Arc<D>,
    config: OriginationConfig,
}

impl<S, D> OriginationService<S, D>
where
    S: RecordStore + 'static,
    D: DocumentServices + 'static,
{
    pub fn new(store: Arc<S>, documents: Arc<D>, config: OriginationConfig) -> Self {
        Self {
            store,
            documents,
            config,
        }
    }

    pub fn default_owner(&self) -> &str {
        &self.config.default_owner
    }

    pub fn create_user(
        &self,
        username: &str,
        name: &str,
    ) -> Result<UserAccount, OriginationServiceError> {
        let username = username.trim();
        if username.is_empty() || name.trim().is_empty() {
            return Err(
                FinanceError::validation("username", "username and name are required").into(),
            );
        }
        if self.store.fetch_user(username)?.is_some() {
            return Err(RepositoryError::Conflict.into());
        }

        let user = UserAccount::new(username, name.trim());
        self.store.put_user(user.clone())?;
        info!(username, "user account created");
        Ok(user)
    }

    /// Create an application and its borrowers, then register it with the owner.
    pub fn create_application(
        &self,
        owner: Option<&str>,
        request: NewApplication,
    ) -> Result<ApplicationDetail, OriginationServiceError> {
        let owner = owner.unwrap_or(self.config.default_owner.as_str());
        let mut user = self
            .store
            .fetch_user(owner)?
            .ok_or_else(|| FinanceError::not_found("user", owner))?;

        if request.borrowers.is_empty() {
            return Err(
                FinanceError::validation("borrowers", "at least one borrower is required").into(),
            );
        }

        let NewApplication {
            loan,
            property,
            borrowers: identities,
        } = request;

        let application_id = ApplicationId(self.allocate_id('A', |candidate| {
            Ok(self
                .store
                .fetch_application(&ApplicationId(candidate.to_string()))?
                .is_some())
        })?);
        let now = Utc::now();
        let mut application =
            LoanApplication::create(application_id.clone(), loan, property, now)?;

        let mut borrowers = Vec::with_capacity(identities.len());
        for (index, identity) in identities.into_iter().enumerate() {
            let borrower_id = BorrowerId(self.allocate_id('B', |candidate| {
                Ok(self
                    .store
                    .fetch_borrower(&BorrowerId(candidate.to_string()))?
                    .is_some())
            })?);
            let borrower = BorrowerProfile::new(borrower_id.clone(), identity);
            self.store.put_borrower(borrower.clone())?;

            if index == 0 {
                application.set_primary_borrower(borrower_id)?;
            } else {
                application.add_co_borrower(borrower_id)?;
            }
            borrowers.push(borrower);
        }

        self.store.put_application(application.clone())?;
        user.add_application(application_id.clone());
        self.store.put_user(user)?;

        info!(
            application_id = %application_id,
            owner,
            borrowers = borrowers.len(),
            "loan application created"
        );
        Ok(ApplicationDetail {
            application,
            borrowers,
        })
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let application = self
            .store
            .fetch_application(application_id)?
            .ok_or_else(|| FinanceError::not_found("application", application_id.to_string()))?;
        Ok(application)
    }

    /// Application with all linked borrowers; a dangling borrower reference is an error.
    pub fn application_detail(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationDetail, OriginationServiceError> {
        let application = self.get_application(application_id)?;
        let mut borrowers = Vec::new();
        for borrower_id in application.borrower_ids() {
            let borrower = self
                .load_borrower(borrower_id)?
                .ok_or_else(|| FinanceError::not_found("borrower", borrower_id.to_string()))?;
            borrowers.push(borrower);
        }
        Ok(ApplicationDetail {
            application,
            borrowers,
        })
    }

    /// Applications owned by a user. Dangling references are skipped so one bad record does
    /// not hide the rest of the pipeline.
    pub fn list_applications(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<ApplicationDetail>, OriginationServiceError> {
        let owner = owner.unwrap_or(self.config.default_owner.as_str());
        let user = self
            .store
            .fetch_user(owner)?
            .ok_or_else(|| FinanceError::not_found("user", owner))?;

        let mut details = Vec::with_capacity(user.application_ids.len());
        for application_id in &user.application_ids {
            let Some(application) = self.store.fetch_application(application_id)? else {
                warn!(
                    application_id = %application_id,
                    owner,
                    "user references missing application"
                );
                continue;
            };
            let mut borrowers = Vec::new();
            for borrower_id in application.borrower_ids() {
                match self.store.fetch_borrower(borrower_id)? {
                    Some(borrower) => borrowers.push(borrower),
                    None => warn!(
                        application_id = %application_id,
                        borrower_id = %borrower_id,
                        "application references missing borrower"
                    ),
                }
            }
            details.push(ApplicationDetail {
                application,
                borrowers,
            });
        }
        Ok(details)
    }

    pub fn update_application(
        &self,
        application_id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let mut application = self.get_application(application_id)?;
        application.apply_update(update)?;
        application.touch(Utc::now());
        self.store.put_application(application.clone())?;
        Ok(application)
    }

    pub fn add_co_borrower(
        &self,
        application_id: &ApplicationId,
        borrower_id: &BorrowerId,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let mut application = self.get_application(application_id)?;
        self.get_borrower(borrower_id)?;
        application.add_co_borrower(borrower_id.clone())?;
        self.aggregate_and_store(application)
    }

    pub fn remove_co_borrower(
        &self,
        application_id: &ApplicationId,
        borrower_id: &BorrowerId,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let mut application = self.get_application(application_id)?;
        application.remove_co_borrower(borrower_id)?;
        self.aggregate_and_store(application)
    }

    /// Re-aggregate income, expenses and DTI; every failure is reported to the caller.
    pub fn recompute_income_and_dti(
        &self,
        application_id: &ApplicationId,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let mut application = self.get_application(application_id)?;
        let aggregate = application.recompute_income_and_dti(|id| self.load_borrower(id))?;
        application.touch(Utc::now());
        self.store.put_application(application.clone())?;
        debug!(
            application_id = %application_id,
            total_income = %aggregate.total_income,
            total_monthly_expenses = %aggregate.total_monthly_expenses,
            dti = %aggregate.dti,
            "application aggregates recomputed"
        );
        Ok(application)
    }

    pub fn get_borrower(
        &self,
        borrower_id: &BorrowerId,
    ) -> Result<BorrowerProfile, OriginationServiceError> {
        let borrower = self
            .load_borrower(borrower_id)?
            .ok_or_else(|| FinanceError::not_found("borrower", borrower_id.to_string()))?;
        Ok(borrower)
    }

    pub fn update_borrower(
        &self,
        borrower_id: &BorrowerId,
        update: BorrowerUpdate,
    ) -> Result<BorrowerProfile, OriginationServiceError> {
        let mut borrower = self.get_borrower(borrower_id)?;
        let financial = update.touches_financials();
        borrower.apply_update(update)?;
        self.store.put_borrower(borrower.clone())?;

        if financial {
            self.refresh_owning_applications(borrower_id)?;
        }
        Ok(borrower)
    }

    /// Extract, classify and record the income shown on an uploaded document.
    pub fn read_income_document(
        &self,
        borrower_id: &BorrowerId,
        document: &[u8],
    ) -> Result<IncomeIngestion, OriginationServiceError> {
        let mut borrower = self.get_borrower(borrower_id)?;
        let text = self.documents.extract(document)?;
        let extracted = self.documents.classify(&text)?;

        borrower.ingest_income_document(&extracted)?;
        self.store.put_borrower(borrower.clone())?;
        info!(
            borrower_id = %borrower_id,
            document_type = %extracted.document_type,
            total_income = %borrower.total_income(),
            "income document ingested"
        );

        self.refresh_owning_applications(borrower_id)?;
        Ok(IncomeIngestion {
            borrower,
            document_type: extracted.document_type,
        })
    }

    /// Extract and record credit scores and monthly obligations from a credit report.
    pub fn read_credit_report(
        &self,
        borrower_id: &BorrowerId,
        document: &[u8],
    ) -> Result<BorrowerProfile, OriginationServiceError> {
        let mut borrower = self.get_borrower(borrower_id)?;
        let text = self.documents.extract(document)?;
        let extracted = self.documents.extract_credit(&text)?;

        if extracted.is_blank() {
            return Err(
                FinanceError::Extraction("credit report yielded no values".to_string()).into(),
            );
        }
        borrower.ingest_credit_report(&extracted)?;
        self.store.put_borrower(borrower.clone())?;
        info!(
            borrower_id = %borrower_id,
            credit_score = borrower.credit_score,
            fico_score = borrower.fico_score,
            "credit report ingested"
        );

        self.refresh_owning_applications(borrower_id)?;
        Ok(borrower)
    }

    /// Ask the generator for a fresh narrative and store it on the application.
    pub fn generate_recommendation(
        &self,
        application_id: &ApplicationId,
    ) -> Result<LoanApplication, OriginationServiceError> {
        let mut application = self.get_application(application_id)?;
        let primary_id = application.primary_borrower_id().cloned().ok_or_else(|| {
            FinanceError::not_found("primary borrower", format!("of application {application_id}"))
        })?;
        let primary = self
            .load_borrower(&primary_id)?
            .ok_or_else(|| FinanceError::not_found("primary borrower", primary_id.to_string()))?;

        let request = build_request(&application, &primary)?;
        let narrative = self.documents.generate(&request.render_prompt())?;

        apply_response(&mut application, narrative);
        application.touch(Utc::now());
        self.store.put_application(application.clone())?;
        info!(application_id = %application_id, "recommendation stored");
        Ok(application)
    }

    pub fn recommendation(
        &self,
        application_id: &ApplicationId,
    ) -> Result<String, OriginationServiceError> {
        let application = self.get_application(application_id)?;
        let narrative = application
            .llm_recommendation()
            .map(str::to_string)
            .ok_or_else(|| FinanceError::not_found("recommendation", application_id.to_string()))?;
        Ok(narrative)
    }

    fn load_borrower(
        &self,
        borrower_id: &BorrowerId,
    ) -> Result<Option<BorrowerProfile>, OriginationServiceError> {
        Ok(self.store.fetch_borrower(borrower_id)?)
    }

    /// Membership changed: aggregate when the ratio is defined, otherwise clear the cached
    /// totals so income that left the application cannot back a recommendation. Persist either way.
    fn aggregate_and_store(
        &self,
        mut application: LoanApplication,
    ) -> Result<LoanApplication, OriginationServiceError> {
        match application.recompute_income_and_dti(|id| self.load_borrower(id)) {
            Ok(_) => {}
            Err(OriginationServiceError::Finance(FinanceError::UndefinedDti { context })) => {
                warn!(%context, "aggregates cleared: no income on file");
                application.clear_aggregates();
            }
            Err(other) => return Err(other),
        }
        application.touch(Utc::now());
        self.store.put_application(application.clone())?;
        Ok(application)
    }

    /// Re-aggregate every application that references the borrower.
    ///
    /// The borrower is already stored when this runs, so a domain failure on one application
    /// clears that application's totals and moves on; store failures still propagate.
    fn refresh_owning_applications(
        &self,
        borrower_id: &BorrowerId,
    ) -> Result<(), OriginationServiceError> {
        for mut application in self.store.find_applications_owning(borrower_id)? {
            match application.recompute_income_and_dti(|id| self.load_borrower(id)) {
                Ok(aggregate) => {
                    debug!(
                        application_id = %application.id,
                        dti = %aggregate.dti,
                        "application re-aggregated after borrower change"
                    );
                }
                Err(OriginationServiceError::Finance(err)) => {
                    warn!(
                        application_id = %application.id,
                        borrower_id = %borrower_id,
                        error = %err,
                        "application aggregates cleared after borrower change"
                    );
                    application.clear_aggregates();
                }
                Err(other) => return Err(other),
            }
            application.touch(Utc::now());
            self.store.put_application(application)?;
        }
        Ok(())
    }

    fn allocate_id<F>(&self, prefix: char, mut taken: F) -> Result<String, OriginationServiceError>
    where
        F: FnMut(&str) -> Result<bool, RepositoryError>,
    {
        let mut rng = rand::thread_rng();
        for _ in 0..self.config.id_attempts {
            let candidate = format!("{prefix}{}", rng.gen_range(10_000..100_000));
            if !taken(&candidate)? {
                return Ok(candidate);
            }
        }
        warn!(%prefix, attempts = self.config.id_attempts, "identifier space exhausted");
        Err(RepositoryError::Conflict.into())
    }
}

/// Error raised by the origination service.
#[derive(Debug, thiserror::Error)]
pub enum OriginationServiceError {
    #[error(transparent)]
    Finance(#[from] FinanceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
