use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::application::LoanApplication;
use super::borrower::BorrowerProfile;
use super::domain::{ApplicationId, BorrowerId, UserAccount};

/// Borrower table, keyed by borrower id.
pub trait BorrowerRepository: Send + Sync {
    fn fetch_borrower(&self, id: &BorrowerId) -> Result<Option<BorrowerProfile>, RepositoryError>;
    fn put_borrower(&self, borrower: BorrowerProfile) -> Result<(), RepositoryError>;
}

/// Application table, keyed by application id.
pub trait ApplicationRepository: Send + Sync {
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError>;
    fn put_application(&self, application: LoanApplication) -> Result<(), RepositoryError>;
    fn scan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError>;

    /// Applications listing the borrower as primary or co-borrower.
    ///
    /// The default walks the whole table; stores with a borrower index should override it.
    fn find_applications_owning(
        &self,
        borrower_id: &BorrowerId,
    ) -> Result<Vec<LoanApplication>, RepositoryError> {
        Ok(self
            .scan_applications()?
            .into_iter()
            .filter(|application| application.involves(borrower_id))
            .collect())
    }
}

/// User table, keyed by username.
pub trait UserRepository: Send + Sync {
    fn fetch_user(&self, username: &str) -> Result<Option<UserAccount>, RepositoryError>;
    fn put_user(&self, user: UserAccount) -> Result<(), RepositoryError>;
}

/// Everything the origination service persists.
pub trait RecordStore: BorrowerRepository + ApplicationRepository + UserRepository {}

impl<T> RecordStore for T where T: BorrowerRepository + ApplicationRepository + UserRepository {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store; each put replaces one record atomically.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    borrowers: Arc<Mutex<HashMap<BorrowerId, BorrowerProfile>>>,
    applications: Arc<Mutex<BTreeMap<ApplicationId, LoanApplication>>>,
    users: Arc<Mutex<HashMap<String, UserAccount>>>,
}

fn lock<T>(table: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    table
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
}

impl BorrowerRepository for MemoryRecordStore {
    fn fetch_borrower(&self, id: &BorrowerId) -> Result<Option<BorrowerProfile>, RepositoryError> {
        Ok(lock(&self.borrowers)?.get(id).cloned())
    }

    fn put_borrower(&self, borrower: BorrowerProfile) -> Result<(), RepositoryError> {
        lock(&self.borrowers)?.insert(borrower.id.clone(), borrower);
        Ok(())
    }
}

impl ApplicationRepository for MemoryRecordStore {
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, RepositoryError> {
        Ok(lock(&self.applications)?.get(id).cloned())
    }

    fn put_application(&self, application: LoanApplication) -> Result<(), RepositoryError> {
        lock(&self.applications)?.insert(application.id.clone(), application);
        Ok(())
    }

    fn scan_applications(&self) -> Result<Vec<LoanApplication>, RepositoryError> {
        Ok(lock(&self.applications)?.values().cloned().collect())
    }
}

impl UserRepository for MemoryRecordStore {
    fn fetch_user(&self, username: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(lock(&self.users)?.get(username).cloned())
    }

    fn put_user(&self, user: UserAccount) -> Result<(), RepositoryError> {
        lock(&self.users)?.insert(user.username.clone(), user);
        Ok(())
    }
}
