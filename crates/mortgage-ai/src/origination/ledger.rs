use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{non_negative, out_of_range};
use super::error::FinanceError;

/// Stable tag for one ledger entry; survives later appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncomeSourceId(pub u32);

/// Annualized income attributed to one document or declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeSource {
    pub id: IncomeSourceId,
    pub label: String,
    pub amount: Decimal,
}

/// Caller-supplied entry used when appending or replacing sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeEntry {
    pub label: String,
    pub amount: Decimal,
}

impl IncomeEntry {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }

    fn validated(self) -> Result<(String, Decimal), FinanceError> {
        let label = self.label.trim().to_string();
        if label.is_empty() {
            return Err(FinanceError::validation(
                "income_sources",
                "source label must not be empty",
            ));
        }
        let amount = non_negative("income_sources", self.amount)?;
        Ok((label, amount))
    }
}

/// Ordered income sources for one borrower. Order is append order only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeLedger {
    sources: Vec<IncomeSource>,
    #[serde(default)]
    next_id: u32,
}

impl IncomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[IncomeSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Mutations reject entries whose sum would leave the decimal range, so this never saturates
    /// for a ledger built through them.
    pub fn total(&self) -> Decimal {
        self.sources
            .iter()
            .fold(Decimal::ZERO, |total, source| total.saturating_add(source.amount))
    }

    pub fn add(&mut self, entry: IncomeEntry) -> Result<IncomeSourceId, FinanceError> {
        let (label, amount) = entry.validated()?;
        checked_sum(self.sources.iter().map(|source| source.amount).chain([amount]))?;
        Ok(self.push(label, amount))
    }

    /// Swap in a corrected full list. Nothing changes unless every entry is valid.
    pub fn replace_all(&mut self, entries: Vec<IncomeEntry>) -> Result<(), FinanceError> {
        let validated = entries
            .into_iter()
            .map(IncomeEntry::validated)
            .collect::<Result<Vec<_>, _>>()?;
        checked_sum(validated.iter().map(|(_, amount)| *amount))?;

        self.sources.clear();
        self.next_id = 0;
        for (label, amount) in validated {
            self.push(label, amount);
        }
        Ok(())
    }

    pub fn amend(&mut self, id: IncomeSourceId, entry: IncomeEntry) -> Result<(), FinanceError> {
        let (label, amount) = entry.validated()?;
        let index = self
            .sources
            .iter()
            .position(|source| source.id == id)
            .ok_or_else(|| FinanceError::not_found("income source", id.0.to_string()))?;
        checked_sum(self.sources.iter().enumerate().map(|(position, source)| {
            if position == index {
                amount
            } else {
                source.amount
            }
        }))?;

        let source = &mut self.sources[index];
        source.label = label;
        source.amount = amount;
        Ok(())
    }

    fn push(&mut self, label: String, amount: Decimal) -> IncomeSourceId {
        self.next_id += 1;
        let id = IncomeSourceId(self.next_id);
        self.sources.push(IncomeSource { id, label, amount });
        id
    }
}

fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, FinanceError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| out_of_range("income_sources"))
}
