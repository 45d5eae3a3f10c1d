use crate::model::ModelDocuments;
use metrics_exporter_prometheus::PrometheusHandle;
use mortgage_ai::config::OriginationConfig;
use mortgage_ai::origination::{
    CreditExtraction, CreditExtractor, GatewayError, IncomeClassifier, IncomeExtraction,
    MemoryRecordStore, OriginationService, OriginationServiceError, RecommendationGenerator,
    RepositoryError, TextExtractor,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LocalService = OriginationService<MemoryRecordStore, DocumentBackend>;

/// In-memory service with the configured default owner already registered.
pub(crate) fn build_service(
    config: OriginationConfig,
    documents: DocumentBackend,
) -> Result<LocalService, OriginationServiceError> {
    let owner = config.default_owner.clone();
    let service = OriginationService::new(
        Arc::new(MemoryRecordStore::default()),
        Arc::new(documents),
        config,
    );
    match service.create_user(&owner, "Default owner") {
        Ok(_) | Err(OriginationServiceError::Repository(RepositoryError::Conflict)) => {}
        Err(err) => return Err(err),
    }
    Ok(service)
}

/// Document services selected at startup: the model endpoint when a key is configured.
pub(crate) enum DocumentBackend {
    Offline(OfflineDocuments),
    Model(ModelDocuments),
}

impl DocumentBackend {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            DocumentBackend::Offline(_) => "offline",
            DocumentBackend::Model(_) => "model",
        }
    }
}

impl TextExtractor for DocumentBackend {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError> {
        match self {
            DocumentBackend::Offline(documents) => documents.extract(document),
            DocumentBackend::Model(documents) => documents.extract(document),
        }
    }
}

impl IncomeClassifier for DocumentBackend {
    fn classify(&self, text: &str) -> Result<IncomeExtraction, GatewayError> {
        match self {
            DocumentBackend::Offline(documents) => documents.classify(text),
            DocumentBackend::Model(documents) => documents.classify(text),
        }
    }
}

impl CreditExtractor for DocumentBackend {
    fn extract_credit(&self, text: &str) -> Result<CreditExtraction, GatewayError> {
        match self {
            DocumentBackend::Offline(documents) => documents.extract_credit(text),
            DocumentBackend::Model(documents) => documents.extract_credit(text),
        }
    }
}

impl RecommendationGenerator for DocumentBackend {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        match self {
            DocumentBackend::Offline(documents) => documents.generate(prompt),
            DocumentBackend::Model(documents) => documents.generate(prompt),
        }
    }
}

/// Document services that need no model endpoint.
///
/// Uploaded documents are expected to carry the model's JSON answer as UTF-8 text, which keeps
/// local runs and demos deterministic. Recommendations come from fixed underwriting thresholds.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OfflineDocuments;

const QUALIFYING_DTI: Decimal = dec!(43);
const QUALIFYING_CREDIT_SCORE: u32 = 620;
const QUALIFYING_LTV: Decimal = dec!(97);

impl TextExtractor for OfflineDocuments {
    fn extract(&self, document: &[u8]) -> Result<String, GatewayError> {
        std::str::from_utf8(document)
            .map(str::to_string)
            .map_err(|err| GatewayError::MalformedResponse(format!("document is not text: {err}")))
    }
}

impl IncomeClassifier for OfflineDocuments {
    fn classify(&self, text: &str) -> Result<IncomeExtraction, GatewayError> {
        IncomeExtraction::from_model_output(text)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl CreditExtractor for OfflineDocuments {
    fn extract_credit(&self, text: &str) -> Result<CreditExtraction, GatewayError> {
        CreditExtraction::from_model_output(text)
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

impl RecommendationGenerator for OfflineDocuments {
    fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let credit_score = prompt_figure(prompt, "- Credit score: ")
            .and_then(|raw| raw.parse::<u32>().ok())
            .ok_or_else(|| {
                GatewayError::MalformedResponse("prompt carries no credit score".to_string())
            })?;
        let dti = prompt_figure(prompt, "- DTI: ")
            .and_then(|raw| raw.trim_end_matches('%').parse::<Decimal>().ok())
            .ok_or_else(|| GatewayError::MalformedResponse("prompt carries no DTI".to_string()))?;
        let ltv = prompt_figure(prompt, "- LTV: ")
            .and_then(|raw| raw.trim_end_matches('%').parse::<Decimal>().ok());

        let mut concerns = Vec::new();
        if dti > QUALIFYING_DTI {
            concerns.push(format!(
                "DTI of {dti}% is above the {QUALIFYING_DTI}% conventional ceiling; paying down \
                 revolving balances or adding a co-borrower would help"
            ));
        }
        if credit_score < QUALIFYING_CREDIT_SCORE {
            concerns.push(format!(
                "credit score {credit_score} is below the {QUALIFYING_CREDIT_SCORE} minimum; \
                 consider FHA programs or a rapid rescore"
            ));
        }
        if let Some(ltv) = ltv.filter(|ltv| *ltv > QUALIFYING_LTV) {
            concerns.push(format!(
                "LTV of {ltv}% exceeds {QUALIFYING_LTV}%; a larger down payment is needed"
            ));
        }

        if concerns.is_empty() {
            Ok(format!(
                "Pre-approval likely. Credit score {credit_score} and DTI {dti}% fit conforming \
                 guidelines; shop conventional fixed-rate programs with wholesale lenders."
            ))
        } else {
            Ok(format!("Pre-approval unlikely as submitted: {}.", concerns.join("; ")))
        }
    }
}

fn prompt_figure<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
        .filter(|raw| !raw.eq_ignore_ascii_case("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_reads_model_json() {
        let extraction = OfflineDocuments
            .classify(r#"{"document_type": "W-2", "yearly_income": "60000"}"#)
            .expect("valid answer");
        assert_eq!(extraction.document_type, "W-2");
        assert_eq!(
            extraction.yearly_income.amount("yearly_income"),
            Ok(Some(dec!(60000)))
        );
    }

    #[test]
    fn classifier_rejects_free_text() {
        assert!(matches!(
            OfflineDocuments.classify("EMPLOYEE W-2 WAGES 60,000"),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn extractor_rejects_binary_documents() {
        assert!(matches!(
            OfflineDocuments.extract(&[0xff, 0xd8, 0xff]),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn generator_flags_high_dti() {
        let prompt = "Borrower financials:\n- Credit score: 700\n- DTI: 48.50%\n- LTV: 80%\n";
        let narrative = OfflineDocuments.generate(prompt).expect("narrative");
        assert!(narrative.starts_with("Pre-approval unlikely"));
        assert!(narrative.contains("48.50%"));
    }

    #[test]
    fn generator_approves_conforming_profile() {
        let prompt = "- Credit score: 745\n- FICO score: Unknown\n- DTI: 30%\n- LTV: Unknown\n";
        let narrative = OfflineDocuments.generate(prompt).expect("narrative");
        assert!(narrative.starts_with("Pre-approval likely"));
    }

    #[test]
    fn generator_requires_core_figures() {
        assert!(OfflineDocuments.generate("- DTI: 30%").is_err());
    }

    #[test]
    fn build_service_registers_default_owner() {
        let service = build_service(
            OriginationConfig::default(),
            DocumentBackend::Offline(OfflineDocuments),
        )
        .expect("service builds");
        assert!(service.list_applications(None).expect("listing").is_empty());
    }
}
