use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::domain::ConformityVerdict;
use super::prompt::{parse_verdict, user_prompt, SYSTEM_PROMPT};
use super::rules::assess;
use super::ProductDescriptor;
use crate::ai::AiClient;
use crate::error::{within, ExternalService, ExternalServiceUnavailable};
use crate::invoices::{LineItem, NormalizeError};
use crate::records::StatutBio;

/// Tuning for the line classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Let decisive rule evidence skip the AI call.
    pub rule_shortcuts: bool,
    /// Caller-side ceiling for one analysis call.
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rule_shortcuts: true,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Reason an AI analysis produced no usable verdict.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Unavailable(#[from] ExternalServiceUnavailable),
    #[error("unusable analysis: {0}")]
    Unparseable(#[from] NormalizeError),
}

/// Rules first, AI second, neutral fallback last. Never fails per product.
pub struct ConformityClassifier<A> {
    ai: Arc<A>,
    config: ClassifierConfig,
}

impl<A> ConformityClassifier<A>
where
    A: AiClient + 'static,
{
    pub fn new(ai: Arc<A>, config: ClassifierConfig) -> Self {
        Self { ai, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub async fn classify(&self, descriptor: &ProductDescriptor) -> ConformityVerdict {
        if descriptor.product_name.trim().is_empty() && descriptor.description.is_none() {
            return ConformityVerdict::manual_review("Désignation du produit absente");
        }

        let assessment = assess(descriptor);
        if self.config.rule_shortcuts {
            if let Some(verdict) = assessment.decisive_verdict(descriptor) {
                debug!(
                    product = %descriptor.product_name,
                    status = verdict.status.label(),
                    "classified by rules"
                );
                return verdict;
            }
        }

        match self.analyze(descriptor, &assessment.prompt_hints()).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(
                    product = %descriptor.product_name,
                    error = %err,
                    "conformity analysis fell back to manual review"
                );
                let reason = match err {
                    AnalysisError::Unavailable(_) => {
                        "Service d'analyse temporairement indisponible"
                    }
                    AnalysisError::Unparseable(_) => "Analyse automatique inexploitable",
                };
                ConformityVerdict::manual_review(reason)
            }
        }
    }

    /// Run the AI-assisted analysis alone.
    pub async fn analyze(
        &self,
        descriptor: &ProductDescriptor,
        hints: &[String],
    ) -> Result<ConformityVerdict, AnalysisError> {
        let prompt = user_prompt(descriptor, hints);
        let text = within(
            ExternalService::Ai,
            self.config.timeout,
            self.ai.analyze_text(SYSTEM_PROMPT, &prompt),
        )
        .await?;
        Ok(parse_verdict(&text)?)
    }

    pub async fn classify_line(
        &self,
        line: &mut LineItem,
        supplier_name: Option<&str>,
        supplier_statut: Option<StatutBio>,
    ) {
        let descriptor = ProductDescriptor::from_line(line, supplier_name, supplier_statut);
        let verdict = self.classify(&descriptor).await;
        line.apply_verdict(verdict);
    }

    /// Classify every line; each line is independent of the others' failures.
    pub async fn classify_lines(
        &self,
        lines: &mut [LineItem],
        supplier_name: Option<&str>,
        supplier_statut: Option<StatutBio>,
    ) {
        for line in lines.iter_mut() {
            self.classify_line(line, supplier_name, supplier_statut)
                .await;
        }
    }
}
