//! One test per (model, capability) pair in the catalog.

use std::collections::BTreeSet;

use super::{Runner, TestResult};
use crate::{
    catalog::{Capability, CatalogExtraction, ModelEntry},
    client::{ApiRequest, Endpoint},
    synth::{Payload, apply_model_overrides, synthesize},
    validate::validate_for,
};

/// Capabilities in the order they are tested: known tags first, then any
/// unknown tags alphabetically.
fn capability_order(catalog: &CatalogExtraction) -> Vec<Capability> {
    let unknown: BTreeSet<Capability> = catalog
        .entries
        .iter()
        .flat_map(|e| e.capability.iter())
        .filter(|c| !c.is_known())
        .cloned()
        .collect();
    Capability::KNOWN.into_iter().chain(unknown).collect()
}

impl Runner<'_> {
    /// Test every catalog model for each of its capabilities.
    ///
    /// With `model_filter`, only that model is tested.
    pub async fn run_catalog_tests(
        &self,
        catalog: &CatalogExtraction,
        model_filter: Option<&str>,
    ) -> Vec<TestResult> {
        let mut results = Vec::new();

        for capability in capability_order(catalog) {
            let models: Vec<&ModelEntry> = catalog
                .entries
                .iter()
                .filter(|e| e.has_capability(&capability))
                .filter(|e| model_filter.is_none_or(|m| e.name == m))
                .collect();
            if models.is_empty() {
                continue;
            }

            tracing::info!(capability = %capability, models = models.len(), "Testing capability");
            if self.trace {
                crate::report::print_group_header(capability.as_str(), models.len());
            }

            for model in models {
                let result = self.run_model_test(model, &capability).await;
                self.record(result, &mut results);
            }
        }

        results
    }

    async fn run_model_test(&self, model: &ModelEntry, capability: &Capability) -> TestResult {
        let tag = capability.as_str();
        let payload = apply_model_overrides(&model.name, capability, synthesize(capability));

        let payload = match payload {
            Payload::Deferred(input) => match self.audio.resolve(&input).await {
                Ok(resolved) => resolved,
                Err(e) => return TestResult::failed(&model.name, tag, None, e.to_string()),
            },
            other => other,
        };

        let endpoint = Endpoint::for_capability(capability);
        let (request, sent_body) = match payload {
            Payload::Json(body) => (ApiRequest::json(endpoint, body.clone()), Some(body)),
            Payload::Multipart(form) => (ApiRequest::multipart(endpoint, form), None),
            Payload::Skip(reason) => {
                tracing::info!(model = %model.name, capability = %tag, reason = %reason, "Skipping test");
                return TestResult::skipped(&model.name, tag, reason);
            }
            Payload::Deferred(_) => {
                return TestResult::failed(&model.name, tag, None, "Input could not be resolved");
            }
        };
        let request = request.with_image_input(
            model.has_capability(&Capability::Vision)
                || model.has_capability(&Capability::ImageClassification),
        );

        self.execute(&model.name, tag, capability, &request, |body| {
            validate_for(capability, sent_body.as_ref(), body)
        })
        .await
    }
}
