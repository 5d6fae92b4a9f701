use crate::annotation::{AnnotationKey, AnnotationValue};
use crate::config::FinalizeConfig;
use crate::core::{ConfigurationSource, Result};
use crate::model::Model;

/// A configuration change a pass asks for on some entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRequest {
    pub entity: String,
    pub key: AnnotationKey,
    pub value: AnnotationValue,
    pub source: ConfigurationSource,
}

/// Per-pass context: the settings and a queue of configuration requests.
pub struct FinalizeContext<'a> {
    config: &'a FinalizeConfig,
    requests: Vec<ConfigurationRequest>,
}

impl<'a> FinalizeContext<'a> {
    pub fn new(config: &'a FinalizeConfig) -> Self {
        Self {
            config,
            requests: Vec::new(),
        }
    }

    pub fn config(&self) -> &FinalizeConfig {
        self.config
    }

    pub fn request(
        &mut self,
        entity: &str,
        key: AnnotationKey,
        value: AnnotationValue,
        source: ConfigurationSource,
    ) {
        self.requests.push(ConfigurationRequest {
            entity: entity.to_string(),
            key,
            value,
            source,
        });
    }

    pub fn requests(&self) -> &[ConfigurationRequest] {
        &self.requests
    }

    /// Applies queued requests in order. Finalization requests are
    /// authoritative: they replace the stored value but never weaken its
    /// source. Requests that would not change anything are skipped.
    pub fn apply_requests(&mut self, model: &mut Model) -> Result<usize> {
        let mut applied = 0;
        for request in self.requests.drain(..) {
            let annotations = model.entity_mut(&request.entity)?.annotations_mut();
            if annotations.get(&request.key) == Some(&request.value) {
                continue;
            }
            annotations.apply_finalized(request.key, request.value, request.source);
            applied += 1;
        }
        Ok(applied)
    }
}
