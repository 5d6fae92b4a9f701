use super::{Annotation, AnnotationKey, AnnotationValue};
use crate::core::ConfigurationSource;
use crate::temporal::TemporalTableDescriptor;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationStore {
    entries: IndexMap<AnnotationKey, Annotation>,
    /// Keys removed since the last convention pass; conventions re-derive them.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    rederive: IndexSet<AnnotationKey>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` unless a stronger source already owns `key`.
    ///
    /// Returns whether the write took effect.
    pub fn set(
        &mut self,
        key: AnnotationKey,
        value: AnnotationValue,
        source: ConfigurationSource,
    ) -> bool {
        let existing = self.source(&key);
        if !source.overrides(existing) {
            debug!(
                "annotation write rejected: key='{}' source='{}' existing='{}'",
                key,
                source,
                existing.map_or_else(String::new, |s| s.to_string())
            );
            return false;
        }

        self.rederive.shift_remove(&key);
        self.entries.insert(key, Annotation::new(value, source));
        true
    }

    /// Write issued by a finalization pass. Always applied; the stored source
    /// never weakens.
    pub fn apply_finalized(
        &mut self,
        key: AnnotationKey,
        value: AnnotationValue,
        source: ConfigurationSource,
    ) {
        let source = source.strongest(self.source(&key));
        self.rederive.shift_remove(&key);
        self.entries.insert(key, Annotation::new(value, source));
    }

    pub fn get(&self, key: &AnnotationKey) -> Option<&AnnotationValue> {
        self.entries.get(key).map(|annotation| &annotation.value)
    }

    pub fn annotation(&self, key: &AnnotationKey) -> Option<&Annotation> {
        self.entries.get(key)
    }

    pub fn source(&self, key: &AnnotationKey) -> Option<ConfigurationSource> {
        self.entries.get(key).map(|annotation| annotation.source)
    }

    pub fn contains(&self, key: &AnnotationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Clears `key` regardless of its source and marks it for re-derivation.
    pub fn remove(&mut self, key: &AnnotationKey) -> Option<Annotation> {
        let removed = self.entries.shift_remove(key);
        self.rederive.insert(key.clone());
        removed
    }

    /// Whether `key` was removed and has not been written since.
    pub fn needs_rederive(&self, key: &AnnotationKey) -> bool {
        self.rederive.contains(key)
    }

    pub fn take_rederive(&mut self, key: &AnnotationKey) -> bool {
        self.rederive.shift_remove(key)
    }

    /// Applies every annotation of `other` through the precedence rule.
    /// Returns how many writes took effect.
    pub fn merge(&mut self, other: &AnnotationStore) -> usize {
        other
            .iter()
            .filter(|(key, annotation)| {
                self.set(
                    (*key).clone(),
                    annotation.value.clone(),
                    annotation.source,
                )
            })
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnnotationKey, &Annotation)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    //
    // typed accessors
    //

    pub fn table_name(&self) -> Option<&str> {
        self.get(&AnnotationKey::TableName)
            .and_then(AnnotationValue::as_text)
    }

    pub fn column_name(&self, property: &str) -> Option<&str> {
        self.get(&AnnotationKey::ColumnName(property.to_string()))
            .and_then(AnnotationValue::as_text)
    }

    pub fn temporal(&self) -> Option<&AnnotationValue> {
        self.get(&AnnotationKey::Temporal)
            .filter(|value| value.is_temporal())
    }

    pub fn temporal_descriptor(&self) -> Option<&TemporalTableDescriptor> {
        self.temporal().and_then(AnnotationValue::as_temporal)
    }

    pub fn is_memory_optimized(&self) -> bool {
        self.get(&AnnotationKey::MemoryOptimized)
            .and_then(AnnotationValue::as_flag)
            .unwrap_or(false)
    }
}
