use super::{ResolvedTemporal, TemporalTableDescriptor};
use crate::annotation::{AnnotationKey, AnnotationValue};
use crate::config::FinalizeConfig;
use crate::core::{ConfigurationSource, ModelError, Result, ValueGeneration};
use crate::finalize::{FinalizeContext, FinalizePass};
use crate::model::{Model, Property};
use log::debug;
use std::sync::Arc;

/// Resolves temporal configuration on hierarchy roots and propagates it to
/// derived types that carry a temporal annotation of their own.
pub struct TemporalConvention;

impl FinalizePass for TemporalConvention {
    fn name(&self) -> &'static str {
        "temporal-convention"
    }

    fn apply(&self, mut model: Model, context: &mut FinalizeContext<'_>) -> Result<Model> {
        for name in model.entity_names() {
            if !model.is_root(&name)? {
                continue;
            }

            let Some(annotation) = model
                .entity(&name)?
                .annotations()
                .annotation(&AnnotationKey::Temporal)
                .filter(|annotation| annotation.value.is_temporal())
                .cloned()
            else {
                continue;
            };

            let resolved = match &annotation.value {
                AnnotationValue::Temporal(TemporalTableDescriptor::Resolved(resolved)) => {
                    Arc::clone(resolved)
                }
                AnnotationValue::Temporal(TemporalTableDescriptor::Transient {
                    period_start,
                    period_end,
                    history_table,
                }) => resolve_root(
                    &mut model,
                    context.config(),
                    &name,
                    period_start,
                    period_end,
                    history_table.as_deref(),
                    false,
                )?,
                _ => {
                    let config = context.config();
                    let (start, end) = (
                        config.default_period_start.clone(),
                        config.default_period_end.clone(),
                    );
                    resolve_root(&mut model, config, &name, &start, &end, None, true)?
                }
            };

            if !annotation.value.as_temporal().is_some_and(TemporalTableDescriptor::is_resolved) {
                debug!("temporal table for '{}' resolved: {}", name, resolved);
                model.entity_mut(&name)?.annotations_mut().apply_finalized(
                    AnnotationKey::Temporal,
                    AnnotationValue::Temporal(TemporalTableDescriptor::Resolved(Arc::clone(
                        &resolved,
                    ))),
                    annotation.source,
                );
            }

            propagate(&model, context, &name, &resolved, annotation.source)?;
        }

        Ok(model)
    }
}

/// Maps the period properties of `root` to columns and forces them to be
/// store-generated. Marker roots get missing default period properties
/// added as required shadow properties.
fn resolve_root(
    model: &mut Model,
    config: &FinalizeConfig,
    root: &str,
    period_start: &str,
    period_end: &str,
    history_table: Option<&str>,
    add_missing: bool,
) -> Result<Arc<ResolvedTemporal>> {
    if period_start == period_end {
        return Err(ModelError::ConfigurationConflict(format!(
            "Temporal entity type '{}' uses '{}' as both period start and period end",
            root, period_start
        )));
    }

    let table = model
        .table_of(root)
        .ok_or_else(|| {
            ModelError::ConfigurationConflict(format!(
                "Temporal entity type '{}' is not mapped to a table",
                root
            ))
        })?
        .to_string();

    for property in [period_start, period_end] {
        if model.find_property(root, property)?.is_some() {
            continue;
        }
        if !add_missing {
            return Err(ModelError::MissingReference(format!(
                "Period property '{}' declared for temporal entity type '{}' does not exist",
                property, root
            )));
        }

        debug!("adding shadow period property '{}' to '{}'", property, root);
        let entity = model.entity_mut(root)?;
        entity.add_property(Property::new(property).required().shadow());
        entity.annotations_mut().set(
            AnnotationKey::ColumnName(property.to_string()),
            AnnotationValue::Text(property.to_string()),
            ConfigurationSource::Convention,
        );
    }

    for property in [period_start, period_end] {
        model.property_mut(root, property)?.value_generation = ValueGeneration::OnAddOrUpdate;
    }

    Ok(Arc::new(ResolvedTemporal {
        period_start_column: model.column_of(root, period_start)?,
        period_end_column: model.column_of(root, period_end)?,
        history_table: history_table.map_or_else(|| config.history_table_for(&table), str::to_string),
    }))
}

fn propagate(
    model: &Model,
    context: &mut FinalizeContext<'_>,
    root: &str,
    resolved: &Arc<ResolvedTemporal>,
    source: ConfigurationSource,
) -> Result<()> {
    for derived in model.derived_types(root)? {
        let annotations = model.entity(derived)?.annotations();
        let Some(value) = annotations.temporal() else {
            continue;
        };

        if context.config().strict_temporal_markers
            && let Some((start, end)) = value.as_temporal().and_then(|d| d.period_properties())
        {
            check_derived_periods(model, root, derived, resolved, start, end)?;
        }

        context.request(
            derived,
            AnnotationKey::Temporal,
            AnnotationValue::Temporal(TemporalTableDescriptor::Resolved(Arc::clone(resolved))),
            source,
        );
    }
    Ok(())
}

fn check_derived_periods(
    model: &Model,
    root: &str,
    derived: &str,
    resolved: &ResolvedTemporal,
    start: &str,
    end: &str,
) -> Result<()> {
    let matches = |property: &str, expected: &str| -> Result<bool> {
        match model.find_property(derived, property)? {
            Some((declaring, found)) => Ok(declaring.column_name(&found.name) == expected),
            None => Ok(false),
        }
    };

    if matches(start, &resolved.period_start_column)? && matches(end, &resolved.period_end_column)? {
        return Ok(());
    }

    Err(ModelError::ConfigurationConflict(format!(
        "Derived entity type '{}' declares period ({}, {}) but its root '{}' uses ({}, {})",
        derived, start, end, root, resolved.period_start_column, resolved.period_end_column
    )))
}

/// Hierarchies sharing one table must agree on temporal configuration:
/// either none of them is temporal or all resolve to the same descriptor.
pub struct SharedTableTemporalValidation;

impl FinalizePass for SharedTableTemporalValidation {
    fn name(&self) -> &'static str {
        "shared-table-temporal-validation"
    }

    fn apply(&self, model: Model, context: &mut FinalizeContext<'_>) -> Result<Model> {
        if !context.config().validate_shared_temporal {
            return Ok(model);
        }

        for group in model.grouping().groups() {
            let mut seen: Option<(&str, Option<&Arc<ResolvedTemporal>>)> = None;
            for root in &group.hierarchies {
                let resolved = model
                    .entity(root)?
                    .annotations()
                    .temporal_descriptor()
                    .and_then(TemporalTableDescriptor::resolved);

                match seen {
                    None => seen = Some((root.as_str(), resolved)),
                    Some((first, first_resolved)) if first_resolved != resolved => {
                        return Err(ModelError::ConfigurationConflict(format!(
                            "Table '{}' is shared by '{}' ({}) and '{}' ({}); all entity types mapped to a temporal table must be temporal with the same period and history table",
                            group.table,
                            first,
                            describe(first_resolved),
                            root,
                            describe(resolved)
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(model)
    }
}

fn describe(resolved: Option<&Arc<ResolvedTemporal>>) -> String {
    resolved.map_or_else(|| "not temporal".to_string(), |r| r.to_string())
}
