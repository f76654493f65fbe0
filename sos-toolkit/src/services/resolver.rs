//! Expanding declared services into sub-contexts, dependencies first.

use super::ServiceSource;
use crate::config::{merge_all, merge_into, take_key, ContextGenerator};
use crate::errors::{ConfigurationError, CycleDetectedError, SosResult};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::{debug, info, info_span};

/// The `service` section of each layer, extracted before merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceLayers {
    /// Declares which services the system runs.
    pub system: Value,
    /// Per-service overrides.
    pub local: Value,
    /// Per-service overrides.
    pub user: Value,
    /// Per-service overrides.
    pub root: Value,
    /// Declarations added at generation time.
    pub runtime: Value,
}

impl ServiceLayers {
    /// Returns true if no layer declares anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.system, &self.local, &self.user, &self.root, &self.runtime]
            .into_iter()
            .all(is_vacant)
    }
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Resolves services through a generator and a definition source.
pub struct ServiceResolver<'g, 's> {
    generator: &'g ContextGenerator<'g>,
    source: &'s dyn ServiceSource,
}

impl<'g, 's> ServiceResolver<'g, 's> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(generator: &'g ContextGenerator<'g>, source: &'s dyn ServiceSource) -> Self {
        Self { generator, source }
    }

    /// Resolves the declared services into a map of sub-context trees,
    /// ordered so that every service follows its dependencies.
    ///
    /// A declaration of `false` skips the service and `true` or `null`
    /// declares it without overrides. A service whose dependencies are not
    /// resolved yet goes back to the end of the queue; when a full pass
    /// over the queue makes no progress the remaining services form a
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetectedError` for circular dependencies and
    /// propagates lookup and generation failures.
    pub fn resolve(
        &self,
        platform: &str,
        layers: ServiceLayers,
        ignore_version: bool,
    ) -> SosResult<Map<String, Value>> {
        let _span = info_span!("resolve_services", platform).entered();

        let declared = merge_all([layers.system, layers.runtime]);
        let mut queue: VecDeque<(String, Value)> = match declared {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => VecDeque::new(),
            other => {
                return Err(ConfigurationError::new(format!(
                    "service section must be a map, found {other}"
                ))
                .into())
            }
        };

        let mut output = Map::new();
        let mut stalled = 0usize;

        while let Some((key, declaration)) = queue.pop_front() {
            let overrides = match &declaration {
                Value::Bool(false) => {
                    debug!(service = %key, "service disabled");
                    stalled = 0;
                    continue;
                }
                Value::Bool(true) | Value::Null => Value::Object(Map::new()),
                Value::Object(_) => declaration.clone(),
                other => {
                    return Err(ConfigurationError::new(format!(
                        "service {key} must be declared with a bool or a map, found {other}"
                    ))
                    .into())
                }
            };
            if output.contains_key(&key) {
                stalled = 0;
                continue;
            }

            let definition = self.source.locate(&key, platform)?;
            let mut service = self
                .generator
                .service_context(&definition, platform, ignore_version)?;
            for layer in [&layers.root, &layers.user] {
                if let Some(over) = layer.get(&key).filter(|v| v.is_object()) {
                    merge_into(&mut service, over.clone());
                }
            }
            merge_into(&mut service, overrides);
            if let Some(over) = layers.local.get(&key).filter(|v| v.is_object()) {
                merge_into(&mut service, over.clone());
            }

            let mut pending = false;
            let mut enqueued = false;
            if let Value::Object(dependencies) = take_key(&mut service, "service") {
                for (dependency, dep_declaration) in dependencies {
                    if dep_declaration == Value::Bool(false) || output.contains_key(&dependency) {
                        continue;
                    }
                    pending = true;
                    if dependency != key && !queue.iter().any(|(queued, _)| *queued == dependency) {
                        debug!(service = %key, dependency = %dependency, "queueing dependency");
                        queue.push_back((dependency, dep_declaration));
                        enqueued = true;
                    }
                }
            }
            if let Value::Object(map) = &mut service {
                map.insert("service".to_string(), Value::Object(Map::new()));
            }

            if !pending {
                info!(service = %key, platform = %definition.platform, "service resolved");
                output.insert(key, service);
                stalled = 0;
                continue;
            }

            stalled = if enqueued { 0 } else { stalled + 1 };
            if stalled > queue.len() {
                let mut stuck: Vec<String> = queue.into_iter().map(|(k, _)| k).collect();
                stuck.push(key);
                return Err(CycleDetectedError::new(stuck).into());
            }
            debug!(service = %key, "dependencies pending, requeued");
            queue.push_back((key, declaration));
        }

        Ok(output)
    }
}
