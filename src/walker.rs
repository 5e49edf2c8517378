//! The startup pass over every object definition.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::binding::{discover_class, FieldBinder};
use crate::config::BinderSettings;
use crate::host::ObjectRegistry;
use crate::resolve::PlaceholderResolver;
use crate::Error;

/// Summary of a [`BindingProcessor::process_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Definitions looked at, not counting the processor's own.
    pub visited: usize,
    /// Property values rewritten by placeholder resolution.
    pub rewritten: usize,
    pub bound_objects: usize,
    pub bound_fields: usize,
    /// Definitions whose class could not be resolved.
    pub skipped: Vec<String>,
    /// Definitions that failed while `fail_fast` was off, with the error text.
    pub failed: Vec<(String, String)>,
}

/// Walks the host registry once at startup, resolving placeholder
/// properties and binding declared fields.
///
/// For each definition, properties are always rewritten before any field
/// of the object is bound. An unknown class only skips its definition. Any
/// other failure aborts the pass unless
/// [`fail_fast`](BinderSettings::fail_fast) is off, in which case it is
/// recorded and the pass moves on.
///
/// The pass is not re-entrant; run it to completion before handing objects
/// to the rest of the application.
#[derive(Debug, Clone)]
pub struct BindingProcessor {
    resolver: PlaceholderResolver,
    binder: FieldBinder,
    settings: BinderSettings,
}

impl BindingProcessor {
    /// Creates a processor that binds through `binder` with `settings`.
    pub fn new(binder: FieldBinder, settings: BinderSettings) -> Self {
        Self {
            resolver: binder.resolver().clone(),
            binder,
            settings,
        }
    }

    /// Returns the settings the pass runs with.
    pub fn settings(&self) -> &BinderSettings {
        &self.settings
    }

    /// Visits every definition in `registry` once. See the type docs for the
    /// failure policy.
    pub fn process_all<R>(&self, registry: &mut R) -> Result<ProcessReport, Error>
    where
        R: ObjectRegistry + ?Sized,
    {
        let started = Instant::now();
        let mut report = ProcessReport::default();

        for name in registry.definition_names() {
            if name == self.settings.self_name {
                debug!(definition = %name, "skipping own definition");
                continue;
            }
            if let Some(limit) = self.settings.pass_timeout() {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    return Err(Error::PassTimeout { elapsed, limit });
                }
            }
            report.visited += 1;

            match self.process_one(registry, &name, &mut report) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    error!(definition = %name, error = %err, "skipping definition");
                    report.skipped.push(name);
                }
                Err(err) if self.settings.fail_fast => return Err(err),
                Err(err) => {
                    warn!(definition = %name, error = %err, "definition left unbound");
                    report.failed.push((name, err.to_string()));
                }
            }
        }

        info!(
            visited = report.visited,
            rewritten = report.rewritten,
            objects = report.bound_objects,
            fields = report.bound_fields,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "config binding pass complete"
        );
        Ok(report)
    }

    fn process_one<R>(
        &self,
        registry: &mut R,
        name: &str,
        report: &mut ProcessReport,
    ) -> Result<(), Error>
    where
        R: ObjectRegistry + ?Sized,
    {
        let Some(definition) = registry.definition_mut(name) else {
            return Ok(());
        };

        report.rewritten += self
            .resolver
            .resolve_table(definition.properties_mut())
            .map_err(|source| Error::Resolve {
                definition: name.to_string(),
                source,
            })?;

        let Some(class_name) = definition.class_name().map(str::to_owned) else {
            return Ok(());
        };
        let class = registry
            .resolve_class(&class_name)
            .ok_or_else(|| Error::UnresolvableClass {
                definition: name.to_string(),
                class: class_name,
            })?;

        let descriptors = discover_class(&class);
        if descriptors.is_empty() {
            return Ok(());
        }

        let target = registry.instance(name)?;
        let fields = self
            .binder
            .bind(&target, &descriptors)
            .map_err(|source| Error::Bind {
                definition: name.to_string(),
                source,
            })?;

        report.bound_objects += 1;
        report.bound_fields += fields;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindError, Configurable};
    use crate::host::{Container, ObjectDefinition};
    use crate::refresh::RefreshRegistry;
    use crate::store::MemoryStore;
    use crate::LiveValue;
    use std::sync::Arc;

    #[derive(Default)]
    struct Database {
        host: LiveValue<String>,
        port: LiveValue<u16>,
    }

    crate::bindings! {
        Database {
            host => "db.host", live_update = true;
            port => "db.port", default = "5432";
        }
    }

    struct Client {
        url: String,
    }

    impl Configurable for Client {}

    fn processor(pairs: &[(&str, &str)], settings: BinderSettings) -> (BindingProcessor, Arc<RefreshRegistry>) {
        let store: MemoryStore = pairs.iter().copied().collect();
        let resolver = PlaceholderResolver::new(Arc::new(store));
        let refresh = Arc::new(RefreshRegistry::new(resolver.clone()));
        let binder = FieldBinder::new(resolver).with_refresh(Arc::clone(&refresh));
        (BindingProcessor::new(binder, settings), refresh)
    }

    fn container() -> Container {
        let mut container = Container::new();
        container
            .register_factory("app.Database", |_: &ObjectDefinition| Ok(Database::default()))
            .register_factory("app.Client", |d: &ObjectDefinition| {
                Ok(Client {
                    url: d.property_str("url").unwrap_or_default().to_string(),
                })
            })
            .add_definition(ObjectDefinition::new("database").with_class("app.Database"))
            .add_definition(
                ObjectDefinition::new("client")
                    .with_class("app.Client")
                    .with_property("url", "${client.url}")
                    .with_property("label", "literal"),
            );
        container
    }

    #[test]
    fn test_rewrites_properties_and_binds_fields() {
        let (processor, refresh) = processor(
            &[("db.host", "${env.host}"), ("env.host", "10.0.0.5"), ("client.url", "http://api")],
            BinderSettings::default(),
        );
        let mut container = container();

        let report = processor.process_all(&mut container).unwrap();

        assert_eq!(report.visited, 2);
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.bound_objects, 1);
        assert_eq!(report.bound_fields, 2);

        let db = container.get::<Database>("database").unwrap();
        assert_eq!(db.host.value(), "10.0.0.5");
        assert_eq!(*db.port.get(), 5432);
        assert_eq!(refresh.keys(), vec!["db.host".to_string()]);

        // plain objects are not constructed by the pass, but are built from
        // resolved properties afterwards
        assert!(container.get::<Client>("client").is_none());
        container.instance("client").unwrap();
        assert_eq!(container.get::<Client>("client").unwrap().url, "http://api");
    }

    #[test]
    fn test_unknown_class_is_skipped_and_pass_continues() {
        let (processor, _) = processor(&[("db.host", "h")], BinderSettings::default());
        let mut container = container();
        container.add_definition(ObjectDefinition::new("broken").with_class("app.Missing"));

        let report = processor.process_all(&mut container).unwrap();

        assert_eq!(report.skipped, vec!["broken".to_string()]);
        assert_eq!(report.bound_objects, 1);
        assert_eq!(container.get::<Database>("database").unwrap().host.value(), "h");
    }

    #[test]
    fn test_definitions_without_class_only_get_properties_resolved() {
        let (processor, _) = processor(&[("v", "resolved")], BinderSettings::default());
        let mut container = Container::new();
        container.add_definition(ObjectDefinition::new("anon").with_property("p", "${v}"));

        let report = processor.process_all(&mut container).unwrap();

        assert_eq!(report.rewritten, 1);
        assert_eq!(report.bound_objects, 0);
        assert_eq!(container.definition("anon").unwrap().property_str("p"), Some("resolved"));
    }

    #[test]
    fn test_escaped_properties_match_escaped_fields() {
        let (processor, _) = processor(
            &[("x", "$${lit}"), ("db.host", "${x}")],
            BinderSettings::default(),
        );
        let mut container = container();
        container.add_definition(
            ObjectDefinition::new("escaped")
                .with_property("p", "${x}")
                .with_property("q", "$${lit}"),
        );

        processor.process_all(&mut container).unwrap();

        let escaped = container.definition("escaped").unwrap();
        assert_eq!(escaped.property_str("p"), Some("${lit}"));
        assert_eq!(escaped.property_str("q"), Some("${lit}"));
        assert_eq!(container.get::<Database>("database").unwrap().host.value(), "${lit}");
    }

    #[test]
    fn test_own_definition_is_left_alone() {
        let (processor, _) = processor(&[("v", "resolved")], BinderSettings::default());
        let mut container = Container::new();
        container.add_definition(
            ObjectDefinition::new(BinderSettings::DEFAULT_SELF_NAME).with_property("p", "${v}"),
        );

        let report = processor.process_all(&mut container).unwrap();

        assert_eq!(report.visited, 0);
        assert_eq!(
            container
                .definition(BinderSettings::DEFAULT_SELF_NAME)
                .unwrap()
                .property_str("p"),
            Some("${v}")
        );
    }

    #[test]
    fn test_bind_failure_aborts_by_default() {
        let (processor, _) = processor(&[("db.port", "nope")], BinderSettings::default());
        let mut container = container();

        let err = processor.process_all(&mut container).unwrap_err();

        assert!(matches!(
            err,
            Error::Bind {
                source: BindError::Coerce { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_bind_failure_is_recorded_when_not_failing_fast() {
        let settings = BinderSettings {
            fail_fast: false,
            ..BinderSettings::default()
        };
        let (processor, _) = processor(&[("db.port", "nope"), ("client.url", "x")], settings);
        let mut container = container();

        let report = processor.process_all(&mut container).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "database");
        assert_eq!(report.visited, 2);
        assert_eq!(container.definition("client").unwrap().property_str("url"), Some("x"));
    }

    #[test]
    fn test_property_cycles_are_fatal() {
        let (processor, _) = processor(&[("a", "${b}"), ("b", "${a}")], BinderSettings::default());
        let mut container = Container::new();
        container.add_definition(ObjectDefinition::new("x").with_property("p", "${a}"));

        let err = processor.process_all(&mut container).unwrap_err();

        assert!(matches!(err, Error::Resolve { .. }));
    }

    struct Slow(Container);

    impl ObjectRegistry for Slow {
        fn definition_names(&self) -> Vec<String> {
            self.0.definition_names()
        }

        fn definition_mut(&mut self, name: &str) -> Option<&mut ObjectDefinition> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.0.definition_mut(name)
        }

        fn resolve_class(&self, class_name: &str) -> Option<crate::host::ClassDescriptor> {
            self.0.resolve_class(class_name)
        }

        fn instance(&mut self, name: &str) -> Result<crate::SharedObject, crate::HostError> {
            self.0.instance(name)
        }
    }

    #[test]
    fn test_pass_deadline_is_enforced_between_definitions() {
        let settings = BinderSettings {
            pass_timeout_ms: Some(5),
            ..BinderSettings::default()
        };
        let (processor, _) = processor(&[("client.url", "x")], settings);
        let mut registry = Slow(container());

        let err = processor.process_all(&mut registry).unwrap_err();

        assert!(matches!(err, Error::PassTimeout { .. }));
        // the first definition was processed before the deadline passed
        assert_eq!(registry.0.definition("client").unwrap().property_str("url"), Some("x"));
    }
}
