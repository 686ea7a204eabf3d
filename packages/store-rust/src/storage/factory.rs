//! Factory for fully-wired [`RecordService`] instances.
//!
//! [`StoreFactory`] is the single place a record service is assembled: it
//! builds the validator for the configured rule set, opens the configured
//! backend, then wraps it in the metering and logging wrappers the
//! configuration asks for. The resulting service is handed to the caller
//! explicitly.

use std::sync::Arc;

use cabinet_core::{RecordValidator, ValidationRules};
use tracing::info;

use crate::config::{BackendKind, StoreConfig};
use crate::storage::engines::{FileRecordStore, MemoryRecordStore};
use crate::storage::error::StoreError;
use crate::storage::middleware::{LoggingService, MeteredService};
use crate::storage::record_store::RecordService;

/// Builds record services from a [`StoreConfig`].
pub struct StoreFactory {
    config: StoreConfig,
    rules: ValidationRules,
}

impl StoreFactory {
    #[must_use]
    pub fn new(config: StoreConfig, rules: ValidationRules) -> Self {
        Self { config, rules }
    }

    /// Creates a factory using the rules shipped with `cabinet-core`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rules`] if the built-in rule file is invalid.
    pub fn with_builtin_rules(config: StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config, ValidationRules::builtin()?))
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Builds the validator for the configured rule set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rules`] if the rule set is inconsistent.
    pub fn validator(&self) -> Result<Arc<dyn RecordValidator>, StoreError> {
        let validator = self.rules.get(self.config.rule_set).validator()?;
        Ok(Arc::new(validator))
    }

    /// Builds the configured service. The logging wrapper, if enabled, is
    /// the outermost layer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rules`] for inconsistent rules, or the error
    /// from opening the backing file.
    pub fn build(&self) -> Result<Box<dyn RecordService>, StoreError> {
        let validator = self.validator()?;
        let mut service: Box<dyn RecordService> = match &self.config.backend {
            BackendKind::Memory => Box::new(MemoryRecordStore::new(validator)),
            BackendKind::File { path } => Box::new(FileRecordStore::open(path, validator)?),
        };
        if self.config.use_stopwatch {
            service = Box::new(MeteredService::new(service));
        }
        if self.config.use_logger {
            service = Box::new(LoggingService::new(service));
        }
        info!(
            backend = self.config.backend.name(),
            rule_set = ?self.config.rule_set,
            stopwatch = self.config.use_stopwatch,
            logger = self.config.use_logger,
            "record service ready"
        );
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use cabinet_core::RuleSetKind;
    use tempfile::TempDir;

    use super::*;
    use crate::storage::testing::{fields, CapturedLog};

    fn config(backend: BackendKind) -> StoreConfig {
        StoreConfig {
            backend,
            ..StoreConfig::default()
        }
    }

    #[test]
    fn builds_memory_backend() {
        let factory = StoreFactory::with_builtin_rules(StoreConfig::default()).unwrap();
        let mut service = factory.build().unwrap();
        assert_eq!(service.create(fields("Ann", "Lee")).unwrap(), 1);
        assert!(matches!(
            service.compact(),
            Err(StoreError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn builds_file_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.db");
        let factory =
            StoreFactory::with_builtin_rules(config(BackendKind::File { path: path.clone() })).unwrap();
        {
            let mut service = factory.build().unwrap();
            service.create(fields("Ann", "Lee")).unwrap();
            service.create(fields("Bob", "Lee")).unwrap();
            service.delete(1).unwrap();
            assert_eq!(service.compact().unwrap(), 1);
        }
        assert!(path.exists());
        let service = factory.build().unwrap();
        assert_eq!(service.find_by_first_name("bob").len(), 1);
    }

    #[test]
    fn rule_set_selects_validator() {
        let long_name = "A".repeat(50);
        let mut default_store = StoreFactory::with_builtin_rules(StoreConfig::default())
            .unwrap()
            .build()
            .unwrap();
        assert!(default_store.create(fields(&long_name, "Lee")).is_ok());

        let custom = StoreConfig {
            rule_set: RuleSetKind::Custom,
            ..StoreConfig::default()
        };
        let mut custom_store = StoreFactory::with_builtin_rules(custom).unwrap().build().unwrap();
        assert!(matches!(
            custom_store.create(fields(&long_name, "Lee")),
            Err(StoreError::InvalidField { .. })
        ));
    }

    #[test]
    fn wrappers_are_applied_when_enabled() {
        let log = CapturedLog::default();
        let config = StoreConfig {
            use_stopwatch: true,
            use_logger: true,
            ..StoreConfig::default()
        };
        tracing::subscriber::with_default(log.subscriber(), || {
            let mut service = StoreFactory::with_builtin_rules(config).unwrap().build().unwrap();
            service.create(fields("Ann", "Lee")).unwrap();
        });
        let text = log.text();
        assert!(text.contains("record service ready"), "{text}");
        assert!(text.contains("operation complete"), "{text}");
        assert!(text.contains("call returned"), "{text}");
    }
}
