//! Format registry: ordered handler list and dispatch.
//!
//! Handlers are kept sorted by descending priority; handlers with equal
//! priority stay in registration order. `identify` walks that order and picks
//! the first handler whose confidence is above the acceptance threshold.
//! `parse` never falls back to another handler once one has been chosen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, trace, warn};

use romscope_core::ByteSource;

use crate::handlers;
use crate::logging::instrument_parse;
use crate::traits::{Confidence, FormatHandler, ParseError, ParseOptions, ParsedFile, ProbeInfo};
use crate::{log_parse_complete, log_parse_error, log_parse_start};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No handler recognized the source")]
    NoMatch,

    #[error("Handler '{handler}' failed to parse the source: {source}")]
    ParseFailed {
        handler: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("Handler with ID '{0}' already registered")]
    DuplicateId(String),

    #[error("Failed to read probe: {0}")]
    Probe(#[source] ParseError),

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

struct Registration {
    handler: Arc<dyn FormatHandler>,
    priority: i32,
}

/// Handler information for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub extensions: Vec<&'static str>,
    pub priority: i32,
}

/// Result of a successful identification
#[derive(Clone)]
pub struct Identified<'r> {
    pub handler: &'r dyn FormatHandler,
    pub confidence: Confidence,
}

impl std::fmt::Debug for Identified<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identified")
            .field("handler", &self.handler.id())
            .field("confidence", &self.confidence)
            .finish()
    }
}

/// Ordered set of format handlers
///
/// Registration takes `&mut self`; once built, the registry is only read and
/// can be shared freely between threads.
#[derive(Default)]
pub struct FormatRegistry {
    handlers: Vec<Registration>,
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in handler
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        for (handler, priority) in handlers::builtin() {
            let id = handler.id();
            if let Err(e) = registry.register_arc(handler, priority) {
                warn!(handler = id, error = %e, "skipping built-in handler");
            }
        }
        registry
    }

    /// Register a handler. Higher priorities are tried first.
    pub fn register<H: FormatHandler + 'static>(
        &mut self,
        handler: H,
        priority: i32,
    ) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(handler), priority)
    }

    /// Register a shared handler
    pub fn register_arc(
        &mut self,
        handler: Arc<dyn FormatHandler>,
        priority: i32,
    ) -> Result<(), RegistryError> {
        let id = handler.id();
        if self.handlers.iter().any(|r| r.handler.id() == id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }

        // After every handler of equal or higher priority
        let position = self.handlers.partition_point(|r| r.priority >= priority);
        self.handlers.insert(position, Registration { handler, priority });
        debug!(handler = id, priority, position, "registered format handler");
        Ok(())
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Look up a handler by id
    pub fn get(&self, id: &str) -> Option<&dyn FormatHandler> {
        self.handlers
            .iter()
            .find(|r| r.handler.id() == id)
            .map(|r| r.handler.as_ref())
    }

    /// Handlers in dispatch order
    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.handlers
            .iter()
            .map(|r| HandlerInfo {
                id: r.handler.id(),
                name: r.handler.name(),
                description: r.handler.description(),
                extensions: r.handler.extensions().to_vec(),
                priority: r.priority,
            })
            .collect()
    }

    /// Pick a handler for an already-read probe
    pub fn identify_probe(&self, probe: &ProbeInfo) -> Option<Identified<'_>> {
        for registration in &self.handlers {
            let handler = registration.handler.as_ref();
            let confidence = handler.recognize(probe);
            trace!(handler = handler.id(), %confidence, "recognize");

            if confidence.is_accepted() {
                debug!(handler = handler.id(), %confidence, "handler selected");
                return Some(Identified {
                    handler,
                    confidence,
                });
            }
        }
        None
    }

    /// Read a probe from `source` and pick a handler
    pub fn identify(
        &self,
        source: &dyn ByteSource,
        options: &ParseOptions,
        extension: Option<&str>,
    ) -> Result<Option<Identified<'_>>, RegistryError> {
        let probe = ProbeInfo::read(source, options.probe_size)
            .map_err(RegistryError::Probe)?
            .with_extension(extension);
        Ok(self.identify_probe(&probe))
    }

    /// Identify, then parse with the chosen handler.
    ///
    /// A handler failure is reported as `ParseFailed`; no other handler is tried.
    pub fn parse(
        &self,
        source: &dyn ByteSource,
        options: &ParseOptions,
        extension: Option<&str>,
    ) -> Result<ParsedFile, RegistryError> {
        let identified = self
            .identify(source, options, extension)?
            .ok_or(RegistryError::NoMatch)?;
        let handler = identified.handler;

        log_parse_start!(handler.id(), source.len());
        let start = std::time::Instant::now();

        match instrument_parse(handler.id(), || handler.parse(source, options)) {
            Ok(parsed) => {
                log_parse_complete!(handler.id(), start.elapsed(), parsed.properties.len());
                Ok(parsed)
            }
            Err(error) => {
                log_parse_error!(handler.id(), error);
                Err(RegistryError::ParseFailed {
                    handler: handler.id(),
                    source: error,
                })
            }
        }
    }

    /// Open `path`, then identify and parse it using its extension as a hint
    pub fn parse_path(
        &self,
        path: impl AsRef<Path>,
        options: &ParseOptions,
    ) -> Result<ParsedFile, RegistryError> {
        let path = path.as_ref();
        let source = options.open(path).map_err(|source| RegistryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.parse(source.as_ref(), options, extension)
    }
}

/// Read-only registry of the built-in handlers, created on first use
pub static BUILTIN_REGISTRY: Lazy<FormatRegistry> = Lazy::new(FormatRegistry::with_builtin_handlers);

#[cfg(test)]
mod tests {
    use super::*;
    use romscope_core::MemorySource;

    /// Handler with a fixed confidence and parse outcome
    struct MockHandler {
        id: &'static str,
        confidence: u8,
        fail: bool,
    }

    impl FormatHandler for MockHandler {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            "Mock Handler"
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["mock"]
        }

        fn recognize(&self, _probe: &ProbeInfo) -> Confidence {
            Confidence::new(self.confidence)
        }

        fn parse(&self, _source: &dyn ByteSource, _options: &ParseOptions) -> crate::ParseResult<ParsedFile> {
            if self.fail {
                return Err(ParseError::InvalidStructure("mock failure".to_string()));
            }
            let mut parsed = ParsedFile::new(self.id);
            parsed.properties.set("handler", self.id);
            Ok(parsed)
        }
    }

    fn mock(id: &'static str, confidence: u8, fail: bool) -> MockHandler {
        MockHandler { id, confidence, fail }
    }

    #[test]
    fn test_priority_then_registration_order() {
        let mut registry = FormatRegistry::new();
        registry.register(mock("low", 90, false), 1).unwrap();
        registry.register(mock("first", 90, false), 10).unwrap();
        registry.register(mock("second", 90, false), 10).unwrap();

        let order: Vec<_> = registry.handlers().iter().map(|h| h.id).collect();
        assert_eq!(order, vec!["first", "second", "low"]);

        let probe = ProbeInfo::new(vec![0u8; 4], 4);
        assert_eq!(registry.identify_probe(&probe).unwrap().handler.id(), "first");
    }

    #[test]
    fn test_threshold_skips_unconfident_handlers() {
        let mut registry = FormatRegistry::new();
        registry.register(mock("exactly-threshold", 50, false), 10).unwrap();
        registry.register(mock("confident", 51, false), 0).unwrap();

        let probe = ProbeInfo::new(Vec::new(), 0);
        let identified = registry.identify_probe(&probe).unwrap();
        assert_eq!(identified.handler.id(), "confident");
        assert_eq!(identified.confidence.value(), 51);
    }

    #[test]
    fn test_no_fallback_after_parse_failure() {
        let mut registry = FormatRegistry::new();
        registry.register(mock("broken", 80, true), 10).unwrap();
        registry.register(mock("working", 80, false), 0).unwrap();

        let source = MemorySource::new(vec![0u8; 16]);
        match registry.parse(&source, &ParseOptions::default(), None) {
            Err(RegistryError::ParseFailed { handler, .. }) => assert_eq!(handler, "broken"),
            other => panic!("expected ParseFailed, got {:?}", other.map(|p| p.format)),
        }
    }

    #[test]
    fn test_no_match() {
        let mut registry = FormatRegistry::new();
        registry.register(mock("never", 10, false), 0).unwrap();

        let source = MemorySource::new(vec![0u8; 16]);
        assert!(matches!(
            registry.parse(&source, &ParseOptions::default(), None),
            Err(RegistryError::NoMatch)
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = FormatRegistry::new();
        registry.register(mock("dup", 80, false), 0).unwrap();
        assert!(matches!(
            registry.register(mock("dup", 80, false), 5),
            Err(RegistryError::DuplicateId(id)) if id == "dup"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtin_registry() {
        let ids: Vec<_> = BUILTIN_REGISTRY.handlers().iter().map(|h| h.id).collect();
        assert!(ids.contains(&"didj-tex"));
        assert!(ids.contains(&"snes"));
        assert!(ids.contains(&"dds"));
        assert!(BUILTIN_REGISTRY.get("snes").is_some());
    }
}
