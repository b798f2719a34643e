//! Non-fatal conversion warnings collected during a write.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why an annotation value was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The value has no property representation (e.g. a mixed-type list).
    UnsupportedAnnotationType,
    /// Physical quantities are not stored in annotations.
    QuantityInAnnotation,
    /// Lists of lists are not stored.
    NestedSequence,
    /// An empty list has no element type.
    EmptySequence,
    /// The key is used by the mapping itself.
    ReservedKey,
    /// An unsigned value does not fit a signed 64-bit integer.
    IntegerOutOfRange,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnsupportedAnnotationType => "unsupported annotation type",
            Self::QuantityInAnnotation => "quantity values are not supported in annotations",
            Self::NestedSequence => "nested sequences are not supported",
            Self::EmptySequence => "empty sequences are not stored",
            Self::ReservedKey => "key is reserved",
            Self::IntegerOutOfRange => "integer out of range",
        };
        f.write_str(s)
    }
}

/// One dropped value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Path of the entity the value belonged to.
    pub path: String,
    /// Annotation key.
    pub key: String,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: annotation {:?} dropped: {}", self.path, self.key, self.kind)
    }
}

/// A successful result plus the warnings produced on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// Whether nothing was dropped.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}

/// Collects diagnostics for the current write call.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// Record and log one dropped value.
    pub fn report(&mut self, path: &str, key: &str, kind: DiagnosticKind) {
        warn!(path, key, %kind, "annotation value dropped");
        self.entries.push(Diagnostic {
            path: path.to_string(),
            key: key.to_string(),
            kind,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain everything reported so far.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_drains() {
        let mut sink = DiagnosticSink::default();
        sink.report("/b", "q", DiagnosticKind::QuantityInAnnotation);
        assert_eq!(sink.len(), 1);
        let taken = sink.take();
        assert_eq!(taken[0].key, "q");
        assert!(sink.is_empty());
    }

    #[test]
    fn outcome_map_keeps_diagnostics() {
        let diag = Diagnostic {
            path: "/b".into(),
            key: "k".into(),
            kind: DiagnosticKind::EmptySequence,
        };
        let outcome = Outcome::new(2, vec![diag]).map(|v| v * 10);
        assert_eq!(outcome.value, 20);
        assert!(!outcome.is_clean());
    }

    #[test]
    fn display_names_path_and_key() {
        let diag = Diagnostic {
            path: "/b/segments/s".into(),
            key: "gain".into(),
            kind: DiagnosticKind::NestedSequence,
        };
        let text = diag.to_string();
        assert!(text.starts_with("/b/segments/s"));
        assert!(text.contains("\"gain\""));
    }
}
