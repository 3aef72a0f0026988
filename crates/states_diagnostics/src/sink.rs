//! Collection point for the findings of one verification run.

use crate::diagnostic::Diagnostic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Collects diagnostics in emission order. Shareable across threads; the
/// error count is readable without taking the lock.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Records one finding.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    /// Whether an error has been recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Errors recorded so far, including drained ones.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Drains the recorded findings.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Copies the recorded findings.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    fn finding(category: Category) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::new(category, 1), "finding")
    }

    #[test]
    fn counts_only_errors() {
        let sink = DiagnosticSink::default();
        assert!(!sink.has_errors());
        sink.emit(finding(Category::Note));
        sink.emit(finding(Category::Warning));
        assert!(!sink.has_errors());
        sink.emit(finding(Category::Error));
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn draining_keeps_the_error_count() {
        let sink = DiagnosticSink::new();
        sink.emit(finding(Category::Error));
        sink.emit(finding(Category::Warning));
        let drained = sink.take_all();
        assert_eq!(drained[0].severity, crate::Severity::Error);
        assert_eq!(drained.len(), 2);
        assert!(sink.diagnostics().is_empty());
        assert!(sink.has_errors());
    }

    #[test]
    fn concurrent_emitters() {
        let sink = std::sync::Arc::new(DiagnosticSink::new());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let sink = std::sync::Arc::clone(&sink);
                std::thread::spawn(move || {
                    let category = if i % 2 == 0 { Category::Error } else { Category::Warning };
                    for _ in 0..25 {
                        sink.emit(finding(category));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(sink.error_count(), 50);
        assert_eq!(sink.take_all().len(), 100);
    }
}
