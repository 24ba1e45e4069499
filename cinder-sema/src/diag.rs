use crate::error::SemanticError;

/// The receiver of the diagnostics a pass produces.
///
/// Passes batch their findings through this single method rather than
/// returning early, so one run reports every problem it can find.
pub trait DiagnosticConsumer {
    fn consume(&mut self, diagnostic: SemanticError);
}

impl DiagnosticConsumer for Vec<SemanticError> {
    fn consume(&mut self, diagnostic: SemanticError) {
        self.push(diagnostic);
    }
}

/// A consumer that collects diagnostics for later inspection.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<SemanticError>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[SemanticError] {
        &self.diagnostics
    }

    pub fn into_inner(self) -> Vec<SemanticError> {
        self.diagnostics
    }

    /// The number of collected diagnostics whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.message.contains(needle))
            .count()
    }
}

impl DiagnosticConsumer for DiagnosticBag {
    fn consume(&mut self, diagnostic: SemanticError) {
        self.diagnostics.push(diagnostic);
    }
}
