//! Out-of-band diagnostics
//!
//! Template problems that cannot be expressed as a type error in the
//! generated code. Recording a diagnostic never aborts generation; the
//! offending expression is degraded instead so it cannot cascade.

use indexmap::IndexSet;

use crate::parse_util::TextRange;
use crate::template::ast::{TmplAstLetDeclaration, TmplAstReference, TmplAstVariable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnresolvedPipe,
    DuplicateTemplateVar,
    ConflictingDeclaration,
    IllegalWriteToLetDeclaration,
    LetUsedBeforeDefinition,
    IllegalForLoopTrackAccess,
    SplitTwoWayBinding,
    DeferredComponentUsedEagerly,
    DeferredPipeUsedEagerly,
    MissingReferenceTarget,
    ControlFlowPreventingContentProjection,
    SuboptimalTypeInference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub range: TextRange,
    pub message: String,
    pub category: DiagnosticCategory,
}

/// Accumulates out-of-band diagnostics during a generation pass.
///
/// Ranges are recorded in host file coordinates; expression-local spans are
/// shifted by the active mapping offset before they reach the recorder.
///
/// Identical diagnostics (same kind, range and message) are recorded once,
/// since re-emission of an already-checked expression may revisit a node.
#[derive(Debug, Default)]
pub struct OutOfBandDiagnosticRecorder {
    diagnostics: IndexSet<Diagnostic>,
}

impl OutOfBandDiagnosticRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_iter().collect()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    fn record(
        &mut self,
        kind: DiagnosticKind,
        range: TextRange,
        message: String,
        category: DiagnosticCategory,
    ) {
        self.diagnostics.insert(Diagnostic { kind, range, message, category });
    }

    pub fn missing_pipe(&mut self, name: &str, name_span: TextRange) {
        self.record(
            DiagnosticKind::UnresolvedPipe,
            name_span,
            format!("No pipe found with name '{name}'."),
            DiagnosticCategory::Error,
        );
    }

    pub fn duplicate_template_var(
        &mut self,
        variable: &TmplAstVariable,
        first_decl: &TmplAstVariable,
    ) {
        self.record(
            DiagnosticKind::DuplicateTemplateVar,
            variable.key_span,
            format!(
                "Cannot redeclare variable '{}' as it was previously declared elsewhere for the same template.",
                first_decl.name
            ),
            DiagnosticCategory::Error,
        );
    }

    pub fn conflicting_declaration(&mut self, decl: &TmplAstLetDeclaration) {
        self.record(
            DiagnosticKind::ConflictingDeclaration,
            decl.source_span,
            format!("Cannot declare @let called '{}' as there is another symbol in the template with the same name.", decl.name),
            DiagnosticCategory::Error,
        );
    }

    pub fn illegal_write_to_let_declaration(&mut self, write_span: TextRange, decl_name: &str) {
        self.record(
            DiagnosticKind::IllegalWriteToLetDeclaration,
            write_span,
            format!("Cannot assign to @let declaration '{decl_name}'."),
            DiagnosticCategory::Error,
        );
    }

    pub fn let_used_before_definition(&mut self, use_span: TextRange, decl_name: &str) {
        self.record(
            DiagnosticKind::LetUsedBeforeDefinition,
            use_span,
            format!("Cannot read @let declaration '{decl_name}' before it has been defined."),
            DiagnosticCategory::Error,
        );
    }

    pub fn illegal_for_loop_track_access(&mut self, access_span: TextRange, name: &str) {
        self.record(
            DiagnosticKind::IllegalForLoopTrackAccess,
            access_span,
            format!(
                "Cannot access '{name}' inside of a track expression. Only the item, $index and properties on the containing component are available to this expression."
            ),
            DiagnosticCategory::Error,
        );
    }

    pub fn split_two_way_binding(
        &mut self,
        input_name: &str,
        input_span: TextRange,
        output_consumer: &str,
    ) {
        self.record(
            DiagnosticKind::SplitTwoWayBinding,
            input_span,
            format!(
                "The property and event halves of the two-way binding '{input_name}' are not bound to the same target. Found '{output_consumer}' for the event half."
            ),
            DiagnosticCategory::Error,
        );
    }

    pub fn deferred_component_used_eagerly(&mut self, span: TextRange, tag: &str) {
        self.record(
            DiagnosticKind::DeferredComponentUsedEagerly,
            span,
            format!("Element '{tag}' contains a component or a directive that was marked as deferred, but the element is used outside of a @defer block."),
            DiagnosticCategory::Error,
        );
    }

    pub fn deferred_pipe_used_eagerly(&mut self, span: TextRange, pipe_name: &str) {
        self.record(
            DiagnosticKind::DeferredPipeUsedEagerly,
            span,
            format!("Pipe '{pipe_name}' was marked as deferred, but it is used outside of a @defer block."),
            DiagnosticCategory::Error,
        );
    }

    pub fn missing_reference_target(&mut self, reference: &TmplAstReference) {
        let message = if reference.value.is_empty() {
            format!("No directive found for reference '{}'.", reference.name)
        } else {
            format!("No directive found with exportAs '{}'.", reference.value)
        };
        self.record(
            DiagnosticKind::MissingReferenceTarget,
            reference.key_span,
            message,
            DiagnosticCategory::Error,
        );
    }

    pub fn control_flow_preventing_content_projection(
        &mut self,
        span: TextRange,
        category: DiagnosticCategory,
        component_name: &str,
        slot_selector: &str,
    ) {
        self.record(
            DiagnosticKind::ControlFlowPreventingContentProjection,
            span,
            format!(
                "Node matches the '{slot_selector}' slot of the '{component_name}' component, but will not be projected into the specific slot because the surrounding control flow has more than one root node."
            ),
            category,
        );
    }

    pub fn suboptimal_type_inference(&mut self, variables: &[&TmplAstVariable]) {
        if let Some(first) = variables.first() {
            self.record(
                DiagnosticKind::SuboptimalTypeInference,
                first.key_span,
                format!(
                    "The type of variable '{}' could be narrowed, but the directive does not apply a template context guard under the current configuration.",
                    first.name
                ),
                DiagnosticCategory::Suggestion,
            );
        }
    }
}
