//! Type-checking configuration
//!
//! Every toggle changes the shape of the generated type-check block, not just
//! which diagnostics are reported, so consumers requiring output compatibility
//! must set these explicitly.

use serde::{Deserialize, Serialize};

/// Severity applied when control flow at the root of a projected slot would
/// prevent content projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlFlowPreventingContentProjectionKind {
    Error,
    Warning,
    Suppress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCheckingConfig {
    /// Check the left-hand side type of input binding assignments. When false,
    /// binding expressions are cast to `any` before assignment.
    pub check_type_of_input_bindings: bool,
    /// Keep `null`/`undefined` in binding expression types. When false, a
    /// non-null assertion is added (except for array/object literals).
    pub strict_null_input_bindings: bool,
    /// Honor private/protected/readonly on input fields. When false, restricted
    /// fields are assigned through an indirection variable instead.
    pub honor_access_modifiers_for_input_bindings: bool,
    /// Type safe-navigation results as `T | undefined` instead of `any`.
    pub strict_safe_navigation_types: bool,
    /// Allow generation of inline type constructors for generic directives.
    pub use_inline_type_constructors: bool,
    /// Narrow template contexts through directive `ngTemplateContextGuard`s.
    pub apply_template_context_guards: bool,
    /// Descend into embedded template bodies.
    pub check_template_bodies: bool,
    /// Descend into `@if`/`@switch`/`@for` block bodies.
    pub check_control_flow_bodies: bool,
    /// Check pipe `transform` signatures. When false the callee is cast to any.
    pub check_type_of_pipes: bool,
    /// Check static text attributes bound to directive inputs.
    pub check_type_of_attributes: bool,
    /// Check property bindings against the DOM element type.
    pub check_type_of_dom_bindings: bool,
    /// Infer `$event` for directive outputs through `.subscribe(...)`.
    pub check_type_of_output_events: bool,
    /// Type animation `$event` parameters as `AnimationEvent`.
    pub check_type_of_animation_events: bool,
    /// Infer `$event` for native events through `addEventListener`.
    pub check_type_of_dom_events: bool,
    /// Type local references to DOM elements precisely; otherwise `any`.
    pub check_type_of_dom_references: bool,
    /// Type local references to directives and templates precisely.
    pub check_type_of_non_dom_references: bool,
    /// Unwrap `WritableSignal` values flowing into two-way bindings.
    pub allow_signals_in_two_way_bindings: bool,
    /// Keep narrow literal types for array/object literals in bindings.
    pub strict_literal_types: bool,
    /// Generate optional operations so the block can back symbol queries, not
    /// just diagnostics.
    pub enable_template_type_checker: bool,
    /// Hint when a template context guard would have improved inference.
    pub suggestions_for_suboptimal_type_inference: bool,
    pub control_flow_preventing_content_projection: ControlFlowPreventingContentProjectionKind,
}

impl Default for TypeCheckingConfig {
    fn default() -> Self {
        TypeCheckingConfig {
            check_type_of_input_bindings: true,
            strict_null_input_bindings: true,
            honor_access_modifiers_for_input_bindings: false,
            strict_safe_navigation_types: true,
            use_inline_type_constructors: true,
            apply_template_context_guards: true,
            check_template_bodies: true,
            check_control_flow_bodies: true,
            check_type_of_pipes: true,
            check_type_of_attributes: true,
            check_type_of_dom_bindings: false,
            check_type_of_output_events: true,
            check_type_of_animation_events: true,
            check_type_of_dom_events: true,
            check_type_of_dom_references: true,
            check_type_of_non_dom_references: true,
            allow_signals_in_two_way_bindings: true,
            strict_literal_types: true,
            enable_template_type_checker: true,
            suggestions_for_suboptimal_type_inference: true,
            control_flow_preventing_content_projection:
                ControlFlowPreventingContentProjectionKind::Warning,
        }
    }
}
