//! Directive and pipe metadata
//!
//! Wraps the descriptors produced by an external semantic-model layer with the
//! per-field information the generator needs. Instances are created fresh per
//! generation pass; they pair a declaration with a node-local binding set.

use indexmap::IndexMap;

/// A TypeScript declaration that can be referenced from generated code.
///
/// Declarations are identified by `(module, name)`. A `module` of `None` means
/// the declaration lives in the file the generated code is placed into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsDeclaration {
    pub name: String,
    pub module: Option<String>,
    pub type_parameters: Vec<String>,
}

impl TsDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        TsDeclaration { name: name.into(), module: None, type_parameters: Vec::new() }
    }

    pub fn in_module(name: impl Into<String>, module: impl Into<String>) -> Self {
        TsDeclaration { name: name.into(), module: Some(module.into()), type_parameters: Vec::new() }
    }

    pub fn with_type_parameters(mut self, params: Vec<String>) -> Self {
        self.type_parameters = params;
        self
    }
}

/// A single input field of a directive.
#[derive(Debug, Clone, Default)]
pub struct DirectiveInput {
    /// Class member backing the input. `None` when the input was declared only
    /// through the decorator's `inputs` array, in which case there is no
    /// assignment target.
    pub field_name: Option<String>,
    pub required: bool,
    pub is_signal: bool,
    /// The directive declares a static `ngAcceptInputType_` coercion member.
    pub is_coerced: bool,
    /// The field is private, protected or readonly.
    pub is_restricted: bool,
    /// Declared parameter type of an input transform, if any.
    pub transform_type: Option<String>,
}

impl DirectiveInput {
    pub fn to_field(field_name: impl Into<String>) -> Self {
        DirectiveInput { field_name: Some(field_name.into()), ..Default::default() }
    }
}

/// A single output field of a directive.
#[derive(Debug, Clone)]
pub struct DirectiveOutput {
    pub field_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateGuardKind {
    /// `ngTemplateGuard_x` is invoked with the instance and binding value.
    Invocation,
    /// The binding expression itself narrows; no invocation is generated.
    Binding,
}

/// A static `ngTemplateGuard_<input>` declaration on a directive.
#[derive(Debug, Clone)]
pub struct TemplateGuardMeta {
    pub input_name: String,
    pub kind: TemplateGuardKind,
}

/// Directive metadata resolved against one template node.
#[derive(Debug, Clone)]
pub struct TmplDirectiveMeta {
    pub ts_class: TsDeclaration,
    pub selector: Option<String>,
    pub is_component: bool,
    pub is_host_directive: bool,
    /// Maps binding property names to input fields.
    pub inputs: IndexMap<String, DirectiveInput>,
    /// Maps binding property names to output fields.
    pub outputs: IndexMap<String, DirectiveOutput>,
    pub export_as: Vec<String>,
    pub template_guards: Vec<TemplateGuardMeta>,
    pub has_template_context_guard: bool,
    /// The directive was loaded through `@Component.deferredImports`.
    pub is_explicitly_deferred: bool,
    /// An inline type constructor cannot be generated for this class (e.g. its
    /// type parameters have constraints referencing unexported types).
    pub requires_inline_type_ctor: bool,
    /// `<ng-content>` slot selectors, for components only.
    pub ng_content_selectors: Vec<String>,
}

impl TmplDirectiveMeta {
    pub fn new(ts_class: TsDeclaration) -> Self {
        TmplDirectiveMeta {
            ts_class,
            selector: None,
            is_component: false,
            is_host_directive: false,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            export_as: Vec::new(),
            template_guards: Vec::new(),
            has_template_context_guard: false,
            is_explicitly_deferred: false,
            requires_inline_type_ctor: false,
            ng_content_selectors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.ts_class.name
    }

    pub fn is_generic(&self) -> bool {
        !self.ts_class.type_parameters.is_empty()
    }
}

/// Pipe metadata for pipes visible to the template.
#[derive(Debug, Clone)]
pub struct PipeMeta {
    pub name: String,
    pub ts_class: TsDeclaration,
    pub is_explicitly_deferred: bool,
}

impl PipeMeta {
    pub fn new(name: impl Into<String>, ts_class: TsDeclaration) -> Self {
        PipeMeta { name: name.into(), ts_class, is_explicitly_deferred: false }
    }
}
