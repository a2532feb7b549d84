//! Template AST
//!
//! Node types for the parsed component template. Pure data, produced by an
//! external template parser. Source spans index into the template file (or,
//! for host bindings, into the inline fragment with a recorded mapping
//! offset); they are created once by the parser and referenced throughout
//! generation.

use indexmap::IndexMap;

use crate::expression_parser::ast::ASTWithSource;
use crate::parse_util::TextRange;
use crate::template::meta::TmplDirectiveMeta;

/// Returns a key identifying a node by address, for maps that track per-node
/// generation state. Valid for the duration of one pass, during which the
/// template is borrowed immutably.
pub(crate) fn node_key<T>(node: &T) -> usize {
    node as *const T as usize
}

/// How a bound attribute binds to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    Property,
    Attribute,
    Class,
    Style,
    Animation,
    TwoWay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedEventType {
    Regular,
    Animation,
    TwoWay,
}

/// Template node (tagged union)
#[derive(Debug, Clone)]
pub enum TmplAstNode {
    Element(TmplAstElement),
    Template(TmplAstTemplate),
    Content(TmplAstContent),
    BoundText(TmplAstBoundText),
    IfBlock(TmplAstIfBlock),
    SwitchBlock(TmplAstSwitchBlock),
    ForLoopBlock(TmplAstForLoopBlock),
    DeferredBlock(TmplAstDeferredBlock),
    LetDeclaration(TmplAstLetDeclaration),
}

/// A template variable (`let-x="value"` on an embedded template, the `as`
/// alias of an `@if`, or a `@for` loop variable).
#[derive(Debug, Clone)]
pub struct TmplAstVariable {
    pub name: String,
    /// Context property the variable reads; empty means `$implicit`.
    pub value: String,
    pub key_span: TextRange,
    pub value_span: Option<TextRange>,
}

impl TmplAstVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>, key_span: TextRange) -> Self {
        TmplAstVariable { name: name.into(), value: value.into(), key_span, value_span: None }
    }
}

/// A local reference (`#ref` / `#ref="exportAs"`).
#[derive(Debug, Clone)]
pub struct TmplAstReference {
    pub name: String,
    /// Requested `exportAs` name; empty selects the element or component.
    pub value: String,
    pub key_span: TextRange,
    pub value_span: Option<TextRange>,
}

impl TmplAstReference {
    pub fn new(name: impl Into<String>, value: impl Into<String>, key_span: TextRange) -> Self {
        TmplAstReference { name: name.into(), value: value.into(), key_span, value_span: None }
    }
}

/// A `@let` declaration.
#[derive(Debug, Clone)]
pub struct TmplAstLetDeclaration {
    pub name: String,
    pub name_span: TextRange,
    pub value: ASTWithSource,
    pub source_span: TextRange,
}

impl TmplAstLetDeclaration {
    pub fn new(
        name: impl Into<String>,
        name_span: TextRange,
        value: ASTWithSource,
        source_span: TextRange,
    ) -> Self {
        TmplAstLetDeclaration { name: name.into(), name_span, value, source_span }
    }
}

/// A bound attribute (`[prop]="expr"`, `[(prop)]="expr"`, structural
/// micro-syntax bindings).
#[derive(Debug, Clone)]
pub struct TmplAstBoundAttribute {
    pub name: String,
    pub binding_type: BindingType,
    pub key_span: Option<TextRange>,
    pub value: Option<ASTWithSource>,
    /// Offset of the value's expression coordinates within the host file.
    /// Non-zero for expressions embedded in inline fragments.
    pub value_mapping_offset: usize,
    pub source_span: TextRange,
    pub is_structural_directive: bool,
}

impl TmplAstBoundAttribute {
    pub fn new(
        name: impl Into<String>,
        binding_type: BindingType,
        key_span: Option<TextRange>,
        value: Option<ASTWithSource>,
        source_span: TextRange,
    ) -> Self {
        TmplAstBoundAttribute {
            name: name.into(),
            binding_type,
            key_span,
            value,
            value_mapping_offset: 0,
            source_span,
            is_structural_directive: false,
        }
    }
}

/// A static text attribute.
#[derive(Debug, Clone)]
pub struct TmplAstTextAttribute {
    pub name: String,
    pub value: String,
    pub key_span: Option<TextRange>,
    pub value_span: Option<TextRange>,
    pub source_span: TextRange,
}

impl TmplAstTextAttribute {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        key_span: Option<TextRange>,
        source_span: TextRange,
    ) -> Self {
        TmplAstTextAttribute {
            name: name.into(),
            value: value.into(),
            key_span,
            value_span: None,
            source_span,
        }
    }
}

/// An event binding (`(event)="handler"` or the output half of `[(prop)]`).
#[derive(Debug, Clone)]
pub struct TmplAstBoundEvent {
    pub name: String,
    pub event_type: ParsedEventType,
    /// Handler statements. Micro-syntax allows several per binding.
    pub handlers: Vec<ASTWithSource>,
    /// Offset of the handler expression coordinates within the host file.
    pub handler_mapping_offset: usize,
    pub key_span: TextRange,
    pub source_span: TextRange,
    /// The binding originates from a directive's `host` metadata.
    pub from_host_binding: bool,
}

impl TmplAstBoundEvent {
    pub fn new(
        name: impl Into<String>,
        event_type: ParsedEventType,
        handlers: Vec<ASTWithSource>,
        key_span: TextRange,
        source_span: TextRange,
    ) -> Self {
        TmplAstBoundEvent {
            name: name.into(),
            event_type,
            handlers,
            handler_mapping_offset: 0,
            key_span,
            source_span,
            from_host_binding: false,
        }
    }
}

/// An attribute on an embedded template that belongs to the structural
/// directive's micro-syntax rather than the template tag itself.
#[derive(Debug, Clone)]
pub enum TmplAstAttribute {
    Bound(TmplAstBoundAttribute),
    Text(TmplAstTextAttribute),
}

/// An element node.
#[derive(Debug, Clone)]
pub struct TmplAstElement {
    pub name: String,
    pub start_source_span: TextRange,
    pub attributes: IndexMap<String, TmplAstTextAttribute>,
    pub inputs: IndexMap<String, TmplAstBoundAttribute>,
    pub outputs: IndexMap<String, TmplAstBoundEvent>,
    pub references: IndexMap<String, TmplAstReference>,
    pub directives: Vec<TmplDirectiveMeta>,
    pub children: Vec<TmplAstNode>,
}

impl TmplAstElement {
    pub fn new(name: impl Into<String>, start_source_span: TextRange) -> Self {
        TmplAstElement {
            name: name.into(),
            start_source_span,
            attributes: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            references: IndexMap::new(),
            directives: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// An embedded template, either a literal `<ng-template>` or the synthetic
/// wrapper created for a structural directive.
#[derive(Debug, Clone)]
pub struct TmplAstTemplate {
    /// Tag of the element the template wraps, if any.
    pub tag: Option<String>,
    pub start_source_span: TextRange,
    pub attributes: IndexMap<String, TmplAstTextAttribute>,
    pub inputs: IndexMap<String, TmplAstBoundAttribute>,
    pub outputs: IndexMap<String, TmplAstBoundEvent>,
    pub template_attrs: Vec<TmplAstAttribute>,
    /// Declaration order is preserved; duplicates are kept so they can be
    /// reported.
    pub variables: Vec<TmplAstVariable>,
    pub references: IndexMap<String, TmplAstReference>,
    pub directives: Vec<TmplDirectiveMeta>,
    pub children: Vec<TmplAstNode>,
}

impl TmplAstTemplate {
    pub fn new(tag: Option<String>, start_source_span: TextRange) -> Self {
        TmplAstTemplate {
            tag,
            start_source_span,
            attributes: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            template_attrs: Vec::new(),
            variables: Vec::new(),
            references: IndexMap::new(),
            directives: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// An `<ng-content>` projection slot.
#[derive(Debug, Clone)]
pub struct TmplAstContent {
    pub selector: String,
    pub source_span: TextRange,
    pub children: Vec<TmplAstNode>,
}

/// Bound text (interpolation).
#[derive(Debug, Clone)]
pub struct TmplAstBoundText {
    pub value: ASTWithSource,
    pub source_span: TextRange,
}

impl TmplAstBoundText {
    pub fn new(value: ASTWithSource, source_span: TextRange) -> Self {
        TmplAstBoundText { value, source_span }
    }
}

/// An `@if` block with its branches.
#[derive(Debug, Clone)]
pub struct TmplAstIfBlock {
    pub branches: Vec<TmplAstIfBlockBranch>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone)]
pub struct TmplAstIfBlockBranch {
    /// `None` for the final `@else` branch.
    pub expression: Option<ASTWithSource>,
    pub expression_alias: Option<TmplAstVariable>,
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}

/// A `@switch` block with its cases.
#[derive(Debug, Clone)]
pub struct TmplAstSwitchBlock {
    pub expression: ASTWithSource,
    pub cases: Vec<TmplAstSwitchBlockCase>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone)]
pub struct TmplAstSwitchBlockCase {
    /// `None` for the `@default` case.
    pub expression: Option<ASTWithSource>,
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}

/// A `@for` block.
#[derive(Debug, Clone)]
pub struct TmplAstForLoopBlock {
    pub item: Option<TmplAstVariable>,
    pub expression: ASTWithSource,
    pub track_by: Option<ASTWithSource>,
    /// Implicit loop context variables (`$index`, `$count`, ...), keyed by
    /// their implicit name.
    pub context_variables: IndexMap<String, TmplAstVariable>,
    pub children: Vec<TmplAstNode>,
    pub empty: Option<TmplAstForLoopBlockEmpty>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone)]
pub struct TmplAstForLoopBlockEmpty {
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}

/// A `@defer` block with its companion blocks and triggers.
#[derive(Debug, Clone)]
pub struct TmplAstDeferredBlock {
    pub children: Vec<TmplAstNode>,
    pub triggers: TmplAstDeferredBlockTriggers,
    pub prefetch_triggers: TmplAstDeferredBlockTriggers,
    pub hydrate_triggers: TmplAstDeferredBlockTriggers,
    pub placeholder: Option<TmplAstDeferredBlockPlaceholder>,
    pub loading: Option<TmplAstDeferredBlockLoading>,
    pub error: Option<TmplAstDeferredBlockError>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone, Default)]
pub struct TmplAstDeferredBlockTriggers {
    pub when_trigger: Option<ASTWithSource>,
}

#[derive(Debug, Clone)]
pub struct TmplAstDeferredBlockPlaceholder {
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone)]
pub struct TmplAstDeferredBlockLoading {
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}

#[derive(Debug, Clone)]
pub struct TmplAstDeferredBlockError {
    pub children: Vec<TmplAstNode>,
    pub source_span: TextRange,
}
