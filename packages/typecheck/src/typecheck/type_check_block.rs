//! Type-check block generation
//!
//! Synthesizes a TypeScript function body from a bound template. The body is
//! never executed; feeding it to a type checker surfaces template type errors
//! at positions that map back into the template via the recorded mappings.
//!
//! Generation is organized as a queue of deferred operations per scope.
//! Executing an operation can demand the result of another one (for example
//! a directive constructor reading a local reference); a slot that is
//! re-entered while already executing yields its circular fallback instead of
//! recursing forever.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;
use thiserror::Error;

use crate::config::{ControlFlowPreventingContentProjectionKind, TypeCheckingConfig};
use crate::expression_parser::ast::{ASTWithSource, AST};
use crate::parse_util::TextRange;
use crate::template::ast::{
    node_key, BindingType, ParsedEventType, TmplAstAttribute, TmplAstBoundAttribute,
    TmplAstBoundEvent, TmplAstElement, TmplAstForLoopBlock, TmplAstIfBlock, TmplAstIfBlockBranch,
    TmplAstLetDeclaration, TmplAstNode, TmplAstReference, TmplAstSwitchBlock, TmplAstTemplate,
    TmplAstTextAttribute, TmplAstVariable,
};
use crate::template::binder::{BindingConsumer, BoundTarget, ReferenceTarget, TemplateEntity};
use crate::template::meta::{DirectiveInput, TemplateGuardKind, TmplDirectiveMeta, TsDeclaration};
use crate::typecheck::code_fragments::{Expression, ExpressionBuilder, Identifier, Mapped, Statement};
use crate::typecheck::environment::{
    Environment, ANIMATION_EVENT, INPUT_SIGNAL_BRAND_WRITE_TYPE, TEMPLATE_REF,
    UNWRAP_WRITABLE_SIGNAL,
};
use crate::typecheck::oob::{Diagnostic, DiagnosticCategory, OutOfBandDiagnosticRecorder};

/// An expression that has type `any` without referencing anything.
const ANY_EXPRESSION: &str = "0 as any";

/// Placeholder whose type is inferred by the checker, used to break circular
/// dependencies between operations.
const INFER_TYPE_FOR_CIRCULAR_OP_EXPR: &str = "null!";

/// Parameter name of generated event handler closures.
const EVENT_PARAMETER: &str = "$event";

#[derive(Debug, Error)]
pub enum TcbError {
    #[error("could not resolve {0}")]
    CouldNotResolve(String),
    #[error("unrecognized loop context variable '{0}'")]
    UnknownForLoopContextVariable(String),
    #[error("duplicated type mappings:\n{0}")]
    DuplicateTypeMappings(String),
}

static VALID_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_$][a-zA-Z0-9_$]*$").expect("valid regex"));

/// Types of the implicit `@for` context variables.
static FOR_LOOP_CONTEXT_VARIABLE_TYPES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| {
        HashMap::from([
            ("$index", "number"),
            ("$count", "number"),
            ("$first", "boolean"),
            ("$last", "boolean"),
            ("$even", "boolean"),
            ("$odd", "boolean"),
        ])
    });

/// Attribute names whose DOM property differs from the attribute name.
static ATTR_TO_PROP_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("class", "className"),
        ("for", "htmlFor"),
        ("formaction", "formAction"),
        ("innerHtml", "innerHTML"),
        ("readonly", "readOnly"),
        ("tabindex", "tabIndex"),
    ])
});

fn is_valid_js_identifier(name: &str) -> bool {
    VALID_IDENTIFIER.is_match(name)
}

fn escape_js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn ignore_wrap(expr: Expression) -> Expression {
    Expression::build(|b| {
        b.with_ignore_mappings(|b| {
            b.append_expr(&expr);
        });
    })
}

/// `((expr) as any)`
fn ts_cast_to_any(expr: &Expression) -> Expression {
    Expression::build(|b| {
        b.append("((");
        b.append_expr(expr);
        b.append(") as any)");
    })
}

/// Applies the configured leniency to a binding expression before it is
/// assigned to its target. `is_literal` exempts array and object literals
/// from the non-null assertion.
fn widen_binding(expr: Expression, is_literal: bool, config: &TypeCheckingConfig) -> Expression {
    if !config.check_type_of_input_bindings {
        return ts_cast_to_any(&expr);
    }
    if !config.strict_null_input_bindings && !is_literal {
        return Expression::build(|b| {
            b.append_expr(&expr);
            b.append("!");
        });
    }
    expr
}

fn is_literal_binding_value(value: Option<&ASTWithSource>) -> bool {
    matches!(value.map(|v| &v.ast), Some(AST::LiteralArray(_) | AST::LiteralMap(_)))
}

#[derive(Debug, Clone, Copy, Default)]
struct VarOpts<'s> {
    of_directive: Option<&'s str>,
    ignore_diagnostics: bool,
    no_types: bool,
    is_const: bool,
}

fn append_declared_id(b: &mut ExpressionBuilder, id: &Identifier, opts: &VarOpts<'_>) {
    match id.source_span {
        Some(span) => {
            let mut mapped = Mapped::at(span).semantic(!opts.ignore_diagnostics);
            if !opts.no_types {
                mapped = mapped.types();
            }
            if opts.ignore_diagnostics {
                mapped = mapped.no_diagnostics();
            }
            if let Some(dir) = opts.of_directive {
                mapped = mapped.of_directive(dir);
            }
            b.append_id(id, mapped);
        }
        None => {
            b.append(&id.name);
        }
    }
}

/// `var <id> = <initializer>;`
fn ts_create_variable(id: &Identifier, initializer: &Expression, opts: VarOpts<'_>) -> Statement {
    Statement::new(Expression::build(|b| {
        b.append(if opts.is_const { "const " } else { "var " });
        append_declared_id(b, id, &opts);
        b.append(" = ");
        b.append_expr(initializer);
        b.append(";");
    }))
}

/// `var <id> = null! as <type>;`
fn ts_declare_variable(id: &Identifier, ty: &str, opts: VarOpts<'_>) -> Statement {
    Statement::new(Expression::build(|b| {
        b.append("var ");
        append_declared_id(b, id, &opts);
        b.append(" = null! as ");
        b.append(ty);
        b.append(";");
    }))
}

/// A node a directive can be applied to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TcbNode<'a> {
    Element(&'a TmplAstElement),
    Template(&'a TmplAstTemplate),
}

impl<'a> TcbNode<'a> {
    fn key(self) -> usize {
        match self {
            TcbNode::Element(el) => node_key(el),
            TcbNode::Template(t) => node_key(t),
        }
    }

    fn start_source_span(self) -> TextRange {
        match self {
            TcbNode::Element(el) => el.start_source_span,
            TcbNode::Template(t) => t.start_source_span,
        }
    }

    fn as_ref(self) -> TcbRef<'a> {
        match self {
            TcbNode::Element(el) => TcbRef::Element(el),
            TcbNode::Template(t) => TcbRef::Template(t),
        }
    }

    fn directives(self) -> &'a [TmplDirectiveMeta] {
        match self {
            TcbNode::Element(el) => &el.directives,
            TcbNode::Template(t) => &t.directives,
        }
    }

    fn inputs(self) -> &'a IndexMap<String, TmplAstBoundAttribute> {
        match self {
            TcbNode::Element(el) => &el.inputs,
            TcbNode::Template(t) => &t.inputs,
        }
    }

    fn outputs(self) -> &'a IndexMap<String, TmplAstBoundEvent> {
        match self {
            TcbNode::Element(el) => &el.outputs,
            TcbNode::Template(t) => &t.outputs,
        }
    }

    fn attributes(self) -> &'a IndexMap<String, TmplAstTextAttribute> {
        match self {
            TcbNode::Element(el) => &el.attributes,
            TcbNode::Template(t) => &t.attributes,
        }
    }
}

/// A template construct that can be resolved to a generated variable.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TcbRef<'a> {
    Element(&'a TmplAstElement),
    Template(&'a TmplAstTemplate),
    Variable(&'a TmplAstVariable),
    Reference(&'a TmplAstReference),
    Let(&'a TmplAstLetDeclaration),
}

impl<'a> TcbRef<'a> {
    fn describe(&self) -> String {
        match self {
            TcbRef::Element(el) => format!("element <{}>", el.name),
            TcbRef::Template(_) => "embedded template".to_string(),
            TcbRef::Variable(v) => format!("variable '{}'", v.name),
            TcbRef::Reference(r) => format!("reference '#{}'", r.name),
            TcbRef::Let(l) => format!("@let '{}'", l.name),
        }
    }
}

fn entity_ref<'a>(entity: TemplateEntity<'a>) -> TcbRef<'a> {
    match entity {
        TemplateEntity::Variable(v) => TcbRef::Variable(v),
        TemplateEntity::Reference(r) => TcbRef::Reference(r),
        TemplateEntity::Let(l) => TcbRef::Let(l),
    }
}

/// A bound or static attribute matched against a directive input.
#[derive(Debug, Clone, Copy)]
enum AttrRef<'a> {
    Bound(&'a TmplAstBoundAttribute),
    Text(&'a TmplAstTextAttribute),
}

impl<'a> AttrRef<'a> {
    fn key(self) -> usize {
        match self {
            AttrRef::Bound(a) => node_key(a),
            AttrRef::Text(a) => node_key(a),
        }
    }

    fn key_span(self) -> Option<TextRange> {
        match self {
            AttrRef::Bound(a) => a.key_span,
            AttrRef::Text(a) => a.key_span,
        }
    }

    fn is_text(self) -> bool {
        matches!(self, AttrRef::Text(_))
    }

    fn has_literal_value(self) -> bool {
        match self {
            AttrRef::Bound(a) => is_literal_binding_value(a.value.as_ref()),
            AttrRef::Text(_) => false,
        }
    }
}

#[derive(Debug)]
struct BoundAttrMatch<'a> {
    attr: AttrRef<'a>,
    input: &'a DirectiveInput,
    is_two_way: bool,
}

/// Collects the attributes of `node` that bind to inputs of `dir`, in
/// declaration order: bound inputs, static attributes, then structural
/// micro-syntax attributes.
fn get_bound_attributes<'a>(
    node: TcbNode<'a>,
    dir: &'a TmplDirectiveMeta,
) -> Vec<BoundAttrMatch<'a>> {
    let mut out = Vec::new();
    let push_bound = |out: &mut Vec<BoundAttrMatch<'a>>, attr: &'a TmplAstBoundAttribute| {
        if !matches!(attr.binding_type, BindingType::Property | BindingType::TwoWay) {
            return;
        }
        if let Some(input) = dir.inputs.get(&attr.name) {
            out.push(BoundAttrMatch {
                attr: AttrRef::Bound(attr),
                input,
                is_two_way: attr.binding_type == BindingType::TwoWay,
            });
        }
    };
    for attr in node.inputs().values() {
        push_bound(&mut out, attr);
    }
    for attr in node.attributes().values() {
        if let Some(input) = dir.inputs.get(&attr.name) {
            out.push(BoundAttrMatch { attr: AttrRef::Text(attr), input, is_two_way: false });
        }
    }
    if let TcbNode::Template(tmpl) = node {
        for attr in &tmpl.template_attrs {
            match attr {
                TmplAstAttribute::Bound(bound) => push_bound(&mut out, bound),
                TmplAstAttribute::Text(text) => {
                    if let Some(input) = dir.inputs.get(&text.name) {
                        out.push(BoundAttrMatch {
                            attr: AttrRef::Text(text),
                            input,
                            is_two_way: false,
                        });
                    }
                }
            }
        }
    }
    out
}

/// Type of the `$event` parameter of a generated handler.
#[derive(Debug, Clone)]
enum EventParamType {
    /// Leave the parameter untyped so the checker infers it from the
    /// subscribed producer.
    Infer,
    Any,
    Typed(String),
}

/// One deferred generation step.
#[derive(Debug)]
enum TcbOp<'a> {
    Element(&'a TmplAstElement),
    TemplateVariable(&'a TmplAstTemplate, &'a TmplAstVariable),
    TemplateContext(&'a TmplAstTemplate),
    LetDeclaration(&'a TmplAstLetDeclaration),
    TemplateBody(&'a TmplAstTemplate),
    ExpressionStmt { value: &'a ASTWithSource, is_bound_text: bool },
    DirectiveTypeNonGeneric { node: TcbNode<'a>, dir: &'a TmplDirectiveMeta },
    DirectiveTypeGenericAny { node: TcbNode<'a>, dir: &'a TmplDirectiveMeta },
    DirectiveCtor { node: TcbNode<'a>, dir: &'a TmplDirectiveMeta },
    DirectiveCtorCircularFallback { dir: &'a TmplDirectiveMeta },
    DirectiveInputs { node: TcbNode<'a>, dir: &'a TmplDirectiveMeta },
    Reference { reference: &'a TmplAstReference, target: ReferenceTarget<'a> },
    InvalidReference { reference: &'a TmplAstReference },
    ControlFlowContentProjection { element: &'a TmplAstElement, component: &'a TmplDirectiveMeta },
    UnclaimedInputs { element: &'a TmplAstElement, claimed: IndexSet<String> },
    DirectiveOutputs { node: TcbNode<'a>, dir: &'a TmplDirectiveMeta },
    UnclaimedOutputs { element: &'a TmplAstElement, claimed: IndexSet<String> },
    BlockVariable { variable: &'a TmplAstVariable, initializer: Expression },
    BlockImplicitVariable { variable: &'a TmplAstVariable, ty: &'static str },
    If(&'a TmplAstIfBlock),
    Switch(&'a TmplAstSwitchBlock),
    ForOf(&'a TmplAstForLoopBlock),
}

impl<'a> TcbOp<'a> {
    /// Optional operations only matter when their result is demanded by
    /// another operation; they are skipped during plain rendering unless the
    /// full checker output is requested.
    fn optional(&self) -> bool {
        matches!(
            self,
            TcbOp::Element(_)
                | TcbOp::TemplateContext(_)
                | TcbOp::DirectiveTypeNonGeneric { .. }
                | TcbOp::DirectiveTypeGenericAny { .. }
                | TcbOp::DirectiveCtor { .. }
                | TcbOp::Reference { .. }
                | TcbOp::InvalidReference { .. }
                | TcbOp::BlockImplicitVariable { .. }
        )
    }

    fn circular_fallback(&self) -> Fallback<'a> {
        match self {
            TcbOp::DirectiveCtor { dir, .. } => {
                Fallback::Op(Box::new(TcbOp::DirectiveCtorCircularFallback { dir }))
            }
            _ => Fallback::Id(Identifier::new(INFER_TYPE_FOR_CIRCULAR_OP_EXPR)),
        }
    }
}

/// Placeholder for a slot whose operation is currently executing.
#[derive(Debug)]
enum Fallback<'a> {
    Id(Identifier),
    Op(Box<TcbOp<'a>>),
}

#[derive(Debug)]
enum OpSlot<'a> {
    Pending(TcbOp<'a>),
    InFlight(Fallback<'a>),
    Resolved(Option<Identifier>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ScopeId(usize);

#[derive(Debug)]
enum VarEntry {
    Op(usize),
    Id(Identifier),
}

#[derive(Debug)]
struct LetEntry<'a> {
    op_index: usize,
    node: &'a TmplAstLetDeclaration,
}

#[derive(Debug, Default)]
struct ScopeData<'a> {
    parent: Option<ScopeId>,
    guard: Option<Expression>,
    op_queue: Vec<OpSlot<'a>>,
    element_op_map: HashMap<usize, usize>,
    directive_op_map: HashMap<usize, IndexMap<usize, usize>>,
    reference_op_map: HashMap<usize, usize>,
    template_ctx_op_map: HashMap<usize, usize>,
    var_map: HashMap<usize, VarEntry>,
    let_decl_op_map: IndexMap<String, LetEntry<'a>>,
    /// Variable and reference names registered in this scope, for the
    /// conflicting `@let` check.
    local_names: Vec<String>,
    statements: Vec<Statement>,
}

/// A node that opens a new scope.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScopedNode<'a> {
    Template(&'a TmplAstTemplate),
    IfBranch(&'a TmplAstIfBlockBranch),
    ForLoop(&'a TmplAstForLoopBlock),
}

/// Result of generating one block.
#[derive(Debug)]
pub struct GeneratedBlock {
    pub expression: Expression,
    pub diagnostics: Vec<Diagnostic>,
}

/// Generates the type-check block for a component template.
pub fn generate_type_check_block<'a>(
    env: &'a Environment,
    bound_target: &'a BoundTarget<'a>,
    nodes: &'a [TmplAstNode],
    name: &str,
    component: &TsDeclaration,
) -> Result<GeneratedBlock, TcbError> {
    let mut tcb = Tcb::new(env, bound_target);
    let scope = tcb.scope_for_nodes(None, None, nodes, None)?;
    let statements = tcb.render(scope)?;
    let this_type = env.reference_type_with_any_params(component);
    let expression = Expression::build(|b| {
        b.append(format!("function {name}(this: {this_type}) "));
        b.code_block(|b| {
            for statement in &statements {
                b.append_statement(statement);
            }
        });
        b.new_line();
    });
    Ok(GeneratedBlock { expression, diagnostics: tcb.oob.into_diagnostics() })
}

pub(crate) struct Tcb<'a> {
    env: &'a Environment,
    bound_target: &'a BoundTarget<'a>,
    oob: OutOfBandDiagnosticRecorder,
    next_id: usize,
    scopes: Vec<ScopeData<'a>>,
    /// Attribute and event expressions already emitted with full mappings.
    /// Re-emission keeps its mappings suppressed so positions stay unique.
    transpiled_attrs: HashSet<usize>,
}

impl<'a> Tcb<'a> {
    fn new(env: &'a Environment, bound_target: &'a BoundTarget<'a>) -> Self {
        Tcb {
            env,
            bound_target,
            oob: OutOfBandDiagnosticRecorder::new(),
            next_id: 1,
            scopes: Vec::new(),
            transpiled_attrs: HashSet::new(),
        }
    }

    fn config(&self) -> &'a TypeCheckingConfig {
        self.env.config()
    }

    fn allocate_id(&mut self, source_name: Option<&str>, span: Option<TextRange>) -> Identifier {
        let name = format!("_t{}", self.next_id);
        self.next_id += 1;
        Identifier { name, source_name: source_name.map(str::to_string), source_span: span }
    }

    fn mark_attr_transpiled(&mut self, key: usize) -> bool {
        self.transpiled_attrs.insert(key)
    }

    fn add_statement(&mut self, scope: ScopeId, statement: Statement) {
        self.scopes[scope.0].statements.push(statement);
    }

    /// Adds `expr;` as a statement.
    fn add_expr_statement(&mut self, scope: ScopeId, expr: Expression) {
        let statement = Statement::new(Expression::build(|b| {
            b.append_expr(&expr);
            b.append(";");
        }));
        self.add_statement(scope, statement);
    }

    // ---- scope construction ------------------------------------------------

    fn scope_for_nodes(
        &mut self,
        parent: Option<ScopeId>,
        scoped: Option<ScopedNode<'a>>,
        children: &'a [TmplAstNode],
        guard: Option<Expression>,
    ) -> Result<ScopeId, TcbError> {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData { parent, guard, ..Default::default() });
        match scoped {
            Some(ScopedNode::Template(template)) => {
                let mut seen: IndexMap<&str, &'a TmplAstVariable> = IndexMap::new();
                for variable in &template.variables {
                    if let Some(first) = seen.get(variable.name.as_str()) {
                        self.oob.duplicate_template_var(variable, first);
                    } else {
                        seen.insert(variable.name.as_str(), variable);
                    }
                    let index = self.push_op(id, TcbOp::TemplateVariable(template, variable));
                    self.scopes[id.0].var_map.insert(node_key(variable), VarEntry::Op(index));
                    self.scopes[id.0].local_names.push(variable.name.clone());
                }
            }
            Some(ScopedNode::IfBranch(branch)) => {
                if let (Some(expression), Some(alias)) =
                    (&branch.expression, &branch.expression_alias)
                {
                    let initializer = self.tcb_expression(id, expression, 0)?;
                    let index =
                        self.push_op(id, TcbOp::BlockVariable { variable: alias, initializer });
                    self.scopes[id.0].var_map.insert(node_key(alias), VarEntry::Op(index));
                    self.scopes[id.0].local_names.push(alias.name.clone());
                }
            }
            Some(ScopedNode::ForLoop(block)) => {
                if let Some(item) = &block.item {
                    let loop_id = self.allocate_id(Some(&item.name), Some(item.key_span));
                    self.scopes[id.0].var_map.insert(node_key(item), VarEntry::Id(loop_id));
                    self.scopes[id.0].local_names.push(item.name.clone());
                }
                for variable in block.context_variables.values() {
                    let ty = FOR_LOOP_CONTEXT_VARIABLE_TYPES
                        .get(variable.value.as_str())
                        .or_else(|| FOR_LOOP_CONTEXT_VARIABLE_TYPES.get(variable.name.as_str()))
                        .copied()
                        .ok_or_else(|| {
                            TcbError::UnknownForLoopContextVariable(variable.name.clone())
                        })?;
                    let index =
                        self.push_op(id, TcbOp::BlockImplicitVariable { variable, ty });
                    self.scopes[id.0].var_map.insert(node_key(variable), VarEntry::Op(index));
                    self.scopes[id.0].local_names.push(variable.name.clone());
                }
            }
            None => {}
        }
        for child in children {
            self.append_node(id, child)?;
        }
        let names = self.scopes[id.0].local_names.clone();
        for name in names {
            let conflicting = self.scopes[id.0].let_decl_op_map.get(&name).map(|e| e.node);
            if let Some(node) = conflicting {
                self.oob.conflicting_declaration(node);
            }
        }
        Ok(id)
    }

    fn push_op(&mut self, scope: ScopeId, op: TcbOp<'a>) -> usize {
        let queue = &mut self.scopes[scope.0].op_queue;
        queue.push(OpSlot::Pending(op));
        queue.len() - 1
    }

    fn append_node(&mut self, scope: ScopeId, node: &'a TmplAstNode) -> Result<(), TcbError> {
        match node {
            TmplAstNode::Element(el) => {
                let index = self.push_op(scope, TcbOp::Element(el));
                self.scopes[scope.0].element_op_map.insert(node_key(el), index);
                if self.config().control_flow_preventing_content_projection
                    != ControlFlowPreventingContentProjectionKind::Suppress
                {
                    self.append_content_projection_check(scope, el);
                }
                self.append_directives_and_inputs(scope, TcbNode::Element(el))?;
                self.append_outputs(scope, TcbNode::Element(el));
                for child in &el.children {
                    self.append_node(scope, child)?;
                }
                self.check_and_append_references(scope, &el.references);
            }
            TmplAstNode::Template(tmpl) => {
                self.append_directives_and_inputs(scope, TcbNode::Template(tmpl))?;
                self.append_outputs(scope, TcbNode::Template(tmpl));
                let index = self.push_op(scope, TcbOp::TemplateContext(tmpl));
                self.scopes[scope.0].template_ctx_op_map.insert(node_key(tmpl), index);
                if self.config().check_template_bodies {
                    self.push_op(scope, TcbOp::TemplateBody(tmpl));
                }
                self.check_and_append_references(scope, &tmpl.references);
            }
            TmplAstNode::Content(content) => {
                for child in &content.children {
                    self.append_node(scope, child)?;
                }
            }
            TmplAstNode::BoundText(text) => {
                self.push_op(
                    scope,
                    TcbOp::ExpressionStmt { value: &text.value, is_bound_text: true },
                );
            }
            TmplAstNode::IfBlock(block) => {
                self.push_op(scope, TcbOp::If(block));
            }
            TmplAstNode::SwitchBlock(block) => {
                self.push_op(scope, TcbOp::Switch(block));
            }
            TmplAstNode::ForLoopBlock(block) => {
                self.push_op(scope, TcbOp::ForOf(block));
                if self.config().check_control_flow_bodies {
                    if let Some(empty) = &block.empty {
                        for child in &empty.children {
                            self.append_node(scope, child)?;
                        }
                    }
                }
            }
            TmplAstNode::DeferredBlock(block) => {
                for triggers in
                    [&block.triggers, &block.prefetch_triggers, &block.hydrate_triggers]
                {
                    if let Some(when) = &triggers.when_trigger {
                        self.push_op(
                            scope,
                            TcbOp::ExpressionStmt { value: when, is_bound_text: false },
                        );
                    }
                }
                for child in &block.children {
                    self.append_node(scope, child)?;
                }
                if let Some(placeholder) = &block.placeholder {
                    for child in &placeholder.children {
                        self.append_node(scope, child)?;
                    }
                }
                if let Some(loading) = &block.loading {
                    for child in &loading.children {
                        self.append_node(scope, child)?;
                    }
                }
                if let Some(error) = &block.error {
                    for child in &error.children {
                        self.append_node(scope, child)?;
                    }
                }
            }
            TmplAstNode::LetDeclaration(decl) => {
                let index = self.push_op(scope, TcbOp::LetDeclaration(decl));
                if self.is_local(scope, TcbRef::Let(decl)) {
                    self.oob.conflicting_declaration(decl);
                } else {
                    self.scopes[scope.0]
                        .let_decl_op_map
                        .insert(decl.name.clone(), LetEntry { op_index: index, node: decl });
                }
            }
        }
        Ok(())
    }

    fn append_content_projection_check(&mut self, scope: ScopeId, el: &'a TmplAstElement) {
        let component = el.directives.iter().find(|dir| {
            dir.is_component
                && (dir.ng_content_selectors.len() > 1
                    || (dir.ng_content_selectors.len() == 1
                        && dir.ng_content_selectors[0] != "*"))
        });
        if let Some(component) = component {
            self.push_op(scope, TcbOp::ControlFlowContentProjection { element: el, component });
        }
    }

    fn append_directives_and_inputs(
        &mut self,
        scope: ScopeId,
        node: TcbNode<'a>,
    ) -> Result<(), TcbError> {
        let directives = node.directives();
        if directives.is_empty() {
            if let TcbNode::Element(el) = node {
                self.push_op(
                    scope,
                    TcbOp::UnclaimedInputs { element: el, claimed: IndexSet::new() },
                );
            }
            return Ok(());
        }
        if let TcbNode::Element(el) = node {
            if !self.bound_target.is_deferred_element(el)
                && directives.iter().any(|dir| dir.is_explicitly_deferred)
            {
                self.oob.deferred_component_used_eagerly(el.start_source_span, &el.name);
            }
        }
        let mut dir_map = IndexMap::new();
        for dir in directives {
            let op = if !dir.is_generic() {
                TcbOp::DirectiveTypeNonGeneric { node, dir }
            } else if !dir.requires_inline_type_ctor || self.config().use_inline_type_constructors
            {
                TcbOp::DirectiveCtor { node, dir }
            } else {
                TcbOp::DirectiveTypeGenericAny { node, dir }
            };
            let index = self.push_op(scope, op);
            dir_map.insert(node_key(dir), index);
            self.push_op(scope, TcbOp::DirectiveInputs { node, dir });
        }
        self.scopes[scope.0].directive_op_map.insert(node.key(), dir_map);
        if let TcbNode::Element(el) = node {
            let mut claimed = IndexSet::new();
            for dir in directives {
                claimed.extend(dir.inputs.keys().cloned());
            }
            self.push_op(scope, TcbOp::UnclaimedInputs { element: el, claimed });
        }
        Ok(())
    }

    fn append_outputs(&mut self, scope: ScopeId, node: TcbNode<'a>) {
        let directives = node.directives();
        if directives.is_empty() {
            if let TcbNode::Element(el) = node {
                self.push_op(
                    scope,
                    TcbOp::UnclaimedOutputs { element: el, claimed: IndexSet::new() },
                );
            }
            return;
        }
        for dir in directives {
            self.push_op(scope, TcbOp::DirectiveOutputs { node, dir });
        }
        if let TcbNode::Element(el) = node {
            let mut claimed = IndexSet::new();
            for dir in directives {
                claimed.extend(dir.outputs.keys().cloned());
            }
            self.push_op(scope, TcbOp::UnclaimedOutputs { element: el, claimed });
        }
    }

    fn check_and_append_references(
        &mut self,
        scope: ScopeId,
        references: &'a IndexMap<String, TmplAstReference>,
    ) {
        for reference in references.values() {
            let op = match self.bound_target.get_reference_target(reference) {
                Some(target) => TcbOp::Reference { reference, target },
                None => {
                    self.oob.missing_reference_target(reference);
                    TcbOp::InvalidReference { reference }
                }
            };
            let index = self.push_op(scope, op);
            self.scopes[scope.0].reference_op_map.insert(node_key(reference), index);
            self.scopes[scope.0].local_names.push(reference.name.clone());
        }
    }

    // ---- resolution --------------------------------------------------------

    /// Whether `node` is declared in `scope` itself. Parent scopes are not
    /// consulted; a symbol living in an ancestor scope is not local, even
    /// though `resolve` can reach it.
    fn is_local(&self, scope: ScopeId, node: TcbRef<'a>) -> bool {
        let data = &self.scopes[scope.0];
        match node {
            TcbRef::Variable(v) => data.var_map.contains_key(&node_key(v)),
            TcbRef::Let(l) => data.let_decl_op_map.contains_key(&l.name),
            TcbRef::Reference(r) => data.reference_op_map.contains_key(&node_key(r)),
            TcbRef::Element(_) | TcbRef::Template(_) => false,
        }
    }

    pub(crate) fn resolve(
        &mut self,
        scope: ScopeId,
        node: TcbRef<'a>,
        dir: Option<&'a TmplDirectiveMeta>,
    ) -> Result<Identifier, TcbError> {
        if let Some(id) = self.resolve_local(scope, node, dir)? {
            return Ok(id);
        }
        if let Some(parent) = self.scopes[scope.0].parent {
            return self.resolve(parent, node, dir);
        }
        Err(TcbError::CouldNotResolve(node.describe()))
    }

    fn resolve_local(
        &mut self,
        scope: ScopeId,
        node: TcbRef<'a>,
        dir: Option<&'a TmplDirectiveMeta>,
    ) -> Result<Option<Identifier>, TcbError> {
        match node {
            TcbRef::Reference(r) => {
                if let Some(&index) = self.scopes[scope.0].reference_op_map.get(&node_key(r)) {
                    return self.resolve_op(scope, index).map(Some);
                }
            }
            TcbRef::Let(l) => {
                if let Some(entry) = self.scopes[scope.0].let_decl_op_map.get(&l.name) {
                    if std::ptr::eq(entry.node, l) {
                        let index = entry.op_index;
                        return self.resolve_op(scope, index).map(Some);
                    }
                }
            }
            TcbRef::Variable(v) => match self.scopes[scope.0].var_map.get(&node_key(v)) {
                Some(VarEntry::Id(id)) => return Ok(Some(id.clone())),
                Some(VarEntry::Op(index)) => {
                    let index = *index;
                    return self.resolve_op(scope, index).map(Some);
                }
                None => {}
            },
            TcbRef::Template(t) => match dir {
                None => {
                    if let Some(&index) =
                        self.scopes[scope.0].template_ctx_op_map.get(&node_key(t))
                    {
                        return self.resolve_op(scope, index).map(Some);
                    }
                }
                Some(dir) => return self.resolve_directive(scope, node_key(t), dir),
            },
            TcbRef::Element(e) => match dir {
                None => {
                    if let Some(&index) = self.scopes[scope.0].element_op_map.get(&node_key(e)) {
                        return self.resolve_op(scope, index).map(Some);
                    }
                }
                Some(dir) => return self.resolve_directive(scope, node_key(e), dir),
            },
        }
        Ok(None)
    }

    fn resolve_directive(
        &mut self,
        scope: ScopeId,
        node: usize,
        dir: &'a TmplDirectiveMeta,
    ) -> Result<Option<Identifier>, TcbError> {
        let Some(dir_map) = self.scopes[scope.0].directive_op_map.get(&node) else {
            return Ok(None);
        };
        match dir_map.get(&node_key(dir)) {
            Some(&index) => self.resolve_op(scope, index).map(Some),
            // The directive was matched on the node but produced no variable,
            // e.g. a host directive; it still types as `any`.
            None => Ok(Some(Identifier::new(INFER_TYPE_FOR_CIRCULAR_OP_EXPR))),
        }
    }

    fn resolve_op(&mut self, scope: ScopeId, index: usize) -> Result<Identifier, TcbError> {
        self.execute_op(scope, index, false)?
            .ok_or_else(|| TcbError::CouldNotResolve("required operation result".to_string()))
    }

    fn execute_op(
        &mut self,
        scope: ScopeId,
        index: usize,
        skip_optional: bool,
    ) -> Result<Option<Identifier>, TcbError> {
        let slot =
            std::mem::replace(&mut self.scopes[scope.0].op_queue[index], OpSlot::Resolved(None));
        match slot {
            OpSlot::Resolved(result) => {
                self.scopes[scope.0].op_queue[index] = OpSlot::Resolved(result.clone());
                Ok(result)
            }
            OpSlot::InFlight(Fallback::Id(id)) => {
                self.scopes[scope.0].op_queue[index] = OpSlot::InFlight(Fallback::Id(id.clone()));
                Ok(Some(id))
            }
            OpSlot::InFlight(Fallback::Op(op)) => self.run_slot(scope, index, *op),
            OpSlot::Pending(op) => {
                if skip_optional && op.optional() {
                    self.scopes[scope.0].op_queue[index] = OpSlot::Pending(op);
                    return Ok(None);
                }
                self.run_slot(scope, index, op)
            }
        }
    }

    fn run_slot(
        &mut self,
        scope: ScopeId,
        index: usize,
        op: TcbOp<'a>,
    ) -> Result<Option<Identifier>, TcbError> {
        self.scopes[scope.0].op_queue[index] = OpSlot::InFlight(op.circular_fallback());
        let result = self.run_op(scope, op)?;
        self.scopes[scope.0].op_queue[index] = OpSlot::Resolved(result.clone());
        Ok(result)
    }

    fn render(&mut self, scope: ScopeId) -> Result<Vec<Statement>, TcbError> {
        let skip_optional = !self.config().enable_template_type_checker;
        let mut index = 0;
        while index < self.scopes[scope.0].op_queue.len() {
            self.execute_op(scope, index, skip_optional)?;
            index += 1;
        }
        Ok(std::mem::take(&mut self.scopes[scope.0].statements))
    }

    fn guards(&self, scope: ScopeId) -> Option<Expression> {
        let data = &self.scopes[scope.0];
        let parent = data.parent.and_then(|p| self.guards(p));
        let own = data.guard.clone();
        match (parent, own) {
            (Some(parent), Some(own)) => Some(Expression::build(|b| {
                b.append_expr(&parent);
                b.append(" && ");
                b.append_expr(&own);
            })),
            (Some(parent), None) => Some(parent),
            (None, own) => own,
        }
    }

    fn tcb_expression(
        &mut self,
        scope: ScopeId,
        value: &'a ASTWithSource,
        offset: usize,
    ) -> Result<Expression, TcbError> {
        translate_expression(self, scope, Some(&value.ast), &value.source, offset, TranslatorMode::Normal)
    }

    // ---- operation execution -----------------------------------------------

    fn run_op(&mut self, scope: ScopeId, op: TcbOp<'a>) -> Result<Option<Identifier>, TcbError> {
        match op {
            TcbOp::Element(el) => {
                let id = self.allocate_id(None, Some(el.start_source_span));
                let initializer =
                    Expression::of(format!("document.createElement(\"{}\")", el.name));
                let stmt = ts_create_variable(
                    &id,
                    &initializer,
                    VarOpts { ignore_diagnostics: true, ..Default::default() },
                );
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::TemplateVariable(template, variable) => {
                let id = self.allocate_id(Some(&variable.name), Some(variable.key_span));
                let ctx = self.resolve(scope, TcbRef::Template(template), None)?;
                let value_name =
                    if variable.value.is_empty() { "$implicit" } else { variable.value.as_str() };
                // The accessor maps to the value span only when it differs
                // from the key span, i.e. when the variable names a context
                // property explicitly.
                let accessor_span = variable.value_span.filter(|vs| *vs != variable.key_span);
                let initializer = Expression::build(|b| {
                    b.append(&ctx.name);
                    b.with_source_span(accessor_span, true, |b| {
                        if is_valid_js_identifier(value_name) {
                            b.append(format!(".{value_name}"));
                        } else {
                            b.append(format!("[\"{}\"]", escape_js_string(value_name)));
                        }
                    });
                });
                let stmt = ts_create_variable(&id, &initializer, VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::TemplateContext(_) => {
                let id = self.allocate_id(None, None);
                let stmt = ts_declare_variable(&id, "any", VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::LetDeclaration(decl) => {
                let id = self.allocate_id(Some(&decl.name), Some(decl.name_span));
                let value = self.tcb_expression(scope, &decl.value, 0)?;
                let stmt =
                    ts_create_variable(&id, &value, VarOpts { is_const: true, ..Default::default() });
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::TemplateBody(template) => self.run_template_body(scope, template),
            TcbOp::ExpressionStmt { value, is_bound_text } => {
                let expr = self.tcb_expression(scope, value, 0)?;
                let statement = Statement::new(Expression::build(|b| {
                    if is_bound_text {
                        b.append("\"\" + ");
                        b.append_expr(&expr);
                    } else {
                        b.append("(");
                        b.append_expr(&expr);
                        b.append(")");
                    }
                    b.append(";");
                }));
                self.add_statement(scope, statement);
                Ok(None)
            }
            TcbOp::DirectiveTypeNonGeneric { node, dir } => {
                let id = self.allocate_id(None, Some(node.start_source_span()));
                let ty = self.env.reference(&dir.ts_class);
                let stmt = ts_declare_variable(
                    &id,
                    &ty,
                    VarOpts {
                        no_types: true,
                        of_directive: Some(dir.name()),
                        ignore_diagnostics: true,
                        ..Default::default()
                    },
                );
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::DirectiveTypeGenericAny { node, dir } => {
                let id = self.allocate_id(None, Some(node.start_source_span()));
                let ty = self.env.reference_type_with_any_params(&dir.ts_class);
                let stmt = ts_declare_variable(
                    &id,
                    &ty,
                    VarOpts {
                        no_types: true,
                        of_directive: Some(dir.name()),
                        ignore_diagnostics: true,
                        ..Default::default()
                    },
                );
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::DirectiveCtor { node, dir } => self.run_directive_ctor(scope, node, dir),
            TcbOp::DirectiveCtorCircularFallback { dir } => {
                let id = self.allocate_id(None, None);
                let ctor = self.env.type_ctor_for(dir);
                let initializer =
                    Expression::of(format!("{ctor}({INFER_TYPE_FOR_CIRCULAR_OP_EXPR})"));
                let stmt = ts_create_variable(
                    &id,
                    &initializer,
                    VarOpts { no_types: true, ..Default::default() },
                );
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::DirectiveInputs { node, dir } => self.run_directive_inputs(scope, node, dir),
            TcbOp::Reference { reference, target } => {
                let id = self.allocate_id(Some(&reference.name), Some(reference.key_span));
                let target_id = match target {
                    ReferenceTarget::Element(el) => {
                        self.resolve(scope, TcbRef::Element(el), None)?
                    }
                    ReferenceTarget::Template(t) => {
                        self.resolve(scope, TcbRef::Template(t), None)?
                    }
                    ReferenceTarget::DirectiveOnElement(el, dir) => {
                        self.resolve(scope, TcbRef::Element(el), Some(dir))?
                    }
                    ReferenceTarget::DirectiveOnTemplate(t, dir) => {
                        self.resolve(scope, TcbRef::Template(t), Some(dir))?
                    }
                };
                // The declared variable already maps the key span; the
                // initializer gets a mapping of its own only when the
                // reference carries a distinct value span.
                let target_expr = Expression::build(|b| match reference.value_span {
                    Some(span) => {
                        b.append_id(&target_id, Mapped::at(span).types());
                    }
                    None => {
                        b.append(&target_id.name);
                    }
                });
                let config = self.config();
                let is_element = matches!(target, ReferenceTarget::Element(_));
                let initializer = if (is_element && !config.check_type_of_dom_references)
                    || !config.check_type_of_non_dom_references
                {
                    ts_cast_to_any(&target_expr)
                } else if matches!(target, ReferenceTarget::Template(_)) {
                    let template_ref = self.env.reference_external_type(TEMPLATE_REF);
                    Expression::build(|b| {
                        b.append("(");
                        b.append_expr(&target_expr);
                        b.append(format!(" as any as {template_ref}<any>)"));
                    })
                } else {
                    target_expr
                };
                let stmt = ts_create_variable(&id, &initializer, VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::InvalidReference { reference } => {
                let id = self.allocate_id(Some(&reference.name), Some(reference.key_span));
                let stmt =
                    ts_create_variable(&id, &Expression::of(ANY_EXPRESSION), VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::ControlFlowContentProjection { element, component } => {
                self.run_content_projection_check(element, component);
                Ok(None)
            }
            TcbOp::UnclaimedInputs { element, claimed } => {
                self.run_unclaimed_inputs(scope, element, &claimed)
            }
            TcbOp::DirectiveOutputs { node, dir } => self.run_directive_outputs(scope, node, dir),
            TcbOp::UnclaimedOutputs { element, claimed } => {
                self.run_unclaimed_outputs(scope, element, &claimed)
            }
            TcbOp::BlockVariable { variable, initializer } => {
                let id = self.allocate_id(Some(&variable.name), Some(variable.key_span));
                let stmt = ts_create_variable(&id, &initializer, VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::BlockImplicitVariable { variable, ty } => {
                let id = self.allocate_id(Some(&variable.name), Some(variable.key_span));
                let stmt = ts_declare_variable(&id, ty, VarOpts::default());
                self.add_statement(scope, stmt);
                Ok(Some(id))
            }
            TcbOp::If(block) => {
                let mut expression_scopes = HashMap::new();
                if let Some(root) = self.generate_if_branch(scope, block, 0, &mut expression_scopes)? {
                    self.add_statement(scope, Statement::new(root));
                }
                Ok(None)
            }
            TcbOp::Switch(block) => self.run_switch(scope, block),
            TcbOp::ForOf(block) => self.run_for_of(scope, block),
        }
    }

    fn run_template_body(
        &mut self,
        scope: ScopeId,
        template: &'a TmplAstTemplate,
    ) -> Result<Option<Identifier>, TcbError> {
        let mut guards: SmallVec<[Expression; 2]> = SmallVec::new();
        for dir in &template.directives {
            for guard_meta in &dir.template_guards {
                let attr = template.inputs.get(&guard_meta.input_name).or_else(|| {
                    template.template_attrs.iter().find_map(|a| match a {
                        TmplAstAttribute::Bound(bound) if bound.name == guard_meta.input_name => {
                            Some(bound)
                        }
                        _ => None,
                    })
                });
                let Some(attr) = attr else { continue };
                let Some(value) = &attr.value else { continue };
                match guard_meta.kind {
                    TemplateGuardKind::Binding => {
                        let expr =
                            self.tcb_expression(scope, value, attr.value_mapping_offset)?;
                        guards.push(ignore_wrap(expr));
                    }
                    TemplateGuardKind::Invocation => {
                        let dir_inst =
                            self.resolve(scope, TcbRef::Template(template), Some(dir))?;
                        let dir_ref = self.env.reference(&dir.ts_class);
                        let expr =
                            self.tcb_expression(scope, value, attr.value_mapping_offset)?;
                        let span = value.ast.span().shift_right(attr.value_mapping_offset);
                        let input_name = &guard_meta.input_name;
                        guards.push(Expression::build(|b| {
                            b.with_source_span(Some(span), true, |b| {
                                b.append(format!("{dir_ref}.ngTemplateGuard_{input_name}("));
                                b.append(&dir_inst.name);
                                b.append(", ");
                                b.append_expr(&expr);
                                b.append(")");
                            });
                        }));
                    }
                }
            }
            if dir.has_template_context_guard {
                if self.config().apply_template_context_guards {
                    let dir_inst = self.resolve(scope, TcbRef::Template(template), Some(dir))?;
                    let ctx = self.resolve(scope, TcbRef::Template(template), None)?;
                    let dir_ref = self.env.reference(&dir.ts_class);
                    guards.push(Expression::build(|b| {
                        b.with_source_span(Some(template.start_source_span), true, |b| {
                            b.append(format!(
                                "{dir_ref}.ngTemplateContextGuard({}, {})",
                                dir_inst.name, ctx.name
                            ));
                        });
                    }));
                } else if !template.variables.is_empty()
                    && self.config().suggestions_for_suboptimal_type_inference
                {
                    let variables: Vec<&TmplAstVariable> = template.variables.iter().collect();
                    self.oob.suboptimal_type_inference(&variables);
                }
            }
        }
        guards.reverse();
        let guard = conjunction(&guards);
        let ctx = self.resolve(scope, TcbRef::Template(template), None)?;
        let child = self.scope_for_nodes(
            Some(scope),
            Some(ScopedNode::Template(template)),
            &template.children,
            guard.clone(),
        )?;
        let statements = self.render(child)?;
        if statements.is_empty() {
            return Ok(None);
        }
        let statement = Statement::new(Expression::build(|b| {
            if let Some(guard) = &guard {
                b.append("if (");
                b.append_expr(guard);
                b.append(") ");
            }
            b.code_block(|b| {
                b.append_id(&ctx, Mapped::at(template.start_source_span).context_var());
                b.append(";");
                b.new_line();
                for statement in &statements {
                    b.append_statement(statement);
                }
            });
        }));
        self.add_statement(scope, statement);
        Ok(None)
    }

    fn run_directive_ctor(
        &mut self,
        scope: ScopeId,
        node: TcbNode<'a>,
        dir: &'a TmplDirectiveMeta,
    ) -> Result<Option<Identifier>, TcbError> {
        let id = self.allocate_id(None, Some(node.start_source_span()));
        let mut args: IndexMap<&str, CtorArg> = IndexMap::new();
        for binding in get_bound_attributes(node, dir) {
            if binding.attr.is_text() && !self.config().check_type_of_attributes {
                continue;
            }
            let Some(field) = binding.input.field_name.as_deref() else { continue };
            if args.contains_key(field) {
                continue;
            }
            let expr = self.translate_attr_input(scope, binding.attr)?;
            args.insert(
                field,
                CtorArg::Bound {
                    expr,
                    is_literal: binding.attr.has_literal_value(),
                    is_two_way: binding.is_two_way,
                },
            );
        }
        for input in dir.inputs.values() {
            if let Some(field) = input.field_name.as_deref() {
                args.entry(field).or_insert(CtorArg::Unset);
            }
        }
        let ctor = self.env.type_ctor_for(dir);
        let call = self.tcb_call_type_ctor(&ctor, &args);
        // Inference through the constructor must not produce diagnostics of
        // its own; reverse-types mappings keep type lookups working.
        let initializer = Expression::build(|b| {
            b.with_ignore_mappings(|b| {
                b.with_support_reverse_types(|b| {
                    b.append_expr(&call);
                });
            });
        });
        let stmt = ts_create_variable(
            &id,
            &initializer,
            VarOpts {
                no_types: true,
                of_directive: Some(dir.name()),
                ignore_diagnostics: true,
                ..Default::default()
            },
        );
        self.add_statement(scope, stmt);
        Ok(Some(id))
    }

    fn tcb_call_type_ctor(&self, ctor: &str, args: &IndexMap<&str, CtorArg>) -> Expression {
        let config = self.config();
        Expression::build(|b| {
            b.append(ctor);
            b.append("({");
            for (i, (field, arg)) in args.iter().enumerate() {
                if i > 0 {
                    b.append(", ");
                }
                b.append(format!("\"{field}\": "));
                match arg {
                    CtorArg::Unset => {
                        b.append(ANY_EXPRESSION);
                    }
                    CtorArg::Bound { expr, is_literal, is_two_way } => {
                        let widened = widen_binding(expr.clone(), *is_literal, config);
                        let value = if *is_two_way && config.allow_signals_in_two_way_bindings {
                            self.unwrap_writable_signal(widened)
                        } else {
                            widened
                        };
                        b.append_expr(&value);
                    }
                }
            }
            b.append("})");
        })
    }

    fn unwrap_writable_signal(&self, expr: Expression) -> Expression {
        let unwrap_ref = self.env.reference_external_symbol(UNWRAP_WRITABLE_SIGNAL);
        Expression::build(|b| {
            b.append(unwrap_ref);
            b.append("(");
            b.append_expr(&expr);
            b.append(")");
        })
    }

    fn translate_attr_input(
        &mut self,
        scope: ScopeId,
        attr: AttrRef<'a>,
    ) -> Result<Expression, TcbError> {
        match attr {
            AttrRef::Bound(bound) => match &bound.value {
                // A valueless micro-syntax binding reads as the empty string;
                // a regular valueless binding reads as undefined.
                None => Ok(Expression::of(if bound.is_structural_directive {
                    "\"\""
                } else {
                    "undefined"
                })),
                Some(value) if matches!(value.ast, AST::EmptyExpr(_)) => {
                    Ok(Expression::of("undefined"))
                }
                Some(value) => self.tcb_expression(scope, value, bound.value_mapping_offset),
            },
            AttrRef::Text(text) => {
                Ok(Expression::of(format!("\"{}\"", escape_js_string(&text.value))))
            }
        }
    }

    fn run_directive_inputs(
        &mut self,
        scope: ScopeId,
        node: TcbNode<'a>,
        dir: &'a TmplDirectiveMeta,
    ) -> Result<Option<Identifier>, TcbError> {
        for binding in get_bound_attributes(node, dir) {
            let translated = self.translate_attr_input(scope, binding.attr)?;
            let widened =
                widen_binding(translated, binding.attr.has_literal_value(), self.config());
            let newly_transpiled = self.mark_attr_transpiled(binding.attr.key());
            let expr = if newly_transpiled { widened } else { ignore_wrap(widened) };
            let key_span = binding.attr.key_span();
            let assignment = match binding.input.field_name.as_deref() {
                None => Expression::build(|b| {
                    b.append("(");
                    b.append_expr(&expr);
                    b.append(")");
                }),
                Some(field) => {
                    let target = if binding.input.is_coerced && !binding.input.is_signal {
                        let temp = self.allocate_id(None, None);
                        let ty = match &binding.input.transform_type {
                            Some(ty) => ty.clone(),
                            None => format!(
                                "typeof {}.ngAcceptInputType_{field}",
                                self.env.reference(&dir.ts_class)
                            ),
                        };
                        self.add_statement(
                            scope,
                            ts_declare_variable(&temp, &ty, VarOpts::default()),
                        );
                        Expression::build(|b| match key_span {
                            Some(span) => {
                                b.append_id(&temp, Mapped::at(span).types());
                            }
                            None => {
                                b.append(&temp.name);
                            }
                        })
                    } else if binding.input.is_restricted
                        && !self.config().honor_access_modifiers_for_input_bindings
                    {
                        // Indexed access sidesteps the access modifier while
                        // keeping the field's declared type.
                        let dir_id = self.resolve(scope, node.as_ref(), Some(dir))?;
                        let temp = self.allocate_id(None, None);
                        let ty =
                            format!("{}[\"{}\"]", dir_id.name, escape_js_string(field));
                        self.add_statement(
                            scope,
                            ts_declare_variable(&temp, &ty, VarOpts::default()),
                        );
                        Expression::build(|b| match key_span {
                            Some(span) => {
                                b.append_id(&temp, Mapped::at(span).types());
                            }
                            None => {
                                b.append(&temp.name);
                            }
                        })
                    } else {
                        let dir_id = self.resolve(scope, node.as_ref(), Some(dir))?;
                        Expression::build(|b| {
                            b.append(&dir_id.name);
                            if is_valid_js_identifier(field) {
                                b.append(".");
                                match key_span {
                                    Some(span) => {
                                        b.append_mapped(field, Mapped::at(span).types());
                                    }
                                    None => {
                                        b.append(field);
                                    }
                                }
                            } else {
                                b.append(format!("[\"{}\"]", escape_js_string(field)));
                            }
                        })
                    };
                    let target = if binding.input.is_signal {
                        let brand =
                            self.env.reference_external_symbol(INPUT_SIGNAL_BRAND_WRITE_TYPE);
                        Expression::build(|b| {
                            b.append_expr(&target);
                            b.append(format!("[{brand}]"));
                        })
                    } else {
                        target
                    };
                    let value = if binding.is_two_way
                        && self.config().allow_signals_in_two_way_bindings
                    {
                        self.unwrap_writable_signal(expr)
                    } else {
                        expr
                    };
                    Expression::build(|b| {
                        b.with_source_span(key_span, false, |b| {
                            b.append_expr(&target);
                        });
                        b.append(" = ");
                        b.append_expr(&value);
                    })
                }
            };
            let assignment = if binding.attr.is_text() && !self.config().check_type_of_attributes
            {
                ignore_wrap(assignment)
            } else {
                assignment
            };
            self.add_expr_statement(scope, assignment);
        }
        Ok(None)
    }

    fn run_content_projection_check(
        &mut self,
        element: &'a TmplAstElement,
        component: &'a TmplDirectiveMeta,
    ) {
        let category = if self.config().control_flow_preventing_content_projection
            == ControlFlowPreventingContentProjectionKind::Error
        {
            DiagnosticCategory::Error
        } else {
            DiagnosticCategory::Warning
        };
        for child in &element.children {
            let group: Vec<&TmplAstNode> = match child {
                TmplAstNode::ForLoopBlock(block) => {
                    let mut group: Vec<&TmplAstNode> = block.children.iter().collect();
                    if let Some(empty) = &block.empty {
                        group.extend(empty.children.iter());
                    }
                    group
                }
                TmplAstNode::IfBlock(block) => {
                    block.branches.iter().flat_map(|branch| branch.children.iter()).collect()
                }
                TmplAstNode::SwitchBlock(block) => {
                    block.cases.iter().flat_map(|case| case.children.iter()).collect()
                }
                _ => continue,
            };
            // A single root node still projects into its slot; only multiple
            // roots break projection.
            if group.len() < 2 {
                continue;
            }
            for node in group {
                let (tag, span) = match node {
                    TmplAstNode::Element(el) => (Some(el.name.as_str()), el.start_source_span),
                    TmplAstNode::Template(t) => (t.tag.as_deref(), t.start_source_span),
                    _ => (None, TextRange::default()),
                };
                let Some(tag) = tag else { continue };
                if component.ng_content_selectors.iter().any(|s| s != "*" && s == tag) {
                    self.oob.control_flow_preventing_content_projection(
                        span,
                        category,
                        component.name(),
                        tag,
                    );
                }
            }
        }
    }

    fn run_unclaimed_inputs(
        &mut self,
        scope: ScopeId,
        element: &'a TmplAstElement,
        claimed: &IndexSet<String>,
    ) -> Result<Option<Identifier>, TcbError> {
        for (name, input) in &element.inputs {
            if claimed.contains(name.as_str())
                && matches!(input.binding_type, BindingType::Property | BindingType::TwoWay)
            {
                continue;
            }
            let Some(value) = &input.value else { continue };
            let expr = self.tcb_expression(scope, value, input.value_mapping_offset)?;
            let widened =
                widen_binding(expr, is_literal_binding_value(Some(value)), self.config());
            let statement = if self.config().check_type_of_dom_bindings
                && input.binding_type == BindingType::Property
                && name != "style"
                && name != "class"
            {
                let el_id = self.resolve(scope, TcbRef::Element(element), None)?;
                let prop = ATTR_TO_PROP_MAPPING.get(name.as_str()).copied().unwrap_or(name);
                Expression::build(|b| {
                    b.append(&el_id.name);
                    b.append("[\"");
                    match input.key_span {
                        Some(span) => {
                            b.append_mapped(prop, Mapped::at(span).types());
                        }
                        None => {
                            b.append(prop);
                        }
                    }
                    b.append("\"] = ");
                    b.append_expr(&widened);
                })
            } else {
                Expression::build(|b| {
                    b.append("(");
                    b.append_expr(&widened);
                    b.append(")");
                })
            };
            self.add_expr_statement(scope, statement);
        }
        Ok(None)
    }

    fn run_directive_outputs(
        &mut self,
        scope: ScopeId,
        node: TcbNode<'a>,
        dir: &'a TmplDirectiveMeta,
    ) -> Result<Option<Identifier>, TcbError> {
        for (name, output) in node.outputs() {
            if output.event_type == ParsedEventType::Animation {
                continue;
            }
            let Some(field) = dir.outputs.get(name) else { continue };
            if self.config().check_type_of_output_events && name.ends_with("Change") {
                let input_name = &name[..name.len() - "Change".len()];
                self.check_split_two_way_binding(input_name, output, node);
            }
            let dir_id = self.resolve(scope, node.as_ref(), Some(dir))?;
            let field_expr = Expression::build(|b| {
                b.append(&dir_id.name);
                b.append("[\"");
                b.append_mapped(&field.field_name, Mapped::at(output.key_span).types());
                b.append("\"]");
            });
            if self.config().check_type_of_output_events {
                let handler = self.create_event_handler(scope, output, EventParamType::Infer)?;
                let call = Expression::build(|b| {
                    b.append_expr(&field_expr);
                    b.append(".subscribe(");
                    b.append_expr(&handler);
                    b.append(")");
                });
                self.add_expr_statement(scope, call);
            } else {
                self.add_expr_statement(scope, field_expr);
                let handler = self.create_event_handler(scope, output, EventParamType::Any)?;
                self.add_expr_statement(scope, handler);
            }
        }
        Ok(None)
    }

    fn run_unclaimed_outputs(
        &mut self,
        scope: ScopeId,
        element: &'a TmplAstElement,
        claimed: &IndexSet<String>,
    ) -> Result<Option<Identifier>, TcbError> {
        for (name, output) in &element.outputs {
            if claimed.contains(name.as_str()) {
                continue;
            }
            if self.config().check_type_of_output_events && name.ends_with("Change") {
                let input_name = &name[..name.len() - "Change".len()];
                if self.check_split_two_way_binding(input_name, output, TcbNode::Element(element))
                {
                    continue;
                }
            }
            if output.event_type == ParsedEventType::Animation {
                let param = if self.config().check_type_of_animation_events {
                    EventParamType::Typed(self.env.reference_external_type(ANIMATION_EVENT))
                } else {
                    EventParamType::Any
                };
                let handler = self.create_event_handler(scope, output, param)?;
                self.add_expr_statement(scope, handler);
            } else if self.config().check_type_of_dom_events && !output.from_host_binding {
                let el_id = self.resolve(scope, TcbRef::Element(element), None)?;
                let handler = self.create_event_handler(scope, output, EventParamType::Infer)?;
                let call = Expression::build(|b| {
                    b.append(&el_id.name);
                    b.append(".addEventListener(\"");
                    b.append_mapped(name, Mapped::at(output.key_span).types());
                    b.append("\", ");
                    b.append_expr(&handler);
                    b.append(")");
                });
                self.add_expr_statement(scope, call);
            } else {
                let handler = self.create_event_handler(scope, output, EventParamType::Any)?;
                self.add_expr_statement(scope, handler);
            }
        }
        Ok(None)
    }

    fn create_event_handler(
        &mut self,
        scope: ScopeId,
        event: &'a TmplAstBoundEvent,
        param: EventParamType,
    ) -> Result<Expression, TcbError> {
        let mut handlers: SmallVec<[Expression; 1]> = SmallVec::with_capacity(event.handlers.len());
        for handler in &event.handlers {
            handlers.push(translate_expression(
                self,
                scope,
                Some(&handler.ast),
                &handler.source,
                event.handler_mapping_offset,
                TranslatorMode::EventHandler,
            )?);
        }
        let guard = self.guards(scope);
        let expr = Expression::build(|b| {
            b.append("(");
            b.append(EVENT_PARAMETER);
            match &param {
                EventParamType::Infer => {}
                EventParamType::Any => {
                    b.append(": any");
                }
                EventParamType::Typed(ty) => {
                    b.append(": ");
                    b.append(ty);
                }
            }
            b.append("): any => ");
            b.code_block(|b| {
                let emit_handlers = |b: &mut ExpressionBuilder| {
                    for handler in &handlers {
                        b.append_expr(handler);
                        b.append(";");
                        b.new_line();
                    }
                };
                match &guard {
                    Some(guard) => {
                        b.append("if (");
                        b.append_expr(guard);
                        b.append(") ");
                        b.code_block(emit_handlers);
                        b.new_line();
                    }
                    None => emit_handlers(b),
                }
            });
        });
        let newly_transpiled = self.mark_attr_transpiled(node_key(event));
        Ok(if event.event_type == ParsedEventType::TwoWay || !newly_transpiled {
            ignore_wrap(expr)
        } else {
            expr
        })
    }

    /// Reports a two-way binding written as separate `[x]` and `(xChange)`
    /// bindings whose halves resolve to different consumers.
    fn check_split_two_way_binding(
        &mut self,
        input_name: &str,
        output: &'a TmplAstBoundEvent,
        node: TcbNode<'a>,
    ) -> bool {
        let Some(input) = node.inputs().get(input_name) else { return false };
        if input.source_span != output.source_span {
            return false;
        }
        let Some(BindingConsumer::Directive(input_dir)) =
            self.bound_target.get_consumer_of_input(input)
        else {
            return false;
        };
        match self.bound_target.get_consumer_of_output(output) {
            Some(BindingConsumer::Element(el)) => {
                self.oob.split_two_way_binding(input_name, input.source_span, &el.name);
                true
            }
            Some(BindingConsumer::Directive(output_dir))
                if !std::ptr::eq(output_dir, input_dir) =>
            {
                self.oob.split_two_way_binding(
                    input_name,
                    input.source_span,
                    output_dir.name(),
                );
                true
            }
            _ => false,
        }
    }

    // ---- control flow blocks -----------------------------------------------

    fn generate_if_branch(
        &mut self,
        scope: ScopeId,
        block: &'a TmplAstIfBlock,
        index: usize,
        expression_scopes: &mut HashMap<usize, ScopeId>,
    ) -> Result<Option<Expression>, TcbError> {
        let Some(branch) = block.branches.get(index) else { return Ok(None) };
        let check = self.config().check_control_flow_bodies;
        let children: &'a [TmplAstNode] = if check { &branch.children } else { &[] };
        let Some(expression) = &branch.expression else {
            let body_scope = self.scope_for_nodes(Some(scope), None, children, None)?;
            let statements = self.render(body_scope)?;
            return Ok(Some(Expression::build(|b| {
                b.code_block(|b| {
                    for statement in &statements {
                        b.append_statement(statement);
                    }
                });
            })));
        };
        // The alias variable lives in a scope of its own so it is visible to
        // the branch body and to later branch guards, but not to siblings.
        let outer_scope =
            self.scope_for_nodes(Some(scope), Some(ScopedNode::IfBranch(branch)), &[], None)?;
        for statement in self.render(outer_scope)? {
            self.add_statement(scope, statement);
        }
        expression_scopes.insert(node_key(branch), outer_scope);
        let condition = match &branch.expression_alias {
            Some(alias) => {
                let ignored = ignore_wrap(self.tcb_expression(scope, expression, 0)?);
                let alias_id = self.resolve(outer_scope, TcbRef::Variable(alias), None)?;
                Expression::build(|b| {
                    b.append("(");
                    b.append_expr(&ignored);
                    b.append(format!(") && {}", alias_id.name));
                })
            }
            None => self.tcb_expression(scope, expression, 0)?,
        };
        let guard = if check {
            self.generate_branch_guard(block, index, expression_scopes)?
        } else {
            None
        };
        let body_scope = self.scope_for_nodes(Some(outer_scope), None, children, guard)?;
        let statements = self.render(body_scope)?;
        let next = self.generate_if_branch(scope, block, index + 1, expression_scopes)?;
        Ok(Some(Expression::build(|b| {
            b.append("if (");
            b.append_expr(&condition);
            b.append(") ");
            b.code_block(|b| {
                for statement in &statements {
                    b.append_statement(statement);
                }
            });
            if let Some(next) = &next {
                b.new_line();
                b.append("else ");
                b.append_expr(next);
            }
        })))
    }

    /// Narrowing guard for an `@if` branch body: earlier conditions negated,
    /// the branch's own condition as-is.
    fn generate_branch_guard(
        &mut self,
        block: &'a TmplAstIfBlock,
        index: usize,
        expression_scopes: &HashMap<usize, ScopeId>,
    ) -> Result<Option<Expression>, TcbError> {
        let mut parts = Vec::new();
        for (i, branch) in block.branches.iter().enumerate().take(index + 1) {
            let Some(expression) = &branch.expression else { continue };
            let branch_scope = expression_scopes[&node_key(branch)];
            let translated = ignore_wrap(self.tcb_expression(branch_scope, expression, 0)?);
            parts.push(if i == index {
                translated
            } else {
                Expression::build(|b| {
                    b.append("!(");
                    b.append_expr(&translated);
                    b.append(")");
                })
            });
        }
        Ok(conjunction(&parts))
    }

    fn run_switch(
        &mut self,
        scope: ScopeId,
        block: &'a TmplAstSwitchBlock,
    ) -> Result<Option<Identifier>, TcbError> {
        let switch_expr = self.tcb_expression(scope, &block.expression, 0)?;
        let check = self.config().check_control_flow_bodies;
        let mut guards: Vec<Option<Expression>> = Vec::with_capacity(block.cases.len());
        if check {
            let switch_ignored = ignore_wrap(self.tcb_expression(scope, &block.expression, 0)?);
            let mut case_exprs = Vec::with_capacity(block.cases.len());
            for case in &block.cases {
                case_exprs.push(match &case.expression {
                    Some(expression) => {
                        Some(ignore_wrap(self.tcb_expression(scope, expression, 0)?))
                    }
                    None => None,
                });
            }
            for case_expr in &case_exprs {
                guards.push(match case_expr {
                    Some(case_expr) => Some(Expression::build(|b| {
                        b.append_expr(&switch_ignored);
                        b.append(" === ");
                        b.append_expr(case_expr);
                    })),
                    // The default clause holds when no other case matched.
                    None => {
                        let negations: Vec<Expression> = case_exprs
                            .iter()
                            .flatten()
                            .map(|case_expr| {
                                Expression::build(|b| {
                                    b.append_expr(&switch_ignored);
                                    b.append(" !== ");
                                    b.append_expr(case_expr);
                                })
                            })
                            .collect();
                        conjunction(&negations)
                    }
                });
            }
        } else {
            guards.resize_with(block.cases.len(), || None);
        }
        let mut rendered = Vec::with_capacity(block.cases.len());
        for (case, guard) in block.cases.iter().zip(guards) {
            let children: &'a [TmplAstNode] = if check { &case.children } else { &[] };
            let clause_scope = self.scope_for_nodes(Some(scope), None, children, guard)?;
            let case_expr = match &case.expression {
                Some(expression) => Some(self.tcb_expression(clause_scope, expression, 0)?),
                None => None,
            };
            rendered.push((case_expr, self.render(clause_scope)?));
        }
        let statement = Statement::new(Expression::build(|b| {
            b.append("switch (");
            b.append_expr(&switch_expr);
            b.append(") ");
            b.code_block(|b| {
                for (case_expr, statements) in &rendered {
                    match case_expr {
                        Some(case_expr) => {
                            b.append("case ");
                            b.append_expr(case_expr);
                            b.append(":");
                            b.new_line();
                        }
                        None => {
                            b.append("default:");
                            b.new_line();
                        }
                    }
                    for statement in statements {
                        b.append_statement(statement);
                    }
                    b.append("break;");
                    b.new_line();
                }
            });
        }));
        self.add_statement(scope, statement);
        Ok(None)
    }

    fn run_for_of(
        &mut self,
        scope: ScopeId,
        block: &'a TmplAstForLoopBlock,
    ) -> Result<Option<Identifier>, TcbError> {
        let check = self.config().check_control_flow_bodies;
        let children: &'a [TmplAstNode] = if check { &block.children } else { &[] };
        let loop_scope =
            self.scope_for_nodes(Some(scope), Some(ScopedNode::ForLoop(block)), children, None)?;
        let item_id = block.item.as_ref().and_then(|item| {
            match self.scopes[loop_scope.0].var_map.get(&node_key(item)) {
                Some(VarEntry::Id(id)) => Some(id.clone()),
                _ => None,
            }
        });
        let expr = self.tcb_expression(scope, &block.expression, 0)?;
        let mut statements = self.render(loop_scope)?;
        let track = match &block.track_by {
            Some(track) => Some(translate_expression(
                self,
                loop_scope,
                Some(&track.ast),
                &track.source,
                0,
                TranslatorMode::ForLoopTrack(block),
            )?),
            None => None,
        };
        // Track resolution can demand context variables that were elided
        // during rendering; their declarations land after the render.
        statements.extend(std::mem::take(&mut self.scopes[loop_scope.0].statements));
        let statement = Statement::new(Expression::build(|b| {
            b.append("for (const ");
            match (&block.item, &item_id) {
                (Some(item), Some(id)) => {
                    b.append_id(id, Mapped::at(item.key_span).types());
                }
                _ => {
                    b.append("__error");
                }
            }
            b.append(" of (");
            b.append_expr(&expr);
            b.append(")!) ");
            b.code_block(|b| {
                for statement in &statements {
                    b.append_statement(statement);
                }
                if let Some(track) = &track {
                    b.append("(");
                    b.append_expr(track);
                    b.append(");");
                    b.new_line();
                }
            });
        }));
        self.add_statement(scope, statement);
        Ok(None)
    }
}

/// One argument of an inline type constructor call.
enum CtorArg {
    Bound { expr: Expression, is_literal: bool, is_two_way: bool },
    Unset,
}

fn conjunction(parts: &[Expression]) -> Option<Expression> {
    if parts.is_empty() {
        return None;
    }
    Some(Expression::build(|b| {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                b.append(" && ");
            }
            b.append_expr(part);
        }
    }))
}

pub(crate) use translator::{translate_expression, TranslatorMode};

mod translator {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum TranslatorMode<'a> {
        Normal,
        /// `$event` resolves to the handler parameter and `@let` order checks
        /// are suspended.
        EventHandler,
        /// Only the loop item, `$index` and component members are readable.
        ForLoopTrack(&'a TmplAstForLoopBlock),
    }

    pub(crate) fn translate_expression<'a>(
        tcb: &mut Tcb<'a>,
        scope: ScopeId,
        ast: Option<&'a AST>,
        source: &'a str,
        offset: usize,
        mode: TranslatorMode<'a>,
    ) -> Result<Expression, TcbError> {
        Expression::try_build(|b| {
            b.try_with_mappings_offset(offset, |b| match ast {
                None => {
                    b.append("undefined");
                    Ok(())
                }
                Some(ast) => {
                    let mut translator = ExpressionTranslator { tcb, scope, source, offset, mode };
                    translator.translate(b, ast)
                }
            })?;
            Ok(())
        })
    }

    struct ExpressionTranslator<'t, 'a> {
        tcb: &'t mut Tcb<'a>,
        scope: ScopeId,
        source: &'a str,
        /// Shift applied to expression-local spans to reach host file
        /// coordinates. Non-zero only for inline fragments such as host
        /// binding values.
        offset: usize,
        mode: TranslatorMode<'a>,
    }

    /// Receivers the legacy view engine inferred as `any`, keeping safe
    /// navigation on them loose instead of strict.
    fn receiver_inferred_as_any(ast: &AST) -> bool {
        match ast {
            AST::Call(_) | AST::SafeCall(_) => true,
            AST::LiteralArray(_) | AST::LiteralMap(_) => true,
            AST::BindingPipe(_) => true,
            AST::Unary(u) => receiver_inferred_as_any(&u.expr),
            AST::PrefixNot(n) => receiver_inferred_as_any(&n.expression),
            AST::NonNullAssert(n) => receiver_inferred_as_any(&n.expression),
            AST::ParenthesizedExpression(p) => receiver_inferred_as_any(&p.expression),
            AST::Binary(b) => {
                receiver_inferred_as_any(&b.left) || receiver_inferred_as_any(&b.right)
            }
            AST::Conditional(c) => {
                receiver_inferred_as_any(&c.true_exp) || receiver_inferred_as_any(&c.false_exp)
            }
            _ => false,
        }
    }

    impl<'t, 'a> ExpressionTranslator<'t, 'a> {
        fn config(&self) -> &TypeCheckingConfig {
            self.tcb.config()
        }

        /// Copies the literal source text between two generated pieces, so
        /// operators and punctuation keep their exact characters.
        fn gap(&self, b: &mut ExpressionBuilder, from: usize, to: usize) {
            if to > from && to <= self.source.len() {
                b.append(&self.source[from..to]);
            }
        }

        fn emit_with_gaps(
            &mut self,
            b: &mut ExpressionBuilder,
            span: TextRange,
            children: &[&'a AST],
        ) -> Result<(), TcbError> {
            let mut pos = span.start;
            for child in children {
                let child_span = child.span();
                self.gap(b, pos, child_span.start);
                self.translate(b, child)?;
                pos = pos.max(child_span.end);
            }
            self.gap(b, pos, span.end);
            Ok(())
        }

        fn composite_with_gaps(
            &mut self,
            b: &mut ExpressionBuilder,
            span: TextRange,
            children: &[&'a AST],
        ) -> Result<(), TcbError> {
            b.try_with_source_span(Some(span), true, |b| self.emit_with_gaps(b, span, children))?;
            Ok(())
        }

        pub(super) fn translate(
            &mut self,
            b: &mut ExpressionBuilder,
            ast: &'a AST,
        ) -> Result<(), TcbError> {
            match ast {
                AST::EmptyExpr(e) => {
                    self.gap(b, e.span.start, e.span.end);
                    Ok(())
                }
                AST::ImplicitReceiver(_) => Ok(()),
                AST::ThisReceiver(t) => {
                    b.append_mapped("this", Mapped::at(t.span).types());
                    Ok(())
                }
                AST::Chain(chain) => {
                    let children: Vec<&AST> =
                        chain.expressions.iter().map(|e| e.as_ref()).collect();
                    self.composite_with_gaps(b, chain.span, &children)
                }
                AST::Conditional(cond) => self.composite_with_gaps(
                    b,
                    cond.span,
                    &[&cond.condition, &cond.true_exp, &cond.false_exp],
                ),
                AST::PropertyRead(read) => {
                    if read.receiver.is_implicit_or_this_receiver() {
                        let qualified = matches!(*read.receiver, AST::ThisReceiver(_));
                        self.emit_read_target(
                            b,
                            ast,
                            read.span,
                            read.name_span,
                            &read.name,
                            qualified,
                        )
                    } else {
                        b.try_with_source_span(Some(read.span), true, |b| {
                            self.translate(b, &read.receiver)?;
                            self.gap(b, read.receiver.span().end, read.name_span.start);
                            b.append_mapped(&read.name, Mapped::at(read.name_span).types());
                            Ok(())
                        })?;
                        Ok(())
                    }
                }
                AST::SafePropertyRead(read) => {
                    b.try_with_source_span(Some(read.span), true, |b| {
                        if self.config().strict_safe_navigation_types {
                            b.append("(");
                            b.append(ANY_EXPRESSION);
                            b.append(" ? (");
                            self.translate(b, &read.receiver)?;
                            b.append(")!.");
                            b.append_mapped(&read.name, Mapped::at(read.name_span).types());
                            b.append(" : undefined)");
                        } else if receiver_inferred_as_any(&read.receiver) {
                            b.append("((");
                            self.translate(b, &read.receiver)?;
                            b.append(") as any).");
                            b.append_mapped(&read.name, Mapped::at(read.name_span).types());
                        } else {
                            b.append("((");
                            self.translate(b, &read.receiver)?;
                            b.append(")!.");
                            b.append_mapped(&read.name, Mapped::at(read.name_span).types());
                            b.append(" as any)");
                        }
                        Ok(())
                    })?;
                    Ok(())
                }
                AST::KeyedRead(read) => {
                    self.composite_with_gaps(b, read.span, &[&read.receiver, &read.key])
                }
                AST::SafeKeyedRead(read) => {
                    b.try_with_source_span(Some(read.span), true, |b| {
                        if self.config().strict_safe_navigation_types {
                            b.append("(");
                            b.append(ANY_EXPRESSION);
                            b.append(" ? (");
                            self.translate(b, &read.receiver)?;
                            b.append(")![");
                            self.translate(b, &read.key)?;
                            b.append("] : undefined)");
                        } else if receiver_inferred_as_any(&read.receiver) {
                            b.append("((");
                            self.translate(b, &read.receiver)?;
                            b.append(") as any)[");
                            self.translate(b, &read.key)?;
                            b.append("]");
                        } else {
                            b.append("((");
                            self.translate(b, &read.receiver)?;
                            b.append(")![");
                            self.translate(b, &read.key)?;
                            b.append("] as any)");
                        }
                        Ok(())
                    })?;
                    Ok(())
                }
                AST::PropertyWrite(write) => {
                    if write.receiver.is_implicit_or_this_receiver() {
                        self.emit_write_target(b, ast, write)
                    } else {
                        b.try_with_source_span(Some(write.span), true, |b| {
                            self.translate(b, &write.receiver)?;
                            self.gap(b, write.receiver.span().end, write.name_span.start);
                            b.append_mapped(&write.name, Mapped::at(write.name_span).types());
                            self.gap(b, write.name_span.end, write.value.span().start);
                            self.translate(b, &write.value)
                        })?;
                        Ok(())
                    }
                }
                AST::KeyedWrite(write) => self.composite_with_gaps(
                    b,
                    write.span,
                    &[&write.receiver, &write.key, &write.value],
                ),
                AST::BindingPipe(pipe) => self.translate_pipe(b, pipe),
                AST::LiteralPrimitive(lit) => {
                    let text = if lit.span.end <= self.source.len() && !lit.span.is_empty() {
                        lit.span.text_of(self.source)
                    } else {
                        "undefined"
                    };
                    b.append_mapped(text, Mapped::at(lit.span).types());
                    Ok(())
                }
                AST::LiteralArray(array) => {
                    let wrap = !self.config().strict_literal_types;
                    b.try_with_source_span(Some(array.span), true, |b| {
                        if wrap {
                            b.append("(");
                        }
                        let children: Vec<&AST> =
                            array.expressions.iter().map(|e| e.as_ref()).collect();
                        self.emit_with_gaps(b, array.span, &children)?;
                        if wrap {
                            b.append(" as any)");
                        }
                        Ok(())
                    })?;
                    Ok(())
                }
                AST::LiteralMap(map) => {
                    let wrap = !self.config().strict_literal_types;
                    b.try_with_source_span(Some(map.span), true, |b| {
                        if wrap {
                            b.append("(");
                        }
                        let children: Vec<&AST> = map.values.iter().map(|e| e.as_ref()).collect();
                        self.emit_with_gaps(b, map.span, &children)?;
                        if wrap {
                            b.append(" as any)");
                        }
                        Ok(())
                    })?;
                    Ok(())
                }
                AST::Interpolation(interpolation) => {
                    for (i, expression) in interpolation.expressions.iter().enumerate() {
                        if i > 0 {
                            b.append(" + ");
                        }
                        self.translate(b, expression)?;
                    }
                    Ok(())
                }
                AST::Binary(binary) => {
                    self.composite_with_gaps(b, binary.span, &[&binary.left, &binary.right])
                }
                AST::Unary(unary) => self.composite_with_gaps(b, unary.span, &[&unary.expr]),
                AST::PrefixNot(not) => {
                    self.composite_with_gaps(b, not.span, &[&not.expression])
                }
                AST::NonNullAssert(assert) => {
                    self.composite_with_gaps(b, assert.span, &[&assert.expression])
                }
                AST::Call(call) => {
                    if let Some(arg) = any_cast_argument(call) {
                        b.try_with_source_span(Some(call.span), true, |b| {
                            b.append("(");
                            self.translate(b, arg)?;
                            b.append(" as any)");
                            Ok(())
                        })?;
                        Ok(())
                    } else {
                        let mut children: Vec<&AST> = vec![&call.receiver];
                        children.extend(call.args.iter().map(|a| a.as_ref()));
                        self.composite_with_gaps(b, call.span, &children)
                    }
                }
                AST::SafeCall(call) => self.translate_safe_call(b, call),
                AST::ParenthesizedExpression(paren) => {
                    self.composite_with_gaps(b, paren.span, &[&paren.expression])
                }
            }
        }

        fn translate_pipe(
            &mut self,
            b: &mut ExpressionBuilder,
            pipe: &'a crate::expression_parser::ast::BindingPipe,
        ) -> Result<(), TcbError> {
            let pipe_ref = match self.tcb.bound_target.get_pipe_by_name(&pipe.name) {
                None => {
                    self.tcb.oob.missing_pipe(&pipe.name, pipe.name_span.shift_right(self.offset));
                    None
                }
                Some(meta)
                    if meta.is_explicitly_deferred
                        && self.tcb.bound_target.is_pipe_eagerly_used(&pipe.name) =>
                {
                    let span = pipe.name_span.shift_right(self.offset);
                    self.tcb.oob.deferred_pipe_used_eagerly(span, &pipe.name);
                    None
                }
                Some(meta) => Some(self.tcb.env.pipe_inst(meta)),
            };
            let check = self.config().check_type_of_pipes;
            b.try_with_source_span(Some(pipe.span), true, |b| {
                if !check {
                    b.append("(");
                }
                match &pipe_ref {
                    Some(id) => {
                        b.append(&id.name);
                    }
                    None => {
                        b.append("(");
                        b.append(ANY_EXPRESSION);
                        b.append(")");
                    }
                }
                b.append(".");
                b.append_mapped("transform", Mapped::at(pipe.name_span).types());
                if !check {
                    b.append(" as any)");
                }
                b.append("(");
                self.translate(b, &pipe.exp)?;
                for arg in &pipe.args {
                    b.append(", ");
                    self.translate(b, arg)?;
                }
                b.append(")");
                Ok(())
            })?;
            Ok(())
        }

        fn translate_safe_call(
            &mut self,
            b: &mut ExpressionBuilder,
            call: &'a crate::expression_parser::ast::SafeCall,
        ) -> Result<(), TcbError> {
            let receiver_span = call.receiver.span();
            if self.config().strict_safe_navigation_types {
                b.append("(");
                b.append(ANY_EXPRESSION);
                b.append(" ? ");
                b.try_with_source_span(Some(receiver_span), true, |b| {
                    b.append("(");
                    self.translate(b, &call.receiver)?;
                    b.append(")");
                    b.remove_mappings(receiver_span);
                    b.append("!");
                    Ok(())
                })?;
                b.append("(");
                self.translate_args(b, &call.args)?;
                b.append(") : undefined)");
            } else if receiver_inferred_as_any(&call.receiver) {
                b.try_with_source_span(Some(receiver_span), true, |b| {
                    b.append("((");
                    self.translate(b, &call.receiver)?;
                    b.append(") as any)");
                    b.remove_mappings(receiver_span);
                    Ok(())
                })?;
                b.append("(");
                self.translate_args(b, &call.args)?;
                b.append(")");
            } else {
                b.append("(");
                b.try_with_source_span(Some(receiver_span), true, |b| {
                    b.append("(");
                    self.translate(b, &call.receiver)?;
                    b.append(")!");
                    b.remove_mappings(receiver_span);
                    Ok(())
                })?;
                b.append("(");
                self.translate_args(b, &call.args)?;
                b.append(") as any)");
            }
            Ok(())
        }

        fn translate_args(
            &mut self,
            b: &mut ExpressionBuilder,
            args: &'a [Box<AST>],
        ) -> Result<(), TcbError> {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    b.append(", ");
                }
                self.translate(b, arg)?;
            }
            Ok(())
        }

        fn check_for_loop_track_access(
            &mut self,
            target: Option<TemplateEntity<'a>>,
            span: TextRange,
            name: &str,
        ) {
            let TranslatorMode::ForLoopTrack(block) = self.mode else {
                return;
            };
            let Some(entity) = target else {
                return;
            };
            let allowed = match entity {
                TemplateEntity::Variable(v) => {
                    block.item.as_ref().map_or(false, |item| std::ptr::eq(item, v))
                        || block
                            .context_variables
                            .values()
                            .any(|cv| cv.value == "$index" && std::ptr::eq(cv, v))
                }
                _ => false,
            };
            if !allowed {
                self.tcb.oob.illegal_for_loop_track_access(span.shift_right(self.offset), name);
            }
        }

        fn is_valid_let_access(&self, decl: &TmplAstLetDeclaration, use_span: TextRange) -> bool {
            if matches!(self.mode, TranslatorMode::EventHandler) {
                return true;
            }
            (decl.source_span.start < use_span.start && use_span.start > decl.source_span.end)
                || !self.tcb.is_local(self.scope, TcbRef::Let(decl))
        }

        fn emit_read_target(
            &mut self,
            b: &mut ExpressionBuilder,
            ast: &'a AST,
            span: TextRange,
            name_span: TextRange,
            name: &str,
            qualified: bool,
        ) -> Result<(), TcbError> {
            if matches!(self.mode, TranslatorMode::EventHandler)
                && !qualified
                && name == EVENT_PARAMETER
            {
                b.append_mapped(EVENT_PARAMETER, Mapped::at(span).types());
                return Ok(());
            }
            if !qualified && name == "undefined" {
                b.append_mapped("undefined", Mapped::at(span).types());
                return Ok(());
            }
            let target = self.tcb.bound_target.get_expression_target(ast);
            self.check_for_loop_track_access(target, span, name);
            match target {
                None => {
                    if qualified {
                        b.append_mapped(span.text_of(self.source), Mapped::at(span).types());
                    } else {
                        b.try_with_source_span::<TcbError>(Some(span), true, |b| {
                            b.append("this.");
                            b.append_mapped(name, Mapped::at(span));
                            Ok(())
                        })?;
                    }
                    Ok(())
                }
                Some(entity) => {
                    let id = self.tcb.resolve(self.scope, entity_ref(entity), None)?;
                    if let TemplateEntity::Let(decl) = entity {
                        if !self.is_valid_let_access(decl, span) {
                            let use_span = name_span.shift_right(self.offset);
                            self.tcb.oob.let_used_before_definition(use_span, &decl.name);
                            b.append("(");
                            b.append_id(&id, Mapped::at(span).types());
                            b.append(" as any)");
                            return Ok(());
                        }
                    }
                    b.append_id(&id, Mapped::at(span).types());
                    Ok(())
                }
            }
        }

        fn emit_write_target(
            &mut self,
            b: &mut ExpressionBuilder,
            ast: &'a AST,
            write: &'a crate::expression_parser::ast::PropertyWrite,
        ) -> Result<(), TcbError> {
            let qualified = matches!(*write.receiver, AST::ThisReceiver(_));
            let target = self.tcb.bound_target.get_expression_target(ast);
            b.try_with_source_span(Some(write.span), true, |b| {
                match target {
                    None => {
                        if qualified {
                            self.gap(b, write.span.start, write.name_span.start);
                        } else {
                            b.append("this.");
                        }
                        b.append_mapped(&write.name, Mapped::at(write.name_span).types());
                    }
                    Some(TemplateEntity::Let(decl)) => {
                        self.tcb.oob.illegal_write_to_let_declaration(
                            write.name_span.shift_right(self.offset),
                            &decl.name,
                        );
                        let id = self.tcb.resolve(self.scope, TcbRef::Let(decl), None)?;
                        b.with_ignore_mappings(|b| {
                            b.append_id(&id, Mapped::at(write.name_span).types());
                        });
                    }
                    Some(entity) => {
                        let id = self.tcb.resolve(self.scope, entity_ref(entity), None)?;
                        b.append_id(&id, Mapped::at(write.name_span).types());
                    }
                }
                self.gap(b, write.name_span.end, write.value.span().start);
                self.translate(b, &write.value)
            })?;
            Ok(())
        }
    }

    /// Matches `$any(expr)`: a call of the unqualified name `$any` with a
    /// single argument.
    fn any_cast_argument<'a>(call: &'a crate::expression_parser::ast::Call) -> Option<&'a AST> {
        if call.args.len() != 1 {
            return None;
        }
        match call.receiver.unwrap_parens() {
            AST::PropertyRead(read)
                if read.name == "$any" && matches!(*read.receiver, AST::ImplicitReceiver(_)) =>
            {
                Some(&call.args[0])
            }
            _ => None,
        }
    }
}
