//! Template target binding
//!
//! A pre-pass over the template that resolves what every implicit-receiver
//! property access refers to (component member, template variable, local
//! reference or `@let` declaration), which directive or node consumes each
//! binding, and which nodes sit inside `@defer` blocks. The generator
//! consults the result instead of re-deriving scope.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::expression_parser::ast::AST;
use crate::template::ast::{
    node_key, TmplAstAttribute, TmplAstBoundAttribute, TmplAstBoundEvent, TmplAstElement,
    TmplAstLetDeclaration, TmplAstNode, TmplAstReference, TmplAstTemplate, TmplAstVariable,
};
use crate::template::meta::{PipeMeta, TmplDirectiveMeta};

/// A named entity an expression can resolve to instead of the component
/// instance.
#[derive(Debug, Clone, Copy)]
pub enum TemplateEntity<'a> {
    Variable(&'a TmplAstVariable),
    Reference(&'a TmplAstReference),
    Let(&'a TmplAstLetDeclaration),
}

/// What a local reference points at.
#[derive(Debug, Clone, Copy)]
pub enum ReferenceTarget<'a> {
    Element(&'a TmplAstElement),
    Template(&'a TmplAstTemplate),
    DirectiveOnElement(&'a TmplAstElement, &'a TmplDirectiveMeta),
    DirectiveOnTemplate(&'a TmplAstTemplate, &'a TmplDirectiveMeta),
}

/// The directive or node a binding is matched against.
#[derive(Debug, Clone, Copy)]
pub enum BindingConsumer<'a> {
    Directive(&'a TmplDirectiveMeta),
    Element(&'a TmplAstElement),
    Template(&'a TmplAstTemplate),
}

/// Result of binding one template.
#[derive(Debug, Default)]
pub struct BoundTarget<'a> {
    expr_targets: HashMap<usize, TemplateEntity<'a>>,
    reference_targets: HashMap<usize, ReferenceTarget<'a>>,
    consumers: HashMap<usize, BindingConsumer<'a>>,
    pipes: IndexMap<&'a str, &'a PipeMeta>,
    eagerly_used_pipes: IndexSet<String>,
    deferred_nodes: HashSet<usize>,
}

impl<'a> BoundTarget<'a> {
    pub fn bind(roots: &'a [TmplAstNode], pipes: impl IntoIterator<Item = &'a PipeMeta>) -> Self {
        let mut binder = Binder {
            target: BoundTarget {
                pipes: pipes.into_iter().map(|p| (p.name.as_str(), p)).collect(),
                ..Default::default()
            },
            frames: Vec::new(),
        };
        binder.process_scope(roots, Vec::new(), false);
        binder.target
    }

    /// Returns the entity an implicit-receiver access resolves to, keyed by
    /// the access node itself. `None` means the access reads the component.
    pub fn get_expression_target(&self, ast: &AST) -> Option<TemplateEntity<'a>> {
        self.expr_targets.get(&node_key(ast)).copied()
    }

    /// Returns what the reference points at. `None` means no directive
    /// matched the requested `exportAs`.
    pub fn get_reference_target(
        &self,
        reference: &TmplAstReference,
    ) -> Option<ReferenceTarget<'a>> {
        self.reference_targets.get(&node_key(reference)).copied()
    }

    pub fn get_consumer_of_input(
        &self,
        input: &TmplAstBoundAttribute,
    ) -> Option<BindingConsumer<'a>> {
        self.consumers.get(&node_key(input)).copied()
    }

    pub fn get_consumer_of_output(
        &self,
        output: &TmplAstBoundEvent,
    ) -> Option<BindingConsumer<'a>> {
        self.consumers.get(&node_key(output)).copied()
    }

    pub fn get_pipe_by_name(&self, name: &str) -> Option<&'a PipeMeta> {
        self.pipes.get(name).copied()
    }

    /// The pipe appears in at least one expression outside any `@defer`
    /// block.
    pub fn is_pipe_eagerly_used(&self, name: &str) -> bool {
        self.eagerly_used_pipes.contains(name)
    }

    /// The node sits inside the main content of a `@defer` block.
    pub fn is_deferred_element(&self, element: &TmplAstElement) -> bool {
        self.deferred_nodes.contains(&node_key(element))
    }

    pub fn is_deferred_template(&self, template: &TmplAstTemplate) -> bool {
        self.deferred_nodes.contains(&node_key(template))
    }
}

struct Binder<'a> {
    target: BoundTarget<'a>,
    frames: Vec<IndexMap<String, TemplateEntity<'a>>>,
}

impl<'a> Binder<'a> {
    fn lookup(&self, name: &str) -> Option<TemplateEntity<'a>> {
        self.frames.iter().rev().find_map(|frame| frame.get(name).copied())
    }

    /// Processes a scope level: seeds the frame with the scoped node's own
    /// variables, hoists references and `@let` declarations so they are
    /// visible to every sibling, then walks the nodes.
    fn process_scope(
        &mut self,
        nodes: &'a [TmplAstNode],
        seed: Vec<(&'a str, TemplateEntity<'a>)>,
        in_defer: bool,
    ) {
        let mut frame = IndexMap::new();
        for (name, entity) in seed {
            frame.entry(name.to_string()).or_insert(entity);
        }
        for node in nodes {
            match node {
                TmplAstNode::Element(el) => {
                    for reference in el.references.values() {
                        frame
                            .entry(reference.name.clone())
                            .or_insert(TemplateEntity::Reference(reference));
                    }
                }
                TmplAstNode::Template(tmpl) => {
                    for reference in tmpl.references.values() {
                        frame
                            .entry(reference.name.clone())
                            .or_insert(TemplateEntity::Reference(reference));
                    }
                }
                TmplAstNode::LetDeclaration(decl) => {
                    frame.entry(decl.name.clone()).or_insert(TemplateEntity::Let(decl));
                }
                _ => {}
            }
        }
        self.frames.push(frame);
        for node in nodes {
            self.visit_node(node, in_defer);
        }
        self.frames.pop();
    }

    fn visit_node(&mut self, node: &'a TmplAstNode, in_defer: bool) {
        match node {
            TmplAstNode::Element(el) => self.visit_element(el, in_defer),
            TmplAstNode::Template(tmpl) => self.visit_template(tmpl, in_defer),
            TmplAstNode::Content(content) => {
                for child in &content.children {
                    self.visit_node(child, in_defer);
                }
            }
            TmplAstNode::BoundText(text) => self.visit_expression(&text.value.ast, in_defer),
            TmplAstNode::IfBlock(block) => {
                for branch in &block.branches {
                    if let Some(expression) = &branch.expression {
                        self.visit_expression(&expression.ast, in_defer);
                    }
                    let seed = branch
                        .expression_alias
                        .as_ref()
                        .map(|alias| (alias.name.as_str(), TemplateEntity::Variable(alias)))
                        .into_iter()
                        .collect();
                    self.process_scope(&branch.children, seed, in_defer);
                }
            }
            TmplAstNode::SwitchBlock(block) => {
                self.visit_expression(&block.expression.ast, in_defer);
                for case in &block.cases {
                    if let Some(expression) = &case.expression {
                        self.visit_expression(&expression.ast, in_defer);
                    }
                    self.process_scope(&case.children, Vec::new(), in_defer);
                }
            }
            TmplAstNode::ForLoopBlock(block) => {
                self.visit_expression(&block.expression.ast, in_defer);
                let mut seed: Vec<(&str, TemplateEntity)> = Vec::new();
                if let Some(item) = &block.item {
                    seed.push((item.name.as_str(), TemplateEntity::Variable(item)));
                }
                for variable in block.context_variables.values() {
                    seed.push((variable.name.as_str(), TemplateEntity::Variable(variable)));
                }
                if let Some(track) = &block.track_by {
                    // Track expressions resolve against the loop scope.
                    self.frames.push(seed.iter().map(|(n, e)| (n.to_string(), *e)).collect());
                    self.visit_expression(&track.ast, in_defer);
                    self.frames.pop();
                }
                self.process_scope(&block.children, seed, in_defer);
                if let Some(empty) = &block.empty {
                    self.process_scope(&empty.children, Vec::new(), in_defer);
                }
            }
            TmplAstNode::DeferredBlock(block) => {
                for triggers in
                    [&block.triggers, &block.prefetch_triggers, &block.hydrate_triggers]
                {
                    if let Some(when) = &triggers.when_trigger {
                        self.visit_expression(&when.ast, in_defer);
                    }
                }
                self.mark_deferred(&block.children);
                self.process_scope(&block.children, Vec::new(), true);
                if let Some(placeholder) = &block.placeholder {
                    self.process_scope(&placeholder.children, Vec::new(), in_defer);
                }
                if let Some(loading) = &block.loading {
                    self.process_scope(&loading.children, Vec::new(), in_defer);
                }
                if let Some(error) = &block.error {
                    self.process_scope(&error.children, Vec::new(), in_defer);
                }
            }
            TmplAstNode::LetDeclaration(decl) => {
                self.visit_expression(&decl.value.ast, in_defer);
            }
        }
    }

    fn visit_element(&mut self, el: &'a TmplAstElement, in_defer: bool) {
        for reference in el.references.values() {
            let target = resolve_reference_on_element(el, reference);
            if let Some(target) = target {
                self.target.reference_targets.insert(node_key(reference), target);
            }
        }
        for input in el.inputs.values() {
            let consumer = el
                .directives
                .iter()
                .find(|dir| dir.inputs.contains_key(&input.name))
                .map(BindingConsumer::Directive)
                .unwrap_or(BindingConsumer::Element(el));
            self.target.consumers.insert(node_key(input), consumer);
            if let Some(value) = &input.value {
                self.visit_expression(&value.ast, in_defer);
            }
        }
        for output in el.outputs.values() {
            let consumer = el
                .directives
                .iter()
                .find(|dir| dir.outputs.contains_key(&output.name))
                .map(BindingConsumer::Directive)
                .unwrap_or(BindingConsumer::Element(el));
            self.target.consumers.insert(node_key(output), consumer);
            for handler in &output.handlers {
                self.visit_expression(&handler.ast, in_defer);
            }
        }
        for child in &el.children {
            self.visit_node(child, in_defer);
        }
    }

    fn visit_template(&mut self, tmpl: &'a TmplAstTemplate, in_defer: bool) {
        for reference in tmpl.references.values() {
            let target = resolve_reference_on_template(tmpl, reference);
            if let Some(target) = target {
                self.target.reference_targets.insert(node_key(reference), target);
            }
        }
        let bind_input = |binder: &mut Self, input: &'a TmplAstBoundAttribute| {
            let consumer = tmpl
                .directives
                .iter()
                .find(|dir| dir.inputs.contains_key(&input.name))
                .map(BindingConsumer::Directive)
                .unwrap_or(BindingConsumer::Template(tmpl));
            binder.target.consumers.insert(node_key(input), consumer);
            if let Some(value) = &input.value {
                binder.visit_expression(&value.ast, in_defer);
            }
        };
        for input in tmpl.inputs.values() {
            bind_input(self, input);
        }
        for attr in &tmpl.template_attrs {
            if let TmplAstAttribute::Bound(input) = attr {
                bind_input(self, input);
            }
        }
        for output in tmpl.outputs.values() {
            let consumer = tmpl
                .directives
                .iter()
                .find(|dir| dir.outputs.contains_key(&output.name))
                .map(BindingConsumer::Directive)
                .unwrap_or(BindingConsumer::Template(tmpl));
            self.target.consumers.insert(node_key(output), consumer);
            for handler in &output.handlers {
                self.visit_expression(&handler.ast, in_defer);
            }
        }
        let seed = tmpl
            .variables
            .iter()
            .map(|v| (v.name.as_str(), TemplateEntity::Variable(v)))
            .collect();
        self.process_scope(&tmpl.children, seed, in_defer);
    }

    fn mark_deferred(&mut self, nodes: &'a [TmplAstNode]) {
        for node in nodes {
            match node {
                TmplAstNode::Element(el) => {
                    self.target.deferred_nodes.insert(node_key(el));
                    self.mark_deferred(&el.children);
                }
                TmplAstNode::Template(tmpl) => {
                    self.target.deferred_nodes.insert(node_key(tmpl));
                    self.mark_deferred(&tmpl.children);
                }
                TmplAstNode::Content(content) => self.mark_deferred(&content.children),
                TmplAstNode::IfBlock(block) => {
                    for branch in &block.branches {
                        self.mark_deferred(&branch.children);
                    }
                }
                TmplAstNode::SwitchBlock(block) => {
                    for case in &block.cases {
                        self.mark_deferred(&case.children);
                    }
                }
                TmplAstNode::ForLoopBlock(block) => {
                    self.mark_deferred(&block.children);
                    if let Some(empty) = &block.empty {
                        self.mark_deferred(&empty.children);
                    }
                }
                TmplAstNode::DeferredBlock(block) => self.mark_deferred(&block.children),
                TmplAstNode::BoundText(_) | TmplAstNode::LetDeclaration(_) => {}
            }
        }
    }

    fn visit_expression(&mut self, ast: &'a AST, in_defer: bool) {
        match ast {
            AST::PropertyRead(read) => {
                if read.receiver.is_implicit_or_this_receiver() {
                    if let Some(entity) = self.lookup(&read.name) {
                        self.target.expr_targets.insert(node_key(ast), entity);
                    }
                } else {
                    self.visit_expression(&read.receiver, in_defer);
                }
            }
            AST::SafePropertyRead(read) => {
                if read.receiver.is_implicit_or_this_receiver() {
                    if let Some(entity) = self.lookup(&read.name) {
                        self.target.expr_targets.insert(node_key(ast), entity);
                    }
                } else {
                    self.visit_expression(&read.receiver, in_defer);
                }
            }
            AST::PropertyWrite(write) => {
                if write.receiver.is_implicit_or_this_receiver() {
                    if let Some(entity) = self.lookup(&write.name) {
                        self.target.expr_targets.insert(node_key(ast), entity);
                    }
                } else {
                    self.visit_expression(&write.receiver, in_defer);
                }
                self.visit_expression(&write.value, in_defer);
            }
            AST::BindingPipe(pipe) => {
                if !in_defer {
                    self.target.eagerly_used_pipes.insert(pipe.name.clone());
                }
                self.visit_expression(&pipe.exp, in_defer);
                for arg in &pipe.args {
                    self.visit_expression(arg, in_defer);
                }
            }
            AST::Chain(chain) => {
                for expression in &chain.expressions {
                    self.visit_expression(expression, in_defer);
                }
            }
            AST::Conditional(cond) => {
                self.visit_expression(&cond.condition, in_defer);
                self.visit_expression(&cond.true_exp, in_defer);
                self.visit_expression(&cond.false_exp, in_defer);
            }
            AST::KeyedRead(read) => {
                self.visit_expression(&read.receiver, in_defer);
                self.visit_expression(&read.key, in_defer);
            }
            AST::SafeKeyedRead(read) => {
                self.visit_expression(&read.receiver, in_defer);
                self.visit_expression(&read.key, in_defer);
            }
            AST::KeyedWrite(write) => {
                self.visit_expression(&write.receiver, in_defer);
                self.visit_expression(&write.key, in_defer);
                self.visit_expression(&write.value, in_defer);
            }
            AST::LiteralArray(array) => {
                for expression in &array.expressions {
                    self.visit_expression(expression, in_defer);
                }
            }
            AST::LiteralMap(map) => {
                for value in &map.values {
                    self.visit_expression(value, in_defer);
                }
            }
            AST::Interpolation(interpolation) => {
                for expression in &interpolation.expressions {
                    self.visit_expression(expression, in_defer);
                }
            }
            AST::Binary(binary) => {
                self.visit_expression(&binary.left, in_defer);
                self.visit_expression(&binary.right, in_defer);
            }
            AST::Unary(unary) => self.visit_expression(&unary.expr, in_defer),
            AST::PrefixNot(not) => self.visit_expression(&not.expression, in_defer),
            AST::NonNullAssert(assert) => self.visit_expression(&assert.expression, in_defer),
            AST::Call(call) => {
                self.visit_expression(&call.receiver, in_defer);
                for arg in &call.args {
                    self.visit_expression(arg, in_defer);
                }
            }
            AST::SafeCall(call) => {
                self.visit_expression(&call.receiver, in_defer);
                for arg in &call.args {
                    self.visit_expression(arg, in_defer);
                }
            }
            AST::ParenthesizedExpression(paren) => {
                self.visit_expression(&paren.expression, in_defer)
            }
            AST::EmptyExpr(_) | AST::ImplicitReceiver(_) | AST::ThisReceiver(_)
            | AST::LiteralPrimitive(_) => {}
        }
    }
}

fn resolve_reference_on_element<'a>(
    el: &'a TmplAstElement,
    reference: &TmplAstReference,
) -> Option<ReferenceTarget<'a>> {
    if reference.value.is_empty() {
        return Some(
            el.directives
                .iter()
                .find(|dir| dir.is_component)
                .map(|dir| ReferenceTarget::DirectiveOnElement(el, dir))
                .unwrap_or(ReferenceTarget::Element(el)),
        );
    }
    el.directives
        .iter()
        .find(|dir| dir.export_as.iter().any(|e| e == &reference.value))
        .map(|dir| ReferenceTarget::DirectiveOnElement(el, dir))
}

fn resolve_reference_on_template<'a>(
    tmpl: &'a TmplAstTemplate,
    reference: &TmplAstReference,
) -> Option<ReferenceTarget<'a>> {
    if reference.value.is_empty() {
        return Some(ReferenceTarget::Template(tmpl));
    }
    tmpl.directives
        .iter()
        .find(|dir| dir.export_as.iter().any(|e| e == &reference.value))
        .map(|dir| ReferenceTarget::DirectiveOnTemplate(tmpl, dir))
}
