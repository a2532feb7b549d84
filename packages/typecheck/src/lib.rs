//! Template type-check block generation.
//!
//! Takes a parsed component template (or a directive's host bindings) and
//! produces a TypeScript-shaped block of code that, when handed to a type
//! checker, surfaces template type errors. The block is never executed;
//! alongside the code, exact bidirectional source<->generated mappings are
//! produced so diagnostics, completions and navigation can be translated back
//! into template positions.

pub mod config;
pub mod expression_parser;
pub mod parse_util;
pub mod template;
pub mod typecheck;

use rayon::prelude::*;

use crate::config::TypeCheckingConfig;
use crate::parse_util::TextRange;
use crate::template::ast::{TmplAstBoundAttribute, TmplAstBoundEvent, TmplAstElement, TmplAstNode};
use crate::template::binder::BoundTarget;
use crate::template::meta::{PipeMeta, TsDeclaration};
use crate::typecheck::environment::Environment;
use crate::typecheck::file_builder::FileBuilder;
use crate::typecheck::type_check_block::generate_type_check_block;

pub use crate::typecheck::api::{
    ContextVarMapping, DirectiveVarMapping, NameMapping, SourceMapping, SourceMappingFlags,
    TranspiledHostBindings, TranspiledTemplate,
};
pub use crate::typecheck::oob::{Diagnostic, DiagnosticCategory, DiagnosticKind};
pub use crate::typecheck::type_check_block::TcbError;

/// Everything needed to transpile one component template.
#[derive(Debug)]
pub struct TemplateRequest<'a> {
    /// Name of the template file the source offsets refer to.
    pub file_name: &'a str,
    /// Full template text; node and expression spans index into it.
    pub source: &'a str,
    pub nodes: &'a [TmplAstNode],
    /// Pipes visible to the template.
    pub pipes: &'a [PipeMeta],
    /// The component class the block's `this` is typed as.
    pub component: &'a TsDeclaration,
}

/// Host bindings of one directive, in component-file coordinates.
#[derive(Debug, Default)]
pub struct HostBindingsMeta {
    /// Selector tag the directive is expected on, if known.
    pub tag_name: Option<String>,
    pub bindings: Vec<TmplAstBoundAttribute>,
    pub listeners: Vec<TmplAstBoundEvent>,
    /// Ranges of the inline binding fragments within the component file.
    pub inline_code_ranges: Vec<TextRange>,
}

/// Transpiles one component template into its type-check block.
pub fn transpile_template(
    config: &TypeCheckingConfig,
    request: &TemplateRequest<'_>,
) -> Result<TranspiledTemplate, TcbError> {
    let env = Environment::new(config.clone());
    let bound_target = BoundTarget::bind(request.nodes, request.pipes);
    let name = format!("_tcb_{}", request.component.name);
    let block = generate_type_check_block(
        &env,
        &bound_target,
        request.nodes,
        &name,
        request.component,
    )?;
    let mut builder = FileBuilder::new(&env);
    builder.add_block(block);
    builder.into_template(request.file_name, request.source)
}

/// Transpiles a batch of templates in parallel. Each template gets its own
/// generated file; results keep the input order.
pub fn transpile_all(
    config: &TypeCheckingConfig,
    requests: &[TemplateRequest<'_>],
) -> Vec<Result<TranspiledTemplate, TcbError>> {
    requests.par_iter().map(|request| transpile_template(config, request)).collect()
}

/// Transpiles a directive's host bindings. The bindings are checked as if
/// they sat on a synthetic element, with `this` typed as the directive class.
pub fn transpile_host_bindings(
    config: &TypeCheckingConfig,
    class: &TsDeclaration,
    meta: HostBindingsMeta,
    source: &str,
) -> Result<TranspiledHostBindings, TcbError> {
    let HostBindingsMeta { tag_name, bindings, mut listeners, inline_code_ranges } = meta;
    let span = inline_code_ranges.first().copied().unwrap_or_default();
    let mut element = TmplAstElement::new(tag_name.unwrap_or_else(|| "div".to_string()), span);
    for binding in bindings {
        element.inputs.insert(binding.name.clone(), binding);
    }
    for listener in &mut listeners {
        listener.from_host_binding = true;
    }
    for listener in listeners {
        element.outputs.insert(listener.name.clone(), listener);
    }
    let nodes = [TmplAstNode::Element(element)];
    let env = Environment::new(config.clone());
    let bound_target = BoundTarget::bind(&nodes, std::iter::empty());
    let name = format!("_tcb_host_{}", class.name);
    let block = generate_type_check_block(&env, &bound_target, &nodes, &name, class)?;
    let mut builder = FileBuilder::new(&env);
    builder.add_block(block);
    builder.into_host_bindings(&class.name, inline_code_ranges, source)
}
