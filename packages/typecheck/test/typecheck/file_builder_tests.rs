//! Whole-file transpilation tests
//!
//! Exercises the top-level entry points: preamble assembly, source gap
//! tiling, type mapping uniqueness and host binding handling.

use angular_typecheck::config::TypeCheckingConfig;
use angular_typecheck::expression_parser::ast::{
    ASTWithSource, BindingPipe, ImplicitReceiver, Interpolation, PropertyRead, AST,
};
use angular_typecheck::parse_util::TextRange;
use angular_typecheck::template::ast::{
    BindingType, TmplAstBoundAttribute, TmplAstBoundText, TmplAstElement, TmplAstNode,
};
use angular_typecheck::template::meta::{DirectiveInput, PipeMeta, TmplDirectiveMeta, TsDeclaration};
use angular_typecheck::typecheck::code_fragments::{Expression, Mapped};
use angular_typecheck::typecheck::environment::Environment;
use angular_typecheck::typecheck::file_builder::FileBuilder;
use angular_typecheck::typecheck::type_check_block::GeneratedBlock;
use angular_typecheck::{
    transpile_all, transpile_host_bindings, transpile_template, DiagnosticKind, HostBindingsMeta,
    SourceMappingFlags, TcbError, TemplateRequest, TranspiledTemplate,
};

fn span_of(source: &str, text: &str) -> TextRange {
    let start = source.find(text).unwrap();
    TextRange::new(start, start + text.len())
}

fn read(source: &str, name: &str) -> AST {
    let span = span_of(source, name);
    AST::PropertyRead(PropertyRead {
        span,
        name_span: span,
        receiver: Box::new(AST::ImplicitReceiver(ImplicitReceiver {
            span: TextRange::empty(span.start),
        })),
        name: name.to_string(),
    })
}

const NG_IF_SOURCE: &str = "<div [ngIf]=\"cond\"></div>";

fn ng_if_nodes() -> Vec<TmplAstNode> {
    let mut el = TmplAstElement::new("div", span_of(NG_IF_SOURCE, "div"));
    el.inputs.insert(
        "ngIf".to_string(),
        TmplAstBoundAttribute::new(
            "ngIf",
            BindingType::Property,
            Some(span_of(NG_IF_SOURCE, "ngIf")),
            Some(ASTWithSource::new(read(NG_IF_SOURCE, "cond"), NG_IF_SOURCE)),
            TextRange::new(5, 18),
        ),
    );
    let mut dir = TmplDirectiveMeta::new(TsDeclaration::in_module("NgIf", "@angular/common"));
    dir.inputs.insert("ngIf".to_string(), DirectiveInput::to_field("ngIf"));
    el.directives.push(dir);
    vec![TmplAstNode::Element(el)]
}

fn transpile_ng_if() -> TranspiledTemplate {
    let nodes = ng_if_nodes();
    transpile_template(
        &TypeCheckingConfig::default(),
        &TemplateRequest {
            file_name: "cmp.html",
            source: NG_IF_SOURCE,
            nodes: &nodes,
            pipes: &[],
            component: &TsDeclaration::new("TestCmp"),
        },
    )
    .unwrap()
}

#[test]
fn module_directives_are_imported_under_an_alias() {
    let result = transpile_ng_if();
    assert_eq!(result.file_name, "cmp.html");
    assert!(
        result.generated_code.starts_with("import * as _i1 from \"@angular/common\";\n"),
        "{}",
        result.generated_code
    );
    assert!(
        result.generated_code.contains("function _tcb_TestCmp(this: TestCmp) {"),
        "{}",
        result.generated_code
    );
    assert!(
        result.generated_code.contains("var _t2 = null! as _i1.NgIf;"),
        "{}",
        result.generated_code
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn every_source_offset_translates_to_a_generated_position() {
    let result = transpile_ng_if();
    for offset in 0..NG_IF_SOURCE.len() {
        assert!(
            result.source_mappings.iter().any(|m| m.source_range().contains_offset(offset)),
            "offset {offset} has no mapping"
        );
    }
}

#[test]
fn type_capable_mappings_are_unique_per_source_range() {
    let result = transpile_ng_if();
    let typed: Vec<TextRange> = result
        .source_mappings
        .iter()
        .filter(|m| m.flags.contains(SourceMappingFlags::TYPES))
        .map(|m| m.source_range())
        .collect();
    for range in &typed {
        assert_eq!(
            typed.iter().filter(|r| *r == range).count(),
            1,
            "range {range:?} claimed by more than one typed mapping"
        );
    }
}

#[test]
fn colliding_type_mappings_fail_assembly() {
    let source = "{{name}}";
    let span = span_of(source, "name");
    let env = Environment::new(TypeCheckingConfig::default());
    let block = GeneratedBlock {
        expression: Expression::build(|b| {
            b.append_mapped("this.name", Mapped::at(span).types());
            b.append(" + ");
            b.append_mapped("this.name", Mapped::at(span).types());
        }),
        diagnostics: Vec::new(),
    };
    let mut builder = FileBuilder::new(&env);
    builder.add_block(block);
    let err = builder.into_template("t.html", source).unwrap_err();
    assert!(matches!(err, TcbError::DuplicateTypeMappings(ref detail) if detail.contains("«name» [2]")));
}

#[test]
fn host_bindings_check_against_the_directive_class() {
    let source = "\"[title]\": \"name\"";
    let meta = HostBindingsMeta {
        tag_name: None,
        bindings: vec![TmplAstBoundAttribute::new(
            "title",
            BindingType::Property,
            Some(span_of(source, "title")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(0, source.len()),
        )],
        listeners: Vec::new(),
        inline_code_ranges: vec![TextRange::new(0, source.len())],
    };
    let result = transpile_host_bindings(
        &TypeCheckingConfig::default(),
        &TsDeclaration::new("HostDir"),
        meta,
        source,
    )
    .unwrap();
    assert_eq!(result.class_name, "HostDir");
    assert_eq!(result.inline_code_ranges, vec![TextRange::new(0, source.len())]);
    assert!(
        result.generated_code.contains("function _tcb_host_HostDir(this: HostDir) {"),
        "{}",
        result.generated_code
    );
    // DOM binding checks are off by default, so the expression is only
    // evaluated, not assigned.
    assert!(result.generated_code.contains("(this.name);"), "{}", result.generated_code);
}

#[test]
fn host_binding_diagnostics_report_host_file_positions() {
    // The binding value is an inline fragment at offset 4 of the host file;
    // the pipe name spans 7..12 within the fragment.
    let source = "x: \"name | upper\"";
    let fragment = "name | upper";
    let pipe = AST::BindingPipe(BindingPipe {
        span: TextRange::new(0, 12),
        name_span: TextRange::new(7, 12),
        exp: Box::new(AST::PropertyRead(PropertyRead {
            span: TextRange::new(0, 4),
            name_span: TextRange::new(0, 4),
            receiver: Box::new(AST::ImplicitReceiver(ImplicitReceiver {
                span: TextRange::empty(0),
            })),
            name: "name".to_string(),
        })),
        name: "upper".to_string(),
        args: Vec::new(),
    });
    let mut binding = TmplAstBoundAttribute::new(
        "title",
        BindingType::Property,
        None,
        Some(ASTWithSource::new(pipe, fragment)),
        TextRange::new(0, source.len()),
    );
    binding.value_mapping_offset = 4;
    let meta = HostBindingsMeta {
        tag_name: None,
        bindings: vec![binding],
        listeners: Vec::new(),
        inline_code_ranges: vec![TextRange::new(4, 16)],
    };
    let result = transpile_host_bindings(
        &TypeCheckingConfig::default(),
        &TsDeclaration::new("HostDir"),
        meta,
        source,
    )
    .unwrap();
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnresolvedPipe);
    assert_eq!(result.diagnostics[0].range, TextRange::new(11, 16));
    assert_eq!(&source[11..16], "upper");
}

#[test]
fn resolved_pipes_are_declared_in_the_preamble() {
    let source = "{{title | lower}}";
    let pipe_ast = AST::BindingPipe(BindingPipe {
        span: TextRange::new(2, 15),
        name_span: span_of(source, "lower"),
        exp: Box::new(read(source, "title")),
        name: "lower".to_string(),
        args: Vec::new(),
    });
    let nodes = vec![TmplAstNode::BoundText(TmplAstBoundText::new(
        ASTWithSource::new(
            AST::Interpolation(Interpolation {
                span: TextRange::new(2, 15),
                expressions: vec![Box::new(pipe_ast)],
            }),
            source,
        ),
        TextRange::new(0, source.len()),
    ))];
    let pipes = vec![PipeMeta::new("lower", TsDeclaration::in_module("LowerPipe", "./pipes"))];
    let result = transpile_template(
        &TypeCheckingConfig::default(),
        &TemplateRequest {
            file_name: "cmp.html",
            source,
            nodes: &nodes,
            pipes: &pipes,
            component: &TsDeclaration::new("TestCmp"),
        },
    )
    .unwrap();
    assert!(
        result.generated_code.contains("import * as _i1 from \"./pipes\";"),
        "{}",
        result.generated_code
    );
    assert!(
        result.generated_code.contains("var _pipe1 = null! as _i1.LowerPipe;"),
        "{}",
        result.generated_code
    );
    assert!(
        result.generated_code.contains("\"\" + _pipe1.transform(this.title);"),
        "{}",
        result.generated_code
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn batch_transpilation_keeps_input_order() {
    let ng_if_nodes = ng_if_nodes();
    let text_source = "{{name}}";
    let text_nodes = vec![TmplAstNode::BoundText(TmplAstBoundText::new(
        ASTWithSource::new(
            AST::Interpolation(Interpolation {
                span: span_of(text_source, "name"),
                expressions: vec![Box::new(read(text_source, "name"))],
            }),
            text_source,
        ),
        TextRange::new(0, text_source.len()),
    ))];
    let first_cmp = TsDeclaration::new("FirstCmp");
    let second_cmp = TsDeclaration::new("SecondCmp");
    let requests = [
        TemplateRequest {
            file_name: "first.html",
            source: NG_IF_SOURCE,
            nodes: &ng_if_nodes,
            pipes: &[],
            component: &first_cmp,
        },
        TemplateRequest {
            file_name: "second.html",
            source: text_source,
            nodes: &text_nodes,
            pipes: &[],
            component: &second_cmp,
        },
    ];
    let results = transpile_all(&TypeCheckingConfig::default(), &requests);
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert!(first.generated_code.contains("function _tcb_FirstCmp"));
    assert!(second.generated_code.contains("function _tcb_SecondCmp"));
}
