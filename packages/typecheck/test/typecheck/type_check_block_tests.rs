//! Type-check block generation tests
//!
//! Each test hand-builds a small template tree with spans indexing into a
//! source string, generates the block and asserts on the emitted code and the
//! out-of-band diagnostics.

use indexmap::IndexMap;

use angular_typecheck::config::TypeCheckingConfig;
use angular_typecheck::expression_parser::ast::{
    ASTWithSource, BindingPipe, Call, ImplicitReceiver, Interpolation, LiteralMap, LiteralMapKey,
    LiteralPrimitive, LiteralValue, ParenthesizedExpression, PropertyRead, PropertyWrite,
    SafePropertyRead, AST,
};
use angular_typecheck::parse_util::TextRange;
use angular_typecheck::template::ast::{
    BindingType, ParsedEventType, TmplAstBoundAttribute, TmplAstBoundEvent, TmplAstBoundText,
    TmplAstElement, TmplAstForLoopBlock, TmplAstIfBlock, TmplAstIfBlockBranch,
    TmplAstLetDeclaration, TmplAstNode, TmplAstReference, TmplAstSwitchBlock,
    TmplAstSwitchBlockCase, TmplAstTemplate, TmplAstTextAttribute, TmplAstVariable,
};
use angular_typecheck::template::binder::BoundTarget;
use angular_typecheck::template::meta::{DirectiveInput, PipeMeta, TmplDirectiveMeta, TsDeclaration};
use angular_typecheck::typecheck::environment::Environment;
use angular_typecheck::typecheck::type_check_block::generate_type_check_block;
use angular_typecheck::{Diagnostic, DiagnosticKind, TcbError};

fn span_of(source: &str, text: &str) -> TextRange {
    let start = source.find(text).unwrap();
    TextRange::new(start, start + text.len())
}

fn implicit(offset: usize) -> Box<AST> {
    Box::new(AST::ImplicitReceiver(ImplicitReceiver { span: TextRange::empty(offset) }))
}

fn read_at(span: TextRange, name: &str) -> AST {
    AST::PropertyRead(PropertyRead {
        span,
        name_span: span,
        receiver: implicit(span.start),
        name: name.to_string(),
    })
}

fn read(source: &str, name: &str) -> AST {
    read_at(span_of(source, name), name)
}

/// `{{name}}` as a bound text node, reading a single property.
fn bound_text(source: &str, name: &str) -> TmplAstNode {
    bound_text_of(source, read(source, name))
}

fn bound_text_of(source: &str, ast: AST) -> TmplAstNode {
    let span = ast.span();
    TmplAstNode::BoundText(TmplAstBoundText::new(
        ASTWithSource::new(
            AST::Interpolation(Interpolation { span, expressions: vec![Box::new(ast)] }),
            source,
        ),
        span,
    ))
}

fn directive(name: &str) -> TmplDirectiveMeta {
    TmplDirectiveMeta::new(TsDeclaration::new(name))
}

fn try_generate(
    config: TypeCheckingConfig,
    nodes: &[TmplAstNode],
    pipes: &[PipeMeta],
) -> Result<(String, Vec<Diagnostic>), TcbError> {
    let env = Environment::new(config);
    let bound = BoundTarget::bind(nodes, pipes);
    let block =
        generate_type_check_block(&env, &bound, nodes, "_tcb_1", &TsDeclaration::new("TestCmp"))?;
    Ok((block.expression.code().to_string(), block.diagnostics))
}

fn generate(nodes: &[TmplAstNode]) -> (String, Vec<Diagnostic>) {
    try_generate(TypeCheckingConfig::default(), nodes, &[]).unwrap()
}

#[test]
fn interpolation_reads_component_members_through_this() {
    let source = "{{name}}";
    let nodes = vec![bound_text(source, "name")];
    let (code, diagnostics) = generate(&nodes);
    assert_eq!(code, "function _tcb_1(this: TestCmp) {\n\"\" + this.name;\n}\n");
    assert!(diagnostics.is_empty());
}

#[test]
fn generation_is_deterministic_across_runs() {
    let source = "<comp [value]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 20),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (first, _) = generate(&nodes);
    let (second, _) = generate(&nodes);
    assert_eq!(first, second);
}

#[test]
fn optional_operations_are_skipped_without_the_full_checker() {
    let nodes = vec![TmplAstNode::Element(TmplAstElement::new("div", TextRange::new(1, 4)))];
    let config =
        TypeCheckingConfig { enable_template_type_checker: false, ..TypeCheckingConfig::default() };
    let (code, diagnostics) = try_generate(config, &nodes, &[]).unwrap();
    assert_eq!(code, "function _tcb_1(this: TestCmp) {\n}\n");
    assert!(diagnostics.is_empty());
}

#[test]
fn directive_input_binding_assigns_through_the_directive_instance() {
    let source = "<comp [value]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 20),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, diagnostics) = generate(&nodes);
    assert_eq!(
        code,
        "function _tcb_1(this: TestCmp) {\n\
         var _t1 = document.createElement(\"comp\");\n\
         var _t2 = null! as CompDir;\n\
         _t2.value = this.name;\n\
         }\n"
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn static_attribute_bound_to_input_is_checked_as_string_literal() {
    let source = "<comp value=\"abc\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.attributes.insert(
        "value".to_string(),
        TmplAstTextAttribute::new(
            "value",
            "abc",
            Some(span_of(source, "value")),
            TextRange::new(6, 17),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, _) = generate(&nodes);
    assert!(code.contains("_t2.value = \"abc\";"), "{code}");
}

#[test]
fn unknown_pipe_degrades_to_any_and_reports() {
    let source = "{{title | unknown}}";
    let pipe = AST::BindingPipe(BindingPipe {
        span: TextRange::new(2, 17),
        name_span: span_of(source, "unknown"),
        exp: Box::new(read(source, "title")),
        name: "unknown".to_string(),
        args: Vec::new(),
    });
    let nodes = vec![bound_text_of(source, pipe)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("\"\" + (0 as any).transform(this.title);"), "{code}");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UnresolvedPipe);
    assert_eq!(diagnostics[0].range, span_of(source, "unknown"));
}

#[test]
fn circular_directive_ctor_falls_back_then_recovers() {
    // The reference reads the directive instance, whose inline constructor in
    // turn reads the reference.
    let source = "<comp #r [value]=\"r.y\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.references
        .insert("r".to_string(), TmplAstReference::new("r", "", TextRange::new(7, 8)));
    let value = AST::PropertyRead(PropertyRead {
        span: TextRange::new(18, 21),
        name_span: TextRange::new(20, 21),
        receiver: Box::new(read_at(TextRange::new(18, 19), "r")),
        name: "y".to_string(),
    });
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(value, source)),
            TextRange::new(9, 22),
        ),
    );
    let mut dir = TmplDirectiveMeta::new(
        TsDeclaration::new("GenDir").with_type_parameters(vec!["T".to_string()]),
    );
    dir.is_component = true;
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("var _t4 = _ctor1(null!);"), "{code}");
    assert!(code.contains("var _t3 = _t4;"), "{code}");
    assert!(code.contains("var _t2 = _ctor1({\"value\": _t3.y});"), "{code}");
    assert!(code.contains("_t2.value = _t3.y;"), "{code}");
    assert!(diagnostics.is_empty());
}

#[test]
fn for_loop_declares_item_and_checks_track() {
    let source = "@for (it of list; track it.id) {{{it}}}";
    let track = AST::PropertyRead(PropertyRead {
        span: TextRange::new(24, 29),
        name_span: TextRange::new(27, 29),
        receiver: Box::new(read_at(TextRange::new(24, 26), "it")),
        name: "id".to_string(),
    });
    let block = TmplAstForLoopBlock {
        item: Some(TmplAstVariable::new("it", "", TextRange::new(6, 8))),
        expression: ASTWithSource::new(read_at(TextRange::new(12, 16), "list"), source),
        track_by: Some(ASTWithSource::new(track, source)),
        context_variables: IndexMap::new(),
        children: vec![bound_text_of(source, read_at(TextRange::new(34, 36), "it"))],
        empty: None,
        source_span: TextRange::new(0, source.len()),
    };
    let nodes = vec![TmplAstNode::ForLoopBlock(block)];
    let (code, diagnostics) = generate(&nodes);
    assert_eq!(
        code,
        "function _tcb_1(this: TestCmp) {\n\
         for (const _t1 of (this.list)!) {\n\
         \"\" + _t1;\n\
         (_t1.id);\n\
         }\n\
         }\n"
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn track_reading_disallowed_context_variable_is_reported() {
    let source = "@for (it of list; let odd = $odd; track odd) {}";
    let mut context_variables = IndexMap::new();
    context_variables
        .insert("$odd".to_string(), TmplAstVariable::new("odd", "$odd", TextRange::new(22, 25)));
    let block = TmplAstForLoopBlock {
        item: Some(TmplAstVariable::new("it", "", TextRange::new(6, 8))),
        expression: ASTWithSource::new(read_at(TextRange::new(12, 16), "list"), source),
        track_by: Some(ASTWithSource::new(read_at(TextRange::new(40, 43), "odd"), source)),
        context_variables,
        children: Vec::new(),
        empty: None,
        source_span: TextRange::new(0, source.len()),
    };
    let nodes = vec![TmplAstNode::ForLoopBlock(block)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("var _t2 = null! as boolean;"), "{code}");
    assert!(code.contains("(_t2);"), "{code}");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::IllegalForLoopTrackAccess);
    assert_eq!(diagnostics[0].range, TextRange::new(40, 43));
}

#[test]
fn unknown_for_loop_context_variable_is_an_error() {
    let source = "@for (it of list; let foo = $foo) {}";
    let mut context_variables = IndexMap::new();
    context_variables
        .insert("$foo".to_string(), TmplAstVariable::new("foo", "$foo", TextRange::new(22, 25)));
    let block = TmplAstForLoopBlock {
        item: Some(TmplAstVariable::new("it", "", TextRange::new(6, 8))),
        expression: ASTWithSource::new(read_at(TextRange::new(12, 16), "list"), source),
        track_by: None,
        context_variables,
        children: Vec::new(),
        empty: None,
        source_span: TextRange::new(0, source.len()),
    };
    let nodes = vec![TmplAstNode::ForLoopBlock(block)];
    let err = try_generate(TypeCheckingConfig::default(), &nodes, &[]).unwrap_err();
    assert!(matches!(err, TcbError::UnknownForLoopContextVariable(ref name) if name == "foo"));
}

#[test]
fn template_context_guard_narrows_the_template_body() {
    let source = "<ng-template let-x>{{x}}</ng-template>";
    let mut tmpl = TmplAstTemplate::new(None, TextRange::new(0, 19));
    tmpl.variables.push(TmplAstVariable::new("x", "", span_of(source, "x")));
    tmpl.children.push(bound_text_of(source, read_at(TextRange::new(21, 22), "x")));
    let mut dir = directive("GuardDir");
    dir.has_template_context_guard = true;
    tmpl.directives.push(dir);
    let nodes = vec![TmplAstNode::Template(tmpl)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("var _t1 = null! as GuardDir;"), "{code}");
    assert!(code.contains("var _t2 = null! as any;"), "{code}");
    assert!(code.contains("if (GuardDir.ngTemplateContextGuard(_t1, _t2)) {"), "{code}");
    assert!(code.contains("var _t3 = _t2.$implicit;"), "{code}");
    assert!(code.contains("\"\" + _t3;"), "{code}");
    assert!(diagnostics.is_empty());
}

#[test]
fn duplicate_template_variables_are_reported() {
    let source = "<ng-template let-a let-a></ng-template>";
    let mut tmpl = TmplAstTemplate::new(None, TextRange::new(0, 25));
    tmpl.variables.push(TmplAstVariable::new("a", "", TextRange::new(17, 18)));
    tmpl.variables.push(TmplAstVariable::new("a", "", TextRange::new(23, 24)));
    let _ = source;
    let nodes = vec![TmplAstNode::Template(tmpl)];
    let (_, diagnostics) = generate(&nodes);
    let duplicate = diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::DuplicateTemplateVar)
        .expect("expected a duplicate variable diagnostic");
    assert_eq!(duplicate.range, TextRange::new(23, 24));
    assert!(duplicate.message.contains("redeclare"));
}

#[test]
fn let_read_before_definition_is_reported_and_cast() {
    let source = "{{x}} @let x = 1;";
    let value = AST::LiteralPrimitive(LiteralPrimitive {
        span: TextRange::new(15, 16),
        value: LiteralValue::Number(1.0),
    });
    let nodes = vec![
        bound_text_of(source, read_at(TextRange::new(2, 3), "x")),
        TmplAstNode::LetDeclaration(TmplAstLetDeclaration::new(
            "x",
            TextRange::new(11, 12),
            ASTWithSource::new(value, source),
            TextRange::new(6, 17),
        )),
    ];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("const _t1 = 1;"), "{code}");
    assert!(code.contains("\"\" + (_t1 as any);"), "{code}");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::LetUsedBeforeDefinition);
    assert_eq!(diagnostics[0].range, TextRange::new(2, 3));
}

#[test]
fn writes_to_let_declarations_are_rejected() {
    let source = "@let x = 1; <div (click)=\"x = 2\"></div>";
    let let_value = AST::LiteralPrimitive(LiteralPrimitive {
        span: TextRange::new(9, 10),
        value: LiteralValue::Number(1.0),
    });
    let handler = AST::PropertyWrite(PropertyWrite {
        span: TextRange::new(26, 31),
        name_span: TextRange::new(26, 27),
        receiver: implicit(26),
        name: "x".to_string(),
        value: Box::new(AST::LiteralPrimitive(LiteralPrimitive {
            span: TextRange::new(30, 31),
            value: LiteralValue::Number(2.0),
        })),
    });
    let mut el = TmplAstElement::new("div", span_of(source, "div"));
    el.outputs.insert(
        "click".to_string(),
        TmplAstBoundEvent::new(
            "click",
            ParsedEventType::Regular,
            vec![ASTWithSource::new(handler, source)],
            span_of(source, "click"),
            TextRange::new(17, 32),
        ),
    );
    let nodes = vec![
        TmplAstNode::LetDeclaration(TmplAstLetDeclaration::new(
            "x",
            TextRange::new(5, 6),
            ASTWithSource::new(let_value, source),
            TextRange::new(0, 11),
        )),
        TmplAstNode::Element(el),
    ];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains(".addEventListener(\"click\", ($event): any => {"), "{code}");
    assert!(code.contains("_t1 = 2;"), "{code}");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::IllegalWriteToLetDeclaration);
    assert_eq!(diagnostics[0].range, TextRange::new(26, 27));
}

#[test]
fn let_is_readable_from_an_embedded_template_above_its_declaration() {
    let source = "<ng-template>{{value}}</ng-template> @let value = 1;";
    let mut tmpl = TmplAstTemplate::new(None, TextRange::new(0, 13));
    tmpl.children.push(bound_text_of(source, read_at(TextRange::new(15, 20), "value")));
    let let_value = AST::LiteralPrimitive(LiteralPrimitive {
        span: TextRange::new(50, 51),
        value: LiteralValue::Number(1.0),
    });
    let nodes = vec![
        TmplAstNode::Template(tmpl),
        TmplAstNode::LetDeclaration(TmplAstLetDeclaration::new(
            "value",
            TextRange::new(42, 47),
            ASTWithSource::new(let_value, source),
            TextRange::new(37, 52),
        )),
    ];
    let (code, diagnostics) = generate(&nodes);
    // The declaration lives in the enclosing scope, so reading it from the
    // embedded view is valid regardless of lexical order.
    assert!(code.contains("const _t2 = 1;"), "{code}");
    assert!(code.contains("\"\" + _t2;"), "{code}");
    assert!(!code.contains("(_t2 as any)"), "{code}");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn nested_let_shadows_an_outer_declaration_without_conflict() {
    let source = "@let x = 1; <ng-template>@let x = 2; {{x}}</ng-template>";
    let outer = TmplAstLetDeclaration::new(
        "x",
        TextRange::new(5, 6),
        ASTWithSource::new(
            AST::LiteralPrimitive(LiteralPrimitive {
                span: TextRange::new(9, 10),
                value: LiteralValue::Number(1.0),
            }),
            source,
        ),
        TextRange::new(0, 11),
    );
    let mut tmpl = TmplAstTemplate::new(None, TextRange::new(12, 25));
    tmpl.children.push(TmplAstNode::LetDeclaration(TmplAstLetDeclaration::new(
        "x",
        TextRange::new(30, 31),
        ASTWithSource::new(
            AST::LiteralPrimitive(LiteralPrimitive {
                span: TextRange::new(34, 35),
                value: LiteralValue::Number(2.0),
            }),
            source,
        ),
        TextRange::new(25, 36),
    )));
    tmpl.children.push(bound_text_of(source, read_at(TextRange::new(39, 40), "x")));
    let nodes = vec![TmplAstNode::LetDeclaration(outer), TmplAstNode::Template(tmpl)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("const _t1 = 1;"), "{code}");
    assert!(code.contains("const _t3 = 2;"), "{code}");
    assert!(code.contains("\"\" + _t3;"), "{code}");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn if_block_guards_nested_event_handlers() {
    let source = "@if (cond) {<div (click)=\"go()\"></div>} @else {{{title}}}";
    let handler = AST::Call(Call {
        span: TextRange::new(26, 30),
        receiver: Box::new(read_at(TextRange::new(26, 28), "go")),
        args: Vec::new(),
    });
    let mut el = TmplAstElement::new("div", span_of(source, "div"));
    el.outputs.insert(
        "click".to_string(),
        TmplAstBoundEvent::new(
            "click",
            ParsedEventType::Regular,
            vec![ASTWithSource::new(handler, source)],
            span_of(source, "click"),
            TextRange::new(17, 31),
        ),
    );
    let block = TmplAstIfBlock {
        branches: vec![
            TmplAstIfBlockBranch {
                expression: Some(ASTWithSource::new(read(source, "cond"), source)),
                expression_alias: None,
                children: vec![TmplAstNode::Element(el)],
                source_span: TextRange::new(0, 40),
            },
            TmplAstIfBlockBranch {
                expression: None,
                expression_alias: None,
                children: vec![bound_text(source, "title")],
                source_span: TextRange::new(41, source.len()),
            },
        ],
        source_span: TextRange::new(0, source.len()),
    };
    let nodes = vec![TmplAstNode::IfBlock(block)];
    let (code, diagnostics) = generate(&nodes);
    // Once as the branch condition, once as the handler's narrowing guard.
    assert!(code.matches("if (this.cond) {").count() >= 2, "{code}");
    assert!(code.contains("else {"), "{code}");
    assert!(code.contains(".addEventListener(\"click\", ($event): any => {"), "{code}");
    assert!(code.contains("this.go();"), "{code}");
    assert!(code.contains("\"\" + this.title;"), "{code}");
    assert!(diagnostics.is_empty());
}

#[test]
fn switch_cases_check_bodies_with_breaks() {
    let source = "@switch (kind) { @case (\"x\") {{{alpha}}} @default {{{beta}}} }";
    let case_value = AST::LiteralPrimitive(LiteralPrimitive {
        span: span_of(source, "\"x\""),
        value: LiteralValue::String("x".to_string()),
    });
    let block = TmplAstSwitchBlock {
        expression: ASTWithSource::new(read(source, "kind"), source),
        cases: vec![
            TmplAstSwitchBlockCase {
                expression: Some(ASTWithSource::new(case_value, source)),
                children: vec![bound_text(source, "alpha")],
                source_span: TextRange::new(17, 41),
            },
            TmplAstSwitchBlockCase {
                expression: None,
                children: vec![bound_text(source, "beta")],
                source_span: TextRange::new(42, 61),
            },
        ],
        source_span: TextRange::new(0, source.len()),
    };
    let nodes = vec![TmplAstNode::SwitchBlock(block)];
    let (code, diagnostics) = generate(&nodes);
    assert!(code.contains("switch (this.kind) {"), "{code}");
    assert!(code.contains("case \"x\":"), "{code}");
    assert!(code.contains("default:"), "{code}");
    assert!(code.contains("\"\" + this.alpha;"), "{code}");
    assert!(code.contains("\"\" + this.beta;"), "{code}");
    assert_eq!(code.matches("break;").count(), 2, "{code}");
    assert!(diagnostics.is_empty());
}

#[test]
fn strict_safe_navigation_uses_a_guarding_ternary() {
    let source = "{{user?.name}}";
    let safe = AST::SafePropertyRead(SafePropertyRead {
        span: TextRange::new(2, 12),
        name_span: span_of(source, "name"),
        receiver: Box::new(read(source, "user")),
        name: "name".to_string(),
    });
    let nodes = vec![bound_text_of(source, safe)];
    let (code, _) = generate(&nodes);
    assert!(code.contains("\"\" + (0 as any ? (this.user)!.name : undefined);"), "{code}");
}

#[test]
fn two_way_binding_unwraps_writable_signals() {
    let source = "<comp [(value)]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::TwoWay,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 22),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, _) = generate(&nodes);
    assert!(code.contains("_t2.value = _i1.ɵunwrapWritableSignal(this.name);"), "{code}");
}

#[test]
fn signal_inputs_assign_through_the_brand_key() {
    let source = "<comp [value]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 20),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert(
        "value".to_string(),
        DirectiveInput { is_signal: true, ..DirectiveInput::to_field("value") },
    );
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, _) = generate(&nodes);
    assert!(
        code.contains("_t2.value[_i1.ɵINPUT_SIGNAL_BRAND_WRITE_TYPE] = this.name;"),
        "{code}"
    );
}

#[test]
fn coerced_inputs_assign_through_the_acceptance_type() {
    let source = "<comp [value]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 20),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert(
        "value".to_string(),
        DirectiveInput { is_coerced: true, ..DirectiveInput::to_field("value") },
    );
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, _) = generate(&nodes);
    assert!(
        code.contains("var _t3 = null! as typeof CompDir.ngAcceptInputType_value;"),
        "{code}"
    );
    assert!(code.contains("_t3 = this.name;"), "{code}");
}

#[test]
fn restricted_fields_assign_through_an_indexed_temp() {
    let source = "<comp [value]=\"name\"></comp>";
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(read(source, "name"), source)),
            TextRange::new(6, 20),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert(
        "value".to_string(),
        DirectiveInput { is_restricted: true, ..DirectiveInput::to_field("value") },
    );
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let (code, _) = generate(&nodes);
    // The indexed access type sidesteps the access modifier.
    assert!(code.contains("var _t3 = null! as _t2[\"value\"];"), "{code}");
    assert!(code.contains("_t3 = this.name;"), "{code}");
}

#[test]
fn lenient_null_checks_assert_parenthesized_binding_values() {
    let source = "<comp [value]=\"(name)\"></comp>";
    let paren = AST::ParenthesizedExpression(ParenthesizedExpression {
        span: span_of(source, "(name)"),
        expression: Box::new(read(source, "name")),
    });
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(paren, source)),
            TextRange::new(6, 22),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let config =
        TypeCheckingConfig { strict_null_input_bindings: false, ..TypeCheckingConfig::default() };
    let (code, _) = try_generate(config, &nodes, &[]).unwrap();
    // Parentheses do not make the value a literal; it still gets asserted.
    assert!(code.contains("_t2.value = (this.name)!;"), "{code}");
}

#[test]
fn lenient_null_checks_leave_object_literals_unasserted() {
    let source = "<comp [value]=\"{a: name}\"></comp>";
    let map = AST::LiteralMap(LiteralMap {
        span: span_of(source, "{a: name}"),
        keys: vec![LiteralMapKey { key: "a".to_string(), quoted: false }],
        values: vec![Box::new(read(source, "name"))],
    });
    let mut el = TmplAstElement::new("comp", span_of(source, "comp"));
    el.inputs.insert(
        "value".to_string(),
        TmplAstBoundAttribute::new(
            "value",
            BindingType::Property,
            Some(span_of(source, "value")),
            Some(ASTWithSource::new(map, source)),
            TextRange::new(6, 25),
        ),
    );
    let mut dir = directive("CompDir");
    dir.inputs.insert("value".to_string(), DirectiveInput::to_field("value"));
    el.directives.push(dir);
    let nodes = vec![TmplAstNode::Element(el)];
    let config =
        TypeCheckingConfig { strict_null_input_bindings: false, ..TypeCheckingConfig::default() };
    let (code, _) = try_generate(config, &nodes, &[]).unwrap();
    assert!(code.contains("_t2.value = {a: this.name};"), "{code}");
}

#[test]
fn config_deserializes_with_defaults() {
    let config: TypeCheckingConfig =
        serde_json::from_str(r#"{"check_type_of_dom_bindings": true}"#).unwrap();
    assert!(config.check_type_of_dom_bindings);
    assert!(config.strict_null_input_bindings);
    assert!(config.enable_template_type_checker);
}
