//! Code fragment builder tests
//!
//! Covers the mapping behaviors downstream consumers rely on: capability
//! flags per append kind, position shifting when fragments are spliced, and
//! the auxiliary mapping tables.

use indexmap::IndexMap;

use angular_typecheck::parse_util::TextRange;
use angular_typecheck::typecheck::api::SourceMappingFlags;
use angular_typecheck::typecheck::code_fragments::{Expression, Identifier, Mapped, Statement};

#[test]
fn typed_append_records_full_capability_mapping() {
    let expr = Expression::build(|b| {
        b.append("var x = ");
        b.append_mapped("this.a", Mapped::at(TextRange::new(3, 9)).types());
    });
    assert_eq!(expr.code(), "var x = this.a");
    let mappings = expr.source_mappings();
    assert_eq!(mappings.len(), 1);
    let mapping = &mappings[0];
    assert_eq!(mapping.flags, SourceMappingFlags::all());
    assert_eq!(mapping.source_range(), TextRange::new(3, 9));
    assert_eq!(mapping.generated_range(), TextRange::new(8, 14));
    assert_eq!(mapping.diagnostics_offset, Some(3));
    assert_eq!(mapping.diagnostics_length, Some(6));
}

#[test]
fn single_token_expression_maps_its_whole_code() {
    let expr = Expression::of_mapped("this.a", Mapped::at(TextRange::new(3, 9)).types());
    assert_eq!(expr.code(), "this.a");
    let mappings = expr.source_mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].source_range(), TextRange::new(3, 9));
    assert_eq!(mappings[0].generated_range(), TextRange::new(0, 6));
    assert_eq!(mappings[0].flags, SourceMappingFlags::all());
}

#[test]
fn untyped_append_keeps_navigation_but_not_types() {
    let expr = Expression::build(|b| {
        b.append_mapped("name", Mapped::at(TextRange::new(0, 4)));
    });
    let flags = expr.source_mappings()[0].flags;
    assert!(!flags.contains(SourceMappingFlags::TYPES));
    assert!(!flags.contains(SourceMappingFlags::REVERSE_TYPES));
    assert!(flags.contains(SourceMappingFlags::NAVIGATION));
    assert!(flags.contains(SourceMappingFlags::COMPLETION));
}

#[test]
fn ignored_regions_keep_reverse_type_lookups_only() {
    let expr = Expression::build(|b| {
        b.with_ignore_mappings(|b| {
            b.append_mapped("this.a", Mapped::at(TextRange::new(3, 9)).types());
        });
    });
    let mapping = &expr.source_mappings()[0];
    assert_eq!(mapping.flags, SourceMappingFlags::REVERSE_TYPES);
    assert_eq!(mapping.diagnostics_offset, None);
    assert_eq!(mapping.diagnostics_length, None);
}

#[test]
fn spliced_statements_shift_generated_positions() {
    let inner = Expression::build(|b| {
        b.append_mapped("this.a", Mapped::at(TextRange::new(3, 9)).types());
        b.append(";");
    });
    let statement = Statement::new(inner);
    let outer = Expression::build(|b| {
        b.append("{\n");
        b.append_statement(&statement);
        b.append("}");
    });
    assert_eq!(outer.code(), "{\nthis.a;\n}");
    let mapping = &outer.source_mappings()[0];
    assert_eq!(mapping.generated_range(), TextRange::new(2, 8));
    assert_eq!(mapping.source_range(), TextRange::new(3, 9));
}

#[test]
fn renamed_identifiers_record_name_mappings() {
    let span = TextRange::new(10, 14);
    let id = Identifier::sourced("_t1", "item", span);
    let expr = Expression::build(|b| {
        b.append_id(&id, Mapped::at(span).types());
    });
    assert_eq!(expr.code(), "_t1");
    let name_mappings = expr.name_mappings();
    assert_eq!(name_mappings.len(), 1);
    assert_eq!(name_mappings[0].0, 10);
    assert_eq!(name_mappings[0].1.get("_t1"), Some(&"item".to_string()));
}

#[test]
fn context_and_directive_var_mappings_survive_splicing() {
    let element_name = TextRange::new(1, 4);
    let inner = Expression::build(|b| {
        b.append_id(&Identifier::new("_t1"), Mapped::at(element_name).context_var());
        b.append(" ");
        b.append_id(
            &Identifier::new("_t2"),
            Mapped::at(element_name).of_directive("NgIf").no_diagnostics(),
        );
    });
    let outer = Expression::build(|b| {
        b.append("prefix;");
        b.append_expr(&inner);
    });
    let ctx = &outer.context_var_mappings()[0];
    assert_eq!(ctx.element_name_offset, 1);
    assert_eq!(ctx.element_name_length, 3);
    assert_eq!(ctx.generated_offset, 7);
    assert_eq!(ctx.generated_length, 3);
    let dir = &outer.directive_var_mappings()[0];
    assert_eq!(dir.directive, "NgIf");
    assert_eq!(dir.generated_offset, 11);
}

#[test]
fn mappings_offset_shifts_the_source_side() {
    let expr = Expression::build(|b| {
        b.append("(");
        b.with_mappings_offset(100, |b| {
            b.append_mapped("x", Mapped::at(TextRange::new(2, 3)).types());
        });
        b.append(")");
    });
    assert_eq!(expr.code(), "(x)");
    let mapping = &expr.source_mappings()[0];
    assert_eq!(mapping.source_range(), TextRange::new(102, 103));
    assert_eq!(mapping.generated_range(), TextRange::new(1, 2));
    assert_eq!(mapping.diagnostics_offset, Some(102));
}

#[test]
fn removed_mappings_do_not_leak_out_of_wrapped_receivers() {
    let receiver = TextRange::new(5, 9);
    let expr = Expression::build(|b| {
        b.with_source_span(Some(receiver), true, |b| {
            b.append("(");
            b.append_mapped("this.f", Mapped::at(receiver).types());
            b.append(")");
            b.remove_mappings(receiver);
            b.append("!");
        });
    });
    // Only the wrapping span survives; the inner receiver mappings were
    // removed before the wrapper recorded its own.
    assert_eq!(expr.source_mappings().len(), 1);
    assert_eq!(expr.source_mappings()[0].generated_range(), TextRange::new(0, 9));
}

#[test]
fn name_mappings_merge_explicit_names_with_identifier_renames() {
    let span = TextRange::new(0, 3);
    let id = Identifier::sourced("_t9", "row", span);
    let mut extra = IndexMap::new();
    extra.insert("_t8".to_string(), "col".to_string());
    let expr = Expression::build(|b| {
        b.append_id(&id, Mapped::at(span).names(extra));
    });
    let (_, names) = &expr.name_mappings()[0];
    assert_eq!(names.get("_t8"), Some(&"col".to_string()));
    assert_eq!(names.get("_t9"), Some(&"row".to_string()));
}
