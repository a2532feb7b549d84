//! Code fragment builder
//!
//! Generated code is assembled as strings paired with position mappings back
//! into the source file. The builder records a mapping for every appended
//! piece that has a source range; composite expressions are spliced with all
//! of their mappings shifted to the final position.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::parse_util::TextRange;
use crate::typecheck::api::{
    ContextVarMapping, DirectiveVarMapping, NameMapping, SourceMapping, SourceMappingFlags,
};

/// A generated identifier, optionally tied back to the source name it stands
/// in for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    /// Source name the identifier replaces, recorded as a name mapping.
    pub source_name: Option<String>,
    pub source_span: Option<TextRange>,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier { name: name.into(), source_name: None, source_span: None }
    }

    pub fn sourced(
        name: impl Into<String>,
        source_name: impl Into<String>,
        source_span: TextRange,
    ) -> Self {
        Identifier {
            name: name.into(),
            source_name: Some(source_name.into()),
            source_span: Some(source_span),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A completed fragment of generated code with its mappings.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    code: String,
    source_mappings: Vec<SourceMapping>,
    context_var_mappings: Vec<ContextVarMapping>,
    directive_var_mappings: Vec<DirectiveVarMapping>,
    name_mappings: Vec<NameMapping>,
}

impl Expression {
    pub fn build(f: impl FnOnce(&mut ExpressionBuilder)) -> Expression {
        let mut builder = ExpressionBuilder::new();
        f(&mut builder);
        builder.finish()
    }

    pub fn try_build<E>(
        f: impl FnOnce(&mut ExpressionBuilder) -> Result<(), E>,
    ) -> Result<Expression, E> {
        let mut builder = ExpressionBuilder::new();
        f(&mut builder)?;
        Ok(builder.finish())
    }

    /// A fragment with no mappings.
    pub fn of(code: impl Into<String>) -> Expression {
        Expression { code: code.into(), ..Default::default() }
    }

    /// A single-token fragment mapped to `range`.
    pub fn of_mapped(code: impl AsRef<str>, mapped: Mapped) -> Expression {
        Expression::build(|b| {
            b.append_mapped(code, mapped);
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn source_mappings(&self) -> &[SourceMapping] {
        &self.source_mappings
    }

    pub fn context_var_mappings(&self) -> &[ContextVarMapping] {
        &self.context_var_mappings
    }

    pub fn directive_var_mappings(&self) -> &[DirectiveVarMapping] {
        &self.directive_var_mappings
    }

    pub fn name_mappings(&self) -> &[NameMapping] {
        &self.name_mappings
    }
}

/// A generated statement. Statements own their trailing semicolon; the
/// builder appends a newline after each one.
#[derive(Debug, Clone)]
pub struct Statement {
    expression: Expression,
}

impl Statement {
    pub fn new(expression: Expression) -> Self {
        Statement { expression }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// Where the diagnostics range of a mapping comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DiagnosticsRange {
    /// Same as the source range.
    #[default]
    Source,
    /// The mapping carries no diagnostics range.
    None,
    /// An explicit range, different from the source range.
    At(TextRange),
}

/// Mapping options for a single append. Defaults: no type support,
/// diagnostics over the source range, semantic highlighting whenever a
/// diagnostics range is present, reverse types following type support.
#[derive(Debug, Clone, Default)]
pub struct Mapped {
    range: TextRange,
    types: bool,
    diagnostics: DiagnosticsRange,
    semantic: Option<bool>,
    reverse: Option<bool>,
    context_var: bool,
    var_of_directive: Option<String>,
    names: Option<IndexMap<String, String>>,
}

impl Mapped {
    pub fn at(range: TextRange) -> Self {
        Mapped { range, ..Default::default() }
    }

    pub fn types(mut self) -> Self {
        self.types = true;
        self
    }

    pub fn no_diagnostics(mut self) -> Self {
        self.diagnostics = DiagnosticsRange::None;
        self
    }

    pub fn diagnostics(mut self, range: TextRange) -> Self {
        self.diagnostics = DiagnosticsRange::At(range);
        self
    }

    pub fn semantic(mut self, enabled: bool) -> Self {
        self.semantic = Some(enabled);
        self
    }

    pub fn reverse(mut self, enabled: bool) -> Self {
        self.reverse = Some(enabled);
        self
    }

    pub fn context_var(mut self) -> Self {
        self.context_var = true;
        self
    }

    pub fn of_directive(mut self, directive: impl Into<String>) -> Self {
        self.var_of_directive = Some(directive.into());
        self
    }

    pub fn names(mut self, names: IndexMap<String, String>) -> Self {
        self.names = Some(names);
        self
    }

    fn diagnostics_range(&self) -> Option<TextRange> {
        match self.diagnostics {
            DiagnosticsRange::Source => Some(self.range),
            DiagnosticsRange::None => None,
            DiagnosticsRange::At(range) => Some(range),
        }
    }
}

fn build_mapping_flags(
    ignore: bool,
    types: bool,
    semantic: bool,
    reversed: bool,
) -> SourceMappingFlags {
    if ignore || (!types && !semantic) {
        if reversed {
            SourceMappingFlags::REVERSE_TYPES
        } else {
            SourceMappingFlags::empty()
        }
    } else {
        let mut flags = SourceMappingFlags::all();
        if !types {
            flags.remove(SourceMappingFlags::TYPES);
        }
        if !semantic {
            flags.remove(SourceMappingFlags::SEMANTIC);
        }
        if !reversed {
            flags.remove(SourceMappingFlags::REVERSE_TYPES);
        }
        flags
    }
}

/// Incrementally builds an [`Expression`].
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    code: String,
    source_mappings: IndexSet<SourceMapping>,
    context_var_mappings: Vec<ContextVarMapping>,
    directive_var_mappings: Vec<DirectiveVarMapping>,
    name_mappings: Vec<NameMapping>,
    ignore_mappings: bool,
    support_reverse_types: bool,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(self) -> Expression {
        Expression {
            code: self.code,
            source_mappings: self.source_mappings.into_iter().collect(),
            context_var_mappings: self.context_var_mappings,
            directive_var_mappings: self.directive_var_mappings,
            name_mappings: self.name_mappings,
        }
    }

    pub fn code_length(&self) -> usize {
        self.code.len()
    }

    pub fn ignores_mappings(&self) -> bool {
        self.ignore_mappings
    }

    /// Appends raw code with no mapping.
    pub fn append(&mut self, code: impl AsRef<str>) -> &mut Self {
        self.code.push_str(code.as_ref());
        self
    }

    /// Appends code mapped to a source range.
    pub fn append_mapped(&mut self, code: impl AsRef<str>, mapped: Mapped) -> &mut Self {
        let code = code.as_ref();
        let generated_offset = self.code.len();
        self.code.push_str(code);
        self.record_mapping(mapped, generated_offset, code.len());
        self
    }

    /// Appends an identifier mapped to a source range. If the identifier was
    /// renamed from a source name, a name mapping is recorded as well.
    pub fn append_id(&mut self, id: &Identifier, mut mapped: Mapped) -> &mut Self {
        if let Some(source_name) = &id.source_name {
            let mut names = mapped.names.take().unwrap_or_default();
            names.insert(id.name.clone(), source_name.clone());
            mapped.names = Some(names);
        }
        self.append_mapped(&id.name, mapped)
    }

    fn record_mapping(&mut self, mapped: Mapped, generated_offset: usize, generated_length: usize) {
        let diagnostics = mapped.diagnostics_range();
        let semantic = mapped.semantic.unwrap_or(diagnostics.is_some());
        let reversed = mapped.reverse.unwrap_or(mapped.types) || self.support_reverse_types;
        let flags = build_mapping_flags(self.ignore_mappings, mapped.types, semantic, reversed);
        let diagnostics = if self.ignore_mappings { None } else { diagnostics };
        self.source_mappings.insert(SourceMapping {
            source_offset: mapped.range.start,
            source_length: mapped.range.len(),
            generated_offset,
            generated_length,
            diagnostics_offset: diagnostics.map(|r| r.start),
            diagnostics_length: diagnostics.map(|r| r.len()),
            flags,
        });
        if self.ignore_mappings {
            return;
        }
        if mapped.context_var {
            self.context_var_mappings.push(ContextVarMapping {
                element_name_offset: mapped.range.start,
                element_name_length: mapped.range.len(),
                generated_offset,
                generated_length,
            });
        }
        if let Some(directive) = mapped.var_of_directive {
            self.directive_var_mappings.push(DirectiveVarMapping {
                element_name_offset: mapped.range.start,
                element_name_length: mapped.range.len(),
                directive,
                generated_offset,
                generated_length,
            });
        }
        if let Some(names) = mapped.names {
            self.name_mappings.push((mapped.range.start, names));
        }
    }

    /// Splices a completed expression, shifting all of its mappings to the
    /// current position.
    pub fn append_expr(&mut self, expr: &Expression) -> &mut Self {
        let offset = self.code.len();
        self.code.push_str(&expr.code);
        for mapping in &expr.source_mappings {
            let mut mapping = mapping.offset_by(offset, 0);
            if self.ignore_mappings {
                mapping.diagnostics_offset = None;
                mapping.diagnostics_length = None;
                mapping.flags &= SourceMappingFlags::REVERSE_TYPES;
            }
            if self.support_reverse_types {
                mapping.flags |= SourceMappingFlags::REVERSE_TYPES;
            }
            self.source_mappings.insert(mapping);
        }
        if !self.ignore_mappings {
            for m in &expr.context_var_mappings {
                self.context_var_mappings.push(ContextVarMapping {
                    generated_offset: m.generated_offset + offset,
                    ..*m
                });
            }
            for m in &expr.directive_var_mappings {
                self.directive_var_mappings.push(DirectiveVarMapping {
                    generated_offset: m.generated_offset + offset,
                    ..m.clone()
                });
            }
            self.name_mappings.extend(expr.name_mappings.iter().cloned());
        }
        self
    }

    pub fn append_statement(&mut self, statement: &Statement) -> &mut Self {
        self.append_expr(statement.expression());
        self.new_line()
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.code.push('\n');
        self
    }

    /// Runs `f` and records one mapping spanning everything it emitted.
    /// A `None` range just runs `f`.
    pub fn with_source_span(
        &mut self,
        range: Option<TextRange>,
        types: bool,
        f: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let _ = self.try_with_source_span::<std::convert::Infallible>(range, types, |b| {
            f(b);
            Ok(())
        });
        self
    }

    pub fn try_with_source_span<E>(
        &mut self,
        range: Option<TextRange>,
        types: bool,
        f: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<&mut Self, E> {
        let Some(range) = range else {
            f(self)?;
            return Ok(self);
        };
        let generated_offset = self.code.len();
        f(self)?;
        let generated_length = self.code.len() - generated_offset;
        let mut mapped = Mapped::at(range);
        if types {
            mapped = mapped.types();
        }
        self.record_mapping(mapped, generated_offset, generated_length);
        Ok(self)
    }

    /// Runs `f` with all source offsets it records shifted right by `offset`.
    /// Used for expressions whose own coordinates are relative to an inline
    /// fragment within the host file.
    pub fn with_mappings_offset(&mut self, offset: usize, f: impl FnOnce(&mut Self)) -> &mut Self {
        let _ = self.try_with_mappings_offset::<std::convert::Infallible>(offset, |b| {
            f(b);
            Ok(())
        });
        self
    }

    pub fn try_with_mappings_offset<E>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<&mut Self, E> {
        if offset == 0 {
            f(self)?;
            return Ok(self);
        }
        let mut sub = ExpressionBuilder {
            ignore_mappings: self.ignore_mappings,
            support_reverse_types: self.support_reverse_types,
            ..Default::default()
        };
        f(&mut sub)?;
        let splice = self.code.len();
        self.code.push_str(&sub.code);
        for mapping in sub.source_mappings {
            self.source_mappings.insert(mapping.offset_by(splice, offset));
        }
        for m in sub.context_var_mappings {
            self.context_var_mappings.push(ContextVarMapping {
                element_name_offset: m.element_name_offset + offset,
                generated_offset: m.generated_offset + splice,
                ..m
            });
        }
        for m in sub.directive_var_mappings {
            self.directive_var_mappings.push(DirectiveVarMapping {
                element_name_offset: m.element_name_offset + offset,
                generated_offset: m.generated_offset + splice,
                ..m
            });
        }
        for (start, names) in sub.name_mappings {
            self.name_mappings.push((start + offset, names));
        }
        Ok(self)
    }

    /// Runs `f` with mapping recording suppressed. Mappings recorded inside
    /// keep only their reverse-types capability and no diagnostics range.
    pub fn with_ignore_mappings(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        let _ = self.try_with_ignore_mappings::<std::convert::Infallible>(|b| {
            f(b);
            Ok(())
        });
        self
    }

    pub fn try_with_ignore_mappings<E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<&mut Self, E> {
        let saved = self.ignore_mappings;
        self.ignore_mappings = true;
        let result = f(self);
        self.ignore_mappings = saved;
        result?;
        Ok(self)
    }

    /// Runs `f` with reverse-types capability added to every mapping it
    /// records.
    pub fn with_support_reverse_types(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        let saved = self.support_reverse_types;
        self.support_reverse_types = true;
        f(self);
        self.support_reverse_types = saved;
        self
    }

    pub fn code_block(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        self.append("{\n");
        f(self);
        self.append("}")
    }

    pub fn try_code_block<E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<&mut Self, E> {
        self.append("{\n");
        f(self)?;
        Ok(self.append("}"))
    }

    /// Removes all mappings whose source range is exactly `range`.
    pub fn remove_mappings(&mut self, range: TextRange) -> &mut Self {
        self.source_mappings
            .retain(|m| !(m.source_offset == range.start && m.source_length == range.len()));
        self
    }
}
