//! Generated file assembly
//!
//! Stitches the environment preamble and the generated blocks into one file,
//! shifting every mapping to its final generated position. The source side is
//! then tiled with plain filler mappings so that any source offset translates
//! to some generated position, and the type-capable mappings are checked for
//! uniqueness: two mappings claiming types for the same source range would
//! make reverse lookups ambiguous.

use indexmap::IndexMap;

use crate::parse_util::TextRange;
use crate::typecheck::api::{
    ContextVarMapping, DirectiveVarMapping, NameMapping, SourceMapping, SourceMappingFlags,
    TranspiledHostBindings, TranspiledTemplate,
};
use crate::typecheck::code_fragments::Expression;
use crate::typecheck::environment::Environment;
use crate::typecheck::oob::Diagnostic;
use crate::typecheck::type_check_block::{GeneratedBlock, TcbError};

/// Collects generated blocks destined for one output file.
#[derive(Debug)]
pub struct FileBuilder<'e> {
    env: &'e Environment,
    blocks: Vec<GeneratedBlock>,
}

struct AssembledFile {
    generated_code: String,
    source_mappings: Vec<SourceMapping>,
    context_var_mappings: Vec<ContextVarMapping>,
    directive_var_mappings: Vec<DirectiveVarMapping>,
    name_mappings: Vec<NameMapping>,
    diagnostics: Vec<Diagnostic>,
}

impl<'e> FileBuilder<'e> {
    pub fn new(env: &'e Environment) -> Self {
        FileBuilder { env, blocks: Vec::new() }
    }

    pub fn add_block(&mut self, block: GeneratedBlock) {
        self.blocks.push(block);
    }

    /// Finalizes a template file. `source` is the template text the recorded
    /// source offsets refer to.
    pub fn into_template(
        self,
        file_name: impl Into<String>,
        source: &str,
    ) -> Result<TranspiledTemplate, TcbError> {
        let mut file = self.assemble();
        verify_type_mappings(&file.source_mappings, source)?;
        fill_source_gaps(
            &mut file.source_mappings,
            &[TextRange::new(0, source.len())],
            file.generated_code.len(),
        );
        Ok(TranspiledTemplate {
            file_name: file_name.into(),
            generated_code: file.generated_code,
            source_mappings: file.source_mappings,
            context_var_mappings: file.context_var_mappings,
            directive_var_mappings: file.directive_var_mappings,
            diagnostics: file.diagnostics,
            name_mappings: file.name_mappings,
        })
    }

    /// Finalizes a host-bindings file. `source` is the component file text;
    /// only the inline binding fragments are tiled with filler mappings.
    pub fn into_host_bindings(
        self,
        class_name: impl Into<String>,
        inline_code_ranges: Vec<TextRange>,
        source: &str,
    ) -> Result<TranspiledHostBindings, TcbError> {
        let mut file = self.assemble();
        verify_type_mappings(&file.source_mappings, source)?;
        fill_source_gaps(&mut file.source_mappings, &inline_code_ranges, file.generated_code.len());
        Ok(TranspiledHostBindings {
            class_name: class_name.into(),
            inline_code_ranges,
            generated_code: file.generated_code,
            source_mappings: file.source_mappings,
            context_var_mappings: file.context_var_mappings,
            directive_var_mappings: file.directive_var_mappings,
            diagnostics: file.diagnostics,
            name_mappings: file.name_mappings,
        })
    }

    fn assemble(self) -> AssembledFile {
        let FileBuilder { env, mut blocks } = self;
        let diagnostics = blocks.iter_mut().flat_map(|b| std::mem::take(&mut b.diagnostics)).collect();
        // The preamble is rendered last (declarations accumulate while blocks
        // generate) but emitted first.
        let expression = Expression::build(|b| {
            b.append_expr(&env.preamble());
            for block in &blocks {
                b.append_expr(&block.expression);
            }
        });
        AssembledFile {
            generated_code: expression.code().to_string(),
            source_mappings: expression.source_mappings().to_vec(),
            context_var_mappings: expression.context_var_mappings().to_vec(),
            directive_var_mappings: expression.directive_var_mappings().to_vec(),
            name_mappings: expression.name_mappings().to_vec(),
            diagnostics,
        }
    }
}

/// Errors when more than one mapping claims type capability for the same
/// source range.
fn verify_type_mappings(mappings: &[SourceMapping], source: &str) -> Result<(), TcbError> {
    let mut counts: IndexMap<TextRange, usize> = IndexMap::new();
    for mapping in mappings {
        if mapping.flags.contains(SourceMappingFlags::TYPES) {
            *counts.entry(mapping.source_range()).or_default() += 1;
        }
    }
    let mut offending: Vec<String> = Vec::new();
    for (range, count) in counts {
        if count > 1 {
            let text = if range.end <= source.len() { range.text_of(source) } else { "" };
            offending.push(format!("«{text}» [{}]", range.start));
        }
    }
    if offending.is_empty() {
        Ok(())
    } else {
        Err(TcbError::DuplicateTypeMappings(offending.join("\n")))
    }
}

/// Adds zero-length filler mappings over every source span inside `regions`
/// not covered by an existing mapping, so position translation is total over
/// the authored source.
fn fill_source_gaps(
    mappings: &mut Vec<SourceMapping>,
    regions: &[TextRange],
    generated_len: usize,
) {
    let mut covered: Vec<TextRange> =
        mappings.iter().map(|m| m.source_range()).filter(|r| !r.is_empty()).collect();
    covered.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<TextRange> = Vec::with_capacity(covered.len());
    for range in covered {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    let mut fillers = Vec::new();
    for region in regions {
        let mut pos = region.start;
        for range in &merged {
            if range.end <= region.start || range.start >= region.end {
                continue;
            }
            if range.start > pos {
                fillers.push((pos, range.start.min(region.end)));
            }
            pos = pos.max(range.end);
        }
        if pos < region.end {
            fillers.push((pos, region.end));
        }
    }
    for (start, end) in fillers {
        mappings.push(SourceMapping {
            source_offset: start,
            source_length: end - start,
            generated_offset: generated_len,
            generated_length: 0,
            diagnostics_offset: None,
            diagnostics_length: None,
            flags: SourceMappingFlags::empty(),
        });
    }
}
