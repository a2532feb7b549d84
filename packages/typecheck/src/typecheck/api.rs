//! Output bundle types
//!
//! Immutable results of one generation pass: generated code plus the
//! source<->generated mapping tables consumed by diagnostics translation,
//! navigation and semantic highlighting.

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::parse_util::TextRange;
use crate::typecheck::oob::Diagnostic;

bitflags! {
    /// Capabilities of a single source mapping. A mapping with no flags and no
    /// diagnostics range participates only in raw text correspondence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SourceMappingFlags: u8 {
        const FORMAT = 1 << 0;
        const COMPLETION = 1 << 1;
        const NAVIGATION = 1 << 2;
        const SEMANTIC = 1 << 3;
        const TYPES = 1 << 4;
        const STRUCTURE = 1 << 5;
        const REVERSE_TYPES = 1 << 6;
    }
}

/// A single source<->generated position mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceMapping {
    pub source_offset: usize,
    pub source_length: usize,
    pub generated_offset: usize,
    pub generated_length: usize,
    pub diagnostics_offset: Option<usize>,
    pub diagnostics_length: Option<usize>,
    pub flags: SourceMappingFlags,
}

impl SourceMapping {
    pub fn source_range(&self) -> TextRange {
        TextRange::new(self.source_offset, self.source_offset + self.source_length)
    }

    pub fn generated_range(&self) -> TextRange {
        TextRange::new(self.generated_offset, self.generated_offset + self.generated_length)
    }

    /// Returns the mapping shifted for splicing into a larger generated file
    /// at `generated_offset`, with source positions shifted by `source_offset`.
    pub fn offset_by(&self, generated_offset: usize, source_offset: usize) -> SourceMapping {
        SourceMapping {
            source_offset: self.source_offset + source_offset,
            generated_offset: self.generated_offset + generated_offset,
            diagnostics_offset: self.diagnostics_offset.map(|it| it + source_offset),
            ..*self
        }
    }
}

/// Maps an element's name range to the generated range of its template
/// context variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextVarMapping {
    pub element_name_offset: usize,
    pub element_name_length: usize,
    pub generated_offset: usize,
    pub generated_length: usize,
}

/// Maps an element's name range to the generated range of one directive's
/// instance variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectiveVarMapping {
    pub element_name_offset: usize,
    pub element_name_length: usize,
    /// Class name of the directive the variable was declared for.
    pub directive: String,
    pub generated_offset: usize,
    pub generated_length: usize,
}

/// Maps a source offset to renames applied to identifiers generated for it.
pub type NameMapping = (usize, IndexMap<String, String>);

/// The transpiled type-check block for one component template.
#[derive(Debug, Clone)]
pub struct TranspiledTemplate {
    /// Name of the template file the source offsets refer to.
    pub file_name: String,
    pub generated_code: String,
    pub source_mappings: Vec<SourceMapping>,
    pub context_var_mappings: Vec<ContextVarMapping>,
    pub directive_var_mappings: Vec<DirectiveVarMapping>,
    pub diagnostics: Vec<Diagnostic>,
    pub name_mappings: Vec<NameMapping>,
}

/// The transpiled type-check block for one directive's host bindings.
#[derive(Debug, Clone)]
pub struct TranspiledHostBindings {
    /// Name of the class whose host bindings were checked.
    pub class_name: String,
    /// Ranges of the inline binding fragments within the component file.
    pub inline_code_ranges: Vec<TextRange>,
    pub generated_code: String,
    pub source_mappings: Vec<SourceMapping>,
    pub context_var_mappings: Vec<ContextVarMapping>,
    pub directive_var_mappings: Vec<DirectiveVarMapping>,
    pub diagnostics: Vec<Diagnostic>,
    pub name_mappings: Vec<NameMapping>,
}
