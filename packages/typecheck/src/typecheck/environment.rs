//! Generation environment
//!
//! Shared state for everything emitted outside the block body itself:
//! module import aliases, pipe instance variables and inline type
//! constructors. Declarations accumulate in first-use order and are rendered
//! as the preamble of the generated file.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::{IndexMap, IndexSet};

use crate::config::TypeCheckingConfig;
use crate::template::meta::{PipeMeta, TmplDirectiveMeta, TsDeclaration};
use crate::typecheck::code_fragments::{Expression, Identifier};

/// A symbol importable from a well-known module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSymbol {
    pub module: &'static str,
    pub name: &'static str,
}

pub const TEMPLATE_REF: ExternalSymbol =
    ExternalSymbol { module: "@angular/core", name: "TemplateRef" };
pub const UNWRAP_WRITABLE_SIGNAL: ExternalSymbol =
    ExternalSymbol { module: "@angular/core", name: "ɵunwrapWritableSignal" };
pub const INPUT_SIGNAL_BRAND_WRITE_TYPE: ExternalSymbol =
    ExternalSymbol { module: "@angular/core", name: "ɵINPUT_SIGNAL_BRAND_WRITE_TYPE" };
pub const ANIMATION_EVENT: ExternalSymbol =
    ExternalSymbol { module: "@angular/animations", name: "AnimationEvent" };

#[derive(Debug, Default)]
struct EnvState {
    /// module specifier -> import alias (`_i1`, `_i2`, ...).
    import_aliases: IndexMap<String, String>,
    /// pipe class -> instance variable.
    pipe_instances: IndexMap<TsDeclaration, Identifier>,
    /// directive class -> type constructor name.
    type_ctors: IndexMap<TsDeclaration, String>,
    /// Pipe and type constructor declarations, in first-use order.
    declarations: Vec<String>,
}

impl EnvState {
    fn alias_for(&mut self, module: &str) -> String {
        if let Some(alias) = self.import_aliases.get(module) {
            return alias.clone();
        }
        let alias = format!("_i{}", self.import_aliases.len() + 1);
        self.import_aliases.insert(module.to_string(), alias.clone());
        alias
    }

    fn reference(&mut self, decl: &TsDeclaration) -> String {
        match &decl.module {
            Some(module) => format!("{}.{}", self.alias_for(module), decl.name),
            None => decl.name.clone(),
        }
    }
}

/// Owns the declarations shared by all blocks generated into one file.
#[derive(Debug)]
pub struct Environment {
    config: TypeCheckingConfig,
    state: Mutex<EnvState>,
}

impl Environment {
    pub fn new(config: TypeCheckingConfig) -> Self {
        Environment { config, state: Mutex::new(EnvState::default()) }
    }

    pub fn config(&self) -> &TypeCheckingConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, EnvState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns an expression referring to the declaration, importing its
    /// module under an alias when needed.
    pub fn reference(&self, decl: &TsDeclaration) -> String {
        self.state().reference(decl)
    }

    /// Returns a reference to the declaration's type with every type
    /// parameter filled in as `any`.
    pub fn reference_type_with_any_params(&self, decl: &TsDeclaration) -> String {
        let base = self.reference(decl);
        if decl.type_parameters.is_empty() {
            base
        } else {
            let params = vec!["any"; decl.type_parameters.len()].join(", ");
            format!("{base}<{params}>")
        }
    }

    pub fn reference_external_symbol(&self, symbol: ExternalSymbol) -> String {
        format!("{}.{}", self.state().alias_for(symbol.module), symbol.name)
    }

    /// External types and values share the same import alias scheme.
    pub fn reference_external_type(&self, symbol: ExternalSymbol) -> String {
        self.reference_external_symbol(symbol)
    }

    /// Returns the instance variable for a pipe, declaring it on first use.
    pub fn pipe_inst(&self, pipe: &PipeMeta) -> Identifier {
        let mut state = self.state();
        if let Some(id) = state.pipe_instances.get(&pipe.ts_class) {
            return id.clone();
        }
        let id = Identifier::new(format!("_pipe{}", state.pipe_instances.len() + 1));
        let class_ref = state.reference(&pipe.ts_class);
        state.declarations.push(format!("var {} = null! as {};", id.name, class_ref));
        state.pipe_instances.insert(pipe.ts_class.clone(), id.clone());
        id
    }

    /// Returns the name of the inline type constructor for a generic
    /// directive, declaring it on first use.
    ///
    /// The constructor is a function whose single parameter picks the
    /// directive's input fields, so that calling it with the bound inputs
    /// lets the type checker infer the directive's type parameters.
    pub fn type_ctor_for(&self, dir: &TmplDirectiveMeta) -> String {
        let mut state = self.state();
        if let Some(name) = state.type_ctors.get(&dir.ts_class) {
            return name.clone();
        }
        let name = format!("_ctor{}", state.type_ctors.len() + 1);
        let class_ref = state.reference(&dir.ts_class);
        let type_params = if dir.ts_class.type_parameters.is_empty() {
            String::new()
        } else {
            format!("<{}>", dir.ts_class.type_parameters.join(", "))
        };
        let instance_type = format!("{class_ref}{type_params}");
        let fields: IndexSet<&str> = dir
            .inputs
            .values()
            .filter_map(|input| input.field_name.as_deref())
            .collect();
        let init_type = if fields.is_empty() {
            "{}".to_string()
        } else {
            let keys =
                fields.iter().map(|f| format!("\"{f}\"")).collect::<Vec<_>>().join(" | ");
            format!("Pick<{instance_type}, {keys}>")
        };
        state.declarations.push(format!(
            "declare function {name}{type_params}(init: {init_type}): {instance_type};"
        ));
        state.type_ctors.insert(dir.ts_class.clone(), name.clone());
        name
    }

    /// Renders the import statements and shared declarations that precede the
    /// generated blocks.
    pub fn preamble(&self) -> Expression {
        let state = self.state();
        Expression::build(|b| {
            for (module, alias) in &state.import_aliases {
                b.append(format!("import * as {alias} from \"{module}\";"));
                b.new_line();
            }
            for decl in &state.declarations {
                b.append(decl);
                b.new_line();
            }
        })
    }
}
