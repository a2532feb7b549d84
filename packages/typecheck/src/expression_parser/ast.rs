//! Binding expression AST
//!
//! Node types for parsed binding expressions. The AST is produced by an
//! external expression parser; the generator only dispatches on node kind.
//! Spans are ranges into the source text the expression was parsed from.

use serde::{Deserialize, Serialize};

use crate::parse_util::TextRange;

/// Main AST enum containing all node types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AST {
    EmptyExpr(EmptyExpr),
    ImplicitReceiver(ImplicitReceiver),
    ThisReceiver(ThisReceiver),
    Chain(Chain),
    Conditional(Conditional),
    PropertyRead(PropertyRead),
    SafePropertyRead(SafePropertyRead),
    KeyedRead(KeyedRead),
    SafeKeyedRead(SafeKeyedRead),
    PropertyWrite(PropertyWrite),
    KeyedWrite(KeyedWrite),
    BindingPipe(BindingPipe),
    LiteralPrimitive(LiteralPrimitive),
    LiteralArray(LiteralArray),
    LiteralMap(LiteralMap),
    Interpolation(Interpolation),
    Binary(Binary),
    Unary(Unary),
    PrefixNot(PrefixNot),
    NonNullAssert(NonNullAssert),
    Call(Call),
    SafeCall(SafeCall),
    ParenthesizedExpression(ParenthesizedExpression),
}

/// Empty expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyExpr {
    pub span: TextRange,
}

/// Implicit receiver (the component instance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplicitReceiver {
    pub span: TextRange,
}

/// This receiver (explicit `this`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThisReceiver {
    pub span: TextRange,
}

/// Chain of expressions (e.g., `a; b; c`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub span: TextRange,
    pub expressions: Vec<Box<AST>>,
}

/// Ternary conditional (e.g., `condition ? a : b`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditional {
    pub span: TextRange,
    pub condition: Box<AST>,
    pub true_exp: Box<AST>,
    pub false_exp: Box<AST>,
}

/// Property read (e.g., `obj.property`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRead {
    pub span: TextRange,
    pub name_span: TextRange,
    pub receiver: Box<AST>,
    pub name: String,
}

/// Safe property read (e.g., `obj?.property`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafePropertyRead {
    pub span: TextRange,
    pub name_span: TextRange,
    pub receiver: Box<AST>,
    pub name: String,
}

/// Keyed read (e.g., `obj[key]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedRead {
    pub span: TextRange,
    pub receiver: Box<AST>,
    pub key: Box<AST>,
}

/// Safe keyed read (e.g., `obj?.[key]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeKeyedRead {
    pub span: TextRange,
    pub receiver: Box<AST>,
    pub key: Box<AST>,
}

/// Property write (e.g., `obj.property = value`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyWrite {
    pub span: TextRange,
    pub name_span: TextRange,
    pub receiver: Box<AST>,
    pub name: String,
    pub value: Box<AST>,
}

/// Keyed write (e.g., `obj[key] = value`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedWrite {
    pub span: TextRange,
    pub receiver: Box<AST>,
    pub key: Box<AST>,
    pub value: Box<AST>,
}

/// Pipe binding (e.g., `value | pipeName:arg1:arg2`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingPipe {
    pub span: TextRange,
    pub name_span: TextRange,
    pub exp: Box<AST>,
    pub name: String,
    pub args: Vec<Box<AST>>,
}

/// Literal primitive (string, number, boolean, null, undefined)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralPrimitive {
    pub span: TextRange,
    pub value: LiteralValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "literalType", content = "value")]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

/// Literal array (e.g., `[1, 2, 3]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralArray {
    pub span: TextRange,
    pub expressions: Vec<Box<AST>>,
}

/// A single key in a literal map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralMapKey {
    pub key: String,
    pub quoted: bool,
}

/// Literal map (e.g., `{a: 1, b: 2}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralMap {
    pub span: TextRange,
    pub keys: Vec<LiteralMapKey>,
    pub values: Vec<Box<AST>>,
}

/// Interpolation (e.g., `{{ value }}` segments within bound text)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpolation {
    pub span: TextRange,
    pub expressions: Vec<Box<AST>>,
}

/// Binary operation (e.g., `a + b`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binary {
    pub span: TextRange,
    pub operation: String,
    pub left: Box<AST>,
    pub right: Box<AST>,
}

/// Unary operation (e.g., `-a`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unary {
    pub span: TextRange,
    pub operator: String,
    pub expr: Box<AST>,
}

/// Prefix not (e.g., `!a`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixNot {
    pub span: TextRange,
    pub expression: Box<AST>,
}

/// Non-null assertion (e.g., `a!`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonNullAssert {
    pub span: TextRange,
    pub expression: Box<AST>,
}

/// Call (e.g., `fn(a, b)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub span: TextRange,
    pub receiver: Box<AST>,
    pub args: Vec<Box<AST>>,
}

/// Safe call (e.g., `fn?.(a, b)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeCall {
    pub span: TextRange,
    pub receiver: Box<AST>,
    pub args: Vec<Box<AST>>,
}

/// Parenthesized expression (e.g., `(a + b)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParenthesizedExpression {
    pub span: TextRange,
    pub expression: Box<AST>,
}

impl AST {
    pub fn span(&self) -> TextRange {
        match self {
            AST::EmptyExpr(n) => n.span,
            AST::ImplicitReceiver(n) => n.span,
            AST::ThisReceiver(n) => n.span,
            AST::Chain(n) => n.span,
            AST::Conditional(n) => n.span,
            AST::PropertyRead(n) => n.span,
            AST::SafePropertyRead(n) => n.span,
            AST::KeyedRead(n) => n.span,
            AST::SafeKeyedRead(n) => n.span,
            AST::PropertyWrite(n) => n.span,
            AST::KeyedWrite(n) => n.span,
            AST::BindingPipe(n) => n.span,
            AST::LiteralPrimitive(n) => n.span,
            AST::LiteralArray(n) => n.span,
            AST::LiteralMap(n) => n.span,
            AST::Interpolation(n) => n.span,
            AST::Binary(n) => n.span,
            AST::Unary(n) => n.span,
            AST::PrefixNot(n) => n.span,
            AST::NonNullAssert(n) => n.span,
            AST::Call(n) => n.span,
            AST::SafeCall(n) => n.span,
            AST::ParenthesizedExpression(n) => n.span,
        }
    }

    /// Strips any number of wrapping parentheses.
    pub fn unwrap_parens(&self) -> &AST {
        let mut current = self;
        while let AST::ParenthesizedExpression(inner) = current {
            current = &inner.expression;
        }
        current
    }

    pub fn is_implicit_or_this_receiver(&self) -> bool {
        matches!(self, AST::ImplicitReceiver(_) | AST::ThisReceiver(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AST::EmptyExpr(_))
    }
}

/// An expression AST together with the source text it was parsed from.
///
/// Node spans index into `source`. Keeping the text allows the generator to
/// re-emit untransformed sub-expressions verbatim, preserving the exact
/// characters the mappings point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ASTWithSource {
    pub ast: AST,
    pub source: String,
}

impl ASTWithSource {
    pub fn new(ast: AST, source: impl Into<String>) -> Self {
        ASTWithSource { ast, source: source.into() }
    }
}
