pub mod ast;
pub mod binder;
pub mod meta;
