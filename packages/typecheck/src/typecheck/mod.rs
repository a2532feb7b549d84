pub mod api;
pub mod code_fragments;
pub mod environment;
pub mod file_builder;
pub mod oob;
pub mod type_check_block;
