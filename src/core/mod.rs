pub mod capabilities;
pub mod filter_compiler;
pub mod planner;
pub mod schema_infer;
pub mod sql;
pub mod value_parser;
