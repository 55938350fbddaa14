pub mod filter;
pub mod operation;
