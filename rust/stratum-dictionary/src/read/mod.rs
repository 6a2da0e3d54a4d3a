pub mod factory;
pub mod iterator;
pub mod reader;
