pub mod deep_query;
pub mod selector;
