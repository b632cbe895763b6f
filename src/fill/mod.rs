pub mod confirm;
pub mod executor;
pub mod fill_script;
pub mod fillable;
