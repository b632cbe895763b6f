pub mod collector;
pub mod labels;
pub mod page_details;
pub mod visibility;
