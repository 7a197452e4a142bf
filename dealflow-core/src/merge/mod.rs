pub mod derived;
pub mod identity;

pub use derived::merge_derived;
pub use identity::{is_tentative, tentative_id};
