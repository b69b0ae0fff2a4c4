pub mod fence;
pub mod validate;
