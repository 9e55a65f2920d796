pub mod event;
pub mod ids;
pub mod script;
pub mod validate;
