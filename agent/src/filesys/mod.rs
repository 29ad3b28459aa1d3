pub mod file;
pub mod lock;
