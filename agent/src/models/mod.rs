//! Domain models

pub mod device;
