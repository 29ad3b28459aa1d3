//! Wire models for the device management backend

pub mod models;
