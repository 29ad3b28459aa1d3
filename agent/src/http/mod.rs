//! Backend API client

pub mod api;
pub mod client;
pub mod devices;
pub mod os;
