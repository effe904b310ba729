//! Use-case services over repository contracts.

pub mod device_service;
