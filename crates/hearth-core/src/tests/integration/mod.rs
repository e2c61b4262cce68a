#![cfg(test)]

pub mod common;
pub mod container_cache_tests;
pub mod kernel_tests;
pub mod page_cache_tests;
pub mod provider_tests;
