pub mod address_space;
pub mod memory_provider;
