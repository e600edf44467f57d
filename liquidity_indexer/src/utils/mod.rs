pub mod address_helper;
pub mod constants;
pub mod logger;
