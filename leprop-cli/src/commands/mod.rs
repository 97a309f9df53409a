pub mod prop;
pub mod service;
