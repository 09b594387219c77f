pub mod domain;
pub mod firmware;
pub mod hook;
pub mod vmi;
