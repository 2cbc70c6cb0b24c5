//! Command implementations

pub mod demo;
pub mod match_company;
pub mod plan;
pub mod run;
