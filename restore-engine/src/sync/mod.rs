//! Binary delta application.

pub mod apply;
