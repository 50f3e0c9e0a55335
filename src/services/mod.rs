// src/services/mod.rs

pub mod certificate;
pub mod grading;
pub mod progress;
