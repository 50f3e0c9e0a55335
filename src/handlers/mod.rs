// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod authoring;
pub mod catalog;
pub mod certificate;
pub mod enrollment;
pub mod organization;
pub mod quiz;
