//! APKForge Core
//!
//! Core types shared by the APKForge build services.
//!
//! This crate contains:
//! - Domain types: build jobs, their state machine, and build requests
//! - DTOs: the wire shapes exchanged between the orchestrator and its clients

pub mod domain;
pub mod dto;
