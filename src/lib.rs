//! Spawnpress - provisions ephemeral per-tenant WordPress stacks on Docker
//!
//! This library provides the container lifecycle orchestration for a
//! one-click WordPress platform:
//! - Derives deterministic container names and site identifiers from
//!   user-supplied names
//! - Keeps the singleton infrastructure services (MySQL, Traefik,
//!   phpMyAdmin) running with idempotent ensure-running semantics
//! - Allocates non-conflicting host ports and table prefixes by reading
//!   the engine's own container listing
//! - Attaches Traefik routing labels (TLS, HTTPS redirect, security
//!   headers) to each site container
//! - Runs the in-container bootstrap pipeline that turns a generic
//!   WordPress image into a configured, addressable site
//! - Polls engine state and site URLs for readiness with bounded waits

pub mod allocator;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod database;
pub mod docker;
pub mod error;
pub mod naming;
pub mod provisioner;
pub mod readiness;
pub mod routes;
pub mod services;
pub mod site;

pub use config::Config;
pub use error::{Error, Result};
pub use provisioner::{CreateSiteRequest, DeleteOutcome, SiteProvisioner};
pub use site::{Site, VolumeBinding};
