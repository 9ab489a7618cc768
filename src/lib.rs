//! HappyHelm: Kubernetes operator for Helm releases and repositories
//!
//! This crate reconciles `DeployChart` resources into Helm releases and
//! `Repository` resources into Helm repository registrations by driving
//! the `helm` binary.

pub mod controller;
pub mod crd;
pub mod error;
pub mod helm;
pub mod values;

pub use crate::error::{Error, Result};
