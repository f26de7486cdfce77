// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Peering Provisioner
//!
//! Cross-account VPC peering for a multi-account deployment.
//!
//! The provisioner looks up a network owned by another account by its `Name`
//! tag, using short-lived credentials for that account, requests a peering
//! connection with an explicit owner account id, and optionally routes the
//! subnets on both sides through it.
//!
//! ## Architecture
//!
//! ```text
//! EXTERNAL_* env -> credentials -> locator (remote) --+
//!                                  locator (local)  --+-> plan -> executor
//!                                                              |
//!                                   gateway -> attachment -> public routes
//!                                   peering -> local routes / remote routes
//! ```
//!
//! Startup is split in two phases. Every lookup happens first; the plan of
//! creation steps is then built from resolved values and executed in
//! dependency order. Nothing is retried and nothing is rolled back: the first
//! failed step stops the run.
//!
//! ## Modules
//!
//! - [`application`]: two-phase startup and plan layout for the `peer` command
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: environment variable names, tag keys and step names
//! - [`credentials`]: external account credentials from the environment
//! - [`errors`]: error taxonomy and EC2 error code mapping
//! - [`locator`]: network lookup and creation by name tag
//! - [`models`]: networks, subnets, peering connections and routes
//! - [`peering`]: peering requests and acceptance
//! - [`plan`]: dependency-ordered steps and their executor
//! - [`provider`]: the provisioning API trait, EC2 and in-memory implementations
//! - [`routes`]: peering routes per subnet with partial-failure reporting
//!
//! ## Usage
//!
//! ```bash
//! EXTERNAL_ACCESS_KEY_ID=... EXTERNAL_SECRET_ACCESS_KEY=... \
//!     peering-provisioner peer --local-vpc-name primac-vpc \
//!     --remote-vpc-name vpc-de-produccion --attach-routes
//!
//! peering-provisioner accept --peering-id pcx-0123456789abcdef0
//!
//! peering-provisioner create-network --name vpc-de-produccion --cidr-block 10.2.0.0/16
//! ```

pub mod application;
pub mod configuration;
pub mod constants;
pub mod credentials;
pub mod errors;
pub mod locator;
pub mod models;
pub mod peering;
pub mod plan;
pub mod provider;
pub mod routes;
