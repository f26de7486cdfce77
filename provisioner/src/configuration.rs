// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use clap::{ArgAction, Args, Parser, Subcommand};
use ipnet::Ipv4Net;

use crate::constants::DEFAULT_REGION;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ProvisionerOptions {
    #[arg(long, global = true, default_value = DEFAULT_REGION, env("PROVISIONER_REGION"))]
    pub region: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Request a peering connection to a network owned by another account
    Peer(PeerOptions),
    /// Accept a pending peering connection
    Accept(AcceptOptions),
    /// Create a network tagged with a unique name
    CreateNetwork(CreateNetworkOptions),
}

#[derive(Debug, Clone, Default, Args)]
pub struct PeerOptions {
    /// Name tag of the network in this account
    #[arg(long, env("PROVISIONER_LOCAL_VPC_NAME"))]
    pub local_vpc_name: String,
    /// Name tag of the network in the remote account
    #[arg(long, env("PROVISIONER_REMOTE_VPC_NAME"))]
    pub remote_vpc_name: String,
    /// Account that owns the remote network; defaults to the owner reported by the lookup
    #[arg(long, env("PROVISIONER_REMOTE_OWNER_ID"))]
    pub remote_owner_id: Option<String>,
    #[arg(long, default_value = "false", env("PROVISIONER_ATTACH_ROUTES"), action = ArgAction::SetTrue)]
    pub attach_routes: bool,
    /// Also route the remote subnets back to the local network
    #[arg(long, default_value = "false", env("PROVISIONER_BIDIRECTIONAL"), action = ArgAction::SetTrue)]
    pub bidirectional: bool,
    /// Create and attach an internet gateway with default routes for public subnets first
    #[arg(long, default_value = "false", env("PROVISIONER_INTERNET_GATEWAY"), action = ArgAction::SetTrue)]
    pub internet_gateway: bool,
    /// Print the ordered plan without creating anything
    #[arg(long, default_value = "false", env("PROVISIONER_DRY_RUN"), action = ArgAction::SetTrue)]
    pub dry_run: bool,
}

impl PeerOptions {
    pub fn routes_local(&self) -> bool {
        self.attach_routes || self.bidirectional
    }

    pub fn needs_local_subnets(&self) -> bool {
        self.routes_local() || self.internet_gateway
    }
}

#[derive(Debug, Clone, Args)]
pub struct AcceptOptions {
    #[arg(long, env("PROVISIONER_PEERING_ID"))]
    pub peering_id: String,
    /// Accept with the EXTERNAL_* credentials instead of the default chain
    #[arg(long, default_value = "false", env("PROVISIONER_EXTERNAL_CREDENTIALS"), action = ArgAction::SetTrue)]
    pub external_credentials: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CreateNetworkOptions {
    #[arg(long, env("PROVISIONER_NETWORK_NAME"))]
    pub name: String,
    #[arg(long, env("PROVISIONER_CIDR_BLOCK"))]
    pub cidr_block: Ipv4Net,
    /// Create the network with the EXTERNAL_* credentials instead of the default chain
    #[arg(long, default_value = "false", env("PROVISIONER_EXTERNAL_CREDENTIALS"), action = ArgAction::SetTrue)]
    pub external_credentials: bool,
}
