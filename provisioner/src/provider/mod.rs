// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! The provisioning API seen by the locator, requester and route attacher.
//!
//! Every method is a single request/response exchange. Implementations
//! never retry and never roll back; errors are classified into
//! [`ProvisionError`] and returned to the caller as-is.
//!
//! - [`ec2`]: the EC2 API through `aws-sdk-ec2`
//! - [`memory`]: an in-process provider with the same rejection rules

use async_trait::async_trait;
use ipnet::Ipv4Net;

use crate::errors::ProvisionError;
use crate::models::{NetworkRef, PeeringRequest, PeeringState, RouteTarget, Subnet};

pub mod ec2;
pub mod memory;

pub use ec2::Ec2Provider;
pub use memory::InMemoryProvider;

#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Creates a network with the address range `cidr_block`, tagged `Name=name`.
    async fn create_network(
        &self,
        name: &str,
        cidr_block: Ipv4Net,
    ) -> Result<NetworkRef, ProvisionError>;

    /// Returns every network whose tag `key` equals `value`.
    async fn describe_networks_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<NetworkRef>, ProvisionError>;

    /// Returns the subnets of a network together with their route tables.
    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>, ProvisionError>;

    /// Submits a peering request and returns the connection id and its initial state.
    async fn create_peering_connection(
        &self,
        request: &PeeringRequest,
    ) -> Result<(String, PeeringState), ProvisionError>;

    async fn accept_peering_connection(
        &self,
        peering_id: &str,
    ) -> Result<PeeringState, ProvisionError>;

    async fn create_internet_gateway(&self) -> Result<String, ProvisionError>;

    async fn attach_internet_gateway(
        &self,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<(), ProvisionError>;

    /// Whether the route table carries a usable route through an attached internet gateway.
    async fn has_gateway_route(&self, route_table_id: &str) -> Result<bool, ProvisionError>;

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &RouteTarget,
    ) -> Result<(), ProvisionError>;
}
