// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::ProvisionError;

/// A virtual network (VPC) as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    /// The provider-assigned network id, unique within the owning account.
    pub id: String,
    /// The account that owns the network.
    pub owner_account_id: String,
    /// The primary IPv4 CIDR block of the network.
    pub cidr_block: Ipv4Net,
}

impl NetworkRef {
    /// Whether the two address ranges share any address.
    pub fn overlaps(&self, other: &NetworkRef) -> bool {
        self.cidr_block.contains(&other.cidr_block.network())
            || other.cidr_block.contains(&self.cidr_block.network())
    }
}

/// A subnet whose route table may receive peering routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub cidr_block: Ipv4Net,
    /// The route table associated with the subnet (explicitly or as the main table).
    pub route_table_id: String,
    /// Public subnets need an attached internet gateway route before peering routes are added.
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringRequest {
    pub local_network: NetworkRef,
    pub remote_network: NetworkRef,
    pub remote_owner_account_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeeringState {
    PendingAcceptance,
    Provisioning,
    Active,
    Rejected,
    Expired,
    Failed,
    Deleted,
}

impl PeeringState {
    /// Maps a `VpcPeeringConnectionStateReasonCode` string onto a state.
    pub fn from_provider_code(code: &str) -> Result<Self, ProvisionError> {
        match code {
            "initiating-request" | "pending-acceptance" => Ok(Self::PendingAcceptance),
            "provisioning" => Ok(Self::Provisioning),
            "active" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            "deleted" | "deleting" => Ok(Self::Deleted),
            other => Err(ProvisionError::ValidationError(format!(
                "unknown peering connection state: {other}"
            ))),
        }
    }
}

/// A submitted peering connection. Accepting it is an out-of-band step
/// performed by the owner of the remote network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringConnection {
    pub id: String,
    pub state: PeeringState,
    pub request: PeeringRequest,
}

/// The target of a route table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum RouteTarget {
    Gateway(String),
    Peering(String),
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway(id) | Self::Peering(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub subnet_id: String,
    pub route_table_id: String,
    pub destination_cidr: Ipv4Net,
    pub via_peering_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteFailure {
    pub subnet_id: String,
    pub route_table_id: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: ProvisionError,
}

/// Outcome of attaching peering routes. Nothing is rolled back on failure,
/// so `succeeded` lists the routes that now exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteAttachmentReport {
    pub succeeded: Vec<RouteEntry>,
    pub failed: Vec<RouteFailure>,
}

impl RouteAttachmentReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_error<S: Serializer>(error: &ProvisionError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
