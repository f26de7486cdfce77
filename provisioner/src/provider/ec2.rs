// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{
    Filter, ResourceType, RouteState, Tag, TagSpecification, Vpc, VpcPeeringConnection,
};
use ipnet::Ipv4Net;

use crate::constants::{INTERNET_GATEWAY_PREFIX, NAME_TAG_KEY};
use crate::credentials::Credential;
use crate::errors::ProvisionError;
use crate::models::{NetworkRef, PeeringRequest, PeeringState, RouteTarget, Subnet};
use crate::provider::NetworkProvider;

/// [`NetworkProvider`] backed by the EC2 API of a single account and region.
pub struct Ec2Provider {
    client: Client,
}

impl Ec2Provider {
    /// Builds a client for `region`.
    ///
    /// Without a `credential` the default provider chain is used (environment,
    /// profile, IMDS). With one, the client is pinned to those static credentials.
    pub async fn load(region: &str, credential: Option<&Credential>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

        if let Some(credential) = credential {
            loader = loader.credentials_provider(Credentials::from(credential));
        }

        let config = loader.load().await;

        tracing::debug!("[provisioner] loaded EC2 client for {}", region);

        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn route_table_for(
        &self,
        subnet_id: &str,
        network_id: &str,
    ) -> Result<String, ProvisionError> {
        let explicit = self
            .client
            .describe_route_tables()
            .filters(filter("association.subnet-id", subnet_id))
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("DescribeRouteTables", e))?;

        if let Some(id) = explicit
            .route_tables()
            .iter()
            .find_map(|table| table.route_table_id())
        {
            return Ok(id.to_string());
        }

        // Subnets without an explicit association use the main route table
        let main = self
            .client
            .describe_route_tables()
            .filters(filter("vpc-id", network_id))
            .filters(filter("association.main", "true"))
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("DescribeRouteTables", e))?;

        main.route_tables()
            .iter()
            .find_map(|table| table.route_table_id())
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::NotFound(format!("route table for {subnet_id}")))
    }
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

fn parse_cidr(resource: &str, cidr: Option<&str>) -> Result<Ipv4Net, ProvisionError> {
    cidr.ok_or_else(|| ProvisionError::ValidationError(format!("{resource} has no CIDR block")))?
        .parse::<Ipv4Net>()
        .map_err(ProvisionError::from)
}

fn network(vpc: &Vpc) -> Result<NetworkRef, ProvisionError> {
    let id = vpc.vpc_id().unwrap_or_default().to_string();
    Ok(NetworkRef {
        cidr_block: parse_cidr(&id, vpc.cidr_block())?,
        owner_account_id: vpc.owner_id().unwrap_or_default().to_string(),
        id,
    })
}

fn peering_state(
    operation: &str,
    connection: Option<&VpcPeeringConnection>,
) -> Result<(String, PeeringState), ProvisionError> {
    let connection = connection.ok_or_else(|| ProvisionError::ProviderError {
        operation: operation.to_string(),
        code: "EmptyResponse".to_string(),
        message: "no peering connection in response".to_string(),
    })?;

    let id = connection
        .vpc_peering_connection_id()
        .unwrap_or_default()
        .to_string();

    let status = connection.status();
    let state = match status.and_then(|s| s.code()) {
        Some(code) => PeeringState::from_provider_code(code.as_str())?,
        None => PeeringState::PendingAcceptance,
    };

    if state == PeeringState::Failed {
        let message = status
            .and_then(|s| s.message())
            .unwrap_or("peering connection failed")
            .to_string();
        return Err(ProvisionError::from_provider(operation, Some("Failed"), Some(&message)));
    }

    Ok((id, state))
}

#[async_trait]
impl NetworkProvider for Ec2Provider {
    #[tracing::instrument(skip(self))]
    async fn create_network(
        &self,
        name: &str,
        cidr_block: Ipv4Net,
    ) -> Result<NetworkRef, ProvisionError> {
        let tags = TagSpecification::builder()
            .resource_type(ResourceType::Vpc)
            .tags(Tag::builder().key(NAME_TAG_KEY).value(name).build())
            .build();

        let output = self
            .client
            .create_vpc()
            .cidr_block(cidr_block.to_string())
            .tag_specifications(tags)
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("CreateVpc", e))?;

        let vpc = output.vpc().ok_or_else(|| ProvisionError::ProviderError {
            operation: "CreateVpc".to_string(),
            code: "EmptyResponse".to_string(),
            message: "no network in response".to_string(),
        })?;

        network(vpc)
    }

    #[tracing::instrument(skip(self))]
    async fn describe_networks_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<NetworkRef>, ProvisionError> {
        let output = self
            .client
            .describe_vpcs()
            .filters(filter(&format!("tag:{key}"), value))
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("DescribeVpcs", e))?;

        output.vpcs().iter().map(network).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>, ProvisionError> {
        let output = self
            .client
            .describe_subnets()
            .filters(filter("vpc-id", network_id))
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("DescribeSubnets", e))?;

        let mut subnets = Vec::with_capacity(output.subnets().len());
        for subnet in output.subnets() {
            let id = subnet.subnet_id().unwrap_or_default().to_string();
            subnets.push(Subnet {
                cidr_block: parse_cidr(&id, subnet.cidr_block())?,
                route_table_id: self.route_table_for(&id, network_id).await?,
                public: subnet.map_public_ip_on_launch().unwrap_or(false),
                id,
            });
        }

        tracing::debug!("[provisioner] {} has {} subnets", network_id, subnets.len());

        Ok(subnets)
    }

    #[tracing::instrument(skip(self, request), fields(local = %request.local_network.id, remote = %request.remote_network.id))]
    async fn create_peering_connection(
        &self,
        request: &PeeringRequest,
    ) -> Result<(String, PeeringState), ProvisionError> {
        let output = self
            .client
            .create_vpc_peering_connection()
            .vpc_id(&request.local_network.id)
            .peer_vpc_id(&request.remote_network.id)
            .peer_owner_id(&request.remote_owner_account_id)
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("CreateVpcPeeringConnection", e))?;

        peering_state("CreateVpcPeeringConnection", output.vpc_peering_connection())
    }

    #[tracing::instrument(skip(self))]
    async fn accept_peering_connection(
        &self,
        peering_id: &str,
    ) -> Result<PeeringState, ProvisionError> {
        let output = self
            .client
            .accept_vpc_peering_connection()
            .vpc_peering_connection_id(peering_id)
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("AcceptVpcPeeringConnection", e))?;

        let (_, state) =
            peering_state("AcceptVpcPeeringConnection", output.vpc_peering_connection())?;
        Ok(state)
    }

    #[tracing::instrument(skip(self))]
    async fn create_internet_gateway(&self) -> Result<String, ProvisionError> {
        let output = self
            .client
            .create_internet_gateway()
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("CreateInternetGateway", e))?;

        output
            .internet_gateway()
            .and_then(|gateway| gateway.internet_gateway_id())
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::ProviderError {
                operation: "CreateInternetGateway".to_string(),
                code: "EmptyResponse".to_string(),
                message: "no internet gateway in response".to_string(),
            })
    }

    #[tracing::instrument(skip(self))]
    async fn attach_internet_gateway(
        &self,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<(), ProvisionError> {
        self.client
            .attach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(network_id)
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("AttachInternetGateway", e))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn has_gateway_route(&self, route_table_id: &str) -> Result<bool, ProvisionError> {
        let output = self
            .client
            .describe_route_tables()
            .route_table_ids(route_table_id)
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("DescribeRouteTables", e))?;

        // a route to a detached gateway stays in the table as a blackhole
        Ok(output
            .route_tables()
            .iter()
            .flat_map(|table| table.routes())
            .any(|route| {
                route
                    .gateway_id()
                    .is_some_and(|id| id.starts_with(INTERNET_GATEWAY_PREFIX))
                    && route.state() != Some(&RouteState::Blackhole)
            }))
    }

    #[tracing::instrument(skip(self))]
    async fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &RouteTarget,
    ) -> Result<(), ProvisionError> {
        let request = self
            .client
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination.to_string());

        let request = match target {
            RouteTarget::Gateway(id) => request.gateway_id(id),
            RouteTarget::Peering(id) => request.vpc_peering_connection_id(id),
        };

        let output = request
            .send()
            .await
            .map_err(|e| ProvisionError::from_sdk("CreateRoute", e))?;

        if output.r#return() == Some(false) {
            return Err(ProvisionError::ProviderError {
                operation: "CreateRoute".to_string(),
                code: "Rejected".to_string(),
                message: format!("route {destination} via {target} was not created"),
            });
        }

        Ok(())
    }
}
