// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! An in-process [`NetworkProvider`].
//!
//! Resources live in a map behind a [`RwLock`] and receive EC2-shaped ids
//! (`vpc-`, `subnet-`, `rtb-`, `igw-`, `pcx-`). The provider applies the
//! rejections the platform would: overlapping peer ranges, the per-account
//! peering quota, unauthorized peer accounts, routes to detached gateways
//! and unknown resources.
//!
//! Peering connections are visible to both accounts involved. Providers built
//! with [`InMemoryProvider::sharing_peerings_with`] see the same connections,
//! so one side can request and the other accept or route.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use tokio::sync::RwLock;

use crate::constants::NAME_TAG_KEY;
use crate::errors::ProvisionError;
use crate::models::{NetworkRef, PeeringRequest, PeeringState, RouteTarget, Subnet};
use crate::provider::NetworkProvider;

/// Default number of peering connections an account may hold.
pub const DEFAULT_PEERING_LIMIT: usize = 50;

#[derive(Debug, Clone)]
struct Network {
    tags: BTreeMap<String, String>,
    network: NetworkRef,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    networks: Vec<Network>,
    subnets: BTreeMap<String, Vec<Subnet>>,
    route_tables: BTreeMap<String, Vec<(Ipv4Net, RouteTarget)>>,
    /// Internet gateways and the network each one is attached to.
    gateways: BTreeMap<String, Option<String>>,
    denied_accounts: BTreeSet<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:017x}", self.next_id)
    }

    fn push_subnet(
        &mut self,
        network_id: &str,
        cidr_block: Ipv4Net,
        route_table_id: String,
        public: bool,
    ) -> Subnet {
        let subnet = Subnet {
            id: self.next_id("subnet"),
            cidr_block,
            route_table_id,
            public,
        };
        self.subnets
            .entry(network_id.to_string())
            .or_default()
            .push(subnet.clone());
        subnet
    }
}

type Peerings = BTreeMap<String, (PeeringRequest, PeeringState)>;

pub struct InMemoryProvider {
    account_id: String,
    peering_limit: usize,
    state: RwLock<State>,
    peerings: Arc<RwLock<Peerings>>,
}

impl InMemoryProvider {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            peering_limit: DEFAULT_PEERING_LIMIT,
            state: RwLock::new(State::default()),
            peerings: Arc::default(),
        }
    }

    /// Uses the peering connections of `other`, as a second account would.
    pub fn sharing_peerings_with(mut self, other: &InMemoryProvider) -> Self {
        self.peerings = other.peerings.clone();
        self
    }

    fn involves(&self, request: &PeeringRequest) -> bool {
        request.local_network.owner_account_id == self.account_id
            || request.remote_owner_account_id == self.account_id
    }

    pub fn with_peering_limit(mut self, limit: usize) -> Self {
        self.peering_limit = limit;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Registers a network tagged `Name=name` owned by this account.
    pub async fn add_network(&self, name: &str, cidr_block: Ipv4Net) -> NetworkRef {
        let mut state = self.state.write().await;
        let network = NetworkRef {
            id: state.next_id("vpc"),
            owner_account_id: self.account_id.clone(),
            cidr_block,
        };
        state.networks.push(Network {
            tags: BTreeMap::from([(NAME_TAG_KEY.to_string(), name.to_string())]),
            network: network.clone(),
        });
        state.subnets.insert(network.id.clone(), Vec::new());
        network
    }

    /// Registers a subnet with its own, initially empty, route table.
    pub async fn add_subnet(
        &self,
        network_id: &str,
        cidr_block: Ipv4Net,
        public: bool,
    ) -> Result<Subnet, ProvisionError> {
        let mut state = self.state.write().await;
        if !state.subnets.contains_key(network_id) {
            return Err(ProvisionError::NotFound(network_id.to_string()));
        }

        let route_table_id = state.next_id("rtb");
        state.route_tables.insert(route_table_id.clone(), Vec::new());
        Ok(state.push_subnet(network_id, cidr_block, route_table_id, public))
    }

    /// Registers a subnet associated with an existing route table, as subnets
    /// falling back to a network's main table are.
    pub async fn add_subnet_in_table(
        &self,
        network_id: &str,
        cidr_block: Ipv4Net,
        route_table_id: &str,
        public: bool,
    ) -> Result<Subnet, ProvisionError> {
        let mut state = self.state.write().await;
        if !state.subnets.contains_key(network_id) {
            return Err(ProvisionError::NotFound(network_id.to_string()));
        }
        if !state.route_tables.contains_key(route_table_id) {
            return Err(ProvisionError::NotFound(route_table_id.to_string()));
        }

        Ok(state.push_subnet(network_id, cidr_block, route_table_id.to_string(), public))
    }

    /// Makes every peering request towards `account_id` fail authorization.
    pub async fn deny_peering_with(&self, account_id: &str) {
        let mut state = self.state.write().await;
        state.denied_accounts.insert(account_id.to_string());
    }

    /// Number of peering connections this account is part of.
    pub async fn peering_count(&self) -> usize {
        let peerings = self.peerings.read().await;
        peerings.values().filter(|(r, _)| self.involves(r)).count()
    }

    pub async fn peering_state(&self, peering_id: &str) -> Option<PeeringState> {
        let peerings = self.peerings.read().await;
        peerings
            .get(peering_id)
            .filter(|(r, _)| self.involves(r))
            .map(|(_, s)| *s)
    }

    pub async fn routes(&self, route_table_id: &str) -> Vec<(Ipv4Net, RouteTarget)> {
        let state = self.state.read().await;
        state
            .route_tables
            .get(route_table_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl NetworkProvider for InMemoryProvider {
    async fn create_network(
        &self,
        name: &str,
        cidr_block: Ipv4Net,
    ) -> Result<NetworkRef, ProvisionError> {
        Ok(self.add_network(name, cidr_block).await)
    }

    async fn describe_networks_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<NetworkRef>, ProvisionError> {
        let state = self.state.read().await;
        Ok(state
            .networks
            .iter()
            .filter(|n| n.tags.get(key).is_some_and(|v| v == value))
            .map(|n| n.network.clone())
            .collect())
    }

    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>, ProvisionError> {
        let state = self.state.read().await;
        state
            .subnets
            .get(network_id)
            .cloned()
            .ok_or_else(|| ProvisionError::NotFound(network_id.to_string()))
    }

    async fn create_peering_connection(
        &self,
        request: &PeeringRequest,
    ) -> Result<(String, PeeringState), ProvisionError> {
        let state = self.state.read().await;

        let local = &request.local_network;
        if !state.networks.iter().any(|n| n.network.id == local.id) {
            return Err(ProvisionError::NotFound(local.id.clone()));
        }
        if state.denied_accounts.contains(&request.remote_owner_account_id) {
            return Err(ProvisionError::PermissionDenied(format!(
                "{} may not peer with account {}",
                self.account_id, request.remote_owner_account_id
            )));
        }
        drop(state);

        let mut peerings = self.peerings.write().await;
        let held = peerings.values().filter(|(r, _)| self.involves(r)).count();
        if held >= self.peering_limit {
            return Err(ProvisionError::QuotaExceeded(format!(
                "peering connection limit of {} reached",
                self.peering_limit
            )));
        }
        if local.overlaps(&request.remote_network) {
            return Err(ProvisionError::OverlappingCidr(format!(
                "{} overlaps {}",
                local.cidr_block, request.remote_network.cidr_block
            )));
        }

        let id = format!("pcx-{:017x}", peerings.len() + 1);
        peerings.insert(id.clone(), (request.clone(), PeeringState::PendingAcceptance));
        Ok((id, PeeringState::PendingAcceptance))
    }

    async fn accept_peering_connection(
        &self,
        peering_id: &str,
    ) -> Result<PeeringState, ProvisionError> {
        let mut peerings = self.peerings.write().await;
        let (request, peering_state) = peerings
            .get_mut(peering_id)
            .ok_or_else(|| ProvisionError::NotFound(peering_id.to_string()))?;

        if request.remote_owner_account_id != self.account_id {
            return Err(ProvisionError::PermissionDenied(format!(
                "{peering_id} can only be accepted by account {}",
                request.remote_owner_account_id
            )));
        }

        if *peering_state != PeeringState::PendingAcceptance {
            return Err(ProvisionError::ValidationError(format!(
                "{peering_id} is not pending acceptance"
            )));
        }
        *peering_state = PeeringState::Active;
        Ok(PeeringState::Active)
    }

    async fn create_internet_gateway(&self) -> Result<String, ProvisionError> {
        let mut state = self.state.write().await;
        let id = state.next_id("igw");
        state.gateways.insert(id.clone(), None);
        Ok(id)
    }

    async fn attach_internet_gateway(
        &self,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.write().await;
        if !state.subnets.contains_key(network_id) {
            return Err(ProvisionError::NotFound(network_id.to_string()));
        }
        let attachment = state
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| ProvisionError::NotFound(gateway_id.to_string()))?;
        if attachment.is_some() {
            return Err(ProvisionError::ValidationError(format!(
                "{gateway_id} is already attached"
            )));
        }
        *attachment = Some(network_id.to_string());
        Ok(())
    }

    async fn has_gateway_route(&self, route_table_id: &str) -> Result<bool, ProvisionError> {
        let state = self.state.read().await;
        let routes = state
            .route_tables
            .get(route_table_id)
            .ok_or_else(|| ProvisionError::NotFound(route_table_id.to_string()))?;

        Ok(routes.iter().any(|(_, target)| match target {
            RouteTarget::Gateway(id) => state.gateways.get(id).is_some_and(Option::is_some),
            RouteTarget::Peering(_) => false,
        }))
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &RouteTarget,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.write().await;

        match target {
            RouteTarget::Gateway(id) => match state.gateways.get(id) {
                None => return Err(ProvisionError::NotFound(id.clone())),
                Some(None) => {
                    return Err(ProvisionError::DependencyOrdering(format!(
                        "{id} is not attached to a network"
                    )));
                }
                Some(Some(_)) => {}
            },
            RouteTarget::Peering(id) => {
                let peerings = self.peerings.read().await;
                if !peerings.get(id).is_some_and(|(r, _)| self.involves(r)) {
                    return Err(ProvisionError::NotFound(id.clone()));
                }
            }
        }

        let routes = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| ProvisionError::NotFound(route_table_id.to_string()))?;

        if routes.iter().any(|(existing, _)| *existing == destination) {
            return Err(ProvisionError::ProviderError {
                operation: "CreateRoute".to_string(),
                code: "RouteAlreadyExists".to_string(),
                message: format!("{route_table_id} already routes {destination}"),
            });
        }
        routes.push((destination, target.clone()));
        Ok(())
    }
}
