// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Route table entries that send peer traffic through a peering connection.
//!
//! Each route table gets one route: destination = the peer network's CIDR
//! block, target = the peering connection. Subnets without a route table of
//! their own share the network's main table, so several subnets often map to
//! the same table; the route is created once and every subnet using that
//! table is reported with it. Routes can be attached while the connection is
//! still pending acceptance; traffic flows once it is active.
//!
//! Route tables are handled in first-seen order and independently of each
//! other. A failure for one table is recorded in the [`RouteAttachmentReport`]
//! for each of its subnets and the remaining tables are still processed.
//! Routes that were created stay in place.

use std::collections::HashMap;
use std::sync::Arc;

use ipnet::Ipv4Net;

use crate::errors::ProvisionError;
use crate::models::{
    PeeringConnection, RouteAttachmentReport, RouteEntry, RouteFailure, RouteTarget, Subnet,
};
use crate::provider::NetworkProvider;

pub struct RouteAttacher {
    provider: Arc<dyn NetworkProvider>,
}

impl RouteAttacher {
    pub fn new(provider: Arc<dyn NetworkProvider>) -> Self {
        Self { provider }
    }

    /// Routes `peer_cidr` through `peering` in every route table used by `subnets`.
    ///
    /// The report carries one entry per input subnet, in input order.
    #[tracing::instrument(skip(self, peering, subnets), fields(peering = %peering.id, subnets = subnets.len()))]
    pub async fn attach(
        &self,
        peering: &PeeringConnection,
        subnets: &[Subnet],
        peer_cidr: Ipv4Net,
    ) -> RouteAttachmentReport {
        let mut outcomes: HashMap<&str, Result<(), ProvisionError>> = HashMap::new();

        for subnet in subnets {
            let table = subnet.route_table_id.as_str();
            if outcomes.contains_key(table) {
                continue;
            }
            // a table needs the gateway check when any subnet using it is public
            let public = subnets
                .iter()
                .any(|s| s.public && s.route_table_id == table);
            let outcome = self.attach_table(peering, table, public, peer_cidr).await;
            if let Err(error) = &outcome {
                tracing::warn!(
                    "[provisioner] no route in {} via {}: {}",
                    table,
                    peering.id,
                    error
                );
            }
            outcomes.insert(table, outcome);
        }

        let mut report = RouteAttachmentReport::default();
        for subnet in subnets {
            match outcomes.get(subnet.route_table_id.as_str()) {
                Some(Ok(())) => report.succeeded.push(RouteEntry {
                    subnet_id: subnet.id.clone(),
                    route_table_id: subnet.route_table_id.clone(),
                    destination_cidr: peer_cidr,
                    via_peering_id: peering.id.clone(),
                }),
                Some(Err(error)) => report.failed.push(RouteFailure {
                    subnet_id: subnet.id.clone(),
                    route_table_id: subnet.route_table_id.clone(),
                    error: error.clone(),
                }),
                None => {}
            }
        }

        tracing::info!(
            "[provisioner] routed {} of {} subnets ({} route tables) to {} via {}",
            report.succeeded.len(),
            subnets.len(),
            outcomes.len(),
            peer_cidr,
            peering.id
        );

        report
    }

    async fn attach_table(
        &self,
        peering: &PeeringConnection,
        route_table_id: &str,
        public: bool,
        peer_cidr: Ipv4Net,
    ) -> Result<(), ProvisionError> {
        // public route tables must reach their internet gateway before anything else is added
        if public && !self.provider.has_gateway_route(route_table_id).await? {
            return Err(ProvisionError::DependencyOrdering(format!(
                "route table {route_table_id} of a public subnet has no attached internet gateway"
            )));
        }

        self.provider
            .create_route(
                route_table_id,
                peer_cidr,
                &RouteTarget::Peering(peering.id.clone()),
            )
            .await?;

        tracing::debug!(
            "[provisioner] routed {} in {} via {}",
            peer_cidr,
            route_table_id,
            peering.id
        );

        Ok(())
    }
}
