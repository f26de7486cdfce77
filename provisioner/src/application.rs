// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Two-phase startup for the `peer` command.
//!
//! 1. [`Application::resolve`] performs every lookup the plan needs: both
//!    networks by name tag and, when routes or a gateway are requested,
//!    their subnets. Nothing is created in this phase.
//! 2. [`Application::build`] turns the resolved values into an immutable
//!    [`ProvisioningPlan`], which [`Application::run_until_complete`] executes.

use std::sync::Arc;

use crate::configuration::PeerOptions;
use crate::constants::{
    DEFAULT_ROUTE, STEP_GATEWAY_ATTACHMENT, STEP_INTERNET_GATEWAY, STEP_LOCAL_PEERING_ROUTES,
    STEP_PEERING, STEP_PUBLIC_ROUTE_PREFIX, STEP_REMOTE_PEERING_ROUTES,
};
use crate::errors::ProvisionError;
use crate::locator::NetworkLocator;
use crate::models::{NetworkRef, PeeringRequest, Subnet};
use crate::peering::validate_account_id;
use crate::plan::{ExecutionReport, PlanExecutor, ProvisioningPlan, Side, Step, StepAction};
use crate::provider::NetworkProvider;

/// Everything looked up before the plan is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    pub local_network: NetworkRef,
    pub remote_network: NetworkRef,
    pub remote_owner_account_id: String,
    pub local_subnets: Vec<Subnet>,
    pub remote_subnets: Vec<Subnet>,
}

pub struct Application {
    plan: ProvisioningPlan,
    executor: PlanExecutor,
}

impl Application {
    #[tracing::instrument(skip(options, local, remote), fields(local = %options.local_vpc_name, remote = %options.remote_vpc_name))]
    pub async fn resolve(
        options: &PeerOptions,
        local: Arc<dyn NetworkProvider>,
        remote: Arc<dyn NetworkProvider>,
    ) -> Result<ResolvedInputs, ProvisionError> {
        if let Some(owner) = &options.remote_owner_id {
            validate_account_id(owner)?;
        }

        let local_network = NetworkLocator::new(local.clone())
            .locate(&options.local_vpc_name)
            .await?;
        let remote_network = NetworkLocator::new(remote.clone())
            .locate(&options.remote_vpc_name)
            .await?;

        let remote_owner_account_id = match &options.remote_owner_id {
            Some(owner) if *owner != remote_network.owner_account_id => {
                return Err(ProvisionError::ValidationError(format!(
                    "{} is owned by {}, not {}",
                    remote_network.id, remote_network.owner_account_id, owner
                )));
            }
            Some(owner) => owner.clone(),
            None => remote_network.owner_account_id.clone(),
        };

        let local_subnets = if options.needs_local_subnets() {
            local.describe_subnets(&local_network.id).await?
        } else {
            Vec::new()
        };
        let remote_subnets = if options.bidirectional {
            remote.describe_subnets(&remote_network.id).await?
        } else {
            Vec::new()
        };

        tracing::info!(
            "[provisioner] resolved {} local and {} remote subnets",
            local_subnets.len(),
            remote_subnets.len()
        );

        Ok(ResolvedInputs {
            local_network,
            remote_network,
            remote_owner_account_id,
            local_subnets,
            remote_subnets,
        })
    }

    pub fn build(
        options: &PeerOptions,
        inputs: ResolvedInputs,
        local: Arc<dyn NetworkProvider>,
        remote: Arc<dyn NetworkProvider>,
    ) -> Result<Self, ProvisionError> {
        let plan = build_plan(options, inputs)?;
        // surface ordering mistakes before anything is created
        plan.ordered()?;

        Ok(Self {
            plan,
            executor: PlanExecutor::new(local, remote),
        })
    }

    pub fn plan(&self) -> &ProvisioningPlan {
        &self.plan
    }

    pub async fn run_until_complete(self) -> Result<ExecutionReport, ProvisionError> {
        self.executor.execute(&self.plan).await
    }
}

/// Lays out the creation steps for a resolved peering.
///
/// Gateway steps come first when requested: the gateway, its attachment, then
/// one default route per route table used by a public subnet. Local peering routes wait for all of
/// those, since a public route table must reach its gateway before anything
/// else is added to it.
pub fn build_plan(
    options: &PeerOptions,
    inputs: ResolvedInputs,
) -> Result<ProvisioningPlan, ProvisionError> {
    let mut plan = ProvisioningPlan::new();
    let mut gateway_steps = Vec::new();

    if options.internet_gateway {
        plan.add(Step::new(
            STEP_INTERNET_GATEWAY,
            StepAction::CreateInternetGateway,
        ))?;
        plan.add(
            Step::new(
                STEP_GATEWAY_ATTACHMENT,
                StepAction::AttachInternetGateway {
                    network_id: inputs.local_network.id.clone(),
                    gateway_step: STEP_INTERNET_GATEWAY.to_string(),
                },
            )
            .after([STEP_INTERNET_GATEWAY]),
        )?;
        gateway_steps.push(STEP_GATEWAY_ATTACHMENT.to_string());

        // public subnets often share the main route table; it gets one default route
        let mut public_tables: Vec<&str> = Vec::new();
        for subnet in inputs.local_subnets.iter().filter(|s| s.public) {
            if !public_tables.contains(&subnet.route_table_id.as_str()) {
                public_tables.push(&subnet.route_table_id);
            }
        }

        for (index, route_table_id) in public_tables.into_iter().enumerate() {
            let name = format!("{STEP_PUBLIC_ROUTE_PREFIX}-{index}");
            plan.add(
                Step::new(
                    name.clone(),
                    StepAction::CreateGatewayRoute {
                        route_table_id: route_table_id.to_string(),
                        destination: DEFAULT_ROUTE,
                        gateway_step: STEP_INTERNET_GATEWAY.to_string(),
                    },
                )
                .after([STEP_INTERNET_GATEWAY, STEP_GATEWAY_ATTACHMENT]),
            )?;
            gateway_steps.push(name);
        }
    }

    let local_cidr = inputs.local_network.cidr_block;
    let remote_cidr = inputs.remote_network.cidr_block;

    plan.add(Step::new(
        STEP_PEERING,
        StepAction::RequestPeering {
            request: PeeringRequest {
                local_network: inputs.local_network,
                remote_network: inputs.remote_network,
                remote_owner_account_id: inputs.remote_owner_account_id,
            },
        },
    ))?;

    if options.routes_local() {
        plan.add(
            Step::new(
                STEP_LOCAL_PEERING_ROUTES,
                StepAction::AttachPeeringRoutes {
                    side: Side::Local,
                    subnets: inputs.local_subnets,
                    peer_cidr: remote_cidr,
                    peering_step: STEP_PEERING.to_string(),
                },
            )
            .after([STEP_PEERING.to_string()])
            .after(gateway_steps),
        )?;
    }

    if options.bidirectional {
        plan.add(
            Step::new(
                STEP_REMOTE_PEERING_ROUTES,
                StepAction::AttachPeeringRoutes {
                    side: Side::Remote,
                    subnets: inputs.remote_subnets,
                    peer_cidr: local_cidr,
                    peering_step: STEP_PEERING.to_string(),
                },
            )
            .after([STEP_PEERING]),
        )?;
    }

    Ok(plan)
}
