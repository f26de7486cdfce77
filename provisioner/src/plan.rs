// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Dependency-ordered provisioning steps.
//!
//! A [`ProvisioningPlan`] is a list of named [`Step`]s. Each step names the
//! steps it depends on, and an action that consumes another step's output
//! (a gateway id, a peering connection) must list that step among its
//! dependencies. [`ProvisioningPlan::ordered`] returns the steps in
//! topological order, breaking ties by insertion order, and rejects unknown
//! dependencies, undeclared references and cycles with
//! [`ProvisionError::DependencyOrdering`].
//!
//! [`PlanExecutor`] runs the ordered steps one at a time and stops at the
//! first error. Nothing that was created before the failure is removed; it
//! is logged instead (see [`ExecutionReport::created_resources`]).

use std::collections::HashSet;
use std::sync::Arc;

use ipnet::Ipv4Net;
use serde::Serialize;

use crate::errors::ProvisionError;
use crate::models::{
    PeeringConnection, PeeringRequest, RouteAttachmentReport, RouteFailure, RouteTarget, Subnet,
};
use crate::peering::PeeringRequester;
use crate::provider::NetworkProvider;
use crate::routes::RouteAttacher;

/// Which account's provider a step runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum StepAction {
    CreateInternetGateway,
    AttachInternetGateway {
        network_id: String,
        gateway_step: String,
    },
    CreateGatewayRoute {
        route_table_id: String,
        destination: Ipv4Net,
        gateway_step: String,
    },
    RequestPeering {
        request: PeeringRequest,
    },
    AttachPeeringRoutes {
        side: Side,
        subnets: Vec<Subnet>,
        peer_cidr: Ipv4Net,
        peering_step: String,
    },
}

impl StepAction {
    /// The step whose output this action consumes.
    fn reference(&self) -> Option<&str> {
        match self {
            Self::CreateInternetGateway | Self::RequestPeering { .. } => None,
            Self::AttachInternetGateway { gateway_step, .. }
            | Self::CreateGatewayRoute { gateway_step, .. } => Some(gateway_step.as_str()),
            Self::AttachPeeringRoutes { peering_step, .. } => Some(peering_step.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub name: String,
    pub action: StepAction,
    pub depends_on: Vec<String>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            action,
            depends_on: Vec::new(),
        }
    }

    pub fn after<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(steps.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningPlan {
    steps: Vec<Step>,
}

impl ProvisioningPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, step: Step) -> Result<(), ProvisionError> {
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(ProvisionError::ValidationError(format!(
                "duplicate step {}",
                step.name
            )));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn ordered(&self) -> Result<Vec<&Step>, ProvisionError> {
        let names: HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();

        for step in &self.steps {
            if let Some(unknown) = step.depends_on.iter().find(|d| !names.contains(d.as_str())) {
                return Err(ProvisionError::DependencyOrdering(format!(
                    "{} depends on unknown step {}",
                    step.name, unknown
                )));
            }
            if let Some(reference) = step.action.reference()
                && !step.depends_on.iter().any(|d| d == reference)
            {
                return Err(ProvisionError::DependencyOrdering(format!(
                    "{} uses the output of {} without depending on it",
                    step.name, reference
                )));
            }
        }

        let mut done: HashSet<&str> = HashSet::with_capacity(self.steps.len());
        let mut order = Vec::with_capacity(self.steps.len());

        while order.len() < self.steps.len() {
            let next = self.steps.iter().find(|s| {
                !done.contains(s.name.as_str())
                    && s.depends_on.iter().all(|d| done.contains(d.as_str()))
            });

            match next {
                Some(step) => {
                    done.insert(step.name.as_str());
                    order.push(step);
                }
                None => {
                    let blocked: Vec<&str> = self
                        .steps
                        .iter()
                        .map(|s| s.name.as_str())
                        .filter(|name| !done.contains(name))
                        .collect();
                    return Err(ProvisionError::DependencyOrdering(format!(
                        "dependency cycle among {}",
                        blocked.join(", ")
                    )));
                }
            }
        }

        Ok(order)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepOutput {
    InternetGateway {
        gateway_id: String,
    },
    GatewayAttached {
        gateway_id: String,
        network_id: String,
    },
    GatewayRoute {
        route_table_id: String,
        destination: Ipv4Net,
        gateway_id: String,
    },
    Peering(PeeringConnection),
    Routes(RouteAttachmentReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub name: String,
    pub output: StepOutput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepResult>,
}

impl ExecutionReport {
    pub fn output(&self, name: &str) -> Option<&StepOutput> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.output)
    }

    pub fn peering(&self) -> Option<&PeeringConnection> {
        self.steps.iter().find_map(|s| match &s.output {
            StepOutput::Peering(connection) => Some(connection),
            _ => None,
        })
    }

    pub fn route_failures(&self) -> impl Iterator<Item = &RouteFailure> {
        self.steps
            .iter()
            .filter_map(|s| match &s.output {
                StepOutput::Routes(report) => Some(report),
                _ => None,
            })
            .flat_map(|report| report.failed.iter())
    }

    pub fn is_complete(&self) -> bool {
        self.route_failures().next().is_none()
    }

    /// Describes what the completed steps created, one line per resource.
    /// Subnets sharing a route table yield a single route line.
    pub fn created_resources(&self) -> Vec<String> {
        let mut created = Vec::new();
        for step in &self.steps {
            match &step.output {
                StepOutput::InternetGateway { gateway_id } => {
                    created.push(format!("internet gateway {gateway_id}"));
                }
                StepOutput::GatewayAttached {
                    gateway_id,
                    network_id,
                } => created.push(format!("attachment of {gateway_id} to {network_id}")),
                StepOutput::GatewayRoute {
                    route_table_id,
                    destination,
                    gateway_id,
                } => created.push(format!(
                    "route {destination} via {gateway_id} in {route_table_id}"
                )),
                StepOutput::Peering(connection) => {
                    created.push(format!("peering connection {}", connection.id));
                }
                StepOutput::Routes(routes) => {
                    for entry in &routes.succeeded {
                        let line = format!(
                            "route {} via {} in {}",
                            entry.destination_cidr, entry.via_peering_id, entry.route_table_id
                        );
                        if !created.contains(&line) {
                            created.push(line);
                        }
                    }
                }
            }
        }
        created
    }

    fn gateway(&self, step: &str, from: &str) -> Result<String, ProvisionError> {
        match self.output(from) {
            Some(StepOutput::InternetGateway { gateway_id }) => Ok(gateway_id.clone()),
            _ => Err(ProvisionError::DependencyOrdering(format!(
                "{step} needs the internet gateway from {from}, which has not been created"
            ))),
        }
    }

    fn peering_from(&self, step: &str, from: &str) -> Result<PeeringConnection, ProvisionError> {
        match self.output(from) {
            Some(StepOutput::Peering(connection)) => Ok(connection.clone()),
            _ => Err(ProvisionError::DependencyOrdering(format!(
                "{step} needs the peering connection from {from}, which has not been requested"
            ))),
        }
    }
}

/// Runs a plan against the providers of both accounts.
pub struct PlanExecutor {
    local: Arc<dyn NetworkProvider>,
    remote: Arc<dyn NetworkProvider>,
}

impl PlanExecutor {
    pub fn new(local: Arc<dyn NetworkProvider>, remote: Arc<dyn NetworkProvider>) -> Self {
        Self { local, remote }
    }

    #[tracing::instrument(skip(self, plan), fields(steps = plan.steps().len()))]
    pub async fn execute(&self, plan: &ProvisioningPlan) -> Result<ExecutionReport, ProvisionError> {
        let order = plan.ordered()?;
        let mut report = ExecutionReport::default();

        for step in order {
            tracing::debug!("[provisioner] running step {}", step.name);

            let output = match self.run_step(step, &report).await {
                Ok(output) => output,
                Err(err) => {
                    tracing::error!(
                        "[provisioner] step {} failed after {} completed steps: {}",
                        step.name,
                        report.steps.len(),
                        err
                    );
                    let created = report.created_resources();
                    if !created.is_empty() {
                        tracing::warn!(
                            "[provisioner] left in place after {} failed: {}",
                            step.name,
                            created.join(", ")
                        );
                    }
                    return Err(err);
                }
            };

            tracing::info!("[provisioner] completed step {}", step.name);

            report.steps.push(StepResult {
                name: step.name.clone(),
                output,
            });
        }

        Ok(report)
    }

    fn provider(&self, side: Side) -> Arc<dyn NetworkProvider> {
        match side {
            Side::Local => self.local.clone(),
            Side::Remote => self.remote.clone(),
        }
    }

    async fn run_step(
        &self,
        step: &Step,
        report: &ExecutionReport,
    ) -> Result<StepOutput, ProvisionError> {
        match &step.action {
            StepAction::CreateInternetGateway => {
                let gateway_id = self.local.create_internet_gateway().await?;
                Ok(StepOutput::InternetGateway { gateway_id })
            }
            StepAction::AttachInternetGateway {
                network_id,
                gateway_step,
            } => {
                let gateway_id = report.gateway(&step.name, gateway_step)?;
                self.local
                    .attach_internet_gateway(&gateway_id, network_id)
                    .await?;
                Ok(StepOutput::GatewayAttached {
                    gateway_id,
                    network_id: network_id.clone(),
                })
            }
            StepAction::CreateGatewayRoute {
                route_table_id,
                destination,
                gateway_step,
            } => {
                let gateway_id = report.gateway(&step.name, gateway_step)?;
                self.local
                    .create_route(
                        route_table_id,
                        *destination,
                        &RouteTarget::Gateway(gateway_id.clone()),
                    )
                    .await?;
                Ok(StepOutput::GatewayRoute {
                    route_table_id: route_table_id.clone(),
                    destination: *destination,
                    gateway_id,
                })
            }
            StepAction::RequestPeering { request } => {
                let connection = PeeringRequester::new(self.local.clone())
                    .request(request.clone())
                    .await?;
                Ok(StepOutput::Peering(connection))
            }
            StepAction::AttachPeeringRoutes {
                side,
                subnets,
                peer_cidr,
                peering_step,
            } => {
                let connection = report.peering_from(&step.name, peering_step)?;
                let routes = RouteAttacher::new(self.provider(*side))
                    .attach(&connection, subnets, *peer_cidr)
                    .await;
                Ok(StepOutput::Routes(routes))
            }
        }
    }
}
