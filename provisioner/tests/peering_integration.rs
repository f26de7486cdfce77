// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! End-to-end tests for cross-account peering.
//!
//! Two `InMemoryProvider`s stand in for the requesting account and the
//! account that owns the remote network. The tests drive the same two-phase
//! startup the binary uses: resolve, build the plan, run it.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use ipnet::Ipv4Net;
use peering_provisioner::application::Application;
use peering_provisioner::configuration::PeerOptions;
use peering_provisioner::constants::{
    DEFAULT_ROUTE, STEP_LOCAL_PEERING_ROUTES, STEP_PEERING, STEP_REMOTE_PEERING_ROUTES,
};
use peering_provisioner::errors::ProvisionError;
use peering_provisioner::locator::NetworkLocator;
use peering_provisioner::models::{
    NetworkRef, PeeringRequest, PeeringState, RouteTarget, Subnet,
};
use peering_provisioner::peering::PeeringRequester;
use peering_provisioner::plan::StepOutput;
use peering_provisioner::provider::{InMemoryProvider, NetworkProvider};
use peering_provisioner::routes::RouteAttacher;

const LOCAL_ACCOUNT: &str = "111111111111";
const REMOTE_ACCOUNT: &str = "836152826188";

fn cidr(value: &str) -> Ipv4Net {
    value.parse().unwrap()
}

struct Accounts {
    local: Arc<InMemoryProvider>,
    remote: Arc<InMemoryProvider>,
    local_network: NetworkRef,
    remote_network: NetworkRef,
    local_subnets: Vec<Subnet>,
    remote_subnets: Vec<Subnet>,
}

/// Account A owns `primac-vpc` (10.0.0.0/16) with one private and one public
/// subnet; account B owns `vpc-de-produccion` (10.2.0.0/16) with one subnet.
async fn accounts() -> Accounts {
    let local = Arc::new(InMemoryProvider::new(LOCAL_ACCOUNT));
    let remote = Arc::new(InMemoryProvider::new(REMOTE_ACCOUNT).sharing_peerings_with(&local));

    let local_network = local.add_network("primac-vpc", cidr("10.0.0.0/16")).await;
    let local_subnets = vec![
        local
            .add_subnet(&local_network.id, cidr("10.0.1.0/24"), false)
            .await
            .unwrap(),
        local
            .add_subnet(&local_network.id, cidr("10.0.2.0/24"), true)
            .await
            .unwrap(),
    ];

    let remote_network = remote
        .add_network("vpc-de-produccion", cidr("10.2.0.0/16"))
        .await;
    let remote_subnets = vec![
        remote
            .add_subnet(&remote_network.id, cidr("10.2.1.0/24"), false)
            .await
            .unwrap(),
    ];

    Accounts {
        local,
        remote,
        local_network,
        remote_network,
        local_subnets,
        remote_subnets,
    }
}

fn options() -> PeerOptions {
    PeerOptions {
        local_vpc_name: "primac-vpc".to_string(),
        remote_vpc_name: "vpc-de-produccion".to_string(),
        ..PeerOptions::default()
    }
}

// =============================================================================
// Network Locator
// =============================================================================

#[tokio::test]
async fn test_locate_remote_network_with_remote_account() {
    let accounts = accounts().await;
    let locator = NetworkLocator::new(accounts.remote.clone());

    let network = locator.locate("vpc-de-produccion").await.unwrap();
    assert_eq!(network.id, accounts.remote_network.id);
    assert_eq!(network.owner_account_id, REMOTE_ACCOUNT);
    assert_eq!(network.cidr_block, cidr("10.2.0.0/16"));

    // the same name is invisible to the local account
    let err = NetworkLocator::new(accounts.local.clone())
        .locate("vpc-de-produccion")
        .await
        .unwrap_err();
    assert_eq!(err, ProvisionError::NotFound("vpc-de-produccion".to_string()));
}

#[tokio::test]
async fn test_locate_production_network() {
    let provider = Arc::new(InMemoryProvider::new(LOCAL_ACCOUNT));
    provider
        .add_network("vpc-de-produccion", cidr("10.2.0.0/16"))
        .await;
    let locator = NetworkLocator::new(provider.clone());

    let first = locator.locate("vpc-de-produccion").await.unwrap();
    let second = locator.locate("vpc-de-produccion").await.unwrap();

    assert!(first.id.starts_with("vpc-"));
    assert_eq!(first.owner_account_id, provider.account_id());
    assert_eq!(first.cidr_block.to_string(), "10.2.0.0/16");
    assert_eq!(first, second);
}

// =============================================================================
// Peering Requester
// =============================================================================

#[tokio::test]
async fn test_request_peering_pending_acceptance() {
    let provider = Arc::new(InMemoryProvider::new(LOCAL_ACCOUNT));
    let local = provider.add_network("vpc-local", cidr("10.0.0.0/16")).await;
    let remote = NetworkRef {
        id: "vpc-remote".to_string(),
        owner_account_id: REMOTE_ACCOUNT.to_string(),
        cidr_block: cidr("10.1.0.0/16"),
    };

    let connection = PeeringRequester::new(provider.clone())
        .request(PeeringRequest {
            local_network: local,
            remote_network: remote,
            remote_owner_account_id: REMOTE_ACCOUNT.to_string(),
        })
        .await
        .unwrap();

    assert!(!connection.id.is_empty());
    assert_eq!(connection.state, PeeringState::PendingAcceptance);
    assert_eq!(
        provider.peering_state(&connection.id).await,
        Some(PeeringState::PendingAcceptance)
    );
}

#[tokio::test]
async fn test_request_peering_overlapping_cidr() {
    let provider = Arc::new(InMemoryProvider::new(LOCAL_ACCOUNT));
    let local = provider.add_network("vpc-local", cidr("10.0.0.0/16")).await;
    let remote = NetworkRef {
        id: "vpc-remote".to_string(),
        owner_account_id: REMOTE_ACCOUNT.to_string(),
        cidr_block: cidr("10.0.5.0/24"),
    };

    let err = PeeringRequester::new(provider.clone())
        .request(PeeringRequest {
            local_network: local,
            remote_network: remote,
            remote_owner_account_id: REMOTE_ACCOUNT.to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::OverlappingCidr(_)));
    assert_eq!(provider.peering_count().await, 0);
}

// =============================================================================
// Route Attacher
// =============================================================================

#[tokio::test]
async fn test_attach_routes_public_subnet_without_gateway() {
    let accounts = accounts().await;
    let connection = PeeringRequester::new(accounts.local.clone())
        .request(PeeringRequest {
            local_network: accounts.local_network.clone(),
            remote_network: accounts.remote_network.clone(),
            remote_owner_account_id: REMOTE_ACCOUNT.to_string(),
        })
        .await
        .unwrap();

    let report = RouteAttacher::new(accounts.local.clone())
        .attach(&connection, &accounts.local_subnets, cidr("10.2.0.0/16"))
        .await;

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].subnet_id, accounts.local_subnets[0].id);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].subnet_id, accounts.local_subnets[1].id);
    assert!(matches!(
        report.failed[0].error,
        ProvisionError::DependencyOrdering(_)
    ));
}

// =============================================================================
// Application
// =============================================================================

#[tokio::test]
async fn test_peer_without_routes() {
    let accounts = accounts().await;
    let options = options();

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    assert_eq!(inputs.remote_owner_account_id, REMOTE_ACCOUNT);
    assert!(inputs.local_subnets.is_empty());

    let application =
        Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
            .unwrap();
    let report = application.run_until_complete().await.unwrap();

    let peering = report.peering().unwrap();
    assert_eq!(peering.state, PeeringState::PendingAcceptance);
    assert_eq!(peering.request.remote_network.id, accounts.remote_network.id);
    assert!(report.is_complete());
    assert_eq!(accounts.local.peering_count().await, 1);
}

#[tokio::test]
async fn test_peer_with_gateway_and_bidirectional_routes() {
    let accounts = accounts().await;
    let options = PeerOptions {
        remote_owner_id: Some(REMOTE_ACCOUNT.to_string()),
        bidirectional: true,
        internet_gateway: true,
        ..options()
    };

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    let application =
        Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
            .unwrap();
    let report = application.run_until_complete().await.unwrap();

    assert!(report.is_complete());
    let peering_id = report.peering().unwrap().id.clone();

    let Some(StepOutput::Routes(local_routes)) = report.output(STEP_LOCAL_PEERING_ROUTES) else {
        panic!("missing local routes");
    };
    assert_eq!(local_routes.succeeded.len(), accounts.local_subnets.len());

    let Some(StepOutput::Routes(remote_routes)) = report.output(STEP_REMOTE_PEERING_ROUTES) else {
        panic!("missing remote routes");
    };
    assert_eq!(remote_routes.succeeded.len(), accounts.remote_subnets.len());

    // the public subnet got its default route before the peering route
    let public = &accounts.local_subnets[1];
    let routes = accounts.local.routes(&public.route_table_id).await;
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].0, DEFAULT_ROUTE);
    assert!(matches!(routes[0].1, RouteTarget::Gateway(_)));
    assert_eq!(
        routes[1],
        (cidr("10.2.0.0/16"), RouteTarget::Peering(peering_id.clone()))
    );

    let remote = &accounts.remote_subnets[0];
    assert_eq!(
        accounts.remote.routes(&remote.route_table_id).await,
        vec![(cidr("10.0.0.0/16"), RouteTarget::Peering(peering_id))]
    );
}

#[tokio::test]
async fn test_peer_with_subnets_sharing_main_route_table() {
    let accounts = accounts().await;
    // two more public subnets and a private one fall back to the table of the existing public subnet
    let main_table = accounts.local_subnets[1].route_table_id.clone();
    let mut local_subnets = accounts.local_subnets.clone();
    for (range, public) in [("10.0.3.0/24", true), ("10.0.4.0/24", true), ("10.0.5.0/24", false)] {
        local_subnets.push(
            accounts
                .local
                .add_subnet_in_table(&accounts.local_network.id, cidr(range), &main_table, public)
                .await
                .unwrap(),
        );
    }
    let options = PeerOptions {
        bidirectional: true,
        internet_gateway: true,
        ..options()
    };

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    assert_eq!(inputs.local_subnets, local_subnets);
    let report = Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
        .unwrap()
        .run_until_complete()
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(accounts.local.peering_count().await, 1);
    let peering_id = report.peering().unwrap().id.clone();

    let Some(StepOutput::Routes(local_routes)) = report.output(STEP_LOCAL_PEERING_ROUTES) else {
        panic!("missing local routes");
    };
    assert_eq!(local_routes.succeeded.len(), local_subnets.len());

    let routes = accounts.local.routes(&main_table).await;
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].0, DEFAULT_ROUTE);
    assert_eq!(
        routes[1],
        (cidr("10.2.0.0/16"), RouteTarget::Peering(peering_id))
    );
}

#[tokio::test]
async fn test_peer_reports_partial_route_failure() {
    let accounts = accounts().await;
    let options = PeerOptions {
        attach_routes: true,
        ..options()
    };

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    let report = Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
        .unwrap()
        .run_until_complete()
        .await
        .unwrap();

    assert!(!report.is_complete());
    let failures: Vec<_> = report.route_failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subnet_id, accounts.local_subnets[1].id);
    assert!(report.output(STEP_PEERING).is_some());
}

#[tokio::test]
async fn test_peer_missing_remote_network_creates_nothing() {
    let accounts = accounts().await;
    let options = PeerOptions {
        remote_vpc_name: "xd2".to_string(),
        ..options()
    };

    let err = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::NotFound("xd2".to_string()));
    assert_eq!(accounts.local.peering_count().await, 0);
}

#[tokio::test]
async fn test_peer_rejects_mismatched_owner() {
    let accounts = accounts().await;
    let options = PeerOptions {
        remote_owner_id: Some("222222222222".to_string()),
        ..options()
    };

    let err = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::ValidationError(_)));

    let options = PeerOptions {
        remote_owner_id: Some("not-an-account".to_string()),
        ..options()
    };
    let err = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::ValidationError(_)));
}

#[tokio::test]
async fn test_peer_permission_denied_halts_plan() {
    let accounts = accounts().await;
    accounts.local.deny_peering_with(REMOTE_ACCOUNT).await;
    let options = PeerOptions {
        attach_routes: true,
        ..options()
    };

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    let err = Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
        .unwrap()
        .run_until_complete()
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PermissionDenied(_)));
    for subnet in &accounts.local_subnets {
        assert!(accounts.local.routes(&subnet.route_table_id).await.is_empty());
    }
}

#[tokio::test]
async fn test_accept_with_remote_account() {
    let accounts = accounts().await;
    let options = options();

    let inputs = Application::resolve(&options, accounts.local.clone(), accounts.remote.clone())
        .await
        .unwrap();
    let report = Application::build(&options, inputs, accounts.local.clone(), accounts.remote.clone())
        .unwrap()
        .run_until_complete()
        .await
        .unwrap();
    let peering_id = report.peering().unwrap().id.clone();

    let err = accounts
        .local
        .accept_peering_connection(&peering_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::PermissionDenied(_)));

    let state = PeeringRequester::new(accounts.remote.clone())
        .accept(&peering_id)
        .await
        .unwrap();
    assert_eq!(state, PeeringState::Active);
    assert_eq!(
        accounts.local.peering_state(&peering_id).await,
        Some(PeeringState::Active)
    );
}
