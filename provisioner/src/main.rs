// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use peering_provisioner::application::Application;
use peering_provisioner::configuration::{
    AcceptOptions, Command, CreateNetworkOptions, PeerOptions, ProvisionerOptions,
};
use peering_provisioner::credentials;
use peering_provisioner::locator::NetworkLocator;
use peering_provisioner::peering::PeeringRequester;
use peering_provisioner::provider::{Ec2Provider, NetworkProvider};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        // results are printed on stdout, so logs go to stderr
        .with_writer(std::io::stderr)
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    // get configuration options from arguments and environment variables
    let options = ProvisionerOptions::parse();

    tracing::info!("[provisioner] {:?}", &options);

    let result = match options.command {
        Command::Peer(peer) => peer_networks(&options.region, peer).await,
        Command::Accept(accept) => accept_peering(&options.region, accept).await,
        Command::CreateNetwork(network) => create_network(&options.region, network).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("[provisioner] {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn peer_networks(region: &str, options: PeerOptions) -> Result<()> {
    let credential = credentials::resolve_from_env()?;

    let local: Arc<dyn NetworkProvider> = Arc::new(Ec2Provider::load(region, None).await);
    let remote: Arc<dyn NetworkProvider> =
        Arc::new(Ec2Provider::load(region, Some(&credential)).await);

    let inputs = Application::resolve(&options, local.clone(), remote.clone()).await?;
    let application = Application::build(&options, inputs, local, remote)?;

    if options.dry_run {
        tracing::warn!("[provisioner] dry run, nothing will be created");
        print_json(&application.plan().ordered()?)?;
        return Ok(());
    }

    let report = application.run_until_complete().await?;
    print_json(&report)?;

    if let Some(peering) = report.peering() {
        tracing::info!(
            "[provisioner] peering {} must be accepted by account {}",
            peering.id,
            peering.request.remote_owner_account_id
        );
    }

    let failures = report.route_failures().count();
    if failures > 0 {
        bail!("{failures} peering routes could not be attached");
    }

    Ok(())
}

async fn load_provider(region: &str, external_credentials: bool) -> Result<Ec2Provider> {
    if external_credentials {
        let credential = credentials::resolve_from_env()?;
        Ok(Ec2Provider::load(region, Some(&credential)).await)
    } else {
        Ok(Ec2Provider::load(region, None).await)
    }
}

async fn accept_peering(region: &str, options: AcceptOptions) -> Result<()> {
    let provider = load_provider(region, options.external_credentials).await?;

    let state = PeeringRequester::new(Arc::new(provider))
        .accept(&options.peering_id)
        .await?;

    print_json(&serde_json::json!({
        "id": options.peering_id,
        "state": state,
    }))
}

async fn create_network(region: &str, options: CreateNetworkOptions) -> Result<()> {
    let provider = load_provider(region, options.external_credentials).await?;

    let network = NetworkLocator::new(Arc::new(provider))
        .create(&options.name, options.cidr_block)
        .await?;

    print_json(&network)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
