// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use ipnet::Ipv4Net;

use crate::constants::NAME_TAG_KEY;
use crate::errors::ProvisionError;
use crate::models::NetworkRef;
use crate::provider::NetworkProvider;

/// Resolves network names to [`NetworkRef`]s.
///
/// A locator only sees what its provider's credentials can see, so a locator
/// for the remote account is built on a provider loaded with the external
/// credentials.
pub struct NetworkLocator {
    provider: Arc<dyn NetworkProvider>,
}

impl NetworkLocator {
    pub fn new(provider: Arc<dyn NetworkProvider>) -> Self {
        Self { provider }
    }

    /// Returns the single network tagged `Name=name`.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::ValidationError`] - `name` is empty
    /// - [`ProvisionError::NotFound`] - no network carries the tag
    /// - [`ProvisionError::AmbiguousMatch`] - more than one network carries the tag
    #[tracing::instrument(skip(self))]
    pub async fn locate(&self, name: &str) -> Result<NetworkRef, ProvisionError> {
        if name.trim().is_empty() {
            return Err(ProvisionError::ValidationError(
                "network name must not be empty".to_string(),
            ));
        }

        let mut matches = self
            .provider
            .describe_networks_by_tag(NAME_TAG_KEY, name)
            .await?;

        match matches.len() {
            0 => Err(ProvisionError::NotFound(name.to_string())),
            1 => {
                let network = matches.remove(0);
                tracing::info!(
                    "[provisioner] located {} as {} ({}) in account {}",
                    name,
                    network.id,
                    network.cidr_block,
                    network.owner_account_id
                );
                Ok(network)
            }
            count => Err(ProvisionError::AmbiguousMatch {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Creates a network tagged `Name=name`, refusing names already in use so
    /// that [`NetworkLocator::locate`] keeps resolving them unambiguously.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, name: &str, cidr_block: Ipv4Net) -> Result<NetworkRef, ProvisionError> {
        match self.locate(name).await {
            Err(ProvisionError::NotFound(_)) => {}
            Err(err) => return Err(err),
            Ok(existing) => {
                return Err(ProvisionError::ValidationError(format!(
                    "a network named {name} already exists as {}",
                    existing.id
                )));
            }
        }

        let network = self.provider.create_network(name, cidr_block).await?;

        tracing::info!(
            "[provisioner] created {} as {} ({})",
            name,
            network.id,
            network.cidr_block
        );

        Ok(network)
    }
}
