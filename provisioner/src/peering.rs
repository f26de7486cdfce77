// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Cross-account peering requests.
//!
//! The requesting side submits a [`PeeringRequest`] and gets back a
//! connection in [`PeeringState::PendingAcceptance`]. The connection only
//! becomes [`PeeringState::Active`] once the owner of the remote network
//! accepts it, which happens out of band (see [`PeeringRequester::accept`]).
//!
//! Requests are not deduplicated: submitting the same request twice creates
//! two connections.

use std::sync::Arc;

use crate::constants::ACCOUNT_ID_LENGTH;
use crate::errors::ProvisionError;
use crate::models::{PeeringConnection, PeeringRequest, PeeringState};
use crate::provider::NetworkProvider;

pub struct PeeringRequester {
    provider: Arc<dyn NetworkProvider>,
}

/// Checks that `account_id` looks like an account id. Existence is not verified.
pub fn validate_account_id(account_id: &str) -> Result<(), ProvisionError> {
    if account_id.len() != ACCOUNT_ID_LENGTH || !account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProvisionError::ValidationError(format!(
            "account id must be {ACCOUNT_ID_LENGTH} digits, got {account_id:?}"
        )));
    }
    Ok(())
}

impl PeeringRequester {
    pub fn new(provider: Arc<dyn NetworkProvider>) -> Self {
        Self { provider }
    }

    /// Submits `request` and returns the new connection without waiting for acceptance.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::ValidationError`] - unresolved network id or malformed owner id
    /// - [`ProvisionError::OverlappingCidr`] - the address ranges collide; nothing is submitted
    /// - [`ProvisionError::QuotaExceeded`] - the account's peering limit is reached
    /// - [`ProvisionError::PermissionDenied`] - no cross-account authorization
    #[tracing::instrument(skip(self, request), fields(local = %request.local_network.id, remote = %request.remote_network.id))]
    pub async fn request(&self, request: PeeringRequest) -> Result<PeeringConnection, ProvisionError> {
        if request.local_network.id.is_empty() || request.remote_network.id.is_empty() {
            return Err(ProvisionError::ValidationError(
                "both network ids must be resolved before peering".to_string(),
            ));
        }
        validate_account_id(&request.remote_owner_account_id)?;

        if request.local_network.overlaps(&request.remote_network) {
            return Err(ProvisionError::OverlappingCidr(format!(
                "{} ({}) overlaps {} ({})",
                request.local_network.id,
                request.local_network.cidr_block,
                request.remote_network.id,
                request.remote_network.cidr_block
            )));
        }

        let (id, state) = self.provider.create_peering_connection(&request).await?;

        tracing::info!(
            "[provisioner] requested peering {} with account {} ({:?})",
            id,
            request.remote_owner_account_id,
            state
        );

        Ok(PeeringConnection { id, state, request })
    }

    /// Accepts a pending connection. Must run with credentials of the account
    /// that owns the remote network.
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, peering_id: &str) -> Result<PeeringState, ProvisionError> {
        if peering_id.trim().is_empty() {
            return Err(ProvisionError::ValidationError(
                "peering id must not be empty".to_string(),
            ));
        }

        let state = self.provider.accept_peering_connection(peering_id).await?;

        tracing::info!("[provisioner] accepted peering {} ({:?})", peering_id, state);

        Ok(state)
    }
}
