// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Credentials for the account that owns the remote network.
//!
//! The remote network is looked up (and its routes optionally attached) with
//! short-lived credentials handed to the process through environment
//! variables. Nothing here caches or refreshes them; an expired token
//! surfaces as a permission error from the provider.

use std::fmt;

use aws_credential_types::Credentials;
use zeroize::ZeroizeOnDrop;

use crate::constants::{
    EXTERNAL_ACCESS_KEY_ID, EXTERNAL_CREDENTIALS_PROVIDER, EXTERNAL_SECRET_ACCESS_KEY,
    EXTERNAL_SESSION_TOKEN,
};
use crate::errors::ProvisionError;

#[derive(Clone, PartialEq, ZeroizeOnDrop)]
pub struct Credential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &"[REDACTED]")
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl From<&Credential> for Credentials {
    fn from(credential: &Credential) -> Self {
        Credentials::new(
            credential.access_key_id.clone(),
            credential.secret_access_key.clone(),
            credential.session_token.clone(),
            None,
            EXTERNAL_CREDENTIALS_PROVIDER,
        )
    }
}

/// Reads the external credentials from the process environment.
pub fn resolve_from_env() -> Result<Credential, ProvisionError> {
    resolve_with(|key| std::env::var(key).ok())
}

/// Resolves credentials through `lookup`. Empty values are treated as unset.
pub fn resolve_with<F>(lookup: F) -> Result<Credential, ProvisionError>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let access_key_id = read(EXTERNAL_ACCESS_KEY_ID);
    let secret_access_key = read(EXTERNAL_SECRET_ACCESS_KEY);

    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => {
            tracing::debug!("[provisioner] resolved external credentials from environment");
            Ok(Credential {
                access_key_id,
                secret_access_key,
                session_token: read(EXTERNAL_SESSION_TOKEN),
            })
        }
        (access_key_id, secret_access_key) => {
            let missing: Vec<&str> = [
                (EXTERNAL_ACCESS_KEY_ID, access_key_id.is_none()),
                (EXTERNAL_SECRET_ACCESS_KEY, secret_access_key.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, is_missing)| is_missing.then_some(key))
            .collect();

            Err(ProvisionError::MissingCredentials(missing.join(", ")))
        }
    }
}
