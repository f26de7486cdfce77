// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

// Credentials for the account that owns the remote network
pub const EXTERNAL_ACCESS_KEY_ID: &str = "EXTERNAL_ACCESS_KEY_ID";
pub const EXTERNAL_SECRET_ACCESS_KEY: &str = "EXTERNAL_SECRET_ACCESS_KEY";
pub const EXTERNAL_SESSION_TOKEN: &str = "EXTERNAL_SESSION_TOKEN";
pub const EXTERNAL_CREDENTIALS_PROVIDER: &str = "ExternalEnvironment";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const NAME_TAG_KEY: &str = "Name";
/// https://docs.aws.amazon.com/accounts/latest/reference/manage-acct-identifiers.html
pub const ACCOUNT_ID_LENGTH: usize = 12;
pub const INTERNET_GATEWAY_PREFIX: &str = "igw-";
pub const DEFAULT_ROUTE: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0);

// Step names used when building a provisioning plan
pub const STEP_INTERNET_GATEWAY: &str = "internet-gateway";
pub const STEP_GATEWAY_ATTACHMENT: &str = "gateway-attachment";
pub const STEP_PUBLIC_ROUTE_PREFIX: &str = "public-route";
pub const STEP_PEERING: &str = "peering";
pub const STEP_LOCAL_PEERING_ROUTES: &str = "local-peering-routes";
pub const STEP_REMOTE_PEERING_ROUTES: &str = "remote-peering-routes";
