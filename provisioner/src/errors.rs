// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt::Debug;

use aws_smithy_runtime_api::client::result::SdkError;
use aws_sdk_ec2::error::ProvideErrorMetadata;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProvisionError {
    #[error("no network tagged Name={0} is visible")]
    NotFound(String),
    #[error("{count} networks are tagged Name={name}")]
    AmbiguousMatch { name: String, count: usize },
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("overlapping CIDR blocks: {0}")]
    OverlappingCidr(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("dependency ordering error: {0}")]
    DependencyOrdering(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("{operation} failed ({code}): {message}")]
    ProviderError {
        operation: String,
        code: String,
        message: String,
    },
}

impl ProvisionError {
    /// Maps an EC2 error code onto the error taxonomy.
    pub fn from_provider(operation: &str, code: Option<&str>, message: Option<&str>) -> Self {
        let code = code.unwrap_or("Unknown");
        let message = message.unwrap_or_default().to_string();

        match code {
            "UnauthorizedOperation" | "AuthFailure" | "OperationNotPermitted" | "AccessDenied" => {
                Self::PermissionDenied(message)
            }
            "Gateway.NotAttached" => Self::DependencyOrdering(message),
            c if c.ends_with("LimitExceeded") => Self::QuotaExceeded(message),
            c if c.ends_with(".NotFound") => Self::NotFound(message),
            c if c.contains("Overlap") || message.to_ascii_lowercase().contains("overlap") => {
                Self::OverlappingCidr(message)
            }
            _ => Self::ProviderError {
                operation: operation.to_string(),
                code: code.to_string(),
                message,
            },
        }
    }

    /// Service errors are classified by code; transport failures keep their debug text.
    pub fn from_sdk<E, R>(operation: &str, source: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + Debug,
        R: Debug,
    {
        tracing::debug!("[provisioner] {} failed: {:?}", operation, source);

        match &source {
            SdkError::ServiceError(service) => {
                let err = service.err();
                Self::from_provider(operation, err.code(), err.message())
            }
            SdkError::TimeoutError(_) => Self::ProviderError {
                operation: operation.to_string(),
                code: "Timeout".to_string(),
                message: format!("{source:?}"),
            },
            SdkError::DispatchFailure(_) => Self::ProviderError {
                operation: operation.to_string(),
                code: "DispatchFailure".to_string(),
                message: format!("{source:?}"),
            },
            _ => Self::ProviderError {
                operation: operation.to_string(),
                code: "Unknown".to_string(),
                message: format!("{source:?}"),
            },
        }
    }
}

impl From<ipnet::AddrParseError> for ProvisionError {
    fn from(source: ipnet::AddrParseError) -> Self {
        ProvisionError::ValidationError(format!("invalid CIDR block: {source}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_codes_are_quota_errors() {
        let err = ProvisionError::from_provider(
            "CreateVpcPeeringConnection",
            Some("VpcPeeringConnectionLimitExceeded"),
            Some("limit of 50 reached"),
        );
        assert_eq!(err, ProvisionError::QuotaExceeded("limit of 50 reached".into()));

        let err = ProvisionError::from_provider("CreateRoute", Some("RouteLimitExceeded"), None);
        assert!(matches!(err, ProvisionError::QuotaExceeded(_)));
    }

    #[test]
    fn test_authorization_codes() {
        for code in ["UnauthorizedOperation", "AuthFailure"] {
            let err = ProvisionError::from_provider("DescribeVpcs", Some(code), Some("nope"));
            assert_eq!(err, ProvisionError::PermissionDenied("nope".into()));
        }
    }

    #[test]
    fn test_not_found_codes() {
        let err = ProvisionError::from_provider(
            "CreateRoute",
            Some("InvalidRouteTableID.NotFound"),
            Some("The routeTable ID 'rtb-1' does not exist"),
        );
        assert!(matches!(err, ProvisionError::NotFound(_)));
    }

    #[test]
    fn test_gateway_not_attached_is_ordering_error() {
        let err = ProvisionError::from_provider("CreateRoute", Some("Gateway.NotAttached"), None);
        assert!(matches!(err, ProvisionError::DependencyOrdering(_)));
    }

    #[test]
    fn test_overlap_detected_from_message() {
        let err = ProvisionError::from_provider(
            "CreateVpcPeeringConnection",
            Some("InvalidParameterValue"),
            Some("The CIDR blocks are Overlapping"),
        );
        assert!(matches!(err, ProvisionError::OverlappingCidr(_)));
    }

    #[test]
    fn test_unknown_code_keeps_context() {
        let err = ProvisionError::from_provider("AttachInternetGateway", Some("Throttling"), Some("slow down"));
        assert_eq!(
            err.to_string(),
            "AttachInternetGateway failed (Throttling): slow down"
        );

        let err = ProvisionError::from_provider("DescribeVpcs", None, None);
        assert!(matches!(err, ProvisionError::ProviderError { ref code, .. } if code == "Unknown"));
    }
}
