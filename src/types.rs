// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Types tracked by inference.
///
/// Only values on the path from the SDK module to a service method call are
/// modelled:
///
/// ```text
/// import boto3          # boto3: ModuleHandle
/// c = boto3.client      # c: ClientFactory
/// s3 = c('s3')          # s3: ServiceClient(s3)
/// m = s3.list_objects   # m: ServiceMethodRef(s3, list_objects)
/// r = m()               # r: ServiceMethodInvocation(s3, list_objects)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Type {
    ModuleHandle,
    ClientFactory,
    ServiceClient {
        service: String,
    },
    ServiceMethodRef {
        service: String,
        method: String,
    },
    ServiceMethodInvocation {
        service: String,
        method: String,
    },
    // The type of a user defined function, carrying the type it returns.
    FunctionSignature {
        returns: Box<Type>,
    },
    // Lets literal values flow through variables.
    StringLiteral {
        value: String,
    },
}

impl Type {
    pub fn service_client(service: &str) -> Self {
        Self::ServiceClient {
            service: service.to_string(),
        }
    }

    pub fn method_ref(service: &str, method: &str) -> Self {
        Self::ServiceMethodRef {
            service: service.to_string(),
            method: method.to_string(),
        }
    }

    pub fn invocation(service: &str, method: &str) -> Self {
        Self::ServiceMethodInvocation {
            service: service.to_string(),
            method: method.to_string(),
        }
    }

    pub fn function(returns: Type) -> Self {
        Self::FunctionSignature {
            returns: Box::new(returns),
        }
    }

    pub fn string_literal(value: &str) -> Self {
        Self::StringLiteral {
            value: value.to_string(),
        }
    }

    /// Service and method of a terminal invocation type.
    pub fn as_invocation(&self) -> Option<(&str, &str)> {
        match self {
            Self::ServiceMethodInvocation { service, method } => {
                Some((service.as_str(), method.as_str()))
            }
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Self::StringLiteral { value } => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleHandle => write!(f, "ModuleHandle"),
            Self::ClientFactory => write!(f, "ClientFactory"),
            Self::ServiceClient { service } => write!(f, "ServiceClient({service})"),
            Self::ServiceMethodRef { service, method } => {
                write!(f, "ServiceMethodRef({service}, {method})")
            }
            Self::ServiceMethodInvocation { service, method } => {
                write!(f, "ServiceMethodInvocation({service}, {method})")
            }
            Self::FunctionSignature { returns } => write!(f, "FunctionSignature({returns})"),
            Self::StringLiteral { value } => write!(f, "StringLiteral({value:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(Type::service_client("s3"), Type::service_client("s3"));
        assert_ne!(Type::service_client("s3"), Type::service_client("sqs"));
        assert_ne!(
            Type::method_ref("s3", "get_object"),
            Type::invocation("s3", "get_object")
        );
        assert_eq!(
            Type::function(Type::ClientFactory),
            Type::function(Type::ClientFactory)
        );
        assert_ne!(
            Type::function(Type::ClientFactory),
            Type::function(Type::ModuleHandle)
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            Type::function(Type::invocation("s3", "put_object")).to_string(),
            "FunctionSignature(ServiceMethodInvocation(s3, put_object))"
        );
        assert_eq!(
            Type::string_literal("dynamodb").to_string(),
            "StringLiteral(\"dynamodb\")"
        );
    }

    #[test]
    fn json_representation() {
        let json = serde_json::to_string(&Type::method_ref("s3", "list_objects")).unwrap();
        assert_eq!(
            json,
            r#"{"type":"serviceMethodRef","service":"s3","method":"list_objects"}"#
        );
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Type::method_ref("s3", "list_objects"));
    }

    #[test]
    fn accessors() {
        assert_eq!(
            Type::invocation("sqs", "send_message").as_invocation(),
            Some(("sqs", "send_message"))
        );
        assert_eq!(Type::method_ref("sqs", "send_message").as_invocation(), None);
        assert_eq!(Type::string_literal("s3").as_string_literal(), Some("s3"));
    }
}
