//! Strongly-typed UUID wrappers for Triton resources.
//!
//! This module provides type-safe UUID wrappers for different Triton resources,
//! preventing UUID mix-ups at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Macro to generate strongly-typed UUID wrapper types.
macro_rules! uuid_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new UUID wrapper from a [`Uuid`].
            #[must_use]
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Creates a new random UUID (v4).
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner [`Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Converts to the inner [`Uuid`].
            #[must_use]
            pub const fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Parses a UUID from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID.
            pub fn parse_str(input: &str) -> Result<Self> {
                Uuid::parse_str(input)
                    .map(Self)
                    .map_err(|_| Error::InvalidUuid(input.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Generate all UUID types
uuid_type!(VmUuid, "Virtual Machine UUID");
uuid_type!(ServerUuid, "Server/Compute Node UUID");
uuid_type!(NetworkUuid, "Network UUID");
uuid_type!(ImageUuid, "Image UUID");
uuid_type!(PackageUuid, "Package UUID");
uuid_type!(OwnerUuid, "Owner/User UUID");
uuid_type!(AppUuid, "Application UUID (SAPI)");
uuid_type!(InstanceUuid, "Instance UUID (SAPI)");
uuid_type!(FirewallRuleUuid, "Firewall Rule UUID");

/// Validates a UUID string.
///
/// # Errors
///
/// Returns an error if the string is not a valid UUID.
pub fn validate_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::InvalidUuid(s.to_string()))
}
