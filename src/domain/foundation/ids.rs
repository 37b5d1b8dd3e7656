//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a UUID-backed identifier with the usual constructors and conversions.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a tenant (business account).
    TenantId
);

uuid_id!(
    /// Unique identifier for a conversation.
    ConversationId
);

uuid_id!(
    /// Unique identifier for a lead.
    LeadId
);

uuid_id!(
    /// Unique identifier for a stored message.
    MessageId
);

/// Customer identifier as delivered by the transport (phone-like string).
///
/// Surrounding whitespace is trimmed; the value must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

const MAX_CUSTOMER_ID_LEN: usize = 128;

impl CustomerId {
    /// Creates a new CustomerId from a transport identifier (phone number, handle).
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(ValidationError::empty_field("customer_id"));
        }
        if id.len() > MAX_CUSTOMER_ID_LEN {
            return Err(ValidationError::invalid_format(
                "customer_id",
                format!("longer than {} bytes", MAX_CUSTOMER_ID_LEN),
            ));
        }
        if id.chars().any(char::is_control) {
            return Err(ValidationError::invalid_format(
                "customer_id",
                "contains control characters",
            ));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_generates_unique_values() {
        let id1 = ConversationId::new();
        let id2 = ConversationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn tenant_id_parses_from_string() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: TenantId = uuid_str.parse().unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn lead_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<LeadId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let uuid = Uuid::new_v4();
        let id = MessageId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn customer_id_trims_whitespace() {
        let id = CustomerId::new("  +201234567890 ").unwrap();
        assert_eq!(id.as_str(), "+201234567890");
    }

    #[test]
    fn customer_id_rejects_empty() {
        assert!(CustomerId::new("   ").is_err());
        assert!(CustomerId::new("").is_err());
    }

    #[test]
    fn customer_id_rejects_oversized_and_control_characters() {
        assert!(matches!(
            CustomerId::new("9".repeat(129)),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(CustomerId::new("+2012\u{0}34").is_err());
        assert!(CustomerId::new("9".repeat(128)).is_ok());
    }
}
