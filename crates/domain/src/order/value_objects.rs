//! Value objects for the order domain.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// A syntactically valid email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parses an email address, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let value = raw.trim();
        let invalid = || OrderError::InvalidEmail(value.to_string());

        let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || domain.contains('@')
            || value.chars().any(char::is_whitespace)
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Where an order is delivered.
///
/// Missing fields deserialize as empty strings so that an incomplete address
/// is reported by [`ShippingAddress::validate`] rather than as a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ShippingAddress {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            postal_code: None,
            country: None,
        }
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<(), OrderError> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::InvalidShippingAddress { field });
            }
        }
        Ok(())
    }
}

/// An authenticated customer, as asserted by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Email,
}

impl Identity {
    pub fn new(user_id: UserId, email: Email) -> Self {
        Self { user_id, email }
    }
}

/// Who placed an order: exactly one of a registered user or a guest email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    User { user_id: UserId },
    Guest { email: Email },
}

impl Owner {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Owner::User { user_id } => Some(*user_id),
            Owner::Guest { .. } => None,
        }
    }

    pub fn guest_email(&self) -> Option<&Email> {
        match self {
            Owner::User { .. } => None,
            Owner::Guest { email } => Some(email),
        }
    }

    /// Rebuilds an owner from the two nullable columns it is persisted as.
    ///
    /// Returns `None` unless exactly one of them is set.
    pub fn from_parts(user_id: Option<UserId>, guest_email: Option<Email>) -> Option<Self> {
        match (user_id, guest_email) {
            (Some(user_id), None) => Some(Owner::User { user_id }),
            (None, Some(email)) => Some(Owner::Guest { email }),
            _ => None,
        }
    }
}

/// One requested line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}
