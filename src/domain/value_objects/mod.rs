//! Value Objects for the POS checkout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed sales tax rate (IVA) applied to every taxable line.
pub const TAX_RATE: f64 = 0.16;

/// Cart line identifier, generated at add-time and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self { Self(value.to_string()) }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Bundled, non-physical services sold alongside products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType { Delivery, Installation, Warranty }

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [Self::Delivery, Self::Installation, Self::Warranty];

    /// Catalog price, before tax.
    pub fn price(self) -> f64 {
        match self { Self::Delivery => 350.0, Self::Installation => 500.0, Self::Warranty => 250.0 }
    }

    /// Delivery is sold tax-free; every other service carries IVA.
    pub fn is_taxable(self) -> bool { !matches!(self, Self::Delivery) }

    pub fn label(self) -> &'static str {
        match self { Self::Delivery => "Delivery service", Self::Installation => "Installation service", Self::Warranty => "Extended warranty" }
    }

    pub fn as_str(self) -> &'static str {
        match self { Self::Delivery => "delivery", Self::Installation => "installation", Self::Warranty => "warranty" }
    }
}

impl FromStr for ServiceType {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delivery" => Ok(Self::Delivery),
            "installation" => Ok(Self::Installation),
            "warranty" => Ok(Self::Warranty),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] Cash, Card, Transfer, Mixed }

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self { Self::Cash => "cash", Self::Card => "card", Self::Transfer => "transfer", Self::Mixed => "mixed" }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownVariant(pub String);
impl std::error::Error for UnknownVariant {}
impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown variant `{}`", self.0) }
}

/// Display formatting for money; calculations never round.
pub fn format_money(amount: f64) -> String { format!("${amount:.2}") }

/// True when `s` holds something other than whitespace.
pub fn is_filled(s: &Option<String>) -> bool { s.as_deref().map(str::trim).is_some_and(|v| !v.is_empty()) }
