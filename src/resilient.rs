//! Degrade policy for collaborator calls.
//!
//! Every backend call in checkout goes through [`Resilient::attempt`]. A failure
//! is either absorbed into a local fallback ([`Resilient::or_degrade`]) or kept
//! as an error the caller logs and moves past.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub enum Resilient<T> {
    Ok(T),
    Degraded { value: T, reason: String },
    Err(String),
}

impl<T> Resilient<T> {
    pub async fn attempt<E, F>(operation: &'static str, fut: F) -> Self
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        match fut.await {
            Ok(value) => Self::Ok(value),
            Err(e) => {
                warn!(operation, error = %e, "collaborator call failed");
                Self::Err(e.to_string())
            }
        }
    }

    /// Replaces an error with a locally produced value, when the fallback can produce one.
    pub fn or_degrade(self, fallback: impl FnOnce(&str) -> Option<T>) -> Self {
        match self {
            Self::Err(reason) => match fallback(&reason) {
                Some(value) => Self::Degraded { value, reason },
                None => Self::Err(reason),
            },
            other => other,
        }
    }

    pub fn is_degraded(&self) -> bool { matches!(self, Self::Degraded { .. }) }

    pub fn into_value(self) -> Option<T> {
        match self { Self::Ok(v) | Self::Degraded { value: v, .. } => Some(v), Self::Err(_) => None }
    }

    pub fn error(&self) -> Option<&str> {
        match self { Self::Ok(_) => None, Self::Degraded { reason, .. } | Self::Err(reason) => Some(reason) }
    }
}
