use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque session and device-trust bundle handed from one step to the next.
///
/// Values are typically cookies or session headers; only the
/// [`AuthService`](crate::AuthService) that produced them interprets them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthAssets {
    values: BTreeMap<String, String>,
}

impl AuthAssets {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> { self.values.get(key).map(String::as_str) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl fmt::Debug for AuthAssets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("ServiceKey(..)") }
}

/// Second-factor challenge issued after credentials were accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Where the code was delivered, e.g. a masked phone number or "device".
    pub delivered_to: Option<String>,
    pub code_length:  usize,
}

#[derive(Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn new(code: impl Into<String>) -> Self { Self(code.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("VerificationCode(..)") }
}

/// Short-lived credential authorizing a transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadAuthorization(String);

impl DownloadAuthorization {
    pub fn new(token: impl Into<String>) -> Self { Self(token.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Debug for DownloadAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DownloadAuthorization(..)")
    }
}
