use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// OAuth2 exchange used to obtain a token.
///
/// Device code is the headless variant: no browser redirect is needed on the
/// machine running idgate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    #[default]
    AuthorizationCode,
    DeviceCode,
}

impl GrantType {
    pub const ALL: [GrantType; 2] = [GrantType::AuthorizationCode, GrantType::DeviceCode];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::DeviceCode => "device_code",
        }
    }

    /// Whether the flow expects a browser on this machine.
    pub fn is_interactive(&self) -> bool {
        matches!(self, GrantType::AuthorizationCode)
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "device_code" => Ok(GrantType::DeviceCode),
            other => Err(ParseError {
                kind: "grant type",
                value: other.to_string(),
                expected: "authorization_code, device_code",
            }),
        }
    }
}
