use crate::commitment::Secret;
use crate::error::{BetError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How side B commits at Accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealScheme {
    /// B sends its secret in the clear; only A reveals.
    Basic,
    /// B sends a hash; both sides reveal and the second reveal settles.
    #[default]
    TwoSided,
}

impl RevealScheme {
    /// The 32-byte value side B attaches to Accept under this scheme.
    pub fn counter_value(&self, secret: &Secret) -> [u8; 32] {
        match self {
            RevealScheme::Basic => *secret.as_bytes(),
            RevealScheme::TwoSided => *secret.commit().as_bytes(),
        }
    }
}

impl std::str::FromStr for RevealScheme {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(RevealScheme::Basic),
            "two-sided" | "two_sided" => Ok(RevealScheme::TwoSided),
            other => Err(BetError::InvalidConfig(format!(
                "unknown reveal scheme '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub scheme: RevealScheme,
    pub forfeit_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            scheme: RevealScheme::default(),
            forfeit_timeout: Duration::from_secs(24 * 60 * 60), // 1 day
        }
    }
}

impl LedgerConfig {
    pub fn new(scheme: RevealScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    pub fn with_forfeit_timeout(mut self, timeout: Duration) -> Self {
        self.forfeit_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.forfeit_timeout.is_zero() {
            return Err(BetError::InvalidConfig(
                "Forfeit timeout must be greater than 0".to_string(),
            ));
        }

        self.forfeit_window()?;
        Ok(())
    }

    pub(crate) fn forfeit_window(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.forfeit_timeout).map_err(|_| {
            BetError::InvalidConfig(format!(
                "Forfeit timeout {:?} is out of range",
                self.forfeit_timeout
            ))
        })
    }
}
