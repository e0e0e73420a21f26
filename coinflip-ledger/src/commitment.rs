use hex::FromHex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const SECRET_LEN: usize = 32;

/// A participant's secret, read as a big-endian 256-bit word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Secret(#[serde(with = "hex32")] [u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Place `value` in the low-order bytes of the word.
    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        bytes[SECRET_LEN - 16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse up to 64 hex digits, left-padding short input with zeros.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > SECRET_LEN * 2 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let padded = format!("{:0>64}", digits);
        Ok(Self(<[u8; SECRET_LEN]>::from_hex(padded)?))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn commit(&self) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        Commitment(hasher.finalize().into())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Rnd secret for commitment
pub fn generate_secret() -> Secret {
    let mut secret = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    Secret(secret)
}

/// SHA-256 of a [`Secret`]; the key every bet is stored under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex32")] [u8; 32]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn verify(&self, secret: &Secret) -> bool {
        secret.commit() == *self
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex digits, for tables and logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.short())
    }
}

impl FromStr for Commitment {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(<[u8; 32]>::from_hex(s.strip_prefix("0x").unwrap_or(s))?))
    }
}

/// One of the two parties to a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Proposer,
    Acceptor,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Proposer => Side::Acceptor,
            Side::Acceptor => Side::Proposer,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Proposer => f.write_str("proposer"),
            Side::Acceptor => f.write_str("acceptor"),
        }
    }
}

/// XOR of both revealed secrets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreedRandom(#[serde(with = "hex32")] [u8; SECRET_LEN]);

impl AgreedRandom {
    pub fn derive(a: &Secret, b: &Secret) -> Self {
        let mut combined = [0u8; SECRET_LEN];
        for (out, (x, y)) in combined.iter_mut().zip(a.0.iter().zip(b.0.iter())) {
            *out = x ^ y;
        }
        Self(combined)
    }

    pub fn is_even(&self) -> bool {
        self.0[SECRET_LEN - 1] & 1 == 0
    }

    /// Even favours the proposer, odd the acceptor.
    pub fn winning_side(&self) -> Side {
        if self.is_even() {
            Side::Proposer
        } else {
            Side::Acceptor
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AgreedRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgreedRandom({})", self.to_hex())
    }
}

mod hex32 {
    use hex::FromHex;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        <[u8; 32]>::from_hex(&s).map_err(D::Error::custom)
    }
}
