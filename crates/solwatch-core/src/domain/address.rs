use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::InvalidAddress;

const MIN_ADDRESS_LEN: usize = 32;
const MAX_ADDRESS_LEN: usize = 44;
const PUBKEY_BYTES: usize = 32;

/// Validated Solana account address (base58-encoded 32-byte public key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Check the structural encoding of an address. Performs no I/O.
    pub fn parse(input: &str) -> Result<Self, InvalidAddress> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InvalidAddress::Empty);
        }

        let len = trimmed.chars().count();
        if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
            return Err(InvalidAddress::Length {
                len,
                min: MIN_ADDRESS_LEN,
                max: MAX_ADDRESS_LEN,
            });
        }

        for (index, ch) in trimmed.chars().enumerate() {
            if !is_base58_char(ch) {
                return Err(InvalidAddress::InvalidChar { ch, index });
            }
        }

        let decoded = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| InvalidAddress::DecodedLength { len: 0 })?;
        if decoded.len() != PUBKEY_BYTES {
            return Err(InvalidAddress::DecodedLength { len: decoded.len() });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Bitcoin alphabet: no 0, O, I or l.
fn is_base58_char(ch: char) -> bool {
    matches!(ch, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for Address {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Address {
    type Error = InvalidAddress;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}
