//! Compact hardware address type for SwitchBot devices.
//!
//! Scan lines carry addresses as `aa:bb:cc:dd:ee:ff`, while the SwitchBot cloud
//! API reports the same device as `AABBCCDDEEFF`. Both forms parse into the same
//! [`MacAddress`], which is what the device directory is keyed by.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth MAC address stored as a compact 6-byte array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseMacError {
    #[error("invalid MAC address: expected 6 parts, got {0}")]
    InvalidLength(usize),
    #[error("invalid MAC address: part {0} has wrong length")]
    InvalidPartLength(usize),
    #[error("invalid MAC address: '{0}' is not valid hex")]
    InvalidHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut bytes = [0u8; 6];

        // Separator-less form used by the cloud API.
        if !s.contains(':') && s.len() == 12 {
            hex::decode_to_slice(s, &mut bytes)
                .map_err(|_| ParseMacError::InvalidHex(s.to_string()))?;
            return Ok(MacAddress(bytes));
        }

        let count = s.split(':').count();
        if count != 6 {
            return Err(ParseMacError::InvalidLength(count));
        }
        for (i, part) in s.split(':').enumerate() {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidPartLength(i));
            }
            hex::decode_to_slice(part, &mut bytes[i..=i])
                .map_err(|_| ParseMacError::InvalidHex(part.to_string()))?;
        }
        Ok(MacAddress(bytes))
    }
}
