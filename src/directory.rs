//! Device directory: which device class lives at which address.
//!
//! The directory is populated once at startup, from a JSON file or from the
//! SwitchBot cloud API, and is read-only afterwards. Share it with
//! `Arc<DeviceDirectory>`.

use crate::device::DeviceClass;
use crate::mac_address::{MacAddress, ParseMacError};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while populating the directory. Startup cannot continue after any of them.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to read device file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid device file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid device address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: ParseMacError,
    },
    #[cfg(feature = "switchbot")]
    #[error(transparent)]
    SwitchBot(#[from] crate::switchbot::SwitchBotError),
}

/// Immutable address → device class mapping.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: HashMap<MacAddress, DeviceClass>,
}

impl DeviceDirectory {
    /// Build a directory from `(address, type name)` pairs.
    ///
    /// Addresses may use either the colon or the compact form.
    pub fn from_entries<I, A, T>(entries: I) -> Result<Self, DirectoryError>
    where
        I: IntoIterator<Item = (A, T)>,
        A: AsRef<str>,
        T: AsRef<str>,
    {
        let mut devices = HashMap::new();
        for (address, type_name) in entries {
            let address = address.as_ref();
            let mac = address
                .parse::<MacAddress>()
                .map_err(|source| DirectoryError::Address {
                    address: address.to_string(),
                    source,
                })?;
            let Ok(class) = type_name.as_ref().parse::<DeviceClass>();
            devices.insert(mac, class);
        }
        Ok(Self { devices })
    }

    /// Parse a JSON object mapping addresses to SwitchBot type names.
    ///
    /// ```
    /// use switchbot_listener::{DeviceClass, DeviceDirectory};
    ///
    /// let directory = DeviceDirectory::from_json(r#"{"D3:A2:E1:F0:0B:4C": "Meter"}"#).unwrap();
    /// assert_eq!(directory.resolve("d3:a2:e1:f0:0b:4c"), DeviceClass::Meter);
    /// assert_eq!(directory.resolve("00:00:00:00:00:00"), DeviceClass::Unknown);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let mapping: BTreeMap<String, String> = serde_json::from_str(json)?;
        Self::from_entries(mapping)
    }

    /// Load a directory file (see [`DeviceDirectory::from_json`]).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Device class for a scanned address; anything not listed is `Unknown`.
    pub fn resolve(&self, address: &str) -> DeviceClass {
        address
            .parse::<MacAddress>()
            .ok()
            .and_then(|mac| self.devices.get(&mac))
            .cloned()
            .unwrap_or(DeviceClass::Unknown)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_ADDRESS, TEST_MAC};
    use std::io::Write;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let directory =
            DeviceDirectory::from_entries([("D3:A2:E1:F0:0B:4C", "Plug Mini (US)")]).unwrap();
        assert_eq!(directory.resolve(TEST_ADDRESS), DeviceClass::PlugMiniUs);
        assert_eq!(
            directory.resolve(&TEST_MAC.to_string()),
            DeviceClass::PlugMiniUs
        );
    }

    #[test]
    fn test_resolve_compact_keys() {
        let directory = DeviceDirectory::from_entries([("D3A2E1F00B4C", "Meter")]).unwrap();
        assert_eq!(directory.resolve(TEST_ADDRESS), DeviceClass::Meter);
    }

    #[test]
    fn test_missing_address_is_unknown() {
        let directory = DeviceDirectory::from_entries([("D3:A2:E1:F0:0B:4C", "Meter")]).unwrap();
        assert_eq!(
            directory.resolve("11:22:33:44:55:66"),
            DeviceClass::Unknown
        );
        // Unparseable scan addresses are not an error either
        assert_eq!(
            directory.resolve("xy:96:43:12:61:5b"),
            DeviceClass::Unknown
        );
    }

    #[test]
    fn test_explicit_unknown_entry() {
        let directory = DeviceDirectory::from_json(r#"{"D3:A2:E1:F0:0B:4C": "_unknown_"}"#).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve(TEST_ADDRESS), DeviceClass::Unknown);
    }

    #[test]
    fn test_invalid_key_fails() {
        let result = DeviceDirectory::from_json(r#"{"not-a-mac": "Meter"}"#);
        assert!(matches!(result, Err(DirectoryError::Address { .. })));
    }

    #[test]
    fn test_invalid_json_fails() {
        let result = DeviceDirectory::from_json(r#"["Meter"]"#);
        assert!(matches!(result, Err(DirectoryError::Json(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"D3:A2:E1:F0:0B:4C": "Meter", "11:22:33:44:55:66": "Hub Mini"}}"#
        )
        .unwrap();

        let directory = DeviceDirectory::load(file.path()).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.resolve(TEST_ADDRESS), DeviceClass::Meter);
        assert_eq!(directory.resolve("11:22:33:44:55:66"), DeviceClass::HubMini);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = DeviceDirectory::load(dir.path().join("devices.json"));
        assert!(matches!(result, Err(DirectoryError::Read { .. })));
    }
}
