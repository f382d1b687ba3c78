//! SwitchBot cloud API client, used to populate the device directory.
//!
//! Only the device list endpoint is used. Requests are signed as described in
//! <https://github.com/OpenWonderLabs/SwitchBotAPI#authentication>.

use crate::directory::{DeviceDirectory, DirectoryError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default API endpoint for the device list.
pub const DEVICES_URL: &str = "https://api.switch-bot.com/v1.1/devices";

/// `statusCode` the API returns on success.
const STATUS_SUCCESS: i64 = 100;

/// Errors talking to the SwitchBot API.
#[derive(Error, Debug)]
pub enum SwitchBotError {
    #[error("SwitchBot API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SwitchBot API returned statusCode {status}: {message}")]
    Status { status: i64, message: String },
    #[error("invalid SwitchBot secret")]
    InvalidSecret,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DevicesResponse {
    status_code: i64,
    #[serde(default)]
    message: String,
    body: Option<DevicesBody>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct DevicesBody {
    #[serde(default)]
    device_list: Vec<Device>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Device {
    device_id: String,
    device_type: String,
}

/// Credentials for the SwitchBot API.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// Compute the `sign` header: base64(HMAC-SHA256(secret, token + t + nonce)).
pub fn sign(credentials: &Credentials, t: &str, nonce: &str) -> Result<String, SwitchBotError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(credentials.secret.as_bytes())
        .map_err(|_| SwitchBotError::InvalidSecret)?;
    mac.update(credentials.token.as_bytes());
    mac.update(t.as_bytes());
    mac.update(nonce.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Fetch the account's device list and build a directory from it.
pub async fn fetch_directory(
    credentials: &Credentials,
    url: &str,
) -> Result<DeviceDirectory, DirectoryError> {
    let t = unix_millis();
    let nonce = uuid::Uuid::new_v4().to_string();
    let signature = sign(credentials, &t, &nonce)?;

    let response: DevicesResponse = reqwest::Client::new()
        .get(url)
        .header("Authorization", &credentials.token)
        .header("sign", signature)
        .header("nonce", nonce)
        .header("t", t)
        .send()
        .await
        .map_err(SwitchBotError::from)?
        .error_for_status()
        .map_err(SwitchBotError::from)?
        .json()
        .await
        .map_err(SwitchBotError::from)?;

    let directory = directory_from_response(response)?;
    tracing::info!(devices = directory.len(), "fetched SwitchBot device list");
    Ok(directory)
}

fn directory_from_response(response: DevicesResponse) -> Result<DeviceDirectory, DirectoryError> {
    if response.status_code != STATUS_SUCCESS {
        return Err(SwitchBotError::Status {
            status: response.status_code,
            message: response.message,
        }
        .into());
    }

    let devices = response.body.unwrap_or_default().device_list;
    DeviceDirectory::from_entries(
        devices
            .into_iter()
            .map(|device| (device.device_id, device.device_type)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceClass;
    use crate::test_utils::TEST_ADDRESS;

    fn credentials() -> Credentials {
        Credentials {
            token: "token".to_string(),
            secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_sign_is_deterministic_base64() {
        let a = sign(&credentials(), "1700000000000", "nonce-1").unwrap();
        let b = sign(&credentials(), "1700000000000", "nonce-1").unwrap();
        assert_eq!(a, b);
        // 32-byte digest, base64 with padding
        assert_eq!(a.len(), 44);
        assert!(STANDARD.decode(&a).is_ok());
    }

    #[test]
    fn test_sign_covers_all_inputs() {
        let base = sign(&credentials(), "1700000000000", "nonce-1").unwrap();
        assert_ne!(base, sign(&credentials(), "1700000000001", "nonce-1").unwrap());
        assert_ne!(base, sign(&credentials(), "1700000000000", "nonce-2").unwrap());

        let other = Credentials {
            secret: "other".to_string(),
            ..credentials()
        };
        assert_ne!(base, sign(&other, "1700000000000", "nonce-1").unwrap());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        assert_eq!(format!("{:?}", credentials()), "Credentials { .. }");
    }

    #[test]
    fn test_directory_from_response() {
        let response: DevicesResponse = serde_json::from_str(
            r#"{
                "statusCode": 100,
                "body": {
                    "deviceList": [
                        {"deviceId": "D3A2E1F00B4C", "deviceName": "Living", "deviceType": "Meter",
                         "enableCloudService": true, "hubDeviceId": "112233445566"},
                        {"deviceId": "112233445566", "deviceName": "Hub", "deviceType": "Hub Mini",
                         "hubDeviceId": "000000000000"}
                    ],
                    "infraredRemoteList": []
                },
                "message": "success"
            }"#,
        )
        .unwrap();

        let directory = directory_from_response(response).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.resolve(TEST_ADDRESS), DeviceClass::Meter);
        assert_eq!(directory.resolve("11:22:33:44:55:66"), DeviceClass::HubMini);
    }

    #[test]
    fn test_directory_from_error_status() {
        let response: DevicesResponse =
            serde_json::from_str(r#"{"statusCode": 190, "message": "wrong deviceId", "body": {}}"#)
                .unwrap();
        let err = directory_from_response(response).unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::SwitchBot(SwitchBotError::Status { status: 190, .. })
        ));
    }
}
