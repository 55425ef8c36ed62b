use base64::Engine;
use serde::Serialize;

/// Describes the calling device and app build; sent on every request as a
/// base64-encoded JSON header. Field names mirror the account
/// properties a native client would report.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub device_model: String,
    pub region: String,
    pub app_name: String,
    pub app_version: String,
    pub os_name: String,
    pub os_version: String,
    pub primary_language: String,
    pub locale: String,
}

impl ClientInfo {
    /// Encodes this record the way the history endpoints expect it: JSON,
    /// then base64. The header name itself isn't part of the core protocol
    /// (it belongs to the HTTP transport boundary); this SDK sends it as
    /// `X-Things-Client-Info`.
    pub fn to_header_value(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }
}

pub const CLIENT_INFO_HEADER: &str = "X-Things-Client-Info";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_base64_json() {
        let info = ClientInfo {
            device_model: "Mac".to_string(),
            region: "US".to_string(),
            app_name: "Things".to_string(),
            app_version: "3.0".to_string(),
            os_name: "macOS".to_string(),
            os_version: "14.0".to_string(),
            primary_language: "en".to_string(),
            locale: "en_US".to_string(),
        };

        let header = info.to_header_value().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(header).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["app_name"], "Things");
    }
}
