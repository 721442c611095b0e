use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Errors from parsing protocol enums out of strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unsupported artifact type: {0}")]
    UnknownKind(String),

    #[error("Unexpected artifact status: {0}")]
    UnknownStatus(String),
}

/// Mobile platform of a connected app or artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            _ => Err(ParseError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Recognised package formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Ipa,
    Apk,
    Aab,
}

impl ArtifactKind {
    /// Detects the kind from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, ParseError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ipa" => Ok(ArtifactKind::Ipa),
            "apk" => Ok(ArtifactKind::Apk),
            "aab" => Ok(ArtifactKind::Aab),
            _ => Err(ParseError::UnknownKind(name.to_string())),
        }
    }

    /// Platform this package format installs on.
    pub fn platform(&self) -> Platform {
        match self {
            ArtifactKind::Ipa => Platform::Ios,
            ArtifactKind::Apk | ArtifactKind::Aab => Platform::Android,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Ipa => "ipa",
            ArtifactKind::Apk => "apk",
            ArtifactKind::Aab => "aab",
        }
    }
}

/// Processing state reported by the release-management service.
///
/// The set is closed: any other string is a [`ParseError::UnknownStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    UploadRequested,
    Uploaded,
    Processing,
    ProcessedValid,
    ProcessedInvalid,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::UploadRequested => "upload_requested",
            ArtifactStatus::Uploaded => "uploaded",
            ArtifactStatus::Processing => "processing",
            ArtifactStatus::ProcessedValid => "processed_valid",
            ArtifactStatus::ProcessedInvalid => "processed_invalid",
        }
    }

    /// Returns `true` for states that require polling again.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::UploadRequested | ArtifactStatus::Uploaded | ArtifactStatus::Processing
        )
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload_requested" => Ok(ArtifactStatus::UploadRequested),
            "uploaded" => Ok(ArtifactStatus::Uploaded),
            "processing" => Ok(ArtifactStatus::Processing),
            "processed_valid" => Ok(ArtifactStatus::ProcessedValid),
            "processed_invalid" => Ok(ArtifactStatus::ProcessedInvalid),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// One header that must accompany the byte transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferHeader {
    pub name: String,
    pub value: String,
}

/// Pre-authorized, single-use upload destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTarget {
    pub url: String,
    pub method: String,
    /// Headers in the order the service listed them.
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: Vec<TransferHeader>,
}

/// Accepts either the service's `{"key": {"name", "value"}}` object or a
/// plain list, preserving document order.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<TransferHeader>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HeadersVisitor;

    impl<'de> Visitor<'de> for HeadersVisitor {
        type Value = Vec<TransferHeader>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map or list of {name, value} header entries")
        }

        fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
            let mut headers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((_key, header)) = map.next_entry::<String, TransferHeader>()? {
                headers.push(header);
            }
            Ok(headers)
        }

        fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
            let mut headers = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(header) = seq.next_element::<TransferHeader>()? {
                headers.push(header);
            }
            Ok(headers)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(HeadersVisitor)
}

/// Point-in-time transfer measurement handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub loaded: u64,
    pub total: u64,
    /// Floor of `100 * loaded / total`.
    pub percentage: u8,
    /// Bytes per second since the previous snapshot.
    pub speed: f64,
    /// Seconds; zero when `speed` is zero.
    pub estimated_time_remaining: f64,
}

/// Final result of one orchestrated upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_install_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArtifactStatus>,
}

impl UploadOutcome {
    pub fn succeeded(
        artifact_id: impl Into<String>,
        status: ArtifactStatus,
        public_install_url: Option<String>,
    ) -> Self {
        Self {
            success: true,
            message: "Upload successful!".into(),
            artifact_id: artifact_id.into(),
            public_install_url,
            status: Some(status),
        }
    }

    pub fn failed(artifact_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            artifact_id: artifact_id.into(),
            public_install_url: None,
            status: None,
        }
    }
}

/// Raw status response; `status` is parsed by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatusReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_install_page_url: Option<String>,
}

/// Response of the public-install-page activation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInstallPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_install_page_url: Option<String>,
}

/// Summary of an uploaded artifact in the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallableArtifact {
    pub id: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_install_page_url: Option<String>,
}

/// A mobile app registered for release management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedApp {
    pub id: String,
    #[serde(default)]
    pub app_name: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_app_id: Option<String>,
}

/// Organization (workspace) the credential has access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub slug: String,
    #[serde(default)]
    pub name: String,
}
