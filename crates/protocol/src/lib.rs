//! Data types shared by the artifactdrop crates.
//!
//! Everything here is plain data: the release-management wire types, the
//! progress snapshot handed to UI callbacks, the final upload outcome, and
//! the diagnostic record emitted after every remote exchange.

pub mod exchange;
pub mod types;

pub use exchange::{ApiExchange, ExchangeLogger, REDACTED, curl_command};
pub use types::{
    ArtifactKind, ArtifactStatus, ArtifactStatusReport, ConnectedApp, InstallableArtifact,
    Organization, ParseError, Platform, ProgressSnapshot, PublicInstallPage, TransferHeader,
    TransferTarget, UploadOutcome,
};
