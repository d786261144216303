use std::net::IpAddr;

use serde::Deserialize;

use crate::codec::ParseOptions;

/// Service layer configuration.
///
/// The version fields name records in the engine's version registry; they
/// are handed to the parser on every inbound message. A plain FIX 4.x
/// deployment usually leaves all three unset and lets the version matcher
/// do the work; a FIX 5.x deployment typically sets
/// `default_application_version` for counterparties that omit
/// `ApplVerID(1128)`.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// IP address
    pub host: IpAddr,
    /// Port number
    pub port: u16,
    /// Force this session-layer version instead of matching on the header.
    #[serde(default)]
    pub session_version: Option<String>,
    /// Force this application-layer version instead of matching on the
    /// header.
    #[serde(default)]
    pub application_version: Option<String>,
    /// Application-layer version assumed when nothing matches.
    #[serde(default)]
    pub default_application_version: Option<String>,
}

impl Settings {
    pub(crate) fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            session_version: self.session_version.clone(),
            application_version: self.application_version.clone(),
            default_application_version: self.default_application_version.clone(),
        }
    }
}
