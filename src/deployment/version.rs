// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! MongoDB version arithmetic used to seed new processes and replica sets.

use semver::Version;

use crate::errors::{DeploymentError, Result};

/// Suffix Ops Manager appends to enterprise builds (`4.0.6-ent`).
const ENTERPRISE_SUFFIX: &str = "-ent";

/// Parse a MongoDB version, ignoring the enterprise suffix.
///
/// A bare `major.minor` (as used by `featureCompatibilityVersion`) is read as `major.minor.0`.
///
/// # Errors
///
/// Returns [`DeploymentError::InvalidVersion`] if the string is not a version.
pub fn parse_version(version: &str) -> Result<Version> {
    let trimmed = version.trim().trim_end_matches(ENTERPRISE_SUFFIX);
    let normalized = if trimmed.matches('.').count() == 1 {
        format!("{trimmed}.0")
    } else {
        trimmed.to_string()
    };
    Version::parse(&normalized).map_err(|e| DeploymentError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// `authSchemaVersion` for a process: 5 from 3.0 onwards, 3 for 2.6.
///
/// # Errors
///
/// Returns [`DeploymentError::InvalidVersion`] if the version cannot be parsed.
pub fn auth_schema_version(version: &str) -> Result<i64> {
    if parse_version(version)? >= Version::new(3, 0, 0) {
        Ok(5)
    } else {
        Ok(3)
    }
}

/// Default `featureCompatibilityVersion` (`major.minor`), which only exists from 3.4.
///
/// # Errors
///
/// Returns [`DeploymentError::InvalidVersion`] if the version cannot be parsed.
pub fn default_feature_compatibility_version(version: &str) -> Result<Option<String>> {
    let parsed = parse_version(version)?;
    if parsed >= Version::new(3, 4, 0) {
        Ok(Some(format!("{}.{}", parsed.major, parsed.minor)))
    } else {
        Ok(None)
    }
}

/// Replica set `protocolVersion`: `"1"` from 3.2 onwards, absent before.
///
/// The automation agent expects the protocol version as a string.
///
/// # Errors
///
/// Returns [`DeploymentError::InvalidVersion`] if the version cannot be parsed.
pub fn protocol_version(version: &str) -> Result<Option<&'static str>> {
    if parse_version(version)? >= Version::new(3, 2, 0) {
        Ok(Some("1"))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod version_tests;
