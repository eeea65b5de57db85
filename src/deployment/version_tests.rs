// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `version.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        auth_schema_version, default_feature_compatibility_version, parse_version,
        protocol_version,
    };
    use crate::errors::DeploymentError;
    use semver::Version;

    #[test]
    fn test_parse_version_strips_enterprise_suffix() {
        assert_eq!(parse_version("4.0.6-ent").unwrap(), Version::new(4, 0, 6));
        assert_eq!(parse_version("6.0.5").unwrap(), Version::new(6, 0, 5));
    }

    #[test]
    fn test_parse_version_accepts_major_minor() {
        assert_eq!(parse_version("4.2").unwrap(), Version::new(4, 2, 0));
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        let err = parse_version("latest").unwrap_err();
        assert!(matches!(err, DeploymentError::InvalidVersion { ref version, .. } if version == "latest"));
    }

    #[test]
    fn test_auth_schema_version() {
        assert_eq!(auth_schema_version("2.6.12").unwrap(), 3);
        assert_eq!(auth_schema_version("3.0.0").unwrap(), 5);
        assert_eq!(auth_schema_version("7.0.2-ent").unwrap(), 5);
    }

    #[test]
    fn test_default_feature_compatibility_version() {
        assert_eq!(default_feature_compatibility_version("3.2.22").unwrap(), None);
        assert_eq!(
            default_feature_compatibility_version("3.4.0").unwrap().as_deref(),
            Some("3.4")
        );
        assert_eq!(
            default_feature_compatibility_version("6.0.5-ent").unwrap().as_deref(),
            Some("6.0")
        );
    }

    #[test]
    fn test_protocol_version() {
        assert_eq!(protocol_version("3.0.15").unwrap(), None);
        assert_eq!(protocol_version("3.2.0").unwrap(), Some("1"));
        assert_eq!(protocol_version("5.0.14").unwrap(), Some("1"));
    }
}
