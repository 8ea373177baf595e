//! Config path model.
//!
//! Target files are addressed by structured paths:
//! `datadog/<org_id>/<product>/<config_id>/<name>` for org-scoped
//! configuration and `employee/<product>/<config_id>/<name>` for
//! internally published configuration. An unparseable path is always an
//! error, never silently skipped.

/// Namespace a config path lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Datadog,
    Employee,
}

/// Parsed form of a target-file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPathMeta {
    pub source: ConfigSource,
    /// Present only for org-scoped paths.
    pub org_id: Option<u64>,
    pub product: String,
    pub config_id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigPathError {
    #[error("config path is empty")]
    Empty,

    #[error("unknown config path source: {0}")]
    UnknownSource(String),

    #[error("invalid org id in config path: {0}")]
    InvalidOrgId(String),

    #[error("config path has {found} segments, expected {expected}: {path}")]
    WrongSegmentCount {
        path: String,
        found: usize,
        expected: usize,
    },

    #[error("config path contains an empty segment: {0}")]
    EmptySegment(String),
}

/// Parse a target-file path into its components.
pub fn parse_config_path(path: &str) -> Result<ConfigPathMeta, ConfigPathError> {
    if path.is_empty() {
        return Err(ConfigPathError::Empty);
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigPathError::EmptySegment(path.to_string()));
    }

    match segments[0] {
        "datadog" => {
            if segments.len() != 5 {
                return Err(ConfigPathError::WrongSegmentCount {
                    path: path.to_string(),
                    found: segments.len(),
                    expected: 5,
                });
            }
            let org_id: u64 = segments[1]
                .parse()
                .map_err(|_| ConfigPathError::InvalidOrgId(segments[1].to_string()))?;
            Ok(ConfigPathMeta {
                source: ConfigSource::Datadog,
                org_id: Some(org_id),
                product: segments[2].to_string(),
                config_id: segments[3].to_string(),
                name: segments[4].to_string(),
            })
        }
        "employee" => {
            if segments.len() != 4 {
                return Err(ConfigPathError::WrongSegmentCount {
                    path: path.to_string(),
                    found: segments.len(),
                    expected: 4,
                });
            }
            Ok(ConfigPathMeta {
                source: ConfigSource::Employee,
                org_id: None,
                product: segments[1].to_string(),
                config_id: segments[2].to_string(),
                name: segments[3].to_string(),
            })
        }
        other => Err(ConfigPathError::UnknownSource(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_org_scoped_path() {
        let meta = parse_config_path("datadog/2/APM_TRACING/abc-123/config").unwrap();
        assert_eq!(
            meta,
            ConfigPathMeta {
                source: ConfigSource::Datadog,
                org_id: Some(2),
                product: "APM_TRACING".to_string(),
                config_id: "abc-123".to_string(),
                name: "config".to_string(),
            }
        );
    }

    #[test]
    fn parses_employee_path() {
        let meta = parse_config_path("employee/DEBUG/flare-order/config").unwrap();
        assert_eq!(meta.source, ConfigSource::Employee);
        assert_eq!(meta.org_id, None);
        assert_eq!(meta.product, "DEBUG");
    }

    #[test]
    fn rejects_unknown_source() {
        assert_eq!(
            parse_config_path("vendor/2/APM_TRACING/abc/config"),
            Err(ConfigPathError::UnknownSource("vendor".to_string()))
        );
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(
            parse_config_path("datadog/2/APM_TRACING/config"),
            Err(ConfigPathError::WrongSegmentCount { found: 4, .. })
        ));
        assert!(matches!(
            parse_config_path("employee/DEBUG/a/b/c"),
            Err(ConfigPathError::WrongSegmentCount { found: 5, .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_org_id() {
        assert_eq!(
            parse_config_path("datadog/two/APM_TRACING/abc/config"),
            Err(ConfigPathError::InvalidOrgId("two".to_string()))
        );
    }

    #[test]
    fn rejects_empty_path_and_segments() {
        assert_eq!(parse_config_path(""), Err(ConfigPathError::Empty));
        assert!(matches!(
            parse_config_path("datadog//APM_TRACING/abc/config"),
            Err(ConfigPathError::EmptySegment(_))
        ));
    }
}
