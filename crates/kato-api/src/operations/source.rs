// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Build sources and builder topic routing.
//!
//! A build request names one of four source kinds, each with its own
//! required fields. Validation happens before anything is persisted so
//! a malformed request leaves no trace.

use serde::{Deserialize, Serialize};

use kato_mq::Topic;

use crate::error::{ApiError, Result};

/// Raw build-source fields as they arrive from the console.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSourceSpec {
    /// One of `build_from_image`, `build_from_source_code`,
    /// `build_from_market_image`, `build_from_market_slug`.
    pub source_type: String,
    /// Repository url (source-code builds).
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Branch (source-code builds).
    #[serde(default)]
    pub branch: Option<String>,
    /// Image reference (image builds).
    #[serde(default)]
    pub image_url: Option<String>,
    /// Registry user for private images.
    #[serde(default)]
    pub user: Option<String>,
    /// Registry password for private images.
    #[serde(default)]
    pub password: Option<String>,
    /// Slug path (market slug builds).
    #[serde(default)]
    pub slug_path: Option<String>,
    /// Build command override.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// A validated build source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    /// Build from a plain image reference.
    Image {
        /// Image reference.
        image_url: String,
    },
    /// Build from a git repository.
    SourceCode {
        /// Repository url.
        repo_url: String,
        /// Branch to build.
        branch: String,
    },
    /// Build from an application-market image.
    MarketImage {
        /// Image reference published by the market.
        image_url: String,
    },
    /// Build from an application-market slug.
    MarketSlug {
        /// Slug artifact path.
        slug_path: String,
    },
}

impl BuildSource {
    /// The wire string of the source kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            BuildSource::Image { .. } => "build_from_image",
            BuildSource::SourceCode { .. } => "build_from_source_code",
            BuildSource::MarketImage { .. } => "build_from_market_image",
            BuildSource::MarketSlug { .. } => "build_from_market_slug",
        }
    }

    /// How the built artifact is delivered.
    pub fn delivered_type(&self) -> &'static str {
        match self {
            BuildSource::Image { .. } | BuildSource::MarketImage { .. } => "image",
            BuildSource::SourceCode { .. } => "image",
            BuildSource::MarketSlug { .. } => "slug",
        }
    }

    /// Repository url, for source-code builds.
    pub fn repo_url(&self) -> Option<&str> {
        match self {
            BuildSource::SourceCode { repo_url, .. } => Some(repo_url),
            _ => None,
        }
    }

    /// Branch, for source-code builds.
    pub fn branch(&self) -> Option<&str> {
        match self {
            BuildSource::SourceCode { branch, .. } => Some(branch),
            _ => None,
        }
    }
}

impl BuildSourceSpec {
    /// Validate the required-field set of the named source kind.
    pub fn validate(&self) -> Result<BuildSource> {
        fn required(field: Option<&String>, name: &str) -> Result<String> {
            match field {
                Some(value) if !value.is_empty() => Ok(value.clone()),
                _ => Err(ApiError::Validation(format!("{name} is required"))),
            }
        }

        match self.source_type.as_str() {
            "build_from_image" => Ok(BuildSource::Image {
                image_url: required(self.image_url.as_ref(), "image_url")?,
            }),
            "build_from_source_code" => Ok(BuildSource::SourceCode {
                repo_url: required(self.repo_url.as_ref(), "repo_url")?,
                branch: required(self.branch.as_ref(), "branch")?,
            }),
            "build_from_market_image" => Ok(BuildSource::MarketImage {
                image_url: required(self.image_url.as_ref(), "image_url")?,
            }),
            "build_from_market_slug" => Ok(BuildSource::MarketSlug {
                slug_path: required(self.slug_path.as_ref(), "slug_path")?,
            }),
            other => Err(ApiError::Validation(format!(
                "unknown source_type '{other}'"
            ))),
        }
    }
}

/// Source bodies matching any of these route to the windows builder.
const WINDOWS_KEYWORDS: [&str; 4] = ["windows", "asp", "microsoft", "nanoserver"];

/// True when a docker-run / docker-compose source body names a windows
/// base image.
pub fn source_body_is_windows(source_body: &str) -> bool {
    let body = source_body.to_lowercase();
    WINDOWS_KEYWORDS.iter().any(|k| body.contains(k))
}

/// Pick the builder topic for a build or source check.
///
/// Windows builds need a windows build host: a component carrying a
/// `windows` node-selector label always routes there, and docker-run /
/// docker-compose sources route there when their body names a windows
/// base image. With no windows builders in the region everything goes
/// to the default builder.
pub fn build_topic(
    windows_enabled: bool,
    node_selector: Option<&str>,
    source_type: &str,
    source_body: &str,
) -> Topic {
    if !windows_enabled {
        return Topic::Builder;
    }
    let windows_label = node_selector.is_some_and(|s| s.contains("windows"));
    let windows_source = matches!(source_type, "docker-run" | "docker-compose")
        && source_body_is_windows(source_body);
    if windows_label || windows_source {
        Topic::WindowsBuilder
    } else {
        Topic::Builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_required_fields() {
        let spec = BuildSourceSpec {
            source_type: "build_from_source_code".to_string(),
            repo_url: Some("https://git.example.com/app.git".to_string()),
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("branch"));

        let spec = BuildSourceSpec {
            source_type: "build_from_image".to_string(),
            ..Default::default()
        };
        assert!(spec.validate().is_err());

        let spec = BuildSourceSpec {
            source_type: "build_from_image".to_string(),
            image_url: Some("registry.example.com/app:1.0".to_string()),
            ..Default::default()
        };
        assert_eq!(
            spec.validate().unwrap(),
            BuildSource::Image {
                image_url: "registry.example.com/app:1.0".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_source_type() {
        let spec = BuildSourceSpec {
            source_type: "build_from_nowhere".to_string(),
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_windows_body_detection() {
        assert!(source_body_is_windows("docker run microsoft/aspnet"));
        assert!(source_body_is_windows("FROM mcr.io/nanoserver:1809"));
        assert!(source_body_is_windows("docker run -d myorg/ASPNET-app"));
        assert!(!source_body_is_windows("docker run nginx:alpine"));
    }

    #[test]
    fn test_windows_topic_routing() {
        // The S4 shape: docker-run body naming a windows image.
        assert_eq!(
            build_topic(true, None, "docker-run", "docker run microsoft/aspnet"),
            Topic::WindowsBuilder
        );
        // Same body with windows builders disabled.
        assert_eq!(
            build_topic(false, None, "docker-run", "docker run microsoft/aspnet"),
            Topic::Builder
        );
        // Node-selector label wins regardless of source.
        assert_eq!(
            build_topic(true, Some("windows"), "build_from_source_code", ""),
            Topic::WindowsBuilder
        );
        // Keyword in a non-docker source does not trigger routing.
        assert_eq!(
            build_topic(true, None, "build_from_source_code", "microsoft"),
            Topic::Builder
        );
        // Plain linux build.
        assert_eq!(
            build_topic(true, None, "docker-run", "docker run nginx"),
            Topic::Builder
        );
    }
}
