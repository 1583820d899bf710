//! Deployment descriptors and the defaults applied to every context.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use super::errors::DescriptorError;
use crate::handler::ContextSettings;

/// Defaults read from the host's default descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebDefaults {
    #[serde(default = "default_welcome_files")]
    pub welcome_files: Vec<String>,
    #[serde(default)]
    pub directory_listing: bool,
}

impl Default for WebDefaults {
    fn default() -> Self {
        Self {
            welcome_files: default_welcome_files(),
            directory_listing: false,
        }
    }
}

fn default_welcome_files() -> Vec<String> {
    vec!["index.html".to_owned(), "index.htm".to_owned()]
}

impl WebDefaults {
    /// Reads defaults from `path`; a missing file yields the built-in values.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        match fs::read(path) {
            Ok(contents) => {
                serde_json::from_slice(&contents).map_err(|source| DescriptorError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(DescriptorError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// A hot-deployable context description.
///
/// ```json
/// {
///   "context_path": "/shop",
///   "resource_base": "apps/shop",
///   "required_role": "admin"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextDescriptor {
    pub context_path: String,
    /// Directory served by the context; relative paths resolve against the
    /// host home directory.
    pub resource_base: PathBuf,
    #[serde(default)]
    pub welcome_files: Option<Vec<String>>,
    #[serde(default)]
    pub directory_listing: Option<bool>,
    #[serde(default)]
    pub required_role: Option<String>,
    #[serde(default)]
    pub virtual_host: Option<String>,
}

impl ContextDescriptor {
    /// Parses and validates descriptor bytes read from `path`.
    pub fn parse(path: &Path, contents: &[u8]) -> Result<Self, DescriptorError> {
        let mut descriptor: Self =
            serde_json::from_slice(contents).map_err(|source| DescriptorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        descriptor.context_path = normalise_context_path(&descriptor.context_path).ok_or_else(
            || DescriptorError::InvalidContextPath {
                path: path.to_path_buf(),
                context_path: descriptor.context_path.clone(),
            },
        )?;
        Ok(descriptor)
    }

    /// Resolves the descriptor into context settings.
    #[must_use]
    pub fn into_settings(self, origin: &str, home: &Path, defaults: &WebDefaults) -> ContextSettings {
        let resource_base = if self.resource_base.is_absolute() {
            self.resource_base
        } else {
            home.join(self.resource_base)
        };
        ContextSettings {
            context_path: self.context_path,
            origin: origin.to_owned(),
            resource_base,
            welcome_files: self
                .welcome_files
                .unwrap_or_else(|| defaults.welcome_files.clone()),
            directory_listing: self
                .directory_listing
                .unwrap_or(defaults.directory_listing),
            required_role: self.required_role,
            virtual_host: self.virtual_host,
        }
    }
}

/// Normalises a context path to `/segment[/segment...]` or `/`.
///
/// Returns `None` for relative paths, traversal segments, and whitespace.
pub(crate) fn normalise_context_path(raw: &str) -> Option<String> {
    if !raw.starts_with('/') || raw.chars().any(char::is_whitespace) {
        return None;
    }
    let mut segments = Vec::new();
    for component in Path::new(raw).components() {
        match component {
            Component::RootDir => {}
            Component::Normal(segment) => segments.push(segment.to_str()?),
            Component::CurDir | Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(format!("/{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    #[case("/", Some("/"))]
    #[case("/shop", Some("/shop"))]
    #[case("/shop/", Some("/shop"))]
    #[case("//shop//admin", Some("/shop/admin"))]
    #[case("shop", None)]
    #[case("/shop/../etc", None)]
    #[case("/my shop", None)]
    fn context_paths_are_normalised(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalise_context_path(raw).as_deref(), expected);
    }

    #[rstest]
    fn descriptor_inherits_defaults_and_resolves_relative_base() {
        let descriptor = ContextDescriptor::parse(
            Path::new("shop.json"),
            br#"{"context_path": "/shop/", "resource_base": "apps/shop", "required_role": "admin"}"#,
        )
        .expect("descriptor should parse");
        let settings =
            descriptor.into_settings("shop.json", Path::new("/home/wharf"), &WebDefaults::default());
        assert_eq!(settings.context_path, "/shop");
        assert_eq!(settings.resource_base, PathBuf::from("/home/wharf/apps/shop"));
        assert_eq!(settings.welcome_files, vec!["index.html", "index.htm"]);
        assert_eq!(settings.required_role.as_deref(), Some("admin"));
    }

    #[rstest]
    #[case(br#"{"context_path": "/shop"}"#.as_slice())]
    #[case(br#"{"context_path": "/shop", "resource_base": "x", "unknown": 1}"#.as_slice())]
    #[case(b"not json".as_slice())]
    fn malformed_descriptors_are_rejected(#[case] contents: &[u8]) {
        assert!(matches!(
            ContextDescriptor::parse(Path::new("bad.json"), contents),
            Err(DescriptorError::Parse { .. })
        ));
    }

    #[rstest]
    fn invalid_context_path_is_reported() {
        let error = ContextDescriptor::parse(
            Path::new("bad.json"),
            br#"{"context_path": "relative", "resource_base": "x"}"#,
        )
        .expect_err("relative path must be rejected");
        assert!(matches!(error, DescriptorError::InvalidContextPath { .. }));
    }

    #[rstest]
    fn web_defaults_fall_back_when_missing() {
        let dir = TempDir::new().expect("temp dir");
        let defaults =
            WebDefaults::load(&dir.path().join("webdefault.json")).expect("missing file is fine");
        assert_eq!(defaults, WebDefaults::default());
    }

    #[rstest]
    fn web_defaults_are_read_from_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("webdefault.json");
        fs::write(&path, br#"{"welcome_files": ["home.html"], "directory_listing": true}"#)
            .expect("write defaults");
        let defaults = WebDefaults::load(&path).expect("defaults parse");
        assert_eq!(defaults.welcome_files, vec!["home.html"]);
        assert!(defaults.directory_listing);
    }
}
