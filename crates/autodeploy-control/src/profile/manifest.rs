//! Dependency manifest parsing.
//!
//! Parsing is opportunistic: a manifest that exists but cannot be understood
//! is still reported, with `parsed = false` and no packages.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::signals::Language;

/// Summary of one dependency manifest found at the checkout root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// File name relative to the checkout root.
    pub file: String,
    /// Whether the file's structure was understood.
    pub parsed: bool,
    /// Declared packages, as written in the manifest.
    pub packages: Vec<String>,
    /// Scripts declared by `package.json`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
    /// `main` field of `package.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

impl Manifest {
    fn parsed(file: &str, packages: Vec<String>) -> Self {
        Self {
            file: file.to_owned(),
            parsed: true,
            packages,
            scripts: BTreeMap::new(),
            main: None,
        }
    }

    fn unparsed(file: &str) -> Self {
        Self {
            file: file.to_owned(),
            parsed: false,
            packages: Vec::new(),
            scripts: BTreeMap::new(),
            main: None,
        }
    }
}

/// Manifest file names inspected for `language`, in order.
#[must_use]
pub const fn manifest_files(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["requirements.txt", "setup.py", "pyproject.toml"],
        Language::Nodejs => &["package.json"],
        Language::Java => &["pom.xml", "build.gradle"],
        Language::Unknown => &[],
    }
}

/// Read every manifest for `language` present at `root`.
#[must_use]
pub fn read_manifests(root: &Path, language: Language) -> Vec<Manifest> {
    manifest_files(language)
        .iter()
        .filter(|file| root.join(file).is_file())
        .map(|file| {
            let manifest = match std::fs::read_to_string(root.join(file)) {
                Ok(content) => parse_manifest(file, &content),
                Err(e) => {
                    debug!(file = %file, error = %e, "failed to read manifest");
                    Manifest::unparsed(file)
                }
            };
            debug!(
                file = %manifest.file,
                parsed = manifest.parsed,
                packages = manifest.packages.len(),
                "read dependency manifest"
            );
            manifest
        })
        .collect()
}

/// Parse a manifest given its file name and content.
#[must_use]
pub fn parse_manifest(file: &str, content: &str) -> Manifest {
    match file {
        "requirements.txt" => Manifest::parsed(file, parse_requirements_txt(content)),
        "setup.py" => parse_setup_py(content)
            .map_or_else(|| Manifest::unparsed(file), |p| Manifest::parsed(file, p)),
        "pyproject.toml" => parse_pyproject(content)
            .map_or_else(|| Manifest::unparsed(file), |p| Manifest::parsed(file, p)),
        "package.json" => parse_package_json(content).unwrap_or_else(|| Manifest::unparsed(file)),
        "pom.xml" => Manifest::parsed(file, parse_pom(content)),
        "build.gradle" => Manifest::parsed(file, parse_gradle(content)),
        _ => Manifest::unparsed(file),
    }
}

fn parse_requirements_txt(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

static INSTALL_REQUIRES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)install_requires\s*=\s*\[(.*?)\]").ok());

static QUOTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).ok());

fn parse_setup_py(content: &str) -> Option<Vec<String>> {
    let list = INSTALL_REQUIRES.as_ref()?.captures(content)?.get(1)?.as_str();
    let quoted = QUOTED.as_ref()?;
    Some(
        quoted
            .captures_iter(list)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
            .collect(),
    )
}

fn parse_pyproject(content: &str) -> Option<Vec<String>> {
    let doc: toml::Value = toml::from_str(content).ok()?;
    let mut packages = Vec::new();

    if let Some(deps) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(toml::Value::as_array)
    {
        packages.extend(deps.iter().filter_map(|d| d.as_str().map(ToOwned::to_owned)));
    }

    if let Some(deps) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(toml::Value::as_table)
    {
        packages.extend(deps.keys().filter(|k| k.as_str() != "python").cloned());
    }

    Some(packages)
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    main: Option<String>,
}

fn parse_package_json(content: &str) -> Option<Manifest> {
    let package: PackageJson = serde_json::from_str(content).ok()?;
    let packages = package
        .dependencies
        .into_keys()
        .chain(package.dev_dependencies.into_keys())
        .collect();
    Some(Manifest {
        file: "package.json".to_owned(),
        parsed: true,
        packages,
        scripts: package.scripts,
        main: package.main,
    })
}

static ARTIFACT_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<artifactId>\s*([^<\s]+)\s*</artifactId>").ok());

fn parse_pom(content: &str) -> Vec<String> {
    ARTIFACT_ID
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
                .collect()
        })
        .unwrap_or_default()
}

static GRADLE_COORDINATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"["']([\w.\-]+:[\w.\-]+)(?::[^"']*)?["']"#).ok());

fn parse_gradle(content: &str) -> Vec<String> {
    GRADLE_COORDINATE
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
                .collect()
        })
        .unwrap_or_default()
}
