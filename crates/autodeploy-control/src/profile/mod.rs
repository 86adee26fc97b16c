//! Repository profiling.
//!
//! Scans a checked-out repository once and reduces it to a
//! [`RepositoryProfile`]: language, framework, manifests, entry points, port,
//! environment variables, external services, container descriptors, commands,
//! a resource estimate and a confidence score.
//!
//! Detection is shallow pattern matching. Nothing here executes or compiles
//! the code under inspection.

mod commands;
mod manifest;
mod signals;

pub use commands::{build_commands, start_commands, CommandContext};
pub use manifest::{parse_manifest, read_manifests, Manifest};
pub use signals::{Framework, Language, ServiceKind};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::ProfilerConfig;
use crate::error::ProfilingError;

/// Directories never descended into.
const VENDOR_DIRS: &[&str] = &["node_modules", "__pycache__", "venv"];

/// Extensions whose contents are read during the walk.
const READ_EXTENSIONS: &[&str] = &["py", "js", "ts", "java", "yml", "yaml"];

/// Compose descriptor names recognised at the checkout root.
const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yaml",
    "compose.yml",
];

/// Memory/CPU tiers used when bumping an estimate.
const RESOURCE_LADDER: [ResourceEstimate; 4] = [
    ResourceEstimate::new(256, 250),
    ResourceEstimate::new(512, 500),
    ResourceEstimate::new(1024, 1000),
    ResourceEstimate::new(2048, 2000),
];

/// Estimated runtime resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    /// Memory in MiB.
    pub memory_mib: u32,
    /// CPU in thousandths of a core.
    pub cpu_millis: u32,
}

impl ResourceEstimate {
    /// Create an estimate.
    #[must_use]
    pub const fn new(memory_mib: u32, cpu_millis: u32) -> Self {
        Self {
            memory_mib,
            cpu_millis,
        }
    }

    /// Memory in Kubernetes quantity notation (`512Mi`, `1Gi`).
    #[must_use]
    pub fn memory(&self) -> String {
        if self.memory_mib >= 1024 && self.memory_mib % 1024 == 0 {
            format!("{}Gi", self.memory_mib / 1024)
        } else {
            format!("{}Mi", self.memory_mib)
        }
    }

    /// CPU expressed in cores.
    #[must_use]
    pub fn cpu_cores(&self) -> f64 {
        f64::from(self.cpu_millis) / 1000.0
    }

    /// The next tier up the ladder, or `self` if already at the top.
    #[must_use]
    pub fn bumped(self) -> Self {
        RESOURCE_LADDER
            .iter()
            .copied()
            .find(|tier| tier.memory_mib > self.memory_mib)
            .unwrap_or(self)
    }
}

impl fmt::Display for ResourceEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} CPU", self.memory(), self.cpu_cores())
    }
}

/// Structured summary of a checked-out repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryProfile {
    /// Checkout that was profiled.
    pub checkout: PathBuf,
    /// Primary language.
    pub language: Language,
    /// Detected framework, if any signature matched.
    pub framework: Option<Framework>,
    /// Dependency manifests found at the root.
    pub manifests: Vec<Manifest>,
    /// Entry-point candidates, relative to the root.
    pub entry_points: Vec<String>,
    /// First listening port found in source.
    pub port: Option<u16>,
    /// Environment variable names read by the application.
    pub env_vars: BTreeSet<String>,
    /// External services the application needs.
    pub services: BTreeSet<ServiceKind>,
    /// Whether a `Dockerfile` sits at the root.
    pub has_dockerfile: bool,
    /// Whether a compose descriptor sits at the root.
    pub has_compose: bool,
    /// Commands that install dependencies and build.
    pub build_commands: Vec<String>,
    /// Commands that launch the application.
    pub start_commands: Vec<String>,
    /// Estimated runtime resources.
    pub resources: ResourceEstimate,
    /// How much of the profile is backed by real signals, in `[0, 1]`.
    pub confidence: f64,
}

impl RepositoryProfile {
    /// Number of required external services.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Whether any manifest was understood.
    #[must_use]
    pub fn any_manifest_parsed(&self) -> bool {
        self.manifests.iter().any(|m| m.parsed)
    }
}

/// One file seen during the walk.
#[derive(Debug)]
struct ScannedFile {
    rel_path: String,
    name: String,
    ext: Option<String>,
    content: Option<String>,
}

impl ScannedFile {
    fn has_ext(&self, exts: &[&str]) -> bool {
        self.ext.as_deref().is_some_and(|e| exts.contains(&e))
    }
}

/// Scans checkouts into [`RepositoryProfile`]s.
#[derive(Debug, Clone, Default)]
pub struct RepositoryProfiler {
    config: ProfilerConfig,
}

impl RepositoryProfiler {
    /// Create a profiler with the given limits.
    #[must_use]
    pub const fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    /// Profile the checkout at `checkout`.
    ///
    /// Blocks on filesystem I/O. Fails only when the root itself cannot be
    /// listed; unreadable entries below it are skipped.
    pub fn profile(&self, checkout: &Path) -> Result<RepositoryProfile, ProfilingError> {
        std::fs::read_dir(checkout).map_err(|e| ProfilingError::new(checkout, e))?;

        let files = self.walk(checkout);
        debug!(checkout = %checkout.display(), files = files.len(), "walked checkout");

        let language = detect_language(&files);
        let framework = detect_framework(&files, language);
        let manifests = read_manifests(checkout, language);
        let entry_points = find_entry_points(checkout, &files, language);
        let port = files
            .iter()
            .filter(|f| f.has_ext(signals::PORT_SOURCE_EXTENSIONS))
            .filter_map(|f| f.content.as_deref())
            .find_map(signals::find_port);
        let env_vars = collect_env_vars(checkout, &files);

        let compose = read_compose(checkout);
        let services = detect_services(&manifests, compose.as_deref());
        let has_dockerfile = checkout.join("Dockerfile").is_file();
        let has_compose = compose.is_some();

        let ctx = CommandContext {
            language,
            framework,
            entry_points: &entry_points,
            manifests: &manifests,
            has_lockfile: checkout.join("package-lock.json").is_file(),
        };
        let build_commands = build_commands(&ctx);
        let start_commands = start_commands(&ctx);

        let resources = estimate_resources(language, framework, services.len());

        let mut profile = RepositoryProfile {
            checkout: checkout.to_path_buf(),
            language,
            framework,
            manifests,
            entry_points,
            port,
            env_vars,
            services,
            has_dockerfile,
            has_compose,
            build_commands,
            start_commands,
            resources,
            confidence: 0.0,
        };
        profile.confidence = confidence(&profile);

        info!(
            checkout = %checkout.display(),
            language = %profile.language,
            framework = ?profile.framework.map(|f| f.as_str()),
            port = ?profile.port,
            services = profile.services.len(),
            confidence = profile.confidence,
            "repository profiled"
        );

        Ok(profile)
    }

    fn walk(&self, root: &Path) -> Vec<ScannedFile> {
        let skip: HashSet<&str> = VENDOR_DIRS
            .iter()
            .copied()
            .chain(self.config.extra_skip_dirs.iter().map(String::as_str))
            .collect();

        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry, &skip))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.scan(root, &entry))
            .collect()
    }

    fn scan(&self, root: &Path, entry: &DirEntry) -> Option<ScannedFile> {
        let rel = entry.path().strip_prefix(root).ok()?;
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = entry.file_name().to_string_lossy().into_owned();
        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        let wants_content = ext.as_deref().is_some_and(|e| READ_EXTENSIONS.contains(&e));
        let small_enough = entry
            .metadata()
            .is_ok_and(|m| m.len() <= self.config.max_file_bytes);
        let content = (wants_content && small_enough)
            .then(|| std::fs::read(entry.path()).ok())
            .flatten()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

        Some(ScannedFile {
            rel_path,
            name,
            ext,
            content,
        })
    }
}

fn is_skipped_dir(entry: &DirEntry, skip: &HashSet<&str>) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || skip.contains(name.as_ref())
}

fn detect_language(files: &[ScannedFile]) -> Language {
    let mut counts: HashMap<Language, usize> = HashMap::new();
    for language in files
        .iter()
        .filter_map(|f| f.ext.as_deref())
        .filter_map(Language::from_extension)
    {
        *counts.entry(language).or_default() += 1;
    }

    let mut best = (Language::Unknown, 0usize);
    for language in Language::DETECTABLE {
        let count = counts.get(&language).copied().unwrap_or_default();
        if count > best.1 {
            best = (language, count);
        }
    }
    best.0
}

fn detect_framework(files: &[ScannedFile], language: Language) -> Option<Framework> {
    let contents: Vec<String> = files
        .iter()
        .filter(|f| f.has_ext(language.extensions()))
        .filter_map(|f| f.content.as_deref().map(str::to_lowercase))
        .collect();

    let mut best: Option<(Framework, usize)> = None;
    for &framework in language.frameworks() {
        let hits = framework
            .signatures()
            .iter()
            .map(|sig| sig.to_lowercase())
            .map(|sig| contents.iter().filter(|c| c.contains(&sig)).count())
            .sum::<usize>();
        if hits > best.map_or(0, |(_, n)| n) {
            best = Some((framework, hits));
        }
    }
    best.map(|(framework, _)| framework)
}

fn find_entry_points(root: &Path, files: &[ScannedFile], language: Language) -> Vec<String> {
    let mut entry_points: Vec<String> = language
        .entry_points()
        .iter()
        .filter(|name| root.join(name).is_file())
        .map(|name| (*name).to_owned())
        .collect();

    for file in files {
        if file.name.starts_with('.') || !file.name.to_lowercase().contains("main") {
            continue;
        }
        if !entry_points.contains(&file.rel_path) {
            entry_points.push(file.rel_path.clone());
        }
    }

    entry_points
}

fn collect_env_vars(root: &Path, files: &[ScannedFile]) -> BTreeSet<String> {
    let mut env_vars = BTreeSet::new();

    if let Ok(dotenv) = std::fs::read_to_string(root.join(".env")) {
        env_vars.extend(signals::parse_dotenv(&dotenv));
    }

    for content in files
        .iter()
        .filter(|f| f.has_ext(signals::ENV_SOURCE_EXTENSIONS))
        .filter_map(|f| f.content.as_deref())
    {
        env_vars.extend(signals::find_env_vars(content));
    }

    env_vars
}

fn read_compose(root: &Path) -> Option<String> {
    COMPOSE_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
        .map(|path| std::fs::read_to_string(path).unwrap_or_default())
}

fn detect_services(manifests: &[Manifest], compose: Option<&str>) -> BTreeSet<ServiceKind> {
    let dependency_text = manifests
        .iter()
        .flat_map(|m| m.packages.iter())
        .map(|p| p.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let compose = compose.map(str::to_lowercase);

    ServiceKind::ALL
        .into_iter()
        .filter(|kind| {
            kind.keywords().iter().any(|kw| dependency_text.contains(kw))
                || compose
                    .as_deref()
                    .is_some_and(|c| c.contains(kind.as_str()))
        })
        .collect()
}

fn estimate_resources(
    language: Language,
    framework: Option<Framework>,
    services: usize,
) -> ResourceEstimate {
    let base = match language {
        Language::Nodejs => ResourceEstimate::new(256, 250),
        Language::Java => ResourceEstimate::new(1024, 500),
        Language::Python | Language::Unknown => ResourceEstimate::new(512, 500),
    };

    let sized = match framework {
        Some(Framework::Django | Framework::Spring) => ResourceEstimate::new(1024, 1000),
        Some(Framework::Fastapi | Framework::Express) => ResourceEstimate::new(512, 500),
        _ => base,
    };

    if services > 2 {
        sized.bumped()
    } else {
        sized
    }
}

fn confidence(profile: &RepositoryProfile) -> f64 {
    // Hundredths, so a fully-signalled profile sums to exactly 1.0.
    let mut points: u32 = 0;
    if profile.language != Language::Unknown {
        points += 30;
    }
    if profile.framework.is_some() {
        points += 20;
    }
    if profile.any_manifest_parsed() {
        points += 20;
    }
    if !profile.entry_points.is_empty() {
        points += 15;
    }
    if profile.port.is_some() {
        points += 10;
    }
    if !profile.start_commands.is_empty() {
        points += 5;
    }
    f64::from(points.min(100)) / 100.0
}
