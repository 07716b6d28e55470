/// Technology detection from repository files
///
/// The reference table is data: an ordered list of technologies, each with
/// file patterns and an optional extra requirement. The default table is
/// embedded from `database/technology_patterns.json`.

use crate::db::TechnologyPattern;
use crate::error::{CatalogError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const EMBEDDED_PATTERNS: &str = include_str!("../../database/technology_patterns.json");

/// Directories never descended into while listing a repository
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "target"];

/// Extra check a technology needs beyond a matching file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    /// Root package.json lists the package in dependencies or devDependencies
    PackageDependency(String),
    /// A file with this exact name exists somewhere
    FilePresent(String),
    /// A file with this extension exists somewhere
    ExtensionPresent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub requires: Option<Requirement>,
}

/// A compiled file pattern
#[derive(Debug, Clone)]
enum Matcher {
    /// Exact file name or relative path (suffix match on path segments)
    Exact(String),
    /// `*` wildcard, matched against the relative path
    Wildcard(Regex),
}

impl Matcher {
    fn compile(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(Matcher::Exact(pattern.to_string()));
        }

        let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
        let regex = Regex::new(&format!("^{}$", escaped.join(".*")))
            .map_err(|e| CatalogError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Matcher::Wildcard(regex))
    }

    fn matches(&self, relative_path: &str) -> bool {
        match self {
            Matcher::Exact(name) => {
                relative_path == name || relative_path.ends_with(&format!("/{}", name))
            }
            Matcher::Wildcard(regex) => regex.is_match(relative_path),
        }
    }
}

/// Files and directories of a repository, as '/'-separated relative paths
#[derive(Debug, Clone, Default)]
pub struct RepositoryListing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

impl RepositoryListing {
    /// Walk a directory tree
    ///
    /// Hidden directories and dependency/build output directories are listed
    /// but not descended into.
    pub fn scan<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut listing = Self::default();
        listing.walk(root.as_ref(), "")?;
        listing.files.sort();
        listing.dirs.sort();
        Ok(listing)
    }

    fn walk(&mut self, dir: &Path, prefix: &str) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let Some(name) = entry.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            let relative = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            if file_type.is_dir() {
                self.dirs.push(relative.clone());
                if !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_str()) {
                    self.walk(&entry.path(), &relative)?;
                }
            } else if file_type.is_file() {
                self.files.push(relative);
            }
        }
        Ok(())
    }

    /// Every listed path, directories included
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .chain(self.dirs.iter())
            .map(String::as_str)
    }

    pub fn has_file_named(&self, file_name: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.rsplit('/').next() == Some(file_name))
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        let suffix = format!(".{}", extension.to_lowercase());
        self.files.iter().any(|f| f.to_lowercase().ends_with(&suffix))
    }
}

/// Ordered technology reference table
#[derive(Debug, Clone)]
pub struct TechnologyTable {
    definitions: Vec<TechnologyDefinition>,
    matchers: Vec<Vec<Matcher>>,
}

impl TechnologyTable {
    /// The table shipped with the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_PATTERNS)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!(
                "cannot read patterns file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// A file when given, the embedded table otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                log::info!("Loading technology patterns from {}", path.display());
                Self::from_file(path)
            }
            None => Self::embedded(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<TechnologyDefinition> = serde_json::from_str(json)?;
        Self::from_definitions(definitions)
    }

    pub fn from_definitions(definitions: Vec<TechnologyDefinition>) -> Result<Self> {
        let matchers = definitions
            .iter()
            .map(|def| {
                def.patterns
                    .iter()
                    .map(|p| Matcher::compile(p))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            definitions,
            matchers,
        })
    }

    pub fn definitions(&self) -> &[TechnologyDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Canonical spelling of a technology name, matched exactly ignoring case
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        let name = name.trim().to_lowercase();
        self.definitions
            .iter()
            .find(|def| def.name.to_lowercase() == name)
            .map(|def| def.name.as_str())
    }

    /// One row per (technology, pattern), for the `technology_patterns` table
    pub fn flatten(&self) -> Vec<TechnologyPattern> {
        self.definitions
            .iter()
            .flat_map(|def| {
                def.patterns.iter().map(move |pattern| TechnologyPattern {
                    technology_name: def.name.clone(),
                    file_pattern: pattern.clone(),
                    description: def.description.clone(),
                })
            })
            .collect()
    }

    /// Technologies present in a directory, in table order
    pub fn detect<P: AsRef<Path>>(&self, root: P) -> Result<Vec<String>> {
        let root = root.as_ref();
        let listing = RepositoryListing::scan(root)?;
        Ok(self.detect_in_listing(root, &listing))
    }

    pub fn detect_in_listing(&self, root: &Path, listing: &RepositoryListing) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        for (def, matchers) in self.definitions.iter().zip(&self.matchers) {
            let matched = matchers
                .iter()
                .any(|m| listing.entries().any(|entry| m.matches(entry)));
            if !matched || found.contains(&def.name) {
                continue;
            }

            let satisfied = match &def.requires {
                None => true,
                Some(requirement) => Self::check_requirement(requirement, root, listing),
            };

            if satisfied {
                found.push(def.name.clone());
            } else {
                log::debug!("{} files found but requirement not met", def.name);
            }
        }

        log::info!("Identified technologies: {:?}", found);
        found
    }

    fn check_requirement(requirement: &Requirement, root: &Path, listing: &RepositoryListing) -> bool {
        match requirement {
            Requirement::PackageDependency(package) => has_package_dependency(root, package),
            Requirement::FilePresent(file_name) => listing.has_file_named(file_name),
            Requirement::ExtensionPresent(extension) => listing.has_extension(extension),
        }
    }
}

/// Whether the root package.json depends on `package`
///
/// A missing or unparseable package.json counts as no dependency.
fn has_package_dependency(root: &Path, package: &str) -> bool {
    let manifest = root.join("package.json");
    let content = match fs::read_to_string(&manifest) {
        Ok(content) => content,
        Err(_) => return false,
    };

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Ignoring unparseable {}: {}", manifest.display(), e);
            return false;
        }
    };

    ["dependencies", "devDependencies"]
        .iter()
        .any(|section| value[*section].get(package).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_embedded_table_loads() {
        let table = TechnologyTable::embedded().unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.canonical_name("python"), Some("Python"));
        assert_eq!(table.canonical_name("NODE.JS"), Some("Node.js"));
        assert_eq!(table.canonical_name("c#"), Some("C#"));
        // No aliases
        assert_eq!(table.canonical_name("node"), None);
    }

    #[test]
    fn test_flatten() {
        let table = TechnologyTable::from_json(
            r#"[{"name": "Go", "description": "Go modules", "patterns": ["go.mod", "go.sum"]}]"#,
        )
        .unwrap();
        let rows = table.flatten();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].technology_name, "Go");
        assert_eq!(rows[1].file_pattern, "go.sum");
        assert_eq!(rows[1].description.as_deref(), Some("Go modules"));
    }

    #[test]
    fn test_requirement_parsing() {
        let table = TechnologyTable::embedded().unwrap();
        let react = table
            .definitions()
            .iter()
            .find(|d| d.name == "React")
            .unwrap();
        assert_eq!(
            react.requires,
            Some(Requirement::PackageDependency("react".to_string()))
        );
    }

    #[test]
    fn test_listing_skips_hidden_and_vendor_dirs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main.py", "");
        write(temp.path(), ".git/HEAD", "");
        write(temp.path(), "node_modules/left-pad/package.json", "{}");

        let listing = RepositoryListing::scan(temp.path()).unwrap();
        assert_eq!(listing.files, vec!["src/main.py".to_string()]);
        assert!(listing.dirs.contains(&"node_modules".to_string()));
        assert!(listing.dirs.contains(&".git".to_string()));
    }

    #[test]
    fn test_detect_node_and_react() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "package.json",
            r#"{"dependencies": {"react": "^18.0.0"}}"#,
        );
        write(temp.path(), "tsconfig.json", "{}");
        write(temp.path(), "Dockerfile", "FROM node");

        let table = TechnologyTable::embedded().unwrap();
        let found = table.detect(temp.path()).unwrap();
        assert!(found.contains(&"Node.js".to_string()));
        assert!(found.contains(&"React".to_string()));
        assert!(found.contains(&"TypeScript".to_string()));
        assert!(found.contains(&"Docker".to_string()));
        assert!(!found.contains(&"Python".to_string()));
    }

    #[test]
    fn test_react_requires_dependency() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", r#"{"devDependencies": {"jest": "29"}}"#);

        let found = TechnologyTable::embedded().unwrap().detect(temp.path()).unwrap();
        assert_eq!(found, vec!["Node.js".to_string()]);
    }

    #[test]
    fn test_wildcards_and_extension_requirement() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "infra/main.tf", "");
        write(temp.path(), "App/App.csproj", "");

        let table = TechnologyTable::embedded().unwrap();
        let found = table.detect(temp.path()).unwrap();
        assert!(found.contains(&"Terraform".to_string()));
        // A project file without C# sources is not C#
        assert!(!found.contains(&"C#".to_string()));

        write(temp.path(), "App/Program.cs", "");
        let found = table.detect(temp.path()).unwrap();
        assert!(found.contains(&"C#".to_string()));
    }

    #[test]
    fn test_android_requires_manifest() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "build.gradle", "");
        let table = TechnologyTable::embedded().unwrap();
        let found = table.detect(temp.path()).unwrap();
        assert!(found.contains(&"Java".to_string()));
        assert!(!found.contains(&"Android".to_string()));

        write(temp.path(), "app/src/main/AndroidManifest.xml", "<manifest/>");
        let found = table.detect(temp.path()).unwrap();
        assert!(found.contains(&"Android".to_string()));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let found = TechnologyTable::embedded().unwrap().detect(temp.path()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(TechnologyTable::from_json("{not json").is_err());
    }
}
