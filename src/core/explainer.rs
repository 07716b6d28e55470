/// Explanations for repositories with no detected technology
///
/// A deterministic Spanish report is always available. When a completion
/// backend is configured it is asked for a better one, and the report is
/// the fallback.

use super::technology::RepositoryListing;
use crate::backend::{complete_with_timeout, CompletionBackend};
use std::collections::BTreeSet;
use std::time::Duration;

/// Extension -> hint for what the repository probably is
const EXTENSION_HINTS: &[(&str, &str)] = &[
    ("py", "Python (considere añadir requirements.txt)"),
    ("js", "JavaScript (considere añadir package.json)"),
    ("ts", "TypeScript (considere añadir package.json y tsconfig.json)"),
    ("java", "Java (considere añadir pom.xml o build.gradle)"),
    ("kt", "Kotlin (considere añadir build.gradle)"),
    ("php", "PHP (considere añadir composer.json)"),
    ("rb", "Ruby (considere añadir Gemfile)"),
    ("go", "Go (considere añadir go.mod)"),
    ("rs", "Rust (considere añadir Cargo.toml)"),
    ("cs", "C# (considere añadir .csproj o .sln)"),
    ("cpp", "C++ (considere añadir CMakeLists.txt)"),
    ("c", "C (considere añadir Makefile)"),
    ("dart", "Dart/Flutter (considere añadir pubspec.yaml)"),
    ("swift", "Swift (considere añadir Package.swift)"),
    ("scala", "Scala (considere añadir build.sbt)"),
];

/// Shape of a repository, ignoring hidden files and directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryProfile {
    pub file_count: usize,
    pub dir_count: usize,
    pub extensions: BTreeSet<String>,
}

impl RepositoryProfile {
    pub fn from_listing(listing: &RepositoryListing) -> Self {
        let visible = |path: &str| !path.split('/').any(|segment| segment.starts_with('.'));

        let mut profile = Self::default();
        for file in listing.files.iter().filter(|f| visible(f)) {
            profile.file_count += 1;
            let name = file.rsplit('/').next().unwrap_or(file);
            if let Some((_, ext)) = name.rsplit_once('.') {
                if !ext.is_empty() {
                    profile.extensions.insert(ext.to_lowercase());
                }
            }
        }
        profile.dir_count = listing.dirs.iter().filter(|d| visible(d)).count();
        profile
    }

    /// Hints for extensions that suggest a known technology
    pub fn hints(&self) -> Vec<&'static str> {
        EXTENSION_HINTS
            .iter()
            .filter(|(ext, _)| self.extensions.contains(*ext))
            .map(|(_, hint)| *hint)
            .collect()
    }
}

/// Deterministic report for an unidentified repository
pub fn basic_explanation(url: &str, profile: &RepositoryProfile) -> String {
    let extensions = if profile.extensions.is_empty() {
        "No se encontraron extensiones específicas".to_string()
    } else {
        profile
            .extensions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut text = format!(
        "ANÁLISIS DEL REPOSITORIO NO IDENTIFICADO\n\n\
         Repositorio: {}\n\
         Archivos encontrados: {}\n\
         Directorios encontrados: {}\n\
         Extensiones detectadas: {}\n\n\
         POSIBLES RAZONES:\n\
         1. Contiene código en un lenguaje que los patrones actuales no cubren\n\
         2. Es un proyecto de configuración, documentación o datos\n\
         3. Los archivos de configuración están en ubicaciones no estándar\n\n\
         RECOMENDACIONES:\n\
         - Añadir el archivo de configuración estándar de su tecnología (package.json, requirements.txt, pom.xml...)\n\
         - Si es un tipo de proyecto nuevo, añadir su patrón a la tabla de tecnologías",
        url, profile.file_count, profile.dir_count, extensions
    );

    let hints = profile.hints();
    if !hints.is_empty() {
        text.push_str("\n\nTECNOLOGÍAS SUGERIDAS POR LAS EXTENSIONES:");
        for hint in hints {
            text.push_str(&format!("\n- {}", hint));
        }
    }

    text
}

fn explanation_prompt(url: &str, profile: &RepositoryProfile) -> String {
    let extensions: Vec<&str> = profile.extensions.iter().map(String::as_str).collect();
    format!(
        "Eres un experto en análisis de repositorios de software. No se pudo identificar \
         la tecnología del repositorio {} con los patrones de archivos conocidos.\n\
         Archivos: {}. Directorios: {}. Extensiones: {}.\n\
         Explica en español, en pocas líneas, qué tipo de proyecto puede ser y qué archivos \
         de configuración debería añadir el desarrollador para que se identifique.",
        url,
        profile.file_count,
        profile.dir_count,
        if extensions.is_empty() {
            "ninguna".to_string()
        } else {
            extensions.join(", ")
        }
    )
}

/// Explanation for an unidentified repository
///
/// Uses the completion backend when available, the basic report otherwise.
pub async fn explain_unidentified(
    url: &str,
    profile: &RepositoryProfile,
    backend: &dyn CompletionBackend,
    timeout: Duration,
) -> String {
    if !backend.is_available() {
        return basic_explanation(url, profile);
    }

    match complete_with_timeout(backend, &explanation_prompt(url, profile), timeout).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Falling back to basic explanation for {}: {}", url, e);
            basic_explanation(url, profile)
        }
    }
}
