/// Repository reports: completeness score and technical summary
///
/// Both work on a stored catalog row. The summary asks the completion
/// backend when one is configured and falls back to a deterministic text.

use crate::backend::{complete_with_timeout, CompletionBackend};
use crate::db::{RepoStatus, RepositoryRecord};
use std::time::Duration;

/// Audit-log tag for generated summaries
pub const SUMMARY_QUERY_TYPE: &str = "repository_summary";

/// Placeholder the URL parser never produces but older rows may carry
const UNKNOWN: &str = "unknown";

// Points per check; they add up to MAX_SCORE
const URL_POINTS: u32 = 20;
const OWNER_POINTS: u32 = 15;
const NAME_POINTS: u32 = 15;
const TECHNOLOGY_POINTS: u32 = 30;
const STATUS_POINTS: u32 = 20;

pub const MAX_SCORE: u32 = 100;

/// How complete a catalog entry is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    pub score: u32,
    pub max_score: u32,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl CompletenessReport {
    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            self.score as f64 * 100.0 / self.max_score as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.score == self.max_score
    }
}

fn known(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != UNKNOWN
}

/// Score a repository entry from 0 to 100
pub fn validate_completeness(repo: &RepositoryRecord) -> CompletenessReport {
    let mut report = CompletenessReport {
        score: 0,
        max_score: MAX_SCORE,
        issues: Vec::new(),
        recommendations: Vec::new(),
    };

    if repo.url.trim().is_empty() {
        report.issues.push("URL no especificada".to_string());
    } else {
        report.score += URL_POINTS;
    }

    if known(&repo.owner_name) {
        report.score += OWNER_POINTS;
    } else {
        report.issues.push("Propietario no identificado".to_string());
        report
            .recommendations
            .push("Verificar que la URL del repositorio sea válida".to_string());
    }

    if known(&repo.repo_name) {
        report.score += NAME_POINTS;
    } else {
        report
            .issues
            .push("Nombre del repositorio no identificado".to_string());
    }

    if repo.technologies().is_empty() {
        report
            .issues
            .push("No se identificaron tecnologías".to_string());
        report.recommendations.push(
            "Añadir archivos de configuración estándar (package.json, requirements.txt, etc.)"
                .to_string(),
        );
    } else {
        report.score += TECHNOLOGY_POINTS;
    }

    if repo.status() == RepoStatus::Analyzed {
        report.score += STATUS_POINTS;
    } else {
        report
            .issues
            .push(format!("Estado del análisis: {}", repo.status));
    }

    report
}

/// A repository summary and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositorySummary {
    /// Written by the completion backend
    Generated(String),
    /// Deterministic text, used without a backend or when it fails
    Basic(String),
}

impl RepositorySummary {
    pub fn text(&self) -> &str {
        match self {
            RepositorySummary::Generated(text) | RepositorySummary::Basic(text) => text,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, RepositorySummary::Generated(_))
    }
}

fn technology_line(repo: &RepositoryRecord) -> Option<String> {
    let techs: Vec<String> = repo.technologies().into_iter().collect();
    if techs.is_empty() {
        None
    } else {
        Some(techs.join(", "))
    }
}

/// Summary built from the stored row alone
pub fn basic_summary(repo: &RepositoryRecord) -> String {
    let count = repo.technologies().len();
    let techs = technology_line(repo);

    let mut text = format!(
        "RESUMEN DEL REPOSITORIO\n\n\
         URL: {}\n\
         Propietario: {}\n\
         Nombre: {}\n\
         Estado: {}\n\n\
         TECNOLOGÍAS IDENTIFICADAS:\n{}\n\n\
         ANÁLISIS BÁSICO:\n\
         - Repositorio {}\n\
         - {} tecnologías detectadas\n\
         - Estado del análisis: {}",
        repo.url,
        repo.owner_name,
        repo.repo_name,
        repo.status,
        techs
            .as_deref()
            .unwrap_or("No se identificaron tecnologías"),
        if repo.is_identified {
            "identificado"
        } else {
            "no identificado"
        },
        count,
        repo.status
    );

    if techs.is_none() {
        text.push_str(
            "\n- Se recomienda revisar la estructura del proyecto y añadir archivos de \
             configuración apropiados",
        );
    }

    if let Some(explanation) = repo.ai_explanation.as_deref().map(str::trim) {
        if !explanation.is_empty() {
            text.push_str(&format!("\n\nEXPLICACIÓN:\n{}", explanation));
        }
    }

    text
}

fn summary_prompt(repo: &RepositoryRecord) -> String {
    format!(
        "Genera en español un resumen técnico breve del siguiente repositorio:\n\n\
         URL: {}\n\
         Tecnologías identificadas: {}\n\
         Estado: {}\n\
         Propietario: {}\n\n\
         Incluye:\n\
         1. Stack tecnológico utilizado\n\
         2. Posible propósito del proyecto\n\
         3. Nivel de madurez del proyecto\n\
         4. Recomendaciones de buenas prácticas",
        repo.url,
        technology_line(repo).unwrap_or_else(|| "No identificadas".to_string()),
        repo.status,
        repo.owner_name
    )
}

/// Technical summary of a stored repository
pub async fn summarize_repository(
    repo: &RepositoryRecord,
    backend: &dyn CompletionBackend,
    timeout: Duration,
) -> RepositorySummary {
    if !backend.is_available() {
        return RepositorySummary::Basic(basic_summary(repo));
    }

    match complete_with_timeout(backend, &summary_prompt(repo), timeout).await {
        Ok(text) => RepositorySummary::Generated(text),
        Err(e) => {
            log::warn!("Falling back to basic summary for {}: {}", repo.url, e);
            RepositorySummary::Basic(basic_summary(repo))
        }
    }
}
