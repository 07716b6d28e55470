// Spanish answer templates
//
// One deterministic template per intent. Listing intents always render an
// explicit sentence when nothing matched.

use super::types::{CatalogStatistics, Intent, QueryResult, RepositoryPage};
use crate::db::RepositoryRecord;

/// Example questions offered when a question can't be answered
pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "¿Cuántos repositorios hay?",
    "¿Qué repositorios tiene facebook?",
    "¿Quién es el dueño del repositorio 'react'?",
    "¿Qué tecnologías usa el repositorio 'react'?",
    "repositorios que usan Python",
    "¿Cuántos repositorios usan Docker?",
    "repositorios no identificados",
    "últimos 5 repositorios analizados",
    "estadísticas del catálogo",
];

/// Render a query result for the intent that produced it
pub fn format_answer(intent: &Intent, result: &QueryResult) -> String {
    match (intent, result) {
        (Intent::CountAll, QueryResult::Count(n)) => {
            format!("Hay {} en el catálogo.", repositories(*n))
        }

        (Intent::CountByTechnology { technology }, QueryResult::Count(n)) => {
            let verb = if *n == 1 { "usa" } else { "usan" };
            format!("{} {} {}.", repositories(*n), verb, technology)
        }

        (Intent::ListByOwner { owner }, QueryResult::Repositories(page)) => {
            if page.is_empty() {
                return format!("No se encontraron repositorios para el propietario '{}'.", owner);
            }
            let header = format!(
                "El propietario '{}' tiene {}:",
                owner,
                repositories(page_count(page) as i64)
            );
            render_list(&header, page, |repo| with_technologies(&repo.repo_name, repo))
        }

        (Intent::OwnerOfRepo { repo_name }, QueryResult::Repositories(page)) => {
            match page.items.as_slice() {
                [] => not_found(repo_name),
                [repo] => format!(
                    "El repositorio '{}' pertenece a {}.",
                    repo.repo_name, repo.owner_name
                ),
                _ => {
                    let header = format!(
                        "Hay {} llamados '{}':",
                        repositories(page_count(page) as i64),
                        repo_name
                    );
                    render_list(&header, page, |repo| {
                        format!("{} (propietario: {})", repo.full_name(), repo.owner_name)
                    })
                }
            }
        }

        (Intent::TechnologiesOfRepo { repo_name }, QueryResult::Repositories(page)) => {
            match page.items.as_slice() {
                [] => not_found(repo_name),
                [repo] => {
                    let techs = technology_list(repo);
                    if techs.is_empty() {
                        format!(
                            "No se identificaron tecnologías en el repositorio '{}'.",
                            repo.full_name()
                        )
                    } else {
                        format!("El repositorio '{}' usa: {}.", repo.full_name(), techs)
                    }
                }
                _ => {
                    let header = format!(
                        "Hay {} llamados '{}':",
                        repositories(page_count(page) as i64),
                        repo_name
                    );
                    render_list(&header, page, |repo| with_technologies(&repo.full_name(), repo))
                }
            }
        }

        (Intent::ListByTechnology { technology }, QueryResult::Repositories(page)) => {
            if page.is_empty() {
                return format!("No se encontraron repositorios que usen {}.", technology);
            }
            let count = page_count(page) as i64;
            let verb = if count == 1 { "usa" } else { "usan" };
            let header = format!("{} {} {}:", repositories(count), verb, technology);
            render_list(&header, page, RepositoryRecord::full_name)
        }

        (Intent::ListUnidentified, QueryResult::Repositories(page)) => {
            if page.is_empty() {
                return "Todos los repositorios del catálogo tienen tecnologías identificadas."
                    .to_string();
            }
            let header = format!(
                "Hay {} sin tecnologías identificadas:",
                repositories(page_count(page) as i64)
            );
            render_list(&header, page, RepositoryRecord::full_name)
        }

        (Intent::ListRecent { .. }, QueryResult::Repositories(page)) => {
            if page.is_empty() {
                return "Todavía no hay repositorios analizados.".to_string();
            }
            let header = "Últimos repositorios analizados:";
            render_list(header, page, |repo| with_technologies(&repo.full_name(), repo))
        }

        (_, QueryResult::Statistics(stats)) => format_statistics(stats),

        // Intent and result disagree; render the result plainly
        (_, QueryResult::Count(n)) => format!("Resultado: {}.", n),
        (_, QueryResult::Repositories(page)) => {
            if page.is_empty() {
                "No se encontraron repositorios.".to_string()
            } else {
                render_list("Repositorios:", page, RepositoryRecord::full_name)
            }
        }
    }
}

fn format_statistics(stats: &CatalogStatistics) -> String {
    let mut text = String::from("Resumen del catálogo:\n");
    text.push_str(&format!("  Repositorios: {}\n", stats.total));
    text.push_str(&format!(
        "  Identificados: {} ({:.1}%)\n",
        stats.identified,
        stats.identification_rate()
    ));
    text.push_str(&format!("  Sin identificar: {}\n", stats.unidentified()));

    text.push_str(&format!(
        "  Tecnologías más usadas: {}\n",
        ranking(&stats.top_technologies, "ninguna")
    ));
    text.push_str(&format!(
        "  Propietarios más activos: {}",
        ranking(&stats.top_owners, "ninguno")
    ));

    text
}

/// "Node.js (2), Go (1)"
fn ranking(entries: &[(String, i64)], none: &str) -> String {
    if entries.is_empty() {
        return none.to_string();
    }
    entries
        .iter()
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// "1 repositorio" / "3 repositorios"
fn repositories(n: i64) -> String {
    if n == 1 {
        "1 repositorio".to_string()
    } else {
        format!("{} repositorios", n)
    }
}

fn page_count(page: &RepositoryPage) -> usize {
    page.total.unwrap_or(page.items.len())
}

fn not_found(repo_name: &str) -> String {
    format!("No se encontró el repositorio '{}' en el catálogo.", repo_name)
}

fn technology_list(repo: &RepositoryRecord) -> String {
    repo.technologies()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_technologies(label: &str, repo: &RepositoryRecord) -> String {
    let techs = technology_list(repo);
    if techs.is_empty() {
        format!("{} [sin identificar]", label)
    } else {
        format!("{} [{}]", label, techs)
    }
}

/// Numbered list, capped at the page limit, with an overflow line
fn render_list<F>(header: &str, page: &RepositoryPage, label: F) -> String
where
    F: Fn(&RepositoryRecord) -> String,
{
    let mut text = header.to_string();
    for (i, repo) in page.visible().iter().enumerate() {
        text.push_str(&format!("\n  {}. {}", i + 1, label(repo)));
    }

    if page.has_more() {
        match page.total {
            Some(total) => text.push_str(&format!(
                "\n  ... y {} más (mostrando {} de {})",
                total - page.visible().len(),
                page.visible().len(),
                total
            )),
            None => text.push_str("\n  ... y más"),
        }
    }

    text
}

fn suggestions() -> String {
    SUGGESTED_QUESTIONS
        .iter()
        .map(|q| format!("  - {}", q))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer for questions nothing could answer
pub fn cannot_answer(question: &str) -> String {
    format!(
        "No puedo responder \"{}\" con los datos del catálogo. Prueba con preguntas como:\n{}",
        question.trim(),
        suggestions()
    )
}

/// Answer when the catalog store could not be read
pub fn data_unavailable() -> String {
    "Los datos del catálogo no están disponibles en este momento. Inténtalo de nuevo más tarde."
        .to_string()
}

pub fn empty_question() -> String {
    format!(
        "Escribe una pregunta sobre el catálogo. Por ejemplo:\n{}",
        suggestions()
    )
}

/// Answer for an open question when no completion backend can be reached
pub fn open_question_unavailable() -> String {
    "No se puede procesar la pregunta sin un servicio de completado disponible. \
     Configura GEMINI_API_KEY para habilitarlo."
        .to_string()
}

/// Answer when results handed in for summarizing are not JSON
pub fn invalid_results() -> String {
    "Formato de resultados inválido. Debe ser JSON.".to_string()
}

pub fn results_summary_unavailable() -> String {
    "No se pueden resumir los resultados sin un servicio de completado disponible. \
     Configura GEMINI_API_KEY para habilitarlo."
        .to_string()
}
