/// Intent classification for catalog questions
///
/// Questions are matched against an ordered list of Spanish and English
/// templates. The first template that matches (and yields its entity) wins,
/// so more specific templates come before general ones.

use super::cache::normalize_question;
use super::types::{Intent, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use regex::{Captures, Regex};

/// Which intent a template produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateKind {
    OwnerOfRepo,
    TechnologiesOfRepo,
    ListUnidentified,
    CountByTechnology,
    ListByTechnology,
    ListRecent,
    CountAll,
    Statistics,
    ListByOwner,
}

// Single-token entity (owner or repository name), optionally quoted
const NAME: &str = r#"["']?(?P<entity>[^\s?¿!¡"']+)"#;

// Free-form entity (technology names may contain spaces)
const PHRASE: &str = r"(?P<entity>[^?¿!¡]+)";

const LIMIT: &str = r"(?P<limit>\d\S*|uno|una|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez|one|two|three|four|five|six|seven|eight|nine|ten)";

/// Ordered templates. `{name}`, `{phrase}` and `{limit}` expand to the
/// capture groups above.
const TEMPLATES: &[(TemplateKind, &str)] = &[
    // Who owns a repository
    (
        TemplateKind::OwnerOfRepo,
        r"\b(?:due[ñn]o|propietario|owner)\s+(?:de|del|of)\s+(?:el\s+|la\s+|the\s+)?(?:repositorio\s+|repo\s+|proyecto\s+|repository\s+|project\s+)?{name}",
    ),
    (
        TemplateKind::OwnerOfRepo,
        r"\bqui[eé]n\s+(?:tiene|posee|cre[oó]|mantiene)\s+(?:el\s+)?(?:repositorio|repo|proyecto)\s+{name}",
    ),
    (
        TemplateKind::OwnerOfRepo,
        r"\bde\s+qui[eé]n\s+es\s+(?:el\s+)?(?:repositorio\s+|repo\s+|proyecto\s+)?{name}",
    ),
    (
        TemplateKind::OwnerOfRepo,
        r"\bwho\s+(?:owns|maintains|created)\s+(?:the\s+)?(?:repository\s+|repo\s+|project\s+)?{name}",
    ),
    (
        TemplateKind::OwnerOfRepo,
        r"\bwhose\s+(?:repository|repo|project)\s+is\s+{name}",
    ),
    // Technologies of one repository. "usa en" must come before the plain
    // "usa" form, which would otherwise take "en" as the name.
    (
        TemplateKind::TechnologiesOfRepo,
        r"\bqu[eé]\s+(?:tecnolog[ií]as?|lenguajes?|stack)\s+(?:se\s+usan|se\s+utilizan|se\s+emplean|usa|utiliza|emplea)\s+en\s+(?:el\s+)?(?:repositorio\s+|repo\s+|proyecto\s+)?{name}",
    ),
    (
        TemplateKind::TechnologiesOfRepo,
        r"\bqu[eé]\s+(?:tecnolog[ií]as?|lenguajes?|stack)\s+(?:usa|utiliza|tiene|emplea)\s+(?:el\s+)?(?:repositorio\s+|repo\s+|proyecto\s+)?{name}",
    ),
    (
        TemplateKind::TechnologiesOfRepo,
        r"\btecnolog[ií]as?\s+(?:de|del)\s+(?:el\s+)?(?:repositorio\s+|repo\s+|proyecto\s+)?{name}",
    ),
    (
        TemplateKind::TechnologiesOfRepo,
        r#"\bwhat\s+(?:technolog(?:y|ies)|languages?|stack)\s+does\s+(?:the\s+)?(?:repository\s+|repo\s+|project\s+)?{name}["']?\s+use\b"#,
    ),
    (
        TemplateKind::TechnologiesOfRepo,
        r"\b(?:technolog(?:y|ies)|tech\s+stack|stack)\s+(?:of|for|used\s+by|used\s+in)\s+(?:the\s+)?(?:repository\s+|repo\s+|project\s+)?{name}",
    ),
    // Repositories without detected technologies
    (TemplateKind::ListUnidentified, r"\bno\s+identificad[oa]s?\b"),
    (
        TemplateKind::ListUnidentified,
        r"\bsin\s+(?:identificar|tecnolog[ií]as?)\b",
    ),
    (TemplateKind::ListUnidentified, r"\bunidentified\b"),
    (TemplateKind::ListUnidentified, r"\bnot\s+identified\b"),
    (
        TemplateKind::ListUnidentified,
        r"\b(?:without|no)\s+(?:detected\s+)?technolog(?:y|ies)\b",
    ),
    // Count by technology
    (
        TemplateKind::CountByTechnology,
        r"\bcu[aá]nt[oa]s\s+(?:repositorios|repos|proyectos)\s+(?:usan|utilizan|tienen|emplean|con)\s+{phrase}",
    ),
    (
        TemplateKind::CountByTechnology,
        r"\bhow\s+many\s+(?:repositories\s+|repos\s+|projects\s+)?(?:use|uses|using|with|are\s+using)\s+{phrase}",
    ),
    // List by technology
    (
        TemplateKind::ListByTechnology,
        r"\b(?:repositorios|repos|proyectos)\s+(?:que\s+)?(?:usan|utilizan|tienen|emplean|con|escritos\s+en|hechos\s+con|desarrollados\s+(?:en|con))\s+{phrase}",
    ),
    (
        TemplateKind::ListByTechnology,
        r"\b(?:repositories|repos|projects)\s+(?:that\s+|which\s+)?(?:use|uses|using|with|built\s+with|written\s+in)\s+{phrase}",
    ),
    // Recently analyzed
    (
        TemplateKind::ListRecent,
        r"\b(?:[uú]ltim[oa]s|recientes)\s+(?:{limit}\s+)?(?:repositorios|repos|proyectos)\b",
    ),
    (
        TemplateKind::ListRecent,
        r"\b{limit}\s+(?:repositorios|repos|proyectos)\s+(?:analizados\s+)?(?:m[aá]s\s+)?recientes\b",
    ),
    (
        TemplateKind::ListRecent,
        r"\b(?:repositorios|repos|proyectos)\s+(?:analizados\s+)?(?:m[aá]s\s+)?recientes\b",
    ),
    (
        TemplateKind::ListRecent,
        r"\b(?:repositorios|repos|proyectos)\s+analizados\s+(?:recientemente|[uú]ltimamente)\b",
    ),
    (
        TemplateKind::ListRecent,
        r"\b(?:latest|recent|last|newest)\s+(?:{limit}\s+)?(?:analy[sz]ed\s+)?(?:repositories|repos|projects)\b",
    ),
    (TemplateKind::ListRecent, r"\brecently\s+analy[sz]ed\b"),
    // Count everything
    (
        TemplateKind::CountAll,
        r"\bcu[aá]nt[oa]s\s+(?:repositorios|repos|proyectos)\b",
    ),
    (
        TemplateKind::CountAll,
        r"\b(?:total|n[uú]mero)\s+de\s+(?:repositorios|repos|proyectos)\b",
    ),
    (
        TemplateKind::CountAll,
        r"\bhow\s+many\s+(?:repositories|repos|projects)\b",
    ),
    (
        TemplateKind::CountAll,
        r"\b(?:count|total|number)\s+(?:of\s+)?(?:all\s+)?(?:the\s+)?(?:repositories|repos|projects)\b",
    ),
    // Catalog overview
    (
        TemplateKind::Statistics,
        r"\b(?:estad[ií]sticas?|resumen|stats|statistics|summary|overview)\b",
    ),
    // List by owner
    (
        TemplateKind::ListByOwner,
        r"\bqu[eé]\s+(?:repositorios|repos|proyectos)\s+(?:tiene|posee|mantiene)\s+(?:el\s+usuario\s+|la\s+organizaci[oó]n\s+|el\s+propietario\s+)?{name}",
    ),
    (
        TemplateKind::ListByOwner,
        r"\b(?:repositorios|repos|proyectos)\s+(?:de|del)\s+(?:la\s+|el\s+)?(?:usuario\s+|propietario\s+|due[ñn]o\s+|organizaci[oó]n\s+)?{name}",
    ),
    (
        TemplateKind::ListByOwner,
        r"\b(?:repositorios|repos|proyectos)\s+(?:que\s+)?(?:pertenecen|pertenecientes)\s+a\s+(?:la\s+|el\s+)?(?:usuario\s+|organizaci[oó]n\s+)?{name}",
    ),
    (
        TemplateKind::ListByOwner,
        r"\b(?:repositories|repos|projects)\s+(?:owned\s+by|belonging\s+to|of|from|by)\s+(?:the\s+)?(?:user\s+|owner\s+|organization\s+|org\s+)?{name}",
    ),
    (
        TemplateKind::ListByOwner,
        r#"\bwhat\s+(?:repositories|repos|projects)\s+(?:does|do)\s+{name}["']?\s+(?:have|own)\b"#,
    ),
];

// Words that never belong to an entity
const LEADING_FILLERS: &[&str] = &[
    "el ",
    "la ",
    "los ",
    "las ",
    "the ",
    "lenguaje ",
    "tecnología ",
    "tecnologia ",
    "framework ",
    "language ",
    "technology ",
];

const TRAILING_FILLERS: &[&str] = &[
    " en el catálogo",
    " en el catalogo",
    " en total",
    " in the catalog",
    " in total",
    " actualmente",
    " currently",
    " por favor",
    " please",
    " hoy",
    " today",
];

const ENTITY_EDGE: &[char] = &['?', '¿', '!', '¡', '.', ',', ';', ':', '"', '\''];

struct Template {
    kind: TemplateKind,
    regex: Regex,
}

/// Maps question text to an [`Intent`]
pub struct IntentClassifier {
    templates: Vec<Template>,
}

impl IntentClassifier {
    /// Compile the template table
    pub fn new() -> Self {
        let templates = TEMPLATES
            .iter()
            .filter_map(|(kind, pattern)| {
                let pattern = pattern
                    .replace("{name}", NAME)
                    .replace("{phrase}", PHRASE)
                    .replace("{limit}", LIMIT);
                match Regex::new(&pattern) {
                    Ok(regex) => Some(Template { kind: *kind, regex }),
                    Err(e) => {
                        log::error!("Skipping invalid {:?} template: {}", kind, e);
                        None
                    }
                }
            })
            .collect();

        Self { templates }
    }

    /// Classify a question. Never fails; unmatched text is `Intent::Unknown`.
    pub fn classify(&self, question: &str) -> Intent {
        let text = normalize_question(question);
        if text.is_empty() {
            return Intent::Unknown;
        }

        for template in &self.templates {
            let Some(caps) = template.regex.captures(&text) else {
                continue;
            };

            if let Some(intent) = Self::build(template.kind, &caps) {
                log::debug!("Classified '{}' as {}", text, intent.tag());
                return intent;
            }
        }

        log::debug!("No template matched '{}'", text);
        Intent::Unknown
    }

    fn build(kind: TemplateKind, caps: &Captures) -> Option<Intent> {
        let entity = || caps.name("entity").and_then(|m| clean_entity(m.as_str()));

        let intent = match kind {
            TemplateKind::OwnerOfRepo => Intent::OwnerOfRepo {
                repo_name: entity()?,
            },
            TemplateKind::TechnologiesOfRepo => Intent::TechnologiesOfRepo {
                repo_name: entity()?,
            },
            TemplateKind::ListUnidentified => Intent::ListUnidentified,
            TemplateKind::CountByTechnology => Intent::CountByTechnology {
                technology: entity()?,
            },
            TemplateKind::ListByTechnology => Intent::ListByTechnology {
                technology: entity()?,
            },
            TemplateKind::ListRecent => Intent::ListRecent {
                limit: caps
                    .name("limit")
                    .map(|m| parse_limit(m.as_str()))
                    .unwrap_or(DEFAULT_RECENT_LIMIT),
            },
            TemplateKind::CountAll => Intent::CountAll,
            TemplateKind::Statistics => Intent::Statistics,
            TemplateKind::ListByOwner => Intent::ListByOwner { owner: entity()? },
        };

        Some(intent)
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim punctuation and filler words around a captured entity
fn clean_entity(raw: &str) -> Option<String> {
    let mut entity = raw
        .trim_matches(|c: char| c.is_whitespace() || ENTITY_EDGE.contains(&c))
        .to_lowercase();

    loop {
        let before = entity.len();
        for filler in LEADING_FILLERS {
            if let Some(rest) = entity.strip_prefix(filler) {
                entity = rest.trim_start().to_string();
            }
        }
        for filler in TRAILING_FILLERS {
            if let Some(rest) = entity.strip_suffix(filler) {
                entity = rest.trim_end().to_string();
            }
        }
        entity = entity
            .trim_matches(|c: char| c.is_whitespace() || ENTITY_EDGE.contains(&c))
            .to_string();
        if entity.len() == before {
            break;
        }
    }

    if entity.is_empty() {
        None
    } else {
        Some(entity)
    }
}

/// Parse the number of recent repositories asked for
///
/// Malformed or zero values fall back to the default; large values are capped.
fn parse_limit(raw: &str) -> usize {
    let parsed = match raw {
        "uno" | "una" | "one" => Some(1),
        "dos" | "two" => Some(2),
        "tres" | "three" => Some(3),
        "cuatro" | "four" => Some(4),
        "cinco" | "five" => Some(5),
        "seis" | "six" => Some(6),
        "siete" | "seven" => Some(7),
        "ocho" | "eight" => Some(8),
        "nueve" | "nine" => Some(9),
        "diez" | "ten" => Some(10),
        digits => digits.parse::<usize>().ok(),
    };

    match parsed {
        Some(0) | None => {
            log::debug!("Ignoring malformed limit '{}'", raw);
            DEFAULT_RECENT_LIMIT
        }
        Some(n) => n.min(MAX_RECENT_LIMIT),
    }
}
