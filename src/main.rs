// repo-cmdb - catalogs git repositories and answers questions about them
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use repo_cmdb_lib::{
    backend::{self, CompletionBackend},
    core::{
        read_url_list, summarize_repository, validate_completeness, validator::SUMMARY_QUERY_TYPE,
        CompletenessReport, Scanner, TechnologyTable,
    },
    db::RepositoryRecord,
    CatalogError, Config, Database, QueryEngine,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Repository CMDB: technology catalog with natural-language queries
#[derive(Parser, Debug)]
#[command(name = "repo-cmdb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite catalog (overrides CMDB_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log progress (info level unless RUST_LOG says otherwise)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one repository (URL or local directory)
    Scan {
        /// Repository URL or path
        url: String,
    },
    /// Analyze every repository listed in a file, one per line
    ScanBatch {
        /// File with URLs; blank lines and # comments are skipped
        file: PathBuf,
    },
    /// Ask a question about the catalog
    Query {
        /// Question, e.g. "¿Qué repositorios tiene facebook?"
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Ask the completion backend a free-form question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Extra context sent along with the question
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Summarize query results given as JSON
    Summarize {
        /// File with the results, or - for stdin
        file: PathBuf,
        /// Question the results answer
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Ask questions in a loop until quit/exit/salir
    Interactive,
    /// Show catalog statistics
    Stats,
    /// Summary and completeness score of a cataloged repository
    Summary {
        /// Repository URL as it was scanned
        url: String,
    },
    /// Export the catalog
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the technology patterns in use
    Patterns,
}

/// Owners listed by `stats`
const TOP_OWNERS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

/// Everything a handler might need, wired once at startup
struct App {
    config: Config,
    db: Arc<Database>,
    table: Arc<TechnologyTable>,
    backend: Arc<dyn CompletionBackend>,
    engine: QueryEngine,
    scanner: Scanner,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        // Library errors have a friendlier rendering
        match err.downcast_ref::<CatalogError>() {
            Some(e) => eprintln!("Error: {}", e.user_message()),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = build_app(cli.db).await?;

    let result = match cli.command {
        Command::Scan { url } => handle_scan(&app, &url).await,
        Command::ScanBatch { file } => handle_scan_batch(&app, &file).await,
        Command::Query { question } => handle_query(&app, &question.join(" ")).await,
        Command::Ask { question, context } => {
            handle_ask(&app, &question.join(" "), context.as_deref()).await
        }
        Command::Summarize { file, question } => {
            handle_summarize(&app, &file, question.as_deref()).await
        }
        Command::Interactive => handle_interactive(&app).await,
        Command::Stats => handle_stats(&app).await,
        Command::Summary { url } => handle_summary(&app, &url).await,
        Command::Export { format, output } => handle_export(&app, format, output).await,
        Command::Patterns => handle_patterns(&app).await,
    };

    app.db.close().await;
    result
}

async fn build_app(db_override: Option<PathBuf>) -> anyhow::Result<App> {
    let config = Config::from_env()?.with_db_path(db_override);
    log::info!("Using catalog at {}", config.db_path.display());

    let db = Arc::new(Database::new(&config.db_path).await?);

    let table = Arc::new(TechnologyTable::load(config.patterns_file.as_deref())?);
    // Keep the SQL mirror of the pattern table in sync with what we detect with
    db.replace_technology_patterns(&table.flatten()).await?;

    let backend = backend::from_config(&config);
    let engine = QueryEngine::from_config(&config, db.clone(), backend.clone(), table.clone());
    let scanner = Scanner::from_config(&config, db.clone(), table.clone(), backend.clone());

    Ok(App {
        config,
        db,
        table,
        backend,
        engine,
        scanner,
    })
}

async fn handle_scan(app: &App, url: &str) -> anyhow::Result<()> {
    println!("Analizando {}...", url);
    let repo = app.scanner.scan(url).await?;
    print_repository(&repo);
    Ok(())
}

async fn handle_scan_batch(app: &App, file: &Path) -> anyhow::Result<()> {
    let urls = read_url_list(file)?;
    if urls.is_empty() {
        println!("No hay URLs en {}", file.display());
        return Ok(());
    }

    println!("Analizando {} repositorios...", urls.len());
    let summary = app.scanner.scan_batch(&urls).await;

    println!("{}", "=".repeat(60));
    for item in &summary.items {
        match &item.outcome {
            Ok(repo) => {
                let techs = repo.technologies().into_iter().collect::<Vec<_>>();
                if techs.is_empty() {
                    println!("? {} (sin identificar, {})", repo.full_name(), repo.status);
                } else {
                    println!("✓ {} [{}]", repo.full_name(), techs.join(", "));
                }
            }
            Err(reason) => println!("✗ {}: {}", item.url, reason),
        }
    }
    println!("{}", "=".repeat(60));
    println!(
        "Total: {}  Analizados: {}  Identificados: {}  Fallidos: {}",
        summary.total(),
        summary.analyzed(),
        summary.identified(),
        summary.failed()
    );

    Ok(())
}

async fn handle_query(app: &App, question: &str) -> anyhow::Result<()> {
    println!("{}", app.engine.answer(question).await);
    Ok(())
}

async fn handle_ask(app: &App, question: &str, context: Option<&str>) -> anyhow::Result<()> {
    println!("{}", app.engine.ask_open_question(question, context).await);
    Ok(())
}

async fn handle_summarize(app: &App, file: &Path, question: Option<&str>) -> anyhow::Result<()> {
    let results = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading results from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("reading results from {}", file.display()))?
    };

    println!("{}", app.engine.summarize_results(&results, question).await);
    Ok(())
}

async fn handle_interactive(app: &App) -> anyhow::Result<()> {
    println!("Consultas sobre el catálogo. Escribe 'salir' para terminar.");
    println!("Ejemplos:");
    for example in app.engine.suggested_questions() {
        println!("  - {}", example);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        // EOF ends the session like 'salir' does
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "salir") {
            break;
        }

        println!("{}", app.engine.answer(line).await);
    }

    println!("¡Hasta luego!");
    Ok(())
}

async fn handle_stats(app: &App) -> anyhow::Result<()> {
    let stats = app.db.stats().await?;
    let counts = app.db.get_technology_counts().await?;
    let owners = app.db.get_owner_counts().await?;

    println!("\nEstadísticas del catálogo ({})", app.db.path().display());
    println!("{}", "=".repeat(60));
    println!("Repositorios:           {}", stats.total_repositories);
    println!("Con tecnología:         {}", stats.identified_repositories);
    println!("Tasa de identificación: {:.1}%", stats.identification_rate());
    println!("Patrones cargados:      {}", stats.total_patterns);
    println!("Consultas a la IA:      {}", stats.total_ai_queries);

    if !counts.is_empty() {
        println!("\nTecnologías:");
        for (tech, count) in &counts {
            println!("  {:<20} {}", tech, count);
        }
    }
    if !owners.is_empty() {
        println!("\nPropietarios más activos:");
        for (owner, count) in owners.iter().take(TOP_OWNERS) {
            println!("  {:<20} {}", owner, count);
        }
    }
    println!("{}", "=".repeat(60));

    let backend = if app.config.api_key.is_some() {
        app.config.model.as_str()
    } else {
        "desactivado"
    };
    log::info!(
        "Backend: {}, pool {} ({} idle)",
        backend,
        stats.pool_size,
        stats.idle_connections
    );

    Ok(())
}

async fn handle_summary(app: &App, url: &str) -> anyhow::Result<()> {
    let url = url.trim();
    let Some(repo) = app.db.get_repository_by_url(url).await? else {
        anyhow::bail!("Repositorio no encontrado en el catálogo: {}", url);
    };

    let timeout = app.config.backend_timeout;
    let summary = summarize_repository(&repo, app.backend.as_ref(), timeout).await;
    if summary.is_generated() {
        let asked = format!("Resumen de repositorio: {}", repo.url);
        if let Err(e) = app
            .db
            .save_ai_query(&asked, summary.text(), SUMMARY_QUERY_TYPE)
            .await
        {
            log::warn!("Failed to record repository summary: {}", e);
        }
    }

    println!("{}", "=".repeat(60));
    println!("{}", summary.text());
    println!("{}", "=".repeat(60));
    print!("{}", render_completeness(&validate_completeness(&repo)));
    println!("{}", "=".repeat(60));
    Ok(())
}

async fn handle_export(
    app: &App,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let repos = app.db.all_repositories(None).await?;

    let body = match format {
        ExportFormat::Json => export_json(&repos)?,
        ExportFormat::Csv => export_csv(&repos),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, body)
                .with_context(|| format!("writing export to {}", path.display()))?;
            println!("Exportados {} repositorios a {}", repos.len(), path.display());
        }
        None => print!("{}", body),
    }

    Ok(())
}

async fn handle_patterns(app: &App) -> anyhow::Result<()> {
    println!("\n{} tecnologías conocidas:", app.table.len());
    println!("{}", "=".repeat(60));
    for def in app.table.definitions() {
        println!("{}: {}", def.name, def.patterns.join(", "));
        if let Some(description) = &def.description {
            println!("    {}", description);
        }
    }
    println!("{}", "=".repeat(60));
    Ok(())
}

fn print_repository(repo: &RepositoryRecord) {
    println!("{}", "=".repeat(60));
    println!("Repositorio: {}", repo.full_name());
    println!("URL:         {}", repo.url);
    println!("Estado:      {}", repo.status);

    let techs = repo.technologies().into_iter().collect::<Vec<_>>();
    if techs.is_empty() {
        println!("Tecnologías: (ninguna identificada)");
    } else {
        println!("Tecnologías: {}", techs.join(", "));
    }

    if let Some(explanation) = &repo.ai_explanation {
        println!("\n{}", explanation);
    }
    println!("{}", "=".repeat(60));
}

fn render_completeness(report: &CompletenessReport) -> String {
    let mut out = format!(
        "Completitud: {}/{} ({:.0}%)\n",
        report.score,
        report.max_score,
        report.percentage()
    );
    if !report.issues.is_empty() {
        out.push_str("Problemas:\n");
        for issue in &report.issues {
            out.push_str(&format!("  - {}\n", issue));
        }
    }
    if !report.recommendations.is_empty() {
        out.push_str("Recomendaciones:\n");
        for recommendation in &report.recommendations {
            out.push_str(&format!("  - {}\n", recommendation));
        }
    }
    out
}

fn export_json(repos: &[RepositoryRecord]) -> anyhow::Result<String> {
    let rows: Vec<serde_json::Value> = repos
        .iter()
        .map(|repo| {
            serde_json::json!({
                "url": repo.url,
                "owner": repo.owner_name,
                "repo": repo.repo_name,
                "technologies": repo.technologies(),
                "is_identified": repo.is_identified,
                "status": repo.status,
                "updated_at": repo.updated_at,
            })
        })
        .collect();

    Ok(serde_json::to_string_pretty(&rows)? + "\n")
}

fn export_csv(repos: &[RepositoryRecord]) -> String {
    let mut out = String::from("url,owner,repo,technologies,is_identified,status,updated_at\n");
    for repo in repos {
        let techs = repo.technologies().into_iter().collect::<Vec<_>>().join(";");
        let fields = [
            csv_field(&repo.url),
            csv_field(&repo.owner_name),
            csv_field(&repo.repo_name),
            csv_field(&techs),
            repo.is_identified.to_string(),
            csv_field(&repo.status),
            csv_field(&repo.updated_at),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: &str, repo: &str, techs: &str) -> RepositoryRecord {
        RepositoryRecord {
            id: 1,
            url: format!("https://github.com/{}/{}", owner, repo),
            owner_name: owner.to_string(),
            repo_name: repo.to_string(),
            technologies: techs.to_string(),
            is_identified: techs != "[]",
            status: "analyzed".to_string(),
            ai_explanation: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_csv() {
        let csv = export_csv(&[record("facebook", "react", r#"["React","Node.js"]"#)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "https://github.com/facebook/react,facebook,react,Node.js;React,true,analyzed,2024-01-01T00:00:00.000000Z"
        );
    }

    #[test]
    fn test_export_json_has_technology_arrays() {
        let json = export_json(&[record("microsoft", "vscode", r#"["TypeScript"]"#)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["owner"], "microsoft");
        assert_eq!(value[0]["technologies"], serde_json::json!(["TypeScript"]));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["repo-cmdb", "--db", "/tmp/c.db", "query", "cuántos", "hay"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/c.db")));
        assert!(matches!(cli.command, Command::Query { ref question } if question.len() == 2));

        let cli = Cli::try_parse_from(["repo-cmdb", "export", "--format", "csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Export { format: ExportFormat::Csv, output: None }
        ));

        let url = "https://github.com/a/b";
        let cli = Cli::try_parse_from(["repo-cmdb", "summary", url]).unwrap();
        assert!(matches!(cli.command, Command::Summary { url: ref parsed } if parsed == url));

        let args = ["repo-cmdb", "summarize", "-", "-q", "¿Cuántos hay?"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Summarize { ref file, question: Some(_) } if file == Path::new("-")
        ));
    }

    #[test]
    fn test_render_completeness() {
        let report = validate_completeness(&record("someone", "notes", "[]"));
        let text = render_completeness(&report);
        assert!(text.starts_with("Completitud: 70/100 (70%)\n"));
        assert!(text.contains("Problemas:\n  - No se identificaron tecnologías\n"));
        assert!(text.contains("Recomendaciones:\n  - Añadir archivos de configuración"));

        let full = render_completeness(&validate_completeness(&record("a", "b", r#"["Go"]"#)));
        assert_eq!(full, "Completitud: 100/100 (100%)\n");
    }
}
