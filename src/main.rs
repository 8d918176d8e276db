use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nl2sql::agents::ExecutionOutcome;
use nl2sql::catalog::{ErrorTaxonomy, SchemaCatalog};
use nl2sql::config::AppConfig;
use nl2sql::demo_db;
use nl2sql::llm::LlmClient;
use nl2sql::{ExecutionLoop, InconsistencyPolicy, InitialSql, LoopOptions, PipelineContext, PipelineResult};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Natural-language to SQL with an LLM-driven correction loop")]
struct Cli {
    /// Path to the schema catalog JSON (or set NL2SQL_SCHEMA_PATH)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Path to the error taxonomy JSON (or set NL2SQL_TAXONOMY_PATH)
    #[arg(long, global = true)]
    taxonomy: Option<PathBuf>,

    /// SQLite database file (or set NL2SQL_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Chat model name (or set OPENAI_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question
    Ask {
        /// The question in natural language
        question: String,

        #[command(flatten)]
        run: RunArgs,

        /// Print the full pipeline result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read questions from stdin until EOF or `exit`
    Repl {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Create the demo users/orders tables and fill them with random rows
    InitDb {
        #[arg(long, default_value_t = 20)]
        users: usize,

        #[arg(long, default_value_t = 50)]
        orders: usize,
    },
    /// Print the rows of every table in the database
    ShowDb {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Upper bound on execute/correct iterations (or set NL2SQL_MAX_ITERATIONS)
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Generate the first SQL candidate from the plan instead of using a seed
    #[arg(long, conflicts_with = "seed_sql")]
    synthesize: bool,

    /// Starting SQL for the correction loop
    #[arg(long)]
    seed_sql: Option<String>,

    /// Accept any SQL that executes, even if the classifier still reports an error
    #[arg(long)]
    trust_execution: bool,
}

impl RunArgs {
    fn options(&self) -> LoopOptions {
        let initial_sql = if self.synthesize {
            InitialSql::Synthesize
        } else {
            self.seed_sql
                .clone()
                .map(InitialSql::Seeded)
                .unwrap_or_default()
        };
        let policy = if self.trust_execution {
            InconsistencyPolicy::TrustExecution
        } else {
            InconsistencyPolicy::TrustClassifier
        };
        LoopOptions { initial_sql, policy }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = apply_overrides(AppConfig::from_env().context("Failed to read configuration")?, &cli);

    match cli.command {
        Commands::Ask { question, run, json } => {
            let pipeline = build_pipeline(&config, run.options())?;
            let max_iterations = run.max_iterations.unwrap_or(config.max_iterations);
            let result = pipeline.run(&question, max_iterations).await;
            if json {
                println!("{}", result.to_json_pretty());
            } else {
                print_result(&result);
            }
        }
        Commands::Repl { run } => {
            let pipeline = build_pipeline(&config, run.options())?;
            let max_iterations = run.max_iterations.unwrap_or(config.max_iterations);
            run_repl(&pipeline, max_iterations).await?;
        }
        Commands::InitDb { users, orders } => {
            let summary = demo_db::init_demo_db(&config.db_path, users, orders)
                .with_context(|| format!("Failed to initialize {}", config.db_path.display()))?;
            println!(
                "Created {} with {} users and {} orders",
                config.db_path.display(),
                summary.users,
                summary.orders
            );
        }
        Commands::ShowDb { limit } => {
            let tables = demo_db::dump_tables(&config.db_path, limit)
                .with_context(|| format!("Failed to read {}", config.db_path.display()))?;
            for table in tables {
                println!("\n{}", "=".repeat(80));
                println!(" {} ({} rows shown)", table.name, table.rows.len());
                println!("{}", "=".repeat(80));
                print_rows(&table.columns, &table.rows);
            }
        }
    }

    Ok(())
}

fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(path) = &cli.schema {
        config.schema_path = path.clone();
    }
    if let Some(path) = &cli.taxonomy {
        config.taxonomy_path = path.clone();
    }
    if let Some(path) = &cli.db {
        config.db_path = path.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if cli.api_key.is_some() {
        config.api_key = cli.api_key.clone();
    }
    config
}

fn build_pipeline(config: &AppConfig, options: LoopOptions) -> Result<ExecutionLoop> {
    info!("Loading schema catalog from {}", config.schema_path.display());
    let catalog = SchemaCatalog::load(&config.schema_path).context("Failed to load schema catalog")?;

    info!("Loading error taxonomy from {}", config.taxonomy_path.display());
    let taxonomy = ErrorTaxonomy::load(&config.taxonomy_path).context("Failed to load error taxonomy")?;

    let llm = LlmClient::from_config(config).context("Failed to create LLM client")?;
    info!("Using model {}", llm.model());

    let context = PipelineContext {
        llm: Arc::new(llm),
        catalog: Arc::new(catalog),
        taxonomy: Arc::new(taxonomy),
        db_path: config.db_path.clone(),
    };
    Ok(ExecutionLoop::new(context, options))
}

async fn run_repl(pipeline: &ExecutionLoop, max_iterations: usize) -> Result<()> {
    println!("Ask a question about the database (`exit` to quit).");
    let stdin = io::stdin();
    loop {
        print!("\nnl2sql> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let result = pipeline.run(question, max_iterations).await;
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &PipelineResult) {
    println!("\n{}", "=".repeat(80));
    if result.success {
        println!(" SUCCESS after {} iteration(s)", result.iterations);
    } else {
        println!(" FAILED after {} iteration(s)", result.iterations);
    }
    println!("{}", "=".repeat(80));

    println!("\n Question: {}", result.question);
    let tables: Vec<&str> = result.linked_schema.tables.iter().map(|t| t.name.as_str()).collect();
    println!(" Linked tables: {}", tables.join(", "));
    if !result.query_plan.is_empty() {
        println!("\n Plan:\n{}", result.query_plan);
    }
    println!("\n Initial SQL: {}", result.initial_sql);

    for (iteration, record) in &result.corrections {
        println!("\n Iteration {}:", iteration);
        if !record.error_message.is_empty() {
            println!("   Error: {}", record.error_message);
        }
        println!(
            "   Classified: {} / {}",
            record.category.as_deref().unwrap_or("-"),
            record.error_code.as_deref().unwrap_or("-")
        );
        println!("   Reason: {}", record.reason);
        println!("   Fix plan: {}", record.fix_plan);
        if let Some(sql) = &record.corrected_sql {
            println!("   Corrected SQL: {}", sql);
        }
    }

    println!("\n Final SQL: {}", result.final_sql);
    if let Some(execution) = &result.execution {
        print_execution(execution);
    }
}

fn print_execution(execution: &ExecutionOutcome) {
    println!("\n Rows: {}", execution.row_count());
    if let (Some(columns), Some(rows)) = (&execution.columns, &execution.rows) {
        print_rows(columns, rows);
    }
}

fn print_rows(columns: &[String], rows: &[Vec<serde_json::Value>]) {
    println!(" {}", columns.join(" | "));
    println!(" {}", "-".repeat(78));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!(" {}", cells.join(" | "));
    }
}
