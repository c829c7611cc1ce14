use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use surveyflow_compiler::{
  CompileError, Compiler, CompilerConfig, StandardCompiler, check_draft,
};
use surveyflow_config::{CompilerLimits, DraftSurvey};
use surveyflow_graph::QuestionId;
use surveyflow_navigator::{AnswerValue, NavigationError, Navigator, ResolveNext};
use surveyflow_store::{ResponseId, SqliteStore, Store, StoreConfig, SurveyId};

/// Surveyflow - branching survey flows with atomic question-set replacement
#[derive(Parser)]
#[command(name = "surveyflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.surveyflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL (default: sqlite://<data-dir>/surveyflow.db)
  #[arg(long, global = true, env = "SURVEYFLOW_DATABASE_URL")]
  database_url: Option<String>,

  /// Compiler limits as a JSON file; unset fields keep their defaults
  #[arg(long, global = true)]
  limits: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage surveys
  Survey {
    #[command(subcommand)]
    action: SurveyAction,
  },

  /// Replace a survey's questions with a draft (deletes all responses)
  Compile {
    survey_id: i64,

    /// Path to the draft file (JSON), or `-` for stdin
    draft_file: PathBuf,
  },

  /// Check a draft without touching the database
  Check {
    /// Path to the draft file (JSON), or `-` for stdin
    draft_file: PathBuf,
  },

  /// Validate the flow graph stored for a survey
  Validate { survey_id: i64 },

  /// Collect responses
  Respond {
    #[command(subcommand)]
    action: RespondAction,
  },
}

#[derive(Subcommand)]
enum SurveyAction {
  /// Create an empty, active survey
  Create {
    title: String,

    #[arg(long)]
    description: Option<String>,
  },

  /// Show a survey and its questions
  Show { survey_id: i64 },

  /// List all surveys
  List,

  /// Allow new responses
  Activate { survey_id: i64 },

  /// Stop accepting new responses
  Deactivate { survey_id: i64 },
}

#[derive(Subcommand)]
enum RespondAction {
  /// Start a response and print the first question
  Start {
    survey_id: i64,

    #[arg(long)]
    respondent: String,
  },

  /// Answer the current question and print the next step
  Next {
    response_id: i64,

    /// The question being answered
    #[arg(long)]
    question: i64,

    /// Answer as JSON, e.g. '{"type":"choice","selected":[1]}'
    #[arg(long)]
    answer: String,
  },

  /// Print the answers of a response
  History { response_id: i64 },
}

fn main() -> Result<()> {
  let Cli {
    data_dir,
    database_url,
    limits,
    command,
  } = Cli::parse();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "surveyflow=info".into()))
    .with(fmt::layer().with_writer(io::stderr))
    .init();

  let Some(command) = command else {
    println!("surveyflow - use --help to see available commands");
    return Ok(());
  };

  let database = Database {
    data_dir,
    url: database_url,
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async move {
    let limits = match &limits {
      Some(path) => load_limits(path).await?,
      None => CompilerLimits::default(),
    };
    run(command, database, limits).await
  })
}

async fn run(command: Commands, database: Database, limits: CompilerLimits) -> Result<()> {
  match command {
    Commands::Check { draft_file } => check(&draft_file, &limits).await,
    Commands::Survey { action } => survey(&database.open().await?, action).await,
    Commands::Compile {
      survey_id,
      draft_file,
    } => {
      let compiler = StandardCompiler::new(database.open().await?, CompilerConfig { limits });
      compile(&compiler, SurveyId(survey_id), &draft_file).await
    }
    Commands::Validate { survey_id } => {
      let compiler = StandardCompiler::new(database.open().await?, CompilerConfig { limits });
      let report = compiler
        .validate_survey(SurveyId(survey_id))
        .await
        .context("failed to validate survey")?;
      print_json(&report.summary())?;
      if !report.valid {
        bail!("survey {survey_id} has an invalid flow");
      }
      Ok(())
    }
    Commands::Respond { action } => {
      let navigator = Navigator::new(database.open().await?);
      respond(&navigator, action).await
    }
  }
}

/// Where the database lives. Only commands that read or write surveys
/// open it.
struct Database {
  data_dir: Option<PathBuf>,
  url: Option<String>,
}

impl Database {
  async fn open(self) -> Result<SqliteStore> {
    let database_url = match self.url {
      Some(url) => url,
      None => {
        let data_dir = match self.data_dir {
          Some(dir) => dir,
          None => dirs::home_dir()
            .context("could not determine home directory")?
            .join(".surveyflow"),
        };
        tokio::fs::create_dir_all(&data_dir)
          .await
          .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
        format!("sqlite://{}", data_dir.join("surveyflow.db").display())
      }
    };

    let config = StoreConfig {
      database_url,
      ..StoreConfig::default()
    };
    let store = SqliteStore::connect(&config)
      .await
      .with_context(|| format!("failed to open database: {}", config.database_url))?;
    store
      .migrate()
      .await
      .context("failed to run database migrations")?;
    info!(database_url = %config.database_url, "store_opened");
    Ok(store)
  }
}

async fn survey(store: &SqliteStore, action: SurveyAction) -> Result<()> {
  match action {
    SurveyAction::Create { title, description } => {
      let survey = store
        .create_survey(&title, description.as_deref())
        .await
        .context("failed to create survey")?;
      eprintln!("Created survey {}", survey.survey_id);
      print_json(&survey)
    }
    SurveyAction::Show { survey_id } => {
      let survey_id = SurveyId(survey_id);
      let survey = store
        .get_survey(survey_id)
        .await
        .context("failed to load survey")?;
      let questions = store
        .list_questions(survey_id)
        .await
        .context("failed to load questions")?;
      print_json(&serde_json::json!({ "survey": survey, "questions": questions }))
    }
    SurveyAction::List => {
      let surveys = store.list_surveys().await.context("failed to list surveys")?;
      print_json(&surveys)
    }
    SurveyAction::Activate { survey_id } => set_active(store, SurveyId(survey_id), true).await,
    SurveyAction::Deactivate { survey_id } => set_active(store, SurveyId(survey_id), false).await,
  }
}

async fn set_active(store: &SqliteStore, survey_id: SurveyId, is_active: bool) -> Result<()> {
  store
    .set_survey_active(survey_id, is_active)
    .await
    .context("failed to update survey")?;
  let survey = store.get_survey(survey_id).await?;
  print_json(&survey)
}

async fn compile(
  compiler: &StandardCompiler<SqliteStore>,
  survey_id: SurveyId,
  draft_file: &Path,
) -> Result<()> {
  let draft = read_draft(draft_file).await?;
  eprintln!("Loaded draft with {} questions", draft.len());

  match compiler.compile(survey_id, draft).await {
    Ok(compiled) => {
      eprintln!(
        "Compiled survey {} (flow version {})",
        compiled.survey.survey_id, compiled.survey.flow_version
      );
      print_json(&compiled)
    }
    Err(e) => {
      if let Some(payload) = rejection_payload(&e) {
        print_json(&payload)?;
      }
      Err(e).context("compile failed")
    }
  }
}

async fn check(draft_file: &Path, limits: &CompilerLimits) -> Result<()> {
  let draft = read_draft(draft_file).await?;

  match check_draft(&draft, limits) {
    Ok(report) => {
      print_json(&report.summary())?;
      if !report.valid {
        bail!("draft has an invalid flow");
      }
      Ok(())
    }
    Err(e) => {
      if let Some(payload) = rejection_payload(&e) {
        print_json(&payload)?;
      }
      Err(e).context("draft check failed")
    }
  }
}

/// Structured payload for a draft the compiler refused.
fn rejection_payload(err: &CompileError) -> Option<serde_json::Value> {
  match err {
    CompileError::Structural(field_errors) => {
      Some(serde_json::json!({ "valid": false, "field_errors": field_errors }))
    }
    CompileError::InvalidFlow(report) => serde_json::to_value(report.summary()).ok(),
    _ => None,
  }
}

async fn respond(navigator: &Navigator<SqliteStore>, action: RespondAction) -> Result<()> {
  match action {
    RespondAction::Start {
      survey_id,
      respondent,
    } => {
      let started = navigator
        .start_response(SurveyId(survey_id), &respondent)
        .await
        .map_err(report_navigation)
        .context("failed to start response")?;
      eprintln!("Started response {}", started.response.response_id);
      print_json(&started)
    }
    RespondAction::Next {
      response_id,
      question,
      answer,
    } => {
      let answer: AnswerValue =
        serde_json::from_str(&answer).context("failed to parse answer JSON")?;
      let next = navigator
        .resolve_next(ResolveNext {
          response_id: ResponseId(response_id),
          current_question_id: QuestionId(question),
          answer,
        })
        .await
        .map_err(report_navigation)
        .context("failed to record answer")?;
      print_json(&next)
    }
    RespondAction::History { response_id } => {
      let answers = navigator
        .history(ResponseId(response_id))
        .await
        .map_err(report_navigation)
        .context("failed to load response history")?;
      print_json(&answers)
    }
  }
}

/// Print the respondent-safe message, keep the detailed error for stderr.
fn report_navigation(err: NavigationError) -> NavigationError {
  println!("{}", respondent_payload(&err));
  err
}

fn respondent_payload(err: &NavigationError) -> serde_json::Value {
  serde_json::json!({ "error": err.public_message() })
}

async fn load_limits(path: &Path) -> Result<CompilerLimits> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read limits file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse limits file: {}", path.display()))
}

async fn read_draft(path: &Path) -> Result<DraftSurvey> {
  let content = if path == Path::new("-") {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read draft from stdin")?;
    input
  } else {
    tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("failed to read draft file: {}", path.display()))?
  };

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse draft: {}", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_check_never_opens_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let draft_file = dir.path().join("draft.json");
    std::fs::write(
      &draft_file,
      r#"{ "questions": [{ "text": "Name?", "kind": "text" }] }"#,
    )
    .unwrap();
    let data_dir = dir.path().join("data");

    run(
      Commands::Check { draft_file },
      Database {
        data_dir: Some(data_dir.clone()),
        url: None,
      },
      CompilerLimits::default(),
    )
    .await
    .unwrap();

    assert!(!data_dir.exists());
  }

  #[tokio::test]
  async fn test_store_commands_open_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");

    run(
      Commands::Survey {
        action: SurveyAction::List,
      },
      Database {
        data_dir: Some(data_dir.clone()),
        url: None,
      },
      CompilerLimits::default(),
    )
    .await
    .unwrap();

    assert!(data_dir.join("surveyflow.db").exists());
  }

  #[tokio::test]
  async fn test_history_of_missing_response_hides_identifiers() {
    let navigator = Navigator::new(SqliteStore::in_memory().await.unwrap());
    let err = navigator.history(ResponseId(4242)).await.unwrap_err();
    assert!(matches!(err, NavigationError::NotFound(_)));

    let payload = respondent_payload(&err).to_string();
    assert!(!payload.contains("4242"), "{payload}");

    let err = respond(
      &navigator,
      RespondAction::History { response_id: 4242 },
    )
    .await
    .unwrap_err();
    assert!(err.downcast_ref::<NavigationError>().is_some());
  }
}
