use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;

use streakboard::cli::{Cli, Command, LeaderboardTable};
use streakboard::client::{ApiErr, HttpApiClient};
use streakboard::db::{self, DbErr};
use streakboard::gateway::LeaderboardGateway;
use streakboard::util::env::{self, Env, EnvErr, Var};
use streakboard::util::telemetry::Telemetry;
use streakboard::var;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error("leaderboard unavailable: {0}")]
    Api(#[from] ApiErr),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<()> {
    let cli = Cli::parse();
    let env = env::env().await?;

    let telemetry = Telemetry::init(env.otel_exporter_endpoint.as_deref())
        .map_err(|e| RunnerErr::Telemetry(e.to_string()))?;

    tracing::debug!(mode = env.mode.as_str(), command = ?cli.command, "starting");

    let res = run(cli.command, env).await;
    if let Err(e) = &res {
        tracing::error!(error = %e, "command failed");
    }

    telemetry.shutdown();
    res
}

async fn run(command: Command, env: &'static Env) -> Result<()> {
    match command {
        Command::Fetch { time_frame, json } => {
            let gateway = LeaderboardGateway::new(HttpApiClient::from_env(env)?);
            let leaderboard = gateway.fetch_leaderboard(&time_frame).await?;

            if let Err(violation) = leaderboard.validate() {
                tracing::warn!(%violation, "leaderboard breaks the ranking contract");
            }

            let mut stdout = std::io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &leaderboard)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", LeaderboardTable::new(&time_frame, &leaderboard))?;
            }
        }

        Command::Migrate => {
            let database_url = var!(Var::DatabaseUrl).await?;
            db::run_migrations(database_url, &env.migrations_dir).await?;
        }

        Command::Config => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "mode:            {}", env.mode.as_str())?;
            writeln!(stdout, "backend url:     {}", env.backend_url)?;
            writeln!(stdout, "oauth client id: {}", env.oauth_client_id)?;
            writeln!(stdout, "session cookie:  {}", set_or_unset(&env.session_cookie))?;
            writeln!(stdout, "database url:    {}", set_or_unset(&env.database_url))?;
            writeln!(stdout, "migrations dir:  {}", env.migrations_dir)?;
        }
    }

    Ok(())
}

fn set_or_unset(value: &Option<String>) -> &'static str {
    match value {
        Some(_) => "set",
        None => "unset",
    }
}
