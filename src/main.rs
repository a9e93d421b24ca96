use dbsession::config::{self, Settings};
use dbsession::{DbError, Environment, Result, Session};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "usage: dbsession [--config PATH] [CONNECTION_URL]";

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    info!("Starting dbsession...");

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

struct Args {
    config: Option<PathBuf>,
    url: Option<String>,
}

fn parse_args(args: Vec<String>) -> Result<Args> {
    let mut parsed = Args { config: None, url: None };
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter
                    .next()
                    .ok_or_else(|| DbError::Settings(format!("--config needs a path\n{}", USAGE)))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Err(DbError::Settings(USAGE.to_string())),
            _ if parsed.url.is_none() => parsed.url = Some(arg),
            _ => return Err(DbError::Settings(format!("unexpected argument `{}`\n{}", arg, USAGE))),
        }
    }
    Ok(parsed)
}

fn run(args: Vec<String>) -> Result<()> {
    let args = parse_args(args)?;

    let settings = match args.config {
        Some(path) => config::load_settings(path)?,
        None => match Settings::default_path().filter(|p| p.exists()) {
            Some(path) => config::load_settings(path)?,
            None => Settings::default(),
        },
    };

    let url = args
        .url
        .or_else(|| settings.database_url())
        .ok_or_else(|| DbError::config(format!("no connection string given and {} is not set", config::DATABASE_URL_ENV)))?;

    let env = Environment::init(settings.sqlite_driver());
    let report = {
        let mut session = Session::open(&env, &url, settings.auto_connect())?.with_policy(settings.statement_policy());
        let report = session.info();
        session.disconnect();
        report
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    env.teardown();
    Ok(())
}
