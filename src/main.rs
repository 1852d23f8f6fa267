use serde_json::json;
use token_authority::application_port::*;
use token_authority::domain_model::*;
use token_authority::logger::*;
use token_authority::server::*;
use token_authority::settings::*;

async fn run(server: &Server, command: Command) -> Result<serde_json::Value, AuthError> {
    let sessions = &server.session_authority;
    match command {
        Command::Issue { subject } => {
            let tokens = sessions.issue(&Subject::from_email(&subject)).await?;
            Ok(json!(tokens))
        }
        Command::Validate { token, class } => {
            let subject = sessions.validate(&token, class).await?;
            Ok(json!({ "valid": true, "subject": subject, "class": class }))
        }
        Command::Revoke { token } => {
            sessions.invalidate(&token).await?;
            Ok(json!({ "revoked": true }))
        }
        Command::RevokeAll { subject } => {
            let subject = Subject::from_email(&subject);
            sessions.invalidate_all(&subject).await?;
            Ok(json!({ "revoked_all": true, "subject": subject }))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap(cli.log_json);

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    // Each CLI call is its own process; a memory store would forget every
    // issued or revoked token on exit.
    if !project_settings.store.persists_across_processes() {
        return Err(anyhow::anyhow!(
            "store.backend = \"{}\" keeps state per process; the CLI needs a shared store such as redis",
            project_settings.store.backend
        ));
    }

    let server = Server::try_new(&project_settings).await?;

    let output = match run(&server, cli.command).await {
        Ok(value) => value,
        Err(e) => json!({ "error": PublicError::from(e) }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    server.shutdown().await;
    Ok(())
}
