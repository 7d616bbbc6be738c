use cmdrelay::audit::AuditLogger;
use cmdrelay::auth::TokenRegistry;
use cmdrelay::config::Config;
use cmdrelay::exec::ShellRunner;
use cmdrelay::messaging::LogMessenger;
use cmdrelay::security::Allowlist;
use cmdrelay::{AppResult, CommandProcessor, Gateway, GatewayOptions, ProcessorSettings, ToolIo};
use std::sync::Arc;
use tracing::{error, info, warn};

const CONFIG_ENV: &str = "CMDRELAY_CONFIG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => Config::load_from(path)?,
        Err(_) => Config::load()?,
    };

    cmdrelay::logging::init(&config.logging.level);

    let audit = match config.audit_log_path() {
        Ok(path) => match AuditLogger::with_path(&path) {
            Ok(audit) => Some(Arc::new(audit)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Audit log disabled");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "Audit log disabled");
            None
        }
    };

    let authorizer = Arc::new(TokenRegistry::new(
        config.auth.authorized_addresses.iter().cloned(),
        config.token_ttl(),
    ));
    let messenger = Arc::new(LogMessenger::new());
    let runner = Arc::new(ShellRunner::with_output_limit(config.gateway.output_limit_bytes));

    let settings = ProcessorSettings::new(config.gateway.project_root.clone(), config.notify_address())
        .with_timeout(config.command_timeout());
    let mut processor = CommandProcessor::new(
        runner,
        messenger.clone(),
        Allowlist::new(config.security.allowed_commands.iter().cloned()),
        settings,
    );
    if let Some(audit) = &audit {
        processor = processor.with_audit_logger(audit.clone());
    }

    let options = GatewayOptions {
        origin_address: config.gateway.origin_address.clone(),
        max_in_flight: config.gateway.max_in_flight,
        audit,
    };
    let gateway = Gateway::new(Arc::new(processor), messenger, authorizer, options)
        .with_tool_io(ToolIo::new(tokio::io::stdin(), tokio::io::stdout()));

    gateway.start().await?;
    info!("Waiting for Ctrl-C");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    gateway.stop().await;
    Ok(())
}
