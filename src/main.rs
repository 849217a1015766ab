use clap::Parser;
use heroku_postdeploy::domain::ports::ErrorReporter;
use heroku_postdeploy::utils::logger;
use heroku_postdeploy::{
    load_settings, BugsnagReporter, CliConfig, NoopReporter, Postdeploy, ReqwestGateway,
};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting heroku-postdeploy");
    tracing::debug!("CLI config: {:?}", config);

    // Configuration problems stop the run before any request is made.
    let settings = match load_settings(&config.config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Failed to load config file '{}': {}", config.config, e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("Resolved settings: {:?}", settings);

    let reporter: Box<dyn ErrorReporter> = match &settings.reporting {
        Some(reporting) => match BugsnagReporter::new(reporting.clone(), settings.api.timeout) {
            Ok(reporter) => Box::new(reporter.with_app_name(settings.context.app_name.clone())),
            Err(e) => {
                tracing::warn!("Bugsnag reporting disabled: {}", e);
                Box::new(NoopReporter)
            }
        },
        None => Box::new(NoopReporter),
    };

    let gateway = match ReqwestGateway::new(settings.api.clone()) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("❌ Could not build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let postdeploy = Postdeploy::new(gateway, settings.context).with_reporter(reporter);

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no API calls will be made");
        let plan = postdeploy.plan();
        for hostname in &plan.hostnames {
            println!("domain       {}", hostname);
        }
        match serde_json::to_string_pretty(&plan.config_vars) {
            Ok(vars) => println!("config-vars  {}", vars),
            Err(e) => tracing::warn!("Could not render config vars: {}", e),
        }
        for attachment in &plan.addon_attachments {
            println!("addon        {} (from {})", attachment.addon, attachment.app);
        }
        println!("acm          requested");
        return ExitCode::SUCCESS;
    }

    postdeploy.run().await
}
