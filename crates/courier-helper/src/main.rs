//! Helper process: forwards the selected channel messages into the bot inbox
//! and prints one JSON result line on stdout.
//!
//! Usage: `courier-helper <source-channel> <identifier> <bot-username> <requester-id>`

mod mtproto;

use courier_core::config::HelperSettings;
use courier_core::logging::{init_logging, RedactionPatterns};
use courier_core::orchestrator::{run_orchestration, OrchestrationRequest, OrchestratorConfig};
use courier_core::protocol::OrchestratorResult;
use dotenvy::dotenv;
use mtproto::GrammersChannel;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "courier_core=info,courier_helper=info,grammers=warn";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // stdout carries the result line only; logs go to stderr
    match RedactionPatterns::new() {
        Ok(patterns) => init_logging(Arc::new(patterns), DEFAULT_LOG_FILTER),
        Err(e) => eprintln!("Failed to compile regex patterns: {e}"),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = run(&args).await;

    println!("{}", result.to_json_line());
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(args: &[String]) -> OrchestratorResult {
    let request = match OrchestrationRequest::from_args(args) {
        Ok(request) => request,
        Err(message) => {
            error!("{message}");
            return OrchestratorResult::error(message, 0, 0);
        }
    };

    let settings = match HelperSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load helper configuration: {e}");
            return OrchestratorResult::error(format!("Helper configuration error: {e}"), 0, 0);
        }
    };

    let channel = match GrammersChannel::connect(&settings).await {
        Ok(channel) => channel,
        Err(e) => {
            error!("Helper connection failed: {e:#}");
            return OrchestratorResult::error(format!("Forwarder script failed: {e:#}"), 0, 0);
        }
    };

    info!(
        source = %request.source_channel,
        identifier = %request.identifier,
        requester = request.requester,
        "Helper run started"
    );
    let result = run_orchestration(&channel, &request, &OrchestratorConfig::default()).await;
    channel.save_session();
    result
}
