//! Deploy commands

use crate::session::Session;
use anyhow::Result;
use tracing::{debug, info};

/// Handle deploy and force-deploy
#[allow(clippy::disallowed_methods)]
pub fn handle_deploy(session: &Session, force: bool, keep_going: bool) -> Result<()> {
    let options = session.deploy_options(keep_going);
    debug!(force, keep_going, target_ref = %options.target_ref, "Deploy options");

    let pipeline = session.pipeline();
    let report = if force {
        pipeline.force_deploy(session.selection(), &options)?
    } else {
        pipeline.deploy(session.selection(), &options)?
    };

    let elapsed = report.finished_at - report.started_at;
    info!(
        environments = report.pushed.len(),
        elapsed_ms = elapsed.num_milliseconds(),
        "Deploy completed"
    );
    for outcome in &report.pushed {
        println!("✅ {} ({}) is running {}", outcome.environment, outcome.app, outcome.branch);
    }
    Ok(())
}
