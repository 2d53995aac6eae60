//! Listing configured apps and wiring git remotes

use crate::session::Session;
use anyhow::Result;
use tracing::{debug, info};

/// Handle the apps command: print every environment and its app
#[allow(clippy::disallowed_methods)]
pub fn handle_apps(session: &mut Session, json: bool) -> Result<()> {
    session.select_all();
    let bindings = session.targets().unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(&bindings)?);
        return Ok(());
    }

    if bindings.is_empty() {
        println!("No environments configured.");
        println!("Add an [[environments]] table to your configuration.");
        return Ok(());
    }

    println!();
    for binding in bindings {
        println!("{} maps to the app {} located at:", binding.name, binding.app);
        println!("  {}", binding.remote_url);
        println!();
    }
    Ok(())
}

/// Handle the remotes command: `git remote add` for every environment
pub fn handle_remotes(session: &mut Session) -> Result<()> {
    session.select_all();
    let git = session.git();

    for binding in session.targets()? {
        debug!(environment = %binding.name, url = %binding.remote_url, "Adding git remote");
        session
            .runner()
            .run(&git.remote_add(&binding.name, &binding.remote_url))?;
    }

    info!("Git remotes added");
    Ok(())
}
