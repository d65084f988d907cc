//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use subreg_session::{CallbackOutcome, CallbackServer, HealthStatus, OAuthCallbackHandler, User};
use tracing::info;

/// Sign in through the provider in the browser.
pub async fn login(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.session();

    if let Some(user) = session.initialize().await.user() {
        output::print_success(&format!("Already logged in as {}", user.username), format);
        return Ok(());
    }

    let server = CallbackServer::bind(ctx.config.callback_port, ctx.config.callback_timeout()).await?;
    let handler = OAuthCallbackHandler::new(session.clone());

    let Some(url) = session.login().await else {
        bail!(
            "Could not start login. Is the server at {} reachable?",
            ctx.api.base_url()
        );
    };
    output::print_note("Opening your browser to sign in with GitHub...", format);
    output::print_note(&format!("If it does not open, visit:\n  {}", url), format);
    output::print_note(
        &format!("Waiting for the sign-in redirect on {} ...", server.callback_url()),
        format,
    );

    match server.run(&handler).await? {
        CallbackOutcome::LoggedIn(user) => {
            info!(user_id = %user.id, "CLI login completed");
            output::print_success(&format!("Logged in as {}", user.username), format);
            Ok(())
        }
        CallbackOutcome::Failed(reason) => bail!("Login failed: {}", reason),
        CallbackOutcome::NoToken => bail!("Login failed: the redirect carried no token"),
    }
}

/// Logout and clear the stored credential.
pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let was_logged_in = ctx.tokens.has_credential();
    ctx.session().logout()?;

    if was_logged_in {
        output::print_success("Logged out successfully", format);
    } else {
        output::print_success("Not logged in", format);
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    api_url: String,
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API:      {}", self.api_url)?;
        match &self.user {
            Some(user) => {
                writeln!(f, "Auth:     logged in")?;
                writeln!(f, "User:     {}", user.username)?;
                write!(f, "Email:    {}", user.email.as_deref().unwrap_or("-"))
            }
            None => write!(f, "Auth:     not logged in"),
        }
    }
}

/// Check authentication status.
pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.session().initialize().await;
    let report = StatusReport {
        api_url: ctx.api.base_url().to_string(),
        logged_in: session.is_authenticated(),
        user: session.user().cloned(),
    };
    output::print(&report, format);
    Ok(())
}

#[derive(Serialize)]
#[serde(transparent)]
struct HealthReport(HealthStatus);

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status:   {}", self.0.status)?;
        writeln!(f, "Database: {}", self.0.database.as_deref().unwrap_or("-"))?;
        match self.0.db_response_time_ms {
            Some(ms) => write!(f, "Latency:  {:.1} ms", ms),
            None => write!(f, "Latency:  -"),
        }
    }
}

/// Probe the API health endpoint.
pub async fn health(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let report = HealthReport(ctx.api.health().await?);
    output::print(&report, format);
    Ok(())
}
