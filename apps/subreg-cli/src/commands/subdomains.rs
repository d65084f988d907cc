//! Subdomain management commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use subreg_registry::{
    RegistryError, Subdomain, SubdomainDraft, SubdomainId, DEFAULT_RECORD_TYPE, DEFAULT_TTL,
};
use subreg_session::DEFAULT_WATCH_INTERVAL;

/// Record fields shared by `create` and `update`.
#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Subdomain label, e.g. `blog`
    pub subdomain: String,
    /// Record target: a hostname for CNAME, an address for A
    pub target: String,
    /// Record type (A, CNAME, MX, TXT)
    #[arg(long = "type", default_value = DEFAULT_RECORD_TYPE)]
    pub record_type: String,
    /// Time to live in seconds
    #[arg(long, default_value_t = DEFAULT_TTL)]
    pub ttl: u32,
    /// MX preference
    #[arg(long)]
    pub priority: Option<u16>,
}

impl DraftArgs {
    fn into_draft(self) -> SubdomainDraft {
        SubdomainDraft::new(self.subdomain, self.target)
            .with_record_type(self.record_type.to_uppercase())
            .with_ttl(self.ttl)
            .with_priority(self.priority)
    }
}

fn explain(err: RegistryError) -> anyhow::Error {
    match err {
        RegistryError::NotAuthenticated => anyhow!("Not logged in. Run 'subreg login' first"),
        RegistryError::SessionExpired => {
            anyhow!("Session expired. Run 'subreg login' to sign in again")
        }
        other => other.into(),
    }
}

fn print_table(subdomains: &[Subdomain]) {
    if subdomains.is_empty() {
        println!("No subdomains found");
        return;
    }
    println!(
        "{:<6} {:<24} {:<6} {:<32} {:>6}  {}",
        "ID", "Subdomain", "Type", "Target", "TTL", "Updated"
    );
    println!("{}", "-".repeat(100));
    for sub in subdomains {
        println!(
            "{:<6} {:<24} {:<6} {:<32} {:>6}  {}",
            sub.id, sub.subdomain, sub.record_type, sub.target_domain, sub.ttl, sub.updated_at
        );
    }
}

fn print_subdomain(sub: &Subdomain, format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            output::print_heading("Subdomain Details");
            output::print_row("ID", &sub.id.to_string());
            output::print_row("Subdomain", &sub.subdomain);
            output::print_row("Type", &sub.record_type);
            output::print_row("Target", &sub.target_domain);
            output::print_row("TTL", &sub.ttl.to_string());
            if let Some(priority) = sub.priority {
                output::print_row("Priority", &priority.to_string());
            }
            output::print_row("Created", &sub.created_at);
            output::print_row("Updated", &sub.updated_at);
        }
        OutputFormat::Json => output::print_json(sub),
    }
}

fn render_update(subdomains: &[Subdomain], format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("\n[{}]", chrono::Local::now().format("%H:%M:%S"));
            print_table(subdomains);
        }
        OutputFormat::Json => output::print_json(subdomains),
    }
}

/// List subdomains.
pub async fn subdomains_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let registry = ctx.registry();
    if !registry.refresh().await.map_err(explain)? {
        return Err(explain(RegistryError::NotAuthenticated));
    }

    let subdomains = registry.list();
    match format {
        OutputFormat::Text => print_table(&subdomains),
        OutputFormat::Json => output::print_json(&subdomains),
    }
    Ok(())
}

/// Show one subdomain.
pub async fn subdomains_show(ctx: &Context, id: SubdomainId, format: &OutputFormat) -> Result<()> {
    let sub = ctx.registry().get(id).await.map_err(explain)?;
    print_subdomain(&sub, format);
    Ok(())
}

/// Create a subdomain.
pub async fn subdomains_create(ctx: &Context, args: DraftArgs, format: &OutputFormat) -> Result<()> {
    let draft = args.into_draft();
    let created = ctx.registry().create(&draft).await.map_err(explain)?;
    print_subdomain(&created, format);
    Ok(())
}

/// Replace a subdomain's record.
pub async fn subdomains_update(
    ctx: &Context,
    id: SubdomainId,
    args: DraftArgs,
    format: &OutputFormat,
) -> Result<()> {
    let draft = args.into_draft();
    let updated = ctx.registry().update(id, &draft).await.map_err(explain)?;
    print_subdomain(&updated, format);
    Ok(())
}

/// Delete a subdomain.
pub async fn subdomains_delete(ctx: &Context, id: SubdomainId, format: &OutputFormat) -> Result<()> {
    ctx.registry().delete(id).await.map_err(explain)?;
    output::print_success(&format!("Deleted subdomain {}", id), format);
    Ok(())
}

/// Keep the list on screen, reprinting it whenever it changes.
pub async fn subdomains_watch(ctx: &Context, format: &OutputFormat) -> Result<()> {
    if !ctx.tokens.has_credential() {
        return Err(explain(RegistryError::NotAuthenticated));
    }

    let registry = ctx.registry();
    registry.refresh().await.map_err(explain)?;
    let mut updates = registry.watch();
    render_update(&updates.borrow_and_update(), format);

    let _watcher = ctx.tokens.spawn_watcher(DEFAULT_WATCH_INTERVAL);
    let poller = registry.start_polling(ctx.config.poll_interval());

    output::print_note(
        &format!(
            "Watching subdomains every {}s. Press Ctrl-C to stop.",
            ctx.config.poll_interval_secs
        ),
        format,
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                if !ctx.tokens.has_credential() {
                    output::print_note("Logged out, stopping.", format);
                    break;
                }
                let subdomains = updates.borrow_and_update().clone();
                render_update(&subdomains, format);
            }
        }
    }

    poller.stop().await;
    if let Some(err) = registry.last_error() {
        output::print_note(&format!("Last refresh failed: {}", err), format);
    }
    Ok(())
}
