//! CLI Handling module

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use cidr::IpCidr;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    HostRecord, SshmError,
    config::AppConfig,
    inventory::{self, HostFilter},
    netbox::NetboxClient,
    reconcile::sync_inventory,
    ssh::SshTarget,
};

/// sshm - keep a list of hosts and connect to them by key
#[derive(Parser)]
#[command(name = "sshm")]
#[command(about = "A CLI tool for keeping an SSH host inventory, optionally synced from Netbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the configuration file (defaults to <config dir>/sshm/config.json)
    #[arg(short = 'c', long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Hosts file to use instead of the one named in the configuration
    #[arg(short = 'f', long = "inventory", global = true)]
    inventory_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a host, prompting for anything not given as an option
    Add {
        #[arg(long)]
        hostname: Option<String>,
        /// IPv4 address
        #[arg(long = "ip")]
        ip_address: Option<String>,
        /// Classification, eg the manufacturer
        #[arg(long)]
        category: Option<String>,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove the host with the given key
    Delete { key: usize },
    /// List hosts (default behavior)
    #[command(alias = "list")]
    Show {
        /// Hostname contains this text
        #[arg(long)]
        hostname: Option<String>,
        /// Category contains this text
        #[arg(long)]
        category: Option<String>,
        /// Source contains this text (local or netbox)
        #[arg(long)]
        source: Option<String>,
        /// Address is inside this network, eg 10.0.0.0/8
        #[arg(long, value_parser = IpCidr::from_str)]
        network: Option<IpCidr>,
    },
    /// SSH to the host with the given key
    Connect {
        key: usize,
        /// Login name, overrides default_user from the configuration
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Replace all Netbox-sourced hosts with the current device list from Netbox
    Sync,
}

pub async fn main_func() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let cli = Cli::parse();

    let env_filter_str = if cli.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::new(format!(
        "{env_filter_str},reqwest=info,hyper_util=info,rustls=warn"
    ));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(cli.debug)
                .with_thread_ids(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    let config_path = match cli.config_path {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let app_config = AppConfig::load_or_create(&config_path)?;

    let inventory_path = cli
        .inventory_path
        .unwrap_or_else(|| app_config.inventory_path());
    debug!("Using inventory {}", inventory_path.display());

    let command = cli.command.unwrap_or(Commands::Show {
        hostname: None,
        category: None,
        source: None,
        network: None,
    });

    match run_command(&app_config, &inventory_path, command).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("❌ {err}");
            std::process::exit(exit_code(&err));
        }
    }
}

fn exit_code(err: &SshmError) -> i32 {
    match err {
        SshmError::Validation(_) | SshmError::NotFound(_) => 1,
        SshmError::MissingConfiguration(_) | SshmError::Config(_) => 2,
        SshmError::ExternalSource(_) => 3,
        _ => 4,
    }
}

/// Runs one command, returning the process exit code.
async fn run_command(
    app_config: &AppConfig,
    inventory_path: &Path,
    command: Commands,
) -> Result<i32, SshmError> {
    match command {
        Commands::Add {
            hostname,
            ip_address,
            category,
            yes,
        } => {
            add_command(inventory_path, hostname, ip_address, category, yes)?;
        }
        Commands::Delete { key } => delete_command(inventory_path, key)?,
        Commands::Show {
            hostname,
            category,
            source,
            network,
        } => {
            let host_filter = HostFilter {
                hostname,
                category,
                origin: source,
                network,
            };
            show_command(inventory_path, &host_filter)?;
        }
        Commands::Connect { key, user } => {
            return connect_command(app_config, inventory_path, key, user);
        }
        Commands::Sync => sync_command(app_config, inventory_path).await?,
    }
    Ok(0)
}

fn prompt_error(err: dialoguer::Error) -> SshmError {
    SshmError::Io(std::io::Error::other(err.to_string()))
}

fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String, SshmError> {
    match value {
        Some(value) => Ok(value),
        None => dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(prompt_error),
    }
}

fn add_command(
    inventory_path: &Path,
    hostname: Option<String>,
    ip_address: Option<String>,
    category: Option<String>,
    yes: bool,
) -> Result<(), SshmError> {
    let hostname = prompt_if_missing(hostname, "Hostname")?;
    let ip_address = prompt_if_missing(ip_address, "IP Address")?;
    let category = prompt_if_missing(category, "Category")?;

    let host = HostRecord::local(hostname, ip_address, category);
    // reject bad input before asking for confirmation
    host.validate()?;

    if !yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Add {} ({}, {})?",
                host.hostname, host.address, host.category
            ))
            .default(true)
            .interact()
            .map_err(prompt_error)?;

        if !confirm {
            println!("Not added.");
            return Ok(());
        }
    }

    let mut hosts = inventory::load(inventory_path)?;
    let hostname = host.hostname.clone();
    inventory::add(&mut hosts, host)?;
    inventory::save(inventory_path, &hosts)?;
    info!("✅ Added {hostname}");
    Ok(())
}

fn delete_command(inventory_path: &Path, key: usize) -> Result<(), SshmError> {
    let hosts = inventory::load(inventory_path)?;
    let removed = inventory::find_by_ordinal(&hosts, key)?.clone();

    let hosts = inventory::delete_by_ordinal(hosts, key);
    inventory::save(inventory_path, &hosts)?;
    info!(
        "Removed {key}: {} ({})",
        removed.hostname, removed.address
    );
    Ok(())
}

fn show_command(inventory_path: &Path, host_filter: &HostFilter) -> Result<(), SshmError> {
    let hosts = inventory::load(inventory_path)?;
    if hosts.is_empty() {
        info!(
            "No hosts in {}, add one with 'sshm add'",
            inventory_path.display()
        );
        return Ok(());
    }

    let matching = inventory::filter(&hosts, host_filter);
    if matching.is_empty() {
        warn!("No hosts match the given filters");
        return Ok(());
    }

    print_hosts_table(&matching);
    Ok(())
}

fn connect_command(
    app_config: &AppConfig,
    inventory_path: &Path,
    key: usize,
    user: Option<String>,
) -> Result<i32, SshmError> {
    let hosts = inventory::load(inventory_path)?;
    let host = inventory::find_by_ordinal(&hosts, key)?;

    let target = SshTarget::new(
        host.address.clone(),
        user.or_else(|| app_config.default_user.clone()),
    );
    info!("Connecting to {} ({})", host.hostname, target.destination());

    let status = target.launch(&app_config.ssh_command)?;
    Ok(status.code().unwrap_or(1))
}

async fn sync_command(app_config: &AppConfig, inventory_path: &Path) -> Result<(), SshmError> {
    let netbox = app_config.netbox()?;
    let client = NetboxClient::new(netbox)?;
    info!("Syncing hosts from {}", netbox.url);

    let outcome = sync_inventory(inventory_path, &client).await?;
    info!(
        "✅ Synced {} hosts from Netbox, replaced {} ({} devices without a primary IP skipped)",
        outcome.synced, outcome.replaced, outcome.skipped
    );
    Ok(())
}

const TABLE_HEADERS: [&str; 5] = ["Key", "Hostname", "IP", "Category", "Source"];

/// Column widths fitting both the headers and every row
fn column_widths(hosts: &[&HostRecord]) -> [usize; 5] {
    let mut widths = TABLE_HEADERS.map(str::len);
    for host in hosts {
        let cells = [
            host.ordinal.to_string().len(),
            host.hostname.len(),
            host.address.len(),
            host.category.len(),
            host.origin.to_string().len(),
        ];
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = std::cmp::max(*width, cell);
        }
    }
    widths
}

fn print_hosts_table(hosts: &[&HostRecord]) {
    let [key_width, hostname_width, ip_width, category_width, source_width] =
        column_widths(hosts);

    // pad before colouring, escape codes would throw the widths off
    println!(
        "{}  {}  {}  {}  {}",
        format!("{:>key_width$}", TABLE_HEADERS[0]).bold(),
        format!("{:<hostname_width$}", TABLE_HEADERS[1]).bold(),
        format!("{:>ip_width$}", TABLE_HEADERS[2]).bold(),
        format!("{:<category_width$}", TABLE_HEADERS[3]).bold(),
        format!("{:<source_width$}", TABLE_HEADERS[4]).bold(),
    );

    let total_width = key_width + hostname_width + ip_width + category_width + source_width + 8; // +8 for double spaces
    println!("{}", "─".repeat(total_width));

    for host in hosts {
        println!(
            "{}  {}  {}  {}  {}",
            format!("{:>key_width$}", host.ordinal).cyan(),
            format!("{:<hostname_width$}", host.hostname).magenta(),
            format!("{:>ip_width$}", host.address).green(),
            format!("{:<category_width$}", host.category).yellow(),
            format!("{:<source_width$}", host.origin.to_string()).dimmed(),
        );
    }
}
