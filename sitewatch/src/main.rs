use anyhow::{anyhow, Result};
use availability_probe::AvailabilityProbe;
use clap::{Parser, Subcommand, ValueEnum};
use integrity_probe::IntegrityProbe;
use security_probe::SecurityProbe;
use serde::Deserialize;
use site_store::{NewSite, SqliteStore, Store};
use sitewatch_core::{format_ms, AlertConfig, Site, SiteId};
use sitewatch_engine::{FanoutNotifier, HttpProbes, LogNotifier, ScanEngine, WebhookNotifier};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod daemon;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "sitewatch", version, about = "Site health aggregation and alerting")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./sitewatch.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Run the scheduler until interrupted
    Run,
    /// Scan one site or every registered site now
    Scan {
        /// Site id
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        site: Option<i64>,
        /// Scan all registered sites
        #[arg(long, default_value_t = false)]
        all: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show the stored status of every site
    Status {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show recent scan history for a site
    History {
        site: i64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Write CSV to --out (stdout if omitted)
        #[arg(long, default_value_t = false)]
        csv: bool,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Register sites from a YAML file (`sites: [{domain, integrity_key, monitor_id}]`)
    Import { file: PathBuf },
    /// Show or change scan and alert settings
    Settings {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        min_interval_hours: Option<f64>,
        /// Alert recipient; pass an empty string to clear
        #[arg(long)]
        email_target: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    sites: Vec<NewSite>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sitewatch=info,sitewatch_engine=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_engine(cfg: &config::Config, store: Arc<SqliteStore>) -> Result<ScanEngine> {
    let (endpoint, opts) = cfg.security_options();
    let security = SecurityProbe::new(&endpoint, &opts)?;
    let (path, opts) = cfg.integrity_options();
    let integrity = IntegrityProbe::new(&path, &opts)?;
    let (endpoint, api_key, opts) = cfg.availability_options();
    let availability = AvailabilityProbe::new(&endpoint, api_key, &opts)?;

    let mut notifier = FanoutNotifier::new();
    notifier.add_channel(Box::new(LogNotifier));
    if let Some(hook) = &cfg.webhook {
        let timeout = Duration::from_secs(hook.timeout_secs.unwrap_or(10));
        notifier.add_channel(Box::new(WebhookNotifier::new(hook.url.clone(), hook.headers.clone(), timeout)?));
    }
    tracing::debug!(channels = notifier.channel_count(), "notifier ready");

    Ok(ScanEngine::new(
        store,
        Arc::new(HttpProbes::new(security, integrity, availability)),
        Arc::new(notifier),
        cfg.engine_settings(),
    ))
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn print_site(site: &Site) {
    println!(
        "{:>4}  {:<32} {:<8} sec={:<8} int={:<8}{} avail={:<10} uptime={:<6} last={}",
        site.id,
        site.domain,
        site.combined_status,
        site.security_status,
        site.integrity_status,
        if site.integrity_needs_setup { "*" } else { " " },
        opt(site.availability_status),
        opt(site.uptime_ratio),
        opt(site.last_scan_ms.map(format_ms)),
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let cfg = config::load_config(cli.config.as_deref())?;

    if let Commands::Version = cli.command {
        println!("sitewatch {} (core {})", env!("CARGO_PKG_VERSION"), sitewatch_core::version());
        return Ok(());
    }

    let store = Arc::new(SqliteStore::open_or_create(cfg.database_path())?);
    match cli.command {
        Commands::Version => {}
        Commands::Run => {
            let engine = build_engine(&cfg, store)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(daemon::run(engine, cfg.cadence(), cfg.config_poll()))?;
        }
        Commands::Scan { site, all, format } => {
            let engine = build_engine(&cfg, store)?;
            let rt = tokio::runtime::Runtime::new()?;
            if all {
                let report = rt.block_on(async move {
                    let cancel = CancellationToken::new();
                    let stopper = cancel.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            stopper.cancel();
                        }
                    });
                    engine.scan_all(&cancel).await
                })?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                    OutputFormat::Text => println!(
                        "batches={:?} succeeded={} failed={}{}",
                        report.batch_sizes,
                        report.succeeded,
                        report.failed,
                        if report.stopped_early { " (stopped early)" } else { "" }
                    ),
                }
            } else {
                let id = SiteId(site.ok_or_else(|| anyhow!("provide --site <id> or --all"))?);
                let outcome = rt.block_on(engine.scan_site(id))?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                    OutputFormat::Text => {
                        if let Some(site) = store_site(&engine, id)? {
                            print_site(&site);
                        }
                        for kind in &outcome.alerts {
                            println!("      alert: {}", kind);
                        }
                    }
                }
            }
        }
        Commands::Status { format } => {
            let sites = store.all_sites()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sites)?),
                OutputFormat::Text => {
                    if sites.is_empty() {
                        println!("no sites registered");
                    }
                    sites.iter().for_each(print_site);
                }
            }
        }
        Commands::History { site, limit, csv, out } => {
            let records = store.history(SiteId(site), limit)?;
            if csv {
                let writer: Box<dyn std::io::Write> = match &out {
                    Some(path) => Box::new(std::fs::File::create(path)?),
                    None => Box::new(std::io::stdout()),
                };
                let mut wtr = csv::Writer::from_writer(writer);
                wtr.write_record(["record_id", "site_id", "combined_status", "timestamp", "detail"])?;
                for r in records {
                    wtr.write_record([
                        r.record_id.to_string(),
                        r.site_id.to_string(),
                        r.combined_status.to_string(),
                        format_ms(r.timestamp_ms),
                        serde_json::to_string(&r.detail)?,
                    ])?;
                }
                wtr.flush()?;
            } else {
                let lines = records.iter().map(serde_json::to_string).collect::<Result<Vec<_>, _>>()?;
                match &out {
                    Some(path) => std::fs::write(path, lines.join("\n") + "\n")?,
                    None => lines.iter().for_each(|l| println!("{}", l)),
                }
            }
        }
        Commands::Import { file } => {
            let s = std::fs::read_to_string(&file)?;
            let parsed: SitesFile = serde_yaml::from_str(&s)?;
            for new in parsed.sites {
                let domain = sitewatch_core::Target::from(new.domain.as_str()).0;
                if domain.is_empty() {
                    tracing::warn!("skipping entry without a domain");
                    continue;
                }
                let id = store.register_site(&NewSite { domain: domain.clone(), ..new })?;
                println!("{:>4}  {}", id, domain);
            }
        }
        Commands::Settings { enabled, concurrency, min_interval_hours, email_target } => {
            let mut scan = store.scan_config()?;
            let changed_scan = enabled.is_some() || concurrency.is_some() || min_interval_hours.is_some();
            if let Some(v) = enabled { scan.enabled = v; }
            if let Some(v) = concurrency {
                if v == 0 { return Err(anyhow!("concurrency must be at least 1")); }
                scan.concurrency = v;
            }
            if let Some(v) = min_interval_hours {
                if !v.is_finite() || v < 0.0 { return Err(anyhow!("min interval must be a non-negative number of hours")); }
                scan.min_interval_hours = v;
            }
            if changed_scan {
                store.set_scan_config(&scan)?;
            }
            if let Some(target) = email_target {
                let target = Some(target.trim().to_string()).filter(|t| !t.is_empty());
                store.set_alert_config(&AlertConfig { email_target: target })?;
            }
            let alert = store.alert_config()?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "scan": scan, "alert": alert }))?);
        }
    }
    Ok(())
}

fn store_site(engine: &ScanEngine, id: SiteId) -> Result<Option<Site>> {
    Ok(engine.store().get_site(id)?)
}
