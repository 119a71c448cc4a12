use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use subcheck::{
    proxy::{render_subscription, ProxyChecker, ProxyParser, ProxyType},
    substore::{rewrite, SubStoreSync},
    Config,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Proxy subscription checker with sub-store synchronization
#[derive(Parser)]
#[command(name = "subcheck")]
#[command(about = "Check proxy nodes, tag them by country and sync them to sub-store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args)]
struct Settings {
    /// Base timeout in milliseconds
    #[arg(long, global = true, default_value = "5000")]
    timeout: u64,

    /// URL probed through each node
    #[arg(long, global = true, default_value = "http://gstatic.com/generate_204")]
    alive_test_url: String,

    /// Rounds over the geolocation provider list
    #[arg(long, global = true, default_value = "3")]
    sub_urls_retry: u32,

    /// Sub-store port (e.g. 8299 or 0.0.0.0:8299); sync is skipped when empty
    #[arg(long, global = true, default_value = "")]
    sub_store_port: String,

    /// Sub-store API path prefix
    #[arg(long, global = true, default_value = "")]
    sub_store_path: String,

    /// Overwrite script URL for the mihomo profile
    #[arg(long, global = true, default_value = "")]
    mihomo_overwrite_url: String,

    /// Prefix for raw.githubusercontent.com URLs
    #[arg(long, global = true, default_value = "")]
    github_proxy: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check nodes and sync the live ones
    Check {
        /// Input file containing nodes
        input: PathBuf,
        /// Output file for the tagged live nodes
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Scheme for lines without one (http, https, socks4, socks5)
        #[arg(short = 't', long, default_value = "http")]
        proxy_type: String,
        /// Number of concurrent checks
        #[arg(short = 'n', long, default_value = "10")]
        threads: usize,
    },
    /// Push a prepared node list to sub-store
    Sync {
        /// File with the raw list content
        input: PathBuf,
    },
    /// Print the overwrite URL as it would be written today
    Rewrite {
        /// URL template with {Y}, {m}, {d}, {Ymd}, {Y_m_d} or {Y-m-d}
        template: String,
    },
}

impl Settings {
    fn into_config(self) -> Config {
        Config::new()
            .with_timeout_ms(self.timeout)
            .with_alive_test_url(self.alive_test_url)
            .with_sub_urls_retry(self.sub_urls_retry)
            .with_sub_store(self.sub_store_port, self.sub_store_path)
            .with_mihomo_overwrite_url(self.mihomo_overwrite_url)
            .with_github_proxy(self.github_proxy)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subcheck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.settings.into_config();

    match cli.command {
        Commands::Check {
            input,
            output,
            proxy_type,
            threads,
        } => {
            let ptype = parse_proxy_type(&proxy_type)?;
            let proxies = ProxyParser::parse_file(&input, ptype)?;
            info!("Loaded {} nodes from {:?}", proxies.len(), input);

            let config = config.with_concurrency(threads);
            let checker = ProxyChecker::new(&config);
            let (alive, _dead) = checker.check_and_separate(proxies).await;

            for result in &alive {
                println!(
                    "{} {} ({}ms)",
                    result.proxy,
                    result.country_tag(),
                    result.latency_ms.unwrap_or_default()
                );
            }

            let content = render_subscription(&alive);
            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                info!("Saved {} live nodes to {:?}", alive.len(), path);
            }

            if config.sub_store_enabled() {
                SubStoreSync::from_config(&config)?.update(&content).await;
            }
        }
        Commands::Sync { input } => {
            if !config.sub_store_enabled() {
                return Err(anyhow!("--sub-store-port is required for sync"));
            }
            let content = std::fs::read_to_string(&input)?;
            let report = SubStoreSync::from_config(&config)?.sync(&content).await?;
            info!(sub = ?report.sub, profile = ?report.profile, "Sub-store synced");
        }
        Commands::Rewrite { template } => {
            println!(
                "{}",
                rewrite(&template, &chrono::Local::now(), &config.github_proxy)
            );
        }
    }

    Ok(())
}

fn parse_proxy_type(s: &str) -> Result<ProxyType> {
    ProxyType::from_scheme(s).ok_or_else(|| {
        anyhow!(
            "Invalid proxy type: {}. Use: http, https, socks4, socks5",
            s
        )
    })
}
