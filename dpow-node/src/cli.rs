use clap::{Parser, Subcommand};

use crate::config::{NodeConfig, CONFIG_FILE_NAME};
use crate::error::NodeError;
use crate::node::Node;

#[derive(Parser)]
#[command(
    name = "dpowd",
    about = "dPoW node core: cross-chain deposit gateway and notary difficulty",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the node
    Run {
        /// Path to config file
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: String,
        /// Override the chain symbol (empty or KMD for the base chain)
        #[arg(long)]
        symbol: Option<String>,
        /// Override the external chain JSON-RPC URL
        #[arg(long)]
        rpc_url: Option<String>,
        /// Override the status RPC listen address
        #[arg(long)]
        rpc_addr: Option<String>,
        /// Do not sync the external chain
        #[arg(long)]
        no_gateway: bool,
    },
    /// Initialize a new node configuration
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
    },
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub rpc_url: Option<String>,
    pub rpc_addr: Option<String>,
    pub no_gateway: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut NodeConfig) {
        if let Some(symbol) = self.symbol {
            config.chain.symbol = symbol;
        }
        if let Some(url) = self.rpc_url {
            config.gateway.rpc_url = url;
        }
        if let Some(addr) = self.rpc_addr {
            config.rpc.listen_addr = addr;
        }
        if self.no_gateway {
            config.gateway.enabled = false;
        }
    }
}

impl Cli {
    /// Log level from the config file of a `run`, falling back to "info".
    pub fn log_level(&self) -> String {
        match &self.command {
            Command::Run { config, .. } => NodeConfig::load(config)
                .map(|c| c.logging.level)
                .unwrap_or_else(|_| "info".to_string()),
            Command::Init { .. } => "info".to_string(),
        }
    }
}

fn print_summary(config: &NodeConfig, node: &Node) {
    let dim = console::Style::new().dim();
    let cyan = console::Style::new().cyan();
    let ctx = node.context();
    let role = if ctx.is_issuer() { "issuer" } else { "base" };
    println!(
        "  {} {} · {}",
        dim.apply_to("Chain   "),
        cyan.apply_to(ctx.display_symbol()),
        cyan.apply_to(role),
    );
    if config.gateway.enabled {
        println!("  {} {}", dim.apply_to("Gateway "), cyan.apply_to(&config.gateway.rpc_url));
    }
    if config.aggregator.enabled {
        println!("  {} {}", dim.apply_to("Pending "), cyan.apply_to(&config.aggregator.url));
    }
    if config.rpc.enabled {
        println!("  {} {}", dim.apply_to("RPC     "), cyan.apply_to(&config.rpc.listen_addr));
    }
    println!(
        "  {} {}",
        dim.apply_to("Notaries"),
        cyan.apply_to(config.chain.notaries.len())
    );
    println!();
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run {
            config,
            symbol,
            rpc_url,
            rpc_addr,
            no_gateway,
        } => {
            crate::banner::print_banner();

            let mut config = NodeConfig::load(&config)?;
            Overrides {
                symbol,
                rpc_url,
                rpc_addr,
                no_gateway,
            }
            .apply(&mut config);

            let mut node = Node::new(config.clone()).await?;
            print_summary(&config, &node);
            node.run().await
        }
        Command::Init { dir } => {
            NodeConfig::init(&dir)?;
            println!("Initialized {} in {}", CONFIG_FILE_NAME, dir);
            Ok(())
        }
    }
}
