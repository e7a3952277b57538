//! Beespend CLI - plan and broadcast UTXO consolidations
//!
//!   beespend plan --descriptor <d> --change-descriptor <c>        → consolidation plan (JSON)
//!   beespend broadcast --descriptor <d> --change-descriptor <c> --psbt <base64>
//!
//! The plan carries a PSBT signed by this wallet only; co-sign it elsewhere before broadcasting.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use beespend::logging::init_logging;
use beespend::{
    AccountService, BdkWalletFactory, BeespendConfig, CachedWalletService, ElectrumBackend, ElectrumFeeRateEstimator,
    EstimatedTransactionPriority, FeeRateEstimator, FullAccount, Network, Psbt, SpendingWallet, StaticAccountService,
    UtxoConsolidationService, WalletAddressService, WalletDescriptor, WalletFactory, WalletInstanceCache, WalletResult,
    WalletService,
};
use bdk_wallet::bitcoin::{psbt::Psbt as BitcoinPsbt, FeeRate};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() {
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("beespend {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("plan") => cmd_plan(&opts).await,
        Some("broadcast") => cmd_broadcast(&opts).await,
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    config: Option<String>,
    descriptor: Option<String>,
    change_descriptor: Option<String>,
    network: Option<String>,
    electrum_url: Option<String>,
    data_dir: Option<String>,
    max_utxos: Option<String>,
    fee_rate: Option<String>,
    psbt: Option<String>,
    offline: bool,
    no_sync: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            let takes_value = match arg.as_str() {
                "--help" | "-h" => { opts.help = true; false }
                "--version" | "-V" => { opts.version = true; false }
                "--json" => { opts.json = true; false }
                "--pretty" => { opts.pretty = true; false }
                "--offline" => { opts.offline = true; false }
                "--no-sync" => { opts.no_sync = true; false }
                "--config" | "-c" => { opts.config = value; true }
                "--descriptor" => { opts.descriptor = value; true }
                "--change-descriptor" => { opts.change_descriptor = value; true }
                "--network" | "-n" => { opts.network = value; true }
                "--electrum" | "-e" => { opts.electrum_url = value; true }
                "--data-dir" | "-d" => { opts.data_dir = value; true }
                "--max-utxos" => { opts.max_utxos = value; true }
                "--fee-rate" => { opts.fee_rate = value; true }
                "--psbt" => { opts.psbt = value; true }
                _ if !arg.starts_with('-') => { positional.push(arg.clone()); false }
                _ => false, // Ignore unknown flags
            };
            i += if takes_value { 2 } else { 1 };
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }

        // Environment variables (lower priority than CLI args)
        if opts.descriptor.is_none() {
            opts.descriptor = env::var("BEESPEND_DESCRIPTOR").ok().filter(|s| !s.is_empty());
        }
        if opts.change_descriptor.is_none() {
            opts.change_descriptor = env::var("BEESPEND_CHANGE_DESCRIPTOR").ok().filter(|s| !s.is_empty());
        }
        if opts.network.is_none() {
            opts.network = env::var("BEESPEND_NETWORK").ok().filter(|s| !s.is_empty());
        }
        if opts.electrum_url.is_none() {
            opts.electrum_url = env::var("BEESPEND_ELECTRUM").ok().filter(|s| !s.is_empty());
        }
        if opts.config.is_none() {
            opts.config = env::var("BEESPEND_CONFIG").ok().filter(|s| !s.is_empty());
        }

        opts
    }

    fn config(&self) -> anyhow::Result<BeespendConfig> {
        let mut config = match &self.config {
            Some(path) => BeespendConfig::load(&PathBuf::from(path))?,
            None => BeespendConfig::default(),
        };
        if let Some(network) = &self.network {
            config.network = Network::from_str(network).ok_or_else(|| anyhow!("Unknown network: {}", network))?;
        }
        if let Some(url) = &self.electrum_url {
            config = config.with_electrum(url.clone());
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        if let Some(max) = &self.max_utxos {
            let max: f64 = max.trim().parse().map_err(|_| anyhow!("--max-utxos expects a number, got {:?}", max))?;
            config = config.with_max_consolidation_count(max);
        }
        Ok(config)
    }

    fn fee_rate(&self) -> anyhow::Result<Option<FeeRate>> {
        let Some(raw) = &self.fee_rate else { return Ok(None) };
        let sat_per_vb: u64 = raw.trim().parse().map_err(|_| anyhow!("--fee-rate expects sat/vB as an integer, got {:?}", raw))?;
        FeeRate::from_sat_per_vb(sat_per_vb)
            .map(Some)
            .ok_or_else(|| anyhow!("fee rate out of range: {}", sat_per_vb))
    }

    fn account(&self, network: Network) -> anyhow::Result<FullAccount> {
        let receiving = self.descriptor.clone().context("--descriptor is required")?;
        let change = self.change_descriptor.clone().context("--change-descriptor is required")?;
        let descriptor = WalletDescriptor::new("spending", receiving, change, network);
        Ok(FullAccount::new("cli", descriptor))
    }
}

/// Opens BDK wallets and brings them up to date before handing them to the cache.
struct SyncingFactory {
    inner: BdkWalletFactory,
    sync: bool,
}

#[async_trait]
impl WalletFactory for SyncingFactory {
    async fn create(&self, descriptor: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>> {
        let wallet = self.inner.open(descriptor).await?;
        if self.sync {
            info!(identifier = descriptor.identifier(), "syncing wallet");
            wallet.sync().await?;
        }
        Ok(Arc::new(wallet))
    }
}

/// `--fee-rate` override; also the only estimator available offline.
struct FixedFeeRate(FeeRate);

#[async_trait]
impl FeeRateEstimator for FixedFeeRate {
    async fn estimate(&self, _: Network, _: EstimatedTransactionPriority) -> WalletResult<FeeRate> {
        Ok(self.0)
    }
}

fn wire(opts: &ParsedArgs) -> anyhow::Result<UtxoConsolidationService> {
    let config = opts.config()?;
    let account = opts.account(config.network)?;
    let data_dir = config.resolve_data_dir();
    debug!(data_dir = %data_dir.display(), network = config.network.as_str(), "wiring");

    let backend = if opts.offline {
        None
    } else {
        Some(ElectrumBackend::connect(config.electrum_url()).context("connecting to electrum")?)
    };

    let fees: Arc<dyn FeeRateEstimator> = match (opts.fee_rate()?, &backend) {
        (Some(rate), _) => Arc::new(FixedFeeRate(rate)),
        (None, Some(backend)) => Arc::new(ElectrumFeeRateEstimator::new(backend.clone())),
        (None, None) => return Err(anyhow!("--fee-rate is required with --offline")),
    };

    let factory = SyncingFactory { inner: BdkWalletFactory::new(data_dir, backend.clone()), sync: backend.is_some() && !opts.no_sync };
    let cache = Arc::new(WalletInstanceCache::new(Arc::new(factory)));
    let wallets: Arc<dyn WalletService> = Arc::new(CachedWalletService::new(cache));
    let accounts: Arc<dyn AccountService> = Arc::new(StaticAccountService::new(Some(account)));
    let addresses = Arc::new(WalletAddressService::new(accounts.clone(), wallets.clone()));
    let flag = Arc::new(config.max_consolidation_flag());

    Ok(UtxoConsolidationService::new(accounts, wallets, addresses, fees, flag))
}

async fn cmd_plan(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let plans = wire(opts)?.prepare_utxo_consolidation().await?;
    Ok(json!({"plans": plans.iter().map(|p| p.to_json()).collect::<Vec<_>>()}))
}

async fn cmd_broadcast(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let encoded = opts.psbt.as_deref().context("--psbt is required")?;
    let decoded = Psbt::from_base64(encoded, bdk_wallet::bitcoin::Amount::ZERO)?;
    let fee = BitcoinPsbt::deserialize(decoded.bytes())
        .context("decoding psbt")?
        .fee()
        .context("computing psbt fee")?;
    let psbt = Psbt::new(decoded.bytes().to_vec(), fee);

    let detail = wire(opts)?.broadcast_consolidation(&psbt).await?;
    Ok(detail.to_json())
}

fn print_usage() {
    println!(
        r#"beespend - UTXO consolidation for a spending wallet

USAGE:
    beespend <command> [options]

COMMANDS:
    plan                        Select UTXOs and build an app-signed consolidation PSBT
    broadcast                   Submit a fully co-signed consolidation PSBT

WALLET OPTIONS:
    --descriptor <desc>         Receiving descriptor (env: BEESPEND_DESCRIPTOR)
    --change-descriptor <desc>  Change descriptor (env: BEESPEND_CHANGE_DESCRIPTOR)
    --network, -n <net>         bitcoin|testnet|signet|regtest (env: BEESPEND_NETWORK)
    --electrum, -e <url>        Electrum server URL (env: BEESPEND_ELECTRUM)
    --data-dir, -d <path>       Wallet store directory
    --config, -c <path>         JSON config file (env: BEESPEND_CONFIG)
    --offline                   No Electrum connection (requires --fee-rate)
    --no-sync                   Skip the wallet scan before planning

PLAN OPTIONS:
    --max-utxos <n>             Max inputs per consolidation (0 = no cap, default 150)
    --fee-rate <sat/vB>         Fixed fee rate instead of an Electrum estimate

BROADCAST OPTIONS:
    --psbt <base64>             Co-signed PSBT

OUTPUT OPTIONS:
    --json                      Raw JSON output
    --pretty                    Pretty-print JSON
    --version, -V               Print version
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ParsedArgs {
        ParsedArgs::parse(&args.iter().map(|a| a.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn numeric_options_are_parsed() {
        let opts = parse(&["plan", "--max-utxos", "25", "--fee-rate", "3"]);
        assert_eq!(opts.command.as_deref(), Some("plan"));
        assert_eq!(opts.config().expect("config").max_consolidation_count, 25.0);
        assert_eq!(opts.fee_rate().expect("fee rate"), Some(FeeRate::from_sat_per_vb_unchecked(3)));
    }

    #[test]
    fn unparsable_max_utxos_is_an_error() {
        let err = parse(&["plan", "--max-utxos", "abc"]).config().err().expect("rejected");
        assert!(err.to_string().contains("--max-utxos"));
    }

    #[test]
    fn unparsable_fee_rate_is_an_error() {
        let opts = parse(&["plan", "--fee-rate", "abc"]);
        assert!(opts.fee_rate().is_err());
        assert!(parse(&["plan", "--fee-rate", "2.5"]).fee_rate().is_err());
        assert_eq!(parse(&["plan"]).fee_rate().expect("absent"), None);
    }
}
