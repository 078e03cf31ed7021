use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routerscope::capture::{self, MacAddr};
use routerscope::collector::{
    BoundedSampler, DeviceInfo, DropPolicy, FleetOrchestrator, InventoryResolver, ProbeMode,
};
use routerscope::config::{AppConfig, Settings};
use routerscope::device::Device;
use routerscope::dhcp::{self, BindingMode, LeaseRegistry, SshShell};
use routerscope::formatter::{self, JsonFormatter, SvgRenderer};
use routerscope::publish::{self, PublishError};
use routerscope::snmp::{ObjectId, SnmpAdapter, V2cTransport};

/// Инвентаризация парка маршрутизаторов, замер CPU и автоматизация лабораторной.
#[derive(Parser, Debug)]
#[command(name = "routerscope", version, about, long_about = None)]
struct Cli {
    /// Путь к файлу конфигурации
    #[arg(
        short,
        long,
        global = true,
        default_value = "routerscope.yaml",
        env = "ROUTERSCOPE_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Собрать интерфейсы по парку и вывести JSON
    Inventory {
        /// Только эти устройства (можно повторять)
        #[arg(short, long)]
        device: Vec<String>,
        /// Исключающая верхняя граница перебора индексов
        #[arg(long)]
        max_index_probe: Option<u32>,
        #[arg(long, value_enum)]
        probe_mode: Option<ProbeModeArg>,
        /// Оставлять интерфейсы, для которых не найден адрес
        #[arg(long)]
        lenient: bool,
    },

    /// Замерить скаляр с фиксированным шагом, построить график и вывести ряд
    Sample {
        /// Имя устройства из конфигурации
        device: String,
        /// OID для замера (по умолчанию загрузка CPU производителя)
        #[arg(long)]
        oid: Option<ObjectId>,
        /// Общая длительность в секундах
        #[arg(long)]
        duration: Option<u64>,
        /// Интервал между замерами в секундах
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Вывести MAC источника первого кадра Ethernet из pcap-файла
    Mac { pcap: PathBuf },

    /// Настройка DHCP на маршрутизаторе
    Dhcp {
        #[command(subcommand)]
        action: DhcpCommand,
        /// Маршрутизатор для настройки (вместо значения из конфигурации)
        #[arg(long, global = true)]
        router: Option<String>,
    },

    /// Найти IPv6-адрес соседа на интерфейсе
    Neighbor {
        interface: String,
        #[arg(long)]
        router: Option<String>,
    },

    /// Закоммитить и отправить собранные артефакты
    Publish {
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        tree: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum DhcpCommand {
    /// Статически привязать MAC клиента или настроить динамический пул
    Configure {
        mac: String,
        #[arg(long)]
        dynamic: bool,
        #[arg(long)]
        pool: Option<String>,
    },
    /// Сохранить таблицу привязок маршрутизатора в файл
    Bindings {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProbeModeArg {
    Range,
    NameWalk,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,routerscope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Inventory {
            device,
            max_index_probe,
            probe_mode,
            lenient,
        } => {
            let mut config = AppConfig::load(&cli.config)?;
            config.debug_config();
            let inv = &mut config.settings.inventory;
            if let Some(max) = max_index_probe {
                inv.max_index_probe = max;
            }
            if let Some(mode) = probe_mode {
                inv.probe_mode = match mode {
                    ProbeModeArg::Range => routerscope::config::ProbeModeSetting::Range,
                    ProbeModeArg::NameWalk => routerscope::config::ProbeModeSetting::NameWalk,
                };
            }
            if lenient {
                inv.drop_policy = DropPolicy::Lenient;
            }
            config.validate()?;
            run_inventory(&config, &device, &cancel).await
        }
        Command::Sample {
            device,
            oid,
            duration,
            interval,
            output_dir,
        } => {
            let mut config = AppConfig::load(&cli.config)?;
            let sampling = &mut config.settings.sampling;
            if let Some(oid) = oid {
                sampling.oid = Some(oid);
            }
            if let Some(secs) = duration {
                sampling.duration = Duration::from_secs(secs);
            }
            if let Some(secs) = interval {
                sampling.interval = Duration::from_secs(secs);
            }
            if let Some(dir) = output_dir {
                sampling.output_dir = dir;
            }
            config.validate()?;
            run_sample(&config, &device, &cancel).await
        }
        Command::Mac { pcap } => {
            match capture::extract_first_source_mac(&pcap)? {
                Some(mac) => println!("{mac}"),
                None => bail!("no Ethernet frame found in {}", pcap.display()),
            }
            Ok(())
        }
        Command::Dhcp { action, router } => {
            let settings = load_settings(&cli.config)?;
            let shell = ssh_shell(&settings, router)?;
            match action {
                DhcpCommand::Configure { mac, dynamic, pool } => {
                    let mac: MacAddr = mac.parse()?;
                    let pool = match pool {
                        Some(p) => p.parse()?,
                        None => settings.dhcp.pool()?,
                    };
                    let mode = if dynamic {
                        BindingMode::Dynamic
                    } else {
                        BindingMode::Static
                    };
                    let mut registry = LeaseRegistry::load(settings.dhcp.registry.clone())?;
                    let outcome =
                        dhcp::configure_binding(&shell, &mut registry, mac, mode, &pool).await?;
                    println!("{mac}: {outcome}");
                }
                DhcpCommand::Bindings { output } => {
                    let path = output.unwrap_or(settings.dhcp.bindings_output.clone());
                    dhcp::fetch_binding_table(&shell, &path).await?;
                    println!("DHCP clients saved to {}", path.display());
                }
            }
            Ok(())
        }
        Command::Neighbor { interface, router } => {
            let settings = load_settings(&cli.config)?;
            let shell = ssh_shell(&settings, router)?;
            match dhcp::find_ipv6_neighbor(&shell, &interface).await? {
                Some(addr) => println!("{addr}"),
                None => bail!("no IPv6 neighbor found on {interface}"),
            }
            Ok(())
        }
        Command::Publish {
            remote,
            branch,
            message,
            tree,
        } => {
            let settings = load_settings(&cli.config)?;
            let remote = remote
                .or(settings.publish.remote_url.clone())
                .ok_or_else(|| anyhow!("no remote configured (set publish.remote_url or --remote)"))?;
            let branch = branch.unwrap_or(settings.publish.branch.clone());
            let tree = tree.unwrap_or(settings.publish.tree.clone());

            match publish::publish(&tree, &remote, &branch, message.as_deref()).await {
                Ok(outcome) => {
                    println!(
                        "pushed {} ({} files) to {}",
                        outcome.commit, outcome.files_changed, outcome.branch
                    );
                    Ok(())
                }
                Err(PublishError::NothingToCommit) => {
                    println!("nothing to publish");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn adapter(settings: &Settings) -> Arc<SnmpAdapter<V2cTransport>> {
    Arc::new(
        SnmpAdapter::new(V2cTransport::new())
            .with_timeout(settings.connection.timeout)
            .with_max_repetitions(settings.connection.max_repetitions),
    )
}

async fn run_inventory(
    config: &AppConfig,
    selected: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    let devices: Vec<Device> = if selected.is_empty() {
        config.devices.clone()
    } else {
        selected
            .iter()
            .map(|name| {
                config
                    .device(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown device '{name}'"))
            })
            .collect::<Result<_>>()?
    };

    let inv = &config.settings.inventory;
    let mode: ProbeMode = inv.probe_mode();
    let resolver =
        Arc::new(InventoryResolver::new(adapter(&config.settings)).with_policy(inv.drop_policy));
    let orchestrator = FleetOrchestrator::new(resolver)
        .with_mode(mode)
        .with_max_concurrency(inv.max_concurrency);

    let report = orchestrator
        .resolve_fleet(&devices, cancel)
        .await
        .context("inventory interrupted")?;

    for (name, failure) in &report.failures {
        tracing::warn!(device = %name, error = %failure, "device failed");
    }
    println!("{}", JsonFormatter::fleet_to_json_string(&report)?);
    Ok(())
}

async fn run_sample(config: &AppConfig, name: &str, cancel: &CancellationToken) -> Result<()> {
    let device = config
        .device(name)
        .ok_or_else(|| anyhow!("unknown device '{name}'"))?;
    let sampling = &config.settings.sampling;
    let adapter = adapter(&config.settings);

    let oid = match &sampling.oid {
        Some(oid) => oid.clone(),
        None => {
            let identity = DeviceInfo::probe(&adapter, device, cancel)
                .await
                .with_context(|| format!("{device} is unreachable"))?;
            identity.vendor.cpu_oid().ok_or_else(|| {
                anyhow!(
                    "no CPU OID known for {} ({}); pass --oid",
                    device.name,
                    identity.vendor
                )
            })?
        }
    };

    let series = BoundedSampler::new(adapter)
        .sample(device, &oid, sampling.duration, sampling.interval, cancel)
        .await
        .context("sampling interrupted")?;

    let renderer = SvgRenderer::new(&sampling.output_dir);
    formatter::emit_series(
        &series,
        &renderer,
        &format!("CPU Usage for {}", device.name),
        &mut std::io::stdout().lock(),
    )
    .context("failed to emit series")?;
    Ok(())
}

/// Настройки для команд, которым не нужен парк. Без файла конфигурации
/// берутся значения по умолчанию.
fn load_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        return Ok(AppConfig::load(path)?.settings);
    }
    tracing::debug!(path = %path.display(), "no config file, using defaults");
    let mut config = AppConfig {
        devices: Vec::new(),
        settings: Settings::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config.settings)
}

fn ssh_shell(settings: &Settings, router: Option<String>) -> Result<SshShell> {
    let dhcp = &settings.dhcp;
    let host = router
        .or(dhcp.router.clone())
        .ok_or_else(|| anyhow!("no router configured (set dhcp.router or --router)"))?;

    let mut shell = SshShell::new(host).with_timeout(dhcp.timeout);
    if let Some(user) = &dhcp.user {
        shell = shell.with_user(user);
    }
    if let Some(jump) = &dhcp.jump_host {
        shell = shell.with_jump_host(jump);
    }
    Ok(shell)
}
