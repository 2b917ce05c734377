use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod panel;
mod services;
mod utils;

use config::Config;
use error::PanelError;
use panel::{create_panel, PanelTrait};

#[derive(Parser, Debug)]
#[command(name = "panel-windows")]
#[command(about = "Список окон для панели Wayland: панель задач и «Показать рабочий стол»")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "panel.toml")]
    config: String,

    /// Режим сухого запуска (эмулируемый композитор вместо Wayland)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.level)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Вывести окна композитора и выйти
    List,
    /// Запустить панель, команды читаются из stdin
    Run,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск panel-windows v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - окна композитора эмулируются");
    }

    // Весь протокольный код живёт в одном потоке
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Не удалось создать runtime")?;

    let local = LocalSet::new();
    let result = runtime.block_on(local.run_until(run(config, args.dry_run, args.command)));
    drop(local);

    // Чтение stdin может висеть в блокирующем потоке
    runtime.shutdown_timeout(Duration::from_secs(1));

    match &result {
        Ok(()) => info!("panel-windows завершил работу"),
        Err(e) => error!("panel-windows завершился с ошибкой: {:#}", e),
    }
    result
}

async fn run(config: Config, dry_run: bool, command: Command) -> Result<()> {
    let panel: Box<dyn PanelTrait> = match create_panel(&config, dry_run).await {
        Ok(panel) => panel,
        Err(PanelError::ConnectionUnavailable(reason)) => {
            // Без композитора список окон просто отключён
            warn!("Список окон недоступен: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e).context("Не удалось подключиться к композитору"),
    };

    match command {
        Command::List => {
            for record in panel.list() {
                println!("{}", record);
            }
            Ok(())
        }
        Command::Run => match panel.run().await {
            Err(PanelError::ConnectionUnavailable(reason)) => {
                warn!("Список окон отключён до конца работы: {}", reason);
                Ok(())
            }
            other => Ok(other?),
        },
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
