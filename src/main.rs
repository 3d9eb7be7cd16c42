use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use xui_client::{ClientConfig, Outcome, OutputFormat, XuiClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "xui.json")]
    config: String,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 输出格式 (json / object / array), 默认取配置文件
    #[arg(short, long)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 服务器状态
    Status,
    /// 列出入站
    Inbounds,
    /// 导出单个入站
    Export { id: u64 },
    /// 在线客户端
    Onlines,
    /// 列出出站
    Outbounds,
    /// 路由配置
    Routing,
    /// 反向代理配置
    Reverse,
    /// 面板设置
    Settings,
    /// 重启 Xray
    RestartXray,
    /// 由面板生成 x25519 密钥对
    X25519,
    /// 最近的日志
    Logs {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: u32,
        #[arg(long, default_value = "info")]
        level: String,
        #[arg(long)]
        syslog: bool,
    },
}

async fn run(client: &XuiClient, command: Command) -> Outcome {
    match command {
        Command::Status => Outcome::from_result(client.server().status().await),
        Command::Inbounds => Outcome::from_result(client.inbounds().list().await),
        Command::Export { id } => Outcome::from_result(client.inbounds().export(id).await),
        Command::Onlines => Outcome::from_result(client.inbounds().onlines().await),
        Command::Outbounds => Outcome::from_result(client.outbounds().list().await),
        Command::Routing => Outcome::from_result(client.routing().load().await),
        Command::Reverse => Outcome::from_result(client.reverse().load().await),
        Command::Settings => Outcome::from_result(client.panel().all().await),
        Command::RestartXray => Outcome::from_result(client.server().restart_xray().await),
        Command::X25519 => Outcome::from_result(client.server().new_x25519_cert().await),
        Command::Logs {
            count,
            level,
            syslog,
        } => Outcome::from_result(client.server().logs(count, &level, syslog).await),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    // 优先使用环境变量 RUST_LOG，否则使用命令行参数
    let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone());

    let log_level = match log_level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("📄 Loading config from: {}", args.config);
    let config = ClientConfig::load(&args.config)?;
    let format = args.output.unwrap_or(config.output);
    info!("🌐 Panel: {}", config.base_url());

    let client = XuiClient::new(config)?;
    let outcome = match client.login().await {
        Ok(_) => run(&client, args.command).await,
        Err(e) => {
            warn!("登录失败, 不执行命令");
            Outcome::from_error(&e)
        }
    };

    println!("{}", outcome.render(format)?);
    if !outcome.ok {
        std::process::exit(1);
    }

    Ok(())
}
