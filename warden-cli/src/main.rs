use clap::Parser;
use tracing_subscriber::EnvFilter;

use warden_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout 은 명령 출력 전용이므로 진단 로그는 stderr 로 보냅니다.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = warden_cli::run(cli).await {
        use colored::Colorize;
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(e.exit_code());
    }
}
