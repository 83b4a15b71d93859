//! tabdeck: session deck for AI coding agents running in kitty tabs.

use clap::Parser;

mod cli;
mod cmd_ls;
mod cmd_session;
mod context;
mod watch_loop;

fn init_tracing(default_filter: &str) {
    let filter = std::env::var("TABDECK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = cli::Cli::parse();

    let command = args
        .command
        .take()
        .unwrap_or_else(|| cli::Command::Ls(cli::LsOpts::default()));

    let default_filter = match command {
        cli::Command::Watch(_) => "info",
        _ => "warn",
    };
    init_tracing(default_filter);

    let mut ctx = context::DeckContext::load(&args)?;

    match command {
        cli::Command::Ls(opts) => {
            let use_color = !opts.json && context::resolve_color(&opts.color);
            cmd_ls::cmd_ls(ctx, opts.json, use_color).await?;
        }
        cli::Command::Watch(opts) => {
            let use_color = context::resolve_color(&opts.color);
            watch_loop::cmd_watch(ctx, opts.interval, use_color).await?;
        }
        cli::Command::Open(opts) => cmd_session::cmd_open(&mut ctx, &opts.query)?,
        cli::Command::New(opts) => {
            cmd_session::cmd_new(&mut ctx, &opts.path, opts.title.as_deref())?;
        }
        cli::Command::Close(opts) => cmd_session::cmd_close(&mut ctx, &opts.query)?,
        cli::Command::Rename(opts) => cmd_session::cmd_rename(&mut ctx, &opts.query, &opts.name)?,
        cli::Command::Pin(opts) => cmd_session::cmd_pin(&mut ctx, &opts.query)?,
        cli::Command::Rm(opts) => cmd_session::cmd_rm(&mut ctx, &opts.query)?,
        cli::Command::Terminal(opts) => cmd_session::cmd_terminal(&mut ctx, opts.name.as_deref())?,
    }

    Ok(())
}
