// src/main.rs
mod app;
mod config;
mod error;
mod exchange;
mod kubeconfig;
mod token;
mod trust;
mod types;
mod utils;

use app::Connection;
use clap::{Args, Parser, Subcommand};
use config::Settings;
use error::Result;
use std::{io, path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(name = "kubi", author, version, about = "Fetch Kubernetes credentials from a kubi server", long_about = None)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Kubeconfig to read and write (defaults to $KUBECONFIG, then ~/.kube/config)
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the grants and expiry of a token (defaults to the current context's token)
    Explain { token: Option<String> },
    /// Fetch a bearer token
    Token {
        #[command(flatten)]
        server: ServerArgs,
        /// Scopes to request for the token
        #[arg(long, env = "KUBI_SCOPES")]
        scopes: Option<String>,
        /// Store the token in the kubeconfig instead of printing it
        #[arg(long)]
        rotate: bool,
        /// Context whose user gets the token (defaults to the current context)
        #[arg(long, requires = "rotate")]
        context: Option<String>,
    },
    /// Fetch a complete kubeconfig and save it
    Config {
        #[command(flatten)]
        server: ServerArgs,
        /// Print the kubeconfig instead of saving it
        #[arg(long)]
        print: bool,
    },
    /// Print the version
    Version,
}

#[derive(Args)]
pub struct ServerArgs {
    /// Url of the kubi server (ex: https://<kubi-ip>:<kubi-port>)
    #[arg(long, env = "KUBI_URL")]
    pub kubi_url: Option<String>,

    /// LDAP username (not the DN)
    #[arg(short, long, env = "KUBI_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "KUBI_PASSWORD", hide = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS verification
    #[arg(long, overrides_with = "no_insecure")]
    pub insecure: bool,

    /// Verify TLS even when the settings file says insecure
    #[arg(long, overrides_with = "insecure")]
    pub no_insecure: bool,

    /// Use the proxy from HTTPS_PROXY / HTTP_PROXY
    #[arg(long, overrides_with = "no_proxy")]
    pub use_proxy: bool,

    /// Connect directly even when the settings file enables the proxy
    #[arg(long, overrides_with = "use_proxy")]
    pub no_proxy: bool,
}

/// `--flag` / `--no-flag` pair falling back to the settings file.
fn switch(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

impl ServerArgs {
    fn connection(self, settings: &Settings) -> Result<Connection> {
        let kubi_url = self.kubi_url.or_else(|| settings.kubi_url.clone());
        let username = self.username.or_else(|| settings.username.clone());
        Connection::new(
            kubi_url.as_deref().unwrap_or_default(),
            username.as_deref().unwrap_or_default(),
            self.password,
            switch(self.insecure, self.no_insecure, settings.insecure),
            switch(self.use_proxy, self.no_proxy, settings.use_proxy),
        )
    }
}

/// Resolves the kubeconfig location only for commands that touch the file.
fn kubeconfig_path(explicit: Option<PathBuf>, needed: bool) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None if needed => kubeconfig::location::resolve(),
        None => Ok(PathBuf::new()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Version => app::version(&mut stdout),
        Command::Explain { token } => {
            let path = kubeconfig_path(cli.kubeconfig, token.is_none())?;
            app::explain(token.as_deref(), &path, &mut stdout)
        }
        Command::Token {
            server,
            scopes,
            rotate,
            context,
        } => {
            let connection = server.connection(&Settings::load()?)?;
            let path = kubeconfig_path(cli.kubeconfig, rotate)?;
            let rotate = rotate.then_some(context);
            app::token(&connection, scopes, rotate, &path, &mut stdout)
        }
        Command::Config { server, print } => {
            let connection = server.connection(&Settings::load()?)?;
            let path = kubeconfig_path(cli.kubeconfig, true)?;
            app::config(&connection, print, &path, &mut stdout)
        }
    }
}

fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse();
    utils::logging::init(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err.report());
            ExitCode::FAILURE
        }
    }
}
