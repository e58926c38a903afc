use clap::{Parser, Subcommand};

use swiftyhub::cli::{account, build_controller, login, output};

#[derive(Parser)]
#[command(
    name = "swiftyhub",
    version,
    about = "Sign in to the 42 intranet and browse your profile from the terminal"
)]
struct Cli {
    /// Path to a swiftyhub.json config file
    #[arg(long, global = true, env = "SWIFTY_CONFIG")]
    config: Option<String>,

    /// Keep the session in memory only; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the authorization page
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the redirect
        #[arg(long, env = "SWIFTY_LOGIN_TIMEOUT")]
        timeout: Option<u64>,
    },

    /// Show the session state, restoring a stored session if there is one
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the signed-in user's profile
    Profile {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Sign out and forget the stored session
    Logout,
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Commands::Status { json } | Commands::Profile { json } => *json,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SWIFTY_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.command.json();

    if let Err(e) = run(cli).await {
        if json {
            output::print_error(&e, true);
        } else {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), swiftyhub::SwiftyError> {
    let controller = build_controller(cli.config.as_deref(), cli.ephemeral)?;

    match cli.command {
        Commands::Login {
            no_browser,
            timeout,
        } => login::run_login(&controller, no_browser, login::login_timeout(timeout)).await,
        Commands::Status { json } => account::run_status(&controller, json).await,
        Commands::Profile { json } => account::run_profile(&controller, json).await,
        Commands::Logout => account::run_logout(&controller),
    }
}
