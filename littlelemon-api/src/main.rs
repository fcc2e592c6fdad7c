use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub mod app;

#[derive(Parser)]
#[command(version, about = "Little Lemon restaurant API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations, then serve the HTTP API
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Create an administrator account
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("littlelemon_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => app::serve::main().await,
        Commands::Migrate => app::manage::migrate(),
        Commands::CreateSuperuser {
            username,
            password,
            email,
        } => app::manage::create_superuser(&username, &password, &email),
    }
}
