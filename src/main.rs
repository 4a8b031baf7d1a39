use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::{info, error};
use std::process;

use account_guard::cli::{self, AppContext};
use account_guard::user::UserProfileUpdate;
use account_guard::{config, database};

/// Account Guard - one-time-code two-factor authentication from the terminal
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Sets the configuration file
    #[clap(short, long, value_name = "FILE", default_value = "config.toml")]
    config: String,

    /// Turn debugging information on
    #[clap(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the configuration file and create the database
    Init {},

    /// User management commands
    User {
        #[clap(subcommand)]
        command: UserCommands,
    },

    /// Two-factor authentication commands
    TwoFactor {
        #[clap(subcommand)]
        command: TwoFactorCommands,
    },

    /// Password commands
    Password {
        #[clap(subcommand)]
        command: PasswordCommands,
    },

    /// Activity log commands
    Activity {
        #[clap(subcommand)]
        command: ActivityCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user. Missing fields are prompted for.
    Create {
        #[clap(short, long)]
        email: Option<String>,

        /// Display name
        #[clap(short, long)]
        name: Option<String>,

        #[clap(short, long)]
        age: Option<String>,
    },

    /// List all users
    List {
        /// Only favorites
        #[clap(long)]
        favorites: bool,
    },

    /// Show one user
    Show {
        #[clap(long)]
        user_id: String,
    },

    /// Find users whose name or email contains a term
    Search {
        term: String,
    },

    /// Change a user's email, display name or age
    Update {
        #[clap(long)]
        user_id: String,

        #[clap(short, long)]
        email: Option<String>,

        /// Display name
        #[clap(short, long)]
        name: Option<String>,

        /// New age. An empty value clears it.
        #[clap(short, long)]
        age: Option<String>,
    },

    /// Mark or unmark a user as favorite
    Favorite {
        #[clap(long)]
        user_id: String,
    },

    /// Delete a user and their two-factor records
    Delete {
        #[clap(long)]
        user_id: String,

        /// Skip the confirmation prompt
        #[clap(long)]
        force: bool,
    },

    /// Export users to a file
    Export {
        /// Export format (csv, json or text)
        #[clap(short, long, default_value = "csv")]
        format: String,

        /// Output file. Defaults to a timestamped name in the current directory.
        #[clap(short, long)]
        output: Option<String>,

        /// Only users matching this search term
        #[clap(short, long)]
        query: Option<String>,

        /// Only favorites
        #[clap(long)]
        favorites: bool,
    },
}

#[derive(Subcommand)]
enum TwoFactorCommands {
    /// Choose where verification codes are sent
    Setup {
        #[clap(long)]
        user_id: String,

        /// Delivery method (sms or email)
        #[clap(short, long, default_value = "sms")]
        method: String,

        /// Phone number or email address
        #[clap(long)]
        destination: String,
    },

    /// Send a new verification code to the configured destination
    Send {
        #[clap(long)]
        user_id: String,
    },

    /// Check a verification code
    Verify {
        #[clap(long)]
        user_id: String,

        /// The code that was sent. Prompted for when omitted.
        #[clap(short, long)]
        code: Option<String>,

        /// Enable two-factor right after a successful verification
        #[clap(long)]
        enable: bool,
    },

    /// Enable two-factor with a token from `verify`
    Enable {
        #[clap(long)]
        user_id: String,

        #[clap(long)]
        token: String,
    },

    /// Disable two-factor and remove its records
    Disable {
        #[clap(long)]
        user_id: String,

        /// Skip the confirmation prompt
        #[clap(long)]
        force: bool,
    },

    /// Show setup and outstanding code state
    Status {
        #[clap(long)]
        user_id: String,
    },
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Rate a password and list what would make it stronger
    Check {
        /// Password to rate. Prompted for when omitted.
        #[clap(short, long)]
        password: Option<String>,

        /// Ask for the password a second time and compare
        #[clap(long)]
        confirm: bool,

        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// List recent activity, newest first
    List {
        /// Only this user's activity
        #[clap(long)]
        user_id: Option<String>,

        /// Only this kind of action (create, update, delete, export, favorite, ...)
        #[clap(long)]
        action: Option<String>,

        /// Maximum number of entries (defaults to activity.default_limit)
        #[clap(short, long)]
        limit: Option<usize>,
    },
}

fn run(command: &Commands, config_path: &str) -> Result<()> {
    // Password checks need neither the database nor the secure store
    if let Commands::Password { command: PasswordCommands::Check { password, confirm, json } } = command {
        return cli::password::check(password.as_deref(), *confirm, *json);
    }

    let pool = database::initialize()?;

    if let Commands::Init {} = command {
        cli::utils::print_success(&format!(
            "Configuration at {} and database at {} are ready",
            config_path,
            config::get_config().database.path
        ));
        return Ok(());
    }

    let ctx = AppContext::new(pool, &config::get_config())?;

    match command {
        Commands::User { command } => match command {
            UserCommands::Create { email, name, age } => {
                cli::user::create_user(&ctx, email.as_deref(), name.as_deref(), age.as_deref())?;
                Ok(())
            }
            UserCommands::List { favorites } => cli::user::list_users(&ctx, *favorites),
            UserCommands::Show { user_id } => cli::user::show_user(&ctx, user_id),
            UserCommands::Search { term } => cli::user::search_users(&ctx, term),
            UserCommands::Update { user_id, email, name, age } => {
                let update = UserProfileUpdate {
                    email: email.clone(),
                    display_name: name.clone(),
                    age: age.clone(),
                };
                cli::user::update_user(&ctx, user_id, &update)?;
                Ok(())
            }
            UserCommands::Favorite { user_id } => cli::user::favorite(&ctx, user_id),
            UserCommands::Delete { user_id, force } => cli::user::delete_user(&ctx, user_id, *force),
            UserCommands::Export { format, output, query, favorites } => {
                cli::user::export_users(&ctx, format, output.as_deref(), query.as_deref(), *favorites)?;
                Ok(())
            }
        },
        Commands::TwoFactor { command } => match command {
            TwoFactorCommands::Setup { user_id, method, destination } => {
                cli::two_factor::setup(&ctx, user_id, method, destination)
            }
            TwoFactorCommands::Send { user_id } => cli::two_factor::send(&ctx, user_id),
            TwoFactorCommands::Verify { user_id, code, enable } => {
                cli::two_factor::verify(&ctx, user_id, code.as_deref(), *enable)
            }
            TwoFactorCommands::Enable { user_id, token } => cli::two_factor::enable(&ctx, user_id, token),
            TwoFactorCommands::Disable { user_id, force } => cli::two_factor::disable(&ctx, user_id, *force),
            TwoFactorCommands::Status { user_id } => cli::two_factor::status(&ctx, user_id),
        },
        Commands::Activity { command } => match command {
            ActivityCommands::List { user_id, action, limit } => {
                cli::activity::list(&ctx, user_id.as_deref(), action.as_deref(), *limit)
            }
        },
        Commands::Init {} | Commands::Password { .. } => Ok(()),
    }
}

fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse();

    // RUST_LOG still wins over the verbosity flag
    let default_filter = match cli.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Starting Account Guard");

    match config::load_config(&cli.config) {
        Ok(_) => {
            info!("Configuration loaded successfully");
        }
        Err(err) => {
            error!("Failed to load configuration: {:#}", err);
            process::exit(1);
        }
    }

    if let Err(err) = run(&cli.command, &cli.config) {
        error!("{:#}", err);
        cli::utils::print_error(&err.to_string());
        process::exit(1);
    }
}
