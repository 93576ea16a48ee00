use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use pantry::commands::{
    SandboxOptions, cmd_add, cmd_category_add, cmd_category_ls, cmd_category_rm, cmd_clear_completed, cmd_ls,
    cmd_members, cmd_register, cmd_shortcut_add, cmd_shortcut_clear, cmd_shortcut_ls, cmd_shortcut_rm,
    cmd_shortcut_tap, cmd_status, cmd_toggle, cmd_toggle_all, default_data_path,
};

#[derive(Parser)]
#[command(name = "pantry")]
#[command(about = "Shared shopping lists over a local sandbox store")]
#[command(version)]
struct Cli {
    /// Sandbox store file (default: .pantry/sandbox.json)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// User id to act as
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Email of the acting user
    #[arg(long, global = true)]
    email: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a profile and found or join a group
    Register {
        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Found a new group with this name
        #[arg(long, conflicts_with = "join")]
        create: Option<String>,

        /// Join the group with this code
        #[arg(long)]
        join: Option<String>,
    },

    /// Show the session state for the user
    Status,

    /// List items
    Ls {
        /// Only show this category ("All" shows every category)
        #[arg(short, long)]
        category: Option<String>,

        /// Only show items whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Show item ids
        #[arg(long)]
        ids: bool,
    },

    /// Add an item
    #[command(visible_alias = "a")]
    Add {
        name: String,

        /// Category name (default: the fallback category)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Check or uncheck an item by id or name
    #[command(visible_alias = "t")]
    Toggle { item: String },

    /// Check every item, or uncheck every item if all are checked
    ToggleAll,

    /// Delete every checked item
    ClearCompleted,

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Manage quick-add shortcuts
    Shortcut {
        #[command(subcommand)]
        action: ShortcutAction,
    },

    /// List group members
    Members,
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Add a category
    Add { name: String },
    /// Delete a category by id or name
    Rm { category: String },
    /// List categories
    Ls,
}

#[derive(Subcommand)]
enum ShortcutAction {
    /// Add shortcuts from a comma-separated list
    Add { names: String },
    /// Delete a shortcut
    Rm { name: String },
    /// Delete every shortcut
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Add the item a shortcut names
    Tap {
        name: String,

        /// Category for the new item
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List shortcuts
    Ls,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = SandboxOptions {
        data: cli.data.unwrap_or_else(default_data_path),
        user: cli.user,
        email: cli.email,
    };
    let json = cli.json;

    let result = match cli.command {
        Commands::Register { name, create, join } => {
            cmd_register(&options, name.as_deref(), create.as_deref(), join.as_deref(), json).await
        }
        Commands::Status => cmd_status(&options, json).await,

        Commands::Ls {
            category,
            search,
            ids,
        } => cmd_ls(&options, category.as_deref(), search.as_deref(), ids, json).await,
        Commands::Add { name, category } => cmd_add(&options, &name, category.as_deref(), json).await,
        Commands::Toggle { item } => cmd_toggle(&options, &item, json).await,
        Commands::ToggleAll => cmd_toggle_all(&options, json).await,
        Commands::ClearCompleted => cmd_clear_completed(&options, json).await,

        Commands::Category { action } => match action {
            CategoryAction::Add { name } => cmd_category_add(&options, &name, json).await,
            CategoryAction::Rm { category } => cmd_category_rm(&options, &category, json).await,
            CategoryAction::Ls => cmd_category_ls(&options, json).await,
        },

        Commands::Shortcut { action } => match action {
            ShortcutAction::Add { names } => cmd_shortcut_add(&options, &names, json).await,
            ShortcutAction::Rm { name } => cmd_shortcut_rm(&options, &name, json).await,
            ShortcutAction::Clear { yes } => cmd_shortcut_clear(&options, yes, json).await,
            ShortcutAction::Tap { name, category } => {
                cmd_shortcut_tap(&options, &name, category.as_deref(), json).await
            }
            ShortcutAction::Ls => cmd_shortcut_ls(&options, json).await,
        },

        Commands::Members => cmd_members(&options, json).await,
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
