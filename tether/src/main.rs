use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tether::cli::{Cli, Commands, LabelCommands};
use tether::{AppContext, commands};
use tether_core::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init = cli.command {
        let config = Config::init(&cli.data_dir).await?;
        println!("Initialized {} ({})", cli.data_dir.display(), config.id);
        return Ok(());
    }

    let cx = AppContext::open(&cli.data_dir).await?;
    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Link(args) => commands::handle_link(&cx, &args.target).await?,
        Commands::LinkTree(args) => commands::handle_link_tree(&cx, &args.target).await?,
        Commands::Sync => commands::handle_sync(&cx).await?,
        Commands::List(args) => commands::handle_list(&cx, args).await?,
        Commands::Search { text } => commands::handle_search(&cx, &text).await?,
        Commands::Show(args) => commands::handle_show(&cx, &args.target).await?,
        Commands::Save(args) => commands::handle_save(&cx, args).await?,
        Commands::Unlink(args) => commands::handle_unlink(&cx, &args.target).await?,
        Commands::Delete { target, force } => {
            commands::handle_delete(&cx, &target, force).await?
        }
        Commands::Trees => commands::handle_trees(&cx).await?,
        Commands::UnlinkTree { id } => commands::handle_unlink_tree(&cx, id).await?,
        Commands::Pin(args) => commands::handle_pinned(&cx, &args.target, true).await?,
        Commands::Unpin(args) => commands::handle_pinned(&cx, &args.target, false).await?,
        Commands::Archive(args) => commands::handle_archived(&cx, &args.target, true).await?,
        Commands::Unarchive(args) => {
            commands::handle_archived(&cx, &args.target, false).await?
        }
        Commands::Color { target, color } => commands::handle_color(&cx, &target, color).await?,
        Commands::Label(args) => match args.command {
            LabelCommands::Create { name } => {
                commands::handle_label_create(&cx, &name).await?
            }
            LabelCommands::Rename { id, name } => {
                commands::handle_label_rename(&cx, id, &name).await?
            }
            LabelCommands::Delete { id } => commands::handle_label_delete(&cx, id).await?,
            LabelCommands::List => commands::handle_label_list(&cx).await?,
            LabelCommands::Assign { target, id } => {
                commands::handle_label_assign(&cx, &target, Some(id)).await?
            }
            LabelCommands::Clear { target } => {
                commands::handle_label_assign(&cx, &target, None).await?
            }
        },
    }

    Ok(())
}
