use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tether_core::index::{ArchivedFilter, SortKey, SortOrder};
use tether_core::model::{LabelId, TreeId};

/// Tether: link external documents and folders into a local index and keep it in sync.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the configuration, index and grants.
    #[arg(long, global = true, env = "TETHER_DATA_DIR", default_value = ".tether")]
    pub data_dir: PathBuf,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and its configuration.
    Init,
    /// Link a single document.
    Link(TargetArgs),
    /// Link a directory and every document below it.
    LinkTree(TargetArgs),
    /// Re-read linked trees and documents, dropping what disappeared.
    Sync,
    /// List linked documents.
    List(ListArgs),
    /// Search names and content of linked documents.
    Search {
        text: String,
    },
    /// Show one linked document.
    Show(TargetArgs),
    /// Write new content or a new name for a linked document.
    Save(SaveArgs),
    /// Remove a document from the index. Tree documents unlink their whole tree.
    Unlink(TargetArgs),
    /// Delete a document's file and remove it from the index.
    Delete {
        target: String,
        /// Skip confirmation.
        #[arg(long, short)]
        force: bool,
    },
    /// List linked trees.
    Trees,
    /// Unlink a tree and all of its documents.
    UnlinkTree {
        /// Tree id, as printed by `trees`.
        id: TreeId,
    },
    Pin(TargetArgs),
    Unpin(TargetArgs),
    Archive(TargetArgs),
    Unarchive(TargetArgs),
    /// Set a document's color tag.
    Color {
        target: String,
        color: u8,
    },
    /// Manage labels.
    Label(LabelArgs),
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Path or URI of the document or directory.
    pub target: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    pub sort: SortArg,

    /// Sort in descending order.
    #[arg(long)]
    pub desc: bool,

    #[arg(long, value_enum, default_value_t = ArchivedArg::Exclude)]
    pub archived: ArchivedArg,

    /// Only documents carrying this label id.
    #[arg(long)]
    pub label: Option<LabelId>,

    /// Only documents of this tree id.
    #[arg(long)]
    pub tree: Option<TreeId>,

    /// Do not list pinned documents first.
    #[arg(long)]
    pub no_pinned_first: bool,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    pub target: String,

    /// Rename the document.
    #[arg(long)]
    pub name: Option<String>,

    /// Replace the content with this file's content.
    #[arg(long)]
    pub content_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub command: LabelCommands,
}

#[derive(Subcommand, Debug)]
pub enum LabelCommands {
    Create {
        name: String,
    },
    Rename {
        id: LabelId,
        name: String,
    },
    /// Delete a label. Documents carrying it keep existing.
    Delete {
        id: LabelId,
    },
    List,
    /// Put a label on a document.
    Assign {
        target: String,
        id: LabelId,
    },
    /// Remove the label from a document.
    Clear {
        target: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SortArg {
    Name,
    Created,
    Opened,
    Color,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::Created => SortKey::CreatedAt,
            SortArg::Opened => SortKey::LastOpened,
            SortArg::Color => SortKey::Color,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ArchivedArg {
    Exclude,
    Only,
    Include,
}

impl From<ArchivedArg> for ArchivedFilter {
    fn from(arg: ArchivedArg) -> Self {
        match arg {
            ArchivedArg::Exclude => ArchivedFilter::Exclude,
            ArchivedArg::Only => ArchivedFilter::Only,
            ArchivedArg::Include => ArchivedFilter::Include,
        }
    }
}

impl ListArgs {
    pub fn order(&self) -> SortOrder {
        if self.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}
