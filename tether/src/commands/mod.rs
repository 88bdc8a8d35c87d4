use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing::info;

use tether_core::engine::{LinkOutcome, UnlinkOutcome};
use tether_core::index::DocumentQuery;
use tether_core::model::{Document, LabelId, Origin, TreeId};
use tether_core::uri::Uri;

use crate::cli::{ListArgs, SaveArgs};
use crate::{AppContext, resolve_target};

// --- Linking ---

pub async fn handle_link(cx: &AppContext, target: &str) -> Result<()> {
    let uri = resolve_target(target)?;
    match cx.engine.link_document(&uri).await? {
        LinkOutcome::Linked(document) => println!("Linked {}", document.display_name),
        // Reported by the notice listener.
        LinkOutcome::AlreadyLinked(_) => {}
    }
    Ok(())
}

pub async fn handle_link_tree(cx: &AppContext, target: &str) -> Result<()> {
    let uri = resolve_target(target)?;
    let import = cx.engine.link_tree(&uri).await?;
    let id = style(import.tree.id).dim();
    println!("Linked tree {} ({id})", import.tree.uri);
    println!("  {} documents", import.documents.len());
    if import.skipped > 0 {
        println!("  {} entries skipped", style(import.skipped).yellow());
    }
    if !import.superseded.is_empty() {
        println!("  replaced {} nested tree(s)", import.superseded.len());
    }
    Ok(())
}

pub async fn handle_sync(cx: &AppContext) -> Result<()> {
    let report = cx.engine.sync_all().await?;
    info!(?report, "Sync finished");
    println!(
        "Refreshed {}, unchanged {}, removed {}, failed {}",
        report.refreshed, report.unchanged, report.removed, report.failed
    );
    if report.skipped > 0 || report.orphans_removed > 0 || report.trees_removed > 0 {
        println!(
            "  skipped {}, orphans removed {}, trees removed {}",
            report.skipped, report.orphans_removed, report.trees_removed
        );
    }
    Ok(())
}

// --- Listing ---

pub async fn handle_list(cx: &AppContext, args: ListArgs) -> Result<()> {
    let mut query = DocumentQuery::new()
        .sorted_by(args.sort.into(), args.order())
        .archived(args.archived.into());
    query.pinned_first = !args.no_pinned_first;
    if let Some(label) = args.label {
        query = query.with_label(label);
    }
    if let Some(tree) = args.tree {
        query = query.in_tree(tree);
    }
    print_documents(&cx.engine.documents(&query).await?);
    Ok(())
}

pub async fn handle_search(cx: &AppContext, text: &str) -> Result<()> {
    print_documents(&cx.engine.search(text).await?);
    Ok(())
}

pub async fn handle_show(cx: &AppContext, target: &str) -> Result<()> {
    let uri = resolve_target(target)?;
    let document = cx.engine.mark_opened(&uri).await?;
    let label = match document.label {
        Some(id) => {
            let labels = cx.engine.labels().await?;
            labels.into_iter().find(|l| l.id == id).map(|l| l.name)
        }
        None => None,
    };

    println!("{}", style(&document.display_name).bold());
    println!("  URI:      {}", document.uri);
    match document.origin {
        Origin::Independent => println!("  Origin:   linked on its own"),
        Origin::Tree(id) => println!("  Origin:   tree {id}"),
    }
    if let Some(created) = document.created_at {
        println!("  Created:  {}", created.format("%Y-%m-%d %H:%M"));
    }
    println!(
        "  Pinned:   {}  Archived: {}  Color: {}",
        document.pinned, document.archived, document.color
    );
    if let Some(label) = label {
        println!("  Label:    {label}");
    }
    println!();
    let width = console::Term::stdout().size().1.clamp(40, 100) as usize;
    for line in textwrap::wrap(&document.content, width) {
        println!("{line}");
    }
    Ok(())
}

pub async fn handle_trees(cx: &AppContext) -> Result<()> {
    for tree in cx.engine.trees().await? {
        let count = cx.engine.tree_documents(tree.id).await?.len();
        let id = style(tree.id).dim();
        println!("{id}  {}  ({count} documents)", tree.uri);
    }
    Ok(())
}

// --- Editing ---

pub async fn handle_save(cx: &AppContext, args: SaveArgs) -> Result<()> {
    let uri = resolve_target(&args.target)?;
    let Some(mut edited) = cx.engine.document(&uri).await? else {
        bail!("{uri} is not linked");
    };
    if args.name.is_none() && args.content_file.is_none() {
        bail!("Nothing to save: pass --name and/or --content-file");
    }

    let renamed = match args.name {
        Some(name) if name != edited.display_name => {
            edited.display_name = name;
            true
        }
        _ => false,
    };
    if let Some(path) = &args.content_file {
        edited.content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let outcome = cx.engine.save_document(&edited, renamed).await?;
    for warning in &outcome.warnings {
        eprintln!("{} {warning}", style("warning:").yellow());
    }
    match outcome.renamed_from {
        Some(from) => println!("Saved {} (was {from})", outcome.document.uri),
        None => println!("Saved {}", outcome.document.uri),
    }
    Ok(())
}

pub async fn handle_unlink(cx: &AppContext, target: &str) -> Result<()> {
    let uri = resolve_target(target)?;
    print_unlinked(cx.engine.unlink_document(&uri).await?);
    Ok(())
}

pub async fn handle_delete(cx: &AppContext, target: &str, force: bool) -> Result<()> {
    let uri = resolve_target(target)?;
    if !force && !confirm(format!("Delete {uri} from disk?")).await? {
        println!("Cancelled");
        return Ok(());
    }
    print_unlinked(cx.engine.delete_document(&uri).await?);
    Ok(())
}

pub async fn handle_unlink_tree(cx: &AppContext, id: TreeId) -> Result<()> {
    let removal = cx.engine.unlink_tree(id).await?;
    println!(
        "Unlinked tree {} and {} documents",
        removal.tree.uri,
        removal.documents.len()
    );
    Ok(())
}

pub async fn handle_pinned(cx: &AppContext, target: &str, pinned: bool) -> Result<()> {
    let document = cx.engine.set_pinned(&resolve_target(target)?, pinned).await?;
    println!("{}: pinned = {}", document.display_name, document.pinned);
    Ok(())
}

pub async fn handle_archived(cx: &AppContext, target: &str, archived: bool) -> Result<()> {
    let uri = resolve_target(target)?;
    let document = cx.engine.set_archived(&uri, archived).await?;
    println!("{}: archived = {}", document.display_name, document.archived);
    Ok(())
}

pub async fn handle_color(cx: &AppContext, target: &str, color: u8) -> Result<()> {
    let document = cx.engine.set_color(&resolve_target(target)?, color).await?;
    println!("{}: color = {}", document.display_name, document.color);
    Ok(())
}

// --- Labels ---

pub async fn handle_label_create(cx: &AppContext, name: &str) -> Result<()> {
    let label = cx.engine.create_label(name).await?;
    println!("Created label {} ({})", label.name, style(label.id).dim());
    Ok(())
}

pub async fn handle_label_rename(cx: &AppContext, id: LabelId, name: &str) -> Result<()> {
    let label = cx.engine.rename_label(id, name).await?;
    println!("Renamed label to {}", label.name);
    Ok(())
}

pub async fn handle_label_delete(cx: &AppContext, id: LabelId) -> Result<()> {
    let label = cx.engine.delete_label(id).await?;
    println!("Deleted label {}", label.name);
    Ok(())
}

pub async fn handle_label_list(cx: &AppContext) -> Result<()> {
    for label in cx.engine.labels().await? {
        println!("{}  {}", style(label.id).dim(), label.name);
    }
    Ok(())
}

pub async fn handle_label_assign(cx: &AppContext, target: &str, id: Option<LabelId>) -> Result<()> {
    let document = cx.engine.set_label(&resolve_target(target)?, id).await?;
    match document.label {
        Some(id) => println!("{}: label = {id}", document.display_name),
        None => println!("{}: label cleared", document.display_name),
    }
    Ok(())
}

// --- Output ---

fn print_documents(documents: &[Document]) {
    if documents.is_empty() {
        println!("{}", style("No documents").dim());
        return;
    }
    for document in documents {
        let mut flags = String::new();
        if document.pinned {
            flags.push('*');
        }
        if document.archived {
            flags.push('a');
        }
        let name = style(&document.display_name).bold();
        let uri = style(display_uri(&document.uri)).dim();
        println!("{flags:>2} {name}  {uri}");
    }
}

fn print_unlinked(outcome: UnlinkOutcome) {
    match outcome {
        UnlinkOutcome::Document(document) => println!("Unlinked {}", document.display_name),
        UnlinkOutcome::Tree(removal) => println!(
            "Unlinked tree {} and its {} documents",
            removal.tree.uri,
            removal.documents.len()
        ),
    }
}

async fn confirm(prompt: String) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
    })
    .await
    .context("Blocking task failed (panic)")??;
    Ok(answer)
}

/// Local paths for `file://` URIs, the URI itself otherwise.
fn display_uri(uri: &Uri) -> String {
    uri.to_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| uri.to_string())
}
