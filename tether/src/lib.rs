use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tether_core::config::Config;
use tether_core::engine::Engine;
use tether_core::index::FileIndex;
use tether_core::notice::{Listener, Notice};
use tether_core::store::FsStore;
use tether_core::uri::Uri;

pub mod cli;
pub mod commands;

pub type AppEngine = Engine<FsStore, FileIndex>;

/// Everything a command needs once the data directory is open.
pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub engine: AppEngine,
    _notices: Listener<Notice>,
}

impl AppContext {
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir).await.with_context(|| {
            format!(
                "No usable data directory at {} (run `tether init`)",
                data_dir.display()
            )
        })?;
        let store = FsStore::open(config.grants_path(data_dir)).await?;
        let index = FileIndex::open(config.index_path(data_dir)).await?;
        let engine = Engine::new(store, index)
            .with_options(config.walk_options());
        let notices = Listener::new(&engine.on.notice, |notice: &Notice| {
            if let Notice::AlreadyLinked(uri) = notice {
                eprintln!("note: {uri} is already linked");
            }
        });
        Ok(AppContext {
            data_dir: data_dir.to_path_buf(),
            config,
            engine,
            _notices: notices,
        })
    }
}

/// Turns a command-line argument into a URI.
///
/// Anything with a scheme is parsed as a URI; everything else is a path, made
/// absolute against the working directory and canonicalized if it exists.
pub fn resolve_target(target: &str) -> Result<Uri> {
    if looks_like_uri(target) {
        return Ok(Uri::parse(target)?);
    }
    let path = Path::new(target);
    let absolute = match std::fs::canonicalize(path) {
        Ok(path) => path,
        Err(_) if path.is_absolute() => path.to_path_buf(),
        Err(_) => std::env::current_dir()?.join(path),
    };
    Ok(Uri::from_file_path(absolute)?)
}

fn looks_like_uri(target: &str) -> bool {
    match target.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn uris_are_parsed_as_is() {
        let target = "content://com.example/document/primary%3Aa.md";
        let uri = resolve_target(target).unwrap();
        assert_eq!(uri.scheme(), "content");
    }

    #[test]
    fn paths_become_file_uris() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "").unwrap();

        let uri = resolve_target(file.to_str().unwrap()).unwrap();
        assert_eq!(uri.scheme(), "file");
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(uri.to_file_path(), Some(canonical));
    }

    #[tokio::test]
    async fn opening_an_uninitialized_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(AppContext::open(dir.path()).await.is_err());

        Config::init(dir.path()).await.unwrap();
        let context = AppContext::open(dir.path()).await.unwrap();
        assert!(context.config.skip_hidden);
    }
}
