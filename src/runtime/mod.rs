use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::entity::Discovered;
use crate::error::{Error, Result};
use crate::library::{Discovery, Library, ScanReport};

mod logging;
mod settings;

pub use logging::init_logging;
pub use settings::load_settings;

/// Log every discovery as it arrives; returns how many files were announced.
fn consume(label: String, rx: Receiver<Discovery>) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut files = 0;
        for discovery in rx {
            match discovery {
                Discovery::Directory(dir) => debug!(library = %label, "entering {}", dir.display()),
                Discovery::Found(item) => {
                    files += 1;
                    info!(
                        library = %label,
                        kind = %item.kind(),
                        encoding = %item.entity().encoding,
                        "{}",
                        describe(&item)
                    );
                }
            }
        }
        files
    })
}

fn describe(item: &Discovered) -> String {
    match item {
        Discovered::Media(media) if !media.info().name.is_empty() => format!(
            "{} ({})",
            media.info().name,
            media.entity().rel_path.display()
        ),
        other => other.entity().rel_path.display().to_string(),
    }
}

/// Print what a report skipped, one line per condition.
fn print_issues(label: &str, report: &ScanReport) {
    for issue in &report.issues {
        if issue.is_walk_condition() {
            debug!(library = %label, "{issue}");
        } else {
            warn!(library = %label, code = issue.code(), "{}", issue.description());
        }
    }
}

/// Drop roots naming a directory already listed, so each store is opened once.
/// Roots that cannot be resolved are kept for `Library::open` to reject.
fn unique_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .filter(|root| {
            let key = fs::canonicalize(root).unwrap_or_else(|_| root.clone());
            let first = seen.insert(key);
            if !first {
                warn!(root = %root.display(), "root given twice, scanning once");
            }
            first
        })
        .collect()
}

/// Index every root given on the command line, or the working directory.
///
/// All libraries scan concurrently. The first failure is returned once every
/// scan has finished.
pub fn run() -> Result<()> {
    let settings = load_settings();
    init_logging(&settings.logging);

    let data_root = settings.storage.data_root().ok_or_else(|| {
        Error::InvalidConfig("no data root: set storage.data_root or HOME".to_string())
    })?;

    let mut roots: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    if roots.is_empty() {
        roots.push(env::current_dir().map_err(Error::WorkingDir)?);
    }

    let mut opened: Vec<Arc<Library>> = Vec::new();
    for root in unique_roots(roots) {
        opened.push(Arc::new(Library::open(&root, &data_root, &settings)?));
    }

    let libraries: Vec<_> = opened
        .into_iter()
        .map(|library| {
            let label = library.rel_root().display().to_string();
            let consumer = consume(label, library.subscribe());
            let scan = library.spawn_scan();
            (library, scan, consumer)
        })
        .collect();

    let mut first_error = None;
    for (library, scan, consumer) in libraries {
        let label = library.rel_root().display().to_string();
        let joined = scan.join();
        // the consumer only stops once its sender is gone
        library.close_events();
        let Ok(outcome) = joined else {
            warn!(library = %label, "scan thread panicked");
            let _ = consumer.join();
            continue;
        };

        match outcome {
            Ok(report) => {
                print_issues(&label, &report);
                let announced = consumer.join().unwrap_or(0);
                debug!(library = %label, announced, "consumer finished");
                println!("{label}: {}", library.summary());
            }
            Err(e) => {
                let _ = consumer.join();
                eprintln!(
                    "mediashelf: {label}: error {}: {} ({})",
                    e.code(),
                    e.description(),
                    e.detail()
                );
                first_error.get_or_insert(e);
            }
        }
        library.close();
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
