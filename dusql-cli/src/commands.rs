//! Non-interactive subcommands

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use dusql_core::store::DEFAULT_BATCH_SIZE;
use dusql_core::{
    FindRequest, HumanPredicate, InventoryRecord, QueryEngine, RecordStore, RecordWriter,
    ScanConfig, ScanMessage, SqliteStore, format_count, format_size, load_records, scan_roots,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::QueryKind;

/// Records buffered between crawl threads and the writer
const CHANNEL_CAPACITY: usize = 4096;

/// Where `scan` sends its records
#[derive(Debug)]
pub enum ScanTarget {
    /// CSV to a file, or stdout
    Csv(Option<PathBuf>),
    /// Append a generation to the inventory database
    Database(PathBuf),
}

/// Per-root outcomes seen on the scan channel
#[derive(Debug, Default)]
struct Tally {
    completed: u64,
    missing: u64,
    errors: u64,
}

impl Tally {
    fn observe(&mut self, message: ScanMessage) -> Option<InventoryRecord> {
        match message {
            ScanMessage::Record(record) => Some(record),
            ScanMessage::Completed { root, progress } => {
                self.completed += 1;
                self.errors += progress.errors();
                info!(
                    root = %root.display(),
                    records = progress.records,
                    size = %format_size(progress.bytes_scanned),
                    "root done"
                );
                None
            }
            ScanMessage::Missing(root) => {
                self.missing += 1;
                warn!(root = %root.display(), "scan root does not exist, skipped");
                None
            }
        }
    }
}

pub fn scan(paths: Vec<PathBuf>, target: ScanTarget, guard_ancestry: bool) -> Result<()> {
    let (rx, handles) = scan_roots(paths, ScanConfig { guard_ancestry }, CHANNEL_CAPACITY);
    let mut tally = Tally::default();
    let records = rx.iter().filter_map(|message| tally.observe(message));

    let written = match target {
        ScanTarget::Csv(output) => {
            let out: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            let mut writer = RecordWriter::new(out);
            for record in records {
                writer.write(&record)?;
            }
            writer.flush()?;
            writer.records_written()
        }
        ScanTarget::Database(path) => {
            let mut store = SqliteStore::open(&path)?;
            let loaded = load_records(&mut store, records, DEFAULT_BATCH_SIZE)?;
            info!(db = %path.display(), "inventory updated");
            loaded
        }
    };

    for handle in handles {
        handle
            .join()
            .map_err(|_| eyre!("crawl thread panicked"))?;
    }

    info!(
        records = written,
        roots = tally.completed,
        missing = tally.missing,
        errors = tally.errors,
        "scan finished"
    );
    Ok(())
}

fn build_request<S: RecordStore>(
    engine: &QueryEngine<S>,
    roots: &[PathBuf],
    filter: &HumanPredicate,
) -> Result<FindRequest> {
    let keys = roots
        .iter()
        .map(|root| engine.key_for_path(root))
        .collect::<dusql_core::Result<Vec<_>>>()?;
    let predicate = filter.resolve(chrono::Utc::now())?;
    Ok(FindRequest::new(keys, predicate))
}

pub fn find<S: RecordStore>(
    engine: &QueryEngine<S>,
    roots: &[PathBuf],
    filter: &HumanPredicate,
) -> Result<()> {
    let request = build_request(engine, roots, filter)?;
    let predicate = request.predicate();
    let mut out = BufWriter::new(io::stdout().lock());

    // Streamed so the first paths show before the whole closure is walked
    for item in engine.descendants(&request.roots())? {
        let item = item?;
        if predicate.matches(&item.record) {
            writeln!(out, "{}", item.display_path())?;
        }
    }
    out.flush()?;
    Ok(())
}

pub fn du<S: RecordStore>(
    engine: &QueryEngine<S>,
    roots: &[PathBuf],
    filter: &HumanPredicate,
    as_json: bool,
) -> Result<()> {
    let request = build_request(engine, roots, filter)?;
    let summary = engine.du(&request)?;
    if as_json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "{}\t{} inodes",
            format_size(summary.size),
            format_count(summary.inodes)
        );
    }
    Ok(())
}

/// Answer one JSON request, returning the process exit code
///
/// The response is always a JSON document: a path array for find, a
/// `{size, inodes}` object for du, or `{"error": ..}`. Malformed requests
/// exit with 2, store failures with 1.
pub fn query<S: RecordStore>(
    engine: &QueryEngine<S>,
    kind: QueryKind,
    mut input: impl Read,
    mut output: impl Write,
) -> Result<i32> {
    let mut body = String::new();
    input.read_to_string(&mut body)?;

    let response = FindRequest::from_json(&body).and_then(|request| match kind {
        QueryKind::Find => engine.find(&request).map(|paths| json!(paths)),
        QueryKind::Du => engine
            .du(&request)
            .map(|summary| json!({"size": summary.size, "inodes": summary.inodes})),
    });

    let (code, document) = match response {
        Ok(document) => (0, document),
        Err(e) if e.is_client_error() => (2, json!({ "error": e.to_string() })),
        Err(e) => {
            error!(error = %e, "query failed");
            (1, json!({ "error": e.to_string() }))
        }
    };

    serde_json::to_writer(&mut output, &document)?;
    writeln!(output)?;
    output.flush()?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusql_core::{
        Crawler, DusqlError, InodeKey, MemoryStore, QueryConfig, lossy_text,
    };
    use serde_json::Value;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/a.txt"), vec![0u8; 100_000]).unwrap();
        fs::write(temp.path().join("b.txt"), vec![0u8; 40]).unwrap();
        temp
    }

    fn engine(root: &Path) -> QueryEngine<MemoryStore> {
        let store = MemoryStore::from_records(Crawler::new(root, ScanConfig::default()));
        QueryEngine::new(store, QueryConfig { include_root: false })
    }

    fn run(engine: &QueryEngine<impl RecordStore>, kind: QueryKind, body: &str) -> (i32, Value) {
        let mut out = Vec::new();
        let code = query(engine, kind, body.as_bytes(), &mut out).unwrap();
        (code, serde_json::from_slice(&out).unwrap())
    }

    fn root_body(root: &Path, extra: &str) -> String {
        let key = InodeKey::of_path(root).unwrap();
        format!(
            r#"{{"root_inodes": [[{}, {}]]{extra}}}"#,
            key.device, key.inode
        )
    }

    #[test]
    fn test_query_find() {
        let temp = tree();
        let engine = engine(temp.path());
        let (code, value) = run(&engine, QueryKind::Find, &root_body(temp.path(), ""));

        assert_eq!(code, 0);
        let mut paths: Vec<String> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap().to_string())
            .collect();
        paths.sort();
        let root = temp.path().display();
        assert_eq!(
            paths,
            vec![
                format!("{root}/b.txt"),
                format!("{root}/sub"),
                format!("{root}/sub/a.txt"),
            ]
        );
    }

    #[test]
    fn test_query_du_with_size_filter() {
        let temp = tree();
        let engine = engine(temp.path());
        let (code, value) = run(
            &engine,
            QueryKind::Du,
            &root_body(temp.path(), r#", "size": 50000"#),
        );

        assert_eq!(code, 0);
        assert_eq!(value["inodes"], 1);
        assert_eq!(value["size"], 100_000);
    }

    #[test]
    fn test_query_rejects_malformed_request() {
        let temp = tree();
        let engine = engine(temp.path());
        for body in ["{", r#"{"root_inodes": [[1]]}"#, r#"{"root_inodes": [], "size": "big"}"#] {
            let (code, value) = run(&engine, QueryKind::Du, body);
            assert_eq!(code, 2, "{body}");
            assert!(value["error"].is_string());
        }
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn lookup(&self, _key: InodeKey) -> dusql_core::Result<Option<InventoryRecord>> {
            Err(DusqlError::Io(io::Error::other("store offline")))
        }
        fn record(&self, _: InodeKey, _: f64) -> dusql_core::Result<Option<InventoryRecord>> {
            Err(DusqlError::Io(io::Error::other("store offline")))
        }
        fn children(&self, _: &InventoryRecord) -> dusql_core::Result<Vec<InventoryRecord>> {
            Err(DusqlError::Io(io::Error::other("store offline")))
        }
        fn insert(&mut self, _: &[InventoryRecord]) -> dusql_core::Result<()> {
            Ok(())
        }
        fn len(&self) -> dusql_core::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_query_store_failure_is_not_empty_result() {
        let engine = QueryEngine::new(FailingStore, QueryConfig::default());
        let (code, value) = run(&engine, QueryKind::Find, r#"{"root_inodes": [[1, 2]]}"#);
        assert_eq!(code, 1);
        assert!(value["error"].as_str().unwrap().contains("store offline"));
    }

    #[test]
    fn test_scan_to_csv_file() {
        let temp = tree();
        let out = TempDir::new().unwrap();
        let csv = out.path().join("inventory.csv");

        scan(
            vec![temp.path().to_path_buf()],
            ScanTarget::Csv(Some(csv.clone())),
            true,
        )
        .unwrap();

        let text = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().any(|l| l.contains(",a.txt,")));
    }

    #[test]
    fn test_scan_into_database_appends_generations() {
        let temp = tree();
        let out = TempDir::new().unwrap();
        let db = out.path().join("nested/inventory.db");
        let missing = temp.path().join("not-there");

        scan(
            vec![temp.path().to_path_buf(), missing],
            ScanTarget::Database(db.clone()),
            true,
        )
        .unwrap();
        scan(
            vec![temp.path().to_path_buf()],
            ScanTarget::Database(db.clone()),
            true,
        )
        .unwrap();

        let store = SqliteStore::open(&db).unwrap();
        assert_eq!(store.len().unwrap(), 8);

        let engine = QueryEngine::new(store, QueryConfig { include_root: true });
        let key = engine.key_for_path(temp.path()).unwrap();
        let summary = engine.du(&FindRequest::new([key], Default::default())).unwrap();
        assert_eq!(summary.inodes, 4);

        let root = engine.store().lookup(key).unwrap().unwrap();
        assert_eq!(lossy_text(&root.basename), temp.path().display().to_string());
    }
}
