//! Command-line front end for a slotdb record store.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use slotdb::common::config::{DEFAULT_DATA_FILE, DEFAULT_DEGREE, DEFAULT_INDEX_FILE};
use slotdb::logging::init_logging;
use slotdb::{Error, FieldValue, Record, RecordStore, StoreConfig, UpdateOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "slotdb",
    version,
    about = "Variable-length record store with a B-tree primary index",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        env = "SLOTDB_LOG",
        default_value = "warn",
        help = "Log filter directive (e.g. info, slotdb::index=debug)"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(
        long,
        global = true,
        env = "SLOTDB_DATA",
        default_value = DEFAULT_DATA_FILE,
        help = "Heap file path"
    )]
    data: PathBuf,

    #[arg(
        long,
        global = true,
        env = "SLOTDB_INDEX",
        default_value = DEFAULT_INDEX_FILE,
        help = "Index file path"
    )]
    index: PathBuf,

    #[arg(
        long,
        global = true,
        env = "SLOTDB_DEGREE",
        default_value_t = DEFAULT_DEGREE,
        help = "B-tree minimum degree, used only when the index is created"
    )]
    degree: u16,

    #[arg(long, global = true, help = "fsync after every write")]
    sync: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a record with the next id
    Insert {
        #[arg(value_name = "FIELD", required = true, help = "Typed field, e.g. i:3 s:BR-116")]
        fields: Vec<FieldValue>,
    },
    /// Print the record with this id
    Get { key: i32 },
    /// Replace the fields of a record
    Update {
        key: i32,
        #[arg(value_name = "FIELD", required = true)]
        fields: Vec<FieldValue>,
    },
    /// Tombstone a record
    Delete { key: i32 },
    /// Print live records
    Scan(ScanCmd),
    /// Check the index and its agreement with the heap file
    Verify,
    /// Print store statistics
    Stats,
}

#[derive(Args, Debug)]
struct ScanCmd {
    #[arg(long, value_name = "KEY", help = "Stop after the first id above KEY")]
    until: Option<i32>,

    #[arg(long, conflicts_with = "until", help = "Walk in key order through the index")]
    ordered: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> slotdb::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = StoreConfig::with_paths(cli.open.data, cli.open.index)
        .with_degree(cli.open.degree)
        .with_sync_writes(cli.open.sync);
    let mut store = RecordStore::open(config)?;

    execute(&mut store, cli.command, &mut io::stdout().lock())?;
    store.sync()
}

/// Run one command against an open store, writing its output to `out`.
///
/// A missing key is a normal answer, not a failure: it is reported on `out`
/// and the command succeeds. Only I/O, corruption and similar faults
/// return `Err`.
fn execute<W: Write>(store: &mut RecordStore, command: Command, out: &mut W) -> slotdb::Result<()> {
    match command {
        Command::Insert { fields } => {
            let id = store.insert(fields)?;
            writeln!(out, "inserted {id}")?;
        }
        Command::Get { key } => match store.get(key)? {
            Some(record) => writeln!(out, "{record}")?,
            None => writeln!(out, "key {key} not found")?,
        },
        Command::Update { key, fields } => match store.update(key, fields) {
            Ok(UpdateOutcome::InPlace(offset)) => {
                writeln!(out, "updated {key} in place at {offset}")?
            }
            Ok(UpdateOutcome::Relocated { from, to }) => {
                writeln!(out, "updated {key}, relocated from {from} to {to}")?
            }
            Err(Error::KeyNotFound(_)) => writeln!(out, "key {key} not found")?,
            Err(e) => return Err(e),
        },
        Command::Delete { key } => match store.delete(key) {
            Ok(()) => writeln!(out, "deleted {key}")?,
            Err(Error::KeyNotFound(_)) => writeln!(out, "key {key} not found")?,
            Err(e) => return Err(e),
        },
        Command::Scan(cmd) => {
            let mut write_error = None;
            let mut visited = 0;
            let mut print = |record: &Record| {
                visited += 1;
                if let Err(e) = writeln!(out, "{record}") {
                    write_error.get_or_insert(e);
                }
            };

            let reached = if cmd.ordered {
                store.scan_ordered(&mut print)?;
                true
            } else if let Some(until) = cmd.until {
                store.scan_until(until, &mut print)?.is_some()
            } else {
                store.scan_all(&mut print)?;
                true
            };
            drop(print);

            if let Some(e) = write_error {
                return Err(e.into());
            }
            if let (false, Some(until)) = (reached, cmd.until) {
                writeln!(out, "key {until} not reached by scan")?;
            }
            writeln!(out, "{visited} record(s)")?;
        }
        Command::Verify => {
            let shape = store.validate()?;
            writeln!(
                out,
                "ok: height {}, {} node(s), {} leaf(s), {} live, {} dead",
                shape.height, shape.nodes, shape.leaves, shape.live_entries, shape.dead_entries
            )?;
        }
        Command::Stats => {
            let shape = store.validate()?;
            writeln!(out, "data file:   {} bytes", store.data_len())?;
            writeln!(out, "last id:     {}", store.last_id())?;
            writeln!(out, "degree:      {}", store.degree())?;
            writeln!(out, "index:       height {}, {} node(s)", shape.height, shape.nodes)?;
            writeln!(out, "live keys:   {}", shape.live_entries)?;
            writeln!(out, "dead keys:   {}", shape.dead_entries)?;
            writeln!(out, "{}", store.stats())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_command(store: &mut RecordStore, command: Command) -> (slotdb::Result<()>, String) {
        let mut out = Vec::new();
        let result = execute(store, command, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    fn open_store(dir: &std::path::Path) -> RecordStore {
        RecordStore::open(StoreConfig::new(dir).with_degree(2)).unwrap()
    }

    #[test]
    fn test_missing_key_is_a_normal_answer() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path());

        let (result, out) = run_command(&mut store, Command::Get { key: 42 });
        assert!(result.is_ok());
        assert_eq!(out, "key 42 not found\n");

        let (result, out) = run_command(
            &mut store,
            Command::Update {
                key: 42,
                fields: vec![FieldValue::from(1)],
            },
        );
        assert!(result.is_ok());
        assert_eq!(out, "key 42 not found\n");

        let (result, out) = run_command(&mut store, Command::Delete { key: 42 });
        assert!(result.is_ok());
        assert_eq!(out, "key 42 not found\n");
    }

    #[test]
    fn test_insert_get_delete() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path());

        let (result, out) = run_command(
            &mut store,
            Command::Insert {
                fields: vec![FieldValue::from("BR-116"), FieldValue::from(3)],
            },
        );
        result.unwrap();
        assert_eq!(out, "inserted 1\n");

        let (result, out) = run_command(&mut store, Command::Get { key: 1 });
        result.unwrap();
        assert_eq!(out, format!("{}\n", store.get(1).unwrap().unwrap()));

        let (result, out) = run_command(&mut store, Command::Delete { key: 1 });
        result.unwrap();
        assert_eq!(out, "deleted 1\n");
    }

    #[test]
    fn test_scan_until_reports_unreached_key() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path());
        store.bulk_load((0..3).map(|i| vec![FieldValue::from(i)])).unwrap();

        let (result, out) = run_command(
            &mut store,
            Command::Scan(ScanCmd {
                until: Some(9),
                ordered: false,
            }),
        );
        result.unwrap();
        assert!(out.ends_with("key 9 not reached by scan\n3 record(s)\n"));
    }

    #[test]
    fn test_fault_still_fails() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path());
        store.insert_record(&Record::new(i32::MAX, vec![])).unwrap();

        let (result, _) = run_command(
            &mut store,
            Command::Insert {
                fields: vec![FieldValue::from(1)],
            },
        );
        assert!(matches!(result, Err(Error::IdSpaceExhausted)));
    }
}
