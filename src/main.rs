use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use swan_db::annotations::AnnotationStore;
use swan_db::catalog::Catalog;
use swan_db::lists::export_bio_lists;
use swan_db::pad::{build_pad_lists_from_root, PadTable};
use swan_db::protocol::{materialize, ProtocolTable};
use swan_db::{logging, Config, Database, ObjectQuery};

#[derive(Debug, Default)]
struct Cli {
    config_path: Option<PathBuf>,
    command: Option<Command>,
}

#[derive(Debug)]
enum Command {
    Create {
        recreate: bool,
        datadir: Option<PathBuf>,
    },
    DumpList {
        query: ObjectQuery,
        directory: Option<PathBuf>,
        extension: String,
        annotated: bool,
    },
    CheckFiles {
        directory: Option<PathBuf>,
        extension: String,
    },
    PadLists {
        datadir: Option<PathBuf>,
        output: Option<PathBuf>,
        seed: Option<u64>,
    },
    BioLists {
        output: PathBuf,
    },
}

fn value(args: &[String], i: &mut usize) -> String {
    if *i + 1 < args.len() {
        *i += 1;
        args[*i].clone()
    } else {
        eprintln!("Error: {} requires an argument", args[*i]);
        std::process::exit(1);
    }
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = Cli::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("swan-db {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                cli.config_path = Some(PathBuf::from(value(&args, &mut i)));
            }
            "create" if cli.command.is_none() => {
                cli.command = Some(Command::Create {
                    recreate: false,
                    datadir: None,
                });
            }
            "dumplist" if cli.command.is_none() => {
                cli.command = Some(Command::DumpList {
                    query: ObjectQuery::default(),
                    directory: None,
                    extension: String::new(),
                    annotated: false,
                });
            }
            "checkfiles" if cli.command.is_none() => {
                cli.command = Some(Command::CheckFiles {
                    directory: None,
                    extension: String::new(),
                });
            }
            "pad-lists" if cli.command.is_none() => {
                cli.command = Some(Command::PadLists {
                    datadir: None,
                    output: None,
                    seed: None,
                });
            }
            "bio-lists" if cli.command.is_none() => {
                cli.command = Some(Command::BioLists {
                    output: PathBuf::from("lists"),
                });
            }
            flag => match (&mut cli.command, flag) {
                (Some(Command::Create { recreate, .. }), "--recreate" | "-R") => *recreate = true,
                (
                    Some(Command::Create { datadir, .. } | Command::PadLists { datadir, .. }),
                    "--datadir" | "-D",
                ) => *datadir = Some(PathBuf::from(value(&args, &mut i))),
                (Some(Command::DumpList { query, .. }), "--protocol" | "-p") => {
                    query.protocol = Some(value(&args, &mut i))
                }
                (Some(Command::DumpList { query, .. }), "--group" | "-g") => {
                    query.groups.push(value(&args, &mut i))
                }
                (Some(Command::DumpList { query, .. }), "--purpose" | "-u") => {
                    query.purposes.push(value(&args, &mut i))
                }
                (Some(Command::DumpList { query, .. }), "--gender") => {
                    query.genders.push(value(&args, &mut i))
                }
                (Some(Command::DumpList { query, .. }), "--device") => {
                    query.devices.push(value(&args, &mut i))
                }
                (Some(Command::DumpList { query, .. }), "--model") => {
                    let raw = value(&args, &mut i);
                    match raw.parse() {
                        Ok(id) => query.model_ids.push(id),
                        Err(_) => {
                            eprintln!("Error: invalid model id {}", raw);
                            std::process::exit(1);
                        }
                    }
                }
                (Some(Command::DumpList { annotated, .. }), "--annotated") => *annotated = true,
                (
                    Some(
                        Command::DumpList { directory, .. } | Command::CheckFiles { directory, .. },
                    ),
                    "--directory" | "-d",
                ) => *directory = Some(PathBuf::from(value(&args, &mut i))),
                (
                    Some(
                        Command::DumpList { extension, .. } | Command::CheckFiles { extension, .. },
                    ),
                    "--extension" | "-e",
                ) => *extension = value(&args, &mut i),
                (Some(Command::PadLists { output, .. }), "--output" | "-o") => {
                    *output = Some(PathBuf::from(value(&args, &mut i)))
                }
                (Some(Command::PadLists { seed, .. }), "--seed") => {
                    let raw = value(&args, &mut i);
                    match raw.parse() {
                        Ok(s) => *seed = Some(s),
                        Err(_) => {
                            eprintln!("Error: invalid seed {}", raw);
                            std::process::exit(1);
                        }
                    }
                }
                (Some(Command::BioLists { output }), "--output" | "-o") => {
                    *output = PathBuf::from(value(&args, &mut i))
                }
                _ => {
                    eprintln!("Unknown argument: {}", flag);
                    print_help();
                    std::process::exit(1);
                }
            },
        }
        i += 1;
    }

    cli
}

fn print_help() {
    println!(
        r#"swan-db - SWAN biometrics corpus catalog and protocols

USAGE:
    swan-db [OPTIONS] <COMMAND> [COMMAND OPTIONS]

COMMANDS:
    create          Scan the corpus and (re)build the catalog and protocols
        --recreate, -R          Delete an existing database first
        --datadir, -D PATH      Corpus root (default: data_dir from the config)
    dumplist        Print the files selected by a query
        --protocol, -p NAME     Protocol name (default: all)
        --group, -g GROUP       world, dev or eval (repeatable)
        --purpose, -u PURPOSE   train, enroll or probe (repeatable)
        --gender GENDER         male or female (repeatable)
        --device DEVICE         iPhone or iPad (repeatable)
        --model ID              Model (client) id (repeatable)
        --directory, -d PATH    Prefix every path
        --extension, -e EXT     Append to every path
        --annotated             Only files with eye-centre annotations
    checkfiles      Report catalogued files missing on disk
        --directory, -d PATH    Corpus root (default: data_dir from the config)
        --extension, -e EXT     Append to every path
    pad-lists       Sample and write the presentation-attack lists
        --datadir, -D PATH      Corpus root (default: data_dir from the config)
        --output, -o PATH       Output directory (default: [pad] output_dir)
        --seed N                Base seed (default: [pad] seed)
    bio-lists       Write per-protocol verification file lists
        --output, -o PATH       Output directory (default: lists)

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    SWAN_DB_CONFIG      Path to config file (overrides default location)
    SWAN_LOG            Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/swan-db/config.toml"#
    );
}

fn data_dir(config: &Config, flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(|| config.data_dir.clone())
        .context("No corpus directory: pass --datadir or set data_dir in the config")
}

fn create(config: &Config, recreate: bool, datadir: Option<PathBuf>) -> Result<()> {
    let root = data_dir(config, datadir)?;
    // Validate configured protocols before touching the disk.
    let table = ProtocolTable::builtin().with_configured(&config.protocols)?;

    if config.db_path.exists() {
        if !recreate {
            bail!(
                "{} already exists, use --recreate to rebuild it",
                config.db_path.display()
            );
        }
        tracing::info!(path = %config.db_path.display(), "Removing existing database");
        std::fs::remove_file(&config.db_path)?;
    }

    let (catalog, report) = Catalog::ingest(&root, &config.scanner, &config.bands)?;
    let materialization = materialize(&catalog, &table)?;

    let db = Database::open(&config.db_path)?;
    db.initialize()?;
    db.store_catalog(&catalog)?;
    db.store_protocols(&materialization)?;

    println!(
        "{} files discovered, {} catalogued for {} clients, {} skipped",
        report.discovered, report.admitted, report.clients, report.skipped
    );
    println!("{} protocols: {}", table.names().len(), table.names().join(", "));
    Ok(())
}

fn open_existing(config: &Config) -> Result<Database> {
    if !config.db_path.exists() {
        bail!(
            "No database at {}, run `swan-db create` first",
            config.db_path.display()
        );
    }
    Database::open(&config.db_path)
}

fn dumplist(
    config: &Config,
    query: &ObjectQuery,
    directory: Option<PathBuf>,
    extension: &str,
    annotated: bool,
) -> Result<()> {
    let db = open_existing(config)?;
    let store = AnnotationStore::from_config(config);
    for file in db.objects(query)? {
        if annotated && store.annotations(&file)?.is_none() {
            continue;
        }
        println!("{}", file.make_path(directory.as_deref(), extension).display());
    }
    Ok(())
}

fn checkfiles(config: &Config, directory: Option<PathBuf>, extension: &str) -> Result<()> {
    let root = data_dir(config, directory)?;
    let db = open_existing(config)?;
    let catalog = db.load_catalog()?;

    let mut missing = 0;
    for file in catalog.files() {
        let path = file.make_path(Some(&root), extension);
        if !path.exists() {
            missing += 1;
            println!("{}", path.display());
        }
    }
    println!(
        "{} of {} files are missing under {}",
        missing,
        catalog.files().len(),
        root.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args();

    let mut config = match cli.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let _ = logging::init(config.log_dir.as_deref());

    let Some(command) = cli.command else {
        print_help();
        std::process::exit(1);
    };

    match command {
        Command::Create { recreate, datadir } => create(&config, recreate, datadir),
        Command::DumpList {
            query,
            directory,
            extension,
            annotated,
        } => dumplist(&config, &query, directory, &extension, annotated),
        Command::CheckFiles {
            directory,
            extension,
        } => checkfiles(&config, directory, &extension),
        Command::PadLists {
            datadir,
            output,
            seed,
        } => {
            let root = data_dir(&config, datadir)?;
            if let Some(seed) = seed {
                config.pad.seed = seed;
            }
            let output = output.unwrap_or_else(|| config.pad.output_dir.clone());
            let report = build_pad_lists_from_root(&root, &PadTable::builtin(), &config, &output)?;
            println!(
                "Wrote {} repetitions for {} protocols under {}",
                report.repetitions,
                report.protocols,
                output.join("lists").display()
            );
            Ok(())
        }
        Command::BioLists { output } => {
            let db = open_existing(&config)?;
            let written = export_bio_lists(&db, &output)?;
            println!("Wrote {} lists under {}", written.len(), output.display());
            Ok(())
        }
    }
}
