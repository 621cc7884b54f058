//! fieldwise - command line front end for the merge-diff engine.
//!
//! Performs schema-directed operations on YAML/JSON documents: validate,
//! merge, compare, enumerate ownable fields, extract, and remove.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use fieldwise::typed::{ParseableType, Parser};
use fieldwise::{value, FieldSet};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!(
        r#"fieldwise {} - schema-directed merge and diff

USAGE:
    fieldwise [OPTIONS] <COMMAND>

OPTIONS:
    -s, --schema <FILE>      Path to the schema file (required)
    -t, --type-name <NAME>   Name of the type in the schema to use
    -o, --output <FILE>      Output location, '-' for stdout (default: -)
    -h, --help               Print help information
    -V, --version            Print version information

COMMANDS:
    list-types               List all types in the schema
    validate <FILE>          Validate a YAML/JSON file against the schema
    merge --lhs <FILE> --rhs <FILE>
                             Merge two YAML/JSON files
    compare --lhs <FILE> --rhs <FILE>
                             Compare two YAML/JSON files
    fieldset <FILE>          Print the ownable field paths of a file
    extract <FILE> --fields <FS>
                             Keep only the paths named in a fieldset file
    remove <FILE> --fields <FS>
                             Drop the paths named in a fieldset file
"#,
        VERSION
    );
}

#[derive(Debug)]
struct Cli {
    schema: PathBuf,
    type_name: Option<String>,
    output: String,
    command: Command,
}

#[derive(Debug)]
enum Command {
    ListTypes,
    Validate { file: PathBuf },
    Merge { lhs: PathBuf, rhs: PathBuf },
    Compare { lhs: PathBuf, rhs: PathBuf },
    Fieldset { file: PathBuf },
    Extract { file: PathBuf, fields: PathBuf },
    Remove { file: PathBuf, fields: PathBuf },
}

fn value_of(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn lhs_rhs(args: &[String], i: &mut usize, name: &str) -> Result<(PathBuf, PathBuf), String> {
    let mut lhs: Option<PathBuf> = None;
    let mut rhs: Option<PathBuf> = None;
    while *i + 1 < args.len() {
        match args[*i + 1].as_str() {
            "--lhs" => {
                *i += 1;
                lhs = Some(PathBuf::from(value_of(args, i, "--lhs")?));
            }
            "--rhs" => {
                *i += 1;
                rhs = Some(PathBuf::from(value_of(args, i, "--rhs")?));
            }
            _ => break,
        }
    }
    match (lhs, rhs) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(format!("{} requires --lhs and --rhs", name)),
    }
}

fn file_fields(args: &[String], i: &mut usize, name: &str) -> Result<(PathBuf, PathBuf), String> {
    let file = PathBuf::from(value_of(args, i, name)?);
    let mut fields: Option<PathBuf> = None;
    while *i + 1 < args.len() {
        match args[*i + 1].as_str() {
            "--fields" => {
                *i += 1;
                fields = Some(PathBuf::from(value_of(args, i, "--fields")?));
            }
            _ => break,
        }
    }
    match fields {
        Some(f) => Ok((file, f)),
        None => Err(format!("{} requires --fields", name)),
    }
}

fn parse_args() -> Result<Cli, String> {
    let args: Vec<String> = env::args().collect();
    let mut i = 1;

    let mut schema: Option<PathBuf> = None;
    let mut type_name: Option<String> = None;
    let mut output = "-".to_string();
    let mut command: Option<Command> = None;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("fieldwise {}", VERSION);
                std::process::exit(0);
            }
            "-s" | "--schema" => schema = Some(PathBuf::from(value_of(&args, &mut i, "--schema")?)),
            "-t" | "--type-name" => type_name = Some(value_of(&args, &mut i, "--type-name")?),
            "-o" | "--output" => output = value_of(&args, &mut i, "--output")?,
            "list-types" => command = Some(Command::ListTypes),
            "validate" => {
                let file = PathBuf::from(value_of(&args, &mut i, "validate")?);
                command = Some(Command::Validate { file });
            }
            "merge" => {
                let (lhs, rhs) = lhs_rhs(&args, &mut i, "merge")?;
                command = Some(Command::Merge { lhs, rhs });
            }
            "compare" => {
                let (lhs, rhs) = lhs_rhs(&args, &mut i, "compare")?;
                command = Some(Command::Compare { lhs, rhs });
            }
            "fieldset" => {
                let file = PathBuf::from(value_of(&args, &mut i, "fieldset")?);
                command = Some(Command::Fieldset { file });
            }
            "extract" => {
                let (file, fields) = file_fields(&args, &mut i, "extract")?;
                command = Some(Command::Extract { file, fields });
            }
            "remove" => {
                let (file, fields) = file_fields(&args, &mut i, "remove")?;
                command = Some(Command::Remove { file, fields });
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    let schema = schema.ok_or("Missing required option: --schema")?;
    let command = command.ok_or("Missing command")?;

    Ok(Cli {
        schema,
        type_name,
        output,
        command,
    })
}

fn read_to_string(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

fn write_output(output: &str, text: &str) -> Result<(), String> {
    if output == "-" {
        io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| e.to_string())
    } else {
        fs::write(output, text).map_err(|e| format!("cannot write {}: {}", output, e))
    }
}

fn resolve_type(parser: &Parser, cli: &Cli) -> Result<ParseableType, String> {
    let name = match &cli.type_name {
        Some(name) => name.clone(),
        None => parser
            .type_names()
            .first()
            .map(|s| s.to_string())
            .ok_or("schema defines no types")?,
    };
    let pt = parser.type_by_name(&name);
    if !pt.is_valid() {
        return Err(format!("no type named {:?} in schema", name));
    }
    Ok(pt)
}

fn load(pt: &ParseableType, path: &PathBuf) -> Result<fieldwise::TypedValue, String> {
    let text = read_to_string(path)?;
    pt.from_yaml(&text).map_err(|e| e.to_string())
}

fn run(cli: Cli) -> Result<(), String> {
    let schema_text = read_to_string(&cli.schema)?;
    let parser = Parser::new(&schema_text).map_err(|e| e.to_string())?;

    match &cli.command {
        Command::ListTypes => {
            let mut out = String::new();
            for name in parser.type_names() {
                out.push_str(name);
                out.push('\n');
            }
            write_output(&cli.output, &out)
        }
        Command::Validate { file } => {
            let pt = resolve_type(&parser, &cli)?;
            load(&pt, file)?;
            write_output(&cli.output, "ok\n")
        }
        Command::Merge { lhs, rhs } => {
            let pt = resolve_type(&parser, &cli)?;
            let merged = load(&pt, lhs)?
                .merge(&load(&pt, rhs)?)
                .map_err(|e| e.to_string())?;
            let text = value::to_yaml(merged.value()).map_err(|e| e.to_string())?;
            write_output(&cli.output, &text)
        }
        Command::Compare { lhs, rhs } => {
            let pt = resolve_type(&parser, &cli)?;
            let comparison = load(&pt, lhs)?
                .compare(&load(&pt, rhs)?)
                .map_err(|e| e.to_string())?;
            if comparison.is_same() {
                write_output(&cli.output, "no differences\n")
            } else {
                write_output(&cli.output, &format!("{}\n", comparison))
            }
        }
        Command::Fieldset { file } => {
            let pt = resolve_type(&parser, &cli)?;
            let fs = load(&pt, file)?.to_field_set().map_err(|e| e.to_string())?;
            let text = fs.to_wire_json().map_err(|e| e.to_string())?;
            write_output(&cli.output, &format!("{}\n", text))
        }
        Command::Extract { file, fields } | Command::Remove { file, fields } => {
            let pt = resolve_type(&parser, &cli)?;
            let tv = load(&pt, file)?;
            let fs_text = read_to_string(fields)?;
            let fs = FieldSet::from_wire_json(&fs_text).map_err(|e| e.to_string())?;
            let out = match &cli.command {
                Command::Extract { .. } => tv.extract_items(&fs),
                _ => tv.remove_items(&fs),
            };
            let text = value::to_yaml(out.value()).map_err(|e| e.to_string())?;
            write_output(&cli.output, &text)
        }
    }
}

fn main() -> ExitCode {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {}", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
