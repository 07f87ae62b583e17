use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use parser::{ParseError, parse_pages};

#[derive(Parser, Debug)]
#[command(
    name = "cli_statements",
    version,
    about = "Разбирает банковскую выписку по layout-текстам её страниц.",
    long_about = None,
)]
struct Args {
    /// Файлы страниц в порядке следования (один файл - одна страница)
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Вывести транзакции как JSON вместо таблицы
    #[arg(long)]
    json: bool,

    /// Печатать события разбора в stderr
    #[arg(long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), ParseError> {
    let args = Args::parse();

    let mut pages = Vec::with_capacity(args.pages.len());
    for path in &args.pages {
        if !path.exists() {
            eprintln!("page file does not exist: {}", path.display());
            process::exit(1)
        }
        pages.push(fs::read_to_string(path)?);
    }

    let parsed = parse_pages(pages)?;

    if args.verbose {
        for event in parsed.events.iter() {
            eprintln!("{event}");
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&parsed.transactions).unwrap_or_else(|err| {
            eprintln!("failed to serialize transactions: {err}");
            process::exit(1);
        });
        println!("{json}");
    } else {
        println!("{}", parsed.kind);
        for tx in &parsed.transactions {
            println!("{tx}");
        }
    }

    Ok(())
}
