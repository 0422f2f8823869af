use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;

use discfit::container;
use discfit::error::DiscfitError;
use discfit::finder;
use discfit::item;
use discfit::listing;
use discfit::report;

#[derive(Parser)]
#[command(name = "discfit")]
#[command(about = "Find the file combinations that best fill fixed-capacity discs", long_about = None)]
struct Cli {
    /// Directory to scan, an ls -l listing file, or - for a listing on stdin
    source: String,

    /// Stop extending a branch once two or more items saturate a class
    /// (faster, may miss tighter many-item fits)
    #[arg(long)]
    fast: bool,

    /// Ignore files smaller than this; K/M/G suffixes are powers of 1024
    #[arg(long)]
    min_size: Option<String>,

    /// How many ranked combinations to print
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// JSON file of label -> capacity, replacing the built-in class table
    #[arg(long)]
    classes: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("[discfit] {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), DiscfitError> {
    let cli = Cli::parse();
    let started = Instant::now();

    let classes = match &cli.classes {
        Some(path) => container::load_classes(path)?,
        None => container::validate(container::default_classes())?,
    };

    let mut items = listing::load_items(&cli.source)?;
    if let Some(min_size) = &cli.min_size {
        let min_size = item::parse_size(min_size)?;
        items = item::apply_min_size(items, min_size);
    }
    item::sort_for_search(&mut items);

    println!(
        "[discfit] {} item(s) against {} container class(es){}",
        items.len(),
        classes.len(),
        if cli.fast { ", fast mode" } else { "" }
    );

    let results = finder::find_best_fits(&items, &classes, cli.fast);
    println!("[discfit] {} boundary combination(s) recorded", results.len());

    let ranked = report::rank(&results, &items, &classes, cli.top);
    print!("{}", report::render(&ranked));

    println!("[discfit] elapsed: {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}
