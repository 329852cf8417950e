use anyhow::{Context, Result};
use census_rs::{Client, ClientConfig, Dataset, Geography, Query, storage};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "census",
    version,
    about = "Query U.S. Census Bureau tables and export them as tidy or wide CSV/JSON"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a table (print as CSV, or save with --out).
    Get(GetArgs),
    /// List or search the variable catalog of a dataset.
    Vars(VarsArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct Common {
    /// Dataset (acs5, acs1, acs5/subject, pl, dhc, pep, flows, ...)
    #[arg(short, long)]
    dataset: Dataset,
    /// Survey or vintage year (e.g., 2019)
    #[arg(short, long)]
    year: i32,
    /// API key (defaults to CENSUS_API_KEY)
    #[arg(long)]
    key: Option<String>,
    /// Persist variable catalogs on disk (CENSUS_CACHE_DIR or the platform cache dir)
    #[arg(long, default_value_t = false)]
    cache: bool,
}

#[derive(Args, Debug)]
struct GetArgs {
    #[command(flatten)]
    common: Common,
    /// Geography level (state, county, tract, "block group", place, cbsa, ...)
    #[arg(short, long)]
    geography: Geography,
    /// Variable codes separated by comma or semicolon (e.g., B01003_001,B19013_001)
    #[arg(short, long, conflicts_with = "table")]
    variables: Option<String>,
    /// Table id; expands to all of its variables (e.g., B01001)
    #[arg(short, long)]
    table: Option<String>,
    /// State filter: FIPS code, abbreviation or name. Repeatable, or comma separated.
    #[arg(long)]
    state: Vec<String>,
    /// County filter: 3-digit FIPS code, or 5-digit state+county. Repeatable, or comma separated.
    #[arg(long)]
    county: Vec<String>,
    /// Output name for a variable, as name=CODE. Repeatable.
    #[arg(long)]
    alias: Vec<String>,
    /// Extra dimension field (e.g., AGEGROUP, SEX). Repeatable.
    #[arg(long)]
    breakdown: Vec<String>,
    /// One row per entity instead of one row per (entity, variable).
    #[arg(long, default_value_t = false)]
    wide: bool,
    /// Check variable codes against the catalog before fetching.
    #[arg(long, default_value_t = false)]
    verify: bool,
    /// Save results to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Print the request URLs (key masked) and exit without fetching data.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Log each request URL (key masked) before sending it.
    #[arg(long, default_value_t = false)]
    show_call: bool,
}

#[derive(Args, Debug)]
struct VarsArgs {
    #[command(flatten)]
    common: Common,
    /// Case-insensitive regex over code, label and concept.
    #[arg(short, long)]
    search: Option<String>,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn flatten_lists(items: &[String]) -> Vec<String> {
    items.iter().flat_map(|s| parse_list(s)).collect()
}

fn client(common: &Common, show_call: bool) -> Result<Client> {
    let mut config = ClientConfig::default()
        .cache_catalog(common.cache)
        .show_call(show_call);
    if let Some(key) = &common.key {
        config = config.api_key(key.clone());
    }
    Ok(Client::new(config.resolve_env())?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_call = matches!(&cli.cmd, Command::Get(a) if a.show_call);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if show_call { "info" } else { "warn" }),
    )
    .init();

    match cli.cmd {
        Command::Get(args) => cmd_get(args),
        Command::Vars(args) => cmd_vars(args),
    }
}

fn build_query(args: &GetArgs) -> Result<Query> {
    let c = &args.common;
    let mut q = Query::new(c.dataset, c.year, args.geography).verify_variables(args.verify);
    if let Some(vars) = &args.variables {
        q = q.variables(parse_list(vars));
    }
    if let Some(table) = &args.table {
        q = q.table(table.clone());
    }
    for s in flatten_lists(&args.state) {
        q = q.state(s);
    }
    for county in flatten_lists(&args.county) {
        q = q.county(county);
    }
    for a in &args.alias {
        let (name, code) = a
            .split_once('=')
            .with_context(|| format!("invalid --alias `{a}`, expected name=CODE"))?;
        q = q.alias(name.trim(), code.trim());
    }
    for b in flatten_lists(&args.breakdown) {
        q = q.breakdown(b);
    }
    if args.wide {
        q = q.wide();
    }
    Ok(q)
}

fn cmd_get(args: GetArgs) -> Result<()> {
    let query = build_query(&args)?;
    let client = client(&args.common, args.show_call)?;

    if args.dry_run {
        for line in client.show_call(&query)? {
            println!("{line}");
        }
        return Ok(());
    }

    let table = client.fetch(&query)?;

    match args.out.as_ref() {
        Some(path) => {
            let fmt = match args.format {
                Some(OutFormat::Csv) => "csv",
                Some(OutFormat::Json) => "json",
                None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
            }
            .to_ascii_lowercase();
            match fmt.as_str() {
                "csv" => storage::save_csv(&table, path)?,
                "json" => storage::save_json(&table, path)?,
                other => anyhow::bail!("unsupported format: {}", other),
            }
            eprintln!("Saved {} rows to {}", table.len(), path.display());
        }
        None => {
            match args.format {
                Some(OutFormat::Json) => println!("{}", serde_json::to_string_pretty(&table)?),
                _ => storage::write_csv(&table, std::io::stdout().lock())?,
            }
            eprintln!("Fetched {} rows", table.len());
        }
    }
    Ok(())
}

fn cmd_vars(args: VarsArgs) -> Result<()> {
    let c = &args.common;
    let client = client(c, false)?;
    let vars = match &args.search {
        Some(pattern) => client.search_variables(c.dataset, c.year, pattern)?,
        None => client.load_variables(c.dataset, c.year)?.to_vec(),
    };
    for v in &vars {
        println!("{}\t{}\t{}", v.code, v.label, v.concept);
    }
    eprintln!("{} variables", vars.len());
    Ok(())
}
