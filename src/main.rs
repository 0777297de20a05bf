use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ecdbmap::config::{self, ReaderConfig};
use ecdbmap::connection::{get_cache, Connection};
use ecdbmap::json_reader::{Int64Format, MemberNameCasing};
use ecdbmap::property_map::{DbSchema, SchemaMapper};
use ecdbmap::relationship_path::{PathEnd, RelationshipPath};
use ecdbmap::schema_catalog::{CatalogConfig, SchemaCatalog};

/// ecdbmap - relationship paths and property mapping for EC schemas
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema catalog definition (YAML or JSON)
    #[arg(long)]
    catalog: PathBuf,

    /// Reader configuration file (YAML); overrides the reader options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Take reader options from ECDBMAP_* environment variables
    #[arg(long)]
    from_env: bool,

    #[command(flatten)]
    reader: ReaderArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ReaderArgs {
    /// Schema searched first for unqualified class names
    #[arg(long)]
    default_schema: Option<String>,

    /// Select path roots with ONLY
    #[arg(long)]
    no_polymorphic: bool,

    /// Reference classes by bare name in generated ECSQL
    #[arg(long)]
    unqualified_class_names: bool,

    /// Prepared statement cache size
    #[arg(long, default_value_t = 256)]
    statement_cache_max_entries: usize,

    /// Read related items along with each instance
    #[arg(long)]
    expand_related_items: bool,

    #[arg(long, value_enum, default_value_t = MemberNameCasing::KeepOriginal)]
    member_name_casing: MemberNameCasing,

    #[arg(long, value_enum, default_value_t = Int64Format::AsHexadecimalString)]
    int64_format: Int64Format,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a relationship path and print the ECSQL it compiles to
    Path {
        path: String,

        /// Reverse the path before compiling it
        #[arg(long)]
        reverse: bool,

        /// End whose instance id is bound to the statement parameter
        #[arg(long, value_enum, default_value_t = FilterEnd::Root)]
        filter: FilterEnd,
    },
    /// Map every class and print the mapping table as JSON
    Map {
        /// Write the mapping table here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the related-items paths declared per parent class
    Specs,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterEnd {
    Root,
    Leaf,
}

impl From<FilterEnd> for PathEnd {
    fn from(end: FilterEnd) -> Self {
        match end {
            FilterEnd::Root => PathEnd::Root,
            FilterEnd::Leaf => PathEnd::Leaf,
        }
    }
}

impl From<ReaderArgs> for config::CliConfig {
    fn from(args: ReaderArgs) -> Self {
        config::CliConfig {
            default_schema: args.default_schema,
            no_polymorphic: args.no_polymorphic,
            unqualified_class_names: args.unqualified_class_names,
            statement_cache_max_entries: args.statement_cache_max_entries,
            expand_related_items: args.expand_related_items,
            member_name_casing: args.member_name_casing,
            int64_format: args.int64_format,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut reader_config = if cli.from_env {
        ReaderConfig::from_env()?
    } else {
        ReaderConfig::from_cli(cli.reader.into())?
    };
    if let Some(path) = &cli.config {
        reader_config.merge(ReaderConfig::from_yaml_file(path)?);
    }

    let catalog = CatalogConfig::from_file(&cli.catalog)
        .and_then(|c| c.to_catalog())
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    log::info!(
        "Loaded {} schema(s), {} classes",
        catalog.schemas().len(),
        catalog.classes().len()
    );

    match cli.command {
        Command::Path {
            path,
            reverse,
            filter,
        } => print_path(&catalog, &reader_config, &path, reverse, filter.into()),
        Command::Map { output } => print_mapping(&catalog, output),
        Command::Specs => {
            print_specs(catalog);
            Ok(())
        }
    }
}

fn print_path(
    catalog: &SchemaCatalog,
    config: &ReaderConfig,
    text: &str,
    reverse: bool,
    filter: PathEnd,
) -> Result<()> {
    let mut path = RelationshipPath::parse(text, catalog, config.default_schema.as_deref())?;
    path.validate(catalog)?;
    if reverse {
        path.reverse();
    }
    let sql = path.generate_ecsql(&config.ecsql_options())?;
    let columns = [
        sql.leaf.instance_id_expression.clone(),
        sql.leaf.class_id_expression.clone(),
    ];
    println!("{}", path);
    println!("{}", sql.to_select(&columns, filter));
    Ok(())
}

fn print_mapping(catalog: &SchemaCatalog, output: Option<PathBuf>) -> Result<()> {
    let mut mapper = SchemaMapper::new(catalog, DbSchema::new());
    mapper.map_all()?;
    log::info!(
        "Mapped {} classes into {} tables",
        mapper.class_maps().count(),
        mapper.factory().tables().len()
    );
    let json = mapper.save()?.to_json()?;
    match output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("writing mapping table {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn print_specs(catalog: SchemaCatalog) {
    let connection = Connection::new(Arc::new(catalog));
    let cache = get_cache(&connection);
    for class_id in cache.parent_classes() {
        let Ok(class) = connection.catalog().get_class(class_id) else {
            continue;
        };
        println!("{}", class.full_name());
        for path in cache.related_paths_from_class(class_id).unwrap_or_default() {
            println!("  {}", path);
        }
    }
    for skipped in cache.skipped() {
        eprintln!("skipped: {}", skipped);
    }
}
