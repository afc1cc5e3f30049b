//! Larder CLI - run the server, manage catalogs and query recipes

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use larder_client::LarderClient;
use larder_core::RecipeId;
use larder_scoring::RecommendationContext;
use larder_search::{EngineConfig, SearchFilters, SearchQuery, SortDirection};
use larder_server::ServerConfig;
use larder_store::RecipeStore;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("larder=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let command = &args[1];
    let rest = &args[2..];

    match command.as_str() {
        "help" | "--help" | "-h" => print_help(),
        "server" => run_server(rest).await?,
        "init-store" => {
            if rest.len() < 2 {
                eprintln!("Usage: larder init-store <path> <name>");
                return Ok(());
            }
            init_store(&rest[0], &rest[1]).await?;
        }
        "add-recipe" => {
            if rest.len() < 2 {
                eprintln!("Usage: larder add-recipe <store> <recipes.json>");
                return Ok(());
            }
            add_recipes(&rest[0], &rest[1]).await?;
        }
        "search" => search(rest, false).await?,
        "facets" => search(rest, true).await?,
        "suggest" => {
            if rest.is_empty() {
                eprintln!("Usage: larder suggest <prefix> [limit]");
                return Ok(());
            }
            let limit = parse_limit(rest.get(1))?;
            print_json(&connect().await?.suggest(rest[0].as_str(), limit).await?)?;
        }
        "similar" => {
            if rest.is_empty() {
                eprintln!("Usage: larder similar <recipe-id> [limit]");
                return Ok(());
            }
            let id = RecipeId::parse(&rest[0]).with_context(|| format!("invalid recipe id '{}'", rest[0]))?;
            let limit = parse_limit(rest.get(1))?;
            print_json(&connect().await?.similar_recipes(id, limit).await?)?;
        }
        "recommend" => recommend(rest).await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_help();
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Larder CLI - Recipe search and recommendations

USAGE:
    larder <COMMAND> [OPTIONS]

COMMANDS:
    help            Show this help message
    server          Start the Larder server
    init-store      Create a new recipe catalog
    add-recipe      Import recipes from a JSON file into a catalog
    search          Search recipes
    facets          Show facet counts for a search
    suggest         Suggest recipe titles for a prefix
    similar         Find recipes similar to a recipe
    recommend       Recommend recipes for a context

SERVER OPTIONS:
    --catalog <path>      Recipe catalog (default: recipes.larder)
    --config <file>       Engine configuration JSON
    --addr <host:port>    Listen address (default: 127.0.0.1:9877)

SEARCH OPTIONS:
    --cuisine <a,b>       --category <a,b>      --difficulty <a,b>
    --ingredient <a,b>    --min-time <min>      --max-time <min>
    --sort <field>        --asc                 --page <n>    --limit <n>
    --user <id>

ENVIRONMENT:
    LARDER_SERVER         Server URL for query commands
    LARDER_BACKEND        aggregation | full_text
    LARDER_ANALYTICS_LOG  Append analytics as JSON lines to this file
    LARDER_INDEX_DIR      Keep the full-text index on disk

EXAMPLES:
    larder init-store ./recipes.larder "Family recipes"
    larder add-recipe ./recipes.larder recipes.json
    larder server --catalog ./recipes.larder
    larder search spicy chicken --cuisine mexican --limit 5
    larder suggest "chicken ti"
    larder recommend context.json 5
"#
    );
}

async fn run_server(args: &[String]) -> Result<()> {
    let mut config = ServerConfig::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--catalog" => config.catalog_path = PathBuf::from(value(&mut iter, arg)?),
            "--config" => config.engine = EngineConfig::load(value(&mut iter, arg)?).await?,
            "--addr" => {
                let addr = value(&mut iter, arg)?;
                config.addr = addr.parse().with_context(|| format!("invalid address '{}'", addr))?;
            }
            other => bail!("unknown server option '{}'", other),
        }
    }
    config.engine = config.engine.from_env()?;

    println!(
        "Starting Larder server on {} ({} backend)...",
        config.addr, config.engine.backend
    );
    larder_server::run_server(config).await?;
    Ok(())
}

async fn init_store(path: &str, name: &str) -> Result<()> {
    let store = RecipeStore::create(path, name).await?;
    println!("Created catalog: {}", store.manifest().id);
    println!("Name: {}", store.manifest().name);
    Ok(())
}

async fn add_recipes(path: &str, file: &str) -> Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file))?;

    let mut store = RecipeStore::open(path).await?;
    let ids = store.import_json(&json)?;
    store.flush().await?;

    println!("Imported {} recipes", ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

async fn search(args: &[String], facets_only: bool) -> Result<()> {
    let (query, user) = parse_query(args)?;
    let mut client = connect().await?;
    if let Some(user) = user {
        client = client.with_user(user);
    }

    if facets_only {
        print_json(&client.facets(query).await?)
    } else {
        let results = client.search(query).await?;
        println!("{} matches (page {} of {})", results.total, results.page, results.total_pages);
        for result in &results.results {
            match result.score {
                Some(score) => println!("  {:>6.2}  {}  {}", score, result.id, result.title),
                None => println!("  {}  {}", result.id, result.title),
            }
        }
        Ok(())
    }
}

async fn recommend(args: &[String]) -> Result<()> {
    let context = match args.first() {
        Some(file) => {
            let json = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("reading {}", file))?;
            serde_json::from_str(&json).with_context(|| format!("parsing {}", file))?
        }
        None => RecommendationContext::default(),
    };
    let limit = parse_limit(args.get(1))?;

    let recommendations = connect().await?.recommend(context, limit).await?;
    for rec in &recommendations {
        println!("  {:.3}  {}  {}", rec.score, rec.recipe.id, rec.recipe.title);
    }
    Ok(())
}

/// Free words become the text; flags become filters, sort and paging
fn parse_query(args: &[String]) -> Result<(SearchQuery, Option<String>)> {
    let mut words = Vec::new();
    let mut filters = SearchFilters::default();
    let mut query = SearchQuery::new();
    let mut sort_field = None;
    let mut direction = SortDirection::Desc;
    let mut min_time = None;
    let mut max_time = None;
    let mut user = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cuisine" => filters.cuisine = list(value(&mut iter, arg)?),
            "--category" => filters.category = list(value(&mut iter, arg)?),
            "--difficulty" => filters.difficulty = list(value(&mut iter, arg)?),
            "--ingredient" => filters.ingredients = list(value(&mut iter, arg)?),
            "--min-time" => min_time = Some(number(value(&mut iter, arg)?)?),
            "--max-time" => max_time = Some(number(value(&mut iter, arg)?)?),
            "--sort" => sort_field = Some(value(&mut iter, arg)?.to_string()),
            "--asc" => direction = SortDirection::Asc,
            "--page" => query = query.with_page(number(value(&mut iter, arg)?)?),
            "--limit" => query = query.with_limit(number(value(&mut iter, arg)?)?),
            "--user" => user = Some(value(&mut iter, arg)?.to_string()),
            flag if flag.starts_with("--") => bail!("unknown search option '{}'", flag),
            word => words.push(word),
        }
    }

    if min_time.is_some() || max_time.is_some() {
        filters = filters.with_time(min_time, max_time);
    }
    query = query.with_filters(filters);
    if !words.is_empty() {
        query = query.with_text(words.join(" "));
    }
    if let Some(field) = sort_field {
        query = query.with_sort(field, direction);
    }
    Ok((query, user))
}

fn value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .with_context(|| format!("{} needs a value", flag))
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn number(value: &str) -> Result<u32> {
    value.parse().with_context(|| format!("expected a number, got '{}'", value))
}

fn parse_limit(arg: Option<&String>) -> Result<u32> {
    match arg {
        Some(limit) => number(limit),
        None => Ok(10),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect() -> Result<LarderClient> {
    let client = LarderClient::from_env().await?;
    Ok(client)
}
