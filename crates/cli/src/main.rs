use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Item, ItemId};
use rand::seq::IndexedRandom;
use rand::Rng;
use server::{
    EngineConfig, Recommendation, RecommendationEngine, RecommendationOrchestrator,
    RecommendationRequest,
};
use sources::UserRatingQuery;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// ReelRecs - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(
    about = "Hybrid movie recommender: popularity for new users, neighbors for the rest",
    long_about = None
)]
struct Cli {
    /// Directory holding movies.csv and ratings.csv
    #[arg(short, long, default_value = "data/ml-latest-small")]
    data_dir: PathBuf,

    /// Minimum ratings for an item to count as popular
    #[arg(long, default_value_t = 20)]
    min_support: u32,

    /// Abort a request after this many milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hybrid recommendations from optional ratings and genres
    Recommend {
        /// A rating you gave, as ITEM_ID=RATING (repeatable)
        #[arg(long = "rate", value_parser = parse_rating)]
        ratings: Vec<(ItemId, f32)>,

        /// A genre you like (repeatable)
        #[arg(long = "genre")]
        genres: Vec<String>,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Most popular items, optionally by genre
    Popular {
        /// A genre you like (repeatable)
        #[arg(long = "genre")]
        genres: Vec<String>,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Collaborative recommendations only
    Personalized {
        /// A rating you gave, as ITEM_ID=RATING (repeatable)
        #[arg(long = "rate", value_parser = parse_rating, required = true)]
        ratings: Vec<(ItemId, f32)>,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Similar users to consult
        #[arg(long)]
        neighbors: Option<usize>,
    },

    /// List every genre in the catalog
    Genres,

    /// Search for movies by title
    Search {
        /// Movie title to search for (case-insensitive substring match)
        #[arg(long)]
        title: String,

        /// Maximum results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show dataset and engine statistics
    Stats,

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load data and build the engine (this may take a moment)
    eprintln!("Loading dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let config = EngineConfig::default().with_min_support(cli.min_support);
    let data_dir = cli.data_dir.clone();
    let engine = tokio::task::spawn_blocking(move || {
        RecommendationEngine::load_from_dir(&data_dir, config)
    })
    .await?
    .context("Failed to load dataset")?;
    eprintln!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    let mut orchestrator = RecommendationOrchestrator::new(engine);
    if let Some(ms) = cli.budget_ms {
        orchestrator = orchestrator.with_request_budget(Duration::from_millis(ms));
    }

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            ratings,
            genres,
            limit,
        } => handle_recommend(&orchestrator, ratings, genres, limit, cli.json).await?,
        Commands::Popular { genres, limit } => {
            handle_recommend(&orchestrator, Vec::new(), genres, limit, cli.json).await?
        }
        Commands::Personalized {
            ratings,
            limit,
            neighbors,
        } => handle_personalized(&orchestrator, ratings, limit, neighbors, cli.json).await?,
        Commands::Genres => handle_genres(&orchestrator, cli.json)?,
        Commands::Search { title, limit } => handle_search(&orchestrator, &title, limit, cli.json)?,
        Commands::Stats => handle_stats(&orchestrator, cli.json)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&orchestrator, requests, concurrent).await?,
    }

    Ok(())
}

/// Parse `ITEM_ID=RATING`
fn parse_rating(raw: &str) -> std::result::Result<(ItemId, f32), String> {
    let (id, rating) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ITEM_ID=RATING, got '{}'", raw))?;
    let id = id
        .trim()
        .parse::<ItemId>()
        .map_err(|e| format!("invalid item id '{}': {}", id, e))?;
    let rating = rating
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid rating '{}': {}", rating, e))?;
    Ok((id, rating))
}

/// Handle the 'recommend' and 'popular' commands
async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    ratings: Vec<(ItemId, f32)>,
    genres: Vec<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let mut request = RecommendationRequest::new(limit);
    if !ratings.is_empty() {
        request = request.with_ratings(ratings.into_iter().collect());
    }
    if !genres.is_empty() {
        request = request.with_genres(genres.into_iter().collect::<HashSet<String>>());
    }

    let strategy = orchestrator
        .engine()
        .strategy_for(request.user_ratings.as_ref());
    let recommendations = orchestrator.get_recommendations(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        println!("{}", format!("Strategy: {:?}", strategy).dimmed());
        print_recommendations(&recommendations);
    }
    Ok(())
}

/// Handle the 'personalized' command
async fn handle_personalized(
    orchestrator: &RecommendationOrchestrator,
    ratings: Vec<(ItemId, f32)>,
    limit: usize,
    neighbors: Option<usize>,
    json: bool,
) -> Result<()> {
    let query: UserRatingQuery = ratings.into_iter().collect();
    let recommendations = orchestrator
        .get_personalized(query, limit, neighbors)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }
    Ok(())
}

/// Handle the 'genres' command
fn handle_genres(orchestrator: &RecommendationOrchestrator, json: bool) -> Result<()> {
    let engine = orchestrator.engine();
    let genres = engine.all_genres();

    if json {
        println!("{}", serde_json::to_string_pretty(genres)?);
        return Ok(());
    }

    println!("{}", format!("{} genres:", genres.len()).bold().blue());
    for genre in genres {
        let count = engine.catalog().genre_index().items_in_genre(genre).len();
        println!("  {} {} ({} items)", "•".green(), genre, count);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(
    orchestrator: &RecommendationOrchestrator,
    title: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let engine = orchestrator.engine();
    let matches: Vec<&Item> = engine.search_items(title, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  {}", "No matches".yellow());
    }
    for item in matches {
        let genres = item.genres.iter().cloned().collect::<Vec<_>>().join(", ");
        match engine.catalog().get_item_stats(item.id) {
            Some(stats) => println!(
                "{}: {} [{}] avg {:.2} ({} ratings)",
                item.id, item.title, genres, stats.avg_rating, stats.num_ratings
            ),
            None => println!("{}: {} [{}] (no ratings)", item.id, item.title, genres),
        }
    }
    Ok(())
}

/// Handle the 'stats' command
fn handle_stats(orchestrator: &RecommendationOrchestrator, json: bool) -> Result<()> {
    let summary = orchestrator.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Dataset:".bold().blue());
    println!("{}Items: {}", "• ".green(), summary.items);
    println!("{}Rating events: {}", "• ".green(), summary.rating_events);
    println!("{}Users: {}", "• ".green(), summary.users);
    println!("{}Genres: {}", "• ".green(), summary.genres);
    println!("{}", "Engine:".bold().blue());
    println!(
        "{}Matrix: {} users x {} items",
        "• ".cyan(),
        summary.matrix_rows,
        summary.matrix_columns
    );
    println!("{}Popular items: {}", "• ".cyan(), summary.popular_items);
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    orchestrator: &RecommendationOrchestrator,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        return Err(anyhow!("requests and concurrent must both be greater than 0"));
    }

    let workload = build_workload(orchestrator, requests);
    let permits = Arc::new(Semaphore::new(concurrent));

    // Use tokio::spawn to make concurrent requests, at most `concurrent` at once
    let wall_start = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for request in workload {
        let orchestrator = orchestrator.clone();
        let permits = permits.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            orchestrator.get_recommendations(request).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    // Wait for all tasks to complete and collect timings
    let mut timings = Vec::with_capacity(requests);
    let mut failures = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(elapsed) => timings.push(elapsed),
            Err(e) => {
                failures += 1;
                tracing::warn!("Benchmark request failed: {:#}", e);
            }
        }
    }
    let wall_time = wall_start.elapsed();

    if timings.is_empty() {
        return Err(anyhow!("all {} benchmark requests failed", failures));
    }

    let total: Duration = timings.iter().sum();
    let avg_latency = total / timings.len() as u32;
    timings.sort();
    let throughput = timings.len() as f64 / wall_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} failed)", requests, failures);
    println!("Concurrency: {}", concurrent);
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Random mix of new-user, short-history and full-history requests
fn build_workload(
    orchestrator: &RecommendationOrchestrator,
    requests: usize,
) -> Vec<RecommendationRequest> {
    let engine = orchestrator.engine();
    let item_ids = engine.matrix().item_ids();
    let genres = engine.all_genres();
    let mut rng = rand::rng();

    (0..requests)
        .map(|_| {
            let mut request = RecommendationRequest::new(20);
            let history = rng.random_range(0..=10usize);
            if history > 0 {
                let query: UserRatingQuery = item_ids
                    .choose_multiple(&mut rng, history)
                    .map(|&item_id| (item_id, rng.random_range(1..=10u8) as f32 * 0.5))
                    .collect();
                request = request.with_ratings(query);
            } else if let Some(genre) = genres.choose(&mut rng) {
                request = request.with_genres([genre.clone()].into_iter().collect());
            }
            request
        })
        .collect()
}

/// Nearest-rank percentile over sorted timings
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let rank = ((sorted.len() as f64 * p).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation]) {
    println!("{}", "Movie Recommendations:".bold().blue());
    if recommendations.is_empty() {
        println!("  {}", "Nothing to recommend".yellow());
    }
    for (i, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. [{}] {} [{}] - Score: {:.2}",
            (i + 1).to_string().green(),
            rec.item_id,
            rec.title,
            rec.genres.join(", "),
            rec.score
        );
        println!("   {}", rec.explanation.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("296=5.0"), Ok((296, 5.0)));
        assert_eq!(parse_rating(" 1 = 3.5 "), Ok((1, 3.5)));
        assert!(parse_rating("296").is_err());
        assert!(parse_rating("abc=4").is_err());
        assert!(parse_rating("1=great").is_err());
    }

    #[test]
    fn test_percentile() {
        let timings: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile(&timings, 0.50), Duration::from_millis(50));
        assert_eq!(percentile(&timings, 0.99), Duration::from_millis(99));
        assert_eq!(percentile(&timings[..1], 0.95), Duration::from_millis(1));
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "reel-recs",
            "recommend",
            "--rate",
            "296=5",
            "--rate",
            "318=4.5",
            "--genre",
            "Drama",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Recommend {
                ratings,
                genres,
                limit,
            } => {
                assert_eq!(ratings, vec![(296, 5.0), (318, 4.5)]);
                assert_eq!(genres, vec!["Drama".to_string()]);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_personalized_requires_ratings() {
        assert!(Cli::try_parse_from(["reel-recs", "personalized"]).is_err());
    }
}
