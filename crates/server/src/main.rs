//! Simple test harness for the recommendation orchestrator.
//!
//! Loads a MovieLens-style data directory and runs one request per
//! strategy: a new user with genre preferences, a user with a short
//! history, and a user with a full history.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use server::{
    EngineConfig, Recommendation, RecommendationEngine, RecommendationOrchestrator,
    RecommendationRequest,
};
use sources::UserRatingQuery;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,server=debug,sources=debug,data_loader=debug")
        .init();

    info!("Starting ReelRecs server test harness");

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/ml-latest-small"));

    info!("Loading data from {}...", data_dir.display());
    let engine = tokio::task::spawn_blocking(move || {
        RecommendationEngine::load_from_dir(&data_dir, EngineConfig::default())
    })
    .await??;
    let orchestrator =
        RecommendationOrchestrator::new(engine).with_request_budget(Duration::from_secs(2));
    info!("Engine loaded: {:?}", orchestrator.summary());

    let genres: HashSet<String> = ["Action", "Sci-Fi"].iter().map(|g| g.to_string()).collect();
    let new_user = RecommendationRequest::new(5).with_genres(genres);
    report("New user (Action, Sci-Fi)", orchestrator.get_recommendations(new_user).await?);

    let short: UserRatingQuery = [(296, 5.0), (318, 4.5), (260, 4.0)].into_iter().collect();
    let short_history = RecommendationRequest::new(6).with_ratings(short);
    report("Short history", orchestrator.get_recommendations(short_history).await?);

    let full: UserRatingQuery = [
        (1, 4.0),
        (50, 5.0),
        (296, 5.0),
        (318, 4.5),
        (593, 4.5),
        (2571, 5.0),
    ]
    .into_iter()
    .collect();
    let full_history = RecommendationRequest::new(10).with_ratings(full);
    report("Full history", orchestrator.get_recommendations(full_history).await?);

    info!("Genres: {}", orchestrator.engine().all_genres().join(", "));
    Ok(())
}

fn report(label: &str, recommendations: Vec<Recommendation>) {
    info!("{}: {} recommendations", label, recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        info!(
            "{}. {} - Score: {:.3} [{:?}]",
            i + 1,
            rec.title,
            rec.score,
            rec.source
        );
        info!("   Genres: {}", rec.genres.join(", "));
        info!("   {}", rec.explanation);
    }
}
