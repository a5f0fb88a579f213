use data_loader::{Catalog, RatingRange};
use std::path::Path;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    let data_dir = Path::new("data/ml-latest-small");

    println!("Loading MovieLens catalog...\n");

    let start = Instant::now();
    let catalog = Catalog::load_from_dir(data_dir, RatingRange::default())?;
    let elapsed = start.elapsed();

    let (items, ratings, users) = catalog.counts();

    println!("=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Items: {}", items);
    println!("Ratings: {}", ratings);
    println!("Users: {}", users);
    println!("Genres: {}", catalog.genre_index().len());
    println!(
        "\nPerformance: {:.0} ratings/second",
        ratings as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
