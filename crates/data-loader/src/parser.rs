//! Parsers for MovieLens CSV exports.
//!
//! - movies.csv: movieId,title,genres (genres pipe-separated)
//! - ratings.csv: userId,movieId,rating,timestamp
//!
//! Titles may be quoted and contain commas, so we go through the `csv`
//! crate rather than splitting lines by hand.

use crate::error::{DataLoadError, Result};
use crate::types::{Item, RatingEvent};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// MovieLens marker for an item without genres
const NO_GENRES: &str = "(no genres listed)";

#[derive(Debug, Deserialize)]
struct ItemRecord {
    #[serde(rename = "movieId")]
    movie_id: String,
    title: String,
    genres: String,
}

#[derive(Debug, Deserialize)]
struct RatingRecord {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "movieId")]
    movie_id: String,
    rating: String,
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|_| DataLoadError::FileNotFound {
        path: path.display().to_string(),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse movies.csv into items
pub fn parse_items(path: &Path) -> Result<Vec<Item>> {
    parse_items_from_reader(open(path)?, &file_label(path))
}

/// Parse ratings.csv into rating events
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingEvent>> {
    parse_ratings_from_reader(open(path)?, &file_label(path))
}

/// Parse items from any reader; `file` is only used in error messages
pub fn parse_items_from_reader<R: Read>(reader: R, file: &str) -> Result<Vec<Item>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut items = Vec::new();

    for (idx, record) in csv_reader.deserialize::<ItemRecord>().enumerate() {
        // Header is line 1
        let line_no = idx + 2;
        let record = record.map_err(|source| DataLoadError::CsvError {
            file: file.to_string(),
            source,
        })?;

        let id = parse_field(&record.movie_id, "movieId", file, line_no)?;
        items.push(Item {
            id,
            title: record.title.trim().to_string(),
            genres: parse_genres(&record.genres),
        });
    }

    Ok(items)
}

/// Parse rating events from any reader; `file` is only used in error messages
pub fn parse_ratings_from_reader<R: Read>(reader: R, file: &str) -> Result<Vec<RatingEvent>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut ratings = Vec::new();

    for (idx, record) in csv_reader.deserialize::<RatingRecord>().enumerate() {
        let line_no = idx + 2;
        let record = record.map_err(|source| DataLoadError::CsvError {
            file: file.to_string(),
            source,
        })?;

        ratings.push(RatingEvent {
            user_id: parse_field(&record.user_id, "userId", file, line_no)?,
            item_id: parse_field(&record.movie_id, "movieId", file, line_no)?,
            rating: parse_field(&record.rating, "rating", file, line_no)?,
        });
    }

    Ok(ratings)
}

fn parse_field<T>(raw: &str, field: &str, file: &str, line: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: format!("Invalid {}: {}", field, e),
    })
}

/// Split pipe-separated genres
///
/// Example: "Action|Adventure|Sci-Fi" -> {"Action", "Adventure", "Sci-Fi"}
fn parse_genres(s: &str) -> std::collections::BTreeSet<String> {
    let s = s.trim();
    if s.is_empty() || s == NO_GENRES {
        return Default::default();
    }
    s.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}
