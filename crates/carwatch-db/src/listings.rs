//! Database operations for `car_listings`.

use std::collections::HashSet;

use async_trait::async_trait;
use carwatch_core::{CarListing, ListingSink};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Inserts a batch of listings, skipping URLs that are already stored.
///
/// Uses a single `INSERT … SELECT * FROM UNNEST(…) ON CONFLICT (url) DO NOTHING`
/// so the whole batch is written in one round-trip. Duplicate URLs inside
/// the batch are also absorbed by the conflict clause.
///
/// Returns the number of rows actually inserted.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn insert_listings(pool: &PgPool, listings: &[CarListing]) -> Result<u64, sqlx::Error> {
    if listings.is_empty() {
        return Ok(0);
    }

    let mut urls: Vec<String> = Vec::with_capacity(listings.len());
    let mut titles: Vec<String> = Vec::with_capacity(listings.len());
    let mut prices: Vec<Option<i64>> = Vec::with_capacity(listings.len());
    let mut odometers: Vec<Option<i64>> = Vec::with_capacity(listings.len());
    let mut usernames: Vec<String> = Vec::with_capacity(listings.len());
    let mut phones: Vec<Option<i64>> = Vec::with_capacity(listings.len());
    let mut image_urls: Vec<Option<String>> = Vec::with_capacity(listings.len());
    let mut images_counts: Vec<i32> = Vec::with_capacity(listings.len());
    let mut car_numbers: Vec<Option<String>> = Vec::with_capacity(listings.len());
    let mut car_vins: Vec<Option<String>> = Vec::with_capacity(listings.len());
    let mut found_at: Vec<DateTime<Utc>> = Vec::with_capacity(listings.len());

    for listing in listings {
        urls.push(listing.url.clone());
        titles.push(listing.title.clone());
        prices.push(listing.price_usd);
        odometers.push(listing.odometer);
        usernames.push(listing.username.clone());
        phones.push(listing.phone_number);
        image_urls.push(listing.image_url.clone());
        images_counts.push(listing.images_count);
        car_numbers.push(listing.car_number.clone());
        car_vins.push(listing.car_vin.clone());
        found_at.push(listing.datetime_found);
    }

    let result = sqlx::query(INSERT_LISTINGS_SQL)
        .bind(&urls)
        .bind(&titles)
        .bind(&prices)
        .bind(&odometers)
        .bind(&usernames)
        .bind(&phones)
        .bind(&image_urls)
        .bind(&images_counts)
        .bind(&car_numbers)
        .bind(&car_vins)
        .bind(&found_at)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

const INSERT_LISTINGS_SQL: &str = "INSERT INTO car_listings \
         (url, title, price_usd, odometer, username, phone_number, \
          image_url, images_count, car_number, car_vin, datetime_found) \
     SELECT * FROM UNNEST(\
          $1::text[], $2::text[], $3::int8[], $4::int8[], $5::text[], $6::int8[], \
          $7::text[], $8::int4[], $9::text[], $10::text[], $11::timestamptz[]) \
     ON CONFLICT (url) DO NOTHING";

/// Returns the subset of `urls` already present in `car_listings`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn existing_urls(pool: &PgPool, urls: &[String]) -> Result<HashSet<String>, sqlx::Error> {
    if urls.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<String> =
        sqlx::query_scalar::<_, String>("SELECT url FROM car_listings WHERE url = ANY($1::text[])")
            .bind(urls)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

/// [`ListingSink`] backed by the `car_listings` table.
#[derive(Debug, Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `car_listings` table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn init(&self) -> Result<(), DbError> {
        crate::run_migrations(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ListingSink for PgListingStore {
    type Error = DbError;

    async fn insert_batch(&self, listings: &[CarListing]) -> Result<u64, DbError> {
        let inserted = insert_listings(&self.pool, listings).await?;
        tracing::info!(
            batch = listings.len(),
            inserted,
            "db: listing batch written"
        );
        Ok(inserted)
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, DbError> {
        Ok(existing_urls(&self.pool, urls).await?)
    }
}
