use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, NewRecommendation, Preferences, Recommendation, RecommendationType},
};

/// Storage collaborator for the recommendation pipeline.
///
/// The core only needs this narrow surface; session lifecycle, preference
/// CRUD, and everything else relational stays behind it. Batch persistence
/// is all-or-nothing: `save_recommendations` owns its transaction and rolls
/// back on any mid-batch failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BookStore: Send + Sync {
    /// Existence and expiry check; the core treats an invalid session as a
    /// precondition failure.
    async fn is_session_valid(&self, session_id: Uuid) -> AppResult<bool>;

    async fn get_preferences(&self, session_id: Uuid) -> AppResult<Option<Preferences>>;

    /// Exact-title catalog lookup for callers outside the batch path.
    ///
    /// `save_recommendations` does its own lookup so the whole batch runs
    /// on one transaction; this method reads from the shared pool.
    async fn find_book_by_title(&self, title: &str) -> AppResult<Option<Book>>;

    /// Persists a batch of generated recommendations atomically.
    ///
    /// For each entry the catalog book is looked up by exact title and
    /// created if absent, tagged with the recommendation type's source.
    /// Row ids are assigned as each record is inserted; there is no
    /// post-commit patch-up step.
    async fn save_recommendations(
        &self,
        session_id: Uuid,
        scan_id: Option<String>,
        recommendations: Vec<NewRecommendation>,
    ) -> AppResult<Vec<Recommendation>>;

    /// Previously generated recommendations, newest first
    async fn list_recommendations(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Recommendation>>;
}

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: Option<String>,
    genre: Option<String>,
    publication_year: Option<i32>,
    source: Option<String>,
    confidence_score: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            genre: row.genre,
            publication_year: row.publication_year,
            source: row.source,
            confidence_score: row.confidence_score,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    favorite_genres: Option<Json<Vec<String>>>,
    disliked_genres: Option<Json<Vec<String>>>,
    favorite_authors: Option<Json<Vec<String>>>,
    preferred_length: Option<String>,
    preferred_publication_era: Option<String>,
    reading_experience: Option<String>,
    discovery_openness: Option<f64>,
    reading_history: Option<Json<Vec<String>>>,
}

impl From<PreferenceRow> for Preferences {
    fn from(row: PreferenceRow) -> Self {
        Preferences {
            favorite_genres: row.favorite_genres.map(|j| j.0).unwrap_or_default(),
            disliked_genres: row.disliked_genres.map(|j| j.0).unwrap_or_default(),
            favorite_authors: row.favorite_authors.map(|j| j.0).unwrap_or_default(),
            preferred_length: row.preferred_length,
            preferred_publication_era: row.preferred_publication_era,
            reading_experience: row.reading_experience,
            discovery_openness: row.discovery_openness,
            reading_history: row.reading_history.map(|j| j.0).unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecommendationInsertRow {
    id: Uuid,
    is_saved: bool,
    is_interested: Option<bool>,
    is_purchased: bool,
    viewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RecommendationJoinRow {
    id: Uuid,
    session_id: Uuid,
    reason: String,
    score: f64,
    similarity_to: Option<String>,
    scan_id: Option<String>,
    recommendation_type: String,
    is_saved: bool,
    is_interested: Option<bool>,
    is_purchased: bool,
    viewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    book_id: Uuid,
    book_title: String,
    book_author: Option<String>,
    book_genre: Option<String>,
    book_publication_year: Option<i32>,
    book_source: Option<String>,
    book_confidence_score: Option<f64>,
    book_created_at: DateTime<Utc>,
}

impl From<RecommendationJoinRow> for Recommendation {
    fn from(row: RecommendationJoinRow) -> Self {
        Recommendation {
            id: row.id,
            session_id: row.session_id,
            book: Book {
                id: row.book_id,
                title: row.book_title,
                author: row.book_author,
                genre: row.book_genre,
                publication_year: row.book_publication_year,
                source: row.book_source,
                confidence_score: row.book_confidence_score,
                created_at: row.book_created_at,
            },
            reason: row.reason,
            score: row.score,
            similarity_to: row.similarity_to,
            scan_id: row.scan_id,
            recommendation_type: RecommendationType::from_str(&row.recommendation_type),
            is_saved: row.is_saved,
            is_interested: row.is_interested,
            is_purchased: row.is_purchased,
            viewed_at: row.viewed_at,
            created_at: row.created_at,
        }
    }
}

const BOOK_COLUMNS: &str =
    "id, title, author, genre, publication_year, source, confidence_score, created_at";

#[async_trait::async_trait]
impl BookStore for PgStore {
    async fn is_session_valid(&self, session_id: Uuid) -> AppResult<bool> {
        let valid: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM sessions
                 WHERE id = $1 AND is_active AND expires_at > now()
             )",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(valid)
    }

    async fn get_preferences(&self, session_id: Uuid) -> AppResult<Option<Preferences>> {
        let row: Option<PreferenceRow> = sqlx::query_as(
            "SELECT favorite_genres, disliked_genres, favorite_authors,
                    preferred_length, preferred_publication_era, reading_experience,
                    discovery_openness, reading_history
             FROM preferences
             WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Preferences::from))
    }

    async fn find_book_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let row: Option<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE title = $1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Book::from))
    }

    async fn save_recommendations(
        &self,
        session_id: Uuid,
        scan_id: Option<String>,
        recommendations: Vec<NewRecommendation>,
    ) -> AppResult<Vec<Recommendation>> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(recommendations.len());

        for rec in recommendations {
            let candidate = rec.candidate;

            let existing: Option<BookRow> = sqlx::query_as(&format!(
                "SELECT {BOOK_COLUMNS} FROM books WHERE title = $1"
            ))
            .bind(&candidate.title)
            .fetch_optional(&mut *tx)
            .await?;

            let book: BookRow = match existing {
                Some(book) => book,
                None => {
                    sqlx::query_as(&format!(
                        "INSERT INTO books (id, title, author, genre, publication_year, source, confidence_score)
                         VALUES ($1, $2, $3, $4, $5, $6, $7)
                         RETURNING {BOOK_COLUMNS}"
                    ))
                    .bind(Uuid::new_v4())
                    .bind(&candidate.title)
                    .bind(&candidate.author)
                    .bind(&candidate.genre)
                    .bind(candidate.publication_year)
                    .bind(rec.recommendation_type.book_source())
                    .bind(candidate.appeal_score)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            let inserted: RecommendationInsertRow = sqlx::query_as(
                "INSERT INTO recommendations
                     (id, session_id, book_id, reason, score, similarity_to, scan_id, recommendation_type)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id, is_saved, is_interested, is_purchased, viewed_at, created_at",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(book.id)
            .bind(&candidate.reason)
            .bind(candidate.appeal_score)
            .bind(&candidate.similarity_to)
            .bind(&scan_id)
            .bind(rec.recommendation_type.as_str())
            .fetch_one(&mut *tx)
            .await?;

            saved.push(Recommendation {
                id: inserted.id,
                session_id,
                book: Book::from(book),
                reason: candidate.reason,
                score: candidate.appeal_score,
                similarity_to: candidate.similarity_to,
                scan_id: scan_id.clone(),
                recommendation_type: rec.recommendation_type,
                is_saved: inserted.is_saved,
                is_interested: inserted.is_interested,
                is_purchased: inserted.is_purchased,
                viewed_at: inserted.viewed_at,
                created_at: inserted.created_at,
            });
        }

        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            saved = saved.len(),
            "Recommendation batch committed"
        );

        Ok(saved)
    }

    async fn list_recommendations(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<Recommendation>> {
        let rows: Vec<RecommendationJoinRow> = sqlx::query_as(
            "SELECT r.id, r.session_id, r.reason, r.score, r.similarity_to, r.scan_id,
                    r.recommendation_type, r.is_saved, r.is_interested, r.is_purchased,
                    r.viewed_at, r.created_at,
                    b.id AS book_id, b.title AS book_title, b.author AS book_author,
                    b.genre AS book_genre, b.publication_year AS book_publication_year,
                    b.source AS book_source, b.confidence_score AS book_confidence_score,
                    b.created_at AS book_created_at
             FROM recommendations r
             JOIN books b ON b.id = r.book_id
             WHERE r.session_id = $1
             ORDER BY r.created_at DESC
             LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Recommendation::from).collect())
    }
}
