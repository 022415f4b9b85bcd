//! Database layer: migrations, post/review/team queries, and seeding.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::models::{
    now_millis, Category, CategoryDetail, NewPost, NewReview, Post, PostRow, PostStatus,
    RatingSummary, Review, ReviewRow, TeamMember,
};

const POST_COLUMNS: &str = "id, type, status, title, description, payment, payment_type, \
     past_work, reference, creator_id, creator_username, creator_avatar, \
     review_message_id, resolved_by, rejection_reason, created_at";

const REVIEW_COLUMNS: &str =
    "id, post_id, rating, content, author_name, author_avatar, created_at";

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Make sure the file is created if it doesn't exist yet.
    let url = if url.contains('?') || url.contains(":memory:") {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Posts
// ─────────────────────────────────────────────────────────

/// Insert a new post in the `pending` state.
pub async fn create_post(pool: &SqlitePool, post: &NewPost) -> Result<Post> {
    let (past_work, reference) = match &post.detail {
        CategoryDetail::ForHire { past_work } => (Some(past_work.as_str()), None),
        CategoryDetail::Hiring { reference } => (None, reference.as_deref()),
    };

    let row = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        INSERT INTO posts
            (type, status, title, description, payment, payment_type, past_work,
             reference, creator_id, creator_username, creator_avatar, created_at)
        VALUES (?1, 'pending', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(post.detail.category().as_str())
    .bind(&post.title)
    .bind(&post.description)
    .bind(&post.payment)
    .bind(post.payment_type.as_str())
    .bind(past_work)
    .bind(reference)
    .bind(&post.creator.id)
    .bind(&post.creator.username)
    .bind(&post.creator.avatar)
    .bind(now_millis())
    .fetch_one(pool)
    .await?;

    Post::try_from(row)
}

pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(Post::try_from).transpose()
}

/// Approved posts, newest first, optionally narrowed to one category.
pub async fn list_approved_posts(
    pool: &SqlitePool,
    category: Option<Category>,
) -> Result<Vec<Post>> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM   posts
        WHERE  status = 'approved'
          AND  (?1 IS NULL OR type = ?1)
        ORDER  BY created_at DESC, id DESC
        "#
    ))
    .bind(category.map(|c| c.as_str()))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Post::try_from).collect()
}

/// Every post a user has submitted, in any state, newest first.
pub async fn posts_by_creator(pool: &SqlitePool, creator_id: &str) -> Result<Vec<Post>> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM   posts
        WHERE  creator_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Post::try_from).collect()
}

pub async fn latest_post_by_creator(pool: &SqlitePool, creator_id: &str) -> Result<Option<Post>> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM   posts
        WHERE  creator_id = ?1
        ORDER  BY created_at DESC, id DESC
        LIMIT  1
        "#
    ))
    .bind(creator_id)
    .fetch_optional(pool)
    .await?;
    row.map(Post::try_from).transpose()
}

/// Remember which moderator-queue message belongs to a post.
pub async fn set_review_message(pool: &SqlitePool, id: i64, message_id: &str) -> Result<()> {
    sqlx::query("UPDATE posts SET review_message_id = ?1 WHERE id = ?2")
        .bind(message_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move a pending post to a terminal status in one conditional statement.
///
/// Returns `None` when no row changed: the post is missing or was already
/// resolved. Two racing resolutions can therefore never both succeed.
pub async fn resolve_post(
    pool: &SqlitePool,
    id: i64,
    status: PostStatus,
    moderator_id: &str,
    reason: Option<&str>,
) -> Result<Option<Post>> {
    debug_assert!(PostStatus::Pending.can_transition_to(status));

    let row = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        UPDATE posts
        SET    status = ?1, resolved_by = ?2, rejection_reason = ?3
        WHERE  id = ?4 AND status = 'pending'
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(status.as_str())
    .bind(moderator_id)
    .bind(reason)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(Post::try_from).transpose()
}

// ─────────────────────────────────────────────────────────
// Reviews
// ─────────────────────────────────────────────────────────

/// Reviews for a post, newest first.
pub async fn list_reviews(pool: &SqlitePool, post_id: i64) -> Result<Vec<Review>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        r#"
        SELECT {REVIEW_COLUMNS}
        FROM   reviews
        WHERE  post_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Review::from).collect())
}

pub async fn create_review(pool: &SqlitePool, review: &NewReview) -> Result<Review> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        r#"
        INSERT INTO reviews (post_id, rating, content, author_name, author_avatar, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING {REVIEW_COLUMNS}
        "#
    ))
    .bind(review.post_id)
    .bind(review.rating)
    .bind(&review.content)
    .bind(&review.author_name)
    .bind(&review.author_avatar)
    .bind(now_millis())
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

pub async fn rating_summary(pool: &SqlitePool, post_id: i64) -> Result<RatingSummary> {
    let (average, count): (Option<f64>, i64) =
        sqlx::query_as("SELECT AVG(CAST(rating AS REAL)), COUNT(*) FROM reviews WHERE post_id = ?1")
            .bind(post_id)
            .fetch_one(pool)
            .await?;
    Ok(RatingSummary::new(average, count))
}

// ─────────────────────────────────────────────────────────
// Team roster and seeding
// ─────────────────────────────────────────────────────────

pub async fn list_team_members(pool: &SqlitePool) -> Result<Vec<TeamMember>> {
    let rows = sqlx::query_as::<_, TeamMember>(
        "SELECT id, name, role, avatar_url FROM team_members ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fill an empty roster with placeholder staff. Returns how many were added.
pub async fn seed_team_members(pool: &SqlitePool) -> Result<usize> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM team_members")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for i in 0..8 {
        sqlx::query("INSERT INTO team_members (name, role, avatar_url) VALUES (?1, ?2, ?3)")
            .bind(format!("Team Member {}", i + 1))
            .bind("Smile Ink Staff")
            .bind(format!("https://api.dicebear.com/7.x/avataaars/svg?seed={i}"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    info!("Seeded 8 placeholder team members");
    Ok(8)
}

/// Give every approved post that has no reviews a single sample review.
pub async fn seed_sample_reviews(pool: &SqlitePool) -> Result<usize> {
    let mut seeded = 0usize;
    for post in list_approved_posts(pool, None).await? {
        if rating_summary(pool, post.id).await?.count > 0 {
            continue;
        }
        create_review(
            pool,
            &NewReview {
                post_id: post.id,
                rating: 5,
                content: "Excellent work! Very professional animator.".to_string(),
                author_name: "RobloxTester".to_string(),
                author_avatar: None,
            },
        )
        .await?;
        seeded += 1;
    }
    if seeded > 0 {
        info!("Seeded sample reviews on {seeded} approved posts");
    }
    Ok(seeded)
}

/// Single-connection in-memory pool with migrations applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

#[cfg(test)]
pub fn sample_new_post(creator_id: &str, detail: CategoryDetail) -> NewPost {
    use crate::models::{PaymentType, Submitter};

    NewPost {
        detail,
        title: "Logo Animation".to_string(),
        description: "Need a 10s intro".to_string(),
        payment: "500".to_string(),
        payment_type: PaymentType::Usd,
        creator: Submitter {
            id: creator_id.to_string(),
            username: format!("user{creator_id}"),
            avatar: None,
        },
    }
}
