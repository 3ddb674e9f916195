use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{
    FeedEntry, FeedQueryScope, NewPostParams, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::PostgresRepositories;
use super::types::{FeedRow, PostRow};
use super::util::map_sqlx_error;

const POST_COLUMNS: &str = "id, text, image_path, author_id, group_id, created_at";

fn apply_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: FeedQueryScope) {
    match scope {
        FeedQueryScope::Global => {}
        FeedQueryScope::Group(group_id) => {
            qb.push(" AND p.group_id = ");
            qb.push_bind(group_id);
        }
        FeedQueryScope::Author(author_id) => {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author_id);
        }
        FeedQueryScope::FollowedBy(user_id) => {
            qb.push(" AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ");
            qb.push_bind(user_id);
            qb.push(")");
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_feed(
        &self,
        scope: FeedQueryScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        // Page size is bounded at configuration time; see `feed.page_size`.
        let limit = i64::from(limit);
        let offset = i64::try_from(offset)
            .map_err(|_| RepoError::from_persistence("offset exceeds supported range"))?;

        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.text, p.image_path, p.author_id, p.group_id, p.created_at, \
             u.username AS author_username, g.title AS group_title, g.slug AS group_slug, \
             (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
             FROM posts p \
             INNER JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id \
             WHERE 1=1 ",
        );
        apply_scope_conditions(&mut qb, scope);

        qb.push(" ORDER BY p.created_at DESC, p.id DESC ");
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<FeedRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }

    async fn count_feed(&self, scope: FeedQueryScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            "INSERT INTO posts (text, image_path, author_id, group_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, text, image_path, author_id, group_id, created_at",
        )
        .bind(&params.text)
        .bind(&params.image_path)
        .bind(params.author_id)
        .bind(params.group_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        // A NULL image parameter keeps the stored image; author and
        // created_at are immutable by omission.
        let row = sqlx::query_as::<_, PostRow>(
            "UPDATE posts \
             SET text = $2, group_id = $3, image_path = COALESCE($4, image_path) \
             WHERE id = $1 \
             RETURNING id, text, image_path, author_id, group_id, created_at",
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
