//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::pagination::PageRequest;
use sea_orm::sea_query::{Expr, Func, LikeExpr, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Fields for a new draft paper
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub description: Option<String>,
    pub author_id: Uuid,
    /// Additional co-authors, in display order after the submitting author
    pub co_author_ids: Vec<Uuid>,
}

/// Fields for a version row; the number is computed by the caller inside the transaction
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub article_id: Uuid,
    pub version_number: i32,
    pub storage_path: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub notes: Option<String>,
    pub uploaded_by: Uuid,
}

/// Shared shape of issue and volume rows
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub title: String,
    pub description: Option<String>,
    pub status: ReleaseStatus,
    pub release_date: Option<chrono::NaiveDate>,
}

/// Question row plus its reply count for list pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    #[serde(flatten)]
    pub question: QnaQuestion,
    pub reply_count: i64,
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

/// Case-insensitive substring match, the `ilike '%q%'` of the hosted store
fn contains_ci<C: ColumnTrait>(column: C, query: &str) -> SimpleExpr {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\'))
}

/// Map a unique-index rejection to a user-facing conflict
fn claim_err(err: DbErr, message: &str) -> AppError {
    let err = AppError::Database(err);
    if err.is_unique_violation() {
        AppError::Conflict {
            message: message.to_string(),
        }
    } else {
        err
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Open a transaction on the primary
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        self.write_conn().begin().await.map_err(Into::into)
    }

    // ========================================================================
    // Profile Operations
    // ========================================================================

    /// Insert a profile row (normally done by the identity provider's signup hook)
    pub async fn create_profile(
        &self,
        id: Uuid,
        email: String,
        full_name: String,
        role_type: Role,
        admin_type: AdminType,
    ) -> Result<Profile> {
        let now = now();
        let profile = ProfileActiveModel {
            id: Set(id),
            email: Set(email),
            full_name: Set(full_name),
            role_type: Set(role_type),
            admin_type: Set(admin_type),
            intro: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        profile.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find profile by ID
    pub async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        ProfileEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find several profiles at once
    pub async fn find_profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ProfileEntity::find()
            .filter(ProfileColumn::Id.is_in(ids.iter().copied()))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Self-service edit of name and intro
    pub async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
        intro: Option<Option<String>>,
    ) -> Result<Option<Profile>> {
        let Some(profile) = ProfileEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut active: ProfileActiveModel = profile.into();
        if let Some(full_name) = full_name {
            active.full_name = Set(full_name);
        }
        if let Some(intro) = intro {
            active.intro = Set(intro);
        }
        active.updated_at = Set(now());

        Ok(Some(active.update(self.write_conn()).await?))
    }

    /// Admin edit of the two privilege signals
    pub async fn update_profile_roles(
        &self,
        id: Uuid,
        role_type: Option<Role>,
        admin_type: Option<AdminType>,
    ) -> Result<Option<Profile>> {
        let Some(profile) = ProfileEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut active: ProfileActiveModel = profile.into();
        if let Some(role_type) = role_type {
            active.role_type = Set(role_type);
        }
        if let Some(admin_type) = admin_type {
            active.admin_type = Set(admin_type);
        }
        active.updated_at = Set(now());

        Ok(Some(active.update(self.write_conn()).await?))
    }

    /// List profiles alphabetically with pagination
    pub async fn list_profiles(&self, page: PageRequest) -> Result<(Vec<Profile>, u64)> {
        let paginator = ProfileEntity::find()
            .order_by_asc(ProfileColumn::FullName)
            .paginate(self.read_conn(), page.per_page);

        let total = paginator.num_items().await?;
        let profiles = paginator.fetch_page(page.index()).await?;

        Ok((profiles, total))
    }

    /// Name or email substring search
    pub async fn search_profiles(&self, query: &str, limit: u64) -> Result<Vec<Profile>> {
        ProfileEntity::find()
            .filter(
                contains_ci(ProfileColumn::FullName, query)
                    .or(contains_ci(ProfileColumn::Email, query)),
            )
            .order_by_asc(ProfileColumn::FullName)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Create a draft paper and its ordered co-author list
    pub async fn create_article(&self, new: NewArticle) -> Result<Article> {
        let now = now();
        let article_id = Uuid::new_v4();
        let txn = self.begin().await?;

        let article = ArticleActiveModel {
            id: Set(article_id),
            title: Set(new.title),
            description: Set(new.description),
            author_id: Set(new.author_id),
            status: Set(ArticleStatus::Draft),
            current_version_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut authors = vec![new.author_id];
        for id in new.co_author_ids {
            if !authors.contains(&id) {
                authors.push(id);
            }
        }

        let rows: Vec<ArticleAuthorActiveModel> = authors
            .into_iter()
            .enumerate()
            .map(|(position, profile_id)| ArticleAuthorActiveModel {
                article_id: Set(article_id),
                profile_id: Set(profile_id),
                position: Set(position as i32),
                is_corresponding: Set(position == 0),
            })
            .collect();

        ArticleAuthorEntity::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        Ok(article)
    }

    /// Find article by ID
    pub async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find article by ID on the primary (fresh read after a write)
    async fn find_article_primary(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Edit title/description without touching the status
    pub async fn update_article_details(
        &self,
        id: Uuid,
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<Option<Article>> {
        let Some(article) = self.find_article_primary(id).await? else {
            return Ok(None);
        };

        let mut active: ArticleActiveModel = article.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = description {
            active.description = Set(description);
        }
        active.updated_at = Set(now());

        Ok(Some(active.update(self.write_conn()).await?))
    }

    /// Move a paper from `from` to `to`, optionally replacing its public metadata.
    ///
    /// The update is conditional on the stored status still being `from`, so two
    /// racing transitions cannot both succeed. Returns the updated row, or `None`
    /// when the status had already changed.
    pub async fn transition_article(
        &self,
        id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
        metadata: Option<(String, Option<String>)>,
    ) -> Result<Option<Article>> {
        let mut update = ArticleEntity::update_many()
            .col_expr(ArticleColumn::Status, Expr::value(to))
            .col_expr(ArticleColumn::UpdatedAt, Expr::value(now()));

        if let Some((title, description)) = metadata {
            update = update
                .col_expr(ArticleColumn::Title, Expr::value(title))
                .col_expr(ArticleColumn::Description, Expr::value(description));
        }

        let result = update
            .filter(ArticleColumn::Id.eq(id))
            .filter(ArticleColumn::Status.eq(from))
            .exec(self.write_conn())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_article_primary(id).await
    }

    /// Published papers, newest first, optionally filtered by title
    pub async fn list_published_articles(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<Article>, u64)> {
        let mut select = ArticleEntity::find()
            .filter(ArticleColumn::Status.eq(ArticleStatus::Published));

        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            select = select.filter(contains_ci(ArticleColumn::Title, q.trim()));
        }

        let paginator = select
            .order_by_desc(ArticleColumn::UpdatedAt)
            .paginate(self.read_conn(), page.per_page);

        let total = paginator.num_items().await?;
        let articles = paginator.fetch_page(page.index()).await?;

        Ok((articles, total))
    }

    /// Every paper of one author (all statuses), or of everyone when `author_id` is None
    pub async fn list_articles_by_author(
        &self,
        author_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<(Vec<Article>, u64)> {
        let mut select = ArticleEntity::find();
        if let Some(author_id) = author_id {
            select = select.filter(ArticleColumn::AuthorId.eq(author_id));
        }

        let paginator = select
            .order_by_desc(ArticleColumn::UpdatedAt)
            .paginate(self.read_conn(), page.per_page);

        let total = paginator.num_items().await?;
        let articles = paginator.fetch_page(page.index()).await?;

        Ok((articles, total))
    }

    /// Delete article by ID; versions, co-authors, comments and issue slots cascade
    pub async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let result = ArticleEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Ordered co-author rows
    pub async fn co_authors(&self, article_id: Uuid) -> Result<Vec<ArticleAuthor>> {
        ArticleAuthorEntity::find()
            .filter(ArticleAuthorColumn::ArticleId.eq(article_id))
            .order_by_asc(ArticleAuthorColumn::Position)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Whether a profile is listed among a paper's co-authors
    pub async fn is_co_author(&self, article_id: Uuid, profile_id: Uuid) -> Result<bool> {
        let count = ArticleAuthorEntity::find()
            .filter(ArticleAuthorColumn::ArticleId.eq(article_id))
            .filter(ArticleAuthorColumn::ProfileId.eq(profile_id))
            .count(self.read_conn())
            .await?;

        Ok(count > 0)
    }

    // ========================================================================
    // Version Operations
    // ========================================================================

    /// Versions of a paper, newest first
    pub async fn list_versions(&self, article_id: Uuid) -> Result<Vec<ArticleVersion>> {
        ArticleVersionEntity::find()
            .filter(ArticleVersionColumn::ArticleId.eq(article_id))
            .order_by_desc(ArticleVersionColumn::VersionNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a version by ID
    pub async fn find_version(&self, id: Uuid) -> Result<Option<ArticleVersion>> {
        ArticleVersionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Highest-numbered (and therefore most recent) version, read inside a transaction
    pub async fn latest_version_in(
        txn: &DatabaseTransaction,
        article_id: Uuid,
    ) -> Result<Option<ArticleVersion>> {
        ArticleVersionEntity::find()
            .filter(ArticleVersionColumn::ArticleId.eq(article_id))
            .order_by_desc(ArticleVersionColumn::VersionNumber)
            .one(txn)
            .await
            .map_err(Into::into)
    }

    /// Insert a version row; a duplicate `(article_id, version_number)` becomes `Conflict`
    pub async fn insert_version_in(
        txn: &DatabaseTransaction,
        new: NewVersion,
    ) -> Result<ArticleVersion> {
        ArticleVersionActiveModel {
            id: Set(Uuid::new_v4()),
            article_id: Set(new.article_id),
            version_number: Set(new.version_number),
            storage_path: Set(new.storage_path),
            file_name: Set(new.file_name),
            file_size: Set(new.file_size),
            notes: Set(new.notes),
            uploaded_by: Set(new.uploaded_by),
            created_at: Set(now()),
        }
        .insert(txn)
        .await
        .map_err(|e| claim_err(e, "another version was uploaded at the same time"))
    }

    /// Point the paper at its newest version and bump `updated_at`
    pub async fn set_current_version_in(
        txn: &DatabaseTransaction,
        article_id: Uuid,
        version_id: Uuid,
    ) -> Result<()> {
        ArticleEntity::update_many()
            .col_expr(ArticleColumn::CurrentVersionId, Expr::value(Some(version_id)))
            .col_expr(ArticleColumn::UpdatedAt, Expr::value(now()))
            .filter(ArticleColumn::Id.eq(article_id))
            .exec(txn)
            .await?;

        Ok(())
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// Insert a paper comment
    pub async fn insert_comment(
        &self,
        article_id: Uuid,
        version_id: Uuid,
        author_id: Uuid,
        content: String,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let now = now();
        CommentActiveModel {
            id: Set(Uuid::new_v4()),
            article_id: Set(article_id),
            version_id: Set(version_id),
            author_id: Set(author_id),
            content: Set(content),
            parent_id: Set(parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find comment by ID
    pub async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        CommentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Comments on a paper, oldest first, optionally limited to one version
    pub async fn list_comments(
        &self,
        article_id: Uuid,
        version_id: Option<Uuid>,
    ) -> Result<Vec<Comment>> {
        let mut select = CommentEntity::find().filter(CommentColumn::ArticleId.eq(article_id));
        if let Some(version_id) = version_id {
            select = select.filter(CommentColumn::VersionId.eq(version_id));
        }

        select
            .order_by_asc(CommentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Replace a comment's body
    pub async fn update_comment(&self, comment: Comment, content: String) -> Result<Comment> {
        let mut active: CommentActiveModel = comment.into();
        active.content = Set(content);
        active.updated_at = Set(now());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete a comment together with its replies
    pub async fn delete_comment_thread(&self, id: Uuid) -> Result<u64> {
        let result = CommentEntity::delete_many()
            .filter(
                CommentColumn::Id
                    .eq(id)
                    .or(CommentColumn::ParentId.eq(id)),
            )
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    // ========================================================================
    // Board Operations
    // ========================================================================

    /// Insert a board post
    pub async fn insert_board_post(
        &self,
        author_id: Uuid,
        title: String,
        content: String,
    ) -> Result<BoardPost> {
        let now = now();
        BoardPostActiveModel {
            id: Set(Uuid::new_v4()),
            author_id: Set(author_id),
            title: Set(title),
            content: Set(content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find board post by ID
    pub async fn find_board_post(&self, id: Uuid) -> Result<Option<BoardPost>> {
        BoardPostEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Edit a board post
    pub async fn update_board_post(
        &self,
        post: BoardPost,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<BoardPost> {
        let mut active: BoardPostActiveModel = post.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(content) = content {
            active.content = Set(content);
        }
        active.updated_at = Set(now());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete board post by ID (comments cascade)
    pub async fn delete_board_post(&self, id: Uuid) -> Result<bool> {
        let result = BoardPostEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Board posts, newest first, optionally filtered by title
    pub async fn list_board_posts(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<BoardPost>, u64)> {
        let mut select = BoardPostEntity::find();
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            select = select.filter(contains_ci(BoardPostColumn::Title, q.trim()));
        }

        let paginator = select
            .order_by_desc(BoardPostColumn::CreatedAt)
            .paginate(self.read_conn(), page.per_page);

        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.index()).await?;

        Ok((posts, total))
    }

    /// Insert a comment on a board post
    pub async fn insert_board_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: String,
    ) -> Result<BoardComment> {
        let now = now();
        BoardCommentActiveModel {
            id: Set(Uuid::new_v4()),
            post_id: Set(post_id),
            author_id: Set(author_id),
            content: Set(content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find board comment by ID
    pub async fn find_board_comment(&self, id: Uuid) -> Result<Option<BoardComment>> {
        BoardCommentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Comments on a board post, oldest first
    pub async fn list_board_comments(&self, post_id: Uuid) -> Result<Vec<BoardComment>> {
        BoardCommentEntity::find()
            .filter(BoardCommentColumn::PostId.eq(post_id))
            .order_by_asc(BoardCommentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete board comment by ID
    pub async fn delete_board_comment(&self, id: Uuid) -> Result<bool> {
        let result = BoardCommentEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Q&A Operations
    // ========================================================================

    /// Insert a question
    pub async fn insert_question(
        &self,
        author_id: Uuid,
        title: String,
        content: String,
    ) -> Result<QnaQuestion> {
        let now = now();
        QnaQuestionActiveModel {
            id: Set(Uuid::new_v4()),
            author_id: Set(author_id),
            title: Set(title),
            content: Set(content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find question by ID
    pub async fn find_question(&self, id: Uuid) -> Result<Option<QnaQuestion>> {
        QnaQuestionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Edit a question
    pub async fn update_question(
        &self,
        question: QnaQuestion,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<QnaQuestion> {
        let mut active: QnaQuestionActiveModel = question.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(content) = content {
            active.content = Set(content);
        }
        active.updated_at = Set(now());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete question by ID (replies cascade)
    pub async fn delete_question(&self, id: Uuid) -> Result<bool> {
        let result = QnaQuestionEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Questions, newest first, with their reply counts
    pub async fn list_questions(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<QuestionSummary>, u64)> {
        let mut select = QnaQuestionEntity::find();
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            select = select.filter(
                contains_ci(QnaQuestionColumn::Title, q.trim())
                    .or(contains_ci(QnaQuestionColumn::Content, q.trim())),
            );
        }

        let paginator = select
            .order_by_desc(QnaQuestionColumn::CreatedAt)
            .paginate(self.read_conn(), page.per_page);

        let total = paginator.num_items().await?;
        let questions = paginator.fetch_page(page.index()).await?;

        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let counts: HashMap<Uuid, i64> = if ids.is_empty() {
            HashMap::new()
        } else {
            QnaReplyEntity::find()
                .select_only()
                .column(QnaReplyColumn::QuestionId)
                .column_as(Expr::col(QnaReplyColumn::Id).count(), "reply_count")
                .filter(QnaReplyColumn::QuestionId.is_in(ids))
                .group_by(QnaReplyColumn::QuestionId)
                .into_tuple::<(Uuid, i64)>()
                .all(self.read_conn())
                .await?
                .into_iter()
                .collect()
        };

        let summaries = questions
            .into_iter()
            .map(|question| QuestionSummary {
                reply_count: counts.get(&question.id).copied().unwrap_or(0),
                question,
            })
            .collect();

        Ok((summaries, total))
    }

    /// Insert a reply to a question
    pub async fn insert_reply(
        &self,
        question_id: Uuid,
        author_id: Uuid,
        content: String,
    ) -> Result<QnaReply> {
        let now = now();
        QnaReplyActiveModel {
            id: Set(Uuid::new_v4()),
            question_id: Set(question_id),
            author_id: Set(author_id),
            content: Set(content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Find reply by ID
    pub async fn find_reply(&self, id: Uuid) -> Result<Option<QnaReply>> {
        QnaReplyEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Replies to a question, oldest first
    pub async fn list_replies(&self, question_id: Uuid) -> Result<Vec<QnaReply>> {
        QnaReplyEntity::find()
            .filter(QnaReplyColumn::QuestionId.eq(question_id))
            .order_by_asc(QnaReplyColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete reply by ID
    pub async fn delete_reply(&self, id: Uuid) -> Result<bool> {
        let result = QnaReplyEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Issue Operations
    // ========================================================================

    /// Published papers not yet placed in any issue
    pub async fn available_articles(&self) -> Result<Vec<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Status.eq(ArticleStatus::Published))
            .filter(
                ArticleColumn::Id.not_in_subquery(
                    Query::select()
                        .column(IssueArticleColumn::ArticleId)
                        .from(IssueArticleEntity)
                        .to_owned(),
                ),
            )
            .order_by_desc(ArticleColumn::UpdatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert an issue row inside a transaction
    pub async fn insert_issue_in(
        txn: &DatabaseTransaction,
        id: Uuid,
        new: NewCatalogEntry,
    ) -> Result<Issue> {
        let now = now();
        IssueActiveModel {
            id: Set(id),
            title: Set(new.title),
            description: Set(new.description),
            status: Set(new.status),
            release_date: Set(new.release_date),
            cover_url: Set(None),
            cover_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(Into::into)
    }

    /// Claim papers for an issue; positions follow the slice order
    pub async fn attach_articles_in(
        txn: &DatabaseTransaction,
        issue_id: Uuid,
        article_ids: &[Uuid],
    ) -> Result<()> {
        let rows: Vec<IssueArticleActiveModel> = article_ids
            .iter()
            .enumerate()
            .map(|(position, article_id)| IssueArticleActiveModel {
                issue_id: Set(issue_id),
                article_id: Set(*article_id),
                position: Set(position as i32),
            })
            .collect();

        IssueArticleEntity::insert_many(rows)
            .exec_without_returning(txn)
            .await
            .map_err(|e| claim_err(e, "a selected paper already belongs to an issue"))?;

        Ok(())
    }

    /// Patch the cover onto an issue
    pub async fn set_issue_cover_in(
        txn: &DatabaseTransaction,
        issue_id: Uuid,
        cover_url: String,
        cover_path: String,
    ) -> Result<Issue> {
        let issue = IssueEntity::find_by_id(issue_id)
            .one(txn)
            .await?
            .ok_or_else(|| AppError::not_found("Issue", issue_id))?;

        let mut active: IssueActiveModel = issue.into();
        active.cover_url = Set(Some(cover_url));
        active.cover_path = Set(Some(cover_path));
        active.updated_at = Set(now());
        active.update(txn).await.map_err(Into::into)
    }

    /// Find issue by ID
    pub async fn find_issue(&self, id: Uuid) -> Result<Option<Issue>> {
        IssueEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Issues, newest first; drafts only when asked for
    pub async fn list_issues(&self, include_drafts: bool) -> Result<Vec<Issue>> {
        let mut select = IssueEntity::find();
        if !include_drafts {
            select = select.filter(IssueColumn::Status.eq(ReleaseStatus::Released));
        }

        select
            .order_by_desc(IssueColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Papers of an issue in their curated order
    pub async fn issue_articles(&self, issue_id: Uuid) -> Result<Vec<Article>> {
        let slots = IssueArticleEntity::find()
            .filter(IssueArticleColumn::IssueId.eq(issue_id))
            .order_by_asc(IssueArticleColumn::Position)
            .find_also_related(ArticleEntity)
            .all(self.read_conn())
            .await?;

        Ok(slots.into_iter().filter_map(|(_, article)| article).collect())
    }

    /// Flip an issue to released
    pub async fn release_issue(
        &self,
        id: Uuid,
        release_date: chrono::NaiveDate,
    ) -> Result<Option<Issue>> {
        let result = IssueEntity::update_many()
            .col_expr(IssueColumn::Status, Expr::value(ReleaseStatus::Released))
            .col_expr(IssueColumn::ReleaseDate, Expr::value(Some(release_date)))
            .col_expr(IssueColumn::UpdatedAt, Expr::value(now()))
            .filter(IssueColumn::Id.eq(id))
            .filter(IssueColumn::Status.eq(ReleaseStatus::Draft))
            .exec(self.write_conn())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        IssueEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete issue by ID (mappings cascade)
    pub async fn delete_issue(&self, id: Uuid) -> Result<bool> {
        let result = IssueEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Volume Operations
    // ========================================================================

    /// Released issues not yet placed in any volume
    pub async fn available_issues(&self) -> Result<Vec<Issue>> {
        IssueEntity::find()
            .filter(IssueColumn::Status.eq(ReleaseStatus::Released))
            .filter(
                IssueColumn::Id.not_in_subquery(
                    Query::select()
                        .column(VolumeIssueColumn::IssueId)
                        .from(VolumeIssueEntity)
                        .to_owned(),
                ),
            )
            .order_by_desc(IssueColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a volume row inside a transaction
    pub async fn insert_volume_in(
        txn: &DatabaseTransaction,
        id: Uuid,
        new: NewCatalogEntry,
    ) -> Result<Volume> {
        let now = now();
        VolumeActiveModel {
            id: Set(id),
            title: Set(new.title),
            description: Set(new.description),
            status: Set(new.status),
            release_date: Set(new.release_date),
            cover_url: Set(None),
            cover_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(Into::into)
    }

    /// Claim issues for a volume; positions follow the slice order
    pub async fn attach_issues_in(
        txn: &DatabaseTransaction,
        volume_id: Uuid,
        issue_ids: &[Uuid],
    ) -> Result<()> {
        let rows: Vec<VolumeIssueActiveModel> = issue_ids
            .iter()
            .enumerate()
            .map(|(position, issue_id)| VolumeIssueActiveModel {
                volume_id: Set(volume_id),
                issue_id: Set(*issue_id),
                position: Set(position as i32),
            })
            .collect();

        VolumeIssueEntity::insert_many(rows)
            .exec_without_returning(txn)
            .await
            .map_err(|e| claim_err(e, "a selected issue already belongs to a volume"))?;

        Ok(())
    }

    /// Patch the cover onto a volume
    pub async fn set_volume_cover_in(
        txn: &DatabaseTransaction,
        volume_id: Uuid,
        cover_url: String,
        cover_path: String,
    ) -> Result<Volume> {
        let volume = VolumeEntity::find_by_id(volume_id)
            .one(txn)
            .await?
            .ok_or_else(|| AppError::not_found("Volume", volume_id))?;

        let mut active: VolumeActiveModel = volume.into();
        active.cover_url = Set(Some(cover_url));
        active.cover_path = Set(Some(cover_path));
        active.updated_at = Set(now());
        active.update(txn).await.map_err(Into::into)
    }

    /// Find volume by ID
    pub async fn find_volume(&self, id: Uuid) -> Result<Option<Volume>> {
        VolumeEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Volumes, newest first; drafts only when asked for
    pub async fn list_volumes(&self, include_drafts: bool) -> Result<Vec<Volume>> {
        let mut select = VolumeEntity::find();
        if !include_drafts {
            select = select.filter(VolumeColumn::Status.eq(ReleaseStatus::Released));
        }

        select
            .order_by_desc(VolumeColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Issues of a volume in their curated order
    pub async fn volume_issues(&self, volume_id: Uuid) -> Result<Vec<Issue>> {
        let slots = VolumeIssueEntity::find()
            .filter(VolumeIssueColumn::VolumeId.eq(volume_id))
            .order_by_asc(VolumeIssueColumn::Position)
            .find_also_related(IssueEntity)
            .all(self.read_conn())
            .await?;

        Ok(slots.into_iter().filter_map(|(_, issue)| issue).collect())
    }

    /// Delete volume by ID (mappings cascade)
    pub async fn delete_volume(&self, id: Uuid) -> Result<bool> {
        let result = VolumeEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}
