//! SeaORM entity models
//!
//! Database entities for Minjok Journal

mod profile;
mod article;
mod article_version;
mod article_author;
mod comment;
mod board_post;
mod board_comment;
mod qna_question;
mod qna_reply;
mod issue;
mod issue_article;
mod volume;
mod volume_issue;

pub use profile::{
    Entity as ProfileEntity,
    Model as Profile,
    ActiveModel as ProfileActiveModel,
    Column as ProfileColumn,
    Role,
    AdminType,
};

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
    ArticleStatus,
};

pub use article_version::{
    Entity as ArticleVersionEntity,
    Model as ArticleVersion,
    ActiveModel as ArticleVersionActiveModel,
    Column as ArticleVersionColumn,
};

pub use article_author::{
    Entity as ArticleAuthorEntity,
    Model as ArticleAuthor,
    ActiveModel as ArticleAuthorActiveModel,
    Column as ArticleAuthorColumn,
};

pub use comment::{
    Entity as CommentEntity,
    Model as Comment,
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
};

pub use board_post::{
    Entity as BoardPostEntity,
    Model as BoardPost,
    ActiveModel as BoardPostActiveModel,
    Column as BoardPostColumn,
};

pub use board_comment::{
    Entity as BoardCommentEntity,
    Model as BoardComment,
    ActiveModel as BoardCommentActiveModel,
    Column as BoardCommentColumn,
};

pub use qna_question::{
    Entity as QnaQuestionEntity,
    Model as QnaQuestion,
    ActiveModel as QnaQuestionActiveModel,
    Column as QnaQuestionColumn,
};

pub use qna_reply::{
    Entity as QnaReplyEntity,
    Model as QnaReply,
    ActiveModel as QnaReplyActiveModel,
    Column as QnaReplyColumn,
};

pub use issue::{
    Entity as IssueEntity,
    Model as Issue,
    ActiveModel as IssueActiveModel,
    Column as IssueColumn,
    ReleaseStatus,
};

pub use issue_article::{
    Entity as IssueArticleEntity,
    Model as IssueArticle,
    ActiveModel as IssueArticleActiveModel,
    Column as IssueArticleColumn,
};

pub use volume::{
    Entity as VolumeEntity,
    Model as Volume,
    ActiveModel as VolumeActiveModel,
    Column as VolumeColumn,
};

pub use volume_issue::{
    Entity as VolumeIssueEntity,
    Model as VolumeIssue,
    ActiveModel as VolumeIssueActiveModel,
    Column as VolumeIssueColumn,
};
