use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set, Value};

/// A student's git-based submission pointer.
///
/// `last_submission_id` caches the submission last evaluated from this
/// repository; it goes stale whenever the teacher repository changes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "git_submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub assignment_id: String,
    pub submitter_user_id: String,
    pub git_repository_url: String,
    pub last_submission_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assignment::Entity",
        from = "Column::AssignmentId",
        to = "super::assignment::Column::Id"
    )]
    Assignment,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        assignment_id: &str,
        submitter_user_id: &str,
        git_repository_url: &str,
        last_submission_id: Option<i64>,
    ) -> Result<Self, DbErr> {
        ActiveModel {
            assignment_id: Set(assignment_id.to_string()),
            submitter_user_id: Set(submitter_user_id.to_string()),
            git_repository_url: Set(git_repository_url.to_string()),
            last_submission_id: Set(last_submission_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_assignment_id(db: &DatabaseConnection, assignment_id: &str) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::AssignmentId.eq(assignment_id))
            .all(db)
            .await
    }

    /// Clears the cached report pointer of every git submission of the
    /// assignment. Returns how many rows actually held a pointer.
    pub async fn clear_last_submission(db: &DatabaseConnection, assignment_id: &str) -> Result<u64, DbErr> {
        Entity::update_many()
            .col_expr(Column::LastSubmissionId, Expr::value(Value::BigInt(None)))
            .filter(Column::AssignmentId.eq(assignment_id))
            .filter(Column::LastSubmissionId.is_not_null())
            .exec(db)
            .await
            .map(|res| res.rows_affected)
    }
}
