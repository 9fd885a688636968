use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set};

/// A student submission. Only the columns the assignment flows read are
/// modelled here; grading owns the rest.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub assignment_id: String,
    pub submitter_user_id: String,
    pub build_report_id: Option<i64>,
    pub submission_date: DateTime<Utc>,
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
    pub async fn create(db: &DatabaseConnection, assignment_id: &str, submitter_user_id: &str) -> Result<Self, DbErr> {
        ActiveModel {
            assignment_id: Set(assignment_id.to_string()),
            submitter_user_id: Set(submitter_user_id.to_string()),
            build_report_id: Set(None),
            submission_date: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn count_by_assignment_id(db: &DatabaseConnection, assignment_id: &str) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::AssignmentId.eq(assignment_id))
            .count(db)
            .await
    }

    pub async fn count_unique_submitters(db: &DatabaseConnection, assignment_id: &str) -> Result<u64, DbErr> {
        let submitters: Vec<String> = Entity::find()
            .select_only()
            .column(Column::SubmitterUserId)
            .distinct()
            .filter(Column::AssignmentId.eq(assignment_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok(submitters.len() as u64)
    }
}
