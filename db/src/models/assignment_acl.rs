use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};

/// Grants a non-owner user management rights over one assignment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assignment_acl")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub assignment_id: String,
    pub user_id: String,
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

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(db: &C, assignment_id: &str, user_id: &str) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            assignment_id: Set(assignment_id.to_string()),
            user_id: Set(user_id.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_assignment_id<C>(db: &C, assignment_id: &str) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::AssignmentId.eq(assignment_id))
            .order_by_asc(Column::UserId)
            .all(db)
            .await
    }

    pub async fn find_by_user_id(db: &DatabaseConnection, user_id: &str) -> Result<Vec<Self>, DbErr> {
        Entity::find().filter(Column::UserId.eq(user_id)).all(db).await
    }

    pub async fn delete_by_assignment_id<C>(db: &C, assignment_id: &str) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::delete_many()
            .filter(Column::AssignmentId.eq(assignment_id))
            .exec(db)
            .await
            .map(|res| res.rows_affected)
    }

    /// Replaces the whole ACL of an assignment. Duplicate and blank user ids
    /// are dropped so the (assignment, user) pair stays unique.
    pub async fn replace_for_assignment<C>(
        db: &C,
        assignment_id: &str,
        user_ids: &[String],
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::delete_by_assignment_id(db, assignment_id).await?;

        let mut seen = std::collections::BTreeSet::new();
        let mut entries = Vec::new();
        for user_id in user_ids.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            if seen.insert(user_id.to_string()) {
                entries.push(Self::create(db, assignment_id, user_id).await?);
            }
        }
        Ok(entries)
    }
}
