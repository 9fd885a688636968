use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};

/// Restricts an assignment's visibility to one author. An assignment without
/// assignees is public.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assignees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub assignment_id: String,
    pub author_user_id: String,
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
    pub async fn create<C>(db: &C, assignment_id: &str, author_user_id: &str) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            assignment_id: Set(assignment_id.to_string()),
            author_user_id: Set(author_user_id.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_assignment_id(db: &DatabaseConnection, assignment_id: &str) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::AssignmentId.eq(assignment_id))
            .order_by_asc(Column::AuthorUserId)
            .all(db)
            .await
    }

    pub async fn exists_by_assignment_id(db: &DatabaseConnection, assignment_id: &str) -> Result<bool, DbErr> {
        let count = Entity::find()
            .filter(Column::AssignmentId.eq(assignment_id))
            .count(db)
            .await?;
        Ok(count > 0)
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

    /// Replaces all assignees of an assignment, skipping blank ids.
    pub async fn replace_for_assignment<C>(
        db: &C,
        assignment_id: &str,
        author_user_ids: &[String],
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::delete_by_assignment_id(db, assignment_id).await?;

        let mut created = Vec::new();
        for author in author_user_ids.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            created.push(Self::create(db, assignment_id, author).await?);
        }
        Ok(created)
    }
}
