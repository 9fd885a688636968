use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{assignee, assignment_acl};

/// Target language of an assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "assignment_language_enum")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[sea_orm(string_value = "java")]
    Java,
    #[sea_orm(string_value = "kotlin")]
    Kotlin,
}

impl Language {
    /// File students must provide as the program entry point.
    pub fn main_file_name(self) -> &'static str {
        match self {
            Language::Java => "Main.java",
            Language::Kotlin => "Main.kt",
        }
    }
}

/// How students hand in their work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "submission_method_enum")]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMethod {
    #[sea_orm(string_value = "upload")]
    Upload,
    #[sea_orm(string_value = "git")]
    Git,
}

/// Assignment model representing the `assignments` table.
///
/// `git_repository_url` is written once on creation and never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub package_name: Option<String>,
    pub language: Language,
    pub due_date: Option<DateTime<Utc>>,
    pub submission_method: SubmissionMethod,
    pub accepts_student_tests: bool,
    pub min_student_tests: Option<i32>,
    pub cooloff_period: Option<i32>,
    pub git_repository_url: String,
    pub git_repository_folder: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub git_repository_priv_key: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub git_repository_pub_key: Option<String>,
    pub owner_user_id: String,
    pub active: bool,
    pub archived: bool,
    pub build_report_id: Option<i64>,
    pub last_validation_ok: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::assignment_acl::Entity")]
    AssignmentAcl,
    #[sea_orm(has_many = "super::assignee::Entity")]
    Assignee,
    #[sea_orm(
        belongs_to = "super::build_report::Entity",
        from = "Column::BuildReportId",
        to = "super::build_report::Column::Id"
    )]
    BuildReport,
}

impl Related<super::assignment_acl::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignmentAcl.def()
    }
}

impl Related<super::assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Users granted management rights (`acl`) and users the assignment is
/// restricted to (`assignees`). A `None` ACL leaves the stored one untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLists<'a> {
    pub acl: Option<&'a [String]>,
    pub assignees: &'a [String],
}

impl AccessLists<'_> {
    async fn store<C>(&self, db: &C, assignment_id: &str) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        if let Some(acl) = self.acl {
            assignment_acl::Model::replace_for_assignment(db, assignment_id, acl).await?;
        }
        assignee::Model::replace_for_assignment(db, assignment_id, self.assignees).await?;
        Ok(())
    }
}

/// The teacher-editable part of an assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentDetails {
    pub name: String,
    pub package_name: Option<String>,
    pub language: Language,
    pub due_date: Option<DateTime<Utc>>,
    pub submission_method: SubmissionMethod,
    pub accepts_student_tests: bool,
    pub min_student_tests: Option<i32>,
    pub cooloff_period: Option<i32>,
}

impl Model {
    /// Create a new assignment. The repository folder is named after the id.
    pub async fn create<C>(
        db: &C,
        id: &str,
        owner_user_id: &str,
        git_repository_url: &str,
        details: AssignmentDetails,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let active = ActiveModel {
            id: Set(id.to_string()),
            name: Set(details.name),
            package_name: Set(details.package_name),
            language: Set(details.language),
            due_date: Set(details.due_date),
            submission_method: Set(details.submission_method),
            accepts_student_tests: Set(details.accepts_student_tests),
            min_student_tests: Set(details.min_student_tests),
            cooloff_period: Set(details.cooloff_period),
            git_repository_url: Set(git_repository_url.to_string()),
            git_repository_folder: Set(id.to_string()),
            git_repository_priv_key: Set(None),
            git_repository_pub_key: Set(None),
            owner_user_id: Set(owner_user_id.to_string()),
            active: Set(false),
            archived: Set(false),
            build_report_id: Set(None),
            last_validation_ok: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active.insert(db).await
    }

    pub async fn get_by_id<C>(db: &C, id: &str) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id.to_string()).one(db).await
    }

    pub async fn exists(db: &DatabaseConnection, id: &str) -> Result<bool, DbErr> {
        Ok(Self::get_by_id(db, id).await?.is_some())
    }

    pub async fn find_by_owner(db: &DatabaseConnection, owner_user_id: &str) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::OwnerUserId.eq(owner_user_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn find_by_ids(db: &DatabaseConnection, ids: Vec<String>) -> Result<Vec<Self>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::Id.is_in(ids))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Overwrites the editable fields. Repository url and folder are left untouched.
    pub async fn update_details<C>(
        db: &C,
        id: &str,
        details: AssignmentDetails,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::update_with(db, id, |active| {
            active.name = Set(details.name);
            active.package_name = Set(details.package_name);
            active.language = Set(details.language);
            active.due_date = Set(details.due_date);
            active.submission_method = Set(details.submission_method);
            active.accepts_student_tests = Set(details.accepts_student_tests);
            active.min_student_tests = Set(details.min_student_tests);
            active.cooloff_period = Set(details.cooloff_period);
        })
        .await
    }

    pub async fn set_key_pair(
        db: &DatabaseConnection,
        id: &str,
        private_key: &str,
        public_key: &str,
    ) -> Result<Self, DbErr> {
        Self::update_with(db, id, |active| {
            active.git_repository_priv_key = Set(Some(private_key.to_string()));
            active.git_repository_pub_key = Set(Some(public_key.to_string()));
        })
        .await
    }

    /// Stores the outcome of a validation run. `build_report_id` is left as is
    /// when the run produced no report (timeout, missing manifest).
    pub async fn record_validation(
        db: &DatabaseConnection,
        id: &str,
        build_report_id: Option<i64>,
        ok: bool,
    ) -> Result<Self, DbErr> {
        Self::update_with(db, id, |active| {
            if let Some(report_id) = build_report_id {
                active.build_report_id = Set(Some(report_id));
            }
            active.last_validation_ok = Set(Some(ok));
        })
        .await
    }

    pub async fn set_active(db: &DatabaseConnection, id: &str, value: bool) -> Result<Self, DbErr> {
        Self::update_with(db, id, |active| active.active = Set(value)).await
    }

    pub async fn set_archived(db: &DatabaseConnection, id: &str) -> Result<Self, DbErr> {
        Self::update_with(db, id, |active| active.archived = Set(true)).await
    }

    pub async fn delete<C>(db: &C, id: &str) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::delete_by_id(id.to_string()).exec(db).await.map(|_| ())
    }

    /// Creates the assignment together with its ACL and assignees. Either all
    /// rows are written or none.
    pub async fn create_with_access_lists(
        db: &DatabaseConnection,
        id: &str,
        owner_user_id: &str,
        git_repository_url: &str,
        details: AssignmentDetails,
        access: AccessLists<'_>,
    ) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        let assignment = Self::create(&txn, id, owner_user_id, git_repository_url, details).await?;
        access.store(&txn, id).await?;
        txn.commit().await?;
        Ok(assignment)
    }

    /// Updates the editable fields and the access lists in one transaction.
    pub async fn update_with_access_lists(
        db: &DatabaseConnection,
        id: &str,
        details: AssignmentDetails,
        access: AccessLists<'_>,
    ) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        let assignment = Self::update_details(&txn, id, details).await?;
        access.store(&txn, id).await?;
        txn.commit().await?;
        Ok(assignment)
    }

    /// Removes the ACL, the assignees and the assignment itself. Nothing is
    /// removed when any step fails.
    pub async fn delete_with_access_lists(db: &DatabaseConnection, id: &str) -> Result<(), DbErr> {
        let txn = db.begin().await?;
        assignment_acl::Model::delete_by_assignment_id(&txn, id).await?;
        assignee::Model::delete_by_assignment_id(&txn, id).await?;
        Self::delete(&txn, id).await?;
        txn.commit().await
    }

    /// Private and public keys are always stored together.
    pub fn has_key_pair(&self) -> bool {
        self.git_repository_priv_key.is_some() && self.git_repository_pub_key.is_some()
    }

    pub fn private_key_bytes(&self) -> Option<&[u8]> {
        self.git_repository_priv_key.as_deref().map(str::as_bytes)
    }

    async fn update_with<C, F>(db: &C, id: &str, apply: F) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
        F: FnOnce(&mut ActiveModel),
    {
        let Some(assignment) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound(format!("Assignment {id} not found")));
        };

        let mut active = assignment.into_active_model();
        apply(&mut active);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }
}
