use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, Set};

/// Immutable snapshot of one build+test run: the raw tool output plus the
/// diagnostics derived from it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "build_reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub build_report: String,
    #[sea_orm(column_type = "Json")]
    pub compilation_errors: Json,
    #[sea_orm(column_type = "Json")]
    pub checkstyle_errors: Json,
    /// `None` when no test results were found in the output.
    pub unit_tests_failed: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        output: &str,
        compilation_errors: &[String],
        checkstyle_errors: &[String],
        unit_tests_failed: Option<bool>,
    ) -> Result<Self, DbErr> {
        ActiveModel {
            build_report: Set(output.to_string()),
            compilation_errors: Set(serde_json::json!(compilation_errors)),
            checkstyle_errors: Set(serde_json::json!(checkstyle_errors)),
            unit_tests_failed: Set(unit_tests_failed),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub fn compilation_errors(&self) -> Vec<String> {
        serde_json::from_value(self.compilation_errors.clone()).unwrap_or_default()
    }

    pub fn checkstyle_errors(&self) -> Vec<String> {
        serde_json::from_value(self.checkstyle_errors.clone()).unwrap_or_default()
    }
}
