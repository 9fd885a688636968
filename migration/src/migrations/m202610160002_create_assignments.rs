use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610160002_create_assignments"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("assignments"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id")).string().not_null().primary_key())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("package_name")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("language"))
                            .enumeration(
                                Alias::new("assignment_language_enum"),
                                vec![Alias::new("java"), Alias::new("kotlin")],
                            )
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("due_date")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("submission_method"))
                            .enumeration(
                                Alias::new("submission_method_enum"),
                                vec![Alias::new("upload"), Alias::new("git")],
                            )
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("accepts_student_tests")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("min_student_tests")).integer().null())
                    .col(ColumnDef::new(Alias::new("cooloff_period")).integer().null())
                    .col(ColumnDef::new(Alias::new("git_repository_url")).string().not_null())
                    .col(ColumnDef::new(Alias::new("git_repository_folder")).string().not_null())
                    .col(ColumnDef::new(Alias::new("git_repository_priv_key")).text().null())
                    .col(ColumnDef::new(Alias::new("git_repository_pub_key")).text().null())
                    .col(ColumnDef::new(Alias::new("owner_user_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("active")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("archived")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("build_report_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("last_validation_ok")).boolean().null())
                    .col(ColumnDef::new(Alias::new("created_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Alias::new("updated_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Alias::new("assignments"), Alias::new("build_report_id"))
                            .to(Alias::new("build_reports"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("assignments")).to_owned())
            .await
    }
}
