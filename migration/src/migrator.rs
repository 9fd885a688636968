use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202610160001_create_build_reports::Migration),
            Box::new(migrations::m202610160002_create_assignments::Migration),
            Box::new(migrations::m202610160003_create_assignment_acl::Migration),
            Box::new(migrations::m202610160004_create_assignees::Migration),
            Box::new(migrations::m202610160005_create_submissions::Migration),
            Box::new(migrations::m202610160006_create_git_submissions::Migration),
        ]
    }
}
