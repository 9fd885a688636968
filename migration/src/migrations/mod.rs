pub mod m202610160001_create_build_reports;
pub mod m202610160002_create_assignments;
pub mod m202610160003_create_assignment_acl;
pub mod m202610160004_create_assignees;
pub mod m202610160005_create_submissions;
pub mod m202610160006_create_git_submissions;
