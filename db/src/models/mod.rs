pub mod assignee;
pub mod assignment;
pub mod assignment_acl;
pub mod build_report;
pub mod git_submission;
pub mod submission;

pub use assignee::Entity as Assignee;
pub use assignment::Entity as Assignment;
pub use assignment_acl::Entity as AssignmentAcl;
pub use build_report::Entity as BuildReport;
pub use git_submission::Entity as GitSubmission;
pub use submission::Entity as Submission;
