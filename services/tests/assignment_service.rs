mod common;

use code_runner::Rejection;
use common::{CloneBehavior, PullBehavior, clean_report, form, harness};
use db::models::{assignee, assignment, assignment_acl, build_report, git_submission, submission};
use git_sync::GitError;
use services::{AppError, AssignmentState, RegisterOutcome};
use std::path::PathBuf;
use std::time::Duration;
use util::test_helpers::write_file;

#[tokio::test]
async fn register_rejects_non_ssh_urls_before_any_io() {
    let h = harness().await;
    let mut f = form("ex1");
    f.git_repository_url = "https://github.com/teacher/ex1.git".into();

    let err = h.service.register_assignment("teacher1", f).await.unwrap_err();

    assert_eq!(err.field(), Some("git_repository_url"));
    assert_eq!(
        err.to_string(),
        "Only SSH style urls are accepted (must start with 'git@')"
    );
    assert_eq!(h.git.clone_calls(), 0);
    assert!(!h.paths.assignment_dir("ex1").exists());
    assert!(!assignment::Model::exists(&h.db, "ex1").await.unwrap());
}

#[tokio::test]
async fn register_clones_and_stores_access_lists() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2, teacher3".into());
    f.assignees = Some("student1,student2".into());

    let outcome = h.service.register_assignment("teacher1", f).await.unwrap();

    let RegisterOutcome::Connected { assignment, head } = outcome else {
        panic!("expected a connected assignment");
    };
    assert_eq!(assignment.owner_user_id, "teacher1");
    assert_eq!(head.unwrap().message, "Initial commit");
    assert!(h.paths.assignment_dir("ex1").join("pom.xml").exists());
    assert_eq!(h.git.last_key(), None);

    let acl = assignment_acl::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap();
    assert_eq!(acl.len(), 2);
    let assignees = assignee::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap();
    assert_eq!(assignees.len(), 2);
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_test_policy() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let err = h
        .service
        .register_assignment("teacher1", form("ex1"))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("assignment_id"));
    assert_eq!(err.to_string(), "An assignment already exists with this ID");

    let mut f = form("ex2");
    f.accepts_student_tests = true;
    let err = h.service.register_assignment("teacher1", f).await.unwrap_err();
    assert_eq!(err.field(), Some("accepts_student_tests"));
    assert_eq!(h.git.clone_calls(), 1);
}

#[tokio::test]
async fn register_with_private_repository_needs_git_setup() {
    let h = harness().await;
    h.git.set_clone(CloneBehavior::NeedsAuth);

    let outcome = h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    assert!(matches!(outcome, RegisterOutcome::NeedsGitSetup { .. }));
    let summaries = h.service.list_assignments_for("teacher1", false).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].state, AssignmentState::NeedsAuth);
}

#[tokio::test]
async fn register_with_unreachable_repository_is_rejected() {
    let h = harness().await;
    h.git.set_clone(CloneBehavior::Unreachable);

    let err = h
        .service
        .register_assignment("teacher1", form("ex1"))
        .await
        .unwrap_err();

    assert_eq!(err.field(), Some("git_repository_url"));
    assert!(!assignment::Model::exists(&h.db, "ex1").await.unwrap());
}

#[tokio::test]
async fn setup_git_generates_keys_once_and_only_for_the_owner() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    h.service.register_assignment("teacher1", f).await.unwrap();

    let first = h.service.setup_git("teacher1", "ex1").await.unwrap();
    assert!(first.public_key.starts_with("ssh-ed25519 "));
    assert_eq!(
        first.deploy_keys_url.as_deref(),
        Some("https://github.com/teacher/ex1/settings/keys")
    );

    let second = h.service.setup_git("teacher1", "ex1").await.unwrap();
    assert_eq!(first.public_key, second.public_key);

    let err = h.service.setup_git("teacher2", "ex1").await.unwrap_err();
    assert!(matches!(err, AppError::OwnerOnly(_)));
}

#[tokio::test]
async fn connect_requires_keys() {
    let h = harness().await;
    h.git.set_clone(CloneBehavior::NeedsAuth);
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let err = h
        .service
        .connect_git_repository("teacher1", "ex1")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MissingKeyPair(_)));
    assert_eq!(h.git.clone_calls(), 1);
}

#[tokio::test]
async fn connect_clears_previous_clone_and_persists_report() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.service.setup_git("teacher1", "ex1").await.unwrap();

    let dir = h.paths.assignment_dir("ex1");
    write_file(&dir, "stale.txt", "from the previous clone");

    let outcome = h
        .service
        .connect_git_repository("teacher1", "ex1")
        .await
        .unwrap();

    assert!(outcome.validation.is_valid());
    assert!(outcome.head.is_some());
    assert!(!dir.join("stale.txt").exists());
    assert!(dir.join("pom.xml").exists());
    assert_eq!(h.git.clone_calls(), 2);

    let stored = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert_eq!(
        h.git.last_key().as_deref(),
        stored.private_key_bytes()
    );
    assert_eq!(stored.last_validation_ok, Some(true));
    let report_id = stored.build_report_id.expect("report should be referenced");
    let report = build_report::Model::get_by_id(&h.db, report_id).await.unwrap().unwrap();
    assert_eq!(report.unit_tests_failed, Some(false));
}

#[tokio::test]
async fn failed_connect_leaves_assignment_needing_auth() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.service.setup_git("teacher1", "ex1").await.unwrap();
    h.git.set_clone(CloneBehavior::NeedsAuth);

    let err = h
        .service
        .connect_git_repository("teacher1", "ex1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Clone {
            source: GitError::AuthenticationRequired(_),
            ..
        }
    ));
    let summaries = h.service.list_assignments_for("teacher1", false).await.unwrap();
    assert_eq!(summaries[0].state, AssignmentState::NeedsAuth);
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn misnamed_teacher_test_is_rejected_then_accepted_after_rename() {
    let h = harness().await;
    h.git.add_file("src/test/java/org/example/TestCalculator.java", "class T {}");
    let mut f = form("ex1");
    f.accepts_student_tests = true;
    f.min_student_tests = Some(2);
    h.service.register_assignment("teacher1", f).await.unwrap();

    let validation = h
        .service
        .validate_assignment_files("teacher1", "ex1")
        .await
        .unwrap();

    assert_eq!(
        validation.rejection,
        Some(Rejection::InvalidTeacherTestNaming(PathBuf::from(
            "src/test/java/org/example/TestCalculator.java"
        )))
    );
    let rejected = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert_eq!(rejected.last_validation_ok, Some(false));
    let first_report = rejected.build_report_id.expect("report kept on rejection");

    let tests_dir = h.paths.assignment_dir("ex1").join("src/test/java/org/example");
    std::fs::rename(
        tests_dir.join("TestCalculator.java"),
        tests_dir.join("TestTeacherCalculator.java"),
    )
    .unwrap();

    let validation = h
        .service
        .validate_assignment_files("teacher1", "ex1")
        .await
        .unwrap();

    assert!(validation.is_valid());
    let accepted = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert_eq!(accepted.last_validation_ok, Some(true));
    assert_ne!(accepted.build_report_id, Some(first_report));
    assert!(accepted.build_report_id.is_some());
}

#[tokio::test]
async fn timed_out_build_is_reported_without_a_report() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.executor.set_report(None);

    let validation = h
        .service
        .validate_assignment_files("teacher1", "ex1")
        .await
        .unwrap();

    assert_eq!(validation.rejection, Some(Rejection::BuildTimedOut));
    let stored = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert_eq!(stored.build_report_id, None);
    assert_eq!(stored.last_validation_ok, Some(false));
}

#[tokio::test]
async fn refresh_clears_git_submission_pointers() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.service.setup_git("teacher1", "ex1").await.unwrap();

    let evaluated = submission::Model::create(&h.db, "ex1", "student1").await.unwrap();
    for student in ["student1", "student2", "student3"] {
        git_submission::Model::create(
            &h.db,
            "ex1",
            student,
            "git@github.com:s/ex1.git",
            Some(evaluated.id),
        )
        .await
        .unwrap();
    }
    git_submission::Model::create(&h.db, "ex1", "student4", "git@github.com:s4/ex1.git", None)
        .await
        .unwrap();

    let outcome = h
        .service
        .refresh_git_repository("teacher1", "ex1")
        .await
        .unwrap();

    assert_eq!(outcome.cleared_submissions, 3);
    assert_eq!(outcome.head.message, "Update tests");
    let remaining = git_submission::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap();
    assert_eq!(remaining.len(), 4);
    assert!(remaining.iter().all(|g| g.last_submission_id.is_none()));
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn refresh_on_unborn_branch_changes_nothing() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.service.setup_git("teacher1", "ex1").await.unwrap();
    let evaluated = submission::Model::create(&h.db, "ex1", "student1").await.unwrap();
    git_submission::Model::create(&h.db, "ex1", "student1", "git@github.com:s/ex1.git", Some(evaluated.id))
        .await
        .unwrap();
    let before = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    h.git.set_pull(PullBehavior::NoCommits);

    let err = h
        .service
        .refresh_git_repository("teacher1", "ex1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Pull {
            source: GitError::NoCommitsYet,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "Error pulling from git@github.com:teacher/ex1.git. Probably you don't have any commits yet."
    );
    let after = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert_eq!(before, after);
    let pointers = git_submission::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap();
    assert_eq!(pointers[0].last_submission_id, Some(evaluated.id));
}

#[tokio::test]
async fn refresh_without_keys_fails() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let err = h
        .service
        .refresh_git_repository("teacher1", "ex1")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MissingKeyPair(_)));
    assert_eq!(h.git.pull_calls(), 0);
}

#[tokio::test]
async fn activation_requires_a_passing_validation() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let mut broken = clean_report();
    broken.compilation_errors.push("src/main/java/org/example/Main.java:[1,1] oops".into());
    h.executor.set_report(Some(broken));

    let err = h.service.toggle_active("teacher1", "ex1").await.unwrap_err();
    assert!(matches!(err, AppError::Rejected(Rejection::CompilationFailed(_))));
    assert_eq!(
        err.to_string(),
        "Assignment has compilation errors. Please fix this!"
    );
    let stored = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert!(!stored.active);

    h.executor.set_report(Some(clean_report()));
    assert!(h.service.toggle_active("teacher1", "ex1").await.unwrap());
    assert_eq!(h.executor.calls(), 2);

    // deactivation does not rebuild
    assert!(!h.service.toggle_active("teacher1", "ex1").await.unwrap());
    assert_eq!(h.executor.calls(), 2);
}

#[tokio::test]
async fn activation_requires_a_working_copy() {
    let h = harness().await;
    h.git.set_clone(CloneBehavior::NeedsAuth);
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let err = h.service.toggle_active("teacher1", "ex1").await.unwrap_err();

    assert!(matches!(err, AppError::NotConnected(_)));
    assert_eq!(
        err.to_string(),
        "Can't mark assignment as active since it is not connected to a git repository."
    );
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn delete_is_refused_while_submissions_exist() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    h.service.register_assignment("teacher1", f).await.unwrap();
    submission::Model::create(&h.db, "ex1", "student1").await.unwrap();

    let err = h.service.delete_assignment("teacher2", "ex1").await.unwrap_err();
    assert!(matches!(err, AppError::OwnerOnly(_)));

    let err = h.service.delete_assignment("teacher1", "ex1").await.unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)));
    assert_eq!(
        err.to_string(),
        "Assignment can't be deleted because it has submissions"
    );
    assert!(assignment::Model::exists(&h.db, "ex1").await.unwrap());
}

#[tokio::test]
async fn delete_removes_assignment_and_acl() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    f.assignees = Some("student1".into());
    h.service.register_assignment("teacher1", f).await.unwrap();

    h.service.delete_assignment("teacher1", "ex1").await.unwrap();

    assert!(!assignment::Model::exists(&h.db, "ex1").await.unwrap());
    assert!(assignment_acl::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap().is_empty());
    assert!(!assignee::Model::exists_by_assignment_id(&h.db, "ex1").await.unwrap());
    assert!(!h.paths.assignment_dir("ex1").exists());

    // the id can be reused afterwards
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
}

#[tokio::test]
async fn listing_covers_owned_and_shared_assignments() {
    let h = harness().await;
    let mut owned = form("ex1");
    owned.assignees = Some("student1".into());
    h.service.register_assignment("teacher1", owned).await.unwrap();
    h.service.register_assignment("teacher1", form("ex2")).await.unwrap();
    let mut shared = form("ex3");
    shared.acl = Some("teacher1".into());
    h.service.register_assignment("teacher2", shared).await.unwrap();
    h.service.register_assignment("teacher2", form("ex4")).await.unwrap();

    h.service.archive_assignment("teacher1", "ex2").await.unwrap();
    for student in ["student1", "student1", "student2"] {
        submission::Model::create(&h.db, "ex1", student).await.unwrap();
    }

    let current = h.service.list_assignments_for("teacher1", false).await.unwrap();
    let ids: Vec<&str> = current.iter().map(|s| s.assignment.id.as_str()).collect();
    assert_eq!(ids, vec!["ex1", "ex3"]);

    let ex1 = &current[0];
    assert_eq!(ex1.num_submissions, 3);
    assert_eq!(ex1.num_unique_submitters, 2);
    assert!(!ex1.public);
    assert_eq!(ex1.state, AssignmentState::Cloned);
    assert!(current[1].public);

    let archived = h.service.list_assignments_for("teacher1", true).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].assignment.id, "ex2");
    assert_eq!(archived[0].state, AssignmentState::Archived);
}

#[tokio::test]
async fn only_owner_or_acl_members_can_manage() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    h.service.register_assignment("teacher1", f).await.unwrap();

    let err = h
        .service
        .validate_assignment_files("stranger", "ex1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));
    assert!(matches!(
        h.service.archive_assignment("stranger", "ex1").await.unwrap_err(),
        AppError::AccessDenied(_)
    ));
    assert_eq!(h.executor.calls(), 0);

    let validation = h
        .service
        .validate_assignment_files("teacher2", "ex1")
        .await
        .unwrap();
    assert!(validation.is_valid());

    let err = h
        .service
        .validate_assignment_files("teacher1", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn update_keeps_repository_url_fixed() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    h.service.register_assignment("teacher1", f).await.unwrap();

    let mut moved = form("ex1");
    moved.git_repository_url = "git@github.com:someone/else.git".into();
    let err = h.service.update_assignment("teacher1", moved).await.unwrap_err();
    assert_eq!(err.to_string(), "Git repository cannot be changed.");

    let mut edited = form("ex1");
    edited.name = "Renamed".into();
    edited.acl = Some("teacher3".into());
    let updated = h.service.update_assignment("teacher2", edited).await.unwrap();
    assert_eq!(updated.name, "Renamed");

    let acl = assignment_acl::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap();
    let users: Vec<&str> = acl.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(users, vec!["teacher3"]);

    let err = h.service.update_assignment("teacher2", form("ex1")).await.unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));
}

#[tokio::test]
async fn detail_reports_commit_tree_and_last_report() {
    let h = harness().await;
    h.git.add_file("instructions.html", "<p>Implement the calculator</p>");
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();

    let before_keys = h.service.assignment_detail("teacher1", "ex1").await.unwrap();
    assert_eq!(before_keys.last_commit, None);
    assert_eq!(before_keys.state, AssignmentState::Cloned);

    h.service.setup_git("teacher1", "ex1").await.unwrap();
    h.service.connect_git_repository("teacher1", "ex1").await.unwrap();

    let detail = h.service.assignment_detail("teacher1", "ex1").await.unwrap();
    assert_eq!(detail.state, AssignmentState::Valid);
    assert!(detail.last_commit.unwrap().ends_with(": Initial commit"));
    assert!(detail.package_tree.contains("|--------- Main.java"));
    assert_eq!(detail.instructions, "<p>Implement the calculator</p>");
    assert!(detail.build_report.is_some());
}

#[tokio::test]
async fn concurrent_toggles_apply_one_after_the_other() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.executor.hold();

    let second = async {
        h.executor.build_started().await;
        let (toggled, ()) = tokio::join!(h.service.toggle_active("teacher1", "ex1"), async {
            // the second toggle is parked on the lock by now
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.executor.release();
        });
        toggled
    };
    let (first, second) = tokio::join!(h.service.toggle_active("teacher1", "ex1"), second);

    assert!(first.unwrap());
    assert!(!second.unwrap());
    let stored = assignment::Model::get_by_id(&h.db, "ex1").await.unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(h.executor.calls(), 1);
}

#[tokio::test]
async fn connect_queued_behind_delete_finds_nothing() {
    let h = harness().await;
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
    h.service.setup_git("teacher1", "ex1").await.unwrap();

    let (deleted, connected) = tokio::join!(
        h.service.delete_assignment("teacher1", "ex1"),
        h.service.connect_git_repository("teacher1", "ex1")
    );

    deleted.unwrap();
    assert!(matches!(connected.unwrap_err(), AppError::NotFound(_)));
    assert!(!h.paths.assignment_dir("ex1").exists());
    assert_eq!(h.git.clone_calls(), 1);

    // nothing left behind blocks registering the id again
    h.service.register_assignment("teacher1", form("ex1")).await.unwrap();
}

#[tokio::test]
async fn refused_delete_keeps_acl_and_assignees() {
    let h = harness().await;
    let mut f = form("ex1");
    f.acl = Some("teacher2".into());
    f.assignees = Some("student1".into());
    h.service.register_assignment("teacher1", f).await.unwrap();
    submission::Model::create(&h.db, "ex1", "student1").await.unwrap();

    h.service.delete_assignment("teacher1", "ex1").await.unwrap_err();

    assert_eq!(
        assignment_acl::Model::find_by_assignment_id(&h.db, "ex1").await.unwrap().len(),
        1
    );
    assert!(assignee::Model::exists_by_assignment_id(&h.db, "ex1").await.unwrap());
    assert!(h.paths.assignment_dir("ex1").join("pom.xml").exists());
}

#[tokio::test]
async fn student_template_leaves_production_sources_behind() {
    let h = harness().await;
    let mut f = form("ex1");
    f.assignees = Some("student1".into());
    h.service.register_assignment("teacher1", f).await.unwrap();
    let out = h.paths.mavenized_root().join("ex1-template");

    let copied = h
        .service
        .export_student_template("teacher1", "ex1", &out)
        .await
        .unwrap();

    assert_eq!(copied, 2);
    assert!(out.join("pom.xml").exists());
    assert!(out.join("src/test/java/org/example/TestTeacherMain.java").exists());
    assert!(!out.join("src/main").exists());
    assert!(!out.join(".git").exists());

    // students only get it once the assignment is active and meant for them
    let err = h
        .service
        .export_student_template("student1", "ex1", &out)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));

    h.service.toggle_active("teacher1", "ex1").await.unwrap();
    h.service
        .export_student_template("student1", "ex1", &out)
        .await
        .unwrap();
    let err = h
        .service
        .export_student_template("student2", "ex1", &out)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied(_)));
}
