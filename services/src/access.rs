use db::models::{assignee, assignment, assignment_acl};

/// Owner or a co-owner listed in the assignment's ACL.
pub fn can_manage(principal: &str, assignment: &assignment::Model, acl: &[assignment_acl::Model]) -> bool {
    is_owner(principal, assignment)
        || acl
            .iter()
            .any(|entry| entry.assignment_id == assignment.id && entry.user_id == principal)
}

/// Students see active assignments that are public or list them as assignee.
pub fn can_access(principal: &str, assignment: &assignment::Model, assignees: &[assignee::Model]) -> bool {
    assignment.active
        && (assignees.is_empty()
            || assignees
                .iter()
                .any(|a| a.assignment_id == assignment.id && a.author_user_id == principal))
}

pub fn is_owner(principal: &str, assignment: &assignment::Model) -> bool {
    assignment.owner_user_id == principal
}
