use crate::model::SyncAction;

/// Decide what to do with one source repository. An absent commit on
/// either side means "cannot determine"; ambiguity resolves toward
/// syncing rather than skipping.
pub fn decide_action(
    exists_in_target: bool,
    source_commit: Option<&str>,
    target_commit: Option<&str>,
) -> SyncAction {
    if !exists_in_target {
        return SyncAction::CreateAndPush;
    }
    match (source_commit, target_commit) {
        (Some(source), Some(target)) if source == target => SyncAction::Skip,
        _ => SyncAction::UpdateAndPush,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_in_target_always_creates() {
        assert_eq!(
            decide_action(false, Some("abc"), Some("abc")),
            SyncAction::CreateAndPush
        );
        assert_eq!(decide_action(false, None, None), SyncAction::CreateAndPush);
    }

    #[test]
    fn matching_commits_skip() {
        assert_eq!(
            decide_action(true, Some("abc"), Some("abc")),
            SyncAction::Skip
        );
    }

    #[test]
    fn differing_commits_update() {
        assert_eq!(
            decide_action(true, Some("abc"), Some("def")),
            SyncAction::UpdateAndPush
        );
    }

    #[test]
    fn unknown_commits_update() {
        assert_eq!(
            decide_action(true, None, Some("abc")),
            SyncAction::UpdateAndPush
        );
        assert_eq!(
            decide_action(true, Some("abc"), None),
            SyncAction::UpdateAndPush
        );
        assert_eq!(decide_action(true, None, None), SyncAction::UpdateAndPush);
    }
}
