use crate::error::{LayoutError, Result};
use crate::manager::ManagerState;
use crate::model::{Layout, LayoutPermission, PersonalCopy};

/// The new copy and the source as stored afterwards.
#[derive(Debug, Clone)]
pub struct PersonalCopyOutcome {
    pub copy: Layout,
    pub source: Layout,
}

/// Clone what the user currently sees of a layout into a new personal layout.
/// The source's working copy moves to the copy, so the source is left clean.
pub async fn run(state: &ManagerState, request: PersonalCopy) -> Result<PersonalCopyOutcome> {
    let PersonalCopy { id, display_name } = request;

    let guard = state.primary().lock().await;
    let Some(mut source) = guard.get(&id).await?.filter(|l| !l.is_hidden()) else {
        return Err(LayoutError::LayoutNotFound(id));
    };

    let copy = Layout::new_local(
        display_name,
        source.effective_data().clone(),
        LayoutPermission::Personal,
        state.default_parent.clone(),
        state.syncs(),
    );

    let copy = guard.put(copy).await?;
    source.set_working(None);
    let source = guard.put(source).await?;

    Ok(PersonalCopyOutcome { copy, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayoutId, LayoutUpdate, SyncStatus};
    use crate::test_utils::{sample_data, StateFixture};

    #[tokio::test]
    async fn test_copy_takes_working_data_and_cleans_source() {
        let fx = StateFixture::synced();
        let shared = fx.put_shared("Team").await;
        crate::commands::update::run(
            &fx.state,
            LayoutUpdate::data(shared.id.clone(), sample_data("tweaked")),
        )
        .await
        .unwrap();

        let PersonalCopyOutcome { copy, source } = run(
            &fx.state,
            PersonalCopy {
                id: shared.id.clone(),
                display_name: "Copy".into(),
            },
        )
        .await
        .unwrap();

        assert_ne!(copy.id, shared.id);
        assert_eq!(copy.display_name, "Copy");
        assert_eq!(copy.permission, LayoutPermission::Personal);
        assert_eq!(copy.sync_status(), Some(SyncStatus::New));
        assert_eq!(copy.baseline().data, sample_data("tweaked"));
        assert!(source.working().is_none());
        assert_eq!(source.baseline(), shared.baseline());
    }

    #[tokio::test]
    async fn test_copy_without_working_uses_baseline() {
        let fx = StateFixture::local_only();
        let layout = fx.put_personal("Doc").await;

        let outcome = run(
            &fx.state,
            PersonalCopy {
                id: layout.id.clone(),
                display_name: "Copy".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.copy.baseline().data, layout.baseline().data);
        assert!(outcome.copy.sync_info.is_none());
    }

    #[tokio::test]
    async fn test_copy_of_missing_layout_fails() {
        let fx = StateFixture::synced();
        let err = run(
            &fx.state,
            PersonalCopy {
                id: LayoutId::generate(),
                display_name: "Copy".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LayoutError::LayoutNotFound(_)));
    }
}
