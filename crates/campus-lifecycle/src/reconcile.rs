//! Submit reconciliation.
//!
//! When an edit session is submitted, every asset of the shadow copy is
//! classified against the live published copy — new, changed, unchanged
//! or removed — because each case has a different file consequence. The
//! full delete-list and move-list are computed before any file operation
//! runs; the caller then applies deletes, then moves, then nothing else.
//! The merged document references published-folder paths throughout, so
//! it is valid the moment it commits even if the file moves lag behind.

use campus_blob::paths;
use campus_core::models::lesson::{EditData, LessonContent, Part};

/// Files to remove and files to promote from the edit folder, computed in
/// full before either list is applied.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Published-folder (or stale edit-folder) paths to delete.
    pub deletes: Vec<String>,
    /// Edit-folder paths to copy into the published folder and then drop.
    pub moves: Vec<String>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.moves.is_empty()
    }
}

/// Merge an edit session's shadow copy into the live content and compute
/// the accompanying file migration.
///
/// Returns the post-submit document (mid-edit cleared, every asset
/// reference rewritten to its published-folder location) and the plan.
pub fn plan_submit(live: &LessonContent, edit: &EditData) -> (LessonContent, MigrationPlan) {
    let mut plan = MigrationPlan::default();
    let mut parts = edit.parts.clone();

    for part in &mut parts {
        match live.part(&part.id) {
            // Absent from the live copy: everything it references is new.
            None => {
                if let Some(path) = part.blob_path.take() {
                    plan.moves.push(path.clone());
                    part.blob_path = Some(paths::edit_to_published(&path));
                }
                for screen in &mut part.screens {
                    if screen.is_media()
                        && let Some(url) = screen.url.take()
                    {
                        plan.moves.push(url.clone());
                        screen.url = Some(paths::edit_to_published(&url));
                    }
                }
            }
            Some(live_part) => {
                if part.is_panoramic() {
                    reconcile_panoramic(part, live_part, &mut plan);
                } else {
                    reconcile_screens(part, live_part, &mut plan);
                }
            }
        }
    }

    // Live parts absent from the shadow copy were deleted mid-edit; their
    // media has no referent left.
    for live_part in &live.parts {
        if edit.part(&live_part.id).is_none() {
            for screen in &live_part.screens {
                if screen.is_media()
                    && let Some(url) = &screen.url
                {
                    plan.deletes.push(url.clone());
                }
            }
            if let Some(path) = &live_part.blob_path {
                plan.deletes.push(path.clone());
            }
        }
    }

    let thumbnail = reconcile_single_asset(&live.thumbnail, &edit.thumbnail, &mut plan);
    let description_file =
        reconcile_single_asset(&live.description_file, &edit.description_file, &mut plan);

    let merged = LessonContent {
        title: edit.title.clone(),
        description: edit.description.clone(),
        creator: live.creator,
        description_file,
        parts,
        viewed: live.viewed,
        categories: edit.categories.clone(),
        thumbnail,
        public: live.public,
        credit: edit.credit.clone(),
        mid_edit: false,
        edit_data: None,
    };

    (merged, plan)
}

/// A panoramic part's asset: unchanged, replaced, or dropped in favour of
/// an external URL.
fn reconcile_panoramic(part: &mut Part, live_part: &Part, plan: &mut MigrationPlan) {
    if part.blob_path == live_part.blob_path {
        return;
    }
    if let Some(old) = &live_part.blob_path {
        plan.deletes.push(old.clone());
    }
    if let Some(new) = part.blob_path.take() {
        plan.moves.push(new.clone());
        part.blob_path = Some(paths::edit_to_published(&new));
    }
}

/// Pair up a normal part's screens slot by slot.
fn reconcile_screens(part: &mut Part, live_part: &Part, plan: &mut MigrationPlan) {
    for (index, screen) in part.screens.iter_mut().enumerate() {
        let live_screen = live_part.screens.get(index);
        let live_media_url = live_screen
            .filter(|s| s.is_media())
            .and_then(|s| s.url.clone());

        match (live_media_url, screen.is_media()) {
            // Media replaced by a plain link: one delete, no move.
            (Some(old), false) => plan.deletes.push(old),
            // Link (or empty slot) replaced by media: move the upload in.
            (None, true) => {
                if let Some(url) = screen.url.take() {
                    plan.moves.push(url.clone());
                    screen.url = Some(paths::edit_to_published(&url));
                }
            }
            // Media on both sides: only a changed URL costs anything.
            (Some(old), true) => {
                if screen.url.as_deref() != Some(old.as_str()) {
                    plan.deletes.push(old);
                    if let Some(url) = screen.url.take() {
                        plan.moves.push(url.clone());
                        screen.url = Some(paths::edit_to_published(&url));
                    }
                }
            }
            (None, false) => {}
        }
    }
}

/// Thumbnail / description-file reconciliation: a changed edit-side path
/// retires the live asset and promotes the new upload.
fn reconcile_single_asset(
    live: &Option<String>,
    edit: &Option<String>,
    plan: &mut MigrationPlan,
) -> Option<String> {
    if edit == live {
        return live.clone();
    }
    if let Some(old) = live {
        plan.deletes.push(old.clone());
    }
    edit.as_ref().map(|new| {
        plan.moves.push(new.clone());
        paths::edit_to_published(new)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::models::lesson::{Screen, ScreenKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn media_screen(url: &str) -> Screen {
        Screen {
            url: Some(url.to_string()),
            kind: Some(ScreenKind::Image),
            mime_type: Some("image/png".into()),
            comment: None,
        }
    }

    fn link_screen(url: &str) -> Screen {
        Screen {
            url: Some(url.to_string()),
            kind: Some(ScreenKind::Browser),
            mime_type: None,
            comment: None,
        }
    }

    fn live_with_parts(parts: Vec<Part>) -> LessonContent {
        let mut content = LessonContent::empty(Uuid::new_v4());
        content.title = Some("Live title".into());
        content.description = Some("Live description".into());
        content.parts = parts;
        content.mid_edit = true;
        content
    }

    fn normal_part(id: &str, screens: [Screen; 3]) -> Part {
        let mut part = Part::normal(0);
        part.id = id.to_string();
        part.screens = screens.to_vec();
        part
    }

    #[test]
    fn untouched_edit_produces_an_empty_plan() {
        let live = live_with_parts(vec![normal_part(
            "p1",
            [
                media_screen("lessons/l1/p1/0-a.png"),
                media_screen("lessons/l1/p1/1-b.png"),
                link_screen("https://example.com"),
            ],
        )]);
        let edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());

        let (merged, plan) = plan_submit(&live, &edit);
        assert!(plan.is_empty());
        assert!(!merged.mid_edit);
        assert!(merged.edit_data.is_none());
        assert_eq!(merged.parts, live.parts);
    }

    #[test]
    fn media_screen_becoming_a_link_schedules_one_delete_no_moves() {
        let live = live_with_parts(vec![normal_part(
            "p1",
            [
                media_screen("lessons/l1/p1/0-a.png"),
                media_screen("lessons/l1/p1/1-b.png"),
                media_screen("lessons/l1/p1/2-c.png"),
            ],
        )]);
        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts[0].screens[2] = link_screen("https://example.com/article");

        let (merged, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes, vec!["lessons/l1/p1/2-c.png".to_string()]);
        assert!(plan.moves.is_empty());
        assert_eq!(
            merged.parts[0].screens[2].url.as_deref(),
            Some("https://example.com/article")
        );
    }

    #[test]
    fn replaced_media_is_deleted_and_the_upload_moved() {
        let live = live_with_parts(vec![normal_part(
            "p1",
            [
                media_screen("lessons/l1/p1/0-a.png"),
                media_screen("lessons/l1/p1/1-b.png"),
                media_screen("lessons/l1/p1/2-c.png"),
            ],
        )]);
        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts[0].screens[0] = media_screen("lesson_edits/l1/p1/0-new.png");

        let (merged, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes, vec!["lessons/l1/p1/0-a.png".to_string()]);
        assert_eq!(plan.moves, vec!["lesson_edits/l1/p1/0-new.png".to_string()]);
        assert_eq!(
            merged.parts[0].screens[0].url.as_deref(),
            Some("lessons/l1/p1/0-new.png"),
            "the merged document must point at the published location"
        );
    }

    #[test]
    fn new_part_moves_every_media_screen() {
        let live = live_with_parts(vec![]);
        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts.push(normal_part(
            "p-new",
            [
                media_screen("lesson_edits/l1/p-new/0-a.png"),
                link_screen("https://example.com"),
                media_screen("lesson_edits/l1/p-new/2-c.mp4"),
            ],
        ));

        let (_, plan) = plan_submit(&live, &edit);
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.moves.len(), 2);
    }

    #[test]
    fn deleted_part_schedules_its_media_for_deletion() {
        let live = live_with_parts(vec![normal_part(
            "p1",
            [
                media_screen("lessons/l1/p1/0-a.png"),
                link_screen("https://example.com"),
                media_screen("lessons/l1/p1/2-c.png"),
            ],
        )]);
        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts.clear();

        let (merged, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes.len(), 2);
        assert!(plan.moves.is_empty());
        assert!(merged.parts.is_empty());
    }

    #[test]
    fn changed_panoramic_retires_the_old_asset() {
        let mut pano = Part::panoramic(0);
        pano.id = "p1".into();
        pano.blob_path = Some("lessons/l1/p1/panoramic-old.jpg".into());
        let live = live_with_parts(vec![pano]);

        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts[0].blob_path = Some("lesson_edits/l1/p1/panoramic-new.jpg".into());

        let (merged, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes, vec!["lessons/l1/p1/panoramic-old.jpg".to_string()]);
        assert_eq!(plan.moves, vec!["lesson_edits/l1/p1/panoramic-new.jpg".to_string()]);
        assert_eq!(
            merged.parts[0].blob_path.as_deref(),
            Some("lessons/l1/p1/panoramic-new.jpg")
        );
    }

    #[test]
    fn panoramic_switched_to_external_url_deletes_the_asset() {
        let mut pano = Part::panoramic(0);
        pano.id = "p1".into();
        pano.blob_path = Some("lessons/l1/p1/panoramic-old.jpg".into());
        let live = live_with_parts(vec![pano]);

        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.parts[0].blob_path = None;
        edit.parts[0].panoramic_url = Some("https://example.com/p.jpg".into());

        let (_, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes, vec!["lessons/l1/p1/panoramic-old.jpg".to_string()]);
        assert!(plan.moves.is_empty());
    }

    #[test]
    fn thumbnail_replacement_follows_the_delete_then_move_shape() {
        let mut live = live_with_parts(vec![]);
        live.thumbnail = Some("lessons/l1/thumbnail-old.png".into());

        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.thumbnail = Some("lesson_edits/l1/thumbnail-new.png".into());

        let (merged, plan) = plan_submit(&live, &edit);
        assert_eq!(plan.deletes, vec!["lessons/l1/thumbnail-old.png".to_string()]);
        assert_eq!(plan.moves, vec!["lesson_edits/l1/thumbnail-new.png".to_string()]);
        assert_eq!(
            merged.thumbnail.as_deref(),
            Some("lessons/l1/thumbnail-new.png")
        );
    }

    #[test]
    fn shadow_fields_replace_live_fields_on_merge() {
        let live = live_with_parts(vec![]);
        let mut edit = EditData::shadow_of(&live, Uuid::new_v4(), Utc::now());
        edit.title = Some("Reworked title".into());
        edit.categories = vec![Uuid::new_v4()];
        edit.credit = Some("Campus Media Team".into());

        let (merged, plan) = plan_submit(&live, &edit);
        assert!(plan.is_empty());
        assert_eq!(merged.title.as_deref(), Some("Reworked title"));
        assert_eq!(merged.categories, edit.categories);
        assert_eq!(merged.credit.as_deref(), Some("Campus Media Team"));
        assert_eq!(merged.viewed, live.viewed);
        assert_eq!(merged.creator, live.creator);
    }
}
