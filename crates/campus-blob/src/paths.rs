//! Bucket folder layout and path computation.
//!
//! Every asset of a lesson lives under `lessons/<lesson-id>/` once
//! published, or `lesson_edits/<lesson-id>/` while an edit session holds
//! it. Uploaded variants carry a random nonce so a re-upload never
//! collides with the blob it replaces.

use rand::Rng;
use rand::distributions::Alphanumeric;

pub const LESSONS: &str = "lessons";
pub const LESSON_EDITS: &str = "lesson_edits";
pub const ACCOUNTS: &str = "accounts";

const NONCE_LEN: usize = 10;

/// Random suffix distinguishing repeated uploads of the same asset slot.
pub fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

pub fn lesson_folder(folder: &str, lesson_id: &str) -> String {
    format!("{folder}/{lesson_id}")
}

pub fn part_folder(folder: &str, lesson_id: &str, part_id: &str) -> String {
    format!("{folder}/{lesson_id}/{part_id}")
}

/// Upload path for one screen slot of a normal part.
pub fn screen_path(
    folder: &str,
    lesson_id: &str,
    part_id: &str,
    screen: usize,
    ext: &str,
) -> String {
    format!("{folder}/{lesson_id}/{part_id}/{screen}-{}.{ext}", nonce())
}

pub fn screen_prefix(folder: &str, lesson_id: &str, part_id: &str, screen: usize) -> String {
    format!("{folder}/{lesson_id}/{part_id}/{screen}-")
}

/// Upload path for a panoramic part's image.
pub fn panoramic_path(folder: &str, lesson_id: &str, part_id: &str, ext: &str) -> String {
    format!("{folder}/{lesson_id}/{part_id}/panoramic-{}.{ext}", nonce())
}

pub fn panoramic_prefix(folder: &str, lesson_id: &str, part_id: &str) -> String {
    format!("{folder}/{lesson_id}/{part_id}/panoramic-")
}

pub fn thumbnail_path(folder: &str, lesson_id: &str, ext: &str) -> String {
    format!("{folder}/{lesson_id}/thumbnail-{}.{ext}", nonce())
}

pub fn thumbnail_prefix(folder: &str, lesson_id: &str) -> String {
    format!("{folder}/{lesson_id}/thumbnail-")
}

/// A lesson has at most one description file, always a PDF.
pub fn description_file_path(folder: &str, lesson_id: &str) -> String {
    format!("{folder}/{lesson_id}/description-file.pdf")
}

pub fn account_logo_path(account_id: &str, ext: &str) -> String {
    format!("{ACCOUNTS}/{account_id}/logo-{}.{ext}", nonce())
}

pub fn account_folder(account_id: &str) -> String {
    format!("{ACCOUNTS}/{account_id}")
}

/// Rewrite an edit-folder path to its published-folder location.
pub fn edit_to_published(path: &str) -> String {
    path.replacen(LESSON_EDITS, LESSONS, 1)
}

/// Rewrite every lesson-scoped path to a new lesson id (duplication).
pub fn rebase_lesson_path(path: &str, old_lesson_id: &str, new_lesson_id: &str) -> String {
    path.replacen(old_lesson_id, new_lesson_id, 1)
}

/// Whether a caller-supplied path sits under the expected folder and
/// lesson id. Paths that fail this check must never reach the store.
pub fn is_scoped_to(path: &str, folder: &str, lesson_id: &str) -> bool {
    path.starts_with(&format!("{folder}/{lesson_id}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_paths_promote_to_published() {
        let path = "lesson_edits/l1/p1/0-abc.png";
        assert_eq!(edit_to_published(path), "lessons/l1/p1/0-abc.png");
    }

    #[test]
    fn scope_check_requires_folder_and_lesson() {
        assert!(is_scoped_to("lesson_edits/l1/p1/0-a.png", LESSON_EDITS, "l1"));
        assert!(!is_scoped_to("lesson_edits/l2/p1/0-a.png", LESSON_EDITS, "l1"));
        assert!(!is_scoped_to("lessons/l1/p1/0-a.png", LESSON_EDITS, "l1"));
        // A lesson id that is a prefix of another must not pass.
        assert!(!is_scoped_to("lessons/l12/p1/0-a.png", LESSONS, "l1"));
    }

    #[test]
    fn rebase_rewrites_only_the_first_occurrence() {
        let path = "lessons/old-id/part-old-id/0-x.png";
        assert_eq!(
            rebase_lesson_path(path, "old-id", "new-id"),
            "lessons/new-id/part-old-id/0-x.png"
        );
    }

    #[test]
    fn nonces_differ_between_calls() {
        assert_ne!(nonce(), nonce());
    }
}
