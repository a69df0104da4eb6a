//! Publish preconditions.

use campus_core::models::lesson::{LessonContent, SCREENS_PER_PART};

use crate::error::LifecycleError;

fn incomplete(reason: impl Into<String>) -> LifecycleError {
    LifecycleError::IncompleteDraft {
        reason: reason.into(),
    }
}

/// Check that a draft has everything a published lesson must have:
/// title, description, categories, parts and thumbnail all present, every
/// normal part fully populated with three screen URLs, and every
/// panoramic part carrying exactly one of an image asset or an external
/// URL.
pub fn draft_ready_for_publish(content: &LessonContent) -> Result<(), LifecycleError> {
    if content.title.as_deref().is_none_or(str::is_empty) {
        return Err(incomplete("missing title"));
    }
    if content.description.as_deref().is_none_or(str::is_empty) {
        return Err(incomplete("missing description"));
    }
    if content.categories.is_empty() {
        return Err(incomplete("missing categories"));
    }
    if content.parts.is_empty() {
        return Err(incomplete("lesson has no parts"));
    }
    if content.thumbnail.as_deref().is_none_or(str::is_empty) {
        return Err(incomplete("missing thumbnail"));
    }

    for part in &content.parts {
        if part.is_panoramic() {
            match (&part.blob_path, &part.panoramic_url) {
                (None, None) => {
                    return Err(incomplete(format!("panoramic part {} has no asset", part.id)));
                }
                (Some(_), Some(_)) => {
                    return Err(incomplete(format!(
                        "panoramic part {} has both an asset and an external URL",
                        part.id
                    )));
                }
                _ => {}
            }
        } else {
            if part.screens.len() != SCREENS_PER_PART {
                return Err(incomplete(format!(
                    "part {} must have exactly {SCREENS_PER_PART} screens",
                    part.id
                )));
            }
            for (index, screen) in part.screens.iter().enumerate() {
                if screen.url.as_deref().is_none_or(str::is_empty) {
                    return Err(incomplete(format!(
                        "part {} screen {index} has no content",
                        part.id
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::models::lesson::{Part, Screen, ScreenKind};
    use uuid::Uuid;

    fn complete_content() -> LessonContent {
        let mut part = Part::normal(0);
        for (i, screen) in part.screens.iter_mut().enumerate() {
            *screen = Screen {
                url: Some(format!("lessons/l1/p1/{i}-x.png")),
                kind: Some(ScreenKind::Image),
                mime_type: Some("image/png".into()),
                comment: None,
            };
        }

        let mut content = LessonContent::empty(Uuid::new_v4());
        content.title = Some("Anatomy 101".into());
        content.description = Some("Intro".into());
        content.categories = vec![Uuid::new_v4()];
        content.thumbnail = Some("lessons/l1/thumbnail-x.png".into());
        content.parts = vec![part];
        content
    }

    #[test]
    fn complete_draft_passes() {
        draft_ready_for_publish(&complete_content()).unwrap();
    }

    #[test]
    fn missing_thumbnail_is_rejected() {
        let mut content = complete_content();
        content.thumbnail = None;
        let err = draft_ready_for_publish(&content).unwrap_err();
        assert!(matches!(err, LifecycleError::IncompleteDraft { .. }));
    }

    #[test]
    fn empty_screen_url_is_rejected() {
        let mut content = complete_content();
        content.parts[0].screens[2].url = None;
        assert!(draft_ready_for_publish(&content).is_err());
    }

    #[test]
    fn panoramic_part_needs_exactly_one_asset() {
        let mut content = complete_content();
        let mut pano = Part::panoramic(1);
        content.parts.push(pano.clone());
        assert!(draft_ready_for_publish(&content).is_err());

        pano.blob_path = Some("lessons/l1/p2/panoramic-x.jpg".into());
        content.parts[1] = pano.clone();
        draft_ready_for_publish(&content).unwrap();

        pano.panoramic_url = Some("https://example.com/p.jpg".into());
        content.parts[1] = pano;
        assert!(draft_ready_for_publish(&content).is_err());
    }
}
