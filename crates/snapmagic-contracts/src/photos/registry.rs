use indexmap::IndexMap;

use super::photo::{EditFailureKind, EditedImage, Photo, PhotoSource, PhotoStatus};

/// In-memory collection of photos, keyed by id and kept in arrival order.
///
/// The registry has exactly one owner at a time; batch workers never hold it
/// and report back through settlements instead.
#[derive(Debug, Clone, Default)]
pub struct PhotoRegistry {
    photos: IndexMap<String, Photo>,
    next_seq: u64,
}

impl PhotoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every image among `files` as a pending photo and returns the
    /// new ids in arrival order. Files whose declared type is not `image/*`
    /// are skipped.
    pub fn add(&mut self, files: impl IntoIterator<Item = PhotoSource>) -> Vec<String> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let mut ids = Vec::new();
        for source in files.into_iter().filter(PhotoSource::is_image) {
            let id = format!("{}-{}-{}", source.name, stamp, self.next_seq);
            self.next_seq += 1;
            debug_assert!(!self.photos.contains_key(&id), "duplicate photo id {id}");
            self.photos.insert(id.clone(), Photo::new(id.clone(), source));
            ids.push(id);
        }
        ids
    }

    pub fn remove(&mut self, id: &str) -> Option<Photo> {
        self.photos.shift_remove(id)
    }

    /// Sets the status of `id` and, when given, replaces its edited result.
    /// A missing id is ignored and reported as `false`.
    pub fn mutate(&mut self, id: &str, status: PhotoStatus, edited: Option<EditedImage>) -> bool {
        let Some(photo) = self.photos.get_mut(id) else {
            return false;
        };
        photo.status = status;
        if let Some(edited) = edited {
            photo.edited = Some(edited);
        }
        if status == PhotoStatus::Done {
            photo.failure = None;
        }
        true
    }

    pub fn record_failure(&mut self, id: &str, kind: EditFailureKind) -> bool {
        let Some(photo) = self.photos.get_mut(id) else {
            return false;
        };
        photo.failure = Some(kind);
        true
    }

    /// Puts a settled photo back to `Pending` so the next batch picks it up.
    /// The previous edited result is kept until a new success replaces it.
    pub fn reset(&mut self, id: &str) -> bool {
        match self.photos.get_mut(id) {
            Some(photo) if photo.status.is_terminal() => {
                photo.status = PhotoStatus::Pending;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Photo> {
        self.photos.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.photos.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Photo> {
        self.photos.values()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.photos
            .values()
            .filter(|photo| photo.status == PhotoStatus::Pending)
            .map(|photo| photo.id.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.photos
            .values()
            .any(|photo| photo.status == PhotoStatus::Pending)
    }

    pub fn has_edited(&self) -> bool {
        self.photos
            .values()
            .any(|photo| photo.status == PhotoStatus::Done)
    }

    /// Photos currently `Done` that hold an edited result, in registry order.
    pub fn done(&self) -> Vec<&Photo> {
        self.photos
            .values()
            .filter(|photo| photo.status == PhotoStatus::Done && photo.edited.is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::PhotoRegistry;
    use crate::photos::{EditFailureKind, EditedImage, PhotoSource, PhotoStatus};

    fn sources(names: &[&str]) -> Vec<PhotoSource> {
        names
            .iter()
            .map(|name| PhotoSource::from_path(format!("/tmp/{name}")))
            .collect()
    }

    #[test]
    fn add_registers_images_as_pending_in_order() {
        let mut registry = PhotoRegistry::new();
        let ids = registry.add(sources(&["a.png", "b.jpg", "c.webp"]));
        assert_eq!(ids.len(), 3);
        assert_eq!(registry.pending_ids(), ids);
        assert!(registry
            .iter()
            .all(|photo| photo.status == PhotoStatus::Pending));
    }

    #[test]
    fn add_skips_non_image_files() {
        let mut registry = PhotoRegistry::new();
        let ids = registry.add(sources(&["a.png", "notes.txt", "b.jpg"]));
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.iter().all(|photo| photo.name() != "notes.txt"));
    }

    #[test]
    fn same_name_in_one_batch_gets_distinct_ids() {
        let mut registry = PhotoRegistry::new();
        let ids = registry.add(sources(&["dup.png", "dup.png"]));
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids[0].starts_with("dup.png-"));
    }

    #[test]
    fn mutate_on_missing_id_is_silent() {
        let mut registry = PhotoRegistry::new();
        assert!(!registry.mutate("ghost", PhotoStatus::Done, None));
        assert!(!registry.record_failure("ghost", EditFailureKind::Service));
        assert!(registry.is_empty());
    }

    #[test]
    fn failure_keeps_previous_edited_result() {
        let mut registry = PhotoRegistry::new();
        let id = registry.add(sources(&["a.png"])).remove(0);
        let edited = EditedImage::new(vec![9, 9], "image/png");
        assert!(registry.mutate(&id, PhotoStatus::Done, Some(edited.clone())));
        assert!(registry.reset(&id));
        assert!(registry.mutate(&id, PhotoStatus::Error, None));
        let photo = registry.get(&id).unwrap();
        assert_eq!(photo.status, PhotoStatus::Error);
        assert_eq!(photo.edited.as_ref(), Some(&edited));
    }

    #[test]
    fn reset_only_applies_to_settled_photos() {
        let mut registry = PhotoRegistry::new();
        let id = registry.add(sources(&["a.png"])).remove(0);
        assert!(!registry.reset(&id));
        registry.mutate(&id, PhotoStatus::Error, None);
        registry.record_failure(&id, EditFailureKind::EmptyResult);
        assert!(registry.reset(&id));
        assert_eq!(registry.get(&id).unwrap().status, PhotoStatus::Pending);
        assert!(registry.has_pending());
    }

    #[test]
    fn remove_drops_photo_and_done_filters_by_result() {
        let mut registry = PhotoRegistry::new();
        let ids = registry.add(sources(&["a.png", "b.png", "c.png"]));
        registry.mutate(&ids[0], PhotoStatus::Done, Some(EditedImage::new(vec![1], "image/png")));
        registry.mutate(&ids[1], PhotoStatus::Error, None);
        assert!(registry.remove(&ids[2]).is_some());
        assert!(registry.remove(&ids[2]).is_none());
        assert_eq!(registry.len(), 2);
        assert!(registry.has_edited());
        let done: Vec<&str> = registry.done().iter().map(|photo| photo.id.as_str()).collect();
        assert_eq!(done, vec![ids[0].as_str()]);
    }
}
