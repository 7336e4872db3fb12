/// Backup filenames as last listed by the server, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupCatalog {
    filenames: Vec<String>,
    loaded: bool,
}

impl BackupCatalog {
    /// Replaces the catalog with a fresh listing. Blank names are dropped.
    pub fn replace(&mut self, filenames: Vec<String>) {
        self.filenames = filenames
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .collect();
        self.loaded = true;
    }

    /// Records a backup the server just reported creating.
    pub fn note_created(&mut self, filename: &str) {
        if filename.trim().is_empty() || self.contains(filename) {
            return;
        }
        self.filenames.insert(0, filename.to_string());
    }

    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.filenames.iter().any(|name| name == filename)
    }

    /// Whether a listing has been received at least once.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.filenames.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_and_note_created() {
        let mut catalog = BackupCatalog::default();
        assert!(!catalog.is_loaded());
        catalog.replace(vec![
            "world_20240101.zip".to_string(),
            " ".to_string(),
            "world_20231231.zip".to_string(),
        ]);
        assert!(catalog.is_loaded());
        assert_eq!(catalog.len(), 2);

        catalog.note_created("world_20240102.zip");
        catalog.note_created("world_20240102.zip");
        assert_eq!(
            catalog.iter().collect::<Vec<_>>(),
            vec![
                "world_20240102.zip",
                "world_20240101.zip",
                "world_20231231.zip"
            ]
        );
        assert!(!catalog.contains("world.zip"));
    }
}
