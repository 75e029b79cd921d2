/// Portable library backup
///
/// Snapshots the library (followed artists, top artists per window, recent
/// plays, the taste profile) into a single JSON document written through
/// the export sink. The returned manifest carries the path and counts.
use crate::{
    error::AppResult,
    models::{ArtistRecord, PlayEvent, TasteProfile, TopArtistsByWindow},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Where exports land. File-system by default; tests substitute their own.
#[cfg_attr(test, mockall::automock)]
pub trait ExportSink: Send + Sync {
    /// Writes a JSON document under `stem` and returns the full path.
    fn write_json(&self, stem: &str, document: &serde_json::Value) -> AppResult<PathBuf>;
}

/// Writes exports as pretty-printed JSON files into one directory.
pub struct FileExporter {
    directory: PathBuf,
}

impl FileExporter {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }
}

impl ExportSink for FileExporter {
    fn write_json(&self, stem: &str, document: &serde_json::Value) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;

        let path = self.directory.join(format!("{}.json", stem));
        let pretty = serde_json::to_string_pretty(document)
            .map_err(|e| crate::error::AppError::Internal(e.to_string()))?;
        std::fs::write(&path, pretty)?;

        tracing::info!(path = %path.display(), "Export written");
        Ok(path)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BackupManifest {
    pub path: PathBuf,
    pub followed_artists: usize,
    pub top_artist_windows: usize,
    pub recent_plays: usize,
    pub created_at: chrono::DateTime<Utc>,
}

/// Builds the snapshot document and writes it through the sink.
pub fn write_backup(
    sink: &dyn ExportSink,
    followed: &[ArtistRecord],
    top_artists: &TopArtistsByWindow,
    recently_played: &[PlayEvent],
    profile: &TasteProfile,
) -> AppResult<BackupManifest> {
    let created_at = Utc::now();
    let stem = format!("library_backup_{}", created_at.format("%Y%m%d_%H%M%S"));

    let top_by_window: serde_json::Map<String, serde_json::Value> = top_artists
        .iter()
        .map(|(window, artists)| {
            (
                window.to_string(),
                serde_json::to_value(artists).unwrap_or_default(),
            )
        })
        .collect();

    let document = json!({
        "created_at": created_at,
        "followed_artists": followed,
        "top_artists": top_by_window,
        "recently_played": recently_played,
        "taste_profile": profile,
    });

    let path = sink.write_json(&stem, &document)?;

    Ok(BackupManifest {
        path,
        followed_artists: followed.len(),
        top_artist_windows: top_artists.len(),
        recent_plays: recently_played.len(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use std::collections::HashMap;

    fn artist(name: &str) -> ArtistRecord {
        ArtistRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            popularity: 40,
            followers: 100,
            genres: vec!["post-rock".to_string()],
        }
    }

    #[test]
    fn test_backup_document_shape_and_manifest() {
        let mut sink = MockExportSink::new();
        sink.expect_write_json()
            .withf(|stem, document| {
                stem.starts_with("library_backup_")
                    && document["followed_artists"].as_array().unwrap().len() == 2
                    && document["top_artists"]["short_term"].is_array()
                    && document["taste_profile"].is_object()
            })
            .returning(|stem, _| Ok(PathBuf::from(format!("/exports/{}.json", stem))));

        let mut top = HashMap::new();
        top.insert(TimeWindow::ShortTerm, vec![artist("Mogwai")]);

        let manifest = write_backup(
            &sink,
            &[artist("Mogwai"), artist("Tortoise")],
            &top,
            &[],
            &TasteProfile::default(),
        )
        .unwrap();

        assert_eq!(manifest.followed_artists, 2);
        assert_eq!(manifest.top_artist_windows, 1);
        assert_eq!(manifest.recent_plays, 0);
        assert!(manifest.path.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn test_file_exporter_writes_to_disk() {
        let dir = std::env::temp_dir().join(format!(
            "encore_backup_test_{}",
            std::process::id()
        ));
        let exporter = FileExporter::new(&dir);

        let path = exporter
            .write_json("test_doc", &json!({"ok": true}))
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"ok\""));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
