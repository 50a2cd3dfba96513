fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use sice_protocol::{
        ChunkResponse, CompletedUpload, ErrorBody, FileKind, UploadProgress, UploadStatus,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (key-order independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Server responses ---

    #[test]
    fn fixture_chunk_response_partial() {
        let resp: ChunkResponse = roundtrip_test("chunk_response_partial.json");
        assert!(!resp.completed);
        assert!(resp.temp_path.is_none());
        assert_eq!(resp.received, Some(1));
    }

    #[test]
    fn fixture_chunk_response_final() {
        let resp: ChunkResponse = roundtrip_test("chunk_response_final.json");
        assert!(resp.completed);
        assert!(resp.temp_path.unwrap().starts_with("temp/invoice/"));
    }

    #[test]
    fn chunk_response_minimal_body() {
        // Only `completed` is guaranteed by the backend.
        let resp: ChunkResponse = serde_json::from_str(r#"{"completed":false}"#).unwrap();
        assert_eq!(resp, ChunkResponse::default());
    }

    #[test]
    fn chunk_response_ignores_unknown_fields() {
        let resp: ChunkResponse =
            serde_json::from_str(r#"{"completed":false,"success":true,"chunkIndex":0}"#).unwrap();
        assert!(!resp.completed);
    }

    #[test]
    fn fixture_error_body() {
        let body: ErrorBody = roundtrip_test("error_body.json");
        assert!(body.message.unwrap().starts_with("Invalid file type"));
    }

    // --- Progress events ---

    #[test]
    fn fixture_upload_progress_uploading() {
        let p: UploadProgress = roundtrip_test("upload_progress_uploading.json");
        assert_eq!(p.status, UploadStatus::Uploading);
        assert_eq!(p.file_kind, FileKind::Invoice);
        assert_eq!(
            p.percentage,
            UploadProgress::percentage_of(p.loaded_bytes, p.total_bytes)
        );
        assert!(!p.is_terminal());
    }

    #[test]
    fn fixture_upload_progress_completed() {
        let p: UploadProgress = roundtrip_test("upload_progress_completed.json");
        assert_eq!(p.status, UploadStatus::Completed);
        assert_eq!(p.percentage, 100);
        assert!(p.temp_path.is_some());
        assert!(p.is_terminal());
    }

    #[test]
    fn fixture_upload_progress_error() {
        let p: UploadProgress = roundtrip_test("upload_progress_error.json");
        assert_eq!(p.status, UploadStatus::Error);
        assert_eq!(p.file_kind, FileKind::PickingList);
        assert_eq!(p.error.as_deref(), Some("chunk request timed out"));
        assert!(p.temp_path.is_none());
    }

    // --- Order handoff ---

    #[test]
    fn fixture_attachments() {
        let list: Vec<CompletedUpload> = roundtrip_test("attachments.json");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].file_kind, FileKind::PerformaPdf);
        assert_eq!(list[1].file_kind, FileKind::Invoice);
    }

    #[test]
    fn file_kind_wire_names() {
        for kind in FileKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
