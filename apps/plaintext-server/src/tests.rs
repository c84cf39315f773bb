//! HTTP tests for the plainTeXt server
//!
//! The TeX toolchain is replaced by small `sh` scripts injected through the
//! engine configuration, so these run without a TeX installation. The one
//! test that needs a real `pdflatex` is ignored by default.
//!
//! Test categories:
//! - Parameter validation
//! - Chunked upload
//! - Compile outcomes (artifact, log, timeout, cleanup)
//! - Error mapping

#[cfg(test)]
mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::io::{Cursor, Write};
    use std::path::Path;
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use latex_engine::{CommandSpec, Compiler, EngineConfig, Pipeline};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::{build_router, AppState};

    const MAX_CHUNK: usize = 1024 * 1024;

    struct Harness {
        server: TestServer,
        storage: TempDir,
        _work: TempDir,
    }

    fn sh(script: &str, timeout: Duration) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script], timeout)
    }

    /// pdflatex stand-in: fails with a log on `\undefined`, otherwise writes a PDF
    fn fake_toolchain() -> Vec<CommandSpec> {
        let timeout = Duration::from_secs(5);
        let pdflatex = sh(
            "if grep -q undefined main.tex; then \
               echo '! Undefined control sequence.' > main.log; exit 1; \
             else printf '%%PDF-1.5\\n%%fake\\n' > main.pdf; fi",
            timeout,
        );
        let bibtex = sh("exit 2", timeout);
        vec![pdflatex.clone(), bibtex, pdflatex.clone(), pdflatex]
    }

    fn harness_with(steps: Vec<CommandSpec>) -> Harness {
        let storage = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(storage.path())
            .with_work_root(work.path())
            .with_pipeline(Pipeline::new(steps));
        let state = AppState::new(Compiler::new(config));

        Harness {
            server: TestServer::new(build_router(state, MAX_CHUNK)).unwrap(),
            storage,
            _work: work,
        }
    }

    fn harness() -> Harness {
        harness_with(fake_toolchain())
    }

    fn project_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn storage_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    impl Harness {
        async fn upload(&self, id: &str, chunk: &[u8]) -> axum_test::TestResponse {
            self.server
                .post("/compile")
                .add_query_param("action", "upload")
                .add_query_param("upload_id", id)
                .bytes(Bytes::copy_from_slice(chunk))
                .await
        }

        async fn compile(&self, id: &str) -> axum_test::TestResponse {
            self.server
                .post("/compile")
                .add_query_param("action", "compile")
                .add_query_param("upload_id", id)
                .await
        }

        /// Upload `data` in chunks of `chunk_size`
        async fn upload_all(&self, id: &str, data: &[u8], chunk_size: usize) {
            for chunk in data.chunks(chunk_size) {
                self.upload(id, chunk).await.assert_status_ok();
            }
        }
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let h = harness();
        let response = h.server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<serde_json::Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "plaintext-server");
    }

    #[tokio::test]
    async fn test_invalid_tokens_rejected_before_touching_disk() {
        let h = harness();
        for id in ["", "abc123", "plaintext/../x", "plaintext.x", "xplaintext-1", "plain text"] {
            for action in ["upload", "compile", "bogus"] {
                let response = h
                    .server
                    .post("/compile")
                    .add_query_param("action", action)
                    .add_query_param("upload_id", id)
                    .bytes(Bytes::from_static(b"data"))
                    .await;
                response.assert_status_bad_request();
                assert_eq!(response.text(), "Invalid parameters");
            }
        }
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_missing_parameters_rejected() {
        let h = harness();

        let no_action = h
            .server
            .post("/compile")
            .add_query_param("upload_id", "plaintext-abc")
            .await;
        no_action.assert_status_bad_request();
        assert_eq!(no_action.text(), "Invalid parameters");

        let no_id = h
            .server
            .post("/compile")
            .add_query_param("action", "upload")
            .await;
        no_id.assert_status_bad_request();
        assert_eq!(no_id.text(), "Invalid parameters");
    }

    #[tokio::test]
    async fn test_malformed_query_rejected_generically() {
        let h = harness();
        let response = h
            .server
            .post("/compile")
            .add_query_param("action", "upload")
            .add_query_param("action", "compile")
            .add_query_param("upload_id", "plaintext-abc")
            .bytes(Bytes::from_static(b"data"))
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "Invalid parameters");
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let h = harness();
        let response = h
            .server
            .post("/compile")
            .add_query_param("action", "delete")
            .add_query_param("upload_id", "plaintext-abc")
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "An unknown error occurred.");
    }

    #[tokio::test]
    async fn test_upload_acknowledged_and_ordered() {
        let h = harness();
        for chunk in [b"A", b"B", b"C"] {
            let response = h.upload("plaintext-abc123", chunk).await;
            response.assert_status_ok();
            let json = response.json::<serde_json::Value>();
            assert_eq!(json["status"], "chunk received");
        }

        let stored = std::fs::read(h.storage.path().join("plaintext-abc123.zip")).unwrap();
        assert_eq!(stored, b"ABC".to_vec());
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let h = harness();
        let response = h.upload("plaintext-empty", b"").await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "Missing data on upload");
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_compile_without_upload() {
        let h = harness();
        let response = h.compile("plaintext-fresh").await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "Chunks must be uploaded before compiling");
    }

    #[tokio::test]
    async fn test_missing_entry_file() {
        let h = harness();
        let zip = project_zip(&[("notes.txt", "just notes")]);
        h.upload_all("plaintext-notes", &zip, 64).await;

        let response = h.compile("plaintext-notes").await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "main.tex was not uploaded");
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_successful_compile_returns_pdf() {
        let h = harness();
        let zip = project_zip(&[
            ("main.tex", "\\documentclass{article}\\begin{document}Hi\\end{document}"),
            ("refs.bib", "@misc{x, title={X}}"),
        ]);
        h.upload_all("plaintext-good", &zip, 100).await;

        let response = h.compile("plaintext-good").await;
        response.assert_status_ok();
        assert!(response.as_bytes().starts_with(b"%PDF"));
        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"output.pdf\""
        );

        // Archive is gone, so a repeat compile has nothing to work with.
        assert!(storage_is_empty(h.storage.path()));
        let again = h.compile("plaintext-good").await;
        again.assert_status_bad_request();
        assert_eq!(again.text(), "Chunks must be uploaded before compiling");
    }

    #[tokio::test]
    async fn test_failed_compile_returns_log() {
        let h = harness();
        let zip = project_zip(&[("main.tex", "\\begin{document}\\undefined\\end{document}")]);
        h.upload_all("plaintext-broken", &zip, 128).await;

        let response = h.compile("plaintext-broken").await;
        response.assert_status_bad_request();
        assert_eq!(
            response.text(),
            "PDF compilation failed. Log: \n! Undefined control sequence.\n"
        );

        let again = h.compile("plaintext-broken").await;
        again.assert_status_bad_request();
        assert_eq!(again.text(), "Chunks must be uploaded before compiling");
    }

    #[tokio::test]
    async fn test_compile_without_log_is_internal_error() {
        let h = harness_with(vec![sh("exit 1", Duration::from_secs(5))]);
        h.upload_all("plaintext-nolog", &project_zip(&[("main.tex", "x")]), 512)
            .await;

        let response = h.compile("plaintext-nolog").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.text(),
            "PDF compilation failed and no log file was generated."
        );
    }

    #[tokio::test]
    async fn test_timeout_aborts_pipeline() {
        let h = harness_with(vec![
            sh("printf '%%PDF-1.5\\n' > main.pdf", Duration::from_secs(5)),
            sh("sleep 10", Duration::from_millis(200)),
            sh("touch never.txt", Duration::from_secs(5)),
        ]);
        h.upload_all("plaintext-slow", &project_zip(&[("main.tex", "x")]), 512)
            .await;

        let response = h.compile("plaintext-slow").await;
        response.assert_status_bad_request();
        assert_eq!(
            response.text(),
            "Compilation timed out. Your LaTeX job took too long to run."
        );
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_internal_error() {
        let h = harness();
        h.upload_all("plaintext-corrupt", b"definitely not a zip archive", 8)
            .await;

        let response = h.compile("plaintext-corrupt").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().starts_with("An unexpected error occurred"));
        assert!(storage_is_empty(h.storage.path()));
    }

    #[tokio::test]
    async fn test_oversized_chunk_rejected() {
        let h = harness();
        let response = h.upload("plaintext-big", &vec![0u8; MAX_CHUNK + 1]).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    #[ignore = "requires pdflatex and bibtex on PATH"]
    async fn test_real_toolchain_produces_pdf() {
        let storage = tempfile::tempdir().unwrap();
        let state = AppState::new(Compiler::new(EngineConfig::new(storage.path())));
        let server = TestServer::new(build_router(state, MAX_CHUNK)).unwrap();

        let zip = project_zip(&[(
            "main.tex",
            "\\documentclass{article}\\begin{document}Hello\\end{document}",
        )]);
        for chunk in zip.chunks(256) {
            server
                .post("/compile")
                .add_query_param("action", "upload")
                .add_query_param("upload_id", "plaintext-real")
                .bytes(Bytes::copy_from_slice(chunk))
                .await
                .assert_status_ok();
        }

        let response = server
            .post("/compile")
            .add_query_param("action", "compile")
            .add_query_param("upload_id", "plaintext-real")
            .await;
        response.assert_status_ok();
        assert!(response.as_bytes().starts_with(b"%PDF"));
    }
}

#[cfg(test)]
mod error_mapping_tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use latex_engine::EngineError;
    use proptest::prelude::*;

    use crate::error::ServerError;

    #[test]
    fn test_client_errors_map_to_400() {
        for err in [
            EngineError::InvalidParameters,
            EngineError::MissingUploadData,
            EngineError::MissingUpload,
            EngineError::MissingEntryFile("main.tex".to_string()),
            EngineError::CompileFailed { log: "log".to_string() },
        ] {
            let mapped = ServerError::from(err);
            assert_eq!(mapped.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_server_errors_map_to_500() {
        for err in [
            EngineError::NoLog,
            EngineError::ChunkWrite(std::io::Error::other("disk full")),
            EngineError::Task("panicked".to_string()),
        ] {
            let response = ServerError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                response.headers()["content-type"],
                "text/plain; charset=utf-8"
            );
        }
    }

    #[test]
    fn test_chunk_write_surfaces_cause() {
        let mapped = ServerError::from(EngineError::ChunkWrite(std::io::Error::other(
            "disk full",
        )));
        assert_eq!(
            mapped.to_string(),
            "Server error while writing file chunk: disk full"
        );
    }

    proptest! {
        /// Property: the compile log reaches the client verbatim
        #[test]
        fn compile_log_passed_through(log in "[ -~\n]{0,200}") {
            let mapped = ServerError::from(EngineError::CompileFailed { log: log.clone() });
            prop_assert_eq!(mapped.status(), StatusCode::BAD_REQUEST);
            prop_assert_eq!(
                mapped.to_string(),
                format!("PDF compilation failed. Log: \n{}", log)
            );
        }
    }
}
