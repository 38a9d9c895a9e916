//! Response streamer
//!
//! Buffers the content of a result asset and turns it into a download
//! response. The body is passed through untouched.

use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;

use super::provider::ContentStream;
use super::types::{MergeError, MergeResult, OutputFormat};

/// Accumulate a content stream into one buffer, preserving chunk order.
///
/// Fails as soon as the buffered size would exceed `limit`.
pub async fn collect_stream(mut stream: ContentStream, limit: usize) -> Result<Bytes, MergeError> {
    let mut buffer = Vec::new();
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > limit {
            return Err(MergeError::OutputTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
        chunks += 1;
    }

    tracing::debug!(chunks, size = buffer.len(), "Collected merged document");
    Ok(Bytes::from(buffer))
}

/// UTC timestamp with `:`, `.` and `-` removed, e.g. `20240115T103000123Z`
pub fn compact_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.', '-'], "")
}

/// Download name of a merged document
pub fn output_filename(format: OutputFormat, now: DateTime<Utc>) -> String {
    format!("mergedOutput_{}.{}", compact_timestamp(now), format.extension())
}

impl MergeResult {
    pub fn new(bytes: Bytes, format: OutputFormat) -> Self {
        Self {
            bytes,
            format,
            filename: output_filename(format, Utc::now()),
        }
    }
}

impl IntoResponse for MergeResult {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        let length = self.bytes.len();

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.format.mime_type().to_string()),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CONTENT_LENGTH, length.to_string()),
            ],
            Body::from(self.bytes),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::stream;

    fn fixture(chunks: Vec<&'static [u8]>) -> ContentStream {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c)))).boxed()
    }

    #[tokio::test]
    async fn test_collect_preserves_bytes() {
        let chunks: Vec<&'static [u8]> = vec![&b"%PDF-1.7\n"[..], &b"\x00\x01\xff"[..], &b""[..], &b"%%EOF"[..]];
        let expected: Vec<u8> = chunks.concat();

        let collected = collect_stream(fixture(chunks), 1024).await.unwrap();
        assert_eq!(&collected[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_collect_enforces_limit() {
        let result = collect_stream(fixture(vec![&b"12345"[..], &b"6789"[..]]), 8).await;
        assert!(matches!(result, Err(MergeError::OutputTooLarge { limit: 8 })));

        let exact = collect_stream(fixture(vec![&b"1234"[..], &b"5678"[..]]), 8).await.unwrap();
        assert_eq!(exact.len(), 8);
    }

    #[tokio::test]
    async fn test_collect_propagates_stream_error() {
        let failing: ContentStream = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(MergeError::Unclassified("connection reset".to_string())),
        ])
        .boxed();

        let result = collect_stream(failing, 1024).await;
        assert!(matches!(result, Err(MergeError::Unclassified(_))));
    }

    #[test]
    fn test_output_filename() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
            + chrono::Duration::milliseconds(123);

        assert_eq!(compact_timestamp(now), "20240115T103000123Z");
        assert_eq!(output_filename(OutputFormat::Docx, now), "mergedOutput_20240115T103000123Z.docx");
        assert_eq!(output_filename(OutputFormat::Pdf, now), "mergedOutput_20240115T103000123Z.pdf");
    }

    #[test]
    fn test_response_headers() {
        let result = MergeResult {
            bytes: Bytes::from_static(b"%PDF"),
            format: OutputFormat::Pdf,
            filename: "mergedOutput_1.pdf".to_string(),
        };

        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"mergedOutput_1.pdf\""
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    }
}
