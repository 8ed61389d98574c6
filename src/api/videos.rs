//! Video upload endpoint
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    video_store::{IngestedFile, UploadReceipt, UploadResponse},
};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;

/// Room for multipart boundaries and the title field on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build video routes
pub fn routes(max_upload_bytes: u64) -> Router<AppContext> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/videos/upload", post(upload_video))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Upload a video
///
/// Multipart fields: `title` (text) and `file` (binary). The file is hashed
/// and written while it streams in; it is never buffered whole in memory.
async fn upload_video(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut title: Option<String> = None;
    let mut receipt: Option<UploadReceipt> = None;
    let mut pending: Option<IngestedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some("title") => {
                title = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                if receipt.is_some() || pending.is_some() {
                    return Err(AppError::Validation(
                        "Only one file per upload".to_string(),
                    ));
                }

                let filename = field.file_name().unwrap_or_default().to_string();
                let stream = field.map_err(io::Error::other);
                tokio::pin!(stream);
                let reader = StreamReader::new(stream);

                match title.as_deref() {
                    Some(title) => {
                        receipt = Some(
                            ctx.videos
                                .upload(auth.account, title, reader, &filename)
                                .await?,
                        );
                    }
                    None => {
                        pending = Some(ctx.videos.ingest(reader, &filename).await?);
                    }
                }
            }
            _ => {}
        }
    }

    let receipt = match (receipt, pending) {
        (Some(receipt), _) => receipt,
        (None, Some(ingested)) => {
            let title = title.unwrap_or_default();
            ctx.videos
                .record_ingested(auth.account, &title, ingested)
                .await?
        }
        (None, None) => {
            return Err(AppError::Validation("File is required".to_string()));
        }
    };

    Ok((StatusCode::CREATED, Json(UploadResponse::from(receipt))))
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
}
