//! Artifact download.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use tokio::io::AsyncReadExt;
use fieldreport_core::{
    storage::{ObjectSource, ObjectStream},
    Prefix,
};

use super::error::{api_error, store_error, ApiError};
use crate::state::AppState;

const OBJECT_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-object-source");

/// Bytes read from the object per response chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Serve a stored object, reading it from whichever backend holds it.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((prefix, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let prefix = Prefix::parse(&prefix).ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, format!("Unknown prefix: {}", prefix))
    })?;

    let (stream, metadata, source) = state
        .objects()
        .open_artifact(prefix, &name)
        .await
        .map_err(store_error)?;

    let source = match source {
        ObjectSource::Local => "local",
        ObjectSource::Remote => "remote",
    };

    Ok((
        [
            (header::CONTENT_TYPE, metadata.content_type),
            (header::CONTENT_LENGTH, metadata.size.to_string()),
            (OBJECT_SOURCE_HEADER, source.to_string()),
        ],
        Body::from_stream(chunks(stream)),
    )
        .into_response())
}

/// Read an object in fixed-size chunks until EOF.
fn chunks(reader: ObjectStream) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let read = reader.read_buf(&mut buf).await?;
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some((buf.freeze(), reader)))
        }
    })
}
