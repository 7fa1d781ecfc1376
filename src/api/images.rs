//! Image endpoints
//!
//! GET  /?n={identifier}&s={scale}&q={quality} - Serve an image, optionally resized
//! POST /                                        - Upload multipart field `image`

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{error::ApiError, AppState};
use crate::images::{
    accepted_extensions, render, upload_extension, Identifier, ImageKind, RetrievalParams,
    StoreError,
};

/// Multipart field carrying the upload
const IMAGE_FIELD: &str = "image";

/// Stored images never change under a name
const CACHE_CONTROL: &str = "max-age=86400";

/// Retrieval query params
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub n: Option<String>,
    pub s: Option<String>,
    pub q: Option<String>,
}

impl RetrievalQuery {
    /// Collect params from decoded pairs; the first occurrence of a key wins
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "n" => &mut query.n,
                "s" => &mut query.s,
                "q" => &mut query.q,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

/// Serve an image by identifier
pub async fn retrieve(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(pairs) = pairs.map_err(|e| ApiError::InvalidRequest {
        status: StatusCode::BAD_REQUEST,
        message: e.body_text(),
    })?;
    let query = RetrievalQuery::from_pairs(pairs);

    let identifier: Identifier = query
        .n
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::InvalidName)?;
    let kind = identifier.kind();

    let data = state.store.load(&identifier).await?;
    let params = RetrievalParams::parse(kind, query.s.as_deref(), query.q.as_deref())?;

    let max_dimension = state.config.max_dimension;
    let body =
        tokio::task::spawn_blocking(move || render(&data, kind, &params, max_dimension)).await??;

    debug!(
        name = %identifier,
        scale = ?params.scale,
        bytes = body.len(),
        "Serving image"
    );

    Ok((
        [
            (header::CONTENT_TYPE, kind.content_type()),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        body,
    )
        .into_response())
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store an uploaded image, returning its identifier
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidRequest {
        status: e.status(),
        message: e.body_text(),
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let extension = upload_extension(field.file_name()).unwrap_or_default();
        if ImageKind::from_extension(&extension).is_none() {
            debug!(
                extension = %extension,
                accepted = %accepted_extensions(),
                "Unsupported upload type"
            );
            return Err(ApiError::UnsupportedType);
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((extension, data));
        break;
    }

    let (extension, data) = upload.ok_or_else(|| ApiError::InvalidRequest {
        status: StatusCode::BAD_REQUEST,
        message: format!("missing multipart field '{}'", IMAGE_FIELD),
    })?;
    let size = data.len();

    match state.store.store(data.to_vec(), &extension).await {
        Ok(stored) => {
            if stored.created {
                info!(name = %stored.identifier, bytes = size, "Stored image");
            }
            Ok(Json(UploadResponse {
                success: true,
                name: Some(stored.identifier.to_string()),
                error: None,
            })
            .into_response())
        }
        Err(StoreError::Unsupported(_)) => Err(ApiError::UnsupportedType),
        Err(e) => {
            warn!(error = %e, "Failed to store image");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UploadResponse {
                    success: false,
                    name: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response())
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::InvalidRequest {
        status: e.status(),
        message: e.body_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_query_first_value_wins() {
        let query = RetrievalQuery::from_pairs(pairs(&[
            ("n", "first.png"),
            ("s", "0.5"),
            ("n", "second.png"),
            ("s", "2"),
            ("q", "80"),
            ("q", "10"),
        ]));

        assert_eq!(query.n.as_deref(), Some("first.png"));
        assert_eq!(query.s.as_deref(), Some("0.5"));
        assert_eq!(query.q.as_deref(), Some("80"));
    }

    #[test]
    fn test_query_ignores_unknown_keys() {
        let query = RetrievalQuery::from_pairs(pairs(&[("x", "1"), ("s", "")]));
        assert_eq!(
            query,
            RetrievalQuery {
                n: None,
                s: Some(String::new()),
                q: None,
            }
        );
    }
}
