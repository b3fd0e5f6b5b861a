//! Bucket notification configuration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tidings_core::types::{BucketPath, NotificationConfiguration};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

type ConfigResponse = Result<Json<NotificationConfiguration>, ApiError>;

/// GET /buckets/{bucket}/notification
pub async fn get_bucket_notification(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> ConfigResponse {
    get_configuration(&state, None, &bucket).await
}

/// GET /tenants/{tenant}/buckets/{bucket}/notification
pub async fn get_tenant_bucket_notification(
    State(state): State<AppState>,
    Path((tenant, bucket)): Path<(String, String)>,
) -> ConfigResponse {
    get_configuration(&state, Some(&tenant), &bucket).await
}

/// PUT /buckets/{bucket}/notification
pub async fn put_bucket_notification(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    body: Bytes,
) -> ConfigResponse {
    put_configuration(&state, None, &bucket, &body).await
}

/// PUT /tenants/{tenant}/buckets/{bucket}/notification
pub async fn put_tenant_bucket_notification(
    State(state): State<AppState>,
    Path((tenant, bucket)): Path<(String, String)>,
    body: Bytes,
) -> ConfigResponse {
    put_configuration(&state, Some(&tenant), &bucket, &body).await
}

/// DELETE /buckets/{bucket}/notification
pub async fn delete_bucket_notification(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.manager.delete_configuration(None, &bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /tenants/{tenant}/buckets/{bucket}/notification
pub async fn delete_tenant_bucket_notification(
    State(state): State<AppState>,
    Path((tenant, bucket)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .manager
        .delete_configuration(Some(&tenant), &bucket)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_configuration(
    state: &AppState,
    tenant: Option<&str>,
    bucket: &str,
) -> ConfigResponse {
    debug!("GetBucketNotification tenant={:?} bucket={}", tenant, bucket);

    match state.manager.get_configuration(tenant, bucket).await? {
        Some(config) => Ok(Json(config.as_ref().clone())),
        None => {
            let path = BucketPath::new(tenant, bucket)?;
            Err(ApiError::NoSuchConfiguration(path.to_string()))
        }
    }
}

/// The path names the bucket; whatever the body says about it is ignored.
async fn put_configuration(
    state: &AppState,
    tenant: Option<&str>,
    bucket: &str,
    body: &[u8],
) -> ConfigResponse {
    debug!(
        "PutBucketNotification tenant={:?} bucket={} body_len={}",
        tenant,
        bucket,
        body.len()
    );

    let mut config: NotificationConfiguration = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedBody(format!("invalid configuration document: {}", e)))?;
    config.bucket_name = bucket.to_string();
    config.tenant_id = tenant.map(str::to_string);

    let stored = state.manager.put_configuration(config).await?;
    Ok(Json(stored.as_ref().clone()))
}
