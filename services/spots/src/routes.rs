//! Spoty service routes

use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    collection::visible_pins,
    error::ApiError,
    images::{ImageFile, encode_images},
    markers::{LocationKey, Marker},
    middleware::{AuthUser, auth_middleware},
    models::{
        AddFriendRequest, FriendPinsResponse, GeocodeSearchQuery, MapViewResponse, MarkerView,
        PinListQuery, PinListResponse, ReverseGeocodeQuery,
    },
    models::pin::{Pin, PinForm},
    state::AppState,
    validation::validate_email,
};

/// Create the router for the Spoty service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/pins", get(list_pins).post(create_pin))
        .route("/pins/:id", put(update_pin).delete(delete_pin))
        .route("/pins/images", post(encode_pin_images))
        .route("/pins/map", get(map_view))
        .route("/pins/map/popup", post(open_marker_popup))
        .route("/friends", get(list_friends).post(add_friend))
        .route("/friends/pins", get(friends_pins))
        // five 5 MiB files plus multipart framing
        .layer(axum::extract::DefaultBodyLimit::max(32 * 1024 * 1024))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/geocode/search", get(geocode_search))
        .route("/geocode/reverse", get(geocode_reverse))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "spots-service"
    }))
}

/// Fire best-effort deletes for pins swept out by expiration
///
/// A failed remote delete only logs; the pin stays excluded from the
/// visible set either way.
fn spawn_sweep_deletes(state: &AppState, owner_id: Uuid, expired: Vec<Pin>) {
    for pin in expired {
        let Some(id) = pin.id else { continue };
        if pin.owner_id != owner_id {
            // the gateway would refuse a cross-owner delete anyway
            continue;
        }
        let repo = state.pin_repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.delete(owner_id, id).await {
                tracing::error!("Failed to delete expired pin {}: {}", id, e);
            }
        });
    }
}

/// List the caller's pins through the filter/sort pipeline
pub async fn list_pins(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PinListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pins = state
        .pin_repository
        .list_by_owner(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list pins: {}", e);
            ApiError::InternalServerError
        })?;

    let outcome = visible_pins(pins, &query.to_filter(), query.sort(), query.top10(), Utc::now());
    spawn_sweep_deletes(&state, user.id, outcome.expired);

    let total = outcome.visible.len();
    Ok(Json(PinListResponse {
        pins: outcome.visible,
        total,
    }))
}

/// Create a new pin from submitted form fields
pub async fn create_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(form): Json<PinForm>,
) -> Result<impl IntoResponse, ApiError> {
    let pin = form.build(user.id, None, Utc::now())?;

    let saved = state.pin_repository.create(&pin).await.map_err(|e| {
        tracing::error!("Failed to create pin: {}", e);
        ApiError::BadRequest("Error adding spot. Please try again.".to_string())
    })?;

    let (key, marker) = Marker::for_pin(&saved, None);
    state.markers.lock().await.upsert(key, marker);

    Ok((axum::http::StatusCode::CREATED, Json(saved)))
}

/// Replace an owned pin with the merged form (full-record replace)
pub async fn update_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(form): Json<PinForm>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .pin_repository
        .get(user.id, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load pin {}: {}", id, e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::NotFound("Spot not found".to_string()))?;

    let updated = form.build(user.id, Some(&existing), Utc::now())?;

    let replaced = state
        .pin_repository
        .update(user.id, id, &updated)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update pin {}: {}", id, e);
            ApiError::InternalServerError
        })?;
    if !replaced {
        return Err(ApiError::NotFound("Spot not found".to_string()));
    }

    // reconcile the marker: a moved pin vacates its old location key
    let old_key = LocationKey::new(existing.lat, existing.lng);
    let (new_key, marker) = Marker::for_pin(&updated, None);
    let mut markers = state.markers.lock().await;
    if old_key != new_key {
        markers.remove(old_key);
    }
    markers.upsert(new_key, marker);

    Ok(Json(updated))
}

/// Delete an owned pin and its marker
pub async fn delete_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .pin_repository
        .get(user.id, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load pin {}: {}", id, e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::NotFound("Spot not found".to_string()))?;

    let deleted = state.pin_repository.delete(user.id, id).await.map_err(|e| {
        tracing::error!("Failed to delete pin {}: {}", id, e);
        ApiError::InternalServerError
    })?;
    if !deleted {
        return Err(ApiError::NotFound("Spot not found".to_string()));
    }

    state
        .markers
        .lock()
        .await
        .remove(LocationKey::new(existing.lat, existing.lng));

    Ok(Json(json!({"message": "Spot deleted successfully"})))
}

/// Encode uploaded attachments into inline data-URL payloads
///
/// Returns both the accepted payloads and per-file rejection reasons so
/// the client can surface them alongside the form.
pub async fn encode_pin_images(mut multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read upload field: {}", e);
        ApiError::BadRequest("Malformed upload".to_string())
    })? {
        let file_name = field.file_name().unwrap_or("attachment").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read upload body: {}", e);
            ApiError::BadRequest("Malformed upload".to_string())
        })?;
        files.push(ImageFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(Json(encode_images(files)))
}

/// Open the popup of the marker at a coordinate, if one exists
pub async fn open_marker_popup(
    State(state): State<AppState>,
    Query(query): Query<ReverseGeocodeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let key = LocationKey::new(query.lat, query.lng);
    let opened = state.markers.lock().await.open_popup(key);

    Ok(Json(json!({ "opened": opened })))
}

/// Rebuild the marker registry from storage and serve the map view
///
/// The map shows the caller's own pins plus their friends' non-expired
/// pins, the latter with the friend's assigned display color.
pub async fn map_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let own = state
        .pin_repository
        .list_by_owner(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list pins for map: {}", e);
            ApiError::InternalServerError
        })?;

    let friend_ids = state
        .friend_repository
        .list_friend_ids(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list friends for map: {}", e);
            ApiError::InternalServerError
        })?;

    let friend_pins = state
        .pin_repository
        .list_by_owner_set(&friend_ids)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list friends' pins for map: {}", e);
            ApiError::InternalServerError
        })?;

    let mut colors = state.friend_colors.lock().await;
    let mut markers = state.markers.lock().await;
    markers.rebuild(
        own.iter().map(|pin| (pin, None)).chain(
            friend_pins
                .iter()
                .map(|pin| (pin, Some(colors.color_for(pin.owner_id)))),
        ),
        Utc::now(),
    );

    let views: Vec<MarkerView> = markers
        .iter()
        .map(|(key, marker)| MarkerView {
            key: *key,
            marker: marker.clone(),
        })
        .collect();

    Ok(Json(MapViewResponse { markers: views }))
}

/// Pins shared by the caller's friends, with per-friend colors
pub async fn friends_pins(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PinListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let friend_ids = state
        .friend_repository
        .list_friend_ids(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list friends: {}", e);
            ApiError::InternalServerError
        })?;

    let pins = state
        .pin_repository
        .list_by_owner_set(&friend_ids)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list friends' pins: {}", e);
            ApiError::InternalServerError
        })?;

    // expired friends' pins are excluded here; their owners' own sweeps
    // purge them from storage
    let outcome = visible_pins(pins, &query.to_filter(), query.sort(), query.top10(), Utc::now());

    let mut colors = state.friend_colors.lock().await;
    for friend in &friend_ids {
        colors.color_for(*friend);
    }

    Ok(Json(FriendPinsResponse {
        pins: outcome.visible,
        colors: colors.snapshot(),
    }))
}

/// Add a friend by email
pub async fn add_friend(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_email(payload.email.trim()).map_err(ApiError::BadRequest)?;

    let profile = state
        .friend_repository
        .find_profile_by_email(&payload.email)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up profile: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or(ApiError::NotFound(
            "User with this email not found".to_string(),
        ))?;

    if profile.id == user.id {
        return Err(ApiError::BadRequest(
            "You cannot add yourself as a friend".to_string(),
        ));
    }

    let already = state
        .friend_repository
        .exists(user.id, profile.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to check friendship: {}", e);
            ApiError::InternalServerError
        })?;
    if already {
        return Err(ApiError::BadRequest(
            "This user is already in your friends list".to_string(),
        ));
    }

    state
        .friend_repository
        .add(user.id, profile.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to add friend: {}", e);
            ApiError::BadRequest("Failed to add friend. Please try again.".to_string())
        })?;

    Ok(Json(json!({
        "message": format!("Successfully added {} as a friend!", profile.display_name()),
        "friendId": profile.id,
    })))
}

/// Friend identities with their assigned display colors
pub async fn list_friends(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friend_ids = state
        .friend_repository
        .list_friend_ids(user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list friends: {}", e);
            ApiError::InternalServerError
        })?;

    let mut colors = state.friend_colors.lock().await;
    let list: Vec<serde_json::Value> = friend_ids
        .iter()
        .map(|id| json!({"id": id, "color": colors.color_for(*id)}))
        .collect();

    Ok(Json(json!({ "friends": list })))
}

/// Address suggestion search
///
/// With a `session` token, a lookup superseded by that client's newer
/// keystroke returns no matches; other clients' searches never cancel
/// it. Without a token each lookup stands alone.
pub async fn geocode_search(
    State(state): State<AppState>,
    Query(query): Query<GeocodeSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let matches = match &query.session {
        Some(key) => state
            .suggestions
            .session(key)
            .await
            .suggest(&state.geocoder, &query.q)
            .await
            .map_err(|e| {
                tracing::error!("Geocode search failed: {}", e);
                ApiError::InternalServerError
            })?
            .unwrap_or_default(),
        None => state.geocoder.search(&query.q).await.map_err(|e| {
            tracing::error!("Geocode search failed: {}", e);
            ApiError::InternalServerError
        })?,
    };

    Ok(Json(matches))
}

/// Reverse-geocode a coordinate to a display name
pub async fn geocode_reverse(
    State(state): State<AppState>,
    Query(query): Query<ReverseGeocodeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = state
        .geocoder
        .reverse(query.lat, query.lng)
        .await
        .map_err(|e| {
            tracing::error!("Reverse geocode failed: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(json!({
        "displayName": display_name.unwrap_or_else(|| "Address unavailable".to_string())
    })))
}
