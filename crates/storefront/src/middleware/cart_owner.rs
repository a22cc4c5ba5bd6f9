//! Cart ownership extractor.
//!
//! Resolves the request to a [`CartOwner`]: the signed-in user when the
//! session holds one, otherwise the session's anonymous cart token, which is
//! created on first use.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::models::{CartOwner, CurrentUser, session_keys};

/// Extractor for the owner of the caller's cart.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentCart(owner): CurrentCart) -> impl IntoResponse {
///     owner.to_string()
/// }
/// ```
pub struct CurrentCart(pub CartOwner);

/// Rejection when the session layer is missing or its store failed.
#[derive(Debug)]
pub enum CartOwnerRejection {
    MissingSession,
    Session(tower_sessions::session::Error),
}

impl IntoResponse for CartOwnerRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingSession => {
                tracing::error!("Session layer not installed for cart routes");
            }
            Self::Session(err) => {
                tracing::error!(error = %err, "Failed to read cart owner from session");
            }
        }
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentCart
where
    S: Send + Sync,
{
    type Rejection = CartOwnerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(CartOwnerRejection::MissingSession)?;

        resolve_owner(session)
            .await
            .map(Self)
            .map_err(CartOwnerRejection::Session)
    }
}

/// Owner for a session, minting a guest token if the session has none.
///
/// # Errors
///
/// Returns the session store error if reading or writing fails.
pub async fn resolve_owner(
    session: &Session,
) -> Result<CartOwner, tower_sessions::session::Error> {
    if let Some(user) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?
    {
        return Ok(CartOwner::User(user.id));
    }

    if let Some(token) = session.get::<Uuid>(session_keys::CART_TOKEN).await? {
        return Ok(CartOwner::Guest(token));
    }

    let token = Uuid::new_v4();
    session.insert(session_keys::CART_TOKEN, token).await?;
    tracing::debug!(%token, "Issued guest cart token");
    Ok(CartOwner::Guest(token))
}
