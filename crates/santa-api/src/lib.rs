pub mod draw;
pub mod error;
pub mod exclusions;
pub mod middleware;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::state::AppState;

/// All group routes, behind bearer auth.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/groups/{group_id}/draw", post(draw::run_draw))
        .route("/groups/{group_id}/draw/preview", get(draw::preview_draw))
        .route("/groups/{group_id}/draw/me", get(draw::my_receiver))
        .route("/groups/{group_id}/exclusions", post(exclusions::add_exclusion))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    use santa_crypto::keys::generate_key;
    use santa_crypto::{CipherCodec, CipherVersion, Keyring};
    use santa_db::Database;
    use santa_draw::{DrawService, MatchingSolver};
    use santa_types::api::Claims;
    use santa_types::{GroupId, UserId};

    use crate::state::AppStateInner;

    const SECRET: &str = "test-secret";

    fn app() -> (Router, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let codec = CipherCodec::new(
            Keyring::new().with_key(1, generate_key()),
            CipherVersion::Numbered(1),
        )
        .unwrap();
        let state = Arc::new(AppStateInner {
            draws: DrawService::new(db.clone(), Arc::new(codec), MatchingSolver::default()),
            jwt_secret: SECRET.into(),
        });
        (router(state), db)
    }

    fn group(db: &Database, owner: UserId, members: &[UserId]) -> GroupId {
        let gid = db.create_group(owner, "Friends").unwrap();
        for &m in members {
            db.invite(gid, m).unwrap();
            db.accept_invitation(gid, m).unwrap();
        }
        gid
    }

    fn token(user: UserId) -> String {
        let claims = Claims {
            sub: user,
            exp: 4_000_000_000,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn request(method: &str, uri: &str, user: Option<UserId>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn requires_bearer_token() {
        let (app, db) = app();
        let gid = group(&db, 1, &[2, 3]);
        let (status, body) = send(&app, request("POST", &format!("/groups/{gid}/draw"), None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn owner_draws_once() {
        let (app, db) = app();
        let gid = group(&db, 1, &[2, 3]);
        let uri = format!("/groups/{gid}/draw");

        let (status, body) = send(&app, request("POST", &uri, Some(2), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let (status, body) = send(&app, request("POST", &uri, Some(1), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["participants"], 3);

        let (status, body) = send(&app, request("POST", &uri, Some(1), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already_drawn");

        let (status, body) =
            send(&app, request("GET", &format!("/groups/{gid}/draw/me"), Some(2), None)).await;
        assert_eq!(status, StatusCode::OK);
        let receiver = body["receiver_user_id"].as_i64().unwrap();
        assert!(receiver == 1 || receiver == 3);
    }

    #[tokio::test]
    async fn infeasible_and_insufficient_are_422() {
        let (app, db) = app();
        let solo = group(&db, 1, &[]);
        let (status, body) =
            send(&app, request("POST", &format!("/groups/{solo}/draw"), Some(1), None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "insufficient_participants");

        let pair = group(&db, 1, &[2]);
        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/groups/{pair}/exclusions"),
                Some(1),
                Some(r#"{"user_id":1,"excluded_user_id":2}"#),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "infeasible");
        assert!(db.get_exclusions(pair).unwrap().is_empty());
    }

    #[tokio::test]
    async fn preview_and_missing_group() {
        let (app, db) = app();
        let gid = group(&db, 1, &[2, 3, 4]);
        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/groups/{gid}/exclusions"),
                Some(1),
                Some(r#"{"user_id":2,"excluded_user_id":3}"#),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["excluded_user_id"], 3);

        let (status, body) =
            send(&app, request("GET", &format!("/groups/{gid}/draw/preview"), Some(1), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feasible"], true);
        assert_eq!(body["sample"].as_array().unwrap().len(), 4);
        assert_eq!(db.count_assignments(gid).unwrap(), 0);

        let (status, _) = send(&app, request("GET", "/groups/999/draw/preview", Some(1), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn receiver_is_null_before_draw() {
        let (app, db) = app();
        let gid = group(&db, 1, &[2]);
        let (status, body) =
            send(&app, request("GET", &format!("/groups/{gid}/draw/me"), Some(2), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["receiver_user_id"].is_null());
    }
}
