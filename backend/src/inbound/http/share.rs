//! Public share pages.
//!
//! ```text
//! GET /api/v1/share/{token}
//! GET /api/v1/share/{token}/audio
//! ```
//!
//! No authentication: the token is the capability. Malformed, unknown and
//! unselected tokens all answer `404`.

use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE, CacheControl, CacheDirective};
use actix_web::{HttpResponse, get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::SharedSong;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// MIME type of rendered songs.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Public metadata of a shared song.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedSongBody {
    pub recipient_name: String,
    pub author_name: String,
    #[schema(example = "birthday")]
    pub occasion: String,
    #[schema(example = "pop")]
    pub genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
    pub audio_url: String,
}

impl From<SharedSong> for SharedSongBody {
    fn from(value: SharedSong) -> Self {
        Self {
            recipient_name: value.recipient_name,
            author_name: value.author_name,
            occasion: value.occasion.as_str().to_owned(),
            genre: value.genre.as_str().to_owned(),
            duration_ms: value.duration_ms,
            audio_url: value.audio_url,
        }
    }
}

/// Metadata for the song behind a share token.
#[utoipa::path(
    get,
    path = "/api/v1/share/{token}",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Shared song", body = SharedSongBody),
        (status = 404, description = "Unknown token", body = ErrorSchema)
    ),
    tags = ["share"],
    operation_id = "getSharedSong",
    security([])
)]
#[get("/share/{token}")]
pub async fn shared_song(
    state: web::Data<HttpState>,
    token: web::Path<String>,
) -> ApiResult<web::Json<SharedSongBody>> {
    let song = state.sharing.shared_song(&token).await?;
    Ok(web::Json(song.into()))
}

/// Stream the audio behind a share token.
#[utoipa::path(
    get,
    path = "/api/v1/share/{token}/audio",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Audio bytes", content_type = "audio/mpeg", body = Vec<u8>),
        (status = 404, description = "Unknown token", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["share"],
    operation_id = "getSharedAudio",
    security([])
)]
#[get("/share/{token}/audio")]
pub async fn shared_audio(
    state: web::Data<HttpState>,
    token: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let bytes = state.sharing.shared_audio(&token).await?;
    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, AUDIO_CONTENT_TYPE))
        .insert_header((
            CACHE_CONTROL,
            CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(3600)]),
        ))
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;
    use serde_json::Value;

    use super::*;
    use crate::domain::ports::{AudioStorage, MockSharedSongQuery};
    use crate::domain::{GenerationStatus, Genre, Occasion, OrderType};
    use crate::inbound::http::state::HttpStatePorts;
    use crate::test_support::{Workflow, fixtures};

    fn app_for(
        state: HttpState,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api/v1")
                .service(shared_song)
                .service(shared_audio),
        )
    }

    fn with_sharing(workflow: &Workflow, sharing: MockSharedSongQuery) -> HttpState {
        let ports = HttpStatePorts {
            sharing: std::sync::Arc::new(sharing),
            ..workflow.ports()
        };
        HttpState::new(ports, workflow.http_state().access)
    }

    #[rstest]
    #[actix_web::test]
    async fn metadata_is_public_and_camel_cased() {
        let workflow = Workflow::new();
        let mut sharing = MockSharedSongQuery::new();
        sharing.expect_shared_song().returning(|_| {
            Ok(SharedSong {
                recipient_name: "Sam".into(),
                author_name: "Alex".into(),
                occasion: Occasion::Birthday,
                genre: Genre::Pop,
                duration_ms: Some(90_000),
                audio_url: "memory://songs/a.mp3?token=signed".into(),
            })
        });
        let app = actix_test::init_service(app_for(with_sharing(&workflow, sharing))).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/share/abc")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["recipientName"], "Sam");
        assert_eq!(body["occasion"], "birthday");
        assert_eq!(body["durationMs"], 90_000);
        assert!(body["audioUrl"].as_str().is_some_and(|url| url.contains("token=signed")));
    }

    #[rstest]
    #[actix_web::test]
    async fn audio_is_served_as_mpeg() {
        let workflow = Workflow::new();
        let mut sharing = MockSharedSongQuery::new();
        sharing
            .expect_shared_audio()
            .returning(|_| Ok(b"ID3-bytes".to_vec()));
        let app = actix_test::init_service(app_for(with_sharing(&workflow, sharing))).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/share/abc/audio")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some(AUDIO_CONTENT_TYPE)
        );
        let bytes = actix_test::read_body(res).await;
        assert_eq!(&bytes[..], b"ID3-bytes");
    }

    #[rstest]
    #[case::malformed("not-a-token")]
    #[case::unknown("0123456789abcdef0123456789abcdef")]
    #[actix_web::test]
    async fn unknown_tokens_are_not_found(#[case] token: &str) {
        let workflow = Workflow::new();
        let app = actix_test::init_service(app_for(workflow.http_state())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/share/{token}"))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body["code"], "not_found");
    }

    #[rstest]
    #[actix_web::test]
    async fn selected_song_is_reachable_by_its_token() {
        let workflow = Workflow::new();
        let user = fixtures::user();
        let customization = fixtures::customization(user.id());
        let mut order = fixtures::order(user.id(), OrderType::Base);
        order.customization_id = Some(customization.id);
        workflow.store.insert_customization(customization);
        workflow.store.insert_order(order.clone(), 1);
        let variant = workflow.store.variants_of(order.id).remove(0);
        workflow
            .storage
            .upload(&variant.storage_path, b"song".to_vec())
            .await
            .expect("upload succeeds");
        workflow
            .store
            .set_variant_status(variant.id, GenerationStatus::Complete, None);
        let receipt = workflow
            .ports()
            .selection
            .select_variant(order.id, variant.id, user.id())
            .await
            .expect("selection succeeds");
        let app = actix_test::init_service(app_for(workflow.http_state())).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/api/v1/share/{}/audio", receipt.share_token))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = actix_test::read_body(res).await;
        assert_eq!(&bytes[..], b"song");
    }
}
