//! Request correlation.
//!
//! Every request runs inside a [`TraceId`] scope. A well-formed `trace-id`
//! header on the way in is adopted, so a generation step triggered by an
//! earlier step logs under the same identifier as the webhook that started
//! the chain. Anything else gets a fresh identifier. The identifier is echoed
//! back on the response and copied into error bodies.

use std::task::{Context, Poll};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, info_span, warn};

use crate::domain::{TRACE_ID_HEADER, TraceId};

/// Middleware scoping each request to a [`TraceId`].
///
/// # Examples
/// ```
/// use actix_web::App;
/// use songsmith::Trace;
///
/// let app = App::new().wrap(Trace);
/// ```
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

pub struct TraceMiddleware<S> {
    service: S,
}

/// The caller's trace identifier, if it sent a parseable one.
fn inherited(req: &ServiceRequest) -> Option<TraceId> {
    req.headers()
        .get(TRACE_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let inherited = inherited(&req);
        let trace_id = inherited.unwrap_or_else(TraceId::generate);
        let span = info_span!(
            "request",
            trace_id = %trace_id,
            inherited = inherited.is_some(),
            method = %req.method(),
            path = %req.path(),
        );
        let fut = self.service.call(req);
        Box::pin(
            TraceId::scope(trace_id, async move {
                let mut res = fut.await?;
                match HeaderValue::from_str(&trace_id.to_string()) {
                    Ok(value) => {
                        res.response_mut()
                            .headers_mut()
                            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
                    }
                    Err(error) => warn!(%error, "trace id not representable as a header"),
                }
                Ok(res)
            })
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    use crate::domain::{ApiResult, Error as ApiError};

    async fn echo_trace_id() -> HttpResponse {
        match TraceId::current() {
            Some(id) => HttpResponse::Ok().body(id.to_string()),
            None => HttpResponse::InternalServerError().finish(),
        }
    }

    async fn missing_order() -> ApiResult<HttpResponse> {
        Err(ApiError::not_found("order not found"))
    }

    fn header(res: &ServiceResponse) -> String {
        res.headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("ascii header")
            .to_owned()
    }

    #[actix_web::test]
    async fn handlers_see_the_id_that_is_returned() {
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/", web::get().to(echo_trace_id)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let returned = header(&res);
        let body = test::read_body(res).await;

        assert!(returned.parse::<TraceId>().is_ok());
        assert_eq!(body, returned.as_bytes());
    }

    #[actix_web::test]
    async fn a_chained_request_keeps_its_callers_id() {
        let caller = "4f1c2a9e-8d3b-4c6a-9e2f-0b7d5a1c3e8f";
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/", web::post().to(echo_trace_id)),
        )
        .await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/")
                .insert_header((TRACE_ID_HEADER, caller))
                .to_request(),
        )
        .await;

        assert_eq!(header(&res), caller);
    }

    #[rstest]
    #[case::not_a_uuid("order-42")]
    #[case::empty("")]
    #[actix_web::test]
    async fn junk_ids_are_replaced(#[case] sent: &str) {
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/", web::get().to(echo_trace_id)),
        )
        .await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/")
                .insert_header((TRACE_ID_HEADER, sent))
                .to_request(),
        )
        .await;

        let returned = header(&res);
        assert_ne!(returned, sent);
        assert!(returned.parse::<TraceId>().is_ok());
    }

    #[actix_web::test]
    async fn error_bodies_quote_the_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/", web::get().to(missing_order)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let returned = header(&res);
        let body: ApiError = test::read_body_json(res).await;

        assert_eq!(body.trace_id(), Some(returned.as_str()));
    }
}
