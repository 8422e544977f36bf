use axum::{
    Router, error_handling::HandleErrorLayer, extract::Request, http::StatusCode,
    response::IntoResponse, routing::get,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tally_limit::WindowLog;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_tally::{ForwardedForKey, ManagedKeyedRateLimitLayer, TallyError};

#[tokio::main]
async fn main() {
    // 1. Setup Strategy: 10 requests per 10s, per client
    let limit = NonZeroUsize::new(10).unwrap();
    let strategy = Arc::new(WindowLog::new(limit, Duration::from_secs(10)));

    // 2. Setup Managed Layer, keyed by the proxy-provided client address
    let managed_layer = ManagedKeyedRateLimitLayer::<_, _, Request>::new(
        strategy,
        ForwardedForKey,
        Duration::from_millis(500),
    );

    // 3. Build the Router
    let app = Router::new()
        .route("/", get(|| async { "Hello, Tally!" }))
        .layer(
            ServiceBuilder::new()
                // 1. The outermost layer: catches BoxError and returns Response
                .layer(HandleErrorLayer::new(handle_tally_error))
                // 2. The middle layer: introduces BoxError
                .layer(managed_layer)
                // 3. The secret sauce: converts the Route's Infallible to BoxError
                // so that ManagedKeyedRateLimitLayer is happy wrapping it.
                .map_err(BoxError::from),
        );

    // 4. Serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .unwrap();
    println!("📡 Listening on http://127.0.0.1:3000");

    // This will now compile because the ServiceBuilder stack is Infallible
    axum::serve(listener, app).await.unwrap();
}

/// The signature must match BoxError -> IntoResponse
async fn handle_tally_error(err: tower::BoxError) -> impl IntoResponse {
    if let Some(tally_err) = err.downcast_ref::<TallyError>() {
        tally_err.clone().into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Service Error").into_response()
    }
}
