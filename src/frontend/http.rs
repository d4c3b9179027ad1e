use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};
use warp::hyper::body::Bytes;
use warp::Filter;

use super::http_utils::{into_response, ApiError};
use crate::auth::token_from_header;
use crate::config::context::{SchemaManagerContext, REQUESTS};
use crate::config::schema::HttpFrontend;
use crate::schema::SchemaRequest;

const AUTHORIZATION: &str = "authorization";
// Sent by the dashboard's function-invocation client on every call
const ALLOWED_HEADERS: [&str; 8] = [
    AUTHORIZATION,
    "x-client-info",
    "apikey",
    "content-type",
    "x-supabase-client-platform",
    "x-supabase-client-platform-version",
    "x-supabase-client-runtime",
    "x-supabase-client-runtime-version",
];
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Error parsing the listen address: {0}")]
    Address(#[from] AddrParseError),

    #[error("Error binding the HTTP server: {0}")]
    Bind(#[from] warp::Error),
}

/// Authenticate, parse and run a single schema request
pub async fn schema_request(
    context: Arc<SchemaManagerContext>,
    authorization: Option<String>,
    body: Bytes,
) -> Result<warp::reply::Json, ApiError> {
    let mut action = "unknown";

    let result = async {
        let token = token_from_header(authorization.as_deref())?;
        let user = context.verifier.verify(token).await?;

        let request = SchemaRequest::from_slice(&body)?;
        action = request.action();
        debug!(user = user.id.as_str(), action, "Handling schema request");

        Ok::<_, ApiError>(context.service.handle(request).await?)
    }
    .await;

    match result {
        Ok(response) => {
            counter!(REQUESTS, "action" => action, "status" => "ok").increment(1);
            Ok(warp::reply::json(&response))
        }
        Err(err) => {
            counter!(REQUESTS, "action" => action, "status" => err.kind()).increment(1);
            warn!(action, kind = err.kind(), "Rejected schema request: {}", err.0);
            Err(err)
        }
    }
}

// POST /schema-manager
// POST /functions/v1/schema-manager
pub fn schema_manager(
    context: Arc<SchemaManagerContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("schema-manager")
        .or(warp::path!("functions" / "v1" / "schema-manager"))
        .unify()
        .and(warp::post())
        .and(warp::header::optional::<String>(AUTHORIZATION))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .then(move |authorization: Option<String>, body: Bytes| {
            schema_request(context.clone(), authorization, body)
        })
        .map(into_response)
}

pub fn filters(
    context: Arc<SchemaManagerContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(ALLOWED_HEADERS)
        .allow_methods(vec!["POST", "OPTIONS"]);

    schema_manager(context).with(cors)
}

pub async fn run_server(
    context: Arc<SchemaManagerContext>,
    config: HttpFrontend,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let socket_addr: SocketAddr =
        format!("{}:{}", config.bind_host, config.bind_port).parse()?;

    let (addr, server) = warp::serve(filters(context))
        .try_bind_with_graceful_shutdown(socket_addr, shutdown)?;

    info!("Listening for schema requests on http://{addr}");
    server.await;
    info!("HTTP server shut down");
    Ok(())
}
