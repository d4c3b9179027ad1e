// Warp error handling and propagation
//
//   1) A handler function, instead of returning a Warp reply/rejection, returns a
//   `Result<Reply, ApiError>`.
//
//   Rejections are meant to say "this filter can't handle this request, but maybe
//   some other can". An error from our handler is final, and we want to be able to
//   bail out of it with the ? operator.
//
//   2) ApiError knows how to convert itself to a JSON body + status code, so it
//   implements Reply.
//
//   3) We can't implement Reply for Result<Reply, Reply> (we don't control Result),
//   hence the final `into_response`:
//
//   ```
//   .then(my_handler_func)
//   .map(into_response)
//   ```
//

use serde_json::json;
use warp::hyper::{Body, Response, StatusCode};
use warp::Reply;

use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::schema::RequestError;
use crate::service::SchemaError;

#[derive(Debug)]
pub struct ApiError(pub SchemaError);

// Wrap errors from each layer so that handlers can use the ? operator
macro_rules! api_error_from {
    ($($source:ty),+) => {
        $(
            impl From<$source> for ApiError {
                fn from(err: $source) -> Self {
                    ApiError(err.into())
                }
            }
        )+
    };
}

api_error_from!(SchemaError, AuthError, RequestError, CatalogError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            SchemaError::Auth(_) => StatusCode::UNAUTHORIZED,
            // Everything else, including failures reported by the database, is
            // reported as the client's problem
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self.0 {
            SchemaError::Auth(AuthError::MissingHeader) => "missing_credential",
            SchemaError::Auth(AuthError::Unauthorized) => "unauthorized",
            SchemaError::Request(RequestError::UnknownAction(_)) => "unknown_action",
            SchemaError::Request(_) => "malformed_request",
            SchemaError::Validation(_)
            | SchemaError::ProtectedTable { .. }
            | SchemaError::ProtectedColumn { .. }
            | SchemaError::InvalidDefault(_) => "validation",
            SchemaError::ColumnHasData { .. } => "precondition",
            SchemaError::Catalog(_) => "catalog",
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        warp::reply::with_status(warp::reply::json(&json!({ "error": self.0.to_string() })), status)
            .into_response()
    }
}

pub fn into_response<S: Reply, E: Reply>(reply_res: Result<S, E>) -> Response<Body> {
    match reply_res {
        Ok(resp) => resp.into_response(),
        Err(err) => err.into_response(),
    }
}
