use crate::error::Error;
use crate::params::command::CommandParams;
use crate::params::sanitize;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use log::*;
use service::AppState;
use sse::message::ChatMessage;

/// POST a chat line to everyone listening on the default channel.
///
/// The body is an urlencoded form with `user` and `msg`. The reply is always an
/// empty acknowledgement; a missing or incomplete form publishes nothing.
pub(crate) async fn create(
    State(app_state): State<AppState>,
    form: Result<Form<CommandParams>, FormRejection>,
) -> Result<Response, Error> {
    let params = match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            debug!("Ignoring command without a complete form: {rejection}");
            return Ok(acknowledge());
        }
    };

    let message = ChatMessage::new(
        sanitize::escape(&params.user),
        sanitize::escape(&params.msg),
    );
    app_state.sse_manager.publish(&message)?;

    Ok(acknowledge())
}

fn acknowledge() -> Response {
    ([(header::CONTENT_TYPE, "text/plain")], "").into_response()
}
