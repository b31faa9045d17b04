use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Response, StatusCode};

pub struct ServerError(pub StatusCode);

pub trait DetectServerError {
    fn server_error(self) -> Result<Response, ServerError>;
}

impl DetectServerError for Response {
    fn server_error(self) -> Result<Response, ServerError> {
        if is_html_server_error(self.status(), self.headers().get(CONTENT_TYPE)) {
            return Err(ServerError(self.status()));
        }

        Ok(self)
    }
}

fn is_html_server_error(status: StatusCode, content_type: Option<&HeaderValue>) -> bool {
    status.is_server_error()
        && content_type.is_some_and(|header| {
            header.to_str().is_ok_and(|header| header.starts_with("text/html"))
        })
}
