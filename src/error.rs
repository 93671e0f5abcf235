use error_chain::error_chain;

error_chain! {
  foreign_links {
    R2D2Error(r2d2::Error);
    RusqliteError(rusqlite::Error);
    ParseIntError(std::num::ParseIntError);
    ParseFloatError(std::num::ParseFloatError);
    SerdeJsonError(serde_json::error::Error);
    IoError(std::io::Error);
    TomlError(toml::de::Error);
    FromUtf8Error(std::string::FromUtf8Error);
    ChronoParseError(chrono::format::ParseError);
    ReqwestError(reqwest::Error);
    BlockingError(actix_web::error::BlockingError);
  }

  errors {
    InvalidLogin
    InvalidRequest
    Unauthorized
    RouteNotFound
  }
}

#[macro_export]
macro_rules! log_error {
  ($e:expr, $msg:expr) => {{
    log::error!("{}\n└> {:?}", $msg, $e);
  }};
}

pub fn display(error: &Error) -> String {
  match error.kind() {
    ErrorKind::RouteNotFound => "".to_string(),
    _ => {
      let mut msg = "Error:\n".to_string();
      error
        .iter()
        .enumerate()
        .for_each(|(index, error)| msg.push_str(&format!("└> {} - {}", index, error)));
      log::error!("{}", msg);
      msg
    }
  }
}

impl actix_web::ResponseError for Error {
  fn status_code(&self) -> actix_web::http::StatusCode {
    use actix_web::http::StatusCode;
    match self.kind() {
      ErrorKind::RouteNotFound => StatusCode::NOT_FOUND,
      ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
      ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> actix_web::HttpResponse {
    match self.kind() {
      ErrorKind::RouteNotFound => actix_web::HttpResponse::NotFound().body(display(self)),
      ErrorKind::Unauthorized => actix_web::HttpResponse::Unauthorized().finish(),
      ErrorKind::InvalidRequest => actix_web::HttpResponse::BadRequest().body({
        #[cfg(debug_assertions)]
        {
          display(self)
        }
        #[cfg(not(debug_assertions))]
        {
          "".to_string()
        }
      }),
      _ => actix_web::HttpResponse::InternalServerError().body(display(self)),
    }
  }
}
