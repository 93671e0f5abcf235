use crate::{
  config::Config,
  error::{ErrorKind, Result},
};
use actix_web::HttpResponse;
use chrono::{Locale, NaiveDate};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::time::SystemTime;

pub fn get_timestamp() -> u64 {
  SystemTime::now()
    .duration_since(SystemTime::UNIX_EPOCH)
    .unwrap()
    .as_secs()
}

pub fn gen_cors_hash(timestamp: u64, config: &Config) -> String {
  format!(
    "{:x},{}",
    Sha256::digest(format!("{}{}", config.web.secret_key, timestamp).as_bytes()),
    timestamp
  )
}

pub fn check_cors_hash(hash: &str, config: &Config) -> bool {
  let tokens: Vec<&str> = hash.split(',').collect();
  if tokens.len() != 2 {
    return false;
  }
  let timestamp = match tokens[1].parse::<u64>() {
    Ok(t) => t,
    Err(_) => return false,
  };
  gen_cors_hash(timestamp, config) == hash && timestamp <= get_timestamp()
}

/// 64-byte cookie signing key derived from the configured secret
pub fn cookie_key(config: &Config) -> actix_web::cookie::Key {
  let mut bytes = [0u8; 64];
  bytes[..32].copy_from_slice(&Sha256::digest(config.web.secret_key.as_bytes()));
  bytes[32..].copy_from_slice(&Sha256::digest(
    format!("{}cookie", config.web.secret_key).as_bytes(),
  ));
  actix_web::cookie::Key::from(&bytes)
}

/// extracts a value from untyped json by pointer, e.g. "/data/id"
pub fn json_path<T: serde::de::DeserializeOwned>(json: &mut JsonValue, path: &str) -> Result<T> {
  Ok(serde_json::from_value(
    json
      .pointer_mut(path)
      .ok_or(ErrorKind::InvalidRequest)?
      .take(),
  )?)
}

pub fn strip_slashes(uri: String) -> String {
  format!("/{}", uri.trim_matches('/'))
}

pub fn redirect(path: &str, config: &Config) -> HttpResponse {
  HttpResponse::Found()
    .append_header(("location", format!("{}{}", config.web.root_url, path)))
    .finish()
}

/// "2024-01-01" -> "1 de enero de 2024"; unparsable input is passed through
pub fn formatear_fecha(fecha: &str) -> String {
  match NaiveDate::parse_from_str(fecha, "%Y-%m-%d") {
    Ok(f) => f
      .format_localized("%e de %B de %Y", Locale::es_ES)
      .to_string()
      .trim()
      .to_string(),
    Err(_) => fecha.to_string(),
  }
}

pub fn format_timestamp(timestamp: u64, format: &str) -> String {
  chrono::DateTime::from_timestamp(timestamp as i64, 0)
    .map(|dt| dt.format(format).to_string())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formatea_fechas_en_castellano() {
    assert_eq!(formatear_fecha("2024-01-01"), "1 de enero de 2024");
    assert_eq!(formatear_fecha("no-es-fecha"), "no-es-fecha");
  }

  #[test]
  fn strip_slashes_normaliza() {
    assert_eq!(strip_slashes("login/".into()), "/login");
    assert_eq!(strip_slashes("/agenda".into()), "/agenda");
  }
}
