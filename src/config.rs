use crate::error::Result;
use error_chain::bail;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  pub web: WebConfig,
  pub mercadopago: MercadoPagoConfig,
  pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub bind_addr: String,
  pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
  pub root_url: String,
  pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MercadoPagoConfig {
  pub api_url: String,
  pub access_token: String,
  /// deposit charged when booking through the gateway, in ARS
  pub monto_sena: f64,
  pub back_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
  pub api_url: String,
  pub api_key: String,
  pub from: String,
}

pub fn load() -> Result<Config> {
  let path = "data/config.toml";
  let config: Config = toml::from_str(&std::fs::read_to_string(path)?)?;
  if config.web.secret_key.len() < 32 {
    bail!("web.secret_key must be at least 32 characters");
  }
  Ok(config)
}
