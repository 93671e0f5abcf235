//! MercadoPago REST integration: checkout preference creation for the
//! booking deposit, and payment lookup for webhook notifications.

use crate::{config::MercadoPagoConfig, error::Result};
use serde::Deserialize;
use serde_json::json;

#[derive(Clone)]
pub struct Client {
  http: reqwest::Client,
  config: MercadoPagoConfig,
}

#[derive(Debug, Deserialize)]
pub struct Pago {
  pub id: u64,
  pub status: String,
  pub transaction_amount: f64,
  pub description: Option<String>,
  pub external_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Preferencia {
  init_point: String,
}

impl Client {
  pub fn new(config: MercadoPagoConfig) -> Client {
    Client {
      http: reqwest::Client::new(),
      config,
    }
  }

  /// creates a checkout preference for the deposit and returns the init
  /// point the browser is redirected to. The peritaje id travels as the
  /// external reference so the webhook can link the payment back.
  pub async fn crear_preferencia(&self, peritaje_id: &str, descripcion: &str) -> Result<String> {
    let body = json!({
      "items": [{
        "id": "peritaje",
        "title": "Peritaje automotriz",
        "description": descripcion,
        "quantity": 1,
        "unit_price": self.config.monto_sena,
        "currency_id": "ARS",
      }],
      "back_urls": {
        "success": self.config.back_url,
        "pending": self.config.back_url,
        "failure": self.config.back_url,
      },
      "auto_return": "approved",
      "external_reference": peritaje_id,
    });

    let preferencia: Preferencia = self
      .http
      .post(format!("{}/checkout/preferences", self.config.api_url))
      .bearer_auth(&self.config.access_token)
      .json(&body)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(preferencia.init_point)
  }

  /// authoritative payment status, fetched by the id the webhook delivered
  pub async fn obtener_pago(&self, id: &str) -> Result<Pago> {
    let pago = self
      .http
      .get(format!("{}/v1/payments/{}", self.config.api_url, id))
      .bearer_auth(&self.config.access_token)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;
    Ok(pago)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn el_payload_del_pago_se_deserializa() {
    let pago: Pago = serde_json::from_str(
      r#"{
        "id": 123456,
        "status": "approved",
        "transaction_amount": 1000.0,
        "description": "Peritaje automotriz",
        "external_reference": "p-1",
        "otros_campos": "ignorados"
      }"#,
    )
    .unwrap();
    assert_eq!(pago.id, 123456);
    assert_eq!(pago.status, "approved");
    assert_eq!(pago.external_reference.as_deref(), Some("p-1"));
  }
}
