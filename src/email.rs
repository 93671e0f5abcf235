//! Outbound email: a thin client for the Resend-style REST API plus the
//! three maud-rendered bodies (booking confirmed, inspection completed,
//! reminder).

use crate::{
  config::EmailConfig,
  error::Result,
  informe,
  schema::Peritaje,
  util,
};
use maud::{html, Markup, DOCTYPE};
use serde_json::json;

#[derive(Clone)]
pub struct Mailer {
  http: reqwest::Client,
  config: EmailConfig,
}

impl Mailer {
  pub fn new(config: EmailConfig) -> Mailer {
    Mailer {
      http: reqwest::Client::new(),
      config,
    }
  }

  pub async fn send(&self, to: &str, subject: &str, html: Markup) -> Result<()> {
    self
      .http
      .post(format!("{}/emails", self.config.api_url))
      .bearer_auth(&self.config.api_key)
      .json(&json!({
        "from": self.config.from,
        "to": [to],
        "subject": subject,
        "html": html.into_string(),
      }))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

fn plantilla(titulo: &str, cuerpo: Markup) -> Markup {
  html! {
    (DOCTYPE)
    html lang="es" {
      body style="font-family: Helvetica, Arial, sans-serif; background: #f4f4f5; margin: 0; padding: 24px;" {
        div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px;" {
          h1 style="font-size: 20px; color: #18181b; margin-top: 0;" { (titulo) }
          (cuerpo)
          hr style="border: none; border-top: 1px solid #e4e4e7; margin: 24px 0;";
          p style="font-size: 12px; color: #71717a;" {
            "PeriMec - Peritajes automotrices. Este mensaje fue generado automáticamente, no responda a este correo."
          }
        }
      }
    }
  }
}

fn fila(etiqueta: &str, valor: &str) -> Markup {
  html! {
    tr {
      td style="padding: 4px 12px 4px 0; color: #71717a; font-size: 13px;" { (etiqueta) }
      td style="padding: 4px 0; color: #18181b; font-size: 13px;" { (valor) }
    }
  }
}

/// booking confirmation, sent synchronously when the reservation is taken
pub fn turno_confirmado(nombre: &str, fecha: &str, hora: &str) -> Markup {
  plantilla(
    "Turno confirmado",
    html! {
      p { "Hola " (nombre) "," }
      p {
        "Su turno de peritaje fue confirmado para el "
        b { (util::formatear_fecha(fecha)) }
        " a las "
        b { (hora) " hs" }
        "."
      }
      p { "Por favor presentese con el vehículo y la documentación 10 minutos antes del horario reservado." }
    },
  )
}

/// full result summary, sent once when the record transitions into
/// `completado`: vehicle data, the ten ratings with severity colors, and
/// the conclusion
pub fn peritaje_completado(peritaje: &Peritaje) -> Markup {
  let vehiculo = &peritaje.vehiculo;
  plantilla(
    "Peritaje completado",
    html! {
      p {
        "El peritaje de su vehículo ha sido completado. A continuación, encontrará los detalles y resultados."
      }

      h2 style="font-size: 15px; color: #18181b;" { "Información del vehículo" }
      table {
        (fila("Marca:", vehiculo.marca.as_deref().unwrap_or("-")))
        (fila("Modelo:", vehiculo.modelo.as_deref().unwrap_or("-")))
        (fila("Año:", vehiculo.anio.as_deref().unwrap_or("-")))
        (fila("Patente:", vehiculo.patente.as_deref().unwrap_or("-")))
        (fila("Color:", vehiculo.color.as_deref().unwrap_or("-")))
        (fila("Kilometraje:", &format!("{} km", vehiculo.kilometraje.as_deref().unwrap_or("-"))))
        (fila("Combustible:", &vehiculo.tipo_combustible.map(|c| c.to_string()).unwrap_or_else(|| "-".into())))
        (fila("Fecha del peritaje:", &util::formatear_fecha(&peritaje.fecha_turno)))
      }

      h2 style="font-size: 15px; color: #18181b;" { "Resultados del peritaje" }
      table {
        @for (etiqueta, condicion) in peritaje.evaluacion.componentes() {
          tr {
            td style="padding: 4px 12px 4px 0; color: #71717a; font-size: 13px;" { (etiqueta) ":" }
            @match condicion {
              Some(condicion) => {
                td style={ "padding: 4px 0; font-size: 13px; font-weight: bold; color: " (condicion.color()) ";" } {
                  (condicion)
                }
              }
              None => {
                td style="padding: 4px 0; font-size: 13px; color: #6b7280;" { "No evaluado" }
              }
            }
          }
        }
      }

      h2 style="font-size: 15px; color: #18181b;" { "Conclusión" }
      p style="font-size: 13px; color: #18181b;" { (informe::conclusion_final(peritaje)) }
    },
  )
}

/// appointment reminder triggered by staff from the pending list
pub fn recordatorio(nombre: &str, fecha: &str, direccion: &str) -> Markup {
  plantilla(
    "Recordatorio: peritaje programado",
    html! {
      p { "Hola " (nombre) "," }
      p {
        "Le recordamos que tiene un peritaje programado para el "
        b { (util::formatear_fecha(fecha)) }
        "."
      }
      @if !direccion.is_empty() {
        p { "Lo esperamos en " (direccion) "." }
      }
      p { "Si no puede asistir, por favor comuníquese con nosotros para reprogramar el turno." }
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::{Condicion, Estado, Evaluacion, MetodoPago, Vehiculo};

  #[test]
  fn la_confirmacion_incluye_fecha_y_hora() {
    let html = turno_confirmado("Juan", "2024-01-01", "10:00").into_string();
    assert!(html.contains("Juan"));
    assert!(html.contains("1 de enero de 2024"));
    assert!(html.contains("10:00"));
  }

  #[test]
  fn el_completado_colorea_las_condiciones() {
    let mut evaluacion = Evaluacion::default();
    evaluacion.motor = Some(Condicion::Critico);
    let peritaje = Peritaje {
      id: "p-1".into(),
      fecha_turno: "2024-01-01".into(),
      hora_turno: "10:00".into(),
      estado: Estado::Completado,
      nombre_propietario: "Juan".into(),
      telefono_propietario: "11".into(),
      email_propietario: "juan@ejemplo.com".into(),
      vehiculo: Vehiculo {
        marca: Some("Toyota".into()),
        ..Vehiculo::default()
      },
      evaluacion,
      metodo_pago: MetodoPago::Efectivo,
      payment_ref: None,
      senado: false,
      pago_pendiente: false,
      created_at: 0,
      updated_at: 0,
    };
    let html = peritaje_completado(&peritaje).into_string();
    assert!(html.contains("Toyota"));
    assert!(html.contains("#7f1d1d")); // critical severity color
    assert!(html.contains("No evaluado"));
    assert!(html.contains("Conclusión"));
  }

  #[test]
  fn el_recordatorio_omite_la_direccion_vacia() {
    let html = recordatorio("Ana", "2024-02-02", "").into_string();
    assert!(!html.contains("Lo esperamos en"));
    let html = recordatorio("Ana", "2024-02-02", "Av. Siempre Viva 742").into_string();
    assert!(html.contains("Av. Siempre Viva 742"));
  }
}
