//! Unauthenticated endpoints: the three email actions and the payment
//! webhook. The webhook answers 200 no matter what happened internally,
//! otherwise the sender keeps retrying the same notification.

use crate::{
  email, error,
  error::{ErrorKind, Result},
  log_error, schema, store, util,
  util::json_path,
  web::{self, Mailer, MercadoPago, DB},
};
use actix_web::HttpResponse;
use error_chain::bail;
use lazy_static::lazy_static;
use path_tree::PathTree;
use serde_json::{json, Value as JsonValue};

pub async fn main(
  uri: String,
  mut post_data: JsonValue,
  db_pool: DB,
  mercadopago: MercadoPago,
  mailer: Mailer,
) -> std::result::Result<HttpResponse, error::Error> {
  lazy_static! {
    static ref PATH_TREE: PathTree<&'static str> = {
      let mut tmp = PathTree::<&str>::new();
      for path in vec![
        "/completado",
        "/confirmado",
        "/email",
        "/recordatorio",
        "/mercadopago",
      ] {
        tmp.insert(path, path);
      }
      tmp
    };
  };

  let res = match PATH_TREE.find(uri.as_str()) {
    Some((path, _)) => match *path {
      "/completado" => completado(&mut post_data, db_pool, mailer).await?,
      // two names for the same action, kept for older booking pages
      "/confirmado" | "/email" => confirmado(&mut post_data, mailer).await?,
      "/recordatorio" => recordatorio(&mut post_data, mailer).await?,
      "/mercadopago" => {
        // always 200: processing failures are logged, never surfaced
        if let Err(e) = webhook(&mut post_data, db_pool, mercadopago).await {
          log_error!(e, "mercadopago webhook");
        }
        HttpResponse::Ok().json(json!({ "received": true }))
      }
      _ => unreachable!(),
    },
    None => bail!(ErrorKind::RouteNotFound),
  };
  Ok(res)
}

/// POST /api/completado { email, peritaje }
async fn completado(post_data: &mut JsonValue, db_pool: DB, mailer: Mailer) -> Result<HttpResponse> {
  let email = match json_path::<String>(post_data, "/email") {
    Ok(email) => email,
    Err(_) => {
      return Ok(HttpResponse::BadRequest().json(json!({ "error": "Email y peritaje son requeridos" })))
    }
  };
  // the record travels either as the full object or as its id
  let id = json_path::<String>(post_data, "/peritaje/id")
    .or_else(|_| json_path::<String>(post_data, "/peritaje"));
  let id = match id {
    Ok(id) => id,
    Err(_) => {
      return Ok(HttpResponse::BadRequest().json(json!({ "error": "Email y peritaje son requeridos" })))
    }
  };

  let peritaje = web::block(db_pool, move |db| {
    store::peritaje_por_id(&db, &id)?.ok_or_else(|| ErrorKind::InvalidRequest.into())
  })
  .await?;

  mailer
    .send(&email, "Resultados de su peritaje", email::peritaje_completado(&peritaje))
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// POST /api/confirmado { email, userFirstname, fecha, hora }
async fn confirmado(post_data: &mut JsonValue, mailer: Mailer) -> Result<HttpResponse> {
  let email = json_path::<String>(post_data, "/email")?;
  let nombre = json_path::<String>(post_data, "/userFirstname").unwrap_or_default();
  let fecha = json_path::<String>(post_data, "/fecha").unwrap_or_default();
  let hora = json_path::<String>(post_data, "/hora").unwrap_or_default();

  match mailer
    .send(&email, "Turno confirmado", email::turno_confirmado(&nombre, &fecha, &hora))
    .await
  {
    Ok(_) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
    Err(e) => {
      log_error!(e, "confirmado");
      Ok(HttpResponse::InternalServerError().json(json!({ "error": "No se pudo enviar el correo" })))
    }
  }
}

/// POST /api/recordatorio { clienteEmail, clienteNombre, fechaPeritaje, direccion }
async fn recordatorio(post_data: &mut JsonValue, mailer: Mailer) -> Result<HttpResponse> {
  let email = json_path::<String>(post_data, "/clienteEmail")?;
  let nombre = json_path::<String>(post_data, "/clienteNombre").unwrap_or_default();
  let fecha = json_path::<String>(post_data, "/fechaPeritaje").unwrap_or_default();
  let direccion = json_path::<String>(post_data, "/direccion").unwrap_or_default();

  mailer
    .send(
      &email,
      "Recordatorio: peritaje programado",
      email::recordatorio(&nombre, &fecha, &direccion),
    )
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// POST /api/mercadopago { data: { id } }
///
/// Fetches the authoritative payment, records an approved one in the
/// ledger and links it back to the booking through the external
/// reference. The insert is append-only, a redelivered notification
/// produces a second ledger row.
async fn webhook(post_data: &mut JsonValue, db_pool: DB, mercadopago: MercadoPago) -> Result<()> {
  let id = match json_path::<JsonValue>(post_data, "/data/id") {
    Ok(JsonValue::String(id)) => id,
    Ok(JsonValue::Number(id)) => id.to_string(),
    _ => bail!(ErrorKind::InvalidRequest),
  };

  let pago = mercadopago.obtener_pago(&id).await?;
  if pago.status != "approved" {
    log::info!("pago {} ignorado, status = {}", pago.id, pago.status);
    return Ok(());
  }

  web::block(db_pool, move |db| {
    store::insert_payment(
      &db,
      &schema::Payment {
        id: pago.id.to_string(),
        amount: pago.transaction_amount,
        descripcion: pago.description.clone().unwrap_or_else(|| "Peritaje automotriz".into()),
        canal: schema::MetodoPago::MercadoPago,
        peritaje_id: pago.external_reference.clone(),
        created_at: util::get_timestamp() as i64,
      },
    )?;

    // best effort: the booking may have been taken outside the web flow
    if let Some(peritaje_id) = &pago.external_reference {
      if !store::marcar_sena_pagada(&db, peritaje_id, &pago.id.to_string())? {
        log::warn!("pago {} sin peritaje asociado: {}", pago.id, peritaje_id);
      }
    }
    Ok(())
  })
  .await?;
  Ok(())
}
