use crate::{
  agenda, email,
  error::{Error, ErrorKind, Result},
  log_error, schema, store, util,
  util::json_path,
  web::{self, auth, Config, Mailer, MercadoPago, DB},
};
use actix_session::Session;
use error_chain::bail;
use lazy_static::lazy_static;
use path_tree::PathTree;
use serde::Deserialize;
use serde_json::{from_value as from_json, json, Value as JsonValue};
use std::str::FromStr;

#[repr(u8)]
enum Opcode {
  Success = 0,
  //InternalError = 100,
  InvalidLogin = 101,
  InvalidRequest = 102,
}

pub async fn main(
  uri: String,
  mut post_data: JsonValue,
  db_pool: DB,
  config: Config,
  mercadopago: MercadoPago,
  mailer: Mailer,
  user: Option<auth::Usuario>,
  session: Session,
) -> Result<String> {
  // check cors hash
  {
    if !util::check_cors_hash(
      json_path::<String>(&mut post_data, "/cors_h")?.as_str(),
      &config,
    ) {
      bail!("unauthorized");
    }
  }

  lazy_static! {
    static ref PATH_TREE: PathTree::<&'static str> = {
      let mut tmp = PathTree::<&str>::new();
      for path in vec![
        "/auth/login",
        "/auth/registro",
        "/auth/logout",
        "/agenda/slots",
        "/peritaje/agendar",
        "/peritaje/edit",
        "/peritaje/estado",
        "/usuario/add",
        "/usuario/edit",
        "/usuario/estado",
        "/usuario/delete",
        "/reportes/stats",
        "/reportes/mensual",
      ] {
        tmp.insert(path, path);
      }
      tmp
    };
  };

  let ctr = Controller {
    db_pool,
    config,
    mercadopago,
    mailer,
    post_data,
  };

  let res = match PATH_TREE.find(uri.as_str()) {
    Some((path, _get_data)) => {
      let path = *path;
      match path {
        "/auth/login" => match user {
          Some(_) => bail!(ErrorKind::InvalidRequest),
          None => ctr.auth_login(session).await?,
        },
        "/auth/registro" => match user {
          Some(_) => bail!(ErrorKind::InvalidRequest),
          None => ctr.auth_registro().await?,
        },
        _ => {
          let user = match user {
            Some(user) => user,
            None => bail!("unauthorized"),
          };

          match path {
            "/auth/logout" => ctr.auth_logout(session).await?,
            "/agenda/slots" => ctr.agenda_slots().await?,
            "/peritaje/agendar" => ctr.peritaje_agendar(&user).await?,
            "/peritaje/edit" => ctr.peritaje_edit(&user).await?,
            "/peritaje/estado" => ctr.peritaje_estado(&user).await?,
            "/usuario/add" => ctr.usuario_add(&user).await?,
            "/usuario/edit" => ctr.usuario_edit(&user).await?,
            "/usuario/estado" => ctr.usuario_estado(&user).await?,
            "/usuario/delete" => ctr.usuario_delete(&user).await?,
            "/reportes/stats" => ctr.reportes_stats(&user).await?,
            "/reportes/mensual" => ctr.reportes_mensual(&user).await?,
            _ => unreachable!(),
          }
        }
      }
    }
    None => bail!("route not found"),
  };
  Ok(res.to_string())
}

/// "" and null mean unset; anything else must parse
fn parse_opt<T: FromStr>(value: Option<String>) -> Result<Option<T>> {
  match value {
    None => Ok(None),
    Some(s) if s.is_empty() => Ok(None),
    Some(s) => Ok(Some(s.parse::<T>().map_err(|_| ErrorKind::InvalidRequest)?)),
  }
}

/// an empty form field means unset, stored as null
fn texto_opt(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.is_empty())
}

/// the results mail goes out once, on the transition into completado
fn notificar_completado(anterior: schema::Estado, nuevo: schema::Estado) -> bool {
  nuevo == schema::Estado::Completado && anterior != schema::Estado::Completado
}

struct Controller {
  db_pool: DB,
  config: Config,
  mercadopago: MercadoPago,
  mailer: Mailer,
  post_data: JsonValue,
}

impl Controller {
  ///auth/login
  async fn auth_login(mut self, session: Session) -> Result<JsonValue> {
    #[derive(Deserialize)]
    struct Request {
      login: String,
      password: String,
    }
    let request: Request = from_json(self.post_data.take())?;
    let result = match auth::login(
      &request.login,
      &request.password,
      self.db_pool,
      &self.config,
      session,
    )
    .await
    {
      Ok(_) => Opcode::Success,
      Err(Error(ErrorKind::InvalidLogin, _)) => Opcode::InvalidLogin,
      Err(e) => bail!(e),
    };
    Ok(json!({ "result": result as u8 }))
  }

  ///auth/registro
  /// public self-registration; the account always starts with the plain
  /// `user` role, staff roles are granted from the admin page
  async fn auth_registro(mut self) -> Result<JsonValue> {
    #[derive(Deserialize)]
    struct Request {
      login: String,
      password: String,
      full_name: String,
      #[serde(default)]
      phone: String,
    }
    let request: Request = from_json(self.post_data.take())?;

    let nuevo = store::NuevoUsuario {
      login: request.login,
      password: auth::password_hash(&request.password, &self.config),
      full_name: request.full_name,
      phone: request.phone,
      rol: schema::Rol::User,
    };
    if nuevo.validar().is_err() || request.password.is_empty() {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    match web::block(self.db_pool, move |db| store::insert_usuario(&db, &nuevo)).await {
      Ok(_) => Ok(json!({ "result": Opcode::Success as u8 })),
      // duplicate login
      Err(Error(ErrorKind::InvalidRequest, _)) => Ok(json!({ "result": Opcode::InvalidRequest as u8 })),
      Err(e) => bail!(e),
    }
  }

  ///auth/logout
  async fn auth_logout(self, session: Session) -> Result<JsonValue> {
    let result = auth::logout(self.db_pool, session).await;
    let result = match result {
      Ok(_) => Opcode::Success,
      Err(Error(ErrorKind::InvalidLogin, _)) => Opcode::InvalidLogin,
      Err(e) => bail!(e),
    };
    Ok(json!({ "result": result as u8 }))
  }

  ///agenda/slots
  async fn agenda_slots(mut self) -> Result<JsonValue> {
    #[derive(Deserialize)]
    struct Request {
      fecha: String,
    }
    let request: Request = from_json(self.post_data.take())?;

    if !agenda::validar_fecha(&request.fecha, chrono::Local::now().date_naive()) {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    let horarios = web::block(self.db_pool, move |db| {
      agenda::horarios_disponibles(&db, &request.fecha)
    })
    .await?;

    Ok(json!({
      "result": Opcode::Success as u8,
      "horarios": horarios
    }))
  }

  ///peritaje/agendar
  async fn peritaje_agendar(mut self, _user: &auth::Usuario) -> Result<JsonValue> {
    #[derive(Deserialize)]
    struct Request {
      fecha: String,
      hora: String,
      nombre_propietario: String,
      telefono_propietario: String,
      email_propietario: String,
      metodo_pago: String,
    }
    let request: Request = from_json(self.post_data.take())?;

    if !agenda::validar_fecha(&request.fecha, chrono::Local::now().date_naive())
      || !agenda::es_horario_valido(&request.hora)
    {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }
    let metodo_pago = match request.metodo_pago.parse::<schema::MetodoPago>() {
      Ok(m) => m,
      Err(_) => return Ok(json!({ "result": Opcode::InvalidRequest as u8 })),
    };

    let nuevo = store::NuevoPeritaje {
      fecha_turno: request.fecha,
      hora_turno: request.hora,
      nombre_propietario: request.nombre_propietario,
      telefono_propietario: request.telefono_propietario,
      email_propietario: request.email_propietario,
      metodo_pago,
    };
    if nuevo.validar().is_err() {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let monto_sena = self.config.mercadopago.monto_sena;

    let insertado = web::block(self.db_pool, {
      let id = id.clone();
      let nuevo = nuevo.clone();
      move |db| -> Result<bool> {
        // unlocked check/write pair: two racing requests can both pass
        if !agenda::horarios_disponibles(&db, &nuevo.fecha_turno)?.contains(&nuevo.hora_turno.as_str()) {
          return Ok(false);
        }
        store::insert_peritaje(&db, &nuevo, &id)?;

        if nuevo.metodo_pago == schema::MetodoPago::Efectivo {
          // the deposit is settled in person, recorded up front
          store::insert_payment(
            &db,
            &schema::Payment {
              id: format!("efectivo-{}", id),
              amount: monto_sena,
              descripcion: "Seña peritaje (efectivo)".into(),
              canal: schema::MetodoPago::Efectivo,
              peritaje_id: Some(id.clone()),
              created_at: util::get_timestamp() as i64,
            },
          )?;
        }
        Ok(true)
      }
    })
    .await?;

    if !insertado {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    match nuevo.metodo_pago {
      schema::MetodoPago::Efectivo => {
        // best effort, the booking stands even if the mail bounces
        self
          .mailer
          .send(
            &nuevo.email_propietario,
            "Turno confirmado",
            email::turno_confirmado(&nuevo.nombre_propietario, &nuevo.fecha_turno, &nuevo.hora_turno),
          )
          .await
          .map_err(|e| log_error!(e, "peritaje_agendar: turno_confirmado"))
          .ok();

        Ok(json!({
          "result": Opcode::Success as u8,
          "id": id
        }))
      }
      schema::MetodoPago::MercadoPago => {
        // the record exists before the redirect; if the preference fails
        // the booking stays flagged pago_pendiente
        let init_point = self
          .mercadopago
          .crear_preferencia(&id, &format!("Seña peritaje {} {}", nuevo.fecha_turno, nuevo.hora_turno))
          .await?;

        Ok(json!({
          "result": Opcode::Success as u8,
          "id": id,
          "init_point": init_point
        }))
      }
    }
  }

  ///peritaje/edit
  async fn peritaje_edit(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin, schema::Rol::Perito])?;

    #[derive(Deserialize)]
    struct Request {
      id: String,
      nombre_propietario: String,
      telefono_propietario: String,
      email_propietario: String,
      marca: Option<String>,
      modelo: Option<String>,
      anio: Option<String>,
      patente: Option<String>,
      kilometraje: Option<String>,
      color: Option<String>,
      tipo_combustible: Option<String>,
      estado_general: Option<String>,
      carroceria: Option<String>,
      pintura: Option<String>,
      motor: Option<String>,
      transmision: Option<String>,
      frenos: Option<String>,
      suspension: Option<String>,
      sistema_electrico: Option<String>,
      interior: Option<String>,
      neumaticos: Option<String>,
      #[serde(default)]
      observaciones: String,
      #[serde(default)]
      conclusion: String,
      estado: String,
      #[serde(default)]
      senado: bool,
    }
    let request: Request = from_json(self.post_data.take())?;

    let update = store::PeritajeUpdate {
      nombre_propietario: request.nombre_propietario,
      telefono_propietario: request.telefono_propietario,
      email_propietario: request.email_propietario,
      marca: texto_opt(request.marca),
      modelo: texto_opt(request.modelo),
      anio: texto_opt(request.anio),
      patente: texto_opt(request.patente),
      kilometraje: texto_opt(request.kilometraje),
      color: texto_opt(request.color),
      tipo_combustible: parse_opt(request.tipo_combustible)?,
      estado_general: parse_opt(request.estado_general)?,
      carroceria: parse_opt(request.carroceria)?,
      pintura: parse_opt(request.pintura)?,
      motor: parse_opt(request.motor)?,
      transmision: parse_opt(request.transmision)?,
      frenos: parse_opt(request.frenos)?,
      suspension: parse_opt(request.suspension)?,
      sistema_electrico: parse_opt(request.sistema_electrico)?,
      interior: parse_opt(request.interior)?,
      neumaticos: parse_opt(request.neumaticos)?,
      observaciones: request.observaciones,
      conclusion: request.conclusion,
      estado: request.estado.parse().map_err(|_| ErrorKind::InvalidRequest)?,
      senado: request.senado,
    };
    if update.validar().is_err() {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    let id = request.id;
    let estado_nuevo = update.estado;
    let anterior = web::block(self.db_pool.clone(), {
      let id = id.clone();
      move |db| store::actualizar_peritaje(&db, &id, &update)
    })
    .await?;
    let anterior = match anterior {
      Some(anterior) => anterior,
      None => return Ok(json!({ "result": Opcode::InvalidRequest as u8 })),
    };

    if notificar_completado(anterior, estado_nuevo) {
      self.enviar_completado(&id).await;
    }

    Ok(json!({ "result": Opcode::Success as u8 }))
  }

  ///peritaje/estado
  async fn peritaje_estado(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin, schema::Rol::Perito])?;

    #[derive(Deserialize)]
    struct Request {
      id: String,
      estado: String,
    }
    let request: Request = from_json(self.post_data.take())?;
    let estado = match request.estado.parse::<schema::Estado>() {
      Ok(estado) => estado,
      Err(_) => return Ok(json!({ "result": Opcode::InvalidRequest as u8 })),
    };

    let id = request.id;
    let anterior = web::block(self.db_pool.clone(), {
      let id = id.clone();
      move |db| store::actualizar_estado(&db, &id, estado)
    })
    .await?;
    let anterior = match anterior {
      Some(anterior) => anterior,
      None => return Ok(json!({ "result": Opcode::InvalidRequest as u8 })),
    };

    if notificar_completado(anterior, estado) {
      self.enviar_completado(&id).await;
    }

    Ok(json!({ "result": Opcode::Success as u8 }))
  }

  /// results mail for a freshly completed record; failures are logged,
  /// the state change has already been committed
  async fn enviar_completado(&self, id: &str) {
    let peritaje = web::block(self.db_pool.clone(), {
      let id = id.to_string();
      move |db| store::peritaje_por_id(&db, &id)?.ok_or_else(|| ErrorKind::InvalidRequest.into())
    })
    .await;

    match peritaje {
      Ok(peritaje) => {
        self
          .mailer
          .send(
            &peritaje.email_propietario,
            "Resultados de su peritaje",
            email::peritaje_completado(&peritaje),
          )
          .await
          .map_err(|e| log_error!(e, "enviar_completado"))
          .ok();
      }
      Err(e) => log_error!(e, "enviar_completado: lookup"),
    }
  }

  ///usuario/add
  async fn usuario_add(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      login: String,
      password: String,
      full_name: String,
      #[serde(default)]
      phone: String,
      rol: String,
    }
    let request: Request = from_json(self.post_data.take())?;

    let nuevo = store::NuevoUsuario {
      login: request.login,
      password: auth::password_hash(&request.password, &self.config),
      full_name: request.full_name,
      phone: request.phone,
      rol: request.rol.parse().map_err(|_| ErrorKind::InvalidRequest)?,
    };
    if nuevo.validar().is_err() || request.password.is_empty() {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    let uid = match web::block(self.db_pool, move |db| store::insert_usuario(&db, &nuevo)).await {
      Ok(uid) => uid,
      // duplicate login
      Err(Error(ErrorKind::InvalidRequest, _)) => {
        return Ok(json!({ "result": Opcode::InvalidRequest as u8 }))
      }
      Err(e) => bail!(e),
    };

    Ok(json!({
      "result": Opcode::Success as u8,
      "uid": uid
    }))
  }

  ///usuario/edit
  async fn usuario_edit(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      uid: u32,
      full_name: String,
      #[serde(default)]
      phone: String,
      rol: String,
      activo: bool,
    }
    let request: Request = from_json(self.post_data.take())?;

    // an admin cannot lock themselves out
    if request.uid == user.user.id && (!request.activo || request.rol != "admin") {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    let update = store::UsuarioUpdate {
      uid: request.uid,
      full_name: request.full_name,
      phone: request.phone,
      rol: request.rol.parse().map_err(|_| ErrorKind::InvalidRequest)?,
      activo: request.activo,
    };
    web::block(self.db_pool, move |db| store::actualizar_usuario(&db, &update)).await?;

    Ok(json!({ "result": Opcode::Success as u8 }))
  }

  ///usuario/estado
  async fn usuario_estado(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      uid: u32,
      activo: bool,
    }
    let request: Request = from_json(self.post_data.take())?;

    if request.uid == user.user.id && !request.activo {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    web::block(self.db_pool, move |db| {
      store::actualizar_activo(&db, request.uid, request.activo)
    })
    .await?;

    Ok(json!({ "result": Opcode::Success as u8 }))
  }

  ///usuario/delete
  async fn usuario_delete(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      uid: u32,
    }
    let request: Request = from_json(self.post_data.take())?;

    if request.uid == user.user.id {
      return Ok(json!({ "result": Opcode::InvalidRequest as u8 }));
    }

    web::block(self.db_pool, move |db| store::eliminar_usuario(&db, request.uid)).await?;

    Ok(json!({ "result": Opcode::Success as u8 }))
  }

  ///reportes/stats
  async fn reportes_stats(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      desde: String,
      hasta: String,
    }
    let request: Request = from_json(self.post_data.take())?;

    let stats = web::block(self.db_pool, move |db| {
      store::stats_rango(&db, &request.desde, &request.hasta)
    })
    .await?;

    Ok(json!({
      "result": Opcode::Success as u8,
      "stats": {
        "pendientes": stats.pendientes,
        "en_proceso": stats.en_proceso,
        "completados": stats.completados,
        "cancelados": stats.cancelados,
        "total": stats.total,
      }
    }))
  }

  ///reportes/mensual
  async fn reportes_mensual(mut self, user: &auth::Usuario) -> Result<JsonValue> {
    auth::require_rol(user, &[schema::Rol::Admin])?;

    #[derive(Deserialize)]
    struct Request {
      anio: i32,
    }
    let request: Request = from_json(self.post_data.take())?;

    let meses = web::block(self.db_pool, move |db| store::stats_mensuales(&db, request.anio)).await?;

    let meses: Vec<JsonValue> = meses
      .into_iter()
      .enumerate()
      .map(|(mes, stats)| {
        json!({
          "mes": mes + 1,
          "pendientes": stats.pendientes,
          "en_proceso": stats.en_proceso,
          "completados": stats.completados,
          "cancelados": stats.cancelados,
          "total": stats.total,
        })
      })
      .collect();

    Ok(json!({
      "result": Opcode::Success as u8,
      "meses": meses
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use schema::Estado;

  #[test]
  fn el_mail_de_resultados_sale_solo_al_entrar_en_completado() {
    assert!(notificar_completado(Estado::Pendiente, Estado::Completado));
    assert!(notificar_completado(Estado::EnProceso, Estado::Completado));
    // re-saving an already completed record stays silent
    assert!(!notificar_completado(Estado::Completado, Estado::Completado));
    assert!(!notificar_completado(Estado::Pendiente, Estado::EnProceso));
    assert!(!notificar_completado(Estado::Completado, Estado::Cancelado));
  }

  #[test]
  fn campos_de_texto_vacios_quedan_sin_valor() {
    assert_eq!(texto_opt(None), None);
    assert_eq!(texto_opt(Some("".into())), None);
    assert_eq!(texto_opt(Some("Toyota".into())), Some("Toyota".to_string()));
  }
}
