//! Persistence gateway: every read and write against the SQLite store goes
//! through here, as plain functions over a pooled connection. Write
//! operations take a validated request DTO constructed once by the caller.

use crate::{
  error::{ErrorKind, Result},
  log_error,
  schema::{Combustible, Condicion, Estado, MetodoPago, Payment, Peritaje, Profile, Rol, User},
  util,
};
use error_chain::bail;
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

pub fn init_schema(db: &Connection) -> Result<()> {
  db.execute_batch(
    "create table if not exists `users` (
       `id` integer primary key autoincrement,
       `login` text not null unique,
       `password` text not null
     );
     create table if not exists `sessions` (
       `id` text primary key,
       `uid` integer not null,
       `expires` integer not null
     );
     create table if not exists `profiles` (
       `uid` integer primary key,
       `full_name` text not null,
       `phone` text not null default '',
       `rol` text not null default 'user',
       `activo` integer not null default 1,
       `created_at` integer not null,
       `updated_at` integer not null
     );
     create table if not exists `peritajes` (
       `id` text primary key,
       `fecha_turno` text not null,
       `hora_turno` text not null,
       `estado` text not null default 'pendiente',
       `nombre_propietario` text not null,
       `telefono_propietario` text not null,
       `email_propietario` text not null,
       `marca` text,
       `modelo` text,
       `anio` text,
       `patente` text,
       `kilometraje` text,
       `color` text,
       `tipo_combustible` text,
       `estado_general` text,
       `carroceria` text,
       `pintura` text,
       `motor` text,
       `transmision` text,
       `frenos` text,
       `suspension` text,
       `sistema_electrico` text,
       `interior` text,
       `neumaticos` text,
       `observaciones` text not null default '',
       `conclusion` text not null default '',
       `metodo_pago` text not null default 'efectivo',
       `payment_ref` text,
       `senado` integer not null default 0,
       `pago_pendiente` integer not null default 0,
       `created_at` integer not null,
       `updated_at` integer not null
     );
     create table if not exists `payments` (
       `id` text not null,
       `amount` real not null,
       `descripcion` text not null default '',
       `canal` text not null,
       `peritaje_id` text,
       `created_at` integer not null
     );",
  )?;
  Ok(())
}

lazy_static! {
  static ref REG_EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// booking request: owner contact plus the chosen slot
#[derive(Debug, Clone)]
pub struct NuevoPeritaje {
  pub fecha_turno: String,
  pub hora_turno: String,
  pub nombre_propietario: String,
  pub telefono_propietario: String,
  pub email_propietario: String,
  pub metodo_pago: MetodoPago,
}

impl NuevoPeritaje {
  pub fn validar(&self) -> Result<()> {
    if self.nombre_propietario.trim().is_empty() || self.telefono_propietario.trim().is_empty() {
      bail!(ErrorKind::InvalidRequest);
    }
    if !REG_EMAIL.is_match(&self.email_propietario) {
      bail!(ErrorKind::InvalidRequest);
    }
    Ok(())
  }
}

/// staff edit of the full record, applied last-write-wins
#[derive(Debug, Clone)]
pub struct PeritajeUpdate {
  pub nombre_propietario: String,
  pub telefono_propietario: String,
  pub email_propietario: String,
  pub marca: Option<String>,
  pub modelo: Option<String>,
  pub anio: Option<String>,
  pub patente: Option<String>,
  pub kilometraje: Option<String>,
  pub color: Option<String>,
  pub tipo_combustible: Option<Combustible>,
  pub estado_general: Option<Condicion>,
  pub carroceria: Option<Condicion>,
  pub pintura: Option<Condicion>,
  pub motor: Option<Condicion>,
  pub transmision: Option<Condicion>,
  pub frenos: Option<Condicion>,
  pub suspension: Option<Condicion>,
  pub sistema_electrico: Option<Condicion>,
  pub interior: Option<Condicion>,
  pub neumaticos: Option<Condicion>,
  pub observaciones: String,
  pub conclusion: String,
  pub estado: Estado,
  pub senado: bool,
}

impl PeritajeUpdate {
  pub fn validar(&self) -> Result<()> {
    if self.nombre_propietario.trim().is_empty() || self.telefono_propietario.trim().is_empty() {
      bail!(ErrorKind::InvalidRequest);
    }
    if !REG_EMAIL.is_match(&self.email_propietario) {
      bail!(ErrorKind::InvalidRequest);
    }
    if let Some(anio) = &self.anio {
      if !anio.is_empty() && anio.parse::<u32>().is_err() {
        bail!(ErrorKind::InvalidRequest);
      }
    }
    Ok(())
  }
}

pub fn insert_peritaje(db: &Connection, peritaje: &NuevoPeritaje, id: &str) -> Result<()> {
  let now = util::get_timestamp() as i64;
  db.execute(
    "insert into `peritajes` (
      `id`,
      `fecha_turno`,
      `hora_turno`,
      `estado`,
      `nombre_propietario`,
      `telefono_propietario`,
      `email_propietario`,
      `metodo_pago`,
      `pago_pendiente`,
      `created_at`,
      `updated_at`
    ) values (
      :id,
      :fecha_turno,
      :hora_turno,
      :estado,
      :nombre_propietario,
      :telefono_propietario,
      :email_propietario,
      :metodo_pago,
      :pago_pendiente,
      :created_at,
      :updated_at
    )",
    named_params![
      ":id":                   id,
      ":fecha_turno":          peritaje.fecha_turno,
      ":hora_turno":           peritaje.hora_turno,
      ":estado":               Estado::Pendiente,
      ":nombre_propietario":   peritaje.nombre_propietario,
      ":telefono_propietario": peritaje.telefono_propietario,
      ":email_propietario":    peritaje.email_propietario,
      ":metodo_pago":          peritaje.metodo_pago,
      ":pago_pendiente":       peritaje.metodo_pago == MetodoPago::MercadoPago,
      ":created_at":           now,
      ":updated_at":           now,
    ],
  )?;
  Ok(())
}

fn map_peritaje(row: &Row) -> rusqlite::Result<Peritaje> {
  Ok(Peritaje {
    id: row.get("id")?,
    fecha_turno: row.get("fecha_turno")?,
    hora_turno: row.get("hora_turno")?,
    estado: row.get("estado")?,
    nombre_propietario: row.get("nombre_propietario")?,
    telefono_propietario: row.get("telefono_propietario")?,
    email_propietario: row.get("email_propietario")?,
    vehiculo: crate::schema::Vehiculo {
      marca: row.get("marca")?,
      modelo: row.get("modelo")?,
      anio: row.get("anio")?,
      patente: row.get("patente")?,
      kilometraje: row.get("kilometraje")?,
      color: row.get("color")?,
      tipo_combustible: row.get("tipo_combustible")?,
    },
    evaluacion: crate::schema::Evaluacion {
      estado_general: row.get("estado_general")?,
      carroceria: row.get("carroceria")?,
      pintura: row.get("pintura")?,
      motor: row.get("motor")?,
      transmision: row.get("transmision")?,
      frenos: row.get("frenos")?,
      suspension: row.get("suspension")?,
      sistema_electrico: row.get("sistema_electrico")?,
      interior: row.get("interior")?,
      neumaticos: row.get("neumaticos")?,
      observaciones: row.get("observaciones")?,
      conclusion: row.get("conclusion")?,
    },
    metodo_pago: row.get("metodo_pago")?,
    payment_ref: row.get("payment_ref")?,
    senado: row.get("senado")?,
    pago_pendiente: row.get("pago_pendiente")?,
    created_at: row.get("created_at")?,
    updated_at: row.get("updated_at")?,
  })
}

pub fn peritaje_por_id(db: &Connection, id: &str) -> Result<Option<Peritaje>> {
  Ok(
    db.query_row(
      "select * from `peritajes` where `id` = :id",
      params![id],
      map_peritaje,
    )
    .optional()?,
  )
}

/// pending/in-process view, soonest appointment first
pub fn peritajes_pendientes(db: &Connection, solo_pago_pendiente: bool) -> Result<Vec<Peritaje>> {
  let mut stmt = db.prepare(
    "select * from `peritajes`
      where `estado` in ('pendiente', 'en_proceso')
        and (:solo_pago = 0 or `pago_pendiente` = 1)
      order by `fecha_turno` asc, `hora_turno` asc",
  )?;
  let rows = stmt
    .query_map(named_params![":solo_pago": solo_pago_pendiente], map_peritaje)?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(rows)
}

/// completed/cancelled view, most recent appointment first
pub fn peritajes_completados(db: &Connection) -> Result<Vec<Peritaje>> {
  let mut stmt = db.prepare(
    "select * from `peritajes`
      where `estado` in ('completado', 'cancelado')
      order by `fecha_turno` desc, `hora_turno` desc",
  )?;
  let rows = stmt
    .query_map(params![], map_peritaje)?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(rows)
}

pub fn peritajes_recientes(db: &Connection, limit: i64) -> Result<Vec<Peritaje>> {
  let mut stmt = db.prepare(
    "select * from `peritajes`
      order by `created_at` desc
      limit :limit",
  )?;
  let rows = stmt
    .query_map(named_params![":limit": limit], map_peritaje)?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(rows)
}

/// slots already claimed by a pending inspection on the given date
pub fn horas_ocupadas(db: &Connection, fecha: &str) -> Result<Vec<String>> {
  let mut stmt = db.prepare(
    "select `hora_turno` from `peritajes`
      where `fecha_turno` = :fecha and
            `estado` = 'pendiente'",
  )?;
  let horas = stmt
    .query_map(named_params![":fecha": fecha], |row| row.get(0))?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(horas)
}

/// applies a full staff edit and returns the state the record held before,
/// so the caller can detect the transition into `completado`
pub fn actualizar_peritaje(db: &Connection, id: &str, update: &PeritajeUpdate) -> Result<Option<Estado>> {
  let anterior: Option<Estado> = db
    .query_row(
      "select `estado` from `peritajes` where `id` = :id",
      params![id],
      |row| row.get(0),
    )
    .optional()?;
  if anterior.is_none() {
    return Ok(None);
  }

  db.execute(
    "update `peritajes`
      set `nombre_propietario` = :nombre_propietario,
          `telefono_propietario` = :telefono_propietario,
          `email_propietario` = :email_propietario,
          `marca` = :marca,
          `modelo` = :modelo,
          `anio` = :anio,
          `patente` = :patente,
          `kilometraje` = :kilometraje,
          `color` = :color,
          `tipo_combustible` = :tipo_combustible,
          `estado_general` = :estado_general,
          `carroceria` = :carroceria,
          `pintura` = :pintura,
          `motor` = :motor,
          `transmision` = :transmision,
          `frenos` = :frenos,
          `suspension` = :suspension,
          `sistema_electrico` = :sistema_electrico,
          `interior` = :interior,
          `neumaticos` = :neumaticos,
          `observaciones` = :observaciones,
          `conclusion` = :conclusion,
          `estado` = :estado,
          `senado` = :senado,
          `updated_at` = :updated_at
      where `id` = :id",
    named_params![
      ":id":                   id,
      ":nombre_propietario":   update.nombre_propietario,
      ":telefono_propietario": update.telefono_propietario,
      ":email_propietario":    update.email_propietario,
      ":marca":                update.marca,
      ":modelo":               update.modelo,
      ":anio":                 update.anio,
      ":patente":              update.patente,
      ":kilometraje":          update.kilometraje,
      ":color":                update.color,
      ":tipo_combustible":     update.tipo_combustible,
      ":estado_general":       update.estado_general,
      ":carroceria":           update.carroceria,
      ":pintura":              update.pintura,
      ":motor":                update.motor,
      ":transmision":          update.transmision,
      ":frenos":               update.frenos,
      ":suspension":           update.suspension,
      ":sistema_electrico":    update.sistema_electrico,
      ":interior":             update.interior,
      ":neumaticos":           update.neumaticos,
      ":observaciones":        update.observaciones,
      ":conclusion":           update.conclusion,
      ":estado":               update.estado,
      ":senado":               update.senado,
      ":updated_at":           util::get_timestamp() as i64,
    ],
  )?;
  Ok(anterior)
}

/// state-only transition; returns the previous state
pub fn actualizar_estado(db: &Connection, id: &str, estado: Estado) -> Result<Option<Estado>> {
  let anterior: Option<Estado> = db
    .query_row(
      "select `estado` from `peritajes` where `id` = :id",
      params![id],
      |row| row.get(0),
    )
    .optional()?;
  if anterior.is_none() {
    return Ok(None);
  }

  db.execute(
    "update `peritajes`
      set `estado` = :estado,
          `updated_at` = :updated_at
      where `id` = :id",
    named_params![
      ":id": id,
      ":estado": estado,
      ":updated_at": util::get_timestamp() as i64,
    ],
  )?;
  Ok(anterior)
}

/// best-effort linkage from an approved gateway payment back to its booking
pub fn marcar_sena_pagada(db: &Connection, peritaje_id: &str, payment_ref: &str) -> Result<bool> {
  let n = db.execute(
    "update `peritajes`
      set `senado` = 1,
          `pago_pendiente` = 0,
          `payment_ref` = :payment_ref,
          `updated_at` = :updated_at
      where `id` = :id",
    named_params![
      ":id": peritaje_id,
      ":payment_ref": payment_ref,
      ":updated_at": util::get_timestamp() as i64,
    ],
  )?;
  Ok(n > 0)
}

/// appends a ledger row; deliberately no uniqueness on `id`, replayed
/// webhook deliveries append again
pub fn insert_payment(db: &Connection, payment: &Payment) -> Result<()> {
  db.execute(
    "insert into `payments` (
      `id`,
      `amount`,
      `descripcion`,
      `canal`,
      `peritaje_id`,
      `created_at`
    ) values (
      :id,
      :amount,
      :descripcion,
      :canal,
      :peritaje_id,
      :created_at
    )",
    named_params![
      ":id":          payment.id,
      ":amount":      payment.amount,
      ":descripcion": payment.descripcion,
      ":canal":       payment.canal,
      ":peritaje_id": payment.peritaje_id,
      ":created_at":  payment.created_at,
    ],
  )?;
  Ok(())
}

pub fn payments(db: &Connection) -> Result<Vec<Payment>> {
  let mut stmt = db.prepare(
    "select `id`, `amount`, `descripcion`, `canal`, `peritaje_id`, `created_at`
       from `payments`
      order by `created_at` desc",
  )?;
  let rows = stmt
    .query_map(params![], |row| {
      Ok(Payment {
        id: row.get(0)?,
        amount: row.get(1)?,
        descripcion: row.get(2)?,
        canal: row.get(3)?,
        peritaje_id: row.get(4)?,
        created_at: row.get(5)?,
      })
    })?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(rows)
}

/* ---------------- users & profiles ---------------- */

#[derive(Debug, Clone)]
pub struct NuevoUsuario {
  pub login: String,
  /// already hashed by the caller
  pub password: String,
  pub full_name: String,
  pub phone: String,
  pub rol: Rol,
}

impl NuevoUsuario {
  pub fn validar(&self) -> Result<()> {
    if self.login.trim().is_empty() || self.full_name.trim().is_empty() {
      bail!(ErrorKind::InvalidRequest);
    }
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct UsuarioUpdate {
  pub uid: u32,
  pub full_name: String,
  pub phone: String,
  pub rol: Rol,
  pub activo: bool,
}

pub fn insert_usuario(db: &Connection, usuario: &NuevoUsuario) -> Result<u32> {
  if db
    .prepare("select `id` from `users` where `login` = :login")?
    .exists(params![usuario.login])?
  {
    bail!(ErrorKind::InvalidRequest);
  }

  db.execute(
    "insert into `users` (`login`, `password`) values (:login, :password)",
    params![usuario.login, usuario.password],
  )?;
  let uid = db.last_insert_rowid() as u32;

  let now = util::get_timestamp() as i64;
  db.execute(
    "insert into `profiles` (
      `uid`,
      `full_name`,
      `phone`,
      `rol`,
      `activo`,
      `created_at`,
      `updated_at`
    ) values (
      :uid,
      :full_name,
      :phone,
      :rol,
      1,
      :now,
      :now
    )",
    named_params![
      ":uid":       uid,
      ":full_name": usuario.full_name,
      ":phone":     usuario.phone,
      ":rol":       usuario.rol,
      ":now":       now,
    ],
  )?;
  Ok(uid)
}

pub fn usuarios(db: &Connection) -> Result<Vec<(User, Profile)>> {
  let mut stmt = db.prepare(
    "select a.id, a.login,
            b.full_name, b.phone, b.rol, b.activo, b.created_at, b.updated_at
       from `users` a
            left join `profiles` b on b.uid = a.id
      order by a.id asc",
  )?;
  let rows = stmt
    .query_map(params![], |row| {
      let uid: u32 = row.get(0)?;
      Ok((
        User {
          id: uid,
          login: row.get(1)?,
          password: String::new(),
        },
        Profile {
          uid,
          full_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
          phone: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
          rol: row.get::<_, Option<Rol>>(4)?.unwrap_or(Rol::User),
          activo: row.get::<_, Option<bool>>(5)?.unwrap_or(true),
          created_at: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
          updated_at: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        },
      ))
    })?
    .filter_map(std::result::Result::ok)
    .collect();
  Ok(rows)
}

pub fn profile_por_uid(db: &Connection, uid: u32) -> Result<Option<Profile>> {
  Ok(
    db.query_row(
      "select `uid`, `full_name`, `phone`, `rol`, `activo`, `created_at`, `updated_at`
         from `profiles`
        where `uid` = :uid",
      params![uid],
      |row| {
        Ok(Profile {
          uid: row.get(0)?,
          full_name: row.get(1)?,
          phone: row.get(2)?,
          rol: row.get(3)?,
          activo: row.get(4)?,
          created_at: row.get(5)?,
          updated_at: row.get(6)?,
        })
      },
    )
    .optional()?,
  )
}

pub fn actualizar_usuario(db: &Connection, update: &UsuarioUpdate) -> Result<()> {
  db.execute(
    "update `profiles`
      set `full_name` = :full_name,
          `phone` = :phone,
          `rol` = :rol,
          `activo` = :activo,
          `updated_at` = :updated_at
      where `uid` = :uid",
    named_params![
      ":uid":        update.uid,
      ":full_name":  update.full_name,
      ":phone":      update.phone,
      ":rol":        update.rol,
      ":activo":     update.activo,
      ":updated_at": util::get_timestamp() as i64,
    ],
  )?;
  Ok(())
}

pub fn actualizar_activo(db: &Connection, uid: u32, activo: bool) -> Result<()> {
  db.execute(
    "update `profiles`
      set `activo` = :activo,
          `updated_at` = :updated_at
      where `uid` = :uid",
    named_params![
      ":uid": uid,
      ":activo": activo,
      ":updated_at": util::get_timestamp() as i64,
    ],
  )?;
  Ok(())
}

/// removes the profile first, then the identity itself. A profile failure
/// is logged and swallowed; it does not abort the identity deletion.
pub fn eliminar_usuario(db: &Connection, uid: u32) -> Result<()> {
  db.execute("delete from `profiles` where `uid` = :uid", params![uid])
    .map_err(|e| log_error!(e, format!("eliminar_usuario: profile {}", uid)))
    .ok();

  db.execute("delete from `sessions` where `uid` = :uid", params![uid])?;
  db.execute("delete from `users` where `id` = :uid", params![uid])?;
  Ok(())
}

/* ---------------- reporting ---------------- */

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Stats {
  pub pendientes: u32,
  pub en_proceso: u32,
  pub completados: u32,
  pub cancelados: u32,
  pub total: u32,
}

impl Stats {
  fn sumar(&mut self, estado: &str) {
    self.total += 1;
    match estado.parse::<Estado>() {
      Ok(Estado::Pendiente) => self.pendientes += 1,
      Ok(Estado::EnProceso) => self.en_proceso += 1,
      Ok(Estado::Completado) => self.completados += 1,
      Ok(Estado::Cancelado) => self.cancelados += 1,
      // unrecognized states count as pending
      Err(_) => self.pendientes += 1,
    }
  }
}

pub fn stats_rango(db: &Connection, desde: &str, hasta: &str) -> Result<Stats> {
  let mut stmt = db.prepare(
    "select `estado` from `peritajes`
      where `fecha_turno` >= :desde and
            `fecha_turno` <= :hasta",
  )?;
  let mut stats = Stats::default();
  for estado in stmt
    .query_map(named_params![":desde": desde, ":hasta": hasta], |row| {
      row.get::<_, String>(0)
    })?
    .filter_map(std::result::Result::ok)
  {
    stats.sumar(&estado);
  }
  Ok(stats)
}

/// per-month counters of a calendar year, index 0 = january
pub fn stats_mensuales(db: &Connection, anio: i32) -> Result<Vec<Stats>> {
  let mut stmt = db.prepare(
    "select `estado`, `fecha_turno` from `peritajes`
      where `fecha_turno` >= :desde and
            `fecha_turno` <= :hasta",
  )?;
  let mut meses = vec![Stats::default(); 12];
  let rows = stmt.query_map(
    named_params![
      ":desde": format!("{}-01-01", anio),
      ":hasta": format!("{}-12-31", anio),
    ],
    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
  )?;
  for (estado, fecha) in rows.filter_map(std::result::Result::ok) {
    if let Ok(fecha) = chrono::NaiveDate::parse_from_str(&fecha, "%Y-%m-%d") {
      use chrono::Datelike;
      meses[fecha.month0() as usize].sumar(&estado);
    }
  }
  Ok(meses)
}

pub fn kpi_estado(db: &Connection, estado: Option<Estado>) -> Result<u32> {
  let count = match estado {
    Some(estado) => db.query_row(
      "select count(*) from `peritajes` where `estado` = :estado",
      params![estado],
      |row| row.get(0),
    )?,
    None => db.query_row("select count(*) from `peritajes`", params![], |row| row.get(0))?,
  };
  Ok(count)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn db() -> Connection {
    let db = Connection::open_in_memory().unwrap();
    init_schema(&db).unwrap();
    db
  }

  fn reserva(fecha: &str, hora: &str) -> NuevoPeritaje {
    NuevoPeritaje {
      fecha_turno: fecha.into(),
      hora_turno: hora.into(),
      nombre_propietario: "Juan Pérez".into(),
      telefono_propietario: "1123456789".into(),
      email_propietario: "juan@ejemplo.com".into(),
      metodo_pago: MetodoPago::Efectivo,
    }
  }

  #[test]
  fn una_reserva_crea_exactamente_un_registro_pendiente() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-01", "10:00"), "p-1").unwrap();

    let pendientes = peritajes_pendientes(&db, false).unwrap();
    assert_eq!(pendientes.len(), 1);
    let p = &pendientes[0];
    assert_eq!(p.estado, Estado::Pendiente);
    assert_eq!(p.fecha_turno, "2024-01-01");
    assert_eq!(p.hora_turno, "10:00");
    assert_eq!(p.metodo_pago, MetodoPago::Efectivo);
    assert!(!p.pago_pendiente);
  }

  #[test]
  fn reserva_por_pasarela_queda_con_pago_pendiente() {
    let db = db();
    let mut nuevo = reserva("2024-01-01", "10:00");
    nuevo.metodo_pago = MetodoPago::MercadoPago;
    insert_peritaje(&db, &nuevo, "p-1").unwrap();

    let p = peritaje_por_id(&db, "p-1").unwrap().unwrap();
    assert!(p.pago_pendiente);
    assert!(!p.senado);

    assert!(marcar_sena_pagada(&db, "p-1", "12345").unwrap());
    let p = peritaje_por_id(&db, "p-1").unwrap().unwrap();
    assert!(p.senado);
    assert!(!p.pago_pendiente);
    assert_eq!(p.payment_ref.as_deref(), Some("12345"));
  }

  #[test]
  fn validacion_de_contacto_del_propietario() {
    let mut nuevo = reserva("2024-01-01", "10:00");
    assert!(nuevo.validar().is_ok());
    nuevo.email_propietario = "no-es-un-email".into();
    assert!(nuevo.validar().is_err());
    nuevo.email_propietario = "juan@ejemplo.com".into();
    nuevo.nombre_propietario = "  ".into();
    assert!(nuevo.validar().is_err());
  }

  #[test]
  fn horas_ocupadas_solo_cuenta_pendientes() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-01", "10:00"), "p-1").unwrap();
    insert_peritaje(&db, &reserva("2024-01-01", "11:00"), "p-2").unwrap();
    insert_peritaje(&db, &reserva("2024-01-02", "10:00"), "p-3").unwrap();
    actualizar_estado(&db, "p-2", Estado::Cancelado).unwrap();

    assert_eq!(horas_ocupadas(&db, "2024-01-01").unwrap(), vec!["10:00"]);
  }

  fn edicion(estado: Estado) -> PeritajeUpdate {
    PeritajeUpdate {
      nombre_propietario: "Juan Pérez".into(),
      telefono_propietario: "1123456789".into(),
      email_propietario: "juan@ejemplo.com".into(),
      marca: Some("Toyota".into()),
      modelo: None,
      anio: None,
      patente: None,
      kilometraje: None,
      color: None,
      tipo_combustible: None,
      estado_general: Some(Condicion::Bueno),
      carroceria: None,
      pintura: None,
      motor: None,
      transmision: None,
      frenos: None,
      suspension: None,
      sistema_electrico: None,
      interior: None,
      neumaticos: None,
      observaciones: "".into(),
      conclusion: "".into(),
      estado,
      senado: false,
    }
  }

  #[test]
  fn actualizar_peritaje_devuelve_el_estado_anterior() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-01", "10:00"), "p-1").unwrap();

    assert_eq!(
      actualizar_peritaje(&db, "p-1", &edicion(Estado::Completado)).unwrap(),
      Some(Estado::Pendiente)
    );
    // a repeat save of a completed record reports it was already completado
    assert_eq!(
      actualizar_peritaje(&db, "p-1", &edicion(Estado::Completado)).unwrap(),
      Some(Estado::Completado)
    );
    assert_eq!(
      actualizar_peritaje(&db, "no-existe", &edicion(Estado::Completado)).unwrap(),
      None
    );

    let p = peritaje_por_id(&db, "p-1").unwrap().unwrap();
    assert_eq!(p.estado, Estado::Completado);
    assert_eq!(p.vehiculo.marca.as_deref(), Some("Toyota"));
    assert_eq!(p.evaluacion.estado_general, Some(Condicion::Bueno));
  }

  #[test]
  fn pendientes_filtrados_por_sena_sin_pagar() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-01", "10:00"), "p-efectivo").unwrap();
    let mut gateway = reserva("2024-01-01", "11:00");
    gateway.metodo_pago = MetodoPago::MercadoPago;
    insert_peritaje(&db, &gateway, "p-gateway").unwrap();
    let mut pagado = reserva("2024-01-01", "12:00");
    pagado.metodo_pago = MetodoPago::MercadoPago;
    insert_peritaje(&db, &pagado, "p-pagado").unwrap();
    marcar_sena_pagada(&db, "p-pagado", "mp-1").unwrap();

    assert_eq!(peritajes_pendientes(&db, false).unwrap().len(), 3);

    let sin_pagar = peritajes_pendientes(&db, true).unwrap();
    assert_eq!(sin_pagar.len(), 1);
    assert_eq!(sin_pagar[0].id, "p-gateway");
  }

  #[test]
  fn actualizar_estado_devuelve_el_anterior() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-01", "10:00"), "p-1").unwrap();

    assert_eq!(
      actualizar_estado(&db, "p-1", Estado::EnProceso).unwrap(),
      Some(Estado::Pendiente)
    );
    assert_eq!(
      actualizar_estado(&db, "p-1", Estado::Completado).unwrap(),
      Some(Estado::EnProceso)
    );
    assert_eq!(actualizar_estado(&db, "no-existe", Estado::Completado).unwrap(), None);
  }

  #[test]
  fn webhook_repetido_duplica_la_fila_del_ledger() {
    // observed behavior, not a desired property: the ledger has no
    // uniqueness on the external payment id
    let db = db();
    let pago = Payment {
      id: "mp-77".into(),
      amount: 1000.0,
      descripcion: "Peritaje automotriz".into(),
      canal: MetodoPago::MercadoPago,
      peritaje_id: None,
      created_at: 0,
    };
    insert_payment(&db, &pago).unwrap();
    insert_payment(&db, &pago).unwrap();
    assert_eq!(payments(&db).unwrap().len(), 2);
  }

  #[test]
  fn eliminar_usuario_borra_perfil_sesiones_e_identidad() {
    let db = db();
    let uid = insert_usuario(
      &db,
      &NuevoUsuario {
        login: "perito1".into(),
        password: "hash".into(),
        full_name: "Perito Uno".into(),
        phone: "".into(),
        rol: Rol::Perito,
      },
    )
    .unwrap();
    db.execute(
      "insert into `sessions` (`id`, `uid`, `expires`) values ('s', :uid, 99)",
      params![uid],
    )
    .unwrap();

    eliminar_usuario(&db, uid).unwrap();
    assert!(profile_por_uid(&db, uid).unwrap().is_none());
    assert_eq!(usuarios(&db).unwrap().len(), 0);
    let sesiones: u32 = db
      .query_row("select count(*) from `sessions`", params![], |r| r.get(0))
      .unwrap();
    assert_eq!(sesiones, 0);
  }

  #[test]
  fn fallo_al_borrar_el_perfil_no_frena_el_borrado_de_la_identidad() {
    let db = db();
    let uid = insert_usuario(
      &db,
      &NuevoUsuario {
        login: "perito1".into(),
        password: "hash".into(),
        full_name: "Perito Uno".into(),
        phone: "".into(),
        rol: Rol::Perito,
      },
    )
    .unwrap();

    // make the profile delete fail
    db.execute_batch("drop table `profiles`;").unwrap();

    eliminar_usuario(&db, uid).unwrap();
    let identidades: u32 = db
      .query_row("select count(*) from `users`", params![], |r| r.get(0))
      .unwrap();
    assert_eq!(identidades, 0);
  }

  #[test]
  fn el_autoregistro_crea_una_cuenta_activa_de_rol_user() {
    let db = db();
    let uid = insert_usuario(
      &db,
      &NuevoUsuario {
        login: "cliente1".into(),
        password: "hash".into(),
        full_name: "Cliente Uno".into(),
        phone: "".into(),
        rol: Rol::User,
      },
    )
    .unwrap();

    let profile = profile_por_uid(&db, uid).unwrap().unwrap();
    assert_eq!(profile.rol, Rol::User);
    assert!(profile.activo);
  }

  #[test]
  fn stats_por_rango_y_kpi() {
    let db = db();
    insert_peritaje(&db, &reserva("2024-01-10", "10:00"), "p-1").unwrap();
    insert_peritaje(&db, &reserva("2024-01-20", "11:00"), "p-2").unwrap();
    insert_peritaje(&db, &reserva("2024-03-05", "12:00"), "p-3").unwrap();
    actualizar_estado(&db, "p-2", Estado::Completado).unwrap();

    let stats = stats_rango(&db, "2024-01-01", "2024-01-31").unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pendientes, 1);
    assert_eq!(stats.completados, 1);

    let meses = stats_mensuales(&db, 2024).unwrap();
    assert_eq!(meses[0].total, 2);
    assert_eq!(meses[2].total, 1);
    assert_eq!(meses[5].total, 0);

    assert_eq!(kpi_estado(&db, Some(Estado::Pendiente)).unwrap(), 2);
    assert_eq!(kpi_estado(&db, None).unwrap(), 3);
  }
}
