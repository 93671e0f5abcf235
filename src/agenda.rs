//! Appointment slots. The daily grid is a fixed, ordered list of half-hour
//! times; availability for a date is the grid minus the slots already
//! claimed by a pending inspection. There is no locking across the
//! check/write pair: two racing bookings can both see a slot as free.

use crate::{error::Result, store};
use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::Connection;

/// business-day grid, half-hour steps
pub const HORARIOS: [&str; 18] = [
  "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "13:00", "13:30",
  "14:00", "14:30", "15:00", "15:30", "16:00", "16:30", "17:00", "17:30",
];

pub fn es_horario_valido(hora: &str) -> bool {
  HORARIOS.contains(&hora)
}

/// grid order is preserved; only `pendiente` bookings block a slot
pub fn horarios_disponibles(db: &Connection, fecha: &str) -> Result<Vec<&'static str>> {
  let ocupadas = store::horas_ocupadas(db, fecha)?;
  Ok(
    HORARIOS
      .iter()
      .copied()
      .filter(|hora| !ocupadas.iter().any(|ocupada| ocupada == hora))
      .collect(),
  )
}

/// bookings are taken on weekdays only, never in the past
pub fn validar_fecha(fecha: &str, hoy: NaiveDate) -> bool {
  match NaiveDate::parse_from_str(fecha, "%Y-%m-%d") {
    Ok(fecha) => {
      fecha >= hoy && fecha.weekday() != Weekday::Sat && fecha.weekday() != Weekday::Sun
    }
    Err(_) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::MetodoPago;
  use crate::store::NuevoPeritaje;

  fn db() -> Connection {
    let db = Connection::open_in_memory().unwrap();
    store::init_schema(&db).unwrap();
    db
  }

  fn reservar(db: &Connection, id: &str, fecha: &str, hora: &str) {
    store::insert_peritaje(
      db,
      &NuevoPeritaje {
        fecha_turno: fecha.into(),
        hora_turno: hora.into(),
        nombre_propietario: "Juan Pérez".into(),
        telefono_propietario: "1123456789".into(),
        email_propietario: "juan@ejemplo.com".into(),
        metodo_pago: MetodoPago::Efectivo,
      },
      id,
    )
    .unwrap();
  }

  #[test]
  fn fecha_vacia_devuelve_la_grilla_completa() {
    let db = db();
    assert_eq!(horarios_disponibles(&db, "2024-01-01").unwrap(), HORARIOS.to_vec());
  }

  #[test]
  fn disponibles_es_la_grilla_menos_lo_reservado_en_orden() {
    let db = db();
    reservar(&db, "p-1", "2024-01-01", "10:00");
    reservar(&db, "p-2", "2024-01-01", "15:30");
    // another date does not interfere
    reservar(&db, "p-3", "2024-01-02", "09:00");

    let disponibles = horarios_disponibles(&db, "2024-01-01").unwrap();
    let esperados: Vec<&str> = HORARIOS
      .iter()
      .copied()
      .filter(|h| *h != "10:00" && *h != "15:30")
      .collect();
    assert_eq!(disponibles, esperados);
  }

  #[test]
  fn reservar_y_volver_a_consultar_excluye_el_turno() {
    // end to end over the store: book 10:00 on 2024-01-01, then the slot
    // is no longer offered for that date
    let db = db();
    assert!(horarios_disponibles(&db, "2024-01-01").unwrap().contains(&"10:00"));
    reservar(&db, "p-1", "2024-01-01", "10:00");
    assert!(!horarios_disponibles(&db, "2024-01-01").unwrap().contains(&"10:00"));
  }

  #[test]
  fn cancelar_libera_el_turno() {
    let db = db();
    reservar(&db, "p-1", "2024-01-01", "10:00");
    store::actualizar_estado(&db, "p-1", crate::schema::Estado::Cancelado).unwrap();
    assert!(horarios_disponibles(&db, "2024-01-01").unwrap().contains(&"10:00"));
  }

  #[test]
  fn fechas_validas_son_dias_habiles_no_pasados() {
    let hoy = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(); // a wednesday
    assert!(validar_fecha("2024-01-10", hoy));
    assert!(validar_fecha("2024-01-12", hoy));
    assert!(!validar_fecha("2024-01-09", hoy)); // past
    assert!(!validar_fecha("2024-01-13", hoy)); // saturday
    assert!(!validar_fecha("2024-01-14", hoy)); // sunday
    assert!(!validar_fecha("13/01/2024", hoy)); // wrong format
  }
}
