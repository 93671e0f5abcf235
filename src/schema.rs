use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use strum_macros::{Display, EnumIter, EnumString};

/// text-column persistence for the string-backed enums
macro_rules! sql_text_enum {
  ($t:ty) => {
    impl FromSql for $t {
      fn column_result(value: ValueRef) -> FromSqlResult<Self> {
        value
          .as_str()?
          .parse()
          .map_err(|_| FromSqlError::InvalidType)
      }
    }
    impl ToSql for $t {
      fn to_sql(&self) -> rusqlite::Result<ToSqlOutput> {
        Ok(self.as_str().into())
      }
    }
  };
}

#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Estado {
  #[strum(to_string = "Pendiente", serialize = "pendiente")]
  Pendiente,
  #[strum(to_string = "En proceso", serialize = "en_proceso")]
  EnProceso,
  #[strum(to_string = "Completado", serialize = "completado")]
  Completado,
  #[strum(to_string = "Cancelado", serialize = "cancelado")]
  Cancelado,
}

impl Estado {
  pub fn as_str(&self) -> &'static str {
    match self {
      Estado::Pendiente => "pendiente",
      Estado::EnProceso => "en_proceso",
      Estado::Completado => "completado",
      Estado::Cancelado => "cancelado",
    }
  }
}
sql_text_enum!(Estado);

/// condition rating of a single evaluated component
#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condicion {
  #[strum(to_string = "Excelente", serialize = "excelente")]
  Excelente,
  #[strum(to_string = "Bueno", serialize = "bueno")]
  Bueno,
  #[strum(to_string = "Regular", serialize = "regular")]
  Regular,
  #[strum(to_string = "Malo", serialize = "malo")]
  Malo,
  #[strum(to_string = "Crítico", serialize = "critico", serialize = "crítico")]
  Critico,
}

impl Condicion {
  pub fn as_str(&self) -> &'static str {
    match self {
      Condicion::Excelente => "excelente",
      Condicion::Bueno => "bueno",
      Condicion::Regular => "regular",
      Condicion::Malo => "malo",
      Condicion::Critico => "critico",
    }
  }

  /// human-readable description used in the report and the completed email
  pub fn descripcion(&self) -> &'static str {
    match self {
      Condicion::Excelente => "Excelente - En perfectas condiciones, sin desgaste visible.",
      Condicion::Bueno => "Bueno - En buen estado general, con desgaste normal por uso.",
      Condicion::Regular => "Regular - Presenta desgaste notable, requiere atención.",
      Condicion::Malo => "Malo - Presenta problemas significativos, requiere reparación.",
      Condicion::Critico => "Crítico - Requiere reparación inmediata, no es seguro para uso.",
    }
  }

  /// severity color for email rendering
  pub fn color(&self) -> &'static str {
    match self {
      Condicion::Excelente => "#22c55e",
      Condicion::Bueno => "#3b82f6",
      Condicion::Regular => "#f59e0b",
      Condicion::Malo => "#ef4444",
      Condicion::Critico => "#7f1d1d",
    }
  }
}
sql_text_enum!(Condicion);

#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Combustible {
  #[strum(to_string = "Nafta", serialize = "nafta")]
  Nafta,
  #[strum(to_string = "Diesel", serialize = "diesel")]
  Diesel,
  #[strum(to_string = "GNC", serialize = "gnc")]
  Gnc,
  #[strum(to_string = "Eléctrico", serialize = "electrico")]
  Electrico,
  #[strum(to_string = "Híbrido", serialize = "hibrido")]
  Hibrido,
}

impl Combustible {
  pub fn as_str(&self) -> &'static str {
    match self {
      Combustible::Nafta => "nafta",
      Combustible::Diesel => "diesel",
      Combustible::Gnc => "gnc",
      Combustible::Electrico => "electrico",
      Combustible::Hibrido => "hibrido",
    }
  }
}
sql_text_enum!(Combustible);

#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MetodoPago {
  #[strum(to_string = "Efectivo", serialize = "efectivo")]
  Efectivo,
  #[strum(to_string = "MercadoPago", serialize = "mercadopago")]
  MercadoPago,
}

impl MetodoPago {
  pub fn as_str(&self) -> &'static str {
    match self {
      MetodoPago::Efectivo => "efectivo",
      MetodoPago::MercadoPago => "mercadopago",
    }
  }
}
sql_text_enum!(MetodoPago);

#[derive(Display, EnumString, EnumIter, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rol {
  #[strum(to_string = "Administrador", serialize = "admin")]
  Admin,
  #[strum(to_string = "Perito", serialize = "perito")]
  Perito,
  #[strum(to_string = "Usuario", serialize = "user")]
  User,
}

impl Rol {
  pub fn as_str(&self) -> &'static str {
    match self {
      Rol::Admin => "admin",
      Rol::Perito => "perito",
      Rol::User => "user",
    }
  }
}
sql_text_enum!(Rol);

#[derive(Debug, Clone)]
pub struct User {
  pub id: u32,
  pub login: String,
  pub password: String,
}

#[derive(Debug)]
pub struct Session {
  pub id: String,
  pub uid: u32,
  pub expires: u64,
}

#[derive(Debug, Clone)]
pub struct Profile {
  pub uid: u32,
  pub full_name: String,
  pub phone: String,
  pub rol: Rol,
  pub activo: bool,
  pub created_at: i64,
  pub updated_at: i64,
}

/// vehicle attributes, absent until inspection work begins
#[derive(Debug, Clone, Default)]
pub struct Vehiculo {
  pub marca: Option<String>,
  pub modelo: Option<String>,
  pub anio: Option<String>,
  pub patente: Option<String>,
  pub kilometraje: Option<String>,
  pub color: Option<String>,
  pub tipo_combustible: Option<Combustible>,
}

/// the ten independent condition ratings plus free text
#[derive(Debug, Clone, Default)]
pub struct Evaluacion {
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
}

impl Evaluacion {
  /// component label / rating pairs in report order
  pub fn componentes(&self) -> [(&'static str, Option<Condicion>); 10] {
    [
      ("Estado general", self.estado_general),
      ("Carrocería", self.carroceria),
      ("Pintura", self.pintura),
      ("Motor", self.motor),
      ("Transmisión", self.transmision),
      ("Frenos", self.frenos),
      ("Suspensión", self.suspension),
      ("Sistema eléctrico", self.sistema_electrico),
      ("Interior", self.interior),
      ("Neumáticos", self.neumaticos),
    ]
  }
}

#[derive(Debug, Clone)]
pub struct Peritaje {
  pub id: String,
  pub fecha_turno: String,
  pub hora_turno: String,
  pub estado: Estado,
  pub nombre_propietario: String,
  pub telefono_propietario: String,
  pub email_propietario: String,
  pub vehiculo: Vehiculo,
  pub evaluacion: Evaluacion,
  pub metodo_pago: MetodoPago,
  pub payment_ref: Option<String>,
  pub senado: bool,
  pub pago_pendiente: bool,
  pub created_at: i64,
  pub updated_at: i64,
}

/// one row of the append-only payments ledger
#[derive(Debug, Clone)]
pub struct Payment {
  pub id: String,
  pub amount: f64,
  pub descripcion: String,
  pub canal: MetodoPago,
  pub peritaje_id: Option<String>,
  pub created_at: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn estado_roundtrips_through_db_strings() {
    for estado in [
      Estado::Pendiente,
      Estado::EnProceso,
      Estado::Completado,
      Estado::Cancelado,
    ] {
      assert_eq!(estado.as_str().parse::<Estado>().unwrap(), estado);
    }
  }

  #[test]
  fn condicion_accepts_accented_spelling() {
    assert_eq!("crítico".parse::<Condicion>().unwrap(), Condicion::Critico);
    assert_eq!("critico".parse::<Condicion>().unwrap(), Condicion::Critico);
  }

  #[test]
  fn condicion_severity_colors() {
    assert_eq!(Condicion::Excelente.color(), "#22c55e");
    assert_eq!(Condicion::Critico.color(), "#7f1d1d");
  }
}
