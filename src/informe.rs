//! Inspection report: the auto-generated conclusion and the PDF export.

use crate::{
  error::Result,
  schema::{Condicion, Peritaje},
  util,
};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

/// conclusion derived from the ten condition ratings when the inspector
/// left none. Tiers: any critical; bad above a third; good or better above
/// 70%; otherwise mixed.
pub fn generar_conclusion(peritaje: &Peritaje) -> String {
  let calificados: Vec<Condicion> = peritaje
    .evaluacion
    .componentes()
    .iter()
    .filter_map(|(_, condicion)| *condicion)
    .collect();

  if calificados.is_empty() {
    return "No se ha realizado una evaluación completa del vehículo.".to_string();
  }

  let contar = |tipo: Condicion| calificados.iter().filter(|c| **c == tipo).count();
  let total = calificados.len();
  let excelentes = contar(Condicion::Excelente);
  let buenos = contar(Condicion::Bueno);
  let regulares = contar(Condicion::Regular);
  let malos = contar(Condicion::Malo);
  let criticos = contar(Condicion::Critico);

  if criticos > 0 {
    return format!(
      "El vehículo presenta {} componentes en estado crítico que requieren atención inmediata. \
       No es recomendable su adquisición sin antes realizar las reparaciones necesarias.",
      criticos
    );
  }
  if malos as f64 > total as f64 / 3.0 {
    return format!(
      "El vehículo presenta {} componentes en mal estado. Se recomienda una revisión exhaustiva \
       y presupuesto de reparaciones antes de considerar su adquisición.",
      malos
    );
  }
  if (buenos + excelentes) as f64 > total as f64 * 0.7 {
    return format!(
      "El vehículo se encuentra en buen estado general. Con {} componentes en buen estado y {} \
       en excelente estado. Es una buena opción para adquisición, considerando su año y kilometraje.",
      buenos, excelentes
    );
  }
  format!(
    "El vehículo presenta un estado general regular, con {} componentes en buen estado, {} en \
     estado regular y {} en mal estado. Se recomienda una revisión adicional antes de tomar una \
     decisión de compra.",
    buenos, regulares, malos
  )
}

/// staff conclusion when present, generated one otherwise
pub fn conclusion_final(peritaje: &Peritaje) -> String {
  if peritaje.evaluacion.conclusion.trim().is_empty() {
    generar_conclusion(peritaje)
  } else {
    peritaje.evaluacion.conclusion.clone()
  }
}

const ANCHO: f32 = 210.0;
const ALTO: f32 = 297.0;
const MARGEN_IZQ: f32 = 20.0;
const MARGEN_INF: f32 = 25.0;
const Y_INICIAL: f32 = 270.0;

/// cursor over an A4 page, breaking to a new page when the remaining
/// vertical space runs out
struct Pagina {
  doc: PdfDocumentReference,
  layer: PdfLayerReference,
  font: IndirectFontRef,
  font_bold: IndirectFontRef,
  y: f32,
}

impl Pagina {
  fn nueva(titulo: &str) -> Result<Pagina> {
    let (doc, page, layer) = PdfDocument::new(titulo, Mm(ANCHO), Mm(ALTO), "contenido");
    let font = doc
      .add_builtin_font(BuiltinFont::Helvetica)
      .map_err(|e| crate::error::Error::from(e.to_string()))?;
    let font_bold = doc
      .add_builtin_font(BuiltinFont::HelveticaBold)
      .map_err(|e| crate::error::Error::from(e.to_string()))?;
    let layer = doc.get_page(page).get_layer(layer);
    Ok(Pagina {
      doc,
      layer,
      font,
      font_bold,
      y: 285.0,
    })
  }

  fn asegurar_espacio(&mut self, alto: f32) {
    if self.y - alto < MARGEN_INF {
      let (page, layer) = self.doc.add_page(Mm(ANCHO), Mm(ALTO), "contenido");
      self.layer = self.doc.get_page(page).get_layer(layer);
      self.y = Y_INICIAL;
    }
  }

  fn titulo(&mut self, texto: &str) {
    self.asegurar_espacio(14.0);
    self
      .layer
      .use_text(texto, 18.0, Mm(MARGEN_IZQ), Mm(self.y), &self.font_bold);
    self.y -= 12.0;
  }

  fn seccion(&mut self, texto: &str) {
    self.asegurar_espacio(14.0);
    self.y -= 4.0;
    self
      .layer
      .use_text(texto, 13.0, Mm(MARGEN_IZQ), Mm(self.y), &self.font_bold);
    self.y -= 8.0;
  }

  fn campo(&mut self, etiqueta: &str, valor: &str) {
    self.asegurar_espacio(6.0);
    self.layer.use_text(
      format!("{}: {}", etiqueta, valor),
      10.0,
      Mm(MARGEN_IZQ),
      Mm(self.y),
      &self.font,
    );
    self.y -= 6.0;
  }

  fn parrafo(&mut self, texto: &str) {
    for linea in envolver(texto, 95) {
      self.asegurar_espacio(5.0);
      self
        .layer
        .use_text(linea, 10.0, Mm(MARGEN_IZQ), Mm(self.y), &self.font);
      self.y -= 5.0;
    }
  }

  fn terminar(self) -> Result<Vec<u8>> {
    self
      .doc
      .save_to_bytes()
      .map_err(|e| crate::error::Error::from(e.to_string()))
  }
}

/// naive word wrap at a character budget
fn envolver(texto: &str, ancho: usize) -> Vec<String> {
  let mut lineas = vec![];
  let mut actual = String::new();
  for palabra in texto.split_whitespace() {
    if !actual.is_empty() && actual.chars().count() + palabra.chars().count() + 1 > ancho {
      lineas.push(std::mem::take(&mut actual));
    }
    if !actual.is_empty() {
      actual.push(' ');
    }
    actual.push_str(palabra);
  }
  if !actual.is_empty() {
    lineas.push(actual);
  }
  lineas
}

fn valor(opt: &Option<String>) -> &str {
  opt.as_deref().unwrap_or("Pendiente")
}

/// renders the full report as PDF bytes
pub fn generar_pdf(peritaje: &Peritaje) -> Result<Vec<u8>> {
  let mut pagina = Pagina::nueva("Informe de Peritaje")?;

  pagina.titulo("INFORME DE PERITAJE");
  pagina.campo(
    "Peritaje Nº",
    &peritaje.id.chars().take(8).collect::<String>().to_uppercase(),
  );
  pagina.campo(
    "Fecha de emisión",
    &util::format_timestamp(util::get_timestamp(), "%Y-%m-%d"),
  );

  pagina.seccion("Datos del Propietario");
  pagina.campo("Nombre", &peritaje.nombre_propietario);
  pagina.campo("Teléfono", &peritaje.telefono_propietario);
  pagina.campo("Email", &peritaje.email_propietario);

  pagina.seccion("Datos del Vehículo");
  pagina.campo("Marca", valor(&peritaje.vehiculo.marca));
  pagina.campo("Modelo", valor(&peritaje.vehiculo.modelo));
  pagina.campo("Año", valor(&peritaje.vehiculo.anio));
  pagina.campo("Patente", valor(&peritaje.vehiculo.patente));
  pagina.campo("Color", valor(&peritaje.vehiculo.color));
  pagina.campo(
    "Kilometraje",
    &format!("{} km", valor(&peritaje.vehiculo.kilometraje)),
  );
  pagina.campo(
    "Combustible",
    &peritaje
      .vehiculo
      .tipo_combustible
      .map(|c| c.to_string())
      .unwrap_or_else(|| "Pendiente".to_string()),
  );

  pagina.seccion("Datos del Turno");
  pagina.campo("Fecha", &util::formatear_fecha(&peritaje.fecha_turno));
  pagina.campo("Hora", &peritaje.hora_turno);
  pagina.campo("Estado", &peritaje.estado.to_string());

  pagina.seccion("Resultados del Peritaje");
  for (etiqueta, condicion) in peritaje.evaluacion.componentes() {
    pagina.campo(
      etiqueta,
      condicion.map(|c| c.descripcion()).unwrap_or("No evaluado"),
    );
  }

  if !peritaje.evaluacion.observaciones.trim().is_empty() {
    pagina.seccion("Observaciones");
    pagina.parrafo(&peritaje.evaluacion.observaciones);
  }

  pagina.seccion("Conclusión");
  pagina.parrafo(&conclusion_final(peritaje));

  pagina.terminar()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::{Estado, Evaluacion, MetodoPago, Vehiculo};

  fn peritaje_con(condiciones: &[Condicion]) -> Peritaje {
    let mut evaluacion = Evaluacion::default();
    let slots: [&mut Option<Condicion>; 10] = [
      &mut evaluacion.estado_general,
      &mut evaluacion.carroceria,
      &mut evaluacion.pintura,
      &mut evaluacion.motor,
      &mut evaluacion.transmision,
      &mut evaluacion.frenos,
      &mut evaluacion.suspension,
      &mut evaluacion.sistema_electrico,
      &mut evaluacion.interior,
      &mut evaluacion.neumaticos,
    ];
    for (slot, condicion) in slots.into_iter().zip(condiciones) {
      *slot = Some(*condicion);
    }
    Peritaje {
      id: "11111111-2222-3333-4444-555555555555".into(),
      fecha_turno: "2024-01-01".into(),
      hora_turno: "10:00".into(),
      estado: Estado::Completado,
      nombre_propietario: "Juan Pérez".into(),
      telefono_propietario: "1123456789".into(),
      email_propietario: "juan@ejemplo.com".into(),
      vehiculo: Vehiculo::default(),
      evaluacion,
      metodo_pago: MetodoPago::Efectivo,
      payment_ref: None,
      senado: false,
      pago_pendiente: false,
      created_at: 0,
      updated_at: 0,
    }
  }

  use Condicion::*;

  #[test]
  fn sin_evaluacion_no_concluye() {
    let conclusion = generar_conclusion(&peritaje_con(&[]));
    assert!(conclusion.contains("No se ha realizado"));
  }

  #[test]
  fn cualquier_critico_domina() {
    let conclusion = generar_conclusion(&peritaje_con(&[
      Excelente, Excelente, Excelente, Excelente, Excelente, Excelente, Excelente, Excelente,
      Excelente, Critico,
    ]));
    assert!(conclusion.contains("1 componentes en estado crítico"));
  }

  #[test]
  fn malos_por_encima_de_un_tercio() {
    // 4 of 10 > 10/3
    let conclusion = generar_conclusion(&peritaje_con(&[
      Malo, Malo, Malo, Malo, Bueno, Bueno, Bueno, Bueno, Bueno, Bueno,
    ]));
    assert!(conclusion.contains("4 componentes en mal estado"));
  }

  #[test]
  fn tres_malos_de_diez_no_alcanza_el_tercio() {
    let conclusion = generar_conclusion(&peritaje_con(&[
      Malo, Malo, Malo, Bueno, Bueno, Bueno, Bueno, Bueno, Bueno, Bueno,
    ]));
    assert!(!conclusion.contains("mal estado. Se recomienda una revisión exhaustiva"));
  }

  #[test]
  fn positivo_requiere_mas_del_setenta_por_ciento() {
    // exactly 70% is not enough
    let conclusion = generar_conclusion(&peritaje_con(&[
      Bueno, Bueno, Bueno, Bueno, Bueno, Bueno, Bueno, Regular, Regular, Regular,
    ]));
    assert!(conclusion.contains("estado general regular"));

    let conclusion = generar_conclusion(&peritaje_con(&[
      Bueno, Bueno, Bueno, Bueno, Bueno, Bueno, Excelente, Excelente, Regular, Regular,
    ]));
    assert!(conclusion.contains("buen estado general"));
  }

  #[test]
  fn conclusion_explicita_tiene_prioridad() {
    let mut peritaje = peritaje_con(&[Bueno; 10]);
    peritaje.evaluacion.conclusion = "Conclusión del perito.".into();
    assert_eq!(conclusion_final(&peritaje), "Conclusión del perito.");
  }

  #[test]
  fn el_pdf_se_genera_con_encabezado() {
    let bytes = generar_pdf(&peritaje_con(&[Bueno; 10])).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
  }

  #[test]
  fn envolver_respeta_el_ancho() {
    let lineas = envolver("uno dos tres cuatro cinco", 9);
    assert_eq!(lineas, vec!["uno dos", "tres", "cuatro", "cinco"]);
  }
}
