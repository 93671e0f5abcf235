use super::model::Model as View;
use crate::{
  error::Result,
  informe, schema, util,
};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::Value as JsonValue;
use strum::IntoEnumIterator;

/// edit-form field name for each evaluated component, paired with its label
fn campos_evaluacion(e: &schema::Evaluacion) -> [(&'static str, &'static str, Option<schema::Condicion>); 10] {
  [
    ("estado_general", "Estado general", e.estado_general),
    ("carroceria", "Carrocería", e.carroceria),
    ("pintura", "Pintura", e.pintura),
    ("motor", "Motor", e.motor),
    ("transmision", "Transmisión", e.transmision),
    ("frenos", "Frenos", e.frenos),
    ("suspension", "Suspensión", e.suspension),
    ("sistema_electrico", "Sistema eléctrico", e.sistema_electrico),
    ("interior", "Interior", e.interior),
    ("neumaticos", "Neumáticos", e.neumaticos),
  ]
}

impl View {
  pub fn v_root(&self, body: Markup, js_glob: JsonValue) -> Result<Markup> {
    Ok(html! {
      (DOCTYPE)
      html lang="es" {
        head {
          meta http-equiv="Content-Type" content="text/html; charset=utf-8";
          meta name="viewport" content="width=device-width";

          link rel="stylesheet" href={ (self.root_url) "static/style.css" } type="text/css" media="screen";
          script type="text/javascript" src={ (self.root_url) "static/script.js" } {  }

          title { "PeriMec - Peritajes automotrices" }

          script type="text/javascript" {
            "var __glob = " (PreEscaped(js_glob.to_string())) ";"
          }
        }
        body {
          (body)
        }
      }
    })
  }

  fn mar_header(&self) -> Result<Markup> {
    let user = self.user.as_ref().ok_or("unauthorized")?;

    Ok(html! {
      .header {
        .logo {
          a href={ (self.root_url) "views/home" } { "PeriMec" }
        }
        nav {
          a href={ (self.root_url) "views/home" } { "Inicio" }
          a href={ (self.root_url) "views/agenda" } { "Agenda" }
          @if user.es_perito() {
            a href={ (self.root_url) "views/peritajes/pendientes" } { "Pendientes" }
            a href={ (self.root_url) "views/peritajes/completados" } { "Completados" }
          }
          @if user.es_admin() {
            .dropdown {
              span { "Administración" }
              .dropdown-content {
                a href={ (self.root_url) "views/administracion/usuarios" } { "Usuarios" }
                a href={ (self.root_url) "views/administracion/reportes" } { "Reportes" }
                a href={ (self.root_url) "views/administracion/pagos" } { "Pagos" }
              }
            }
          }
        }
        .user {
          span.name { (user.profile.full_name) }
          span.rol { (user.rol()) }
          button #logout { "Salir" }
        }
      }
    })
  }

  fn mar_estado(&self, estado: schema::Estado) -> Markup {
    html! {
      span class={ "badge estado-" (estado.as_str()) } { (estado) }
    }
  }

  fn mar_condicion(&self, condicion: Option<schema::Condicion>) -> Markup {
    html! {
      @match condicion {
        Some(condicion) => {
          span.condicion style={ "color: " (condicion.color()) ";" } { (condicion) }
        }
        None => { span.condicion.na { "No evaluado" } }
      }
    }
  }

  fn mar_vehiculo(&self, vehiculo: &schema::Vehiculo) -> Markup {
    let resumen = [
      vehiculo.marca.as_deref().unwrap_or(""),
      vehiculo.modelo.as_deref().unwrap_or(""),
      vehiculo.patente.as_deref().unwrap_or(""),
    ]
    .iter()
    .filter(|x| !x.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(" ");

    html! {
      @if resumen.is_empty() { span.na { "Sin datos" } } @else { (resumen) }
    }
  }

  pub fn v_login(&self) -> Result<Markup> {
    Ok(html! {
      .page-login {
        .login {
          p.title { "PeriMec" }
          p.subtitle { "Peritajes automotrices" }
          .form {
            .input-wrapper {
              input #login type="text" placeholder="usuario";
            }
            .input-wrapper {
              input #password type="password" placeholder="contraseña";
            }
            p.si-error {  }
            button #submit { "Ingresar" }
            p.alt {
              a href={ (self.root_url) "views/registro" } { "Crear una cuenta" }
            }
          }
        }
      }
    })
  }

  pub fn v_registro(&self) -> Result<Markup> {
    Ok(html! {
      .page-login {
        .login {
          p.title { "PeriMec" }
          p.subtitle { "Crear cuenta" }
          .form {
            .input-wrapper {
              input #reg-login type="text" placeholder="usuario";
            }
            .input-wrapper {
              input #reg-password type="password" placeholder="contraseña";
            }
            .input-wrapper {
              input #reg-full-name type="text" placeholder="nombre y apellido";
            }
            .input-wrapper {
              input #reg-phone type="tel" placeholder="teléfono (opcional)";
            }
            p.si-error {  }
            button #reg-crear { "Registrarse" }
            p.alt {
              a href={ (self.root_url) "views/login" } { "Ya tengo cuenta" }
            }
          }
        }
      }
    })
  }

  pub fn v_home(
    &self,
    total: u32,
    pendientes: u32,
    en_proceso: u32,
    completados: u32,
    recientes: Vec<schema::Peritaje>,
  ) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-home {
        .container {
          .kpi-row {
            .kpi { .value { (total) } .label { "Peritajes" } }
            .kpi { .value { (pendientes) } .label { "Pendientes" } }
            .kpi { .value { (en_proceso) } .label { "En proceso" } }
            .kpi { .value { (completados) } .label { "Completados" } }
          }

          h2 { "Últimos peritajes" }
          .table {
            .row.head {
              .col1 { "Turno" }
              .col2 { "Propietario" }
              .col3 { "Vehículo" }
              .col4 { "Estado" }
            }
            @for peritaje in &recientes {
              .row {
                .col1 {
                  a href={ (self.root_url) "views/peritaje/" (peritaje.id) } {
                    (util::formatear_fecha(&peritaje.fecha_turno)) ", " (peritaje.hora_turno)
                  }
                }
                .col2 { (peritaje.nombre_propietario) }
                .col3 { (self.mar_vehiculo(&peritaje.vehiculo)) }
                .col4 { (self.mar_estado(peritaje.estado)) }
              }
            }
          }

          .actions-wrapper {
            a href={ (self.root_url) "views/agenda" } {
              span.action-btn { "Agendar peritaje" }
            }
          }
        }
      }
    })
  }

  pub fn v_agenda(&self) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-agenda {
        .container {
          h2 { "Reservar turno" }
          p.hint { "Seleccione un día hábil para ver los horarios disponibles." }
          .form {
            input #fecha type="date";
          }
          // filled over rpc, each free slot links to the booking form
          #horarios {  }
        }
      }
    })
  }

  pub fn v_turno(&self, fecha: &str, hora: &str) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-turno {
        .container {
          h2 { "Confirmar turno" }
          p.turno-resumen {
            (util::formatear_fecha(fecha)) " a las " b { (hora) " hs" }
          }

          .form {
            .field {
              label for="nombre_propietario" { "Nombre y apellido" }
              input #nombre_propietario type="text";
            }
            .field {
              label for="telefono_propietario" { "Teléfono" }
              input #telefono_propietario type="tel";
            }
            .field {
              label for="email_propietario" { "Email" }
              input #email_propietario type="email";
            }
            .field {
              label for="metodo_pago" { "Método de pago de la seña" }
              select #metodo_pago {
                @for metodo in schema::MetodoPago::iter() {
                  option value=(metodo.as_str()) { (metodo) }
                }
              }
            }
            p.si-error {  }
            button #agendar data-fecha=(fecha) data-hora=(hora) { "Confirmar turno" }
          }
        }
      }
    })
  }

  pub fn v_pendientes(&self, peritajes: Vec<schema::Peritaje>, solo_sena: bool) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-peritajes {
        .container {
          h2 { "Peritajes pendientes" }
          .filtros {
            a.filtro.activo[!solo_sena] href={ (self.root_url) "views/peritajes/pendientes" } { "Todos" }
            a.filtro.activo[solo_sena] href={ (self.root_url) "views/peritajes/pendientes/sena" } { "Seña pendiente" }
          }
          .table {
            .row.head {
              .col1 { "Turno" }
              .col2 { "Propietario" }
              .col3 { "Vehículo" }
              .col4 { "Estado" }
              .col5 { "Seña" }
              .col6 { "Acciones" }
            }
            @for peritaje in &peritajes {
              .row {
                .col1 { (util::formatear_fecha(&peritaje.fecha_turno)) ", " (peritaje.hora_turno) }
                .col2 {
                  (peritaje.nombre_propietario)
                  br;
                  span.contact { (peritaje.telefono_propietario) }
                }
                .col3 { (self.mar_vehiculo(&peritaje.vehiculo)) }
                .col4 { (self.mar_estado(peritaje.estado)) }
                .col5 {
                  @if peritaje.senado { span.sena.pagada { "Pagada" } }
                  @else if peritaje.pago_pendiente { span.sena.pendiente { "Pendiente" } }
                  @else { span.sena { (peritaje.metodo_pago) } }
                }
                .col6 {
                  a href={ (self.root_url) "views/peritaje/" (peritaje.id) } { "Ver" }
                  a href={ (self.root_url) "views/peritaje/" (peritaje.id) "/edit" } { "Editar" }
                  button.recordatorio
                    data-email=(peritaje.email_propietario)
                    data-nombre=(peritaje.nombre_propietario)
                    data-fecha=(peritaje.fecha_turno)
                    { "Recordatorio" }
                }
              }
            }
          }
        }
      }
    })
  }

  pub fn v_completados(&self, peritajes: Vec<schema::Peritaje>) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-peritajes {
        .container {
          h2 { "Peritajes completados" }
          .table {
            .row.head {
              .col1 { "Turno" }
              .col2 { "Propietario" }
              .col3 { "Vehículo" }
              .col4 { "Informe" }
            }
            @for peritaje in &peritajes {
              .row {
                .col1 { (util::formatear_fecha(&peritaje.fecha_turno)) }
                .col2 { (peritaje.nombre_propietario) }
                .col3 { (self.mar_vehiculo(&peritaje.vehiculo)) }
                .col4 {
                  a href={ (self.root_url) "views/peritaje/" (peritaje.id) } { "Ver" }
                  a href={ (self.root_url) "pdf/" (peritaje.id) } { "PDF" }
                }
              }
            }
          }
        }
      }
    })
  }

  pub fn v_peritaje(&self, peritaje: schema::Peritaje) -> Result<Markup> {
    let vehiculo = &peritaje.vehiculo;

    Ok(html! {
      (self.mar_header()?)

      .page-peritaje {
        .container {
          .title-row {
            h2 { "Peritaje " (peritaje.id.get(..8).unwrap_or(&peritaje.id).to_uppercase()) }
            (self.mar_estado(peritaje.estado))
          }

          .actions-wrapper {
            a href={ (self.root_url) "views/peritaje/" (peritaje.id) "/edit" } {
              span.action-btn { "Editar" }
            }
            a href={ (self.root_url) "pdf/" (peritaje.id) } {
              span.action-btn { "Descargar PDF" }
            }
            @for estado in schema::Estado::iter() {
              @if estado != peritaje.estado {
                button.cambiar-estado data-id=(peritaje.id) data-estado=(estado.as_str()) {
                  (estado)
                }
              }
            }
          }

          .section {
            h3 { "Turno" }
            p { (util::formatear_fecha(&peritaje.fecha_turno)) " a las " (peritaje.hora_turno) " hs" }
          }

          .section {
            h3 { "Propietario" }
            .table.plain {
              .row { .col1 { "Nombre" }   .col2 { (peritaje.nombre_propietario) } }
              .row { .col1 { "Teléfono" } .col2 { (peritaje.telefono_propietario) } }
              .row { .col1 { "Email" }    .col2 { (peritaje.email_propietario) } }
            }
          }

          .section {
            h3 { "Vehículo" }
            .table.plain {
              .row { .col1 { "Marca" }  .col2 { (vehiculo.marca.as_deref().unwrap_or("-")) } }
              .row { .col1 { "Modelo" } .col2 { (vehiculo.modelo.as_deref().unwrap_or("-")) } }
              .row { .col1 { "Año" }    .col2 { (vehiculo.anio.as_deref().unwrap_or("-")) } }
              .row { .col1 { "Patente" } .col2 { (vehiculo.patente.as_deref().unwrap_or("-")) } }
              .row { .col1 { "Color" }  .col2 { (vehiculo.color.as_deref().unwrap_or("-")) } }
              .row { .col1 { "Kilometraje" } .col2 { (vehiculo.kilometraje.as_deref().unwrap_or("-")) } }
              .row {
                .col1 { "Combustible" }
                .col2 { (vehiculo.tipo_combustible.map(|c| c.to_string()).unwrap_or_else(|| "-".into())) }
              }
            }
          }

          .section {
            h3 { "Evaluación" }
            .table.plain {
              @for (etiqueta, condicion) in peritaje.evaluacion.componentes() {
                .row {
                  .col1 { (etiqueta) }
                  .col2 {
                    (self.mar_condicion(condicion))
                    @if let Some(condicion) = condicion {
                      br;
                      span.descripcion { (condicion.descripcion()) }
                    }
                  }
                }
              }
            }
          }

          @if !peritaje.evaluacion.observaciones.is_empty() {
            .section {
              h3 { "Observaciones" }
              p { (peritaje.evaluacion.observaciones) }
            }
          }

          .section {
            h3 { "Conclusión" }
            p { (informe::conclusion_final(&peritaje)) }
          }

          .section {
            h3 { "Pago" }
            .table.plain {
              .row { .col1 { "Método" } .col2 { (peritaje.metodo_pago) } }
              .row {
                .col1 { "Seña" }
                .col2 {
                  @if peritaje.senado { "Pagada" }
                  @else if peritaje.pago_pendiente { "Pendiente de pago" }
                  @else { "A pagar en el taller" }
                }
              }
              @if let Some(payment_ref) = &peritaje.payment_ref {
                .row { .col1 { "Referencia" } .col2 { (payment_ref) } }
              }
            }
          }
        }
      }
    })
  }

  pub fn v_peritaje_edit(&self, peritaje: schema::Peritaje) -> Result<Markup> {
    let vehiculo = &peritaje.vehiculo;
    let mar_select_condicion = |nombre: &str, valor: Option<schema::Condicion>| {
      html! {
        select.condicion-input id=(nombre) {
          option value="" selected[valor.is_none()] { "No evaluado" }
          @for condicion in schema::Condicion::iter() {
            option value=(condicion.as_str()) selected[valor == Some(condicion)] { (condicion) }
          }
        }
      }
    };

    Ok(html! {
      (self.mar_header()?)

      .page-peritaje-edit {
        .container {
          h2 { "Editar peritaje " (peritaje.id.get(..8).unwrap_or(&peritaje.id).to_uppercase()) }

          .form {
            h3 { "Propietario" }
            .field {
              label for="nombre_propietario" { "Nombre" }
              input #nombre_propietario type="text" value=(peritaje.nombre_propietario);
            }
            .field {
              label for="telefono_propietario" { "Teléfono" }
              input #telefono_propietario type="tel" value=(peritaje.telefono_propietario);
            }
            .field {
              label for="email_propietario" { "Email" }
              input #email_propietario type="email" value=(peritaje.email_propietario);
            }

            h3 { "Vehículo" }
            .field {
              label for="marca" { "Marca" }
              input #marca type="text" value=(vehiculo.marca.as_deref().unwrap_or(""));
            }
            .field {
              label for="modelo" { "Modelo" }
              input #modelo type="text" value=(vehiculo.modelo.as_deref().unwrap_or(""));
            }
            .field {
              label for="anio" { "Año" }
              input #anio type="text" value=(vehiculo.anio.as_deref().unwrap_or(""));
            }
            .field {
              label for="patente" { "Patente" }
              input #patente type="text" value=(vehiculo.patente.as_deref().unwrap_or(""));
            }
            .field {
              label for="color" { "Color" }
              input #color type="text" value=(vehiculo.color.as_deref().unwrap_or(""));
            }
            .field {
              label for="kilometraje" { "Kilometraje" }
              input #kilometraje type="text" value=(vehiculo.kilometraje.as_deref().unwrap_or(""));
            }
            .field {
              label for="tipo_combustible" { "Combustible" }
              select #tipo_combustible {
                option value="" selected[vehiculo.tipo_combustible.is_none()] { "-" }
                @for combustible in schema::Combustible::iter() {
                  option value=(combustible.as_str())
                    selected[vehiculo.tipo_combustible == Some(combustible)] { (combustible) }
                }
              }
            }

            h3 { "Evaluación" }
            @for (nombre, etiqueta, valor) in campos_evaluacion(&peritaje.evaluacion) {
              .field {
                label for=(nombre) { (etiqueta) }
                (mar_select_condicion(nombre, valor))
              }
            }
            .field {
              label for="observaciones" { "Observaciones" }
              textarea #observaciones { (peritaje.evaluacion.observaciones) }
            }
            .field {
              label for="conclusion" { "Conclusión (se genera automáticamente si queda vacía)" }
              textarea #conclusion { (peritaje.evaluacion.conclusion) }
            }

            h3 { "Estado y pago" }
            .field {
              label for="estado" { "Estado" }
              select #estado {
                @for estado in schema::Estado::iter() {
                  option value=(estado.as_str()) selected[estado == peritaje.estado] { (estado) }
                }
              }
            }
            .field.checkbox {
              @if peritaje.senado {
                input #senado type="checkbox" checked="";
              } @else {
                input #senado type="checkbox";
              }
              label for="senado" { "Seña pagada" }
            }

            p.si-error {  }
            button #save data-id=(peritaje.id) { "Guardar" }
          }
        }
      }
    })
  }

  pub fn v_usuarios(&self, usuarios: Vec<(schema::User, schema::Profile)>) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-usuarios {
        .container {
          h2 { "Usuarios" }
          .table {
            .row.head {
              .col1 { "Usuario" }
              .col2 { "Nombre" }
              .col3 { "Teléfono" }
              .col4 { "Rol" }
              .col5 { "Activo" }
              .col6 { "Acciones" }
            }
            @for (user, profile) in &usuarios {
              .row data-uid=(user.id) {
                .col1 { (user.login) }
                .col2 {
                  input.full-name type="text" value=(profile.full_name);
                }
                .col3 {
                  input.phone type="text" value=(profile.phone);
                }
                .col4 {
                  select.rol {
                    @for rol in schema::Rol::iter() {
                      option value=(rol.as_str()) selected[rol == profile.rol] { (rol) }
                    }
                  }
                }
                .col5 {
                  @if profile.activo {
                    input.activo type="checkbox" checked="";
                  } @else {
                    input.activo type="checkbox";
                  }
                }
                .col6 {
                  button.guardar { "Guardar" }
                  button.eliminar { "Eliminar" }
                }
              }
            }
          }

          h3 { "Nuevo usuario" }
          .form #nuevo-usuario {
            .field { label { "Usuario" }    input #nu-login type="text"; }
            .field { label { "Contraseña" } input #nu-password type="password"; }
            .field { label { "Nombre" }     input #nu-full-name type="text"; }
            .field { label { "Teléfono" }   input #nu-phone type="text"; }
            .field {
              label { "Rol" }
              select #nu-rol {
                @for rol in schema::Rol::iter() {
                  option value=(rol.as_str()) { (rol) }
                }
              }
            }
            p.si-error {  }
            button #nu-crear { "Crear" }
          }
        }
      }
    })
  }

  pub fn v_reportes(
    &self,
    anio: i32,
    mes_actual: crate::store::Stats,
    meses: Vec<crate::store::Stats>,
  ) -> Result<Markup> {
    const MESES: [&str; 12] = [
      "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio", "Julio", "Agosto", "Septiembre",
      "Octubre", "Noviembre", "Diciembre",
    ];

    Ok(html! {
      (self.mar_header()?)

      .page-reportes {
        .container {
          h2 { "Reportes" }

          h3 { "Mes en curso" }
          .kpi-row {
            .kpi { .value { (mes_actual.total) } .label { "Total" } }
            .kpi { .value { (mes_actual.pendientes) } .label { "Pendientes" } }
            .kpi { .value { (mes_actual.en_proceso) } .label { "En proceso" } }
            .kpi { .value { (mes_actual.completados) } .label { "Completados" } }
            .kpi { .value { (mes_actual.cancelados) } .label { "Cancelados" } }
          }

          h3 { "Año " (anio) }
          .table {
            .row.head {
              .col1 { "Mes" }
              .col2 { "Pendientes" }
              .col3 { "En proceso" }
              .col4 { "Completados" }
              .col5 { "Cancelados" }
              .col6 { "Total" }
            }
            @for (mes, stats) in meses.iter().enumerate() {
              .row {
                .col1 { (MESES[mes]) }
                .col2 { (stats.pendientes) }
                .col3 { (stats.en_proceso) }
                .col4 { (stats.completados) }
                .col5 { (stats.cancelados) }
                .col6 { (stats.total) }
              }
            }
          }
        }
      }
    })
  }

  pub fn v_pagos(&self, pagos: Vec<schema::Payment>) -> Result<Markup> {
    Ok(html! {
      (self.mar_header()?)

      .page-pagos {
        .container {
          h2 { "Pagos" }
          .table {
            .row.head {
              .col1 { "Fecha" }
              .col2 { "Descripción" }
              .col3 { "Canal" }
              .col4 { "Monto" }
              .col5 { "Peritaje" }
            }
            @for pago in &pagos {
              .row {
                .col1 { (util::format_timestamp(pago.created_at as u64, "%Y-%m-%d %H:%M")) }
                .col2 { (pago.descripcion) }
                .col3 { (pago.canal) }
                .col4 { "$ " (format!("{:.2}", pago.amount)) }
                .col5 {
                  @match &pago.peritaje_id {
                    Some(id) => {
                      a href={ (self.root_url) "views/peritaje/" (id) } {
                        (id.get(..8).unwrap_or(id).to_uppercase())
                      }
                    }
                    None => { span.na { "-" } }
                  }
                }
              }
            }
          }
        }
      }
    })
  }
}
