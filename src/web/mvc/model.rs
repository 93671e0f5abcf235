use crate::{
  error::{ErrorKind, Result},
  schema, store, util,
  web::{self, auth, Config, DB},
};
use chrono::Datelike;
use error_chain::bail;
use lazy_static::lazy_static;
use maud::Markup;
use path_tree::PathTree;
use serde_json::json;
use std::collections::HashMap;

pub struct Model {
  db_pool: DB,
  config: Config,
  pub root_url: String,
  pub user: Option<auth::Usuario>,
  pub get_data: HashMap<String, String>,
  path: String,
}

pub async fn main(
  uri: String,
  db_pool: DB,
  config: Config,
  user: Option<auth::Usuario>,
) -> Result<Markup> {
  lazy_static! {
    static ref PATH_TREE: PathTree::<&'static str> = {
      let mut tmp = PathTree::<&str>::new();
      for path in vec![
        "/login",
        "/registro",
        "/home",
        "/agenda",
        "/agenda/turno/:fecha/:hora",
        "/peritajes/pendientes",
        "/peritajes/pendientes/sena",
        "/peritajes/completados",
        "/peritaje/:id",
        "/peritaje/:id/edit",
        "/administracion/usuarios",
        "/administracion/reportes",
        "/administracion/pagos",
      ] {
        tmp.insert(path, path);
      }
      tmp
    };
  };

  match PATH_TREE.find(uri.as_str()) {
    Some((path, data)) => {
      let path = *path;
      let get_data: HashMap<_, _> = data
        .into_iter()
        .map(|(arg, value)| (arg.to_string(), value.to_string()))
        .collect();

      let model = Model {
        db_pool,
        root_url: config.web.root_url.clone(),
        config,
        user,
        get_data,
        path: path.to_string(),
      };

      let page = match path {
        "/login" => model.m_login().await?,
        "/registro" => model.m_registro().await?,
        _ => {
          let user = match &model.user {
            Some(user) => user.clone(),
            None => bail!("unauthorized"),
          };

          match path {
            "/home" => model.m_home().await?,

            "/agenda" => model.m_agenda().await?, // ------------------
            "/agenda/turno/:fecha/:hora" => model.m_turno().await?, //-

            "/peritajes/pendientes" | "/peritajes/pendientes/sena" => {
              auth::require_rol(&user, &[schema::Rol::Admin, schema::Rol::Perito])?;
              model.m_pendientes(path == "/peritajes/pendientes/sena").await?
            }
            "/peritajes/completados" => {
              auth::require_rol(&user, &[schema::Rol::Admin, schema::Rol::Perito])?;
              model.m_completados().await?
            }
            "/peritaje/:id" => {
              auth::require_rol(&user, &[schema::Rol::Admin, schema::Rol::Perito])?;
              model.m_peritaje().await?
            }
            "/peritaje/:id/edit" => {
              auth::require_rol(&user, &[schema::Rol::Admin, schema::Rol::Perito])?;
              model.m_peritaje_edit().await?
            }

            "/administracion/usuarios" => {
              auth::require_rol(&user, &[schema::Rol::Admin])?;
              model.m_usuarios().await?
            }
            "/administracion/reportes" => {
              auth::require_rol(&user, &[schema::Rol::Admin])?;
              model.m_reportes().await?
            }
            "/administracion/pagos" => {
              auth::require_rol(&user, &[schema::Rol::Admin])?;
              model.m_pagos().await?
            }
            _ => unreachable!(),
          }
        }
      };

      Ok(model.m_root(page)?)
    }
    None => bail!(ErrorKind::RouteNotFound),
  }
}

impl Model {
  fn m_root(&self, page: Markup) -> Result<Markup> {
    let cors_h = util::gen_cors_hash(util::get_timestamp(), &self.config);

    let js_glob = json!({
      "path_t": self.path,
      "data": self.get_data,
      "root_url": self.root_url,
      "rpc": format!("{}rpc/", self.root_url),
      "cors_h": cors_h,
    });

    self.v_root(page, js_glob)
  }

  async fn m_login(&self) -> Result<Markup> {
    self.v_login()
  }

  async fn m_registro(&self) -> Result<Markup> {
    self.v_registro()
  }

  async fn m_home(&self) -> Result<Markup> {
    let (total, pendientes, en_proceso, completados, recientes) =
      web::block(self.db_pool.clone(), move |db| -> Result<_> {
        Ok((
          store::kpi_estado(&db, None)?,
          store::kpi_estado(&db, Some(schema::Estado::Pendiente))?,
          store::kpi_estado(&db, Some(schema::Estado::EnProceso))?,
          store::kpi_estado(&db, Some(schema::Estado::Completado))?,
          store::peritajes_recientes(&db, 5)?,
        ))
      })
      .await?;

    self.v_home(total, pendientes, en_proceso, completados, recientes)
  }

  async fn m_agenda(&self) -> Result<Markup> {
    // the slot grid is fetched per date over rpc
    self.v_agenda()
  }

  async fn m_turno(&self) -> Result<Markup> {
    let fecha = self.get_data.get("fecha").ok_or(ErrorKind::InvalidRequest)?.clone();
    let hora = self.get_data.get("hora").ok_or(ErrorKind::InvalidRequest)?.clone();

    if !crate::agenda::validar_fecha(&fecha, chrono::Local::now().date_naive())
      || !crate::agenda::es_horario_valido(&hora)
    {
      bail!(ErrorKind::InvalidRequest);
    }

    // the slot may have been taken since the grid was rendered
    let disponible = web::block(self.db_pool.clone(), {
      let fecha = fecha.clone();
      let hora = hora.clone();
      move |db| Ok(crate::agenda::horarios_disponibles(&db, &fecha)?.contains(&hora.as_str()))
    })
    .await?;
    if !disponible {
      bail!(ErrorKind::InvalidRequest);
    }

    self.v_turno(&fecha, &hora)
  }

  async fn m_pendientes(&self, solo_sena: bool) -> Result<Markup> {
    let peritajes = web::block(self.db_pool.clone(), move |db| {
      store::peritajes_pendientes(&db, solo_sena)
    })
    .await?;

    self.v_pendientes(peritajes, solo_sena)
  }

  async fn m_completados(&self) -> Result<Markup> {
    let peritajes = web::block(self.db_pool.clone(), move |db| store::peritajes_completados(&db)).await?;

    self.v_completados(peritajes)
  }

  async fn m_peritaje(&self) -> Result<Markup> {
    let peritaje = self.peritaje_por_id().await?;
    self.v_peritaje(peritaje)
  }

  async fn m_peritaje_edit(&self) -> Result<Markup> {
    let peritaje = self.peritaje_por_id().await?;
    self.v_peritaje_edit(peritaje)
  }

  async fn peritaje_por_id(&self) -> Result<schema::Peritaje> {
    let id = self.get_data.get("id").ok_or(ErrorKind::InvalidRequest)?.clone();
    web::block(self.db_pool.clone(), move |db| {
      store::peritaje_por_id(&db, &id)?.ok_or_else(|| ErrorKind::RouteNotFound.into())
    })
    .await
  }

  async fn m_usuarios(&self) -> Result<Markup> {
    let usuarios = web::block(self.db_pool.clone(), move |db| store::usuarios(&db)).await?;
    self.v_usuarios(usuarios)
  }

  async fn m_reportes(&self) -> Result<Markup> {
    let hoy = chrono::Local::now().date_naive();
    let desde = format!("{}-{:02}-01", hoy.year(), hoy.month());
    let hasta = hoy.format("%Y-%m-%d").to_string();
    let anio = hoy.year();

    let (mes_actual, meses) = web::block(self.db_pool.clone(), move |db| -> Result<_> {
      Ok((
        store::stats_rango(&db, &desde, &hasta)?,
        store::stats_mensuales(&db, anio)?,
      ))
    })
    .await?;

    self.v_reportes(anio, mes_actual, meses)
  }

  async fn m_pagos(&self) -> Result<Markup> {
    let pagos = web::block(self.db_pool.clone(), move |db| store::payments(&db)).await?;
    self.v_pagos(pagos)
  }
}
